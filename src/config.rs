/*
 * Driver Configuration
 *
 * Per-context tunables. Defaults match the GlobalPlatform client limits and
 * a cyclic id allocator over positive 32-bit integers.
 */

/// Maximum caller parameters per operation (GlobalPlatform payload)
pub const DEFAULT_MAX_PARAMS: usize = 4;

/// Cancellation handles are drawn from 1..=limit
pub const DEFAULT_CANCEL_HANDLE_LIMIT: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeeConfig {
    /// Upper bound on caller parameters for open and invoke
    pub max_params: usize,
    /// Largest cancellation handle the index will hand out
    pub cancel_handle_limit: u32,
    /// Physical base the codec adds to memory reference offsets
    pub shm_base: u64,
}

impl TeeConfig {
    pub fn new() -> Self {
        Self {
            max_params: DEFAULT_MAX_PARAMS,
            cancel_handle_limit: DEFAULT_CANCEL_HANDLE_LIMIT,
            shm_base: 0,
        }
    }

    pub fn with_max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params;
        self
    }

    pub fn with_cancel_handle_limit(mut self, limit: u32) -> Self {
        self.cancel_handle_limit = limit.max(1);
        self
    }

    pub fn with_shm_base(mut self, shm_base: u64) -> Self {
        self.shm_base = shm_base;
        self
    }
}

impl Default for TeeConfig {
    fn default() -> Self {
        Self::new()
    }
}
