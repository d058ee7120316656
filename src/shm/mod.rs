/*
 * Shared Memory Message Buffers
 *
 * Every command is exchanged with the secure world through a message buffer
 * carved out of shared memory. This module defines:
 *
 * - `ShmAllocator`: the allocator interface the driver consumes
 * - `ShmBuffer`: one allocation (id, physical address, writable view)
 * - `MsgBuffer`: scoped acquisition of a message buffer that is released
 *   back to its allocator on every exit path (drop)
 * - `ShmPool`: a reference allocator over an owned region
 */

pub mod pool;

pub use pool::{ShmPool, ShmStats};

use crate::msg::{MsgArg, msg_arg_size};
use core::ptr::NonNull;

/// Shared memory buffer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShmId(pub usize);

impl core::fmt::Display for ShmId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Shm({})", self.0)
    }
}

/// Shared memory errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmError {
    OutOfMemory,
    InvalidSize,
}

impl core::fmt::Display for ShmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ShmError::OutOfMemory => write!(f, "Out of shared memory"),
            ShmError::InvalidSize => write!(f, "Invalid size"),
        }
    }
}

/// One shared memory allocation
///
/// The buffer is exclusively owned by whoever holds it until it is handed
/// back to `ShmAllocator::free`.
pub struct ShmBuffer {
    id: ShmId,
    paddr: u64,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: a ShmBuffer is the only handle to its region until freed
unsafe impl Send for ShmBuffer {}

impl ShmBuffer {
    /// Build a buffer handle from an allocator-owned region
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes and must not
    /// be accessed through any other path until the buffer is freed.
    pub unsafe fn from_raw_parts(id: ShmId, paddr: u64, ptr: NonNull<u8>, len: usize) -> Self {
        Self { id, paddr, ptr, len }
    }

    pub fn id(&self) -> ShmId {
        self.id
    }

    /// Physical address the secure world sees for this buffer
    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: guaranteed by from_raw_parts
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: guaranteed by from_raw_parts, &mut self is exclusive
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Shared memory allocator consumed by the driver
pub trait ShmAllocator: Send + Sync {
    /// Allocate `size` bytes of shared memory
    fn alloc(&self, size: usize) -> Result<ShmBuffer, ShmError>;

    /// Return a buffer previously handed out by `alloc`
    fn free(&self, buffer: ShmBuffer);
}

/// Scoped message buffer
///
/// Sized for a message with a given parameter count, zero-filled and stamped
/// with that count. The buffer goes back to the allocator when the guard is
/// dropped, so early returns can't leak it.
pub struct MsgBuffer<'a, A: ShmAllocator + ?Sized> {
    allocator: &'a A,
    buffer: Option<ShmBuffer>,
}

impl<'a, A: ShmAllocator + ?Sized> MsgBuffer<'a, A> {
    /// Acquire a message buffer for `num_params` parameters
    pub fn acquire(allocator: &'a A, num_params: usize) -> Result<Self, ShmError> {
        let mut buffer = allocator.alloc(msg_arg_size(num_params))?;
        if MsgArg::init(buffer.as_mut_slice(), num_params).is_none() {
            // Allocator handed back less than asked for
            allocator.free(buffer);
            return Err(ShmError::InvalidSize);
        }
        Ok(Self {
            allocator,
            buffer: Some(buffer),
        })
    }

    /// Typed view of the message held in this buffer
    pub fn arg(&mut self) -> MsgArg<'_> {
        let bytes: &mut [u8] = match self.buffer.as_mut() {
            Some(buffer) => buffer.as_mut_slice(),
            None => &mut [],
        };
        MsgArg::wrap(bytes)
    }
}

impl<A: ShmAllocator + ?Sized> Drop for MsgBuffer<'_, A> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.allocator.free(buffer);
        }
    }
}
