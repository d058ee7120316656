/*
 * Cancellation Index
 *
 * Maps caller-chosen cancellation tokens to driver-internal handles.
 *
 * Tokens are picked by applications and may collide across unrelated
 * requests; handles are what goes on the wire. The index lets a second
 * thread cancel a request it didn't issue, by token, while keeping the wire
 * identifier compact and under driver control.
 *
 * Rules:
 * - Token 0 means "not cancellable": registering it is a no-op that yields
 *   handle 0, and handle 0 is never allocated
 * - At most one entry per nonzero token at any instant; a second
 *   registration of a live token is a collision
 * - Handles are allocated cyclically from 1..=limit and only reused after
 *   the entry holding them is removed
 */

use crate::error::TeeError;
use alloc::collections::BTreeMap;
use spin::Mutex;

/// Wire-level cancellation handle (0 = none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CancelHandle(pub u32);

impl CancelHandle {
    pub const NONE: CancelHandle = CancelHandle(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for CancelHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Cancel({})", self.0)
    }
}

struct CancelTable {
    /// handle -> token
    by_handle: BTreeMap<u32, u32>,
    /// token -> handle
    by_token: BTreeMap<u32, u32>,
    /// Where the next cyclic search starts
    cursor: u32,
}

impl CancelTable {
    const fn new() -> Self {
        Self {
            by_handle: BTreeMap::new(),
            by_token: BTreeMap::new(),
            cursor: 1,
        }
    }

    fn alloc_handle(&mut self, limit: u32) -> Option<u32> {
        if self.by_handle.len() >= limit as usize {
            return None;
        }
        let mut candidate = self.cursor;
        loop {
            if candidate == 0 || candidate > limit {
                candidate = 1;
            }
            if !self.by_handle.contains_key(&candidate) {
                self.cursor = candidate.wrapping_add(1);
                return Some(candidate);
            }
            candidate = candidate.wrapping_add(1);
        }
    }
}

/// Per-context cancellation index
pub struct CancelIndex {
    table: Mutex<CancelTable>,
    limit: u32,
}

impl CancelIndex {
    pub const fn new(limit: u32) -> Self {
        Self {
            table: Mutex::new(CancelTable::new()),
            limit,
        }
    }

    /// Register `token` for an operation about to go on the wire
    pub fn register(&self, token: u32) -> Result<CancelHandle, TeeError> {
        if token == 0 {
            return Ok(CancelHandle::NONE);
        }

        let result = {
            let mut table = self.table.lock();
            if table.by_token.contains_key(&token) {
                Err(TeeError::CancelCollision(token))
            } else if let Some(handle) = table.alloc_handle(self.limit) {
                table.by_handle.insert(handle, token);
                table.by_token.insert(token, handle);
                Ok(CancelHandle(handle))
            } else {
                Err(TeeError::CancelExhausted)
            }
        };

        log::debug!("cancel register token 0x{:x} -> {:?}", token, result);
        result
    }

    /// Drop the entry behind `handle`; no-op for handle 0
    pub fn unregister(&self, handle: CancelHandle) {
        log::debug!("cancel unregister {}", handle);
        if handle.is_none() {
            return;
        }

        let mut table = self.table.lock();
        if let Some(token) = table.by_handle.remove(&handle.0) {
            table.by_token.remove(&token);
        }
    }

    /// Resolve a token to the handle of the operation that registered it
    pub fn lookup(&self, token: u32) -> Option<CancelHandle> {
        if token == 0 {
            return None;
        }
        let handle = self.table.lock().by_token.get(&token).copied().map(CancelHandle);
        log::debug!("cancel lookup token 0x{:x} -> {:?}", token, handle);
        handle
    }

    /// Register `token` for the lifetime of the returned guard
    pub fn register_scoped(&self, token: u32) -> Result<CancelRegistration<'_>, TeeError> {
        let handle = self.register(token)?;
        Ok(CancelRegistration { index: self, handle })
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.table.lock().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration: unregisters its handle when dropped
pub struct CancelRegistration<'a> {
    index: &'a CancelIndex,
    handle: CancelHandle,
}

impl CancelRegistration<'_> {
    pub fn handle(&self) -> CancelHandle {
        self.handle
    }
}

impl Drop for CancelRegistration<'_> {
    fn drop(&mut self) {
        self.index.unregister(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn zero_token_is_never_registered() {
        let index = CancelIndex::new(16);
        assert_eq!(index.register(0), Ok(CancelHandle::NONE));
        assert!(index.is_empty());
        assert_eq!(index.lookup(0), None);
        index.unregister(CancelHandle::NONE);
    }

    #[test]
    fn live_token_collides() {
        let index = CancelIndex::new(16);
        let first = index.register(0xabc).unwrap();
        assert!(!first.is_none());
        assert_eq!(index.register(0xabc), Err(TeeError::CancelCollision(0xabc)));
        assert_eq!(index.lookup(0xabc), Some(first));

        index.unregister(first);
        assert_eq!(index.lookup(0xabc), None);
        assert!(index.register(0xabc).is_ok());
    }

    #[test]
    fn handles_are_cyclic_not_lowest_free() {
        let index = CancelIndex::new(16);
        let a = index.register(10).unwrap();
        let b = index.register(11).unwrap();
        assert_eq!((a, b), (CancelHandle(1), CancelHandle(2)));

        index.unregister(a);
        assert_eq!(index.register(12), Ok(CancelHandle(3)));
    }

    #[test]
    fn bounded_namespace_wraps_and_exhausts() {
        let index = CancelIndex::new(3);
        let handles: Vec<_> = (1..=3).map(|t| index.register(t).unwrap()).collect();
        assert_eq!(handles, vec![CancelHandle(1), CancelHandle(2), CancelHandle(3)]);
        assert_eq!(index.register(4), Err(TeeError::CancelExhausted));

        index.unregister(CancelHandle(2));
        assert_eq!(index.register(5), Ok(CancelHandle(2)));
    }

    #[test]
    fn scoped_registration_releases_on_drop() {
        let index = CancelIndex::new(16);
        {
            let reg = index.register_scoped(77).unwrap();
            assert_eq!(index.lookup(77), Some(reg.handle()));
            assert!(index.register_scoped(77).is_err());
        }
        assert!(index.is_empty());
    }

    #[test]
    fn concurrent_registrations_of_one_token_admit_exactly_one() {
        const THREADS: usize = 8;
        let index = Arc::new(CancelIndex::new(1024));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let index = Arc::clone(&index);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let result = index.register(0x5151);
                    // keep the winner registered until everyone has tried
                    barrier.wait();
                    result
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(TeeError::CancelCollision(0x5151))));
        assert_eq!(index.len(), 1);
    }
}
