/*
 * Shared Memory Pool
 *
 * Reference `ShmAllocator` over one owned, contiguous region. The region
 * plays the role of the memory shared with the secure world: it is mapped at
 * a known physical base, and every buffer handed out reports its physical
 * address as `base + offset`.
 *
 * Design:
 * - Backing store is a single 8-byte aligned allocation made up front
 * - Sub-allocation is done by linked_list_allocator::Heap (first fit)
 * - The heap is protected by a spin Mutex; buffers themselves are disjoint
 *   so they are used without holding the lock
 */

use super::{ShmAllocator, ShmBuffer, ShmError, ShmId};
use alloc::boxed::Box;
use alloc::vec;
use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use linked_list_allocator::Heap;
use spin::Mutex;

/// Alignment of every buffer handed out by the pool
const BUFFER_ALIGN: usize = 8;

/// Smallest region the pool will manage
const MIN_POOL_SIZE: usize = 64;

/// Pool statistics for debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmStats {
    pub allocations: usize,
    pub frees: usize,
    pub bytes_in_use: usize,
    pub capacity: usize,
}

/// Shared memory pool
pub struct ShmPool {
    base: u64,
    region: NonNull<u64>,
    words: usize,
    heap: Mutex<Heap>,
    next_id: AtomicUsize,
    allocations: AtomicUsize,
    frees: AtomicUsize,
}

// SAFETY: the region is only reached through the heap (under its lock) or
// through disjoint ShmBuffers
unsafe impl Send for ShmPool {}
unsafe impl Sync for ShmPool {}

impl ShmPool {
    /// Create a pool of (at least) `size` bytes mapped at physical `base`
    pub fn new(base: u64, size: usize) -> Self {
        let words = size.max(MIN_POOL_SIZE).div_ceil(BUFFER_ALIGN);
        let region = Box::into_raw(vec![0u64; words].into_boxed_slice()) as *mut u64;
        // SAFETY: Box::into_raw never returns null
        let region = unsafe { NonNull::new_unchecked(region) };

        // SAFETY: the region is valid, owned by the pool and outlives the heap
        let heap = unsafe { Heap::new(region.as_ptr() as *mut u8, words * BUFFER_ALIGN) };

        log::debug!(
            "shm pool created at phys 0x{:x} ({} bytes)",
            base,
            words * BUFFER_ALIGN
        );

        Self {
            base,
            region,
            words,
            heap: Mutex::new(heap),
            next_id: AtomicUsize::new(1),
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    fn region_start(&self) -> usize {
        self.region.as_ptr() as usize
    }

    fn contains(&self, ptr: NonNull<u8>, len: usize) -> bool {
        let start = ptr.as_ptr() as usize;
        start >= self.region_start()
            && start + len <= self.region_start() + self.words * BUFFER_ALIGN
    }

    pub fn stats(&self) -> ShmStats {
        let heap = self.heap.lock();
        ShmStats {
            allocations: self.allocations.load(Ordering::SeqCst),
            frees: self.frees.load(Ordering::SeqCst),
            bytes_in_use: heap.used(),
            capacity: heap.size(),
        }
    }
}

impl ShmAllocator for ShmPool {
    fn alloc(&self, size: usize) -> Result<ShmBuffer, ShmError> {
        if size == 0 {
            return Err(ShmError::InvalidSize);
        }
        let layout =
            Layout::from_size_align(size, BUFFER_ALIGN).map_err(|_| ShmError::InvalidSize)?;

        let ptr = self
            .heap
            .lock()
            .allocate_first_fit(layout)
            .map_err(|_| ShmError::OutOfMemory)?;

        let id = ShmId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let paddr = self.base + (ptr.as_ptr() as usize - self.region_start()) as u64;
        self.allocations.fetch_add(1, Ordering::SeqCst);

        // SAFETY: the heap handed out `size` bytes inside our region and
        // won't hand them out again until they come back through free()
        let mut buffer = unsafe { ShmBuffer::from_raw_parts(id, paddr, ptr, size) };
        buffer.as_mut_slice().fill(0);
        Ok(buffer)
    }

    fn free(&self, buffer: ShmBuffer) {
        let ptr = buffer.ptr();
        if !self.contains(ptr, buffer.len()) {
            log::error!("shm free: {} does not belong to this pool", buffer.id());
            return;
        }
        let layout = match Layout::from_size_align(buffer.len(), BUFFER_ALIGN) {
            Ok(layout) => layout,
            Err(_) => {
                log::error!("shm free: {} has an invalid size", buffer.id());
                return;
            }
        };

        // SAFETY: ptr/layout are exactly what allocate_first_fit returned
        unsafe { self.heap.lock().deallocate(ptr, layout) };
        self.frees.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ShmPool {
    fn drop(&mut self) {
        let slice = core::ptr::slice_from_raw_parts_mut(self.region.as_ptr(), self.words);
        // SAFETY: region came from Box::into_raw with this exact length
        unsafe { drop(Box::from_raw(slice)) };
    }
}
