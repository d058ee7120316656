/*
 * Ring Buffer for Logging
 *
 * Fixed-size circular byte buffer the logger appends formatted lines to.
 *
 * Design:
 * - Fixed capacity, no heap allocation
 * - Overwrite on overflow (loses the oldest bytes)
 * - Not synchronized itself; the owner keeps it behind a `spin::Mutex`
 */

/// Default capacity of the log ring
pub const LOG_BUFFER_SIZE: usize = 16 * 1024; // 16KB

pub struct RingBuffer<const N: usize = LOG_BUFFER_SIZE> {
    buffer: [u8; N],
    /// Next write position
    head: usize,
    /// Bytes currently stored
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            head: 0,
            len: 0,
        }
    }

    /// Read position (oldest stored byte)
    fn tail(&self) -> usize {
        (self.head + N - self.len) % N
    }

    /// Append `data`, overwriting the oldest bytes if there is no room
    ///
    /// Returns the number of bytes stored. Only the last `N` bytes of an
    /// oversized write survive.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if N == 0 {
            return 0;
        }
        let data = &data[data.len().saturating_sub(N)..];

        for &byte in data {
            self.buffer[self.head] = byte;
            self.head = (self.head + 1) % N;
            if self.len < N {
                self.len += 1;
            }
        }
        data.len()
    }

    /// Move up to `dest.len()` of the oldest bytes into `dest`
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = self.len.min(dest.len());
        let tail = self.tail();

        for (i, slot) in dest[..count].iter_mut().enumerate() {
            *slot = self.buffer[(tail + i) % N];
        }
        self.len -= count;
        count
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let mut rb: RingBuffer = RingBuffer::new();

        let written = rb.write(b"Hello, World!");
        assert_eq!(written, 13);

        let mut buf = [0u8; 20];
        let read = rb.read(&mut buf);
        assert_eq!(read, 13);
        assert_eq!(&buf[..13], b"Hello, World!");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_partial_read_keeps_the_rest() {
        let mut rb = RingBuffer::<8>::new();
        rb.write(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(rb.read(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(rb.len(), 2);
        assert_eq!(rb.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut rb = RingBuffer::<8>::new();
        rb.write(b"012345");
        rb.write(b"6789");
        assert_eq!(rb.len(), 8);

        let mut buf = [0u8; 8];
        assert_eq!(rb.read(&mut buf), 8);
        assert_eq!(&buf, b"23456789");
    }

    #[test]
    fn test_oversized_write_keeps_the_tail() {
        let mut rb = RingBuffer::<4>::new();
        assert_eq!(rb.write(b"abcdefgh"), 4);

        let mut buf = [0u8; 4];
        rb.read(&mut buf);
        assert_eq!(&buf, b"efgh");
    }

    #[test]
    fn test_clear() {
        let mut rb = RingBuffer::<4>::new();
        rb.write(b"xyz");
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.read(&mut [0u8; 4]), 0);
    }
}
