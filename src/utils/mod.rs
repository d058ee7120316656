/*
 * Debugging and Logging Utilities
 *
 * Buffered logging backend for the `log` facade and the byte ring it
 * buffers into.
 */

pub mod logger;
pub mod ring_buffer;

pub use self::logger::TeeLogger;
pub use self::ring_buffer::RingBuffer;
