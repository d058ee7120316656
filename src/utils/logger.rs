/*
 * Driver Logging System
 *
 * Backend for the `log` facade. Records are formatted into a fixed-size
 * line and appended to a ring buffer, so logging never allocates and never
 * blocks on an output device. Whoever owns the console pulls the bytes out
 * with `drain` (dmesg-style).
 *
 * Line format: "[LEVEL] target: message\n". Lines longer than
 * `LINE_CAPACITY` are truncated; the newline is always kept.
 */

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

use super::ring_buffer::RingBuffer;

/// Longest line stored, newline included
pub const LINE_CAPACITY: usize = 256;

/// Fixed-capacity line that silently stops accepting input when full
struct Line {
    text: heapless::String<LINE_CAPACITY>,
    truncated: bool,
}

impl Line {
    fn new() -> Self {
        Self {
            text: heapless::String::new(),
            truncated: false,
        }
    }

    fn finish(mut self) -> heapless::String<LINE_CAPACITY> {
        // Room for the newline is reserved in write_str
        let _ = self.text.push('\n');
        self.text
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for ch in s.chars() {
            if self.truncated || self.text.len() + ch.len_utf8() > LINE_CAPACITY - 1 {
                self.truncated = true;
                break;
            }
            let _ = self.text.push(ch);
        }
        Ok(())
    }
}

pub struct TeeLogger {
    level: LevelFilter,
    buffer: Mutex<RingBuffer>,
}

impl TeeLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self {
            level,
            buffer: Mutex::new(RingBuffer::new()),
        }
    }

    /// Move buffered log bytes into `dest`
    pub fn drain(&self, dest: &mut [u8]) -> usize {
        self.buffer.lock().read(dest)
    }

    /// Bytes waiting to be drained
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = Line::new();
        let _ = write!(line, "[{}] {}: {}", record.level(), record.target(), record.args());
        let line = line.finish();

        self.buffer.lock().write(line.as_bytes());
    }

    fn flush(&self) {}
}

/// The global logger; `init` decides what actually reaches it
static LOGGER: TeeLogger = TeeLogger::new(LevelFilter::Trace);

/// Install the buffered logger as the `log` backend
///
/// Fails if a logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    log::info!("tee logger initialized at {}", level);
    Ok(())
}

/// Drain the global log buffer into `dest`
pub fn drain(dest: &mut [u8]) -> usize {
    LOGGER.drain(dest)
}

/// Bytes buffered in the global logger
pub fn buffered() -> usize {
    LOGGER.buffered()
}
