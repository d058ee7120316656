/*
 * Message Argument View
 *
 * Structured, bounds-checked access to a message living in a shared buffer.
 * The view never owns the memory: it borrows the writable region handed out
 * by the buffer allocator for the duration of one call.
 */

use super::param::MsgParam;
use super::{Command, Origin, MSG_HEADER_SIZE, MSG_PARAM_SIZE, msg_arg_size};
use alloc::vec::Vec;

// Header field offsets
const OFF_CMD: usize = 0;
const OFF_FUNC: usize = 4;
const OFF_SESSION: usize = 8;
const OFF_CANCEL_ID: usize = 12;
const OFF_RET: usize = 20;
const OFF_RET_ORIGIN: usize = 24;
const OFF_NUM_PARAMS: usize = 28;

/// Typed view over a message in shared memory
pub struct MsgArg<'a> {
    buf: &'a mut [u8],
}

impl<'a> MsgArg<'a> {
    /// Prepare a fresh message in `buf`
    ///
    /// Zero-fills the message area and stamps `num_params`. Returns `None` if
    /// the buffer cannot hold the header plus `num_params` parameters.
    pub fn init(buf: &'a mut [u8], num_params: usize) -> Option<Self> {
        let size = msg_arg_size(num_params);
        if buf.len() < size {
            return None;
        }
        buf[..size].fill(0);
        let mut arg = Self { buf };
        arg.set_u32(OFF_NUM_PARAMS, num_params as u32);
        Some(arg)
    }

    /// Wrap an already populated message (e.g. a reply)
    pub fn from_bytes(buf: &'a mut [u8]) -> Option<Self> {
        if buf.len() < MSG_HEADER_SIZE {
            return None;
        }
        Some(Self { buf })
    }

    /// Wrap a buffer that already passed `init`
    pub(crate) fn wrap(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    fn get_u32(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[offset..offset + 4]);
        u32::from_le_bytes(raw)
    }

    fn set_u32(&mut self, offset: usize, value: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    // Command (u32 at offset 0)
    pub fn command(&self) -> Option<Command> {
        Command::from_raw(self.get_u32(OFF_CMD))
    }

    pub fn set_command(&mut self, cmd: Command) {
        self.set_u32(OFF_CMD, cmd.as_raw());
    }

    // Function id (u32 at offset 4)
    pub fn func(&self) -> u32 {
        self.get_u32(OFF_FUNC)
    }

    pub fn set_func(&mut self, value: u32) {
        self.set_u32(OFF_FUNC, value);
    }

    // Session id (u32 at offset 8)
    pub fn session(&self) -> u32 {
        self.get_u32(OFF_SESSION)
    }

    pub fn set_session(&mut self, value: u32) {
        self.set_u32(OFF_SESSION, value);
    }

    // Cancellation handle (u32 at offset 12)
    pub fn cancel_id(&self) -> u32 {
        self.get_u32(OFF_CANCEL_ID)
    }

    pub fn set_cancel_id(&mut self, value: u32) {
        self.set_u32(OFF_CANCEL_ID, value);
    }

    // Return code (u32 at offset 20)
    pub fn ret(&self) -> u32 {
        self.get_u32(OFF_RET)
    }

    pub fn set_ret(&mut self, value: u32) {
        self.set_u32(OFF_RET, value);
    }

    // Return origin (u32 at offset 24)
    pub fn ret_origin(&self) -> Origin {
        Origin::from_raw(self.get_u32(OFF_RET_ORIGIN))
    }

    pub fn set_ret_origin(&mut self, origin: Origin) {
        self.set_u32(OFF_RET_ORIGIN, origin.as_raw());
    }

    // Parameter count (u32 at offset 28)
    pub fn num_params(&self) -> usize {
        self.get_u32(OFF_NUM_PARAMS) as usize
    }

    /// Number of parameter slots actually backed by the buffer
    fn slots(&self) -> usize {
        let backed = self.buf.len().saturating_sub(MSG_HEADER_SIZE) / MSG_PARAM_SIZE;
        backed.min(self.num_params())
    }

    fn slot_range(index: usize) -> core::ops::Range<usize> {
        let start = MSG_HEADER_SIZE + index * MSG_PARAM_SIZE;
        start..start + MSG_PARAM_SIZE
    }

    /// Read parameter `index`, or `None` past the end of the message
    pub fn param(&self, index: usize) -> Option<MsgParam> {
        if index >= self.slots() {
            return None;
        }
        Some(MsgParam::read_from(&self.buf[Self::slot_range(index)]))
    }

    /// Write parameter `index`; writes past the end of the message are ignored
    pub fn set_param(&mut self, index: usize, param: &MsgParam) {
        if index < self.slots() {
            param.write_to(&mut self.buf[Self::slot_range(index)]);
        }
    }

    /// Copy `count` parameters starting at `first` out of the message
    pub fn read_params(&self, first: usize, count: usize) -> Vec<MsgParam> {
        (first..first + count)
            .map(|i| self.param(i).unwrap_or_default())
            .collect()
    }

    /// Copy `params` into the message starting at slot `first`
    pub fn write_params(&mut self, first: usize, params: &[MsgParam]) {
        for (i, param) in params.iter().enumerate() {
            self.set_param(first + i, param);
        }
    }

    /// The message bytes as they go on the wire
    pub fn as_bytes(&self) -> &[u8] {
        let len = msg_arg_size(self.slots());
        &self.buf[..len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = msg_arg_size(self.slots());
        &mut self.buf[..len]
    }
}
