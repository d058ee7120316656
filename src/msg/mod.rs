/*
 * Secure World Message Protocol
 *
 * This module defines the message exchanged with the secure world over the
 * shared buffer. One message carries one command and its parameters.
 *
 * Message Layout (little-endian, 32-byte header + 32 bytes per parameter):
 * - Offset 0-3:   cmd (u32)        - Command (open/invoke/close/cancel)
 * - Offset 4-7:   func (u32)       - Function id for INVOKE_COMMAND
 * - Offset 8-11:  session (u32)    - Session id
 * - Offset 12-15: cancel_id (u32)  - Cancellation handle (0 = none)
 * - Offset 16-19: pad (u32)
 * - Offset 20-23: ret (u32)        - Return code from the secure world
 * - Offset 24-27: ret_origin (u32) - Where the return code originated
 * - Offset 28-31: num_params (u32) - Number of parameters that follow
 * - Offset 32+:   params[num_params]
 */

pub mod arg;
pub mod param;

pub use arg::MsgArg;
pub use param::{AttrFlags, MsgParam, ParamType};

/// Size of the fixed message header in bytes
pub const MSG_HEADER_SIZE: usize = 32;

/// Size of one wire parameter in bytes
pub const MSG_PARAM_SIZE: usize = 32;

/// Number of meta parameters prepended to an open-session message
pub const OPEN_META_PARAMS: usize = 2;

/// Return codes (GlobalPlatform TEE Client API values)
pub const TEEC_SUCCESS: u32 = 0x0000_0000;
pub const TEEC_ERROR_COMMUNICATION: u32 = 0xFFFF_000E;

/// Return origins
pub const TEEC_ORIGIN_API: u32 = 1;
pub const TEEC_ORIGIN_COMMS: u32 = 2;
pub const TEEC_ORIGIN_TEE: u32 = 3;
pub const TEEC_ORIGIN_TRUSTED_APP: u32 = 4;

/// Size in bytes of a message carrying `num_params` parameters
pub const fn msg_arg_size(num_params: usize) -> usize {
    MSG_HEADER_SIZE + MSG_PARAM_SIZE * num_params
}

/// Message command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    OpenSession = 0,
    InvokeCommand = 1,
    CloseSession = 2,
    Cancel = 3,
}

impl Command {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Command::OpenSession),
            1 => Some(Command::InvokeCommand),
            2 => Some(Command::CloseSession),
            3 => Some(Command::Cancel),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Command::OpenSession => write!(f, "OPEN_SESSION"),
            Command::InvokeCommand => write!(f, "INVOKE_COMMAND"),
            Command::CloseSession => write!(f, "CLOSE_SESSION"),
            Command::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// Origin of a return code
///
/// Unknown raw values are kept as `Other` so a reply is never rejected just
/// because the secure world uses an origin this driver doesn't know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Api,
    Comms,
    Tee,
    TrustedApp,
    Other(u32),
}

impl Origin {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            TEEC_ORIGIN_API => Origin::Api,
            TEEC_ORIGIN_COMMS => Origin::Comms,
            TEEC_ORIGIN_TEE => Origin::Tee,
            TEEC_ORIGIN_TRUSTED_APP => Origin::TrustedApp,
            other => Origin::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Origin::Api => TEEC_ORIGIN_API,
            Origin::Comms => TEEC_ORIGIN_COMMS,
            Origin::Tee => TEEC_ORIGIN_TEE,
            Origin::TrustedApp => TEEC_ORIGIN_TRUSTED_APP,
            Origin::Other(raw) => raw,
        }
    }
}
