/*
 * Call Status
 *
 * Outcome of a message that made it past local validation. Either the
 * secure world answered (`Remote`, with its return code and origin), or the
 * driver lost the exchange on its side (`Local`). At the legacy boundary
 * every local fault collapses into COMMUNICATION / COMMS.
 */

use crate::channel::ChannelError;
use crate::msg::{Origin, TEEC_ERROR_COMMUNICATION, TEEC_ORIGIN_COMMS, TEEC_SUCCESS};
use crate::session::SessionId;

/// Driver-side failure of an otherwise valid exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFault {
    /// The channel failed the call
    Transport(ChannelError),
    /// The reply parameters could not be decoded into the caller's
    Decode,
    /// The secure world reported a session id that is already open here
    DuplicateSession(SessionId),
}

impl core::fmt::Display for LocalFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LocalFault::Transport(err) => write!(f, "transport: {}", err),
            LocalFault::Decode => write!(f, "reply decode failed"),
            LocalFault::DuplicateSession(id) => write!(f, "duplicate {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeStatus {
    Remote { code: u32, origin: Origin },
    Local(LocalFault),
}

impl TeeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TeeStatus::Remote { code: TEEC_SUCCESS, .. })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, TeeStatus::Local(_))
    }

    /// Flatten into the legacy `(ret, ret_origin)` pair
    pub fn to_legacy(&self) -> (u32, u32) {
        match self {
            TeeStatus::Remote { code, origin } => (*code, origin.as_raw()),
            TeeStatus::Local(_) => (TEEC_ERROR_COMMUNICATION, TEEC_ORIGIN_COMMS),
        }
    }

    pub fn ret(&self) -> u32 {
        self.to_legacy().0
    }

    pub fn ret_origin(&self) -> u32 {
        self.to_legacy().1
    }
}

impl core::fmt::Display for TeeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TeeStatus::Remote { code, origin } => {
                write!(f, "ret 0x{:08x} origin {}", code, origin.as_raw())
            }
            TeeStatus::Local(fault) => write!(f, "local fault ({})", fault),
        }
    }
}

/// Result of an open that reached the secure world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSessionOutcome {
    /// Set only if the session is now registered in this context
    pub session: Option<SessionId>,
    pub status: TeeStatus,
}

impl OpenSessionOutcome {
    /// Legacy session field (0 when no session was opened)
    pub fn session_id(&self) -> u32 {
        self.session.map_or(0, |s| s.0)
    }

    pub fn ret(&self) -> u32 {
        self.status.ret()
    }

    pub fn ret_origin(&self) -> u32 {
        self.status.ret_origin()
    }
}
