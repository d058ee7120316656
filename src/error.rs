/*
 * Driver Errors
 *
 * Local failures detected by the driver itself. Failures reported by the
 * secure world, or by the transport on the way to it, are not errors at
 * this level: they come back as a `TeeStatus` so the caller still learns the
 * remote return code and its origin.
 *
 * Taxonomy:
 * - Invalid argument: unknown session, unknown or colliding cancellation
 *   token, disallowed login, malformed caller parameters
 * - Resource exhaustion: no shared memory, no free cancellation handle
 */

use crate::session::SessionId;
use crate::shm::ShmError;

/// POSIX errno values
///
/// Subset used by the ioctl surface when it flattens a `TeeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    ENOMEM = 12, // Out of memory
    EINVAL = 22, // Invalid argument
    ENOSPC = 28, // No space left (id namespace exhausted)
}

impl Errno {
    /// Kernel-style negative return value
    pub fn as_neg(self) -> i32 {
        -(self as i32)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResourceExhausted,
}

/// Local driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeeError {
    /// Session id is not open in this context
    UnknownSession(SessionId),
    /// Another in-flight operation already registered this token
    CancelCollision(u32),
    /// No in-flight operation registered this token
    UnknownCancelToken(u32),
    /// Every cancellation handle is in use
    CancelExhausted,
    /// Login type outside the supported set
    BadLogin(u32),
    /// More caller parameters than a message may carry
    TooManyParams(usize),
    /// Caller parameter at this index can't be put on the wire
    BadParam(usize),
    /// Shared memory for the message could not be allocated
    OutOfMemory,
}

impl TeeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TeeError::CancelExhausted | TeeError::OutOfMemory => ErrorKind::ResourceExhausted,
            _ => ErrorKind::InvalidArgument,
        }
    }

    pub fn errno(&self) -> Errno {
        match self {
            TeeError::OutOfMemory => Errno::ENOMEM,
            TeeError::CancelExhausted => Errno::ENOSPC,
            _ => Errno::EINVAL,
        }
    }
}

/// Any allocator failure leaves the operation without a message buffer
///
/// `InvalidSize` only reaches the driver when the allocator hands back less
/// than the message needs, which the caller can't fix either, so both
/// variants surface as `OutOfMemory` (ENOMEM).
impl From<ShmError> for TeeError {
    fn from(err: ShmError) -> Self {
        match err {
            ShmError::OutOfMemory | ShmError::InvalidSize => TeeError::OutOfMemory,
        }
    }
}

impl core::fmt::Display for TeeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TeeError::UnknownSession(id) => write!(f, "Unknown session {}", id),
            TeeError::CancelCollision(token) => {
                write!(f, "Cancellation token 0x{:x} already in use", token)
            }
            TeeError::UnknownCancelToken(token) => {
                write!(f, "Cancellation token 0x{:x} not registered", token)
            }
            TeeError::CancelExhausted => write!(f, "No free cancellation handle"),
            TeeError::BadLogin(login) => write!(f, "Unsupported login type {}", login),
            TeeError::TooManyParams(n) => write!(f, "Too many parameters ({})", n),
            TeeError::BadParam(i) => write!(f, "Invalid parameter {}", i),
            TeeError::OutOfMemory => write!(f, "Out of shared memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_classify_into_the_two_kinds() {
        assert_eq!(TeeError::UnknownSession(SessionId(3)).kind(), ErrorKind::InvalidArgument);
        assert_eq!(TeeError::CancelCollision(7).kind(), ErrorKind::InvalidArgument);
        assert_eq!(TeeError::BadLogin(3).kind(), ErrorKind::InvalidArgument);
        assert_eq!(TeeError::OutOfMemory.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(TeeError::CancelExhausted.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn every_allocator_failure_reads_as_out_of_memory() {
        assert_eq!(TeeError::from(ShmError::OutOfMemory), TeeError::OutOfMemory);
        assert_eq!(TeeError::from(ShmError::InvalidSize), TeeError::OutOfMemory);
        assert_eq!(TeeError::from(ShmError::InvalidSize).errno(), Errno::ENOMEM);
    }

    #[test]
    fn errno_is_negative_for_the_ioctl_surface() {
        assert_eq!(TeeError::UnknownCancelToken(1).errno().as_neg(), -22);
        assert_eq!(TeeError::OutOfMemory.errno().as_neg(), -12);
        assert_eq!(TeeError::CancelExhausted.errno().as_neg(), -28);
    }
}
