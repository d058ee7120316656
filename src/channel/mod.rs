/*
 * Secure World Message Channel
 *
 * The narrow transport to the secure world. Two primitives are offered and
 * they are deliberately distinct:
 *
 * - `call`: request/response. Blocks the calling thread until the secure
 *   world replies; the reply is written back into the same message buffer.
 * - `send`: one-way. Posts the message and returns without waiting for (or
 *   expecting) any reply. Only cancellation uses it.
 *
 * Implementations must be usable from many threads at once; the driver
 * never holds one of its own locks while inside either primitive.
 */

/// Channel transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer went away or the channel was never connected
    Disconnected,
    /// The message doesn't fit the channel's frame size
    MessageTooLarge,
    /// The reply was malformed or truncated
    BadReply,
    /// Transport-specific failure code
    Io(i32),
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelError::Disconnected => write!(f, "Channel disconnected"),
            ChannelError::MessageTooLarge => write!(f, "Message too large"),
            ChannelError::BadReply => write!(f, "Malformed reply"),
            ChannelError::Io(code) => write!(f, "Channel I/O error {}", code),
        }
    }
}

/// Blocking request/response + one-way transport
pub trait Channel: Send + Sync {
    /// Send `msg` and block until the reply has been written back into it
    fn call(&self, msg: &mut [u8]) -> Result<(), ChannelError>;

    /// Post `msg` without waiting for a reply
    fn send(&self, msg: &[u8]) -> Result<(), ChannelError>;
}
