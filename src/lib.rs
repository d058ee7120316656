/*
 * CLUU TEE Client Driver
 *
 * Client-side mediator between callers and the secure world. The secure
 * world is only reachable through a narrow, blocking message channel; this
 * crate keeps the per-context bookkeeping that makes that channel usable:
 *
 * - Session registry: sessions the secure world reported as open
 * - Cancellation index: caller tokens mapped to wire-level handles
 * - Call protocol: open / invoke / close / cancel, each sequencing buffer
 *   acquisition, channel I/O, registry mutation and compensating cleanup
 *
 * The transport, the shared-memory allocator and the parameter codec are
 * collaborators behind traits (`Channel`, `ShmAllocator`, `ParamCodec`).
 * Reference implementations (`ShmPool`, `DefaultCodec`) are provided.
 *
 * Concurrency model:
 * - Every operation runs synchronously on the calling thread
 * - Registry and index locks are never held across a channel call
 * - Buffers and cancellation registrations are scoped guards, released on
 *   every exit path
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod call;
pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod login;
pub mod msg;
pub mod param;
pub mod session;
pub mod shm;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export the driver-facing API
pub use call::{LocalFault, OpenSessionArg, OpenSessionOutcome, TeeContext, TeeStatus};
pub use cancel::{CancelHandle, CancelIndex};
pub use channel::{Channel, ChannelError};
pub use config::TeeConfig;
pub use error::{Errno, ErrorKind, TeeError};
pub use login::{LoginType, Uuid};
pub use msg::{Command, Origin};
pub use param::{DefaultCodec, Direction, Param, ParamCodec};
pub use session::{Session, SessionId, SessionRegistry};
pub use shm::{ShmAllocator, ShmBuffer, ShmError, ShmPool};
