/*
 * Secure World Call Protocol
 *
 * One `TeeContext` per open device file. It owns the context's session
 * registry and cancellation index and drives the four operations:
 *
 * - open_session: buffer -> cancel registration -> meta params -> login
 *   check -> encode -> call -> register session -> decode (compensating
 *   close if the caller can't be told about the new session)
 * - invoke_func:  session check -> buffer -> cancel registration -> encode
 *   -> call -> decode
 * - close_session: remove from registry (committed) -> buffer -> call,
 *   transport failures only logged
 * - cancel_req:   optional session check -> token lookup -> buffer -> send
 *   (one-way, no reply)
 *
 * Buffers (`MsgBuffer`) and cancellation registrations
 * (`CancelRegistration`) are guards, so every exit path releases them.
 * Neither the registry lock nor the index lock is held across channel I/O.
 *
 * Nothing here retries. A failed call is reported once, as a local fault.
 */

pub mod status;


pub use status::{LocalFault, OpenSessionOutcome, TeeStatus};

use crate::cancel::CancelIndex;
use crate::channel::{Channel, ChannelError};
use crate::config::TeeConfig;
use crate::error::TeeError;
use crate::login::{self, LoginType, Uuid};
use crate::msg::{
    Command, MsgArg, MsgParam, OPEN_META_PARAMS, Origin, TEEC_ERROR_COMMUNICATION,
};
use crate::param::{DefaultCodec, Param, ParamCodec};
use crate::session::{Session, SessionId, SessionRegistry};
use crate::shm::{MsgBuffer, ShmAllocator};
use alloc::vec;
use alloc::vec::Vec;

/// Open session request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSessionArg {
    /// Trusted application to open
    pub uuid: Uuid,
    /// Client identity, ignored for public logins
    pub client_uuid: Uuid,
    /// Raw login method, validated against `LoginType`
    pub login: u32,
    /// Cancellation token (0 = not cancellable)
    pub cancel_id: u32,
}

impl OpenSessionArg {
    pub fn new(uuid: Uuid, login: LoginType) -> Self {
        Self {
            uuid,
            client_uuid: Uuid::NIL,
            login: login.as_raw(),
            cancel_id: 0,
        }
    }

    pub fn with_client(mut self, client_uuid: Uuid) -> Self {
        self.client_uuid = client_uuid;
        self
    }

    pub fn with_cancel_id(mut self, cancel_id: u32) -> Self {
        self.cancel_id = cancel_id;
        self
    }
}

/// Per-context driver state
pub struct TeeContext<C: Channel, A: ShmAllocator, P: ParamCodec = DefaultCodec> {
    channel: C,
    allocator: A,
    codec: P,
    sessions: SessionRegistry,
    cancels: CancelIndex,
    config: TeeConfig,
}

impl<C: Channel, A: ShmAllocator> TeeContext<C, A, DefaultCodec> {
    /// Create a context using the default parameter codec
    pub fn new(channel: C, allocator: A, config: TeeConfig) -> Self {
        let codec = DefaultCodec::new(config.shm_base);
        Self::with_codec(channel, allocator, codec, config)
    }
}

impl<C: Channel, A: ShmAllocator, P: ParamCodec> TeeContext<C, A, P> {
    pub fn with_codec(channel: C, allocator: A, codec: P, config: TeeConfig) -> Self {
        log::debug!("tee context created ({:?})", config);
        Self {
            channel,
            allocator,
            codec,
            sessions: SessionRegistry::new(),
            cancels: CancelIndex::new(config.cancel_handle_limit),
            config,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn codec(&self) -> &P {
        &self.codec
    }

    pub fn config(&self) -> &TeeConfig {
        &self.config
    }

    pub fn cancels(&self) -> &CancelIndex {
        &self.cancels
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of the sessions currently open in this context
    pub fn sessions(&self) -> Vec<SessionId> {
        self.sessions.ids()
    }

    fn check_param_count(&self, count: usize) -> Result<(), TeeError> {
        if count > self.config.max_params {
            return Err(TeeError::TooManyParams(count));
        }
        Ok(())
    }

    /// Blocking request/response exchange
    ///
    /// Stamps `cmd` into the message. A transport failure is stamped into
    /// the message as COMMUNICATION / COMMS and reported as a local fault.
    fn call_with_arg(&self, cmd: Command, msg: &mut MsgArg<'_>) -> TeeStatus {
        msg.set_command(cmd);
        log::debug!(
            "call {} sess {} cancel {}",
            cmd,
            msg.session(),
            msg.cancel_id()
        );

        match self.channel.call(msg.as_bytes_mut()) {
            Ok(()) => TeeStatus::Remote {
                code: msg.ret(),
                origin: msg.ret_origin(),
            },
            Err(err) => {
                log::error!("call failed cmd {} sess {} err {}", cmd, msg.session(), err);
                msg.set_ret(TEEC_ERROR_COMMUNICATION);
                msg.set_ret_origin(Origin::Comms);
                TeeStatus::Local(LocalFault::Transport(err))
            }
        }
    }

    /// One-way post; nothing comes back
    fn send_with_arg(&self, cmd: Command, msg: &mut MsgArg<'_>) -> Result<(), ChannelError> {
        msg.set_command(cmd);
        log::debug!(
            "send {} sess {} cancel {}",
            cmd,
            msg.session(),
            msg.cancel_id()
        );
        self.channel.send(msg.as_bytes())
    }

    fn encode_params(&self, params: &[Param]) -> Result<Vec<MsgParam>, TeeError> {
        let mut wire = vec![MsgParam::default(); params.len()];
        self.codec.encode(params, &mut wire)?;
        Ok(wire)
    }

    /// Open a session with the trusted application `arg.uuid`
    ///
    /// Local validation failures come back as `Err`. Once the message has
    /// gone out, the result is an `OpenSessionOutcome`: `session` is set
    /// only if the session is registered here and the caller may use it.
    pub fn open_session(
        &self,
        arg: &OpenSessionArg,
        params: &mut [Param],
    ) -> Result<OpenSessionOutcome, TeeError> {
        log::debug!(
            "open_session uuid {} login {} cancel 0x{:x}",
            arg.uuid,
            arg.login,
            arg.cancel_id
        );
        self.check_param_count(params.len())?;

        // +2 for the meta parameters added below
        let mut shm = MsgBuffer::acquire(&self.allocator, params.len() + OPEN_META_PARAMS)?;
        let cancel = self.cancels.register_scoped(arg.cancel_id)?;

        let mut msg = shm.arg();
        msg.set_cancel_id(cancel.handle().0);
        msg.set_param(0, &login::target_identity(&arg.uuid));

        let login = match LoginType::from_raw(arg.login) {
            Some(login) => login,
            None => {
                log::error!("open_session: unsupported login type {}", arg.login);
                return Err(TeeError::BadLogin(arg.login));
            }
        };
        msg.set_param(1, &login::client_identity(login, &arg.client_uuid));

        let wire = self.encode_params(params)?;
        msg.write_params(OPEN_META_PARAMS, &wire);

        let mut status = self.call_with_arg(Command::OpenSession, &mut msg);

        let mut created = None;
        if status.is_success() {
            // A new session has been created, add it to the registry
            let id = SessionId(msg.session());
            match self.sessions.add(Session::new(id)) {
                Ok(()) => created = Some(id),
                Err(err) => {
                    log::error!("open_session: {}", err);
                    status = TeeStatus::Local(LocalFault::DuplicateSession(id));
                }
            }
        }

        let reply = msg.read_params(OPEN_META_PARAMS, params.len());
        if let Err(err) = self.codec.decode(params, &reply) {
            log::debug!("open_session: {} (sess {})", err, msg.session());
            if !status.is_local() {
                status = TeeStatus::Local(LocalFault::Decode);
            }
            // Close the session again so it doesn't leak in the secure world
            if let Some(id) = created.take() {
                if let Err(close_err) = self.close_session(id) {
                    log::warn!("open_session: compensating close of {} failed: {}", id, close_err);
                }
            }
        }

        log::debug!("open_session done sess {:?} {}", created, status);
        Ok(OpenSessionOutcome {
            session: created,
            status,
        })
    }

    /// Invoke function `func` of an open session
    pub fn invoke_func(
        &self,
        session: SessionId,
        func: u32,
        cancel_id: u32,
        params: &mut [Param],
    ) -> Result<TeeStatus, TeeError> {
        log::debug!(
            "invoke_func {} func 0x{:x} cancel 0x{:x}",
            session,
            func,
            cancel_id
        );

        // Check that the session is valid. Nothing pins it past this point:
        // a concurrent close may still win, the secure world then refuses.
        if self.sessions.find(session).is_none() {
            return Err(TeeError::UnknownSession(session));
        }
        self.check_param_count(params.len())?;

        let mut shm = MsgBuffer::acquire(&self.allocator, params.len())?;
        let cancel = self.cancels.register_scoped(cancel_id)?;

        let mut msg = shm.arg();
        msg.set_func(func);
        msg.set_session(session.0);
        msg.set_cancel_id(cancel.handle().0);

        let wire = self.encode_params(params)?;
        msg.write_params(0, &wire);

        let mut status = self.call_with_arg(Command::InvokeCommand, &mut msg);

        let reply = msg.read_params(0, params.len());
        if let Err(err) = self.codec.decode(params, &reply) {
            log::debug!("invoke_func: {} ({})", err, session);
            if !status.is_local() {
                status = TeeStatus::Local(LocalFault::Decode);
            }
        }

        log::debug!("invoke_func done {} {}", session, status);
        Ok(status)
    }

    /// Close an open session
    ///
    /// The session is gone from this context as soon as this returns `Ok`,
    /// whatever the secure world made of the notification.
    pub fn close_session(&self, session: SessionId) -> Result<(), TeeError> {
        log::debug!("close_session {}", session);

        // Check that the session is valid and remove it from the registry
        self.sessions
            .remove(session)
            .ok_or(TeeError::UnknownSession(session))?;

        self.notify_close(session)
    }

    /// Tell the secure world a session is closed (already removed locally)
    fn notify_close(&self, session: SessionId) -> Result<(), TeeError> {
        let mut shm = match MsgBuffer::acquire(&self.allocator, 0) {
            Ok(shm) => shm,
            Err(err) => {
                log::warn!("close {}: secure world not notified: {}", session, err);
                return Err(err.into());
            }
        };

        let mut msg = shm.arg();
        msg.set_session(session.0);

        let status = self.call_with_arg(Command::CloseSession, &mut msg);
        if !status.is_success() {
            log::warn!("close {} not acknowledged: {}", session, status);
        }

        log::debug!("close_session done {}", session);
        Ok(())
    }

    /// Ask the secure world to cancel the operation registered under `cancel_id`
    ///
    /// `session` is `None` (or 0) when cancelling an open that has no session
    /// yet. Success means the request was posted; it is advisory and never
    /// acknowledged.
    pub fn cancel_req(&self, cancel_id: u32, session: Option<SessionId>) -> Result<(), TeeError> {
        let session = session.filter(|s| s.0 != 0);
        log::debug!("cancel_req {:?} cancel 0x{:x}", session, cancel_id);

        // For open session a session does not exist yet; check it if given
        if let Some(id) = session {
            if self.sessions.find(id).is_none() {
                return Err(TeeError::UnknownSession(id));
            }
        }

        let handle = self
            .cancels
            .lookup(cancel_id)
            .ok_or(TeeError::UnknownCancelToken(cancel_id))?;

        let mut shm = MsgBuffer::acquire(&self.allocator, 0)?;
        let mut msg = shm.arg();
        msg.set_session(session.map_or(0, |s| s.0));
        msg.set_cancel_id(handle.0);

        if let Err(err) = self.send_with_arg(Command::Cancel, &mut msg) {
            log::warn!("cancel 0x{:x} ({}) not delivered: {}", cancel_id, handle, err);
        }
        Ok(())
    }

    /// Tear the context down: close every session still open
    ///
    /// Returns the number of sessions that were closed. Notification
    /// failures are logged and otherwise ignored.
    pub fn release(&self) -> usize {
        let sessions = self.sessions.drain();
        log::debug!("release: closing {} session(s)", sessions.len());

        for session in &sessions {
            if let Err(err) = self.notify_close(session.id) {
                log::warn!("release: {}: {}", session.id, err);
            }
        }
        sessions.len()
    }
}
