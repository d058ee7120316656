/*
 * Instrumented Test Doubles
 *
 * Fakes for the driver's collaborators that record what the driver did to
 * them, so tests can check the wire traffic and the acquire/release balance
 * of every operation:
 *
 * - ScriptedChannel: answers calls with a configurable status, hands out
 *   session ids, records every call and send, can park one call mid-flight
 * - CountingAllocator: ShmPool with acquire/release counters and injected
 *   allocation failures
 * - FlakyCodec: DefaultCodec that can be told to fail encoding or decoding
 */

use crate::call::TeeContext;
use crate::channel::{Channel, ChannelError};
use crate::config::TeeConfig;
use crate::error::TeeError;
use crate::msg::{Command, MsgArg, MsgParam, Origin, ParamType, TEEC_SUCCESS};
use crate::param::{DecodeError, DefaultCodec, Param, ParamCodec};
use crate::shm::{ShmAllocator, ShmBuffer, ShmError, ShmPool};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::vec::Vec;

/// Value the fake secure world writes into output value parameters
pub const REPLY_VALUE: u64 = 0x600d;

/// Header and parameters of one message as the channel saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub cmd: Option<Command>,
    pub func: u32,
    pub session: u32,
    pub cancel_id: u32,
    pub params: Vec<MsgParam>,
}

impl Sent {
    fn capture(arg: &MsgArg<'_>) -> Self {
        Self {
            cmd: arg.command(),
            func: arg.func(),
            session: arg.session(),
            cancel_id: arg.cancel_id(),
            params: arg.read_params(0, arg.num_params()),
        }
    }
}

/// Two-step rendezvous used to hold a call inside the channel
pub struct Gate {
    pub entered: Barrier,
    pub release: Barrier,
}

pub struct ScriptedChannel {
    next_session: AtomicU32,
    ret: AtomicU32,
    origin: AtomicU32,
    fail_calls: AtomicBool,
    fail_sends: AtomicBool,
    calls: Mutex<Vec<Sent>>,
    sends: Mutex<Vec<Sent>>,
    park: Mutex<Option<Arc<Gate>>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            next_session: AtomicU32::new(0x100),
            ret: AtomicU32::new(TEEC_SUCCESS),
            origin: AtomicU32::new(Origin::Tee.as_raw()),
            fail_calls: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            park: Mutex::new(None),
        }
    }

    /// Session id the next successful open will report
    pub fn set_next_session(&self, id: u32) {
        self.next_session.store(id, Ordering::SeqCst);
    }

    pub fn set_reply(&self, ret: u32, origin: Origin) {
        self.ret.store(ret, Ordering::SeqCst);
        self.origin.store(origin.as_raw(), Ordering::SeqCst);
    }

    pub fn fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Hold the next call inside the channel until the gate is released
    pub fn park_next_call(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        *self.park.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Sent> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<Sent> {
        self.sends.lock().unwrap().clone()
    }

    pub fn calls_of(&self, cmd: Command) -> Vec<Sent> {
        self.calls().into_iter().filter(|s| s.cmd == Some(cmd)).collect()
    }
}

impl Channel for ScriptedChannel {
    fn call(&self, msg: &mut [u8]) -> Result<(), ChannelError> {
        let mut arg = MsgArg::from_bytes(msg).ok_or(ChannelError::BadReply)?;
        self.calls.lock().unwrap().push(Sent::capture(&arg));

        let gate = self.park.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.wait();
            gate.release.wait();
        }

        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(ChannelError::Disconnected);
        }

        let ret = self.ret.load(Ordering::SeqCst);
        if arg.command() == Some(Command::OpenSession) && ret == TEEC_SUCCESS {
            arg.set_session(self.next_session.fetch_add(1, Ordering::SeqCst));
        }
        arg.set_ret(ret);
        arg.set_ret_origin(Origin::from_raw(self.origin.load(Ordering::SeqCst)));

        for i in 0..arg.num_params() {
            if let Some(mut p) = arg.param(i) {
                if !p.is_meta()
                    && matches!(
                        p.param_type(),
                        Some(ParamType::ValueOutput) | Some(ParamType::ValueInout)
                    )
                {
                    p.a = REPLY_VALUE;
                    arg.set_param(i, &p);
                }
            }
        }
        Ok(())
    }

    fn send(&self, msg: &[u8]) -> Result<(), ChannelError> {
        let mut copy = msg.to_vec();
        let arg = MsgArg::from_bytes(&mut copy).ok_or(ChannelError::BadReply)?;
        self.sends.lock().unwrap().push(Sent::capture(&arg));

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::Io(-32));
        }
        Ok(())
    }
}

pub struct CountingAllocator {
    pool: ShmPool,
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_next: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self {
            pool: ShmPool::new(0x4000_0000, 64 * 1024),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` allocations fail
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ShmAllocator for CountingAllocator {
    fn alloc(&self, size: usize) -> Result<ShmBuffer, ShmError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ShmError::OutOfMemory);
        }
        let buffer = self.pool.alloc(size)?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(buffer)
    }

    fn free(&self, buffer: ShmBuffer) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.pool.free(buffer);
    }
}

pub struct FlakyCodec {
    inner: DefaultCodec,
    fail_encode: AtomicBool,
    fail_decode: AtomicBool,
}

impl FlakyCodec {
    pub fn new(shm_base: u64) -> Self {
        Self {
            inner: DefaultCodec::new(shm_base),
            fail_encode: AtomicBool::new(false),
            fail_decode: AtomicBool::new(false),
        }
    }

    /// Reject the first caller parameter on encode
    pub fn fail_encode(&self, fail: bool) {
        self.fail_encode.store(fail, Ordering::SeqCst);
    }

    pub fn fail_decode(&self, fail: bool) {
        self.fail_decode.store(fail, Ordering::SeqCst);
    }
}

impl ParamCodec for FlakyCodec {
    fn encode(&self, params: &[Param], wire: &mut [MsgParam]) -> Result<(), TeeError> {
        if self.fail_encode.load(Ordering::SeqCst) {
            return Err(TeeError::BadParam(0));
        }
        self.inner.encode(params, wire)
    }

    fn decode(&self, params: &mut [Param], wire: &[MsgParam]) -> Result<(), DecodeError> {
        if self.fail_decode.load(Ordering::SeqCst) {
            return Err(DecodeError { index: 0 });
        }
        self.inner.decode(params, wire)
    }
}

pub type TestContext = TeeContext<ScriptedChannel, CountingAllocator, FlakyCodec>;

pub fn context() -> TestContext {
    context_with(TeeConfig::default())
}

pub fn context_with(config: TeeConfig) -> TestContext {
    TeeContext::with_codec(
        ScriptedChannel::new(),
        CountingAllocator::new(),
        FlakyCodec::new(config.shm_base),
        config,
    )
}

/// Every buffer went back and no cancellation entry is left behind
pub fn assert_balanced(ctx: &TestContext) {
    assert_eq!(
        ctx.allocator().acquired(),
        ctx.allocator().released(),
        "buffer acquire/release mismatch"
    );
    assert!(ctx.cancels().is_empty(), "cancellation entry leaked");
}
