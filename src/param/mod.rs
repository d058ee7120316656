/*
 * Caller Parameters and Parameter Codec
 *
 * Callers describe their parameters with `Param`; the wire carries
 * `MsgParam`. A `ParamCodec` converts between the two in both directions:
 *
 * - encode: caller params -> wire params, before the call
 * - decode: wire params -> caller params, after the reply (output values,
 *   updated memory reference sizes)
 *
 * `DefaultCodec` places memory references as temporary memory at
 * `shm_base + offset`, the physical address of the caller's slice of shared
 * memory.
 */

use crate::error::TeeError;
use crate::msg::{AttrFlags, MsgParam, ParamType};

/// Data direction as seen from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
    InOut,
}

/// Caller-visible parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Param {
    #[default]
    None,
    Value {
        dir: Direction,
        a: u64,
        b: u64,
        c: u64,
    },
    Memref {
        dir: Direction,
        /// Offset into the shared memory area
        shm_offs: u64,
        size: u64,
        /// Reference to the shared memory object the slice belongs to
        shm_id: u64,
    },
}

impl Param {
    pub fn value_input(a: u64, b: u64, c: u64) -> Self {
        Param::Value { dir: Direction::Input, a, b, c }
    }

    pub fn value_output() -> Self {
        Param::Value { dir: Direction::Output, a: 0, b: 0, c: 0 }
    }

    pub fn value_inout(a: u64, b: u64, c: u64) -> Self {
        Param::Value { dir: Direction::InOut, a, b, c }
    }

    pub fn memref(dir: Direction, shm_id: u64, shm_offs: u64, size: u64) -> Self {
        Param::Memref { dir, shm_offs, size, shm_id }
    }

    /// Wire type this parameter encodes to
    pub fn wire_type(&self) -> ParamType {
        match self {
            Param::None => ParamType::None,
            Param::Value { dir: Direction::Input, .. } => ParamType::ValueInput,
            Param::Value { dir: Direction::Output, .. } => ParamType::ValueOutput,
            Param::Value { dir: Direction::InOut, .. } => ParamType::ValueInout,
            Param::Memref { dir: Direction::Input, .. } => ParamType::TmemInput,
            Param::Memref { dir: Direction::Output, .. } => ParamType::TmemOutput,
            Param::Memref { dir: Direction::InOut, .. } => ParamType::TmemInout,
        }
    }
}

/// Reply parameter that doesn't fit the caller's parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub index: usize,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Reply parameter {} does not match request", self.index)
    }
}

/// Marshalling between caller parameters and wire parameters
pub trait ParamCodec: Send + Sync {
    /// Fill `wire` (same length as `params`) from the caller's parameters
    fn encode(&self, params: &[Param], wire: &mut [MsgParam]) -> Result<(), TeeError>;

    /// Copy reply data from `wire` back into the caller's parameters
    fn decode(&self, params: &mut [Param], wire: &[MsgParam]) -> Result<(), DecodeError>;
}

/// Codec for values and temporary memory references
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec {
    shm_base: u64,
}

impl DefaultCodec {
    pub fn new(shm_base: u64) -> Self {
        Self { shm_base }
    }
}

impl ParamCodec for DefaultCodec {
    fn encode(&self, params: &[Param], wire: &mut [MsgParam]) -> Result<(), TeeError> {
        if wire.len() < params.len() {
            return Err(TeeError::BadParam(wire.len()));
        }

        for (i, (param, slot)) in params.iter().zip(wire.iter_mut()).enumerate() {
            let ty = param.wire_type();
            *slot = match *param {
                Param::None => MsgParam::default(),
                Param::Value { a, b, c, .. } => MsgParam::new(ty, AttrFlags::empty(), a, b, c),
                Param::Memref { shm_offs, size, shm_id, .. } => {
                    let paddr = self
                        .shm_base
                        .checked_add(shm_offs)
                        .ok_or(TeeError::BadParam(i))?;
                    paddr.checked_add(size).ok_or(TeeError::BadParam(i))?;
                    MsgParam::new(ty, AttrFlags::empty(), paddr, size, shm_id)
                }
            };
        }
        Ok(())
    }

    fn decode(&self, params: &mut [Param], wire: &[MsgParam]) -> Result<(), DecodeError> {
        if wire.len() < params.len() {
            return Err(DecodeError { index: wire.len() });
        }

        for (index, (param, mp)) in params.iter_mut().zip(wire.iter()).enumerate() {
            if mp.param_type() != Some(param.wire_type()) {
                return Err(DecodeError { index });
            }
            match param {
                Param::None => {}
                Param::Value { dir: Direction::Input, .. } => {}
                Param::Value { a, b, c, .. } => {
                    *a = mp.a;
                    *b = mp.b;
                    *c = mp.c;
                }
                Param::Memref { size, .. } => {
                    *size = mp.b;
                }
            }
        }
        Ok(())
    }
}
