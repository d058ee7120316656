/*
 * Wire Parameters
 *
 * Each message parameter is 32 bytes: a 64-bit attribute word followed by
 * three 64-bit payload words. The payload is interpreted according to the
 * attribute type:
 *
 * - Value:     a, b, c are plain 64-bit values
 * - Temp mem:  a = buffer physical address, b = size, c = shm reference
 *
 * Attribute word layout:
 * - Bits 0-7: parameter type
 * - Bit 8:    META (parameter synthesized by the driver, not the caller)
 */

use bitflags::bitflags;

/// Mask selecting the type field of the attribute word
pub const ATTR_TYPE_MASK: u64 = 0xff;

bitflags! {
    /// Attribute flags above the type field
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttrFlags: u64 {
        const META = 1 << 8;
    }
}

/// Parameter type (low byte of the attribute word)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ParamType {
    None = 0x0,
    ValueInput = 0x1,
    ValueOutput = 0x2,
    ValueInout = 0x3,
    TmemInput = 0x9,
    TmemOutput = 0xa,
    TmemInout = 0xb,
}

impl ParamType {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0x0 => Some(ParamType::None),
            0x1 => Some(ParamType::ValueInput),
            0x2 => Some(ParamType::ValueOutput),
            0x3 => Some(ParamType::ValueInout),
            0x9 => Some(ParamType::TmemInput),
            0xa => Some(ParamType::TmemOutput),
            0xb => Some(ParamType::TmemInout),
            _ => None,
        }
    }
}

/// One wire parameter, copied out of (or into) the shared buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgParam {
    pub attr: u64,
    pub a: u64,
    pub b: u64,
    pub c: u64,
}

impl MsgParam {
    pub fn new(ty: ParamType, flags: AttrFlags, a: u64, b: u64, c: u64) -> Self {
        Self {
            attr: ty as u64 | flags.bits(),
            a,
            b,
            c,
        }
    }

    /// Decoded type, or `None` if the type field holds an unknown value
    pub fn param_type(&self) -> Option<ParamType> {
        ParamType::from_raw(self.attr & ATTR_TYPE_MASK)
    }

    pub fn flags(&self) -> AttrFlags {
        AttrFlags::from_bits_truncate(self.attr & !ATTR_TYPE_MASK)
    }

    pub fn is_meta(&self) -> bool {
        self.flags().contains(AttrFlags::META)
    }

    /// Serialize into a 32-byte slot
    pub fn write_to(&self, slot: &mut [u8]) {
        slot[0..8].copy_from_slice(&self.attr.to_le_bytes());
        slot[8..16].copy_from_slice(&self.a.to_le_bytes());
        slot[16..24].copy_from_slice(&self.b.to_le_bytes());
        slot[24..32].copy_from_slice(&self.c.to_le_bytes());
    }

    /// Deserialize from a 32-byte slot
    pub fn read_from(slot: &[u8]) -> Self {
        Self {
            attr: read_u64(slot, 0),
            a: read_u64(slot, 8),
            b: read_u64(slot, 16),
            c: read_u64(slot, 24),
        }
    }
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
