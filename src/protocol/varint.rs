//! Unsigned base-128 varints
//!
//! Seven bits per byte, least-significant group first. Every byte except the
//! last has its high bit set.

use bytes::{Buf, BufMut};

use super::codec::{CodecError, CodecResult};

/// Longest encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded
pub fn varint_size(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Append `value` to `buf`
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read one varint from the front of `buf`
pub fn get_varint<B: Buf>(buf: &mut B) -> CodecResult<u64> {
    let mut value = 0u64;

    for index in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(CodecError::TruncatedInput {
                needed: 1,
                remaining: 0,
            });
        }

        let byte = buf.get_u8();
        let group = (byte & 0x7F) as u64;
        let shift = 7 * index as u32;

        // The tenth byte may only carry the top bit of a u64
        if index == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(CodecError::VarintOverflow);
        }

        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(CodecError::VarintOverflow)
}
