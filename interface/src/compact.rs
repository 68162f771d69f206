//! SCALE compact integers.
//!
//! | mode | first byte | total length | range          |
//! |------|------------|--------------|----------------|
//! | 0b00 | `n << 2`   | 1            | `< 2^6`        |
//! | 0b01 | `n << 2`   | 2            | `< 2^14`       |
//! | 0b10 | `n << 2`   | 4            | `< 2^30`       |
//! | 0b11 | `(len-4)<<2` | 1 + len    | up to `2^536`  |
//!
//! The codec itself is `parity-scale-codec`'s [`Compact`]; this module adds the
//! length pre-check that lets decoding report exactly how many bytes were
//! missing.

use crate::{Error, Result};
use kite_metadata::TypeId;
use parity_scale_codec::{Compact, Decode, Encode};

pub fn encode(value: u128) -> Vec<u8> {
    Compact(value).encode()
}

pub fn encode_to(value: u128, dest: &mut Vec<u8>) {
    Compact(value).encode_to(dest)
}

/// Total length of a compact integer, derived from its first byte.
pub fn encoded_len(first_byte: u8) -> usize {
    match first_byte & 0b11 {
        0b00 => 1,
        0b01 => 2,
        0b10 => 4,
        _ => usize::from(first_byte >> 2) + 4 + 1,
    }
}

/// Decodes a compact integer, advancing `input`. `ty` is only used for error
/// reports.
pub fn decode(ty: TypeId, input: &mut &[u8]) -> Result<u128> {
    let first = *input.first().ok_or(Error::UnexpectedEof {
        ty,
        needed: 1,
        available: 0,
    })?;

    let needed = encoded_len(first);
    if input.len() < needed {
        return Err(Error::UnexpectedEof {
            ty,
            needed,
            available: input.len(),
        });
    }

    // Lengths beyond 16 bytes do not fit an `u128`.
    if needed > 17 {
        return Err(Error::InvalidEncoding {
            ty,
            reason: format!("compact integer of {} bytes exceeds 128 bits", needed - 1),
        });
    }

    let Compact(value) = Compact::<u128>::decode(input).map_err(|err| Error::InvalidEncoding {
        ty,
        reason: err.to_string(),
    })?;

    Ok(value)
}

/// Decodes a compact length prefix.
pub fn decode_len(ty: TypeId, input: &mut &[u8]) -> Result<usize> {
    let len = decode(ty, input)?;
    usize::try_from(len).map_err(|_| Error::InvalidEncoding {
        ty,
        reason: format!("length {} out of range", len),
    })
}
