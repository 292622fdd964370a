// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serialized payload encapsulation header (RTPS 2.3 Sec.10).
//!
//! Four octets prefix every serialized payload: one reserved octet, the encapsulation
//! kind, then two option octets.

use super::DecodeError;

/// Encapsulation kinds carried in the second octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncapsulationKind {
    CdrBe = 0x00,
    CdrLe = 0x01,
    PlCdrBe = 0x02,
    PlCdrLe = 0x03,
}

impl EncapsulationKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::CdrBe),
            0x01 => Some(Self::CdrLe),
            0x02 => Some(Self::PlCdrBe),
            0x03 => Some(Self::PlCdrLe),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_little_endian(self) -> bool {
        matches!(self, Self::CdrLe | Self::PlCdrLe)
    }

    #[must_use]
    pub fn is_parameter_list(self) -> bool {
        matches!(self, Self::PlCdrBe | Self::PlCdrLe)
    }
}

/// Length of the encapsulation header.
pub const ENCAPSULATION_HEADER_LEN: usize = 4;

/// The 4-byte header for `kind`.
pub fn header(kind: EncapsulationKind) -> [u8; ENCAPSULATION_HEADER_LEN] {
    [0x00, kind as u8, 0x00, 0x00]
}

/// Prefix `body` with the encapsulation header and pad it to a 4-byte boundary.
///
/// The number of padding octets is stored in the two low bits of the options field
/// so [`split`] returns exactly `body`.
pub fn encapsulate(kind: EncapsulationKind, body: &[u8]) -> Vec<u8> {
    let pad = (4 - body.len() % 4) % 4;
    let mut out = Vec::with_capacity(ENCAPSULATION_HEADER_LEN + body.len() + pad);
    out.extend_from_slice(&header(kind));
    out[3] = pad as u8;
    out.extend_from_slice(body);
    out.resize(out.len() + pad, 0);
    out
}

/// Split a serialized payload into its kind and body (padding removed).
pub fn split(payload: &[u8]) -> Result<(EncapsulationKind, &[u8]), DecodeError> {
    if payload.len() < ENCAPSULATION_HEADER_LEN {
        return Err(DecodeError::Truncated);
    }
    let kind = EncapsulationKind::from_u8(payload[1])
        .ok_or(DecodeError::InvalidHeader("unknown encapsulation kind"))?;
    let body = &payload[ENCAPSULATION_HEADER_LEN..];
    let pad = (payload[3] & 0x03) as usize;
    Ok((kind, &body[..body.len().saturating_sub(pad)]))
}
