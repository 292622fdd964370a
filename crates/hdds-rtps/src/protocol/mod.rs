// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS wire protocol
//!
//! This module contains the wire-level building blocks used by the delivery engines
//! and discovery:
//! - Constants: submessage ids, flags, parameter ids
//! - `RtpsMessage` header + submessage framing
//! - DATA / HEARTBEAT / ACKNACK / GAP / INFO_TS / INFO_DST codecs
//! - `SequenceNumberSet` (MSB-first bitmap, max 256 bits)
//! - Parameter lists (PL_CDR) and the 4-byte encapsulation header

mod codec;
pub mod constants;
pub mod encapsulation;
pub mod message;
pub mod parameter;
pub mod seq_set;
pub mod submessage;

pub use encapsulation::EncapsulationKind;
pub use message::{Header, RtpsMessage};
pub use parameter::ParameterList;
pub use seq_set::SequenceNumberSet;
pub use submessage::{AckNack, Data, Gap, Heartbeat, InfoDst, InfoTs, InlineQos, Submessage};

/// Wire decoding failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer ended before a complete field.
    Truncated,
    /// RTPS or encapsulation header is not acceptable.
    InvalidHeader(&'static str),
    /// A submessage body violates its format.
    InvalidSubmessage(&'static str),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "truncated buffer"),
            DecodeError::InvalidHeader(why) => write!(f, "invalid header: {}", why),
            DecodeError::InvalidSubmessage(why) => write!(f, "invalid submessage: {}", why),
        }
    }
}

impl std::error::Error for DecodeError {}
