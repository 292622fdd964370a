// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wall-clock timestamps and duration helpers.
//!
//! Source timestamps travel on the wire as RTPS `Time_t` (seconds + 2^-32 fractions).
//! Durations use `std::time::Duration` where `Duration::from_secs(u64::MAX)` is infinite,
//! the same convention as the QoS policies.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Infinite duration marker shared by all QoS policies.
pub const DURATION_INFINITE: Duration = Duration::from_secs(u64::MAX);

/// Returns true if the duration represents "infinite".
#[inline]
pub fn is_infinite(d: Duration) -> bool {
    d.as_secs() >= i32::MAX as u64
}

/// Wall-clock timestamp (nanoseconds since UNIX epoch).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    nanos: u64,
}

impl Timestamp {
    pub const ZERO: Self = Self { nanos: 0 };

    /// Current wall-clock time.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self { nanos }
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Encode as RTPS `Time_t` (seconds, fraction).
    pub fn to_wire(&self) -> (i32, u32) {
        let secs = (self.nanos / 1_000_000_000) as i32;
        let sub = self.nanos % 1_000_000_000;
        let fraction = ((sub << 32) / 1_000_000_000) as u32;
        (secs, fraction)
    }

    /// Decode from RTPS `Time_t`.
    pub fn from_wire(seconds: i32, fraction: u32) -> Self {
        let secs = seconds.max(0) as u64;
        let sub = (u64::from(fraction) * 1_000_000_000) >> 32;
        Self {
            nanos: secs * 1_000_000_000 + sub,
        }
    }

    /// Saturating addition of a duration.
    pub fn saturating_add(&self, d: Duration) -> Self {
        if is_infinite(d) {
            return Self { nanos: u64::MAX };
        }
        Self {
            nanos: self.nanos.saturating_add(d.as_nanos() as u64),
        }
    }

    /// Time elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

/// Encode a duration as RTPS `Duration_t` (seconds, fraction), mapping infinite to
/// `{0x7fffffff, 0xffffffff}`.
pub fn duration_to_wire(d: Duration) -> (i32, u32) {
    if is_infinite(d) {
        return (0x7fff_ffff, 0xffff_ffff);
    }
    let secs = d.as_secs() as i32;
    let fraction = ((u64::from(d.subsec_nanos()) << 32) / 1_000_000_000) as u32;
    (secs, fraction)
}

/// Decode an RTPS `Duration_t`.
pub fn duration_from_wire(seconds: i32, fraction: u32) -> Duration {
    if seconds == 0x7fff_ffff && fraction == 0xffff_ffff {
        return DURATION_INFINITE;
    }
    let secs = seconds.max(0) as u64;
    let nanos = (u64::from(fraction) * 1_000_000_000) >> 32;
    Duration::new(secs, nanos as u32)
}
