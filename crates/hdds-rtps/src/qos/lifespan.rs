// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LIFESPAN QoS policy (DDS v1.4 Sec.2.2.3.16)
//!
//! Samples older than `source_timestamp + duration` are dropped from both the writer's
//! and the reader's history. Lifespan is not part of RxO matching.

use std::time::Duration;

use crate::core::time::{is_infinite, Timestamp, DURATION_INFINITE};

/// LIFESPAN QoS policy. Default: infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifespan {
    pub duration: Duration,
}

impl Default for Lifespan {
    fn default() -> Self {
        Self {
            duration: DURATION_INFINITE,
        }
    }
}

impl Lifespan {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn is_infinite(&self) -> bool {
        is_infinite(self.duration)
    }

    /// Expiration instant of a sample stamped `source`.
    pub fn expiry_of(&self, source: Timestamp) -> Timestamp {
        source.saturating_add(self.duration)
    }

    /// True once `now` is past the sample's expiration.
    pub fn is_expired(&self, source: Timestamp, now: Timestamp) -> bool {
        !self.is_infinite() && now > self.expiry_of(source)
    }
}
