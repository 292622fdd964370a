// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DEADLINE QoS policy (DDS v1.4 Sec.2.2.3.7)
//!
//! Maximum period between two samples of the same instance.
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! **Rule:** Writer offers <= Reader requests
//!
//! - Writer offers 100ms, Reader requests 200ms -> Compatible \[OK\]
//! - Writer offers 200ms, Reader requests 100ms -> Incompatible \[X\]
//!
//! # Examples
//!
//! ```
//! use hdds_rtps::qos::deadline::Deadline;
//! use std::time::Duration;
//!
//! let offered = Deadline::new(Duration::from_millis(100));
//! let requested = Deadline::from_millis(200);
//! assert!(offered.is_compatible_with(&requested));
//! ```

use std::time::Duration;

use crate::core::time::{is_infinite, DURATION_INFINITE};

/// DEADLINE QoS policy. Default: infinite (no enforcement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub period: Duration,
}

impl Default for Deadline {
    fn default() -> Self {
        Self {
            period: DURATION_INFINITE,
        }
    }
}

impl Deadline {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Check if deadline is infinite (no enforcement)
    pub fn is_infinite(&self) -> bool {
        is_infinite(self.period)
    }

    /// Offered (self, writer) vs requested (reader).
    pub fn is_compatible_with(&self, requested: &Deadline) -> bool {
        if requested.is_infinite() {
            return true;
        }
        !self.is_infinite() && self.period <= requested.period
    }
}
