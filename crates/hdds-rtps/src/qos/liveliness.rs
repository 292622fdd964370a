// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LIVELINESS QoS policy (DDS v1.4 Sec.2.2.3.11)
//!
//! # QoS Compatibility (Request vs Offered)
//!
//! - offered kind >= requested kind, with AUTOMATIC < MANUAL_BY_PARTICIPANT < MANUAL_BY_TOPIC
//! - offered lease_duration <= requested lease_duration

use std::time::Duration;

use crate::core::time::{is_infinite, DURATION_INFINITE};

/// LIVELINESS QoS kinds, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LivelinessKind {
    /// The middleware asserts on behalf of the writer.
    #[default]
    Automatic,
    /// Application asserts per participant.
    ManualByParticipant,
    /// Application asserts per writer.
    ManualByTopic,
}

impl LivelinessKind {
    /// Wire value (0, 1, 2).
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Automatic),
            1 => Some(Self::ManualByParticipant),
            2 => Some(Self::ManualByTopic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveliness {
    pub kind: LivelinessKind,
    pub lease_duration: Duration,
}

impl Default for Liveliness {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: DURATION_INFINITE,
        }
    }
}

impl Liveliness {
    #[must_use]
    pub fn new(kind: LivelinessKind, lease_duration: Duration) -> Self {
        Self {
            kind,
            lease_duration,
        }
    }

    #[must_use]
    pub fn automatic(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::Automatic, lease_duration)
    }

    #[must_use]
    pub fn manual_by_participant(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::ManualByParticipant, lease_duration)
    }

    #[must_use]
    pub fn manual_by_topic(lease_duration: Duration) -> Self {
        Self::new(LivelinessKind::ManualByTopic, lease_duration)
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        is_infinite(self.lease_duration)
    }

    #[must_use]
    pub fn is_compatible_with(&self, requested: &Liveliness) -> bool {
        if self.kind < requested.kind {
            return false;
        }
        if requested.is_infinite() {
            return true;
        }
        !self.is_infinite() && self.lease_duration <= requested.lease_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering() {
        let lease = Duration::from_secs(1);
        let topic = Liveliness::manual_by_topic(lease);
        let auto = Liveliness::automatic(lease);
        assert!(topic.is_compatible_with(&auto));
        assert!(!auto.is_compatible_with(&topic));
    }

    #[test]
    fn test_lease_rule() {
        let short = Liveliness::automatic(Duration::from_millis(100));
        let long = Liveliness::automatic(Duration::from_millis(500));
        assert!(short.is_compatible_with(&long));
        assert!(!long.is_compatible_with(&short));
        assert!(long.is_compatible_with(&Liveliness::default()));
        assert!(!Liveliness::default().is_compatible_with(&long));
    }

    #[test]
    fn test_wire_values() {
        for kind in [
            LivelinessKind::Automatic,
            LivelinessKind::ManualByParticipant,
            LivelinessKind::ManualByTopic,
        ] {
            assert_eq!(LivelinessKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(LivelinessKind::from_wire(9), None);
    }
}
