// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS RTPS configuration - single source of truth
//!
//! - **Level 1 (Static)**: compile-time constants (RTPS ports, default protocol timings)
//! - **Level 2 (Dynamic)**: [`ParticipantConfig`], built fluently or loaded from YAML
//!
//! # Example
//!
//! ```
//! use hdds_rtps::config::{port_mapping, ParticipantConfig};
//! use std::time::Duration;
//!
//! let ports = port_mapping(0, 1);
//! assert_eq!(ports.metatraffic_unicast, 7412);
//!
//! let cfg = ParticipantConfig::new("robot")
//!     .domain_id(3)
//!     .lease_duration(Duration::from_secs(5));
//! assert_eq!(cfg.domain_id, 3);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::transport::Locator;

// =======================================================================
// RTPS v2.3 Port Mapping (Sec.9.6.1.1)
// =======================================================================

/// RTPS base port (IANA registered).
pub const PORT_BASE: u16 = 7400;

/// Maximum domain ID (ports must stay below 65535).
pub const MAX_DOMAIN_ID: u32 = 232;

/// Maximum participant index per domain on one host.
pub const MAX_PARTICIPANT_ID: u32 = 119;

/// Domain gain: `PORT_BASE + DOMAIN_ID_GAIN x domain_id`.
pub const DOMAIN_ID_GAIN: u16 = 250;

/// Participant gain: `+ PARTICIPANT_ID_GAIN x participant_id` for unicast ports.
pub const PARTICIPANT_ID_GAIN: u16 = 2;

/// d0: metatraffic multicast (SPDP).
pub const SPDP_MULTICAST_OFFSET: u16 = 0;
/// d1: metatraffic unicast (SPDP/SEDP responses).
pub const METATRAFFIC_UNICAST_OFFSET: u16 = 10;
/// d2: user traffic multicast.
pub const USER_MULTICAST_OFFSET: u16 = 1;
/// d3: user traffic unicast.
pub const USER_UNICAST_OFFSET: u16 = 11;

/// Standard RTPS multicast group.
pub const MULTICAST_IP: [u8; 4] = [239, 255, 0, 1];

/// String version of MULTICAST_IP.
pub const MULTICAST_GROUP: &str = "239.255.0.1";

// =======================================================================
// Timing & Lease defaults
// =======================================================================

/// SPDP announcement period.
pub const SPDP_ANNOUNCEMENT_PERIOD: Duration = Duration::from_secs(3);

/// Participant lease duration advertised in SPDP.
pub const PARTICIPANT_LEASE_DURATION: Duration = Duration::from_secs(30);

/// Writer HEARTBEAT period while changes are unacknowledged.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(100);

/// Writer delay before answering an ACKNACK.
pub const DEFAULT_NACK_RESPONSE_DELAY: Duration = Duration::from_millis(5);

/// Writer NACK suppression window.
pub const DEFAULT_NACK_SUPPRESSION_DURATION: Duration = Duration::ZERO;

/// Reader delay before answering a HEARTBEAT.
pub const DEFAULT_HEARTBEAT_RESPONSE_DELAY: Duration = Duration::from_millis(5);

/// Reader HEARTBEAT suppression window.
pub const DEFAULT_HEARTBEAT_SUPPRESSION_DURATION: Duration = Duration::ZERO;

/// Default `reliability.max_blocking_time`.
pub const DEFAULT_MAX_BLOCKING_TIME: Duration = Duration::from_millis(100);

// =======================================================================
// Buffers
// =======================================================================

/// Largest datagram accepted by the UDP transport.
pub const MAX_PACKET_SIZE: usize = 65536;

/// Maximum bits in an ACKNACK / GAP bitmap.
pub const MAX_BITMAP_BITS: u32 = crate::protocol::seq_set::MAX_BITMAP_BITS;

// =======================================================================
// Port mapping
// =======================================================================

/// The four well-known ports of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub metatraffic_multicast: u16,
    pub metatraffic_unicast: u16,
    pub user_multicast: u16,
    pub user_unicast: u16,
}

/// Compute RTPS ports for `(domain_id, participant_id)` (Sec.9.6.1.1).
///
/// Callers validate the ids; values out of range wrap silently.
pub fn port_mapping(domain_id: u32, participant_id: u32) -> PortMapping {
    let domain_base = PORT_BASE.wrapping_add(DOMAIN_ID_GAIN.wrapping_mul(domain_id as u16));
    let participant_offset = PARTICIPANT_ID_GAIN.wrapping_mul(participant_id as u16);
    PortMapping {
        metatraffic_multicast: domain_base + SPDP_MULTICAST_OFFSET,
        metatraffic_unicast: domain_base
            .wrapping_add(METATRAFFIC_UNICAST_OFFSET)
            .wrapping_add(participant_offset),
        user_multicast: domain_base + USER_MULTICAST_OFFSET,
        user_unicast: domain_base
            .wrapping_add(USER_UNICAST_OFFSET)
            .wrapping_add(participant_offset),
    }
}

// =======================================================================
// Participant configuration
// =======================================================================

/// Runtime configuration of a `DomainParticipant`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "qos-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "qos-loaders", serde(default))]
pub struct ParticipantConfig {
    pub name: String,
    pub domain_id: u32,
    pub participant_id: u32,
    #[cfg_attr(feature = "qos-loaders", serde(with = "millis"))]
    pub lease_duration: Duration,
    #[cfg_attr(feature = "qos-loaders", serde(with = "millis"))]
    pub announcement_period: Duration,
    /// Static EDP description; when set, SEDP is not used for endpoint discovery.
    pub static_edp_xml: Option<PathBuf>,
    /// Extra unicast destinations for SPDP announcements.
    #[cfg_attr(feature = "qos-loaders", serde(skip))]
    pub initial_peers: Vec<Locator>,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            name: "hdds".to_string(),
            domain_id: 0,
            participant_id: 0,
            lease_duration: PARTICIPANT_LEASE_DURATION,
            announcement_period: SPDP_ANNOUNCEMENT_PERIOD,
            static_edp_xml: None,
            initial_peers: Vec::new(),
        }
    }
}

impl ParticipantConfig {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn domain_id(mut self, id: u32) -> Self {
        self.domain_id = id;
        self
    }

    #[must_use]
    pub fn participant_id(mut self, id: u32) -> Self {
        self.participant_id = id;
        self
    }

    #[must_use]
    pub fn lease_duration(mut self, d: Duration) -> Self {
        self.lease_duration = d;
        self
    }

    #[must_use]
    pub fn announcement_period(mut self, d: Duration) -> Self {
        self.announcement_period = d;
        self
    }

    #[must_use]
    pub fn static_edp_xml(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_edp_xml = Some(path.into());
        self
    }

    #[must_use]
    pub fn initial_peer(mut self, locator: Locator) -> Self {
        self.initial_peers.push(locator);
        self
    }

    /// Check ranges and timing consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.domain_id > MAX_DOMAIN_ID {
            return Err(format!(
                "domain_id {} out of range (0-{})",
                self.domain_id, MAX_DOMAIN_ID
            ));
        }
        if self.participant_id > MAX_PARTICIPANT_ID {
            return Err(format!(
                "participant_id {} out of range (0-{})",
                self.participant_id, MAX_PARTICIPANT_ID
            ));
        }
        if self.announcement_period.is_zero() {
            return Err("announcement_period must be > 0".to_string());
        }
        if self.lease_duration <= self.announcement_period {
            return Err(format!(
                "lease_duration ({:?}) must exceed announcement_period ({:?})",
                self.lease_duration, self.announcement_period
            ));
        }
        Ok(())
    }

    /// Parse from YAML (all keys optional, durations in milliseconds).
    ///
    /// ```yaml
    /// name: robot
    /// domain_id: 3
    /// lease_duration: 5000
    /// static_edp_xml: /etc/hdds/static.xml
    /// ```
    #[cfg(feature = "qos-loaders")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        let cfg: Self =
            serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse YAML: {}", e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "qos-loaders")]
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, String> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read {}: {}", path.as_ref().display(), e))?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(feature = "qos-loaders")]
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
