// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS (Quality of Service) policies for DataWriter and DataReader
//!
//! The aggregated [`QoS`] struct carries every policy the history, delivery and
//! discovery engines look at, built fluently:
//!
//! ```
//! use hdds_rtps::qos::QoS;
//!
//! let qos = QoS::reliable().keep_last(50).transient_local();
//! assert!(qos.validate().is_ok());
//! ```

/// Deadline QoS policy - expected data update period.
pub mod deadline;
/// Lifespan QoS policy - data expiration time.
pub mod lifespan;
/// Liveliness QoS policy - writer aliveness assertions.
pub mod liveliness;
/// Ownership QoS policy - exclusive vs shared writers.
pub mod ownership;
/// Partition QoS policy - logical data separation.
pub mod partition;

use std::time::Duration;

use crate::config;

pub use deadline::Deadline;
pub use lifespan::Lifespan;
pub use liveliness::{Liveliness, LivelinessKind};
pub use ownership::{Ownership, OwnershipKind};
pub use partition::Partition;

/// Sentinel for "no limit" in [`ResourceLimits`].
pub const LENGTH_UNLIMITED: usize = usize::MAX;

/// Reliability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Fire-and-forget (no ACKs, no retransmission)
    #[default]
    BestEffort,
    /// Reliable delivery with HEARTBEAT/ACKNACK-driven retransmission
    Reliable,
}

impl Reliability {
    /// Wire value used in PID_RELIABILITY (1 = best effort, 2 = reliable).
    pub fn to_wire(self) -> u32 {
        match self {
            Self::BestEffort => 1,
            Self::Reliable => 2,
        }
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::BestEffort),
            2 | 3 => Some(Self::Reliable),
            _ => None,
        }
    }
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N samples per instance (drops oldest)
    KeepLast(u32),
    /// Keep all samples within resource limits; admission fails once full.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepLast(1)
    }
}

/// Durability policy, ordered VOLATILE < TRANSIENT_LOCAL < TRANSIENT < PERSISTENT.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Durability {
    #[default]
    Volatile,
    /// Writer keeps samples for late-joiners during its lifetime.
    TransientLocal,
    Transient,
    Persistent,
}

impl Durability {
    /// Rank used by RxO matching and as wire value.
    pub fn rank(self) -> u32 {
        match self {
            Self::Volatile => 0,
            Self::TransientLocal => 1,
            Self::Transient => 2,
            Self::Persistent => 3,
        }
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Volatile),
            1 => Some(Self::TransientLocal),
            2 => Some(Self::Transient),
            3 => Some(Self::Persistent),
            _ => None,
        }
    }
}

/// Resource limits for Writer/Reader histories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances
    pub max_samples: usize,
    /// Maximum number of distinct instances
    pub max_instances: usize,
    /// Maximum samples per instance
    pub max_samples_per_instance: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            max_instances: 10,
            max_samples_per_instance: 400,
        }
    }
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        Self {
            max_samples: LENGTH_UNLIMITED,
            max_instances: LENGTH_UNLIMITED,
            max_samples_per_instance: LENGTH_UNLIMITED,
        }
    }
}

/// Protocol timing knobs of a reliable endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReliabilityTimes {
    /// Period of the writer's HEARTBEAT while changes are unacknowledged.
    pub heartbeat_period: Duration,
    /// Delay before a writer answers an ACKNACK with repairs.
    pub nack_response_delay: Duration,
    /// Window during which the writer ignores repeated NACKs for a just-repaired change.
    pub nack_supression_duration: Duration,
    /// Delay before a reader answers a HEARTBEAT with an ACKNACK.
    pub heartbeat_response_delay: Duration,
    /// Window during which the reader ignores HEARTBEATs after answering one.
    pub heartbeat_supression_duration: Duration,
}

impl Default for ReliabilityTimes {
    fn default() -> Self {
        Self {
            heartbeat_period: config::DEFAULT_HEARTBEAT_PERIOD,
            nack_response_delay: config::DEFAULT_NACK_RESPONSE_DELAY,
            nack_supression_duration: config::DEFAULT_NACK_SUPPRESSION_DURATION,
            heartbeat_response_delay: config::DEFAULT_HEARTBEAT_RESPONSE_DELAY,
            heartbeat_supression_duration: config::DEFAULT_HEARTBEAT_SUPPRESSION_DURATION,
        }
    }
}

/// Standard DDS QoS policy ids (DDS v1.4 Sec.2.2.2.1 / PSM).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum QosPolicyId {
    Invalid = 0,
    UserData = 1,
    Durability = 2,
    Presentation = 3,
    Deadline = 4,
    LatencyBudget = 5,
    Ownership = 6,
    OwnershipStrength = 7,
    Liveliness = 8,
    TimeBasedFilter = 9,
    Partition = 10,
    Reliability = 11,
    DestinationOrder = 12,
    History = 13,
    ResourceLimits = 14,
    Lifespan = 21,
}

impl QosPolicyId {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Aggregated endpoint QoS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QoS {
    pub reliability: Reliability,
    /// How long a reliable KEEP_ALL `write` may block for a free slot.
    pub max_blocking_time: Duration,
    pub history: History,
    pub durability: Durability,
    pub resource_limits: ResourceLimits,
    pub deadline: Deadline,
    pub lifespan: Lifespan,
    pub liveliness: Liveliness,
    pub ownership: Ownership,
    pub partition: Partition,
    pub times: ReliabilityTimes,
}

impl Default for QoS {
    fn default() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            max_blocking_time: config::DEFAULT_MAX_BLOCKING_TIME,
            history: History::default(),
            durability: Durability::Volatile,
            resource_limits: ResourceLimits::default(),
            deadline: Deadline::default(),
            lifespan: Lifespan::default(),
            liveliness: Liveliness::default(),
            ownership: Ownership::default(),
            partition: Partition::default(),
            times: ReliabilityTimes::default(),
        }
    }
}

impl QoS {
    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn best_effort() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------------
    // Fluent modifiers
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    #[must_use]
    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    #[must_use]
    pub fn volatile(mut self) -> Self {
        self.durability = Durability::Volatile;
        self
    }

    #[must_use]
    pub fn transient_local(mut self) -> Self {
        self.durability = Durability::TransientLocal;
        self
    }

    #[must_use]
    pub fn transient(mut self) -> Self {
        self.durability = Durability::Transient;
        self
    }

    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.durability = Durability::Persistent;
        self
    }

    /// Sets `max_samples`, clamping `max_samples_per_instance` to stay consistent.
    #[must_use]
    pub fn max_samples(mut self, n: usize) -> Self {
        self.resource_limits.max_samples = n;
        self.resource_limits.max_samples_per_instance =
            self.resource_limits.max_samples_per_instance.min(n);
        self
    }

    #[must_use]
    pub fn max_instances(mut self, n: usize) -> Self {
        self.resource_limits.max_instances = n;
        self
    }

    #[must_use]
    pub fn max_samples_per_instance(mut self, n: usize) -> Self {
        self.resource_limits.max_samples_per_instance = n;
        self
    }

    #[must_use]
    pub fn resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }

    #[must_use]
    pub fn max_blocking_time(mut self, d: Duration) -> Self {
        self.max_blocking_time = d;
        self
    }

    #[must_use]
    pub fn deadline(mut self, period: Duration) -> Self {
        self.deadline = Deadline::new(period);
        self
    }

    #[must_use]
    pub fn lifespan(mut self, duration: Duration) -> Self {
        self.lifespan = Lifespan::new(duration);
        self
    }

    #[must_use]
    pub fn liveliness(mut self, liveliness: Liveliness) -> Self {
        self.liveliness = liveliness;
        self
    }

    #[must_use]
    pub fn liveliness_automatic(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::automatic(lease))
    }

    #[must_use]
    pub fn liveliness_manual_participant(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::manual_by_participant(lease))
    }

    #[must_use]
    pub fn liveliness_manual_topic(self, lease: Duration) -> Self {
        self.liveliness(Liveliness::manual_by_topic(lease))
    }

    #[must_use]
    pub fn ownership_exclusive(mut self) -> Self {
        self.ownership = Ownership::exclusive();
        self
    }

    #[must_use]
    pub fn partition(mut self, name: &str) -> Self {
        self.partition.names.push(name.to_string());
        self
    }

    #[must_use]
    pub fn heartbeat_period(mut self, d: Duration) -> Self {
        self.times.heartbeat_period = d;
        self
    }

    #[must_use]
    pub fn reliability_times(mut self, times: ReliabilityTimes) -> Self {
        self.times = times;
        self
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn is_reliable(&self) -> bool {
        self.reliability == Reliability::Reliable
    }

    /// Validate QoS configuration
    ///
    /// - `History::KeepLast(n)` requires n > 0
    /// - `History::KeepAll` requires `max_samples > 0`
    /// - `max_samples >= max_samples_per_instance`
    /// - KEEP_LAST depth must fit in `max_samples_per_instance`
    pub fn validate(&self) -> Result<(), String> {
        let rl = &self.resource_limits;
        if rl.max_samples == 0 || rl.max_instances == 0 || rl.max_samples_per_instance == 0 {
            return Err("ResourceLimits values must be > 0".to_string());
        }
        match self.history {
            History::KeepLast(0) => {
                return Err("History::KeepLast(n) requires n > 0".to_string());
            }
            History::KeepLast(depth) => {
                if depth as usize > rl.max_samples_per_instance {
                    return Err(format!(
                        "History::KeepLast({}) exceeds max_samples_per_instance ({})",
                        depth, rl.max_samples_per_instance
                    ));
                }
            }
            History::KeepAll => {}
        }
        if rl.max_samples < rl.max_samples_per_instance {
            return Err(format!(
                "max_samples ({}) must be >= max_samples_per_instance ({})",
                rl.max_samples, rl.max_samples_per_instance
            ));
        }
        Ok(())
    }
}
