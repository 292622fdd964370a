// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Listener Traits and communication statuses
//!
//! Listeners provide callback-based notification for DDS entity events.
//! Every hook has a default no-op implementation; a listener is attached together
//! with a [`StatusMask`] naming the statuses it wants.
//!
//! # Cascade
//!
//! When a status changes on a writer, the listener that receives it is the first
//! one, walking writer -> publisher -> participant, whose mask enables that status.
//! Readers walk reader -> subscriber -> participant the same way.
//!
//! # Thread Safety
//!
//! Listeners are called from background threads (receive, timer). They must be
//! `Send + Sync`, should not block, and are never invoked with an endpoint lock held.
//!
//! # DDS Specification
//!
//! See DDS v1.4 Section 2.2.4 - Listeners, Conditions, and Wait-sets.

use std::sync::Arc;

use crate::core::cache_change::SequenceNumber;
use crate::core::guid::{InstanceHandle, GUID};
use crate::qos::QosPolicyId;

// ============================================================================
// Statuses
// ============================================================================

/// Status information for subscription matching events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMatchedStatus {
    /// Total cumulative count of matched publications.
    pub total_count: u32,
    /// Change in total_count since the status was last read.
    pub total_count_change: i32,
    /// Current number of matched publications.
    pub current_count: u32,
    /// Change in current_count since the status was last read.
    pub current_count_change: i32,
    /// GUID of the last matched/unmatched publication.
    pub last_publication_handle: Option<GUID>,
}

/// Status information for publication matching events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationMatchedStatus {
    /// Total cumulative count of matched subscriptions.
    pub total_count: u32,
    /// Change in total_count since the status was last read.
    pub total_count_change: i32,
    /// Current number of matched subscriptions.
    pub current_count: u32,
    /// Change in current_count since the status was last read.
    pub current_count_change: i32,
    /// GUID of the last matched/unmatched subscription.
    pub last_subscription_handle: Option<GUID>,
}

/// Status information for liveliness changes of matched writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivelinessChangedStatus {
    /// Number of matched publications currently alive.
    pub alive_count: u32,
    pub alive_count_change: i32,
    /// Number of matched publications that lost liveliness.
    pub not_alive_count: u32,
    pub not_alive_count_change: i32,
    /// GUID of the last publication to change liveliness.
    pub last_publication_handle: Option<GUID>,
}

/// A local writer failed to assert its liveliness in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivelinessLostStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

/// Status information for sample lost events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleLostStatus {
    /// Total cumulative count of lost samples.
    pub total_count: u32,
    pub total_count_change: i32,
}

/// Reason why a sample was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRejectedReason {
    #[default]
    NotRejected,
    /// `max_instances` reached.
    RejectedByInstancesLimit,
    /// `max_samples` reached.
    RejectedBySamplesLimit,
    /// `max_samples_per_instance` reached.
    RejectedBySamplesPerInstanceLimit,
}

/// Status information for sample rejected events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleRejectedStatus {
    /// Total cumulative count of rejected samples (once per distinct sequence number).
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_reason: SampleRejectedReason,
    pub last_instance_handle: InstanceHandle,
    /// Sequence number of the last rejected sample.
    pub last_seq_num: SequenceNumber,
}

/// Deadline missed (offered on writers, requested on readers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    /// Instance that missed the deadline.
    pub last_instance_handle: InstanceHandle,
}

pub type OfferedDeadlineMissedStatus = DeadlineMissedStatus;
pub type RequestedDeadlineMissedStatus = DeadlineMissedStatus;

/// Per-policy counter inside [`IncompatibleQosStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosPolicyCount {
    pub policy_id: QosPolicyId,
    pub count: u32,
}

/// Incompatible QoS (offered on writers, requested on readers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleQosStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    /// First failing policy of the last incompatible match attempt.
    pub last_policy_id: QosPolicyId,
    pub policies: Vec<QosPolicyCount>,
}

impl Default for IncompatibleQosStatus {
    fn default() -> Self {
        Self {
            total_count: 0,
            total_count_change: 0,
            last_policy_id: QosPolicyId::Invalid,
            policies: Vec::new(),
        }
    }
}

impl IncompatibleQosStatus {
    pub(crate) fn record(&mut self, policy: QosPolicyId) {
        self.total_count += 1;
        self.total_count_change += 1;
        self.last_policy_id = policy;
        match self.policies.iter_mut().find(|p| p.policy_id == policy) {
            Some(entry) => entry.count += 1,
            None => self.policies.push(QosPolicyCount {
                policy_id: policy,
                count: 1,
            }),
        }
    }
}

pub type OfferedIncompatibleQosStatus = IncompatibleQosStatus;
pub type RequestedIncompatibleQosStatus = IncompatibleQosStatus;

// ============================================================================
// Status mask
// ============================================================================

/// Set of communication statuses (DDS v1.4 Sec.2.2.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusMask(pub u32);

impl StatusMask {
    pub const NONE: Self = Self(0);
    pub const OFFERED_DEADLINE_MISSED: Self = Self(1 << 1);
    pub const REQUESTED_DEADLINE_MISSED: Self = Self(1 << 2);
    pub const OFFERED_INCOMPATIBLE_QOS: Self = Self(1 << 5);
    pub const REQUESTED_INCOMPATIBLE_QOS: Self = Self(1 << 6);
    pub const SAMPLE_LOST: Self = Self(1 << 7);
    pub const SAMPLE_REJECTED: Self = Self(1 << 8);
    pub const DATA_ON_READERS: Self = Self(1 << 9);
    pub const DATA_AVAILABLE: Self = Self(1 << 10);
    pub const LIVELINESS_LOST: Self = Self(1 << 11);
    pub const LIVELINESS_CHANGED: Self = Self(1 << 12);
    pub const PUBLICATION_MATCHED: Self = Self(1 << 13);
    pub const SUBSCRIPTION_MATCHED: Self = Self(1 << 14);
    pub const ALL: Self = Self(0xFFFF);

    pub fn contains(self, other: StatusMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StatusMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// Listener traits
// ============================================================================

/// Listener for DataWriter events. `writer` identifies the local writer.
pub trait DataWriterListener: Send + Sync {
    fn on_publication_matched(&self, writer: GUID, status: &PublicationMatchedStatus) {
        let _ = (writer, status);
    }

    fn on_offered_incompatible_qos(&self, writer: GUID, status: &OfferedIncompatibleQosStatus) {
        let _ = (writer, status);
    }

    fn on_offered_deadline_missed(&self, writer: GUID, status: &OfferedDeadlineMissedStatus) {
        let _ = (writer, status);
    }

    /// MANUAL_BY_* writers only.
    fn on_liveliness_lost(&self, writer: GUID, status: &LivelinessLostStatus) {
        let _ = (writer, status);
    }
}

/// Listener for DataReader events. `reader` identifies the local reader.
pub trait DataReaderListener: Send + Sync {
    /// New samples can be read or taken.
    fn on_data_available(&self, reader: GUID) {
        let _ = reader;
    }

    fn on_subscription_matched(&self, reader: GUID, status: &SubscriptionMatchedStatus) {
        let _ = (reader, status);
    }

    fn on_requested_incompatible_qos(
        &self,
        reader: GUID,
        status: &RequestedIncompatibleQosStatus,
    ) {
        let _ = (reader, status);
    }

    fn on_sample_rejected(&self, reader: GUID, status: &SampleRejectedStatus) {
        let _ = (reader, status);
    }

    fn on_sample_lost(&self, reader: GUID, status: &SampleLostStatus) {
        let _ = (reader, status);
    }

    fn on_requested_deadline_missed(&self, reader: GUID, status: &RequestedDeadlineMissedStatus) {
        let _ = (reader, status);
    }

    fn on_liveliness_changed(&self, reader: GUID, status: &LivelinessChangedStatus) {
        let _ = (reader, status);
    }
}

/// Publisher-level listener: receives the writer statuses its writers do not handle.
pub trait PublisherListener: DataWriterListener {}

impl<T: DataWriterListener> PublisherListener for T {}

/// Subscriber-level listener.
pub trait SubscriberListener: DataReaderListener {
    /// Some reader of this subscriber has new data; takes precedence over
    /// `on_data_available` when enabled in the mask.
    fn on_data_on_readers(&self, subscriber: GUID) {
        let _ = subscriber;
    }
}

/// Participant-level listener: the last resort of both cascades.
pub trait DomainParticipantListener: DataWriterListener + DataReaderListener {}

impl<T: DataWriterListener + DataReaderListener> DomainParticipantListener for T {}

// ============================================================================
// Cascade
// ============================================================================

/// A listener attached to one entity together with its mask.
pub(crate) struct Attached<L: ?Sized> {
    pub listener: Arc<L>,
    pub mask: StatusMask,
}

impl<L: ?Sized> Clone for Attached<L> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            mask: self.mask,
        }
    }
}

/// Walk the chain (entity first, participant last) and return the first listener
/// whose mask enables `status`.
pub(crate) fn resolve<L: ?Sized>(
    chain: &[Option<&Attached<L>>],
    status: StatusMask,
) -> Option<Arc<L>> {
    chain
        .iter()
        .flatten()
        .find(|a| a.mask.contains(status))
        .map(|a| Arc::clone(&a.listener))
}
