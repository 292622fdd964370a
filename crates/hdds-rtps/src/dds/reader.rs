// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed DataReader handle.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use super::listener::{
    DataReaderListener, DeadlineMissedStatus, IncompatibleQosStatus, LivelinessChangedStatus,
    SampleLostStatus, SampleRejectedStatus, StatusMask, SubscriptionMatchedStatus,
};
use super::participant::sinks::{attach, ReaderSink};
use super::participant::Inner;
use super::type_support::{self, TopicType};
use super::{Error, Result};
use crate::core::cache_change::{CacheChange, SequenceNumber};
use crate::core::guid::{InstanceHandle, GUID};
use crate::core::history::{InstanceState, SampleInfo};
use crate::core::reader::StatefulReader;
use crate::qos::QoS;

/// One sample returned by `read` / `take`.
///
/// `data` is `None` for dispose / unregister notifications
/// (`info.valid_data == false`).
#[derive(Debug, Clone)]
pub struct Sample<T> {
    pub data: Option<T>,
    pub info: SampleInfo,
}

/// Receives samples of `T` from every matched writer on one topic.
pub struct DataReader<T: TopicType> {
    // Kept so the handle reports AlreadyDeleted once the participant is gone.
    participant: Weak<Inner>,
    guid: GUID,
    engine: Weak<StatefulReader>,
    sink: Arc<ReaderSink>,
    _type: PhantomData<fn() -> T>,
}

impl<T: TopicType> DataReader<T> {
    pub(crate) fn new(
        participant: Weak<Inner>,
        guid: GUID,
        engine: &Arc<StatefulReader>,
        sink: Arc<ReaderSink>,
    ) -> Self {
        Self {
            participant,
            guid,
            engine: Arc::downgrade(engine),
            sink,
            _type: PhantomData,
        }
    }

    fn engine(&self) -> Result<Arc<StatefulReader>> {
        if self.participant.strong_count() == 0 {
            return Err(Error::AlreadyDeleted);
        }
        self.engine
            .upgrade()
            .filter(|engine| !engine.is_closed())
            .ok_or(Error::AlreadyDeleted)
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn qos(&self) -> Result<QoS> {
        Ok(self.engine()?.qos().clone())
    }

    fn convert(&self, (change, info): (CacheChange, SampleInfo)) -> Option<Sample<T>> {
        if !info.valid_data {
            return Some(Sample { data: None, info });
        }
        match type_support::decode::<T>(&change.payload) {
            Ok(data) => Some(Sample {
                data: Some(data),
                info,
            }),
            Err(e) => {
                log::warn!(
                    "[reader] {} dropped undecodable sample {}:{}: {}",
                    self.guid,
                    change.writer_guid,
                    change.sequence_number,
                    e
                );
                None
            }
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Up to `max` samples, leaving them in the history marked READ.
    pub fn read(&self, max: usize) -> Result<Vec<Sample<T>>> {
        let changes = self.engine()?.read(max);
        Ok(changes.into_iter().filter_map(|c| self.convert(c)).collect())
    }

    /// Up to `max` samples, removing them from the history.
    pub fn take(&self, max: usize) -> Result<Vec<Sample<T>>> {
        let changes = self.engine()?.take(max);
        Ok(changes.into_iter().filter_map(|c| self.convert(c)).collect())
    }

    /// Oldest NOT_READ sample.
    pub fn read_next_sample(&self) -> Result<Option<Sample<T>>> {
        Ok(self.engine()?.read_next().and_then(|c| self.convert(c)))
    }

    /// Oldest NOT_READ sample, removed from the history.
    pub fn take_next_sample(&self) -> Result<Option<Sample<T>>> {
        Ok(self.engine()?.take_next().and_then(|c| self.convert(c)))
    }

    /// Samples currently held.
    pub fn history_len(&self) -> Result<usize> {
        Ok(self.engine()?.history_len())
    }

    pub fn instance_state(&self, instance: &InstanceHandle) -> Result<Option<InstanceState>> {
        Ok(self.engine()?.instance_state(instance))
    }

    pub fn lookup_instance(&self, sample: &T) -> InstanceHandle {
        type_support::instance_of(sample)
    }

    // ========================================================================
    // Matching & status
    // ========================================================================

    pub fn matched_publications(&self) -> Result<Vec<GUID>> {
        Ok(self.engine()?.matched_writers())
    }

    /// Highest contiguous sequence number received from `writer`.
    pub fn writer_floor(&self, writer: &GUID) -> Result<Option<SequenceNumber>> {
        Ok(self.engine()?.writer_floor(writer))
    }

    pub fn subscription_matched_status(&self) -> Result<SubscriptionMatchedStatus> {
        Ok(self.engine()?.subscription_matched_status())
    }

    pub fn requested_incompatible_qos_status(&self) -> Result<IncompatibleQosStatus> {
        Ok(self.engine()?.requested_incompatible_qos_status())
    }

    pub fn requested_deadline_missed_status(&self) -> Result<DeadlineMissedStatus> {
        Ok(self.engine()?.requested_deadline_missed_status())
    }

    pub fn sample_lost_status(&self) -> Result<SampleLostStatus> {
        Ok(self.engine()?.sample_lost_status())
    }

    pub fn sample_rejected_status(&self) -> Result<SampleRejectedStatus> {
        Ok(self.engine()?.sample_rejected_status())
    }

    pub fn liveliness_changed_status(&self) -> Result<LivelinessChangedStatus> {
        Ok(self.engine()?.liveliness_changed_status())
    }

    pub fn set_listener<L: DataReaderListener + 'static>(&self, listener: Arc<L>, mask: StatusMask) {
        attach(&self.sink.own, Some(listener as Arc<dyn DataReaderListener>), mask);
    }

    pub fn clear_listener(&self) {
        self.sink.own.store(None);
    }
}
