// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed DataWriter handle.
//!
//! Serialization happens here; everything else is delegated to the participant's
//! [`StatefulWriter`] engine.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::listener::{
    DataWriterListener, DeadlineMissedStatus, IncompatibleQosStatus, LivelinessLostStatus,
    PublicationMatchedStatus, StatusMask,
};
use super::participant::Inner;
use super::participant::sinks::{attach, WriterSink};
use super::type_support::{self, TopicType};
use super::{Error, Result};
use crate::core::cache_change::{ChangeKind, SequenceNumber};
use crate::core::guid::{InstanceHandle, GUID};
use crate::core::time::Timestamp;
use crate::core::writer::StatefulWriter;
use crate::qos::{LivelinessKind, QoS};

/// Publishes samples of `T` on one topic.
///
/// The handle does not own the writer: it stays alive until deleted through its
/// publisher or participant, or until the participant is dropped.
pub struct DataWriter<T: TopicType> {
    participant: Weak<Inner>,
    guid: GUID,
    topic: String,
    engine: Weak<StatefulWriter>,
    sink: Arc<WriterSink>,
    _type: PhantomData<fn(T)>,
}

impl<T: TopicType> DataWriter<T> {
    pub(crate) fn new(
        participant: Weak<Inner>,
        guid: GUID,
        topic: &str,
        engine: &Arc<StatefulWriter>,
        sink: Arc<WriterSink>,
    ) -> Self {
        Self {
            participant,
            guid,
            topic: topic.to_string(),
            engine: Arc::downgrade(engine),
            sink,
            _type: PhantomData,
        }
    }

    fn engine(&self) -> Result<Arc<StatefulWriter>> {
        self.engine
            .upgrade()
            .filter(|engine| !engine.is_closed())
            .ok_or(Error::AlreadyDeleted)
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    pub fn qos(&self) -> Result<QoS> {
        Ok(self.engine()?.qos().clone())
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Publish one sample, stamped now. Returns its sequence number.
    ///
    /// # Errors
    ///
    /// - [`Error::SerializationError`] if `T` cannot be encoded
    /// - [`Error::Timeout`] / [`Error::ResourceLimitExceeded`] when the history
    ///   stays full (see `max_blocking_time`)
    pub fn write(&self, sample: &T) -> Result<SequenceNumber> {
        self.write_w_timestamp(sample, Timestamp::now())
    }

    pub fn write_w_timestamp(&self, sample: &T, timestamp: Timestamp) -> Result<SequenceNumber> {
        let engine = self.engine()?;
        let payload: Arc<[u8]> = Arc::from(type_support::encode(sample)?);
        let instance = type_support::instance_of(sample);
        self.publish(&engine, ChangeKind::Alive, instance, payload, timestamp)
    }

    /// Mark the instance of `key` disposed.
    ///
    /// # Errors
    ///
    /// [`Error::PreconditionNotMet`] for a topic without key.
    pub fn dispose(&self, key: &T) -> Result<SequenceNumber> {
        self.lifecycle(key, ChangeKind::NotAliveDisposed)
    }

    /// Tell readers this writer no longer updates the instance of `key`.
    pub fn unregister_instance(&self, key: &T) -> Result<SequenceNumber> {
        self.lifecycle(key, ChangeKind::NotAliveUnregistered)
    }

    fn lifecycle(&self, key: &T, kind: ChangeKind) -> Result<SequenceNumber> {
        if !T::has_key() {
            return Err(Error::PreconditionNotMet(format!(
                "{} has no key",
                T::type_name()
            )));
        }
        let engine = self.engine()?;
        let payload: Arc<[u8]> = Arc::from(type_support::encode_key(key));
        let instance = type_support::instance_of(key);
        self.publish(&engine, kind, instance, payload, Timestamp::now())
    }

    fn publish(
        &self,
        engine: &StatefulWriter,
        kind: ChangeKind,
        instance: InstanceHandle,
        payload: Arc<[u8]>,
        timestamp: Timestamp,
    ) -> Result<SequenceNumber> {
        let seq = engine.write_change(kind, instance, payload, timestamp)?;
        if engine.qos().liveliness.kind != LivelinessKind::Automatic {
            if let Some(participant) = self.participant.upgrade() {
                participant.assert_local_liveliness(&self.guid);
            }
        }
        Ok(seq)
    }

    /// Instance handle `sample` is published under.
    pub fn lookup_instance(&self, sample: &T) -> InstanceHandle {
        type_support::instance_of(sample)
    }

    /// Block until every matched reliable reader acknowledged all writes so far.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if `timeout` elapses first.
    pub fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        self.engine()?.wait_for_acknowledgments(timeout)
    }

    /// Manual liveliness assertion.
    pub fn assert_liveliness(&self) -> Result<()> {
        let engine = self.engine()?;
        if let Some(participant) = self.participant.upgrade() {
            participant.assert_local_liveliness(&self.guid);
        }
        engine.assert_liveliness();
        Ok(())
    }

    // ========================================================================
    // Matching & status
    // ========================================================================

    pub fn matched_subscriptions(&self) -> Result<Vec<GUID>> {
        Ok(self.engine()?.matched_readers())
    }

    pub fn publication_matched_status(&self) -> Result<PublicationMatchedStatus> {
        Ok(self.engine()?.publication_matched_status())
    }

    pub fn offered_incompatible_qos_status(&self) -> Result<IncompatibleQosStatus> {
        Ok(self.engine()?.offered_incompatible_qos_status())
    }

    pub fn offered_deadline_missed_status(&self) -> Result<DeadlineMissedStatus> {
        Ok(self.engine()?.offered_deadline_missed_status())
    }

    pub fn liveliness_lost_status(&self) -> Result<LivelinessLostStatus> {
        Ok(self.engine()?.liveliness_lost_status())
    }

    /// Highest sequence number `reader` acknowledged, if it is matched.
    pub fn reader_highest_acked(&self, reader: &GUID) -> Result<Option<SequenceNumber>> {
        Ok(self.engine()?.reader_highest_acked(reader))
    }

    /// Writes refused because the history stayed full.
    pub fn rejected_count(&self) -> Result<u64> {
        Ok(self.engine()?.rejected_count())
    }

    pub fn set_listener<L: DataWriterListener + 'static>(&self, listener: Arc<L>, mask: StatusMask) {
        attach(&self.sink.own, Some(listener as Arc<dyn DataWriterListener>), mask);
    }

    pub fn clear_listener(&self) {
        self.sink.own.store(None);
    }
}
