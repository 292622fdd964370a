// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine status sinks that walk the listener cascade.
//!
//! Each level (endpoint, publisher/subscriber, participant) holds its listener in
//! an [`ArcSwapOption`] so it can be replaced while engines are running; the
//! sinks load all levels on every event and call the first one whose mask
//! enables the status.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::core::guid::GUID;
use crate::core::reader::ReaderStatusSink;
use crate::core::writer::WriterStatusSink;
use crate::dds::listener::{
    resolve, Attached, DataReaderListener, DataWriterListener, DeadlineMissedStatus,
    IncompatibleQosStatus, LivelinessChangedStatus, LivelinessLostStatus,
    PublicationMatchedStatus, SampleLostStatus, SampleRejectedStatus, StatusMask,
    SubscriberListener, SubscriptionMatchedStatus,
};

pub(crate) type Slot<L> = ArcSwapOption<Attached<L>>;

pub(crate) fn attach<L: ?Sized>(slot: &Slot<L>, listener: Option<Arc<L>>, mask: StatusMask) {
    slot.store(listener.map(|listener| Arc::new(Attached { listener, mask })));
}

/// Participant-level listener, seen from both cascades.
#[derive(Default)]
pub(crate) struct ParticipantSlots {
    pub writer: Slot<dyn DataWriterListener>,
    pub reader: Slot<dyn DataReaderListener>,
}

/// Subscriber-level listener: the reader view plus `on_data_on_readers`.
#[derive(Default)]
pub(crate) struct SubscriberSlots {
    pub reader: Slot<dyn DataReaderListener>,
    pub on_readers: Slot<dyn SubscriberListener>,
}

// ============================================================================
// Writer
// ============================================================================

pub(crate) struct WriterSink {
    pub own: Slot<dyn DataWriterListener>,
    pub publisher: Arc<Slot<dyn DataWriterListener>>,
    pub participant: Arc<ParticipantSlots>,
}

impl WriterSink {
    pub fn new(
        publisher: Arc<Slot<dyn DataWriterListener>>,
        participant: Arc<ParticipantSlots>,
    ) -> Self {
        Self {
            own: ArcSwapOption::empty(),
            publisher,
            participant,
        }
    }

    fn dispatch(&self, status: StatusMask, call: impl FnOnce(&dyn DataWriterListener)) -> bool {
        let own = self.own.load();
        let publisher = self.publisher.load();
        let participant = self.participant.writer.load();
        match resolve(
            &[own.as_deref(), publisher.as_deref(), participant.as_deref()],
            status,
        ) {
            Some(listener) => {
                call(listener.as_ref());
                true
            }
            None => false,
        }
    }
}

impl WriterStatusSink for WriterSink {
    fn publication_matched(&self, writer: GUID, status: &PublicationMatchedStatus) -> bool {
        self.dispatch(StatusMask::PUBLICATION_MATCHED, |l| {
            l.on_publication_matched(writer, status)
        })
    }

    fn offered_incompatible_qos(&self, writer: GUID, status: &IncompatibleQosStatus) -> bool {
        self.dispatch(StatusMask::OFFERED_INCOMPATIBLE_QOS, |l| {
            l.on_offered_incompatible_qos(writer, status)
        })
    }

    fn offered_deadline_missed(&self, writer: GUID, status: &DeadlineMissedStatus) -> bool {
        self.dispatch(StatusMask::OFFERED_DEADLINE_MISSED, |l| {
            l.on_offered_deadline_missed(writer, status)
        })
    }

    fn liveliness_lost(&self, writer: GUID, status: &LivelinessLostStatus) -> bool {
        self.dispatch(StatusMask::LIVELINESS_LOST, |l| l.on_liveliness_lost(writer, status))
    }
}

// ============================================================================
// Reader
// ============================================================================

pub(crate) struct ReaderSink {
    pub own: Slot<dyn DataReaderListener>,
    pub subscriber_guid: GUID,
    pub subscriber: Arc<SubscriberSlots>,
    pub participant: Arc<ParticipantSlots>,
}

impl ReaderSink {
    pub fn new(
        subscriber_guid: GUID,
        subscriber: Arc<SubscriberSlots>,
        participant: Arc<ParticipantSlots>,
    ) -> Self {
        Self {
            own: ArcSwapOption::empty(),
            subscriber_guid,
            subscriber,
            participant,
        }
    }

    fn dispatch(&self, status: StatusMask, call: impl FnOnce(&dyn DataReaderListener)) -> bool {
        let own = self.own.load();
        let subscriber = self.subscriber.reader.load();
        let participant = self.participant.reader.load();
        match resolve(
            &[own.as_deref(), subscriber.as_deref(), participant.as_deref()],
            status,
        ) {
            Some(listener) => {
                call(listener.as_ref());
                true
            }
            None => false,
        }
    }
}

impl ReaderStatusSink for ReaderSink {
    fn data_available(&self, reader: GUID) {
        // DATA_ON_READERS on the subscriber takes precedence over DATA_AVAILABLE.
        let on_readers = self.subscriber.on_readers.load();
        if let Some(attached) = on_readers
            .as_deref()
            .filter(|a| a.mask.contains(StatusMask::DATA_ON_READERS))
        {
            attached.listener.on_data_on_readers(self.subscriber_guid);
            return;
        }
        self.dispatch(StatusMask::DATA_AVAILABLE, |l| l.on_data_available(reader));
    }

    fn subscription_matched(&self, reader: GUID, status: &SubscriptionMatchedStatus) -> bool {
        self.dispatch(StatusMask::SUBSCRIPTION_MATCHED, |l| {
            l.on_subscription_matched(reader, status)
        })
    }

    fn requested_incompatible_qos(&self, reader: GUID, status: &IncompatibleQosStatus) -> bool {
        self.dispatch(StatusMask::REQUESTED_INCOMPATIBLE_QOS, |l| {
            l.on_requested_incompatible_qos(reader, status)
        })
    }

    fn sample_rejected(&self, reader: GUID, status: &SampleRejectedStatus) -> bool {
        self.dispatch(StatusMask::SAMPLE_REJECTED, |l| l.on_sample_rejected(reader, status))
    }

    fn sample_lost(&self, reader: GUID, status: &SampleLostStatus) -> bool {
        self.dispatch(StatusMask::SAMPLE_LOST, |l| l.on_sample_lost(reader, status))
    }

    fn requested_deadline_missed(&self, reader: GUID, status: &DeadlineMissedStatus) -> bool {
        self.dispatch(StatusMask::REQUESTED_DEADLINE_MISSED, |l| {
            l.on_requested_deadline_missed(reader, status)
        })
    }

    fn liveliness_changed(&self, reader: GUID, status: &LivelinessChangedStatus) -> bool {
        self.dispatch(StatusMask::LIVELINESS_CHANGED, |l| {
            l.on_liveliness_changed(reader, status)
        })
    }
}
