// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SPDP / SEDP announcements of the local participant.
//!
//! SPDP goes to the metatraffic multicast locator and the configured initial
//! peers every announcement period. SEDP is best-effort: every local endpoint is
//! announced when created, re-sent to each known participant with every SPDP
//! period, and withdrawn with a disposed DATA when deleted.

use std::sync::atomic::{AtomicU64, Ordering};

use super::Inner;
use crate::core::discovery::wire::{self, BuiltinTopic};
use crate::core::discovery::{ReaderProxyData, WriterProxyData};
use crate::core::guid::{EntityId, GUID};
use crate::core::timer::EventAction;
use crate::protocol::{Data, RtpsMessage, Submessage};
use crate::transport::Locator;

/// Sequence numbers of the three builtin writers.
#[derive(Default)]
pub(super) struct Sequences {
    participants: AtomicU64,
    publications: AtomicU64,
    subscriptions: AtomicU64,
}

impl Sequences {
    fn next(&self, topic: BuiltinTopic) -> u64 {
        let counter = match topic {
            BuiltinTopic::Participants => &self.participants,
            BuiltinTopic::Publications => &self.publications,
            BuiltinTopic::Subscriptions => &self.subscriptions,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Inner {
    fn encode(&self, data: Data) -> Vec<u8> {
        RtpsMessage::new(self.prefix)
            .with(Submessage::Data(data))
            .encode()
    }

    fn send_all(&self, bytes: &[u8], destinations: &[Locator]) {
        for destination in destinations {
            if !self.transport.send(bytes, destination) {
                log::warn!("[transport] send to {} failed", destination);
            }
        }
    }

    fn spdp_destinations(&self) -> Vec<Locator> {
        let mut destinations = self.pdp.local_data().metatraffic_multicast.clone();
        destinations.extend(self.config.initial_peers.iter().copied());
        destinations
    }

    /// Metatraffic locators of every known remote participant.
    fn known_destinations(&self) -> Vec<Locator> {
        let mut destinations: Vec<Locator> = Vec::new();
        for participant in self.pdp.participants() {
            for locator in participant.metatraffic_destinations() {
                if !destinations.contains(&locator) {
                    destinations.push(locator);
                }
            }
        }
        destinations
    }

    fn participant_message(&self) -> Vec<u8> {
        let payload = wire::encode_participant(self.pdp.local_data());
        let seq = self.sequences.next(BuiltinTopic::Participants);
        self.encode(wire::announcement(BuiltinTopic::Participants, seq, payload))
    }

    pub(super) fn announce_participant(&self) {
        let bytes = self.participant_message();
        self.send_all(&bytes, &self.spdp_destinations());
    }

    pub(super) fn announce_participant_to(&self, destinations: &[Locator]) {
        let bytes = self.participant_message();
        self.send_all(&bytes, destinations);
    }

    fn writer_message(&self, data: &WriterProxyData) -> Vec<u8> {
        let seq = self.sequences.next(BuiltinTopic::Publications);
        self.encode(wire::announcement(
            BuiltinTopic::Publications,
            seq,
            wire::encode_writer(data),
        ))
    }

    fn reader_message(&self, data: &ReaderProxyData) -> Vec<u8> {
        let seq = self.sequences.next(BuiltinTopic::Subscriptions);
        self.encode(wire::announcement(
            BuiltinTopic::Subscriptions,
            seq,
            wire::encode_reader(data),
        ))
    }

    pub(super) fn announce_writer(&self, data: &WriterProxyData) {
        let destinations = self.known_destinations();
        if !destinations.is_empty() {
            log::debug!("[EDP] announcing writer {} on '{}'", data.guid, data.topic_name);
            self.send_all(&self.writer_message(data), &destinations);
        }
    }

    pub(super) fn announce_reader(&self, data: &ReaderProxyData) {
        let destinations = self.known_destinations();
        if !destinations.is_empty() {
            log::debug!("[EDP] announcing reader {} on '{}'", data.guid, data.topic_name);
            self.send_all(&self.reader_message(data), &destinations);
        }
    }

    /// Every local endpoint, one DATA per datagram.
    pub(super) fn announce_endpoints_to(&self, destinations: &[Locator]) {
        for data in self.edp.local_writers() {
            self.send_all(&self.writer_message(&data), destinations);
        }
        for data in self.edp.local_readers() {
            self.send_all(&self.reader_message(&data), destinations);
        }
    }

    pub(super) fn withdraw_endpoint(&self, topic: BuiltinTopic, guid: &GUID) {
        let destinations = self.known_destinations();
        if destinations.is_empty() {
            return;
        }
        let seq = self.sequences.next(topic);
        let bytes = self.encode(wire::withdrawal(topic, seq, guid));
        self.send_all(&bytes, &destinations);
    }

    pub(super) fn withdraw_participant(&self) {
        let guid = GUID::new(self.prefix, EntityId::PARTICIPANT);
        let seq = self.sequences.next(BuiltinTopic::Participants);
        let bytes = self.encode(wire::withdrawal(BuiltinTopic::Participants, seq, &guid));
        let mut destinations = self.spdp_destinations();
        for locator in self.known_destinations() {
            if !destinations.contains(&locator) {
                destinations.push(locator);
            }
        }
        self.send_all(&bytes, &destinations);
    }

    pub(super) fn on_spdp_timer(&self) -> EventAction {
        self.announce_participant();
        if !self.edp.is_static() {
            for participant in self.pdp.participants() {
                self.announce_endpoints_to(&participant.metatraffic_destinations());
            }
        }
        EventAction::Restart
    }
}
