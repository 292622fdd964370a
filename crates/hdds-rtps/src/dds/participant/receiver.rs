// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Incoming datagram dispatch.
//!
//! One [`Receiver`] is registered on every input channel of a participant. It
//! decodes the RTPS message, tracks INFO_TS / INFO_DST, and routes each
//! submessage: builtin DATA to PDP/EDP, user DATA / HEARTBEAT / GAP to the
//! readers, ACKNACK to the writer it names. Any datagram from a known participant
//! renews that participant's lease.

use std::sync::{Arc, Weak};

use super::Inner;
use crate::core::discovery::wire::{self, BuiltinTopic};
use crate::core::discovery::{ParticipantProxyData, PdpEvent};
use crate::core::guid::{EntityId, GuidPrefix, GUIDPREFIX_UNKNOWN, GUID};
use crate::core::reader::StatefulReader;
use crate::core::time::Timestamp;
use crate::protocol::{Data, RtpsMessage, Submessage};
use crate::transport::{Locator, ReceiveHandler};

pub(super) struct Receiver {
    participant: Weak<Inner>,
}

impl Receiver {
    pub(super) fn new(participant: Weak<Inner>) -> Self {
        Self { participant }
    }
}

impl ReceiveHandler for Receiver {
    fn on_receive(&self, data: &[u8], source: &Locator) {
        if let Some(inner) = self.participant.upgrade() {
            inner.dispatch(data, source);
        }
    }
}

impl Inner {
    fn dispatch(&self, bytes: &[u8], source: &Locator) {
        let message = match RtpsMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("[transport] dropped datagram from {}: {}", source, e);
                return;
            }
        };
        let sender = message.header.guid_prefix;
        self.pdp.assert_participant(&sender);

        let mut timestamp: Option<Timestamp> = None;
        let mut for_us = true;
        for sub in &message.submessages {
            match sub {
                Submessage::InfoTs(info) => timestamp = info.timestamp,
                Submessage::InfoDst(info) => {
                    for_us = info.guid_prefix == GUIDPREFIX_UNKNOWN
                        || info.guid_prefix == self.prefix;
                }
                _ if !for_us => {}
                Submessage::Data(data) => self.on_data(sender, data, timestamp),
                Submessage::Heartbeat(hb) => {
                    let writer = GUID::new(sender, hb.writer_id);
                    for reader in self.readers_for(hb.reader_id, &writer) {
                        reader.on_heartbeat(writer, hb);
                    }
                }
                Submessage::Gap(gap) => {
                    let writer = GUID::new(sender, gap.writer_id);
                    for reader in self.readers_for(gap.reader_id, &writer) {
                        reader.on_gap(writer, gap);
                    }
                }
                Submessage::AckNack(ack) => match self.writer_engine(&ack.writer_id) {
                    Some(engine) => engine.on_acknack(GUID::new(sender, ack.reader_id), ack),
                    None => log::trace!(
                        "[writer] ACKNACK for unknown writer {:?} from {:02x?}",
                        ack.writer_id,
                        sender
                    ),
                },
                Submessage::Unknown { id } => {
                    log::trace!("[transport] skipped submessage 0x{:02x}", id);
                }
            }
        }
    }

    /// Local readers a submessage from `writer` is meant for. An unknown reader
    /// id addresses every reader matched with the writer.
    fn readers_for(&self, reader_id: EntityId, writer: &GUID) -> Vec<Arc<StatefulReader>> {
        if reader_id.is_unknown() {
            self.reader_engines()
                .into_iter()
                .filter(|r| r.writer_floor(writer).is_some())
                .collect()
        } else {
            self.readers
                .get(&reader_id)
                .map(|r| vec![Arc::clone(&r.engine)])
                .unwrap_or_default()
        }
    }

    fn on_data(&self, sender: GuidPrefix, data: &Data, timestamp: Option<Timestamp>) {
        if let Some(topic) = BuiltinTopic::from_writer_id(data.writer_id) {
            self.on_builtin_data(sender, topic, data);
            return;
        }
        let writer = GUID::new(sender, data.writer_id);
        for reader in self.readers_for(data.reader_id, &writer) {
            reader.on_data(writer, data, timestamp);
        }
    }

    fn on_builtin_data(&self, sender: GuidPrefix, topic: BuiltinTopic, data: &Data) {
        if let Some(guid) = wire::withdrawn_guid(data) {
            match topic {
                BuiltinTopic::Participants => {
                    if guid.prefix == sender {
                        self.pdp.remove_participant(&sender);
                    }
                }
                BuiltinTopic::Publications if !self.edp.is_static() => {
                    self.edp.remove_remote_writer(&guid);
                }
                BuiltinTopic::Subscriptions if !self.edp.is_static() => {
                    self.edp.remove_remote_reader(&guid);
                }
                _ => {}
            }
            return;
        }
        let Some(payload) = data.serialized_payload.as_deref() else {
            return;
        };
        match topic {
            BuiltinTopic::Participants => match wire::decode_participant(payload) {
                Ok(participant) => self.on_participant_data(participant),
                Err(e) => log::debug!("[PDP] undecodable SPDP from {:02x?}: {}", sender, e),
            },
            // Static EDP ignores SEDP: endpoints come from the table.
            _ if self.edp.is_static() => {}
            BuiltinTopic::Publications => match wire::decode_writer(payload) {
                Ok(mut writer) => {
                    if let Some(owner) = self.pdp.participant(&writer.guid.prefix) {
                        writer.inherit_locators(&owner);
                    }
                    self.edp.on_remote_writer(writer);
                }
                Err(e) => log::debug!("[EDP] undecodable publication from {:02x?}: {}", sender, e),
            },
            BuiltinTopic::Subscriptions => match wire::decode_reader(payload) {
                Ok(mut reader) => {
                    if let Some(owner) = self.pdp.participant(&reader.guid.prefix) {
                        reader.inherit_locators(&owner);
                    }
                    self.edp.on_remote_reader(reader);
                }
                Err(e) => log::debug!("[EDP] undecodable subscription from {:02x?}: {}", sender, e),
            },
        }
    }

    fn on_participant_data(&self, participant: ParticipantProxyData) {
        let prefix = participant.guid_prefix;
        let Some(event) = self.pdp.on_participant_data(participant) else {
            return;
        };
        if let PdpEvent::Discovered(remote) = &event {
            let destinations = remote.metatraffic_destinations();
            // Answer directly so the peer does not wait for our next period.
            self.announce_participant_to(&destinations);
            if self.edp.is_static() {
                self.edp.on_static_participant(remote);
            } else {
                self.announce_endpoints_to(&destinations);
            }
        }
        for reader in self.reader_engines() {
            reader.assert_remote_participant(prefix);
        }
    }
}
