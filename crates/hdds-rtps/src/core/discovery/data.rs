// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery-owned proxy data.
//!
//! These are what SPDP/SEDP (or the static XML table) say about an entity. The
//! delivery engines never hold them: matching copies the relevant fields into a
//! `RemoteReaderAttributes` / `RemoteWriterAttributes`.

use std::time::Duration;

use crate::config;
use crate::core::guid::{EntityId, GuidPrefix, GUID};
use crate::core::reader::RemoteWriterAttributes;
use crate::core::writer::RemoteReaderAttributes;
use crate::protocol::constants::{BUILTIN_ENDPOINT_SET_DEFAULT, HDDS_VENDOR_ID};
use crate::qos::QoS;
use crate::transport::Locator;

/// What a participant announces through SPDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProxyData {
    pub guid_prefix: GuidPrefix,
    pub name: String,
    pub domain_id: u32,
    pub vendor_id: [u8; 2],
    pub lease_duration: Duration,
    pub builtin_endpoints: u32,
    pub metatraffic_unicast: Vec<Locator>,
    pub metatraffic_multicast: Vec<Locator>,
    pub default_unicast: Vec<Locator>,
    pub default_multicast: Vec<Locator>,
}

impl ParticipantProxyData {
    pub fn new(guid_prefix: GuidPrefix, name: &str, domain_id: u32) -> Self {
        Self {
            guid_prefix,
            name: name.to_string(),
            domain_id,
            vendor_id: HDDS_VENDOR_ID,
            lease_duration: config::PARTICIPANT_LEASE_DURATION,
            builtin_endpoints: BUILTIN_ENDPOINT_SET_DEFAULT,
            metatraffic_unicast: Vec::new(),
            metatraffic_multicast: Vec::new(),
            default_unicast: Vec::new(),
            default_multicast: Vec::new(),
        }
    }

    pub fn guid(&self) -> GUID {
        GUID::new(self.guid_prefix, EntityId::PARTICIPANT)
    }

    /// Where SEDP traffic for this participant goes.
    pub fn metatraffic_destinations(&self) -> Vec<Locator> {
        if self.metatraffic_unicast.is_empty() {
            self.metatraffic_multicast.clone()
        } else {
            self.metatraffic_unicast.clone()
        }
    }
}

/// A DataWriter as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterProxyData {
    pub guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub qos: QoS,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
}

impl WriterProxyData {
    pub fn new(guid: GUID, topic_name: &str, type_name: &str, qos: QoS) -> Self {
        Self {
            guid,
            topic_name: topic_name.to_string(),
            type_name: type_name.to_string(),
            qos,
            unicast_locators: Vec::new(),
            multicast_locators: Vec::new(),
        }
    }

    pub fn participant_prefix(&self) -> GuidPrefix {
        self.guid.prefix
    }

    pub fn is_keyed(&self) -> bool {
        self.guid.entity_id.is_keyed()
    }

    /// Fill empty locator lists from the owning participant's defaults.
    pub fn inherit_locators(&mut self, participant: &ParticipantProxyData) {
        if self.unicast_locators.is_empty() && self.multicast_locators.is_empty() {
            self.unicast_locators = participant.default_unicast.clone();
            self.multicast_locators = participant.default_multicast.clone();
        }
    }

    pub fn remote_attributes(&self) -> RemoteWriterAttributes {
        let mut attrs = RemoteWriterAttributes::new(
            self.guid,
            self.unicast_locators.clone(),
            self.qos.is_reliable(),
        );
        attrs.multicast_locators = self.multicast_locators.clone();
        attrs.durability = self.qos.durability;
        attrs.liveliness = self.qos.liveliness;
        attrs
    }
}

/// A DataReader as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderProxyData {
    pub guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub qos: QoS,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub expects_inline_qos: bool,
}

impl ReaderProxyData {
    pub fn new(guid: GUID, topic_name: &str, type_name: &str, qos: QoS) -> Self {
        Self {
            guid,
            topic_name: topic_name.to_string(),
            type_name: type_name.to_string(),
            qos,
            unicast_locators: Vec::new(),
            multicast_locators: Vec::new(),
            expects_inline_qos: false,
        }
    }

    pub fn participant_prefix(&self) -> GuidPrefix {
        self.guid.prefix
    }

    pub fn is_keyed(&self) -> bool {
        self.guid.entity_id.is_keyed()
    }

    pub fn inherit_locators(&mut self, participant: &ParticipantProxyData) {
        if self.unicast_locators.is_empty() && self.multicast_locators.is_empty() {
            self.unicast_locators = participant.default_unicast.clone();
            self.multicast_locators = participant.default_multicast.clone();
        }
    }

    pub fn remote_attributes(&self) -> RemoteReaderAttributes {
        let mut attrs = RemoteReaderAttributes::new(
            self.guid,
            self.unicast_locators.clone(),
            self.qos.is_reliable(),
        );
        attrs.multicast_locators = self.multicast_locators.clone();
        attrs.durability = self.qos.durability;
        attrs.expects_inline_qos = self.expects_inline_qos;
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::entity_kind;
    use crate::qos::Durability;

    #[test]
    fn test_writer_attributes_copy_qos() {
        let guid = GUID::new([3; 12], EntityId::from_key(1, entity_kind::WRITER_WITH_KEY));
        let mut data =
            WriterProxyData::new(guid, "Square", "ShapeType", QoS::reliable().transient_local());
        data.unicast_locators
            .push(Locator::udpv4([10, 0, 0, 1], 7411));

        let attrs = data.remote_attributes();
        assert_eq!(attrs.guid, guid);
        assert!(attrs.reliable);
        assert_eq!(attrs.durability, Durability::TransientLocal);
        assert_eq!(attrs.unicast_locators.len(), 1);
        assert!(data.is_keyed());
    }

    #[test]
    fn test_reader_inherits_participant_locators() {
        let prefix = [9; 12];
        let mut participant = ParticipantProxyData::new(prefix, "p", 0);
        participant
            .default_unicast
            .push(Locator::udpv4([10, 0, 0, 2], 7413));
        let guid = GUID::new(prefix, EntityId::from_key(2, entity_kind::READER_NO_KEY));
        let mut data = ReaderProxyData::new(guid, "Chat", "String", QoS::best_effort());
        data.inherit_locators(&participant);

        assert_eq!(data.unicast_locators, participant.default_unicast);
        assert!(!data.is_keyed());
        assert!(!data.remote_attributes().reliable);
    }

    #[test]
    fn test_metatraffic_falls_back_to_multicast() {
        let mut p = ParticipantProxyData::new([1; 12], "p", 0);
        p.metatraffic_multicast
            .push(Locator::udpv4([239, 255, 0, 1], 7400));
        assert_eq!(p.metatraffic_destinations(), p.metatraffic_multicast);
        p.metatraffic_unicast.push(Locator::udpv4([10, 0, 0, 1], 7410));
        assert_eq!(p.metatraffic_destinations(), p.metatraffic_unicast);
    }
}
