// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SPDP / SEDP payload codec.
//!
//! Discovery data travels as PL_CDR_LE parameter lists inside DATA submessages
//! between the built-in endpoints:
//!
//! | Topic          | Writer       | Reader       |
//! |----------------|--------------|--------------|
//! | participants   | `0x000100c2` | `0x000100c7` |
//! | publications   | `0x000003c2` | `0x000003c7` |
//! | subscriptions  | `0x000004c2` | `0x000004c7` |
//!
//! An endpoint deletion is a payload-less DATA whose KEY_HASH is the endpoint GUID
//! and whose STATUS_INFO is DISPOSED|UNREGISTERED.

use std::time::Duration;

use super::data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use super::{DiscoveryError, DiscoveryResult};
use crate::core::guid::{EntityId, InstanceHandle, GUID};
use crate::protocol::constants::*;
use crate::protocol::encapsulation::{self, EncapsulationKind};
use crate::protocol::{Data, InlineQos, ParameterList};
use crate::qos::{
    Durability, History, Liveliness, LivelinessKind, OwnershipKind, Partition, QoS, Reliability,
    ResourceLimits, LENGTH_UNLIMITED,
};

/// The three built-in discovery topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTopic {
    Participants,
    Publications,
    Subscriptions,
}

impl BuiltinTopic {
    pub fn writer_id(self) -> EntityId {
        match self {
            Self::Participants => EntityId::SPDP_BUILTIN_PARTICIPANT_WRITER,
            Self::Publications => EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER,
            Self::Subscriptions => EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_WRITER,
        }
    }

    pub fn reader_id(self) -> EntityId {
        match self {
            Self::Participants => EntityId::SPDP_BUILTIN_PARTICIPANT_READER,
            Self::Publications => EntityId::SEDP_BUILTIN_PUBLICATIONS_READER,
            Self::Subscriptions => EntityId::SEDP_BUILTIN_SUBSCRIPTIONS_READER,
        }
    }

    /// Topic a DATA belongs to, judged by its writer entity id.
    pub fn from_writer_id(id: EntityId) -> Option<Self> {
        [Self::Participants, Self::Publications, Self::Subscriptions]
            .into_iter()
            .find(|t| t.writer_id() == id)
    }
}

/// DATA carrying an encoded announcement.
pub fn announcement(topic: BuiltinTopic, sequence: u64, payload: Vec<u8>) -> Data {
    Data {
        reader_id: topic.reader_id(),
        writer_id: topic.writer_id(),
        writer_sn: sequence,
        inline_qos: InlineQos::default(),
        serialized_payload: Some(payload),
        key_only: false,
    }
}

/// DATA withdrawing the entity `guid` from `topic`.
pub fn withdrawal(topic: BuiltinTopic, sequence: u64, guid: &GUID) -> Data {
    Data {
        reader_id: topic.reader_id(),
        writer_id: topic.writer_id(),
        writer_sn: sequence,
        inline_qos: InlineQos {
            key_hash: Some(InstanceHandle(guid.as_bytes())),
            status_info: Some(STATUS_INFO_DISPOSED | STATUS_INFO_UNREGISTERED),
        },
        serialized_payload: None,
        key_only: true,
    }
}

/// The GUID a withdrawal DATA refers to, `None` for a regular announcement.
pub fn withdrawn_guid(data: &Data) -> Option<GUID> {
    let status = data.inline_qos.status_info?;
    if status & (STATUS_INFO_DISPOSED | STATUS_INFO_UNREGISTERED) == 0 {
        return None;
    }
    data.inline_qos.key_hash.map(|kh| GUID::from_bytes(kh.0))
}

// ============================================================================
// SPDP
// ============================================================================

pub fn encode_participant(data: &ParticipantProxyData) -> Vec<u8> {
    let mut pl = ParameterList::new();
    pl.push_guid(PID_PARTICIPANT_GUID, &data.guid());
    pl.push_raw(PID_PROTOCOL_VERSION, &[RTPS_VERSION_MAJOR, RTPS_VERSION_MINOR]);
    pl.push_raw(PID_VENDORID, &data.vendor_id);
    pl.push_u32(PID_DOMAIN_ID, data.domain_id);
    pl.push_string(PID_ENTITY_NAME, &data.name);
    pl.push_duration(PID_PARTICIPANT_LEASE_DURATION, data.lease_duration);
    pl.push_u32(PID_BUILTIN_ENDPOINT_SET, data.builtin_endpoints);
    for loc in &data.metatraffic_unicast {
        pl.push_locator(PID_METATRAFFIC_UNICAST_LOCATOR, loc);
    }
    for loc in &data.metatraffic_multicast {
        pl.push_locator(PID_METATRAFFIC_MULTICAST_LOCATOR, loc);
    }
    for loc in &data.default_unicast {
        pl.push_locator(PID_DEFAULT_UNICAST_LOCATOR, loc);
    }
    for loc in &data.default_multicast {
        pl.push_locator(PID_DEFAULT_MULTICAST_LOCATOR, loc);
    }
    encapsulation::encapsulate(EncapsulationKind::PlCdrLe, &pl.encode())
}

pub fn decode_participant(payload: &[u8]) -> DiscoveryResult<ParticipantProxyData> {
    let pl = parameter_list(payload)?;
    let guid = pl
        .get_guid(PID_PARTICIPANT_GUID)
        .ok_or_else(|| missing("PID_PARTICIPANT_GUID"))?;

    let mut data = ParticipantProxyData::new(
        guid.prefix,
        &pl.get_string(PID_ENTITY_NAME).unwrap_or_default(),
        pl.get_u32(PID_DOMAIN_ID).unwrap_or(0),
    );
    if let Some(vendor) = pl.get(PID_VENDORID).and_then(|v| v.get(..2)) {
        data.vendor_id = [vendor[0], vendor[1]];
    }
    if let Some(lease) = pl.get_duration(PID_PARTICIPANT_LEASE_DURATION) {
        data.lease_duration = lease;
    }
    if let Some(set) = pl.get_u32(PID_BUILTIN_ENDPOINT_SET) {
        data.builtin_endpoints = set;
    }
    data.metatraffic_unicast = pl.get_locators(PID_METATRAFFIC_UNICAST_LOCATOR);
    data.metatraffic_multicast = pl.get_locators(PID_METATRAFFIC_MULTICAST_LOCATOR);
    data.default_unicast = pl.get_locators(PID_DEFAULT_UNICAST_LOCATOR);
    data.default_multicast = pl.get_locators(PID_DEFAULT_MULTICAST_LOCATOR);
    Ok(data)
}

// ============================================================================
// SEDP
// ============================================================================

pub fn encode_writer(data: &WriterProxyData) -> Vec<u8> {
    let mut pl = endpoint_list(
        &data.guid,
        &data.topic_name,
        &data.type_name,
        &data.qos,
    );
    for loc in &data.unicast_locators {
        pl.push_locator(PID_UNICAST_LOCATOR, loc);
    }
    for loc in &data.multicast_locators {
        pl.push_locator(PID_MULTICAST_LOCATOR, loc);
    }
    pl.push_duration(PID_LIFESPAN, data.qos.lifespan.duration);
    encapsulation::encapsulate(EncapsulationKind::PlCdrLe, &pl.encode())
}

pub fn decode_writer(payload: &[u8]) -> DiscoveryResult<WriterProxyData> {
    let pl = parameter_list(payload)?;
    let (guid, topic, type_name, mut qos) = endpoint_fields(&pl)?;
    if !guid.entity_id.is_writer() {
        return Err(invalid(format!("{} is not a writer", guid)));
    }
    if let Some(d) = pl.get_duration(PID_LIFESPAN) {
        qos.lifespan.duration = d;
    }
    let mut data = WriterProxyData::new(guid, &topic, &type_name, qos);
    data.unicast_locators = pl.get_locators(PID_UNICAST_LOCATOR);
    data.multicast_locators = pl.get_locators(PID_MULTICAST_LOCATOR);
    Ok(data)
}

pub fn encode_reader(data: &ReaderProxyData) -> Vec<u8> {
    let mut pl = endpoint_list(
        &data.guid,
        &data.topic_name,
        &data.type_name,
        &data.qos,
    );
    for loc in &data.unicast_locators {
        pl.push_locator(PID_UNICAST_LOCATOR, loc);
    }
    for loc in &data.multicast_locators {
        pl.push_locator(PID_MULTICAST_LOCATOR, loc);
    }
    pl.push_bool(PID_EXPECTS_INLINE_QOS, data.expects_inline_qos);
    encapsulation::encapsulate(EncapsulationKind::PlCdrLe, &pl.encode())
}

pub fn decode_reader(payload: &[u8]) -> DiscoveryResult<ReaderProxyData> {
    let pl = parameter_list(payload)?;
    let (guid, topic, type_name, qos) = endpoint_fields(&pl)?;
    if !guid.entity_id.is_reader() {
        return Err(invalid(format!("{} is not a reader", guid)));
    }
    let mut data = ReaderProxyData::new(guid, &topic, &type_name, qos);
    data.unicast_locators = pl.get_locators(PID_UNICAST_LOCATOR);
    data.multicast_locators = pl.get_locators(PID_MULTICAST_LOCATOR);
    data.expects_inline_qos = pl.get_bool(PID_EXPECTS_INLINE_QOS).unwrap_or(false);
    Ok(data)
}

/// Parameters shared by publications and subscriptions.
fn endpoint_list(guid: &GUID, topic: &str, type_name: &str, qos: &QoS) -> ParameterList {
    let mut pl = ParameterList::new();
    pl.push_guid(PID_ENDPOINT_GUID, guid);
    pl.push_guid(PID_PARTICIPANT_GUID, &guid.participant());
    pl.push_string(PID_TOPIC_NAME, topic);
    pl.push_string(PID_TYPE_NAME, type_name);

    pl.push_raw(
        PID_RELIABILITY,
        &[
            &qos.reliability.to_wire().to_le_bytes()[..],
            &duration_bytes(qos.max_blocking_time)[..],
        ]
        .concat(),
    );
    pl.push_u32(PID_DURABILITY, qos.durability.rank());
    pl.push_duration(PID_DEADLINE, qos.deadline.period);
    pl.push_raw(
        PID_LIVELINESS,
        &[
            &qos.liveliness.kind.to_wire().to_le_bytes()[..],
            &duration_bytes(qos.liveliness.lease_duration)[..],
        ]
        .concat(),
    );
    let ownership = match qos.ownership.kind {
        OwnershipKind::Shared => 0,
        OwnershipKind::Exclusive => 1,
    };
    pl.push_u32(PID_OWNERSHIP, ownership);
    if !qos.partition.is_default() {
        pl.push_string_seq(PID_PARTITION, &qos.partition.names);
    }
    let (kind, depth) = match qos.history {
        History::KeepLast(depth) => (0u32, depth as i32),
        History::KeepAll => (1u32, -1),
    };
    pl.push_raw(
        PID_HISTORY,
        &[kind.to_le_bytes(), depth.to_le_bytes()].concat(),
    );
    let limits = &qos.resource_limits;
    pl.push_raw(
        PID_RESOURCE_LIMITS,
        &[
            limit_to_wire(limits.max_samples),
            limit_to_wire(limits.max_instances),
            limit_to_wire(limits.max_samples_per_instance),
        ]
        .concat(),
    );
    pl
}

fn endpoint_fields(pl: &ParameterList) -> DiscoveryResult<(GUID, String, String, QoS)> {
    let guid = pl
        .get_guid(PID_ENDPOINT_GUID)
        .ok_or_else(|| missing("PID_ENDPOINT_GUID"))?;
    let topic = pl
        .get_string(PID_TOPIC_NAME)
        .ok_or_else(|| missing("PID_TOPIC_NAME"))?;
    let type_name = pl
        .get_string(PID_TYPE_NAME)
        .ok_or_else(|| missing("PID_TYPE_NAME"))?;

    let mut qos = QoS::default();
    if let Some(v) = pl.get(PID_RELIABILITY) {
        let mut r = pl.reader(v);
        if let Some(kind) = r.u32().ok().and_then(Reliability::from_wire) {
            qos.reliability = kind;
        }
        if let (Ok(secs), Ok(frac)) = (r.i32(), r.u32()) {
            qos.max_blocking_time = crate::core::time::duration_from_wire(secs, frac);
        }
    }
    if let Some(d) = pl.get_u32(PID_DURABILITY).and_then(Durability::from_wire) {
        qos.durability = d;
    }
    if let Some(period) = pl.get_duration(PID_DEADLINE) {
        qos.deadline.period = period;
    }
    if let Some(v) = pl.get(PID_LIVELINESS) {
        let mut r = pl.reader(v);
        let kind = r.u32().ok().and_then(LivelinessKind::from_wire);
        let lease = match (r.i32(), r.u32()) {
            (Ok(secs), Ok(frac)) => Some(crate::core::time::duration_from_wire(secs, frac)),
            _ => None,
        };
        if let (Some(kind), Some(lease)) = (kind, lease) {
            qos.liveliness = Liveliness::new(kind, lease);
        }
    }
    if let Some(kind) = pl.get_u32(PID_OWNERSHIP) {
        qos.ownership.kind = if kind == 1 {
            OwnershipKind::Exclusive
        } else {
            OwnershipKind::Shared
        };
    }
    if let Some(names) = pl.get_string_seq(PID_PARTITION) {
        qos.partition = Partition::new(names);
    }
    if let Some(v) = pl.get(PID_HISTORY) {
        let mut r = pl.reader(v);
        if let (Ok(kind), Ok(depth)) = (r.u32(), r.i32()) {
            qos.history = if kind == 1 {
                History::KeepAll
            } else {
                History::KeepLast(depth.max(1) as u32)
            };
        }
    }
    if let Some(v) = pl.get(PID_RESOURCE_LIMITS) {
        let mut r = pl.reader(v);
        if let (Ok(samples), Ok(instances), Ok(per_instance)) = (r.i32(), r.i32(), r.i32()) {
            qos.resource_limits = ResourceLimits {
                max_samples: limit_from_wire(samples),
                max_instances: limit_from_wire(instances),
                max_samples_per_instance: limit_from_wire(per_instance),
            };
        }
    }
    Ok((guid, topic, type_name, qos))
}

// ============================================================================
// Helpers
// ============================================================================

fn parameter_list(payload: &[u8]) -> DiscoveryResult<ParameterList> {
    let (kind, body) = encapsulation::split(payload)?;
    if !kind.is_parameter_list() {
        return Err(DiscoveryError::ParseFailed {
            reason: format!("expected PL_CDR encapsulation, got {:?}", kind),
        });
    }
    Ok(ParameterList::decode(body, kind.is_little_endian())?)
}

fn duration_bytes(d: Duration) -> [u8; 8] {
    let (secs, frac) = crate::core::time::duration_to_wire(d);
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&secs.to_le_bytes());
    out[4..].copy_from_slice(&frac.to_le_bytes());
    out
}

fn limit_to_wire(limit: usize) -> [u8; 4] {
    let v: i32 = if limit == LENGTH_UNLIMITED {
        -1
    } else {
        i32::try_from(limit).unwrap_or(i32::MAX)
    };
    v.to_le_bytes()
}

fn limit_from_wire(v: i32) -> usize {
    usize::try_from(v).unwrap_or(LENGTH_UNLIMITED)
}

fn missing(pid: &str) -> DiscoveryError {
    DiscoveryError::ParseFailed {
        reason: format!("missing {}", pid),
    }
}

fn invalid(reason: String) -> DiscoveryError {
    DiscoveryError::InvalidData { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::entity_kind;
    use crate::transport::Locator;

    fn participant() -> ParticipantProxyData {
        let mut p = ParticipantProxyData::new([7; 12], "robot", 3);
        p.lease_duration = Duration::from_millis(1500);
        p.metatraffic_unicast.push(Locator::udpv4([10, 0, 0, 5], 7410));
        p.metatraffic_multicast
            .push(Locator::udpv4([239, 255, 0, 1], 7400));
        p.default_unicast.push(Locator::udpv4([10, 0, 0, 5], 7411));
        p
    }

    #[test]
    fn test_participant_payload_is_pl_cdr_le() {
        let bytes = encode_participant(&participant());
        assert_eq!(&bytes[..2], &[0x00, 0x03]);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_participant_decode_restores_fields() {
        let original = participant();
        let decoded = decode_participant(&encode_participant(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_writer_qos_survives_the_wire() {
        let guid = GUID::new([7; 12], EntityId::from_key(4, entity_kind::WRITER_WITH_KEY));
        let qos = QoS::reliable()
            .transient_local()
            .keep_all()
            .deadline(Duration::from_millis(250))
            .liveliness_manual_topic(Duration::from_secs(2))
            .ownership_exclusive()
            .partition("left")
            .lifespan(Duration::from_secs(9));
        let mut data = WriterProxyData::new(guid, "Square", "ShapeType", qos);
        data.unicast_locators.push(Locator::udpv4([10, 0, 0, 5], 7411));

        let decoded = decode_writer(&encode_writer(&data)).unwrap();
        assert_eq!(decoded.guid, guid);
        assert_eq!(decoded.topic_name, "Square");
        assert_eq!(decoded.type_name, "ShapeType");
        assert_eq!(decoded.qos.reliability, Reliability::Reliable);
        assert_eq!(decoded.qos.durability, Durability::TransientLocal);
        assert_eq!(decoded.qos.history, History::KeepAll);
        assert_eq!(decoded.qos.deadline.period, Duration::from_millis(250));
        assert_eq!(decoded.qos.liveliness.kind, LivelinessKind::ManualByTopic);
        assert_eq!(decoded.qos.ownership.kind, OwnershipKind::Exclusive);
        assert_eq!(decoded.qos.partition.names, vec!["left".to_string()]);
        assert_eq!(decoded.qos.lifespan.duration, Duration::from_secs(9));
        assert_eq!(decoded.unicast_locators, data.unicast_locators);
    }

    #[test]
    fn test_infinite_durations_stay_infinite() {
        let guid = GUID::new([7; 12], EntityId::from_key(5, entity_kind::READER_NO_KEY));
        let data = ReaderProxyData::new(guid, "Chat", "String", QoS::best_effort());
        let decoded = decode_reader(&encode_reader(&data)).unwrap();
        assert!(decoded.qos.deadline.is_infinite());
        assert!(decoded.qos.liveliness.is_infinite());
        assert_eq!(decoded.qos.resource_limits, data.qos.resource_limits);
        assert!(!decoded.expects_inline_qos);
    }

    #[test]
    fn test_decode_rejects_wrong_direction() {
        let guid = GUID::new([7; 12], EntityId::from_key(5, entity_kind::READER_NO_KEY));
        let data = ReaderProxyData::new(guid, "Chat", "String", QoS::best_effort());
        let err = decode_writer(&encode_reader(&data)).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidData { .. }));
    }

    #[test]
    fn test_decode_requires_guid() {
        let mut pl = ParameterList::new();
        pl.push_string(PID_TOPIC_NAME, "x");
        let payload = encapsulation::encapsulate(EncapsulationKind::PlCdrLe, &pl.encode());
        assert!(matches!(
            decode_reader(&payload),
            Err(DiscoveryError::ParseFailed { .. })
        ));
        assert!(decode_participant(&[0, 1]).is_err());
    }

    #[test]
    fn test_withdrawal_carries_endpoint_guid() {
        let guid = GUID::new([7; 12], EntityId::from_key(9, entity_kind::WRITER_NO_KEY));
        let data = withdrawal(BuiltinTopic::Publications, 4, &guid);
        assert_eq!(data.writer_id, EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER);
        assert_eq!(withdrawn_guid(&data), Some(guid));

        let alive = announcement(BuiltinTopic::Publications, 5, vec![0, 3, 0, 0]);
        assert_eq!(withdrawn_guid(&alive), None);
        assert_eq!(
            BuiltinTopic::from_writer_id(alive.writer_id),
            Some(BuiltinTopic::Publications)
        );
        assert_eq!(BuiltinTopic::from_writer_id(EntityId::UNKNOWN), None);
    }
}
