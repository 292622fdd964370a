// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use super::*;
use crate::core::test_util::wait_for;
use crate::dds::listener::PublicationMatchedStatus;
use crate::transport::loopback::LoopbackNetwork;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    id: u32,
    value: u64,
}

impl TopicType for Counter {
    fn type_name() -> &'static str {
        "test::Counter"
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = self.id.to_le_bytes().to_vec();
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.value.to_le_bytes());
        Ok(out)
    }

    fn deserialize(body: &[u8]) -> Result<Self> {
        if body.len() < 16 {
            return Err(Error::SerializationError("short Counter".into()));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&body[..4]);
        let mut value = [0u8; 8];
        value.copy_from_slice(&body[8..16]);
        Ok(Self {
            id: u32::from_le_bytes(id),
            value: u64::from_le_bytes(value),
        })
    }

    fn has_key() -> bool {
        true
    }

    fn serialize_key(&self) -> Vec<u8> {
        self.id.to_be_bytes().to_vec()
    }
}

fn config(name: &str, participant_id: u32) -> ParticipantConfig {
    ParticipantConfig::new(name)
        .domain_id(7)
        .participant_id(participant_id)
        .announcement_period(Duration::from_millis(200))
        .lease_duration(Duration::from_secs(2))
}

fn participant(network: &Arc<LoopbackNetwork>, name: &str, id: u32) -> DomainParticipant {
    DomainParticipant::new(config(name, id), Arc::new(network.transport())).unwrap()
}

#[test]
fn test_participants_discover_each_other() {
    let network = LoopbackNetwork::new();
    let a = participant(&network, "a", 0);
    let b = participant(&network, "b", 1);
    assert!(wait_for(WAIT, || a.discovered_participants().len() == 1
        && b.discovered_participants().len() == 1));
    assert_eq!(a.discovered_participants()[0].name, "b");
    assert_ne!(a.guid_prefix(), b.guid_prefix());
}

#[test]
fn test_reliable_samples_cross_participants() {
    let network = LoopbackNetwork::new();
    let a = participant(&network, "pub", 0);
    let b = participant(&network, "sub", 1);
    let writer = a
        .create_writer::<Counter>("counters", QoS::reliable().keep_all())
        .unwrap();
    let reader = b
        .create_reader::<Counter>("counters", QoS::reliable().keep_all())
        .unwrap();
    assert!(wait_for(WAIT, || writer
        .matched_subscriptions()
        .map_or(false, |m| m.len() == 1)));

    for value in 1..=3 {
        writer.write(&Counter { id: 1, value }).unwrap();
    }
    writer.wait_for_acknowledgments(WAIT).unwrap();
    let samples = reader.take(10).unwrap();
    let values: Vec<u64> = samples
        .iter()
        .filter_map(|s| s.data.as_ref().map(|c| c.value))
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(samples[0].info.publication_handle, writer.guid());
}

#[test]
fn test_local_endpoints_match_within_one_participant() {
    let network = LoopbackNetwork::new();
    let p = participant(&network, "solo", 0);
    let reader = p.create_reader::<Counter>("local", QoS::reliable()).unwrap();
    let writer = p.create_writer::<Counter>("local", QoS::reliable()).unwrap();
    assert_eq!(writer.matched_subscriptions().unwrap(), vec![reader.guid()]);

    writer.write(&Counter { id: 4, value: 40 }).unwrap();
    assert!(wait_for(WAIT, || reader.history_len().unwrap_or(0) == 1));
    let sample = reader.take_next_sample().unwrap().unwrap();
    assert_eq!(sample.data, Some(Counter { id: 4, value: 40 }));
}

#[test]
fn test_delete_publisher_with_writers_fails() {
    let network = LoopbackNetwork::new();
    let p = participant(&network, "owner", 0);
    let publisher = p.create_publisher();
    let writer = publisher
        .create_writer::<Counter>("owned", QoS::best_effort())
        .unwrap();

    assert!(matches!(
        p.delete_publisher(&publisher),
        Err(Error::PreconditionNotMet(_))
    ));
    publisher.delete_writer(&writer).unwrap();
    assert!(matches!(
        writer.write(&Counter { id: 1, value: 1 }),
        Err(Error::AlreadyDeleted)
    ));
    p.delete_publisher(&publisher).unwrap();
    assert!(matches!(
        publisher.create_writer::<Counter>("owned", QoS::best_effort()),
        Err(Error::AlreadyDeleted)
    ));
}

#[test]
fn test_writer_from_other_publisher_is_refused() {
    let network = LoopbackNetwork::new();
    let p = participant(&network, "two-pubs", 0);
    let first = p.create_publisher();
    let second = p.create_publisher();
    let writer = first
        .create_writer::<Counter>("split", QoS::best_effort())
        .unwrap();
    assert!(matches!(
        second.delete_writer(&writer),
        Err(Error::PreconditionNotMet(_))
    ));
    first.delete_writer(&writer).unwrap();
}

#[test]
fn test_invalid_arguments() {
    let network = LoopbackNetwork::new();
    let p = participant(&network, "args", 0);
    assert!(matches!(
        p.create_writer::<Counter>("", QoS::reliable()),
        Err(Error::BadParameter(_))
    ));
    let bad = DomainParticipant::new(
        ParticipantConfig::new("bad").domain_id(1000),
        Arc::new(network.transport()),
    );
    assert!(matches!(bad, Err(Error::Config(_))));
}

#[derive(Default)]
struct MatchCounter(AtomicI32);

impl DataWriterListener for MatchCounter {
    fn on_publication_matched(&self, _writer: GUID, status: &PublicationMatchedStatus) {
        self.0.fetch_add(status.current_count_change, Ordering::SeqCst);
    }
}

impl DataReaderListener for MatchCounter {}

#[test]
fn test_participant_listener_sees_match_and_unmatch() {
    let network = LoopbackNetwork::new();
    let a = participant(&network, "listened", 0);
    let counter = Arc::new(MatchCounter::default());
    a.set_listener(Arc::clone(&counter), StatusMask::PUBLICATION_MATCHED);
    let writer = a.create_writer::<Counter>("watched", QoS::reliable()).unwrap();

    let b = participant(&network, "peer", 1);
    let _reader = b.create_reader::<Counter>("watched", QoS::reliable()).unwrap();
    assert!(wait_for(WAIT, || counter.0.load(Ordering::SeqCst) == 1));

    drop(b);
    assert!(wait_for(WAIT, || counter.0.load(Ordering::SeqCst) == 0));
    assert_eq!(writer.publication_matched_status().unwrap().current_count, 0);
}
