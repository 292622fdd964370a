// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::{AtomicU32, Ordering};

use super::*;
use crate::core::guid::{entity_kind, EntityId};
use crate::core::test_util::{wait_for, Capture};
use crate::dds::listener::SampleRejectedReason;
use crate::protocol::{AckNack, InlineQos};
use crate::qos::{Liveliness, ReliabilityTimes};
use crate::transport::Locator;

#[derive(Default)]
struct CountingSink {
    data_available: AtomicU32,
    lost: AtomicU32,
}

impl ReaderStatusSink for CountingSink {
    fn data_available(&self, _reader: GUID) {
        self.data_available.fetch_add(1, Ordering::SeqCst);
    }

    fn sample_lost(&self, _reader: GUID, _status: &SampleLostStatus) -> bool {
        self.lost.fetch_add(1, Ordering::SeqCst);
        true
    }
}

fn writer_guid(n: u8) -> GUID {
    GUID::new([n; 12], EntityId::from_key(1, entity_kind::WRITER_NO_KEY))
}

fn writer_locator(n: u8) -> Locator {
    Locator::udpv4([127, 0, 0, n], 7410)
}

fn writer_attrs(n: u8, reliable: bool) -> RemoteWriterAttributes {
    RemoteWriterAttributes::new(writer_guid(n), vec![writer_locator(n)], reliable)
}

fn immediate_times() -> ReliabilityTimes {
    ReliabilityTimes {
        heartbeat_response_delay: Duration::ZERO,
        heartbeat_supression_duration: Duration::ZERO,
        ..ReliabilityTimes::default()
    }
}

fn setup_with(
    qos: QoS,
    keyed: bool,
    sink: Arc<dyn ReaderStatusSink>,
) -> (TimedEventScheduler, Arc<Capture>, Arc<StatefulReader>) {
    let kind = if keyed {
        entity_kind::READER_WITH_KEY
    } else {
        entity_kind::READER_NO_KEY
    };
    let scheduler = TimedEventScheduler::new().unwrap();
    let capture = Arc::new(Capture::default());
    let reader = StatefulReader::new(
        GUID::new([9; 12], EntityId::from_key(1, kind)),
        qos,
        &scheduler,
        Arc::clone(&capture) as Arc<dyn Transport>,
        sink,
        None,
    );
    (scheduler, capture, reader)
}

fn setup(qos: QoS) -> (TimedEventScheduler, Arc<Capture>, Arc<StatefulReader>) {
    setup_with(qos, false, Arc::new(()))
}

fn data(n: u8, seq: u64) -> Data {
    Data {
        reader_id: EntityId::UNKNOWN,
        writer_id: writer_guid(n).entity_id,
        writer_sn: seq,
        inline_qos: InlineQos::default(),
        serialized_payload: Some(vec![0, 1, 0, 0, seq as u8]),
        key_only: false,
    }
}

fn keyed_data(n: u8, seq: u64, key: u8, kind: ChangeKind) -> Data {
    Data {
        inline_qos: InlineQos {
            key_hash: Some(InstanceHandle([key; 16])),
            status_info: kind.to_status_info(),
        },
        key_only: !kind.is_alive(),
        ..data(n, seq)
    }
}

fn hb(n: u8, first: u64, last: u64, count: u32, final_flag: bool) -> Heartbeat {
    Heartbeat {
        reader_id: EntityId::UNKNOWN,
        writer_id: writer_guid(n).entity_id,
        first_sn: first,
        last_sn: last,
        count,
        final_flag,
        liveliness_flag: false,
    }
}

fn gap(n: u8, seqs: &[u64]) -> Gap {
    Gap::from_sequences(EntityId::UNKNOWN, writer_guid(n).entity_id, seqs).unwrap()
}

fn acknacks(capture: &Capture, n: u8) -> Vec<AckNack> {
    capture
        .submessages_to(writer_locator(n))
        .into_iter()
        .filter_map(|s| match s {
            Submessage::AckNack(a) => Some(a),
            _ => None,
        })
        .collect()
}

fn taken_seqs(reader: &StatefulReader) -> Vec<u64> {
    reader
        .take(usize::MAX)
        .into_iter()
        .map(|(c, _)| c.sequence_number)
        .collect()
}

#[test]
fn test_in_order_delivery_ignores_duplicates() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    reader.matched_writer_add(writer_attrs(2, true));
    for seq in [1, 2, 2, 1] {
        reader.on_data(writer_guid(2), &data(2, seq), None);
    }
    assert_eq!(reader.history_len(), 2);
    assert_eq!(reader.writer_floor(&writer_guid(2)), Some(2));
    assert_eq!(reader.sample_lost_status().total_count, 0);
    assert_eq!(reader.sample_rejected_status().total_count, 0);
}

#[test]
fn test_out_of_order_held_until_hole_filled() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 3), None);
    reader.on_data(writer_guid(2), &data(2, 2), None);
    assert_eq!(reader.history_len(), 0);
    reader.on_data(writer_guid(2), &data(2, 1), None);
    assert_eq!(taken_seqs(&reader), vec![1, 2, 3]);
}

#[test]
fn test_heartbeat_requests_missing_sequences() {
    let (_s, capture, reader) = setup(QoS::reliable().keep_all().reliability_times(immediate_times()));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 2), None);
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 3, 1, false));

    let acks = acknacks(&capture, 2);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].reader_sn_state.base(), 1);
    assert_eq!(acks[0].reader_sn_state.iter().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(acks[0].count, 1);

    // a repeated count is ignored
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 3, 1, false));
    assert_eq!(acknacks(&capture, 2).len(), 1);
}

#[test]
fn test_final_heartbeat_with_nothing_missing_needs_no_ack() {
    let (_s, capture, reader) = setup(QoS::reliable().keep_all().reliability_times(immediate_times()));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), None);
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 1, 1, true));
    assert!(acknacks(&capture, 2).is_empty());

    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 1, 2, false));
    let acks = acknacks(&capture, 2);
    assert_eq!(acks.len(), 1);
    assert!(acks[0].final_flag);
    assert_eq!(acks[0].reader_sn_state.base(), 2);
}

#[test]
fn test_acknack_waits_for_response_delay() {
    let times = ReliabilityTimes {
        heartbeat_response_delay: Duration::from_millis(20),
        ..immediate_times()
    };
    let (_s, capture, reader) = setup(QoS::reliable().keep_all().reliability_times(times));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 2, 1, false));
    assert!(acknacks(&capture, 2).is_empty());
    assert!(wait_for(Duration::from_secs(2), || acknacks(&capture, 2).len() == 1));
}

#[test]
fn test_gap_over_known_missing_counts_as_lost() {
    let sink = Arc::new(CountingSink::default());
    let (_s, _c, reader) = setup_with(QoS::reliable().keep_all(), false, sink.clone());
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 3, 1, false));
    reader.on_gap(writer_guid(2), &gap(2, &[1, 2]));
    reader.on_data(writer_guid(2), &data(2, 3), None);

    assert_eq!(taken_seqs(&reader), vec![3]);
    assert_eq!(reader.sample_lost_status().total_count, 2);
    assert_eq!(sink.lost.load(Ordering::SeqCst), 1);
}

#[test]
fn test_gap_over_unknown_sequences_is_not_lost() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), None);
    reader.on_gap(writer_guid(2), &gap(2, &[2, 3]));
    reader.on_data(writer_guid(2), &data(2, 4), None);

    assert_eq!(taken_seqs(&reader), vec![1, 4]);
    assert_eq!(reader.sample_lost_status().total_count, 0);
}

#[test]
fn test_heartbeat_first_sn_past_missing_counts_as_lost() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 2, 1, false));
    reader.on_heartbeat(writer_guid(2), &hb(2, 3, 3, 2, false));
    assert_eq!(reader.sample_lost_status().total_count, 2);
    assert_eq!(reader.writer_floor(&writer_guid(2)), Some(2));
}

#[test]
fn test_keep_all_full_rejects_once_then_recovers() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all().max_samples(2));
    reader.matched_writer_add(writer_attrs(2, true));
    for seq in 1..=3 {
        reader.on_data(writer_guid(2), &data(2, seq), None);
    }
    assert_eq!(reader.history_len(), 2);
    assert_eq!(reader.writer_floor(&writer_guid(2)), Some(2));
    let rejected = reader.sample_rejected_status();
    assert_eq!(rejected.total_count, 1);
    assert_eq!(rejected.last_seq_num, 3);
    assert_ne!(rejected.last_reason, SampleRejectedReason::NotRejected);

    // the repair of the same sample is not counted twice
    reader.on_data(writer_guid(2), &data(2, 3), None);
    assert_eq!(reader.sample_rejected_status().total_count, 1);

    assert_eq!(reader.take(1).len(), 1);
    reader.on_data(writer_guid(2), &data(2, 3), None);
    assert_eq!(reader.history_len(), 2);
    assert_eq!(reader.writer_floor(&writer_guid(2)), Some(3));
    assert_eq!(reader.sample_rejected_status().total_count, 1);
}

#[test]
fn test_best_effort_skips_count_as_lost() {
    let (_s, _c, reader) = setup(QoS::best_effort().keep_all());
    // a reliable writer matched by a best-effort reader is served best-effort
    reader.matched_writer_add(writer_attrs(2, true));
    for seq in [1, 3, 2] {
        reader.on_data(writer_guid(2), &data(2, seq), None);
    }
    assert_eq!(taken_seqs(&reader), vec![1, 3]);
    assert_eq!(reader.sample_lost_status().total_count, 1);
}

#[test]
fn test_data_available_reported() {
    let sink = Arc::new(CountingSink::default());
    let (_s, _c, reader) = setup_with(QoS::reliable().keep_all(), false, sink.clone());
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), None);
    reader.on_data(writer_guid(2), &data(2, 1), None);
    assert_eq!(sink.data_available.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unmatched_writer_ignored() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    reader.on_data(writer_guid(4), &data(4, 1), None);
    assert_eq!(reader.history_len(), 0);
}

#[test]
fn test_subscription_matched_and_incompatible_qos() {
    let (_s, _c, reader) = setup(QoS::reliable());
    assert!(reader.matched_writer_add(writer_attrs(2, true)));
    assert!(!reader.matched_writer_add(writer_attrs(2, true)));
    assert!(reader.matched_writer_add(writer_attrs(3, true)));
    assert!(reader.matched_writer_remove(&writer_guid(2)));
    assert!(!reader.matched_writer_remove(&writer_guid(2)));

    let st = reader.subscription_matched_status();
    assert_eq!(st.total_count, 2);
    assert_eq!(st.current_count, 1);
    assert_eq!(st.current_count_change, 1);
    assert_eq!(st.last_publication_handle, Some(writer_guid(2)));
    assert_eq!(reader.subscription_matched_status().total_count_change, 0);
    assert_eq!(reader.matched_writers(), vec![writer_guid(3)]);

    reader.record_incompatible_qos(QosPolicyId::Reliability);
    let qos = reader.requested_incompatible_qos_status();
    assert_eq!(qos.total_count, 1);
    assert_eq!(qos.last_policy_id, QosPolicyId::Reliability);
}

#[test]
fn test_dispose_and_writer_removal_update_instance_state() {
    let (_s, _c, reader) = setup_with(QoS::reliable().keep_all(), true, Arc::new(()));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.matched_writer_add(writer_attrs(3, true));
    let a = InstanceHandle([7; 16]);
    let b = InstanceHandle([8; 16]);

    reader.on_data(writer_guid(2), &keyed_data(2, 1, 7, ChangeKind::Alive), None);
    reader.on_data(writer_guid(3), &keyed_data(3, 1, 8, ChangeKind::Alive), None);
    reader.on_data(writer_guid(3), &keyed_data(3, 2, 8, ChangeKind::NotAliveDisposed), None);
    assert_eq!(reader.instance_state(&a), Some(InstanceState::Alive));
    assert_eq!(reader.instance_state(&b), Some(InstanceState::NotAliveDisposed));

    reader.matched_writer_remove(&writer_guid(2));
    assert_eq!(reader.instance_state(&a), Some(InstanceState::NotAliveNoWriters));
}

#[test]
fn test_writer_liveliness_lost_and_regained() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all());
    let mut attrs = writer_attrs(2, true);
    attrs.liveliness = Liveliness::automatic(Duration::from_millis(150));
    reader.matched_writer_add(attrs);
    assert_eq!(reader.liveliness_changed_status().alive_count, 1);

    assert!(wait_for(Duration::from_secs(3), || {
        reader.liveliness_changed_status().not_alive_count == 1
    }));
    assert_eq!(
        reader.writer_liveliness(&writer_guid(2)),
        Some(LivelinessStatus::NotAsserted)
    );
    assert_eq!(reader.liveliness_changed_status().alive_count, 0);

    reader.on_data(writer_guid(2), &data(2, 1), None);
    let st = reader.liveliness_changed_status();
    assert_eq!((st.alive_count, st.not_alive_count), (1, 0));

    reader.matched_writer_remove(&writer_guid(2));
    let st = reader.liveliness_changed_status();
    assert_eq!((st.alive_count, st.not_alive_count), (0, 0));
}

#[test]
fn test_requested_deadline_missed() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all().deadline(Duration::from_millis(30)));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), None);
    assert!(wait_for(Duration::from_secs(2), || {
        reader.requested_deadline_missed_status().total_count >= 1
    }));
}

#[test]
fn test_lifespan_expires_samples() {
    let (_s, _c, reader) = setup(QoS::reliable().keep_all().lifespan(Duration::from_millis(30)));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), Some(Timestamp::now()));
    assert_eq!(reader.history_len(), 1);
    assert!(wait_for(Duration::from_secs(2), || reader.history_len() == 0));
}

#[test]
fn test_dispose_released_by_gap_stops_deadline_tracking() {
    let qos = QoS::reliable().keep_all().deadline(Duration::from_millis(40));
    let (_s, _c, reader) = setup_with(qos, true, Arc::new(()));
    reader.matched_writer_add(writer_attrs(2, true));
    let instance = InstanceHandle([7; 16]);

    reader.on_data(writer_guid(2), &keyed_data(2, 1, 7, ChangeKind::Alive), None);
    reader.on_data(writer_guid(2), &keyed_data(2, 3, 7, ChangeKind::NotAliveDisposed), None);
    assert_eq!(reader.instance_state(&instance), Some(InstanceState::Alive));
    reader.on_gap(writer_guid(2), &gap(2, &[2]));
    assert_eq!(
        reader.instance_state(&instance),
        Some(InstanceState::NotAliveDisposed)
    );

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(reader.requested_deadline_missed_status().total_count, 0);
}

#[test]
fn test_closed_reader_ignores_traffic() {
    let (_s, capture, reader) = setup(QoS::reliable().keep_all().reliability_times(immediate_times()));
    reader.matched_writer_add(writer_attrs(2, true));
    reader.on_data(writer_guid(2), &data(2, 1), None);

    reader.close();
    assert!(reader.is_closed());
    assert!(reader.matched_writers().is_empty());
    assert!(!reader.matched_writer_add(writer_attrs(3, true)));

    capture.clear();
    reader.on_data(writer_guid(2), &data(2, 2), None);
    reader.on_heartbeat(writer_guid(2), &hb(2, 1, 5, 1, false));
    assert_eq!(reader.history_len(), 1);
    assert!(acknacks(&capture, 2).is_empty());
    reader.close();
}
