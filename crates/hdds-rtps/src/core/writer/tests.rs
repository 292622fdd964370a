// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use super::*;
use crate::core::guid::{entity_kind, EntityId};
use crate::core::test_util::{wait_for, Capture};
use crate::protocol::{AckNack, SequenceNumberSet};
use crate::qos::ReliabilityTimes;
use crate::transport::Locator;

#[derive(Default)]
struct CountingSink {
    matched: AtomicU32,
    deadline: AtomicU32,
}

impl WriterStatusSink for CountingSink {
    fn publication_matched(&self, _writer: GUID, _status: &PublicationMatchedStatus) -> bool {
        self.matched.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn offered_deadline_missed(&self, _writer: GUID, _status: &DeadlineMissedStatus) -> bool {
        self.deadline.fetch_add(1, Ordering::SeqCst);
        true
    }
}

fn writer_guid() -> GUID {
    GUID::new([1; 12], EntityId::from_key(1, entity_kind::WRITER_NO_KEY))
}

fn reader_attrs(n: u8, reliable: bool) -> RemoteReaderAttributes {
    let guid = GUID::new([n; 12], EntityId::from_key(1, entity_kind::READER_NO_KEY));
    RemoteReaderAttributes::new(guid, vec![Locator::udpv4([127, 0, 0, n], 7411)], reliable)
}

fn immediate_times() -> ReliabilityTimes {
    ReliabilityTimes {
        nack_response_delay: Duration::ZERO,
        ..ReliabilityTimes::default()
    }
}

fn setup(qos: QoS) -> (TimedEventScheduler, Arc<Capture>, Arc<StatefulWriter>) {
    let scheduler = TimedEventScheduler::new().unwrap();
    let capture = Arc::new(Capture::default());
    let writer = StatefulWriter::new(
        writer_guid(),
        qos,
        &scheduler,
        Arc::clone(&capture) as Arc<dyn Transport>,
        Arc::new(()),
    );
    (scheduler, capture, writer)
}

fn write(writer: &StatefulWriter, byte: u8) -> Result<SequenceNumber> {
    writer.write_change(
        ChangeKind::Alive,
        InstanceHandle::NIL,
        Arc::from(vec![0, 1, 0, 0, byte]),
        Timestamp::now(),
    )
}

fn acknack(base: u64, missing: &[u64], count: u32) -> AckNack {
    let (set, _) = SequenceNumberSet::from_sequences(base, missing.iter().copied());
    AckNack {
        reader_id: EntityId::from_key(1, entity_kind::READER_NO_KEY),
        writer_id: writer_guid().entity_id,
        reader_sn_state: set,
        count,
        final_flag: false,
    }
}

#[test]
fn test_sequence_numbers_start_at_one_without_gaps() {
    let (_s, _c, writer) = setup(QoS::reliable().keep_last(10));
    let seqs: Vec<u64> = (0..5).map(|i| write(&writer, i).unwrap()).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    assert_eq!(writer.last_sn(), 5);
}

#[test]
fn test_best_effort_sends_and_releases() {
    let (_s, capture, writer) = setup(QoS::best_effort().keep_all());
    assert!(writer.matched_reader_add(reader_attrs(2, false)));
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    let data: Vec<u64> = capture
        .submessages()
        .into_iter()
        .filter_map(|s| match s {
            Submessage::Data(d) => Some(d.writer_sn),
            _ => None,
        })
        .collect();
    assert_eq!(data, vec![1, 2, 3]);
    assert!(!capture
        .submessages()
        .iter()
        .any(|s| matches!(s, Submessage::Heartbeat(_))));
    assert_eq!(writer.history_len(), 0);
}

#[test]
fn test_keep_all_full_blocks_then_times_out() {
    let qos = QoS::reliable()
        .keep_all()
        .max_samples(3)
        .max_blocking_time(Duration::from_millis(60));
    let (_s, _c, writer) = setup(qos);
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    let started = Instant::now();
    assert!(matches!(write(&writer, 4), Err(Error::Timeout)));
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(writer.rejected_count(), 1);
    assert_eq!(writer.last_sn(), 3);
}

#[test]
fn test_keep_all_full_fails_immediately_without_blocking_time() {
    let qos = QoS::reliable()
        .keep_all()
        .max_samples(3)
        .max_blocking_time(Duration::ZERO);
    let (_s, _c, writer) = setup(qos);
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    assert!(matches!(write(&writer, 4), Err(Error::ResourceLimitExceeded(_))));
    assert_eq!(writer.rejected_count(), 1);
}

#[test]
fn test_blocked_write_resumes_after_ack() {
    let qos = QoS::reliable()
        .keep_all()
        .max_samples(2)
        .max_blocking_time(Duration::from_secs(5));
    let (_s, _c, writer) = setup(qos);
    let reader = reader_attrs(2, true);
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    write(&writer, 1).unwrap();
    write(&writer, 2).unwrap();

    let acker = {
        let writer = Arc::clone(&writer);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            writer.on_acknack(reader_guid, &acknack(3, &[], 1));
        })
    };
    assert_eq!(write(&writer, 3).unwrap(), 3);
    acker.join().unwrap();
}

#[test]
fn test_acknack_advances_and_releases_history() {
    let (_s, _c, writer) = setup(QoS::reliable().keep_all());
    let reader = reader_attrs(2, true);
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    assert_eq!(writer.history_len(), 3);
    assert!(writer
        .wait_for_acknowledgments(Duration::from_millis(20))
        .is_err());

    writer.on_acknack(reader_guid, &acknack(4, &[], 1));
    assert_eq!(writer.reader_highest_acked(&reader_guid), Some(3));
    assert_eq!(writer.history_len(), 0);
    assert!(writer.is_acked_by_all(3));
    writer
        .wait_for_acknowledgments(Duration::from_millis(20))
        .unwrap();

    // An older ACKNACK never moves the floor back.
    writer.on_acknack(reader_guid, &acknack(2, &[], 2));
    assert_eq!(writer.reader_highest_acked(&reader_guid), Some(3));
}

#[test]
fn test_repairs_evicted_changes_with_gap() {
    let qos = QoS::reliable().keep_last(1).reliability_times(immediate_times());
    let (_s, capture, writer) = setup(qos);
    let reader = reader_attrs(2, true);
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    capture.clear();

    writer.on_acknack(reader_guid, &acknack(1, &[1, 2, 3], 1));
    let subs = capture.submessages();
    let repaired: Vec<u64> = subs
        .iter()
        .filter_map(|s| match s {
            Submessage::Data(d) => Some(d.writer_sn),
            _ => None,
        })
        .collect();
    let gapped: Vec<u64> = subs
        .iter()
        .filter_map(|s| match s {
            Submessage::Gap(g) => Some(g.irrelevant().collect::<Vec<_>>()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(repaired, vec![3]);
    assert_eq!(gapped, vec![1, 2]);
    assert!(subs.iter().any(|s| matches!(s, Submessage::Heartbeat(_))));
    // Repairs are unicast to the requesting reader.
    assert!(capture
        .sent
        .lock()
        .iter()
        .all(|(_, dst)| *dst == Locator::udpv4([127, 0, 0, 2], 7411)));
}

#[test]
fn test_transient_local_replays_history_to_late_joiner() {
    let (_s, capture, writer) = setup(QoS::reliable().keep_last(10).transient_local());
    for i in 0..3 {
        write(&writer, i).unwrap();
    }
    assert!(capture.sent.lock().is_empty());

    let mut late = reader_attrs(2, true);
    late.durability = Durability::TransientLocal;
    writer.matched_reader_add(late);
    let replayed: Vec<u64> = capture
        .submessages()
        .into_iter()
        .filter_map(|s| match s {
            Submessage::Data(d) => Some(d.writer_sn),
            _ => None,
        })
        .collect();
    assert_eq!(replayed, vec![1, 2, 3]);

    // A volatile reader only learns the range through a HEARTBEAT.
    writer.matched_reader_add(reader_attrs(3, true));
    let subs = capture.submessages_to(Locator::udpv4([127, 0, 0, 3], 7411));
    assert!(!subs.iter().any(|s| matches!(s, Submessage::Data(_))));
    let hb = subs
        .iter()
        .find_map(|s| match s {
            Submessage::Heartbeat(hb) => Some(*hb),
            _ => None,
        })
        .unwrap();
    assert_eq!((hb.first_sn, hb.last_sn), (4, 3));
}

#[test]
fn test_publication_matched_status() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let sink = Arc::new(CountingSink::default());
    let writer = StatefulWriter::new(
        writer_guid(),
        QoS::reliable(),
        &scheduler,
        Arc::new(Capture::default()),
        Arc::clone(&sink) as Arc<dyn WriterStatusSink>,
    );
    let reader = reader_attrs(2, true);
    let guid = reader.guid;
    assert!(writer.matched_reader_add(reader.clone()));
    assert!(!writer.matched_reader_add(reader));
    assert!(writer.matched_reader_remove(&guid));
    assert!(!writer.matched_reader_remove(&guid));
    assert_eq!(sink.matched.load(Ordering::SeqCst), 2);

    let status = writer.publication_matched_status();
    assert_eq!(status.total_count, 1);
    assert_eq!(status.total_count_change, 1);
    assert_eq!(status.current_count, 0);
    assert_eq!(status.current_count_change, 0);
    assert_eq!(status.last_subscription_handle, Some(guid));
    assert_eq!(writer.publication_matched_status().total_count_change, 0);
}

#[test]
fn test_incompatible_qos_recorded() {
    let (_s, _c, writer) = setup(QoS::best_effort());
    writer.record_incompatible_qos(QosPolicyId::Reliability);
    let status = writer.offered_incompatible_qos_status();
    assert_eq!(status.total_count, 1);
    assert_eq!(status.last_policy_id, QosPolicyId::Reliability);
    assert_eq!(writer.offered_incompatible_qos_status().total_count_change, 0);
}

#[test]
fn test_offered_deadline_missed() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let sink = Arc::new(CountingSink::default());
    let writer = StatefulWriter::new(
        writer_guid(),
        QoS::reliable().deadline(Duration::from_millis(30)),
        &scheduler,
        Arc::new(Capture::default()),
        Arc::clone(&sink) as Arc<dyn WriterStatusSink>,
    );
    write(&writer, 1).unwrap();
    assert!(wait_for(Duration::from_secs(2), || sink
        .deadline
        .load(Ordering::SeqCst)
        >= 1));
    let status = writer.offered_deadline_missed_status();
    assert!(status.total_count >= 1);
    assert_eq!(status.last_instance_handle, InstanceHandle::NIL);
}

#[test]
fn test_lifespan_drops_expired_changes() {
    let (_s, _c, writer) = setup(
        QoS::reliable()
            .keep_all()
            .lifespan(Duration::from_millis(30)),
    );
    write(&writer, 1).unwrap();
    write(&writer, 2).unwrap();
    assert_eq!(writer.history_len(), 2);
    assert!(wait_for(Duration::from_secs(2), || writer.history_len() == 0));
}

#[test]
fn test_periodic_heartbeat_until_acked() {
    let qos = QoS::reliable().heartbeat_period(Duration::from_millis(10));
    let (_s, capture, writer) = setup(qos);
    let reader = reader_attrs(2, true);
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    write(&writer, 1).unwrap();
    let heartbeats = || {
        capture
            .submessages()
            .iter()
            .filter(|s| matches!(s, Submessage::Heartbeat(_)))
            .count()
    };
    assert!(wait_for(Duration::from_secs(2), || heartbeats() >= 4));

    writer.on_acknack(reader_guid, &acknack(2, &[], 1));
    thread::sleep(Duration::from_millis(30));
    let settled = heartbeats();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(heartbeats(), settled);
}

#[test]
fn test_transient_local_keep_all_releases_acked_changes_when_full() {
    let qos = QoS::reliable()
        .keep_all()
        .transient_local()
        .max_samples(3)
        .max_blocking_time(Duration::from_millis(300));
    let (_s, _c, writer) = setup(qos);
    let mut reader = reader_attrs(2, true);
    reader.durability = Durability::TransientLocal;
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    for i in 0..3 {
        write(&writer, i).unwrap();
    }

    // Acknowledged changes stay around for late joiners until space is needed.
    writer.on_acknack(reader_guid, &acknack(4, &[], 1));
    writer
        .wait_for_acknowledgments(Duration::from_millis(20))
        .unwrap();
    assert_eq!(writer.history_len(), 3);

    let started = Instant::now();
    assert_eq!(write(&writer, 4).unwrap(), 4);
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(writer.history_len(), 3);
    assert_eq!(writer.rejected_count(), 0);
}

#[test]
fn test_transient_local_keep_all_keeps_unacked_changes() {
    let qos = QoS::reliable()
        .keep_all()
        .transient_local()
        .max_samples(2)
        .max_blocking_time(Duration::ZERO);
    let (_s, _c, writer) = setup(qos);
    let reader = reader_attrs(2, true);
    let reader_guid = reader.guid;
    writer.matched_reader_add(reader);
    write(&writer, 1).unwrap();
    write(&writer, 2).unwrap();

    // Only seq 1 is acknowledged: it makes room for exactly one more change.
    writer.on_acknack(reader_guid, &acknack(2, &[], 1));
    assert_eq!(write(&writer, 3).unwrap(), 3);
    assert!(matches!(write(&writer, 4), Err(Error::ResourceLimitExceeded(_))));
    assert_eq!(writer.history_len(), 2);
}

#[test]
fn test_failed_destination_does_not_block_other_readers() {
    let (_s, capture, writer) = setup(QoS::reliable().reliability_times(immediate_times()));
    let healthy = Locator::udpv4([127, 0, 0, 2], 7411);
    let broken = Locator::udpv4([127, 0, 0, 3], 7411);
    writer.matched_reader_add(reader_attrs(2, true));
    let failing = reader_attrs(3, true);
    let failing_guid = failing.guid;
    writer.matched_reader_add(failing);

    capture.fail_to(broken);
    write(&writer, 7).unwrap();
    let delivered = |dst: Locator| -> Vec<u64> {
        capture
            .submessages_to(dst)
            .into_iter()
            .filter_map(|s| match s {
                Submessage::Data(d) => Some(d.writer_sn),
                _ => None,
            })
            .collect()
    };
    assert_eq!(delivered(healthy), vec![1]);
    assert!(delivered(broken).is_empty());

    // The next ACKNACK round repairs the reader that missed it.
    capture.restore(&broken);
    writer.on_acknack(failing_guid, &acknack(1, &[1], 1));
    assert_eq!(delivered(broken), vec![1]);
    assert_eq!(delivered(healthy), vec![1]);
}

#[test]
fn test_closed_writer_rejects_writes_and_drops_readers() {
    let (_s, capture, writer) = setup(QoS::reliable().heartbeat_period(Duration::from_millis(10)));
    writer.matched_reader_add(reader_attrs(2, true));
    write(&writer, 1).unwrap();

    writer.close();
    assert!(writer.is_closed());
    assert!(writer.matched_readers().is_empty());
    assert!(matches!(write(&writer, 2), Err(Error::AlreadyDeleted)));
    assert!(matches!(
        writer.wait_for_acknowledgments(Duration::from_millis(10)),
        Err(Error::AlreadyDeleted)
    ));
    assert!(!writer.matched_reader_add(reader_attrs(3, true)));
    assert_eq!(writer.last_sn(), 1);

    // Timers are cancelled: nothing more goes out.
    capture.clear();
    thread::sleep(Duration::from_millis(50));
    assert!(capture.sent.lock().is_empty());
    writer.close();
}

#[test]
fn test_close_wakes_blocked_writer() {
    let qos = QoS::reliable()
        .keep_all()
        .max_samples(1)
        .max_blocking_time(Duration::from_secs(5));
    let (_s, _c, writer) = setup(qos);
    writer.matched_reader_add(reader_attrs(2, true));
    write(&writer, 1).unwrap();

    let closer = {
        let writer = Arc::clone(&writer);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            writer.close();
        })
    };
    let started = Instant::now();
    assert!(matches!(write(&writer, 2), Err(Error::AlreadyDeleted)));
    assert!(started.elapsed() < Duration::from_secs(5));
    closer.join().unwrap();
}
