// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::Arc;

use super::*;
use crate::core::cache_change::ChangeKind;
use crate::core::guid::{EntityId, GUID};
use crate::core::time::Timestamp;
use crate::qos::Lifespan;

fn writer_guid(n: u8) -> GUID {
    GUID::new([n; 12], EntityId::from_key(1, 0x02))
}

fn key(n: u8) -> InstanceHandle {
    let mut h = [0u8; 16];
    h[0] = n;
    InstanceHandle(h)
}

fn payload(n: u8) -> Arc<[u8]> {
    Arc::from(vec![0x00, 0x01, 0x00, 0x00, n])
}

fn change(writer: u8, seq: u64, instance: InstanceHandle) -> CacheChange {
    CacheChange::new(ChangeKind::Alive, writer_guid(writer), seq, instance, payload(seq as u8))
}

fn limits(max_samples: usize, max_instances: usize, per_instance: usize) -> ResourceLimits {
    ResourceLimits {
        max_samples,
        max_instances,
        max_samples_per_instance: per_instance,
    }
}

// ============================================================================
// HistoryCache admission
// ============================================================================

#[test]
fn test_keep_last_per_instance_depth() {
    let mut cache: HistoryCache<()> =
        HistoryCache::new(History::KeepLast(2), ResourceLimits::unlimited());
    for seq in 1..=5 {
        cache.add(change(1, seq, key(1)), (), 0).unwrap();
        cache.add(change(1, 100 + seq, key(2)), (), 0).unwrap();
        assert!(cache.instance_len(&key(1)) <= 2);
        assert!(cache.instance_len(&key(2)) <= 2);
    }
    let seqs: Vec<u64> = cache
        .iter()
        .filter(|(_, s)| s.change.instance_handle == key(1))
        .map(|(_, s)| s.change.sequence_number)
        .collect();
    assert_eq!(seqs, vec![4, 5]);
}

#[test]
fn test_keep_last_unkeyed_single_list() {
    let mut cache: HistoryCache<()> =
        HistoryCache::new(History::KeepLast(3), ResourceLimits::unlimited());
    for seq in 1..=10 {
        cache.add(change(1, seq, InstanceHandle::NIL), (), 0).unwrap();
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.first().unwrap().1.change.sequence_number, 8);
}

#[test]
fn test_keep_last_at_capacity_evicts_then_admits() {
    let mut cache: HistoryCache<()> = HistoryCache::new(History::KeepLast(5), limits(3, 10, 5));
    cache.add(change(1, 1, key(1)), (), 0).unwrap();
    cache.add(change(1, 2, key(2)), (), 0).unwrap();
    cache.add(change(1, 3, key(3)), (), 0).unwrap();
    assert_eq!(cache.len(), 3);

    // New instance at global capacity: oldest overall goes.
    let evicted = cache.add(change(1, 4, key(4)), (), 0).unwrap().unwrap();
    assert_eq!(evicted.change.sequence_number, 1);
    assert_eq!(cache.len(), 3);

    // Existing instance at capacity: its own oldest goes.
    let evicted = cache.add(change(1, 5, key(3)), (), 0).unwrap().unwrap();
    assert_eq!(evicted.change.sequence_number, 3);
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_keep_all_at_capacity_rejects_unchanged() {
    let mut cache: HistoryCache<()> = HistoryCache::new(History::KeepAll, limits(3, 10, 10));
    for seq in 1..=3 {
        cache.add(change(1, seq, key(seq as u8)), (), 0).unwrap();
    }
    let err = cache.add(change(1, 4, key(9)), (), 0).unwrap_err();
    assert_eq!(err, SampleRejectedReason::RejectedBySamplesLimit);
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(&SampleIdentity::new(writer_guid(1), 4)));
}

#[test]
fn test_keep_all_limits_reasons() {
    let mut cache: HistoryCache<()> = HistoryCache::new(History::KeepAll, limits(100, 2, 2));
    cache.add(change(1, 1, key(1)), (), 0).unwrap();
    cache.add(change(1, 2, key(1)), (), 0).unwrap();
    assert_eq!(
        cache.admission(&key(1), 0),
        Err(SampleRejectedReason::RejectedBySamplesPerInstanceLimit)
    );
    cache.add(change(1, 3, key(2)), (), 0).unwrap();
    assert_eq!(
        cache.admission(&key(3), 0),
        Err(SampleRejectedReason::RejectedByInstancesLimit)
    );
}

#[test]
fn test_keep_all_reserved_slots() {
    let cache: HistoryCache<()> = HistoryCache::new(History::KeepAll, limits(3, 10, 10));
    assert!(cache.admission(&key(1), 2).is_ok());
    assert_eq!(
        cache.admission(&key(1), 3),
        Err(SampleRejectedReason::RejectedBySamplesLimit)
    );
}

#[test]
fn test_instance_slot_freed_on_removal() {
    let mut cache: HistoryCache<()> = HistoryCache::new(History::KeepAll, limits(10, 1, 10));
    cache.add(change(1, 1, key(1)), (), 0).unwrap();
    assert!(cache.admission(&key(2), 0).is_err());
    cache.remove(&SampleIdentity::new(writer_guid(1), 1)).unwrap();
    assert_eq!(cache.instance_count(), 0);
    assert!(cache.admission(&key(2), 0).is_ok());
}

// ============================================================================
// WriterHistory
// ============================================================================

#[test]
fn test_writer_sequence_numbers_contiguous() {
    let mut history = WriterHistory::new(writer_guid(1), History::KeepAll, limits(2, 10, 10));
    let a = history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(1), Timestamp::now())
        .unwrap();
    let b = history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(2), Timestamp::now())
        .unwrap();
    assert_eq!((a, b), (1, 2));

    assert!(history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(3), Timestamp::now())
        .is_err());
    assert_eq!(history.rejected_count(), 1);
    assert_eq!(history.last_sn(), 2);

    assert_eq!(history.remove_acked_up_to(1), 1);
    let c = history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(3), Timestamp::now())
        .unwrap();
    assert_eq!(c, 3);
    assert_eq!(history.first_sn(), 2);
}

#[test]
fn test_writer_cursor_skips_evicted() {
    let mut history = WriterHistory::new(
        writer_guid(1),
        History::KeepLast(2),
        ResourceLimits::unlimited(),
    );
    for n in 1..=4 {
        history
            .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(n), Timestamp::now())
            .unwrap();
    }
    assert!(!history.contains(1));
    assert_eq!(history.next_change_after(0).unwrap().sequence_number, 3);
    assert_eq!(history.next_change_after(3).unwrap().sequence_number, 4);
    assert!(history.next_change_after(4).is_none());
    assert_eq!(history.get_earliest_change().unwrap().sequence_number, 3);
}

#[test]
fn test_writer_first_sn_when_empty() {
    let mut history =
        WriterHistory::new(writer_guid(1), History::KeepAll, ResourceLimits::unlimited());
    assert_eq!(history.first_sn(), 1);
    assert_eq!(history.last_sn(), 0);
    history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(1), Timestamp::now())
        .unwrap();
    assert!(history.remove_change(1));
    assert!(!history.remove_change(1));
    assert_eq!(history.first_sn(), 2);
}

#[test]
fn test_writer_lifespan_expiry() {
    let mut history =
        WriterHistory::new(writer_guid(1), History::KeepAll, ResourceLimits::unlimited());
    let old = Timestamp::from_nanos(1_000);
    let fresh = Timestamp::from_nanos(10_000_000_000);
    history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(1), old)
        .unwrap();
    history
        .add_change(ChangeKind::Alive, InstanceHandle::NIL, payload(2), fresh)
        .unwrap();
    let lifespan = Lifespan::from_millis(1_000);
    let removed = history.remove_expired(&lifespan, Timestamp::from_nanos(5_000_000_000));
    assert_eq!(removed, vec![1]);
    assert_eq!(history.len(), 1);
}

// ============================================================================
// ReaderHistory
// ============================================================================

#[test]
fn test_reader_duplicate_is_noop() {
    let mut history = ReaderHistory::new(History::KeepAll, ResourceLimits::unlimited());
    assert_eq!(history.received_change(change(1, 1, key(1)), 0), Ok(true));
    assert_eq!(history.received_change(change(1, 1, key(1)), 0), Ok(false));
    assert_eq!(history.len(), 1);
    assert_eq!(history.sample_rejected_status().total_count, 0);
}

#[test]
fn test_reader_rejection_counted_once_per_sample() {
    let mut history = ReaderHistory::new(History::KeepAll, limits(1, 10, 10));
    history.received_change(change(1, 1, key(1)), 0).unwrap();
    for _ in 0..3 {
        assert_eq!(
            history.received_change(change(1, 2, key(1)), 0),
            Err(SampleRejectedReason::RejectedBySamplesLimit)
        );
    }
    let status = history.take_sample_rejected_status();
    assert_eq!(status.total_count, 1);
    assert_eq!(status.total_count_change, 1);
    assert_eq!(status.last_seq_num, 2);
    assert_eq!(status.last_instance_handle, key(1));
    assert_eq!(status.last_reason, SampleRejectedReason::RejectedBySamplesLimit);
    assert_eq!(history.sample_rejected_status().total_count_change, 0);

    history.received_change(change(1, 3, key(1)), 0).unwrap_err();
    assert_eq!(history.sample_rejected_status().total_count, 2);
}

#[test]
fn test_reader_read_then_take() {
    let mut history = ReaderHistory::new(History::KeepAll, ResourceLimits::unlimited());
    for seq in 1..=3 {
        history.received_change(change(1, seq, key(1)), 0).unwrap();
    }
    assert!(history.has_unread());

    let (first, info) = history.get_next_unread().unwrap();
    assert_eq!(first.sequence_number, 1);
    assert_eq!(info.sample_state, SampleState::NotRead);
    assert_eq!(info.view_state, ViewState::New);

    let read = history.read(10);
    assert_eq!(read.len(), 3);
    assert_eq!(read[0].1.sample_state, SampleState::Read);
    assert_eq!(read[1].1.sample_state, SampleState::NotRead);
    assert_eq!(read[0].1.view_state, ViewState::NotNew);
    assert_eq!(read[0].1.sample_rank, 2);
    assert_eq!(read[2].1.sample_rank, 0);
    assert!(!history.has_unread());
    assert!(history.get_next_unread().is_none());

    let taken = history.take(2);
    assert_eq!(taken.len(), 2);
    assert_eq!(history.len(), 1);
    let (last, _) = history.get_next_untaken().unwrap();
    assert_eq!(last.sequence_number, 3);
    assert!(history.is_empty());
}

#[test]
fn test_reader_generation_ranks() {
    let mut history = ReaderHistory::new(History::KeepAll, ResourceLimits::unlimited());
    let w = writer_guid(1);
    history.received_change(change(1, 1, key(1)), 0).unwrap();
    let dispose = CacheChange::new(ChangeKind::NotAliveDisposed, w, 2, key(1), payload(0));
    history.received_change(dispose, 0).unwrap();
    assert_eq!(
        history.instance_state(&key(1)),
        Some(InstanceState::NotAliveDisposed)
    );
    history.received_change(change(1, 3, key(1)), 0).unwrap();

    let samples = history.take(10);
    assert_eq!(samples.len(), 3);
    let first = &samples[0].1;
    assert_eq!(first.disposed_generation_count, 0);
    assert_eq!(first.generation_rank, 1);
    assert_eq!(first.absolute_generation_rank, 1);
    assert_eq!(first.instance_state, InstanceState::Alive);
    assert!(!samples[1].1.valid_data);
    let last = &samples[2].1;
    assert_eq!(last.disposed_generation_count, 1);
    assert_eq!(last.generation_rank, 0);
    assert_eq!(last.sample_rank, 0);
}

#[test]
fn test_reader_writer_removed_marks_no_writers() {
    let mut history = ReaderHistory::new(History::KeepLast(1), ResourceLimits::unlimited());
    history.received_change(change(1, 1, key(1)), 0).unwrap();
    history.received_change(change(2, 1, key(2)), 0).unwrap();
    let affected = history.writer_removed(&writer_guid(1));
    assert_eq!(affected, vec![key(1)]);
    assert_eq!(
        history.instance_state(&key(1)),
        Some(InstanceState::NotAliveNoWriters)
    );
    assert_eq!(history.instance_state(&key(2)), Some(InstanceState::Alive));
}

#[test]
fn test_reader_keep_last_depth_invariant() {
    let mut history = ReaderHistory::new(History::KeepLast(3), ResourceLimits::unlimited());
    for seq in 1..=50u64 {
        let instance = key((seq % 4) as u8);
        history.received_change(change(1, seq, instance), 0).unwrap();
        for k in 0..4 {
            assert!(history.instance_len(&key(k)) <= 3);
        }
    }
    assert_eq!(history.len(), 12);
}

#[test]
fn test_reader_take_next_unread_skips_read() {
    let mut history = ReaderHistory::new(History::KeepAll, ResourceLimits::unlimited());
    history.received_change(change(1, 1, key(1)), 0).unwrap();
    history.received_change(change(1, 2, key(1)), 0).unwrap();
    history.get_next_unread().unwrap();
    let (c, info) = history.take_next_unread().unwrap();
    assert_eq!(c.sequence_number, 2);
    assert_eq!(info.sample_state, SampleState::NotRead);
    assert_eq!(history.len(), 1);
    assert!(history.take_next_unread().is_none());
}
