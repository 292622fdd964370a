// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-side history: assigns sequence numbers and holds changes until they are
//! acknowledged, superseded or expired.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::HistoryCache;
use crate::core::cache_change::{
    CacheChange, ChangeKind, SampleIdentity, SequenceNumber, SEQUENCENUMBER_UNKNOWN,
};
use crate::core::guid::{InstanceHandle, GUID};
use crate::core::time::Timestamp;
use crate::dds::listener::SampleRejectedReason;
use crate::qos::{History, Lifespan, ResourceLimits};

pub struct WriterHistory {
    guid: GUID,
    cache: HistoryCache<()>,
    /// Sequence numbers currently held, mirrors `cache`.
    seqs: BTreeSet<SequenceNumber>,
    last_sn: SequenceNumber,
    rejected: u64,
}

impl WriterHistory {
    pub fn new(guid: GUID, history: History, limits: ResourceLimits) -> Self {
        Self {
            guid,
            cache: HistoryCache::new(history, limits),
            seqs: BTreeSet::new(),
            last_sn: SEQUENCENUMBER_UNKNOWN,
            rejected: 0,
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    /// Admit a new change. The sequence number is consumed only on success, so
    /// successive successful writes are numbered without gaps.
    pub fn add_change(
        &mut self,
        kind: ChangeKind,
        instance: InstanceHandle,
        payload: Arc<[u8]>,
        timestamp: Timestamp,
    ) -> Result<SequenceNumber, SampleRejectedReason> {
        let seq = self.last_sn + 1;
        let change =
            CacheChange::new(kind, self.guid, seq, instance, payload).with_timestamp(timestamp);
        match self.cache.add(change, (), 0) {
            Ok(evicted) => {
                if let Some(slot) = evicted {
                    log::trace!(
                        "[history] writer {} evicted seq={} (KEEP_LAST)",
                        self.guid,
                        slot.change.sequence_number
                    );
                    self.seqs.remove(&slot.change.sequence_number);
                }
                self.last_sn = seq;
                self.seqs.insert(seq);
                Ok(seq)
            }
            Err(reason) => {
                self.rejected += 1;
                log::debug!(
                    "[history] writer {} rejected change: {:?} ({} held)",
                    self.guid,
                    reason,
                    self.cache.len()
                );
                Err(reason)
            }
        }
    }

    /// Check admission without consuming a sequence number.
    pub fn can_admit(&self, instance: &InstanceHandle) -> bool {
        self.cache.admission(instance, 0).is_ok()
    }

    pub fn remove_change(&mut self, seq: SequenceNumber) -> bool {
        let removed = self
            .cache
            .remove(&SampleIdentity::new(self.guid, seq))
            .is_some();
        if removed {
            self.seqs.remove(&seq);
        }
        removed
    }

    /// Drop every change with sequence number `<= seq`. Returns how many went.
    pub fn remove_acked_up_to(&mut self, seq: SequenceNumber) -> usize {
        let victims: Vec<SequenceNumber> = self.seqs.range(..=seq).copied().collect();
        victims
            .into_iter()
            .filter(|s| self.remove_change(*s))
            .count()
    }

    /// Drop changes whose lifespan expired at `now`. Returns the removed sequence numbers.
    pub fn remove_expired(&mut self, lifespan: &Lifespan, now: Timestamp) -> Vec<SequenceNumber> {
        if lifespan.is_infinite() {
            return Vec::new();
        }
        let removed: Vec<SequenceNumber> = self
            .cache
            .remove_where(|slot| lifespan.is_expired(slot.change.source_timestamp, now))
            .into_iter()
            .map(|slot| slot.change.sequence_number)
            .collect();
        for seq in &removed {
            self.seqs.remove(seq);
        }
        removed
    }

    pub fn get_change(&self, seq: SequenceNumber) -> Option<&CacheChange> {
        self.cache
            .get(&SampleIdentity::new(self.guid, seq))
            .map(|slot| &slot.change)
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        self.seqs.contains(&seq)
    }

    pub fn get_earliest_change(&self) -> Option<&CacheChange> {
        self.cache.first().map(|(_, slot)| &slot.change)
    }

    /// First change with sequence number strictly greater than `seq`; drives the
    /// per-reader send cursor.
    pub fn next_change_after(&self, seq: SequenceNumber) -> Option<&CacheChange> {
        let next = self.seqs.range(seq.saturating_add(1)..).next()?;
        self.get_change(*next)
    }

    /// Lowest held sequence number, or `last_sn + 1` when empty (RTPS HEARTBEAT rule).
    pub fn first_sn(&self) -> SequenceNumber {
        self.seqs
            .iter()
            .next()
            .copied()
            .unwrap_or(self.last_sn + 1)
    }

    /// Last sequence number ever assigned.
    pub fn last_sn(&self) -> SequenceNumber {
        self.last_sn
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.cache.is_full()
    }

    /// Number of rejected `add_change` attempts.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Held changes in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheChange> + '_ {
        self.cache.iter().map(|(_, slot)| &slot.change)
    }

    /// Timestamp of the oldest held change.
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.cache.first().map(|(_, slot)| slot.change.source_timestamp)
    }
}
