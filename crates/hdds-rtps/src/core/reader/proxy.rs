// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WriterProxy - per-writer state kept by a StatefulReader (RTPS Sec.8.4.10.4)
//!
//! Sequence numbers from one writer fall into three groups:
//! - `<= floor`: delivered or irrelevant
//! - in `received`: arrived out of order (buffered in `pending`) or declared
//!   irrelevant by GAP
//! - anything else `<= known_max`: missing, requested through ACKNACK
//!
//! Loss is only counted once a HEARTBEAT told the proxy where the writer's range
//! starts; before that, holes below the first DATA may predate the match.
//!
//! Changes leave the proxy strictly in sequence-number order.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::core::cache_change::{CacheChange, SequenceNumber};
use crate::core::guid::{EntityId, GUID};
use crate::protocol::seq_set::MAX_BITMAP_BITS;
use crate::protocol::{AckNack, Gap, Heartbeat, SequenceNumberSet};
use crate::qos::{Durability, Liveliness};
use crate::transport::Locator;

/// What a reader needs to know about a matched remote writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWriterAttributes {
    pub guid: GUID,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub reliable: bool,
    pub durability: Durability,
    pub liveliness: Liveliness,
}

impl RemoteWriterAttributes {
    pub fn new(guid: GUID, locators: Vec<Locator>, reliable: bool) -> Self {
        Self {
            guid,
            unicast_locators: locators,
            multicast_locators: Vec::new(),
            reliable,
            durability: Durability::Volatile,
            liveliness: Liveliness::default(),
        }
    }
}

/// Result of a HEARTBEAT or GAP.
#[derive(Debug, Default)]
pub struct ProxyUpdate {
    /// Known-missing sequence numbers given up on.
    pub lost: u32,
    /// Buffered changes released by the floor moving past gaps.
    pub released: Vec<CacheChange>,
}

#[derive(Debug)]
pub struct WriterProxy {
    attributes: RemoteWriterAttributes,
    floor: SequenceNumber,
    received: BTreeSet<SequenceNumber>,
    pending: BTreeMap<SequenceNumber, CacheChange>,
    /// Highest sequence number known to exist (from DATA or HEARTBEAT).
    known_max: SequenceNumber,
    /// The first HEARTBEAT (or best-effort DATA) established where the stream starts.
    synced: bool,
    last_heartbeat_count: Option<u32>,
    acknack_count: u32,
    must_ack: bool,
    last_acknack: Option<Instant>,
}

impl WriterProxy {
    pub fn new(attributes: RemoteWriterAttributes) -> Self {
        Self {
            attributes,
            floor: 0,
            received: BTreeSet::new(),
            pending: BTreeMap::new(),
            known_max: 0,
            synced: false,
            last_heartbeat_count: None,
            acknack_count: 0,
            must_ack: false,
            last_acknack: None,
        }
    }

    pub fn guid(&self) -> GUID {
        self.attributes.guid
    }

    pub fn attributes(&self) -> &RemoteWriterAttributes {
        &self.attributes
    }

    pub fn is_reliable(&self) -> bool {
        self.attributes.reliable
    }

    pub fn destinations(&self) -> Vec<Locator> {
        if self.attributes.unicast_locators.is_empty() {
            self.attributes.multicast_locators.clone()
        } else {
            self.attributes.unicast_locators.clone()
        }
    }

    /// Highest sequence number such that everything up to it is delivered or irrelevant.
    pub fn floor(&self) -> SequenceNumber {
        self.floor
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_duplicate(&self, seq: SequenceNumber) -> bool {
        seq <= self.floor || self.received.contains(&seq)
    }

    /// Sequence numbers between the floor and `seq` that have not arrived.
    pub fn missing_below(&self, seq: SequenceNumber) -> usize {
        if seq <= self.floor + 1 {
            return 0;
        }
        let span = seq - self.floor - 1;
        let present = self.received.range(self.floor + 1..seq).count() as u64;
        usize::try_from(span.saturating_sub(present)).unwrap_or(usize::MAX)
    }

    pub fn has_missing(&self) -> bool {
        self.missing_below(self.known_max + 1) > 0
    }

    // ========================================================================
    // Reliable stream
    // ========================================================================

    /// Hold a change until everything before it is resolved.
    pub fn buffer(&mut self, change: CacheChange) {
        let seq = change.sequence_number;
        self.known_max = self.known_max.max(seq);
        self.received.insert(seq);
        self.pending.insert(seq, change);
    }

    /// Next change in order, if it is here. Irrelevant sequence numbers in front
    /// of it are skipped.
    pub fn pop_ready(&mut self) -> Option<CacheChange> {
        loop {
            let next = self.floor + 1;
            if !self.received.remove(&next) {
                return None;
            }
            self.floor = next;
            if let Some(change) = self.pending.remove(&next) {
                return Some(change);
            }
        }
    }

    /// The change just popped could not be stored; treat it as missing again.
    pub fn unreceive(&mut self, seq: SequenceNumber) {
        if seq == self.floor {
            self.floor -= 1;
        }
    }

    /// Apply a HEARTBEAT. `None` for a stale or repeated count.
    pub fn on_heartbeat(&mut self, hb: &Heartbeat) -> Option<ProxyUpdate> {
        if self.last_heartbeat_count.is_some_and(|last| hb.count <= last) {
            return None;
        }
        self.last_heartbeat_count = Some(hb.count);

        let mut update = ProxyUpdate::default();
        if hb.first_sn > self.floor + 1 {
            update = self.advance_to(hb.first_sn - 1);
        }
        self.synced = true;
        self.known_max = self.known_max.max(hb.last_sn);
        Some(update)
    }

    /// Apply a GAP: the listed sequence numbers will never be sent.
    pub fn on_gap(&mut self, gap: &Gap) -> ProxyUpdate {
        let mut update = ProxyUpdate::default();
        let contiguous_end = gap.gap_list.base();
        if gap.gap_start <= self.floor + 1 && contiguous_end > self.floor + 1 {
            update = self.advance_to(contiguous_end - 1);
        }
        for seq in gap.irrelevant().filter(|s| *s > self.floor) {
            if self.received.insert(seq) && self.synced && seq <= self.known_max {
                update.lost += 1;
            }
        }
        self.known_max = self.known_max.max(contiguous_end.saturating_sub(1));
        update
    }

    /// Everything up to `upto` is irrelevant unless already buffered. Buffered
    /// changes below it are released in order; known-missing ones count as lost.
    fn advance_to(&mut self, upto: SequenceNumber) -> ProxyUpdate {
        let mut update = ProxyUpdate::default();
        if upto <= self.floor {
            return update;
        }
        if self.synced {
            let known_upper = upto.min(self.known_max);
            if known_upper > self.floor {
                let span = known_upper - self.floor;
                let present = self.received.range(self.floor + 1..=known_upper).count() as u64;
                update.lost = u32::try_from(span.saturating_sub(present)).unwrap_or(u32::MAX);
            }
        }
        let keep = self.pending.split_off(&(upto + 1));
        update.released = std::mem::replace(&mut self.pending, keep)
            .into_values()
            .collect();
        self.received = self.received.split_off(&(upto + 1));
        self.floor = upto;
        update
    }

    // ========================================================================
    // Best-effort stream
    // ========================================================================

    /// Accept a best-effort change if it is newer than anything seen.
    /// Returns the number of sequence numbers skipped over, or `None` for a stale one.
    pub fn accept_best_effort(&mut self, seq: SequenceNumber) -> Option<u32> {
        if seq <= self.floor {
            return None;
        }
        let skipped = if self.synced {
            u32::try_from(seq - self.floor - 1).unwrap_or(u32::MAX)
        } else {
            0
        };
        self.synced = true;
        self.floor = seq;
        self.known_max = self.known_max.max(seq);
        Some(skipped)
    }

    // ========================================================================
    // ACKNACK
    // ========================================================================

    /// Request an ACKNACK unless one went out within `suppression`.
    pub fn request_ack(&mut self, suppression: Duration, now: Instant) -> bool {
        let suppressed = !suppression.is_zero()
            && self
                .last_acknack
                .is_some_and(|at| now.saturating_duration_since(at) < suppression);
        if !suppressed {
            self.must_ack = true;
        }
        self.must_ack
    }

    pub fn must_ack(&self) -> bool {
        self.must_ack
    }

    /// Build the ACKNACK: base is the first unresolved sequence number, the set
    /// lists what is missing up to the highest known one.
    pub fn make_acknack(&mut self, reader_id: EntityId, now: Instant) -> AckNack {
        let base = self.floor + 1;
        let limit = base + u64::from(MAX_BITMAP_BITS) - 1;
        let upper = self.known_max.min(limit);
        let missing = (base..=upper).filter(|s| !self.received.contains(s));
        let (set, _) = SequenceNumberSet::from_sequences(base, missing);
        self.acknack_count += 1;
        self.must_ack = false;
        self.last_acknack = Some(now);
        AckNack {
            reader_id,
            writer_id: self.attributes.guid.entity_id,
            final_flag: set.is_empty(),
            reader_sn_state: set,
            count: self.acknack_count,
        }
    }
}
