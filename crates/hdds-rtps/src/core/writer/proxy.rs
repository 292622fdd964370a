// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ReaderProxy - per-reader state kept by a StatefulWriter (RTPS Sec.8.4.7.5)
//!
//! Tracks, for one matched remote reader:
//! - the highest sequence number it acknowledged (monotonic)
//! - the sequence numbers it requested through ACKNACK
//! - the send cursor for changes not yet pushed to it

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::core::cache_change::SequenceNumber;
use crate::core::guid::GUID;
use crate::protocol::AckNack;
use crate::qos::Durability;
use crate::transport::Locator;

/// What a writer needs to know about a matched remote reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReaderAttributes {
    pub guid: GUID,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub reliable: bool,
    pub durability: Durability,
    pub expects_inline_qos: bool,
}

impl RemoteReaderAttributes {
    pub fn new(guid: GUID, locators: Vec<Locator>, reliable: bool) -> Self {
        Self {
            guid,
            unicast_locators: locators,
            multicast_locators: Vec::new(),
            reliable,
            durability: Durability::Volatile,
            expects_inline_qos: false,
        }
    }
}

/// Outcome of feeding one ACKNACK to a proxy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AckNackOutcome {
    /// The acknowledged floor moved.
    pub acked_advanced: bool,
    /// Sequence numbers newly requested for repair.
    pub requested: usize,
}

#[derive(Debug)]
pub struct ReaderProxy {
    attributes: RemoteReaderAttributes,
    /// Every sequence number `<= highest_acked` is acknowledged or irrelevant.
    highest_acked: SequenceNumber,
    /// Last sequence number pushed to this reader.
    highest_sent: SequenceNumber,
    /// Changes below this were never relevant to the reader.
    first_relevant: SequenceNumber,
    requested: BTreeSet<SequenceNumber>,
    last_acknack_count: Option<u32>,
    last_repair: Option<Instant>,
}

impl ReaderProxy {
    /// `start_after` is the last sequence number the reader will never see:
    /// the writer's `last_sn` for a volatile match, `first_sn - 1` to replay history.
    pub fn new(attributes: RemoteReaderAttributes, start_after: SequenceNumber) -> Self {
        Self {
            attributes,
            highest_acked: start_after,
            highest_sent: start_after,
            first_relevant: start_after + 1,
            requested: BTreeSet::new(),
            last_acknack_count: None,
            last_repair: None,
        }
    }

    pub fn guid(&self) -> GUID {
        self.attributes.guid
    }

    pub fn attributes(&self) -> &RemoteReaderAttributes {
        &self.attributes
    }

    pub fn is_reliable(&self) -> bool {
        self.attributes.reliable
    }

    /// Unicast if the reader announced any, multicast otherwise.
    pub fn destinations(&self) -> Vec<Locator> {
        if self.attributes.unicast_locators.is_empty() {
            self.attributes.multicast_locators.clone()
        } else {
            self.attributes.unicast_locators.clone()
        }
    }

    pub fn highest_acked(&self) -> SequenceNumber {
        self.highest_acked
    }

    pub fn highest_sent(&self) -> SequenceNumber {
        self.highest_sent
    }

    pub fn first_relevant(&self) -> SequenceNumber {
        self.first_relevant
    }

    /// Move the acknowledged floor; never goes backwards.
    pub fn acked_changes_set(&mut self, seq: SequenceNumber) -> bool {
        if seq <= self.highest_acked {
            return false;
        }
        self.highest_acked = seq;
        self.highest_sent = self.highest_sent.max(seq);
        self.requested = self.requested.split_off(&(seq + 1));
        true
    }

    pub fn is_acked(&self, seq: SequenceNumber) -> bool {
        seq <= self.highest_acked
    }

    pub fn mark_sent(&mut self, seq: SequenceNumber) {
        self.highest_sent = self.highest_sent.max(seq);
        if !self.attributes.reliable {
            // Best-effort readers never acknowledge; sending is all there is.
            self.highest_acked = self.highest_sent;
        }
    }

    /// Apply an ACKNACK. Stale or repeated counts are ignored; requests for
    /// sequence numbers beyond `last_sn` are dropped.
    pub fn on_acknack(
        &mut self,
        acknack: &AckNack,
        last_sn: SequenceNumber,
        nack_suppression: Duration,
        now: Instant,
    ) -> Option<AckNackOutcome> {
        if self
            .last_acknack_count
            .is_some_and(|last| acknack.count <= last)
        {
            return None;
        }
        self.last_acknack_count = Some(acknack.count);

        let base = acknack.reader_sn_state.base();
        let acked_advanced = self.acked_changes_set(base.saturating_sub(1).min(last_sn));

        let suppressed = !nack_suppression.is_zero()
            && self
                .last_repair
                .is_some_and(|at| now.saturating_duration_since(at) < nack_suppression);

        let mut requested = 0;
        if !suppressed {
            for seq in acknack.reader_sn_state.iter() {
                if seq > self.highest_acked && seq <= last_sn && self.requested.insert(seq) {
                    requested += 1;
                }
            }
        }
        Some(AckNackOutcome {
            acked_advanced,
            requested,
        })
    }

    pub fn has_requested(&self) -> bool {
        !self.requested.is_empty()
    }

    /// Drain the repair requests.
    pub fn take_requested(&mut self, now: Instant) -> Vec<SequenceNumber> {
        if !self.requested.is_empty() {
            self.last_repair = Some(now);
        }
        std::mem::take(&mut self.requested).into_iter().collect()
    }

    /// Sequence numbers in `(highest_sent, last_sn]` not yet pushed.
    pub fn has_unsent(&self, last_sn: SequenceNumber) -> bool {
        self.highest_sent < last_sn
    }

    pub fn has_unacked(&self, last_sn: SequenceNumber) -> bool {
        self.attributes.reliable && self.highest_acked < last_sn
    }
}
