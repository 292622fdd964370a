// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Messages built under an endpoint lock and sent once it is released.

use crate::core::cache_change::CacheChange;
use crate::core::guid::{EntityId, GuidPrefix};
use crate::core::time::Timestamp;
use crate::protocol::seq_set::MAX_BITMAP_BITS;
use crate::protocol::{Data, Gap, InfoDst, InfoTs, InlineQos, RtpsMessage, Submessage};
use crate::transport::{Locator, Transport};

/// Room kept for headers when packing changes into one datagram.
const PACKING_LIMIT: usize = crate::config::MAX_PACKET_SIZE - 1024;

/// One datagram and where it goes.
#[derive(Debug)]
pub(crate) struct Outgoing {
    pub bytes: Vec<u8>,
    pub destinations: Vec<Locator>,
}

/// Builds an RTPS message addressed to one remote participant.
pub(crate) struct MessageBuilder {
    message: RtpsMessage,
    approx_len: usize,
}

impl MessageBuilder {
    pub fn new(local: GuidPrefix, remote: Option<GuidPrefix>) -> Self {
        let mut message = RtpsMessage::new(local);
        if let Some(guid_prefix) = remote {
            message.push(Submessage::InfoDst(InfoDst { guid_prefix }));
        }
        Self {
            message,
            approx_len: 20,
        }
    }

    pub fn push(&mut self, sub: Submessage) {
        self.approx_len += 64;
        self.message.push(sub);
    }

    /// Whether a change of `payload_len` bytes still fits next to what is queued.
    pub fn has_room_for(&self, payload_len: usize) -> bool {
        self.message.submessages.len() <= 1 || self.approx_len + payload_len + 64 <= PACKING_LIMIT
    }

    /// INFO_TS + DATA for one change.
    pub fn push_change(&mut self, change: &CacheChange, reader_id: EntityId, keyed: bool) {
        self.approx_len += change.payload.len() + 96;
        self.message.push(Submessage::InfoTs(InfoTs {
            timestamp: Some(change.source_timestamp),
        }));
        self.message.push(Submessage::Data(data_for(change, reader_id, keyed)));
    }

    pub fn is_empty(&self) -> bool {
        !self
            .message
            .submessages
            .iter()
            .any(|s| !matches!(s, Submessage::InfoDst(_)))
    }

    pub fn finish(self, destinations: Vec<Locator>) -> Option<Outgoing> {
        if self.is_empty() || destinations.is_empty() {
            return None;
        }
        Some(Outgoing {
            bytes: self.message.encode(),
            destinations,
        })
    }
}

/// DATA submessage for a change. NOT_ALIVE changes carry the serialized key and
/// STATUS_INFO; keyed topics always carry KEY_HASH.
pub(crate) fn data_for(change: &CacheChange, reader_id: EntityId, keyed: bool) -> Data {
    let inline_qos = InlineQos {
        key_hash: (keyed && !change.instance_handle.is_nil()).then_some(change.instance_handle),
        status_info: change.kind.to_status_info(),
    };
    Data {
        reader_id,
        writer_id: change.writer_guid.entity_id,
        writer_sn: change.sequence_number,
        inline_qos,
        serialized_payload: (!change.payload.is_empty()).then(|| change.payload.to_vec()),
        key_only: !change.kind.is_alive(),
    }
}

/// GAP submessages covering `seqs` (ascending), split so each bitmap fits.
pub(crate) fn gap_submessages(reader_id: EntityId, writer_id: EntityId, seqs: &[u64]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut start = 0;
    while start < seqs.len() {
        let first = seqs[start];
        let end = seqs[start..]
            .iter()
            .position(|s| *s >= first + u64::from(MAX_BITMAP_BITS))
            .map_or(seqs.len(), |offset| start + offset);
        if let Some(gap) = Gap::from_sequences(reader_id, writer_id, &seqs[start..end]) {
            gaps.push(gap);
        }
        start = end;
    }
    gaps
}

/// Send every datagram; a failed destination does not stop the others.
pub(crate) fn flush(transport: &dyn Transport, outgoing: Vec<Outgoing>) -> usize {
    let mut failures = 0;
    for out in outgoing {
        for dst in &out.destinations {
            if !transport.send(&out.bytes, dst) {
                failures += 1;
                log::debug!("[transport] send of {} bytes to {} failed", out.bytes.len(), dst);
            }
        }
    }
    failures
}

/// Source timestamp for received changes lacking INFO_TS.
pub(crate) fn timestamp_or_now(ts: Option<Timestamp>) -> Timestamp {
    ts.unwrap_or_else(Timestamp::now)
}
