// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Submessage codec: DATA, HEARTBEAT, ACKNACK, GAP, INFO_TS, INFO_DST.
//!
//! Every submessage we encode is little-endian and padded to a 4-byte boundary.
//! Decoding accepts either endianness and skips unknown submessage ids.

use super::codec::{ByteReader, ByteWriter};
use super::constants::*;
use super::parameter::ParameterList;
use super::seq_set::SequenceNumberSet;
use super::DecodeError;
use crate::core::guid::{EntityId, GuidPrefix, InstanceHandle};
use crate::core::time::Timestamp;

// ============================================================================
// Inline QoS
// ============================================================================

/// The inline QoS parameters the delivery engines understand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineQos {
    pub key_hash: Option<InstanceHandle>,
    /// STATUS_INFO flags (disposed / unregistered).
    pub status_info: Option<u32>,
}

impl InlineQos {
    pub fn is_empty(&self) -> bool {
        self.key_hash.is_none() && self.status_info.is_none()
    }

    fn to_parameter_list(&self) -> ParameterList {
        let mut pl = ParameterList::new();
        if let Some(kh) = &self.key_hash {
            pl.push_raw(PID_KEY_HASH, &kh.0);
        }
        if let Some(status) = self.status_info {
            // STATUS_INFO is always big-endian on the wire.
            pl.push_raw(PID_STATUS_INFO, &status.to_be_bytes());
        }
        pl
    }

    fn from_parameter_list(pl: &ParameterList) -> Self {
        let key_hash = pl
            .get(PID_KEY_HASH)
            .and_then(|v| v.get(..16))
            .and_then(|v| <[u8; 16]>::try_from(v).ok())
            .map(InstanceHandle);
        let status_info = pl
            .get(PID_STATUS_INFO)
            .and_then(|v| v.get(..4))
            .map(|v| u32::from_be_bytes([v[0], v[1], v[2], v[3]]));
        Self {
            key_hash,
            status_info,
        }
    }
}

// ============================================================================
// Submessages
// ============================================================================

/// DATA (Sec.8.3.7.2). `serialized_payload` includes the encapsulation header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub writer_sn: u64,
    pub inline_qos: InlineQos,
    pub serialized_payload: Option<Vec<u8>>,
    /// Payload is a serialized key rather than sample data.
    pub key_only: bool,
}

/// HEARTBEAT (Sec.8.3.7.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub first_sn: u64,
    pub last_sn: u64,
    pub count: u32,
    /// Writer does not require a response.
    pub final_flag: bool,
    /// Manual liveliness assertion.
    pub liveliness_flag: bool,
}

/// ACKNACK (Sec.8.3.7.1).
///
/// `reader_sn_state.base()` is the first sequence number not yet received; every
/// sequence number below it is acknowledged. Members of the set are missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckNack {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub reader_sn_state: SequenceNumberSet,
    pub count: u32,
    pub final_flag: bool,
}

/// GAP (Sec.8.3.7.4). Irrelevant: `[gap_start, gap_list.base())` plus the members of
/// `gap_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub gap_start: u64,
    pub gap_list: SequenceNumberSet,
}

impl Gap {
    /// GAP covering exactly the listed sequence numbers.
    pub fn from_sequences(reader_id: EntityId, writer_id: EntityId, seqs: &[u64]) -> Option<Self> {
        let first = *seqs.iter().min()?;
        // contiguous run from `first`
        let mut end = first;
        while seqs.contains(&end) {
            end += 1;
        }
        let (gap_list, fits) =
            SequenceNumberSet::from_sequences(end, seqs.iter().copied().filter(|s| *s >= end));
        if !fits {
            return None;
        }
        Some(Self {
            reader_id,
            writer_id,
            gap_start: first,
            gap_list,
        })
    }

    /// All irrelevant sequence numbers in ascending order.
    pub fn irrelevant(&self) -> impl Iterator<Item = u64> + '_ {
        (self.gap_start..self.gap_list.base()).chain(self.gap_list.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoTs {
    /// `None` when the invalidate flag is set.
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoDst {
    pub guid_prefix: GuidPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submessage {
    Data(Data),
    Heartbeat(Heartbeat),
    AckNack(AckNack),
    Gap(Gap),
    InfoTs(InfoTs),
    InfoDst(InfoDst),
    /// Recognised framing but unsupported id; skipped by receivers.
    Unknown { id: u8 },
}

// ============================================================================
// Encoding
// ============================================================================

impl Submessage {
    pub(crate) fn encode_into(&self, w: &mut ByteWriter) {
        let start = w.len();
        let (id, flags) = self.id_and_flags();
        w.put_u8(id);
        w.put_u8(flags | FLAG_ENDIANNESS);
        w.put_u16(0); // patched below

        match self {
            Submessage::Data(d) => {
                w.put_u16(0); // extraFlags
                w.put_u16(DATA_OCTETS_TO_INLINE_QOS);
                w.put_bytes(&d.reader_id.0);
                w.put_bytes(&d.writer_id.0);
                w.put_seq(d.writer_sn);
                if !d.inline_qos.is_empty() {
                    d.inline_qos.to_parameter_list().encode_into(w);
                }
                if let Some(payload) = &d.serialized_payload {
                    w.put_bytes(payload);
                }
            }
            Submessage::Heartbeat(hb) => {
                w.put_bytes(&hb.reader_id.0);
                w.put_bytes(&hb.writer_id.0);
                w.put_seq(hb.first_sn);
                w.put_seq(hb.last_sn);
                w.put_u32(hb.count);
            }
            Submessage::AckNack(an) => {
                w.put_bytes(&an.reader_id.0);
                w.put_bytes(&an.writer_id.0);
                an.reader_sn_state.encode(w);
                w.put_u32(an.count);
            }
            Submessage::Gap(gap) => {
                w.put_bytes(&gap.reader_id.0);
                w.put_bytes(&gap.writer_id.0);
                w.put_seq(gap.gap_start);
                gap.gap_list.encode(w);
            }
            Submessage::InfoTs(ts) => {
                if let Some(t) = ts.timestamp {
                    let (secs, frac) = t.to_wire();
                    w.put_i32(secs);
                    w.put_u32(frac);
                }
            }
            Submessage::InfoDst(dst) => w.put_bytes(&dst.guid_prefix),
            Submessage::Unknown { .. } => {}
        }

        w.align(4);
        let body_len = w.len() - start - SUBMESSAGE_HEADER_LEN;
        w.patch_u16(start + 2, body_len as u16);
    }

    fn id_and_flags(&self) -> (u8, u8) {
        match self {
            Submessage::Data(d) => {
                let mut flags = 0;
                if !d.inline_qos.is_empty() {
                    flags |= FLAG_INLINE_QOS;
                }
                if d.serialized_payload.is_some() {
                    flags |= if d.key_only { FLAG_KEY } else { FLAG_DATA };
                }
                (SUBMSG_DATA, flags)
            }
            Submessage::Heartbeat(hb) => {
                let mut flags = 0;
                if hb.final_flag {
                    flags |= FLAG_FINAL;
                }
                if hb.liveliness_flag {
                    flags |= FLAG_LIVELINESS;
                }
                (SUBMSG_HEARTBEAT, flags)
            }
            Submessage::AckNack(an) => (SUBMSG_ACKNACK, if an.final_flag { FLAG_FINAL } else { 0 }),
            Submessage::Gap(_) => (SUBMSG_GAP, 0),
            Submessage::InfoTs(ts) => (
                SUBMSG_INFO_TS,
                if ts.timestamp.is_none() {
                    FLAG_INVALIDATE
                } else {
                    0
                },
            ),
            Submessage::InfoDst(_) => (SUBMSG_INFO_DST, 0),
            Submessage::Unknown { id } => (*id, 0),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

impl Submessage {
    /// Decode one submessage body. `body` excludes the 4-byte submessage header.
    pub(crate) fn decode(id: u8, flags: u8, body: &[u8]) -> Result<Self, DecodeError> {
        let le = flags & FLAG_ENDIANNESS != 0;
        let mut r = ByteReader::new(body, le);
        let sub = match id {
            SUBMSG_DATA => Submessage::Data(decode_data(&mut r, flags, le)?),
            SUBMSG_HEARTBEAT => {
                let reader_id = EntityId(r.array4()?);
                let writer_id = EntityId(r.array4()?);
                let first_sn = r.seq()?;
                let last_sn = r.seq()?;
                let count = r.u32()?;
                Submessage::Heartbeat(Heartbeat {
                    reader_id,
                    writer_id,
                    first_sn,
                    last_sn,
                    count,
                    final_flag: flags & FLAG_FINAL != 0,
                    liveliness_flag: flags & FLAG_LIVELINESS != 0,
                })
            }
            SUBMSG_ACKNACK => {
                let reader_id = EntityId(r.array4()?);
                let writer_id = EntityId(r.array4()?);
                let reader_sn_state = SequenceNumberSet::decode(&mut r)?;
                let count = r.u32()?;
                Submessage::AckNack(AckNack {
                    reader_id,
                    writer_id,
                    reader_sn_state,
                    count,
                    final_flag: flags & FLAG_FINAL != 0,
                })
            }
            SUBMSG_GAP => {
                let reader_id = EntityId(r.array4()?);
                let writer_id = EntityId(r.array4()?);
                let gap_start = r.seq()?;
                let gap_list = SequenceNumberSet::decode(&mut r)?;
                if gap_start == 0 || gap_list.base() < gap_start {
                    return Err(DecodeError::InvalidSubmessage("GAP range"));
                }
                Submessage::Gap(Gap {
                    reader_id,
                    writer_id,
                    gap_start,
                    gap_list,
                })
            }
            SUBMSG_INFO_TS => {
                let timestamp = if flags & FLAG_INVALIDATE != 0 {
                    None
                } else {
                    let secs = r.i32()?;
                    let frac = r.u32()?;
                    Some(Timestamp::from_wire(secs, frac))
                };
                Submessage::InfoTs(InfoTs { timestamp })
            }
            SUBMSG_INFO_DST => {
                let bytes = r.take(12)?;
                let mut guid_prefix = [0u8; 12];
                guid_prefix.copy_from_slice(bytes);
                Submessage::InfoDst(InfoDst { guid_prefix })
            }
            other => Submessage::Unknown { id: other },
        };
        Ok(sub)
    }
}

fn decode_data(r: &mut ByteReader<'_>, flags: u8, le: bool) -> Result<Data, DecodeError> {
    let _extra_flags = r.u16()?;
    let octets_to_inline_qos = r.u16()? as usize;
    let qos_anchor = r.position();
    let reader_id = EntityId(r.array4()?);
    let writer_id = EntityId(r.array4()?);
    let writer_sn = r.seq()?;
    if writer_sn == 0 {
        return Err(DecodeError::InvalidSubmessage("DATA sequence number 0"));
    }

    // Skip any vendor extension between writerSN and the inline QoS.
    let consumed = r.position() - qos_anchor;
    if octets_to_inline_qos > consumed {
        r.skip(octets_to_inline_qos - consumed)?;
    }

    let inline_qos = if flags & FLAG_INLINE_QOS != 0 {
        let pl = ParameterList::decode_from(r, le)?;
        InlineQos::from_parameter_list(&pl)
    } else {
        InlineQos::default()
    };

    let has_payload = flags & (FLAG_DATA | FLAG_KEY) != 0;
    let serialized_payload = if has_payload {
        Some(r.rest().to_vec())
    } else {
        None
    };

    Ok(Data {
        reader_id,
        writer_id,
        writer_sn,
        inline_qos,
        serialized_payload,
        key_only: flags & FLAG_KEY != 0 && flags & FLAG_DATA == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(sub: &Submessage) -> Vec<u8> {
        let mut w = ByteWriter::new();
        sub.encode_into(&mut w);
        w.into_inner()
    }

    fn reparse(bytes: &[u8]) -> Submessage {
        let len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        Submessage::decode(bytes[0], bytes[1], &bytes[4..4 + len]).unwrap()
    }

    #[test]
    fn test_heartbeat_layout() {
        let hb = Submessage::Heartbeat(Heartbeat {
            reader_id: EntityId::UNKNOWN,
            writer_id: EntityId::from_key(1, 0x02),
            first_sn: 1,
            last_sn: 10,
            count: 5,
            final_flag: true,
            liveliness_flag: false,
        });
        let bytes = encode(&hb);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 0x07);
        assert_eq!(bytes[1], 0x03);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 28);
        assert_eq!(reparse(&bytes), hb);
    }

    #[test]
    fn test_data_with_inline_qos() {
        let data = Submessage::Data(Data {
            reader_id: EntityId::UNKNOWN,
            writer_id: EntityId::from_key(3, 0x02),
            writer_sn: 42,
            inline_qos: InlineQos {
                key_hash: Some(InstanceHandle([7; 16])),
                status_info: Some(STATUS_INFO_DISPOSED),
            },
            serialized_payload: Some(vec![0, 1, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD]),
            key_only: false,
        });
        let bytes = encode(&data);
        assert_eq!(bytes[0], SUBMSG_DATA);
        assert_eq!(bytes[1], FLAG_ENDIANNESS | FLAG_INLINE_QOS | FLAG_DATA);
        assert_eq!(reparse(&bytes), data);
    }

    #[test]
    fn test_data_zero_sequence_rejected() {
        let data = Submessage::Data(Data {
            reader_id: EntityId::UNKNOWN,
            writer_id: EntityId::from_key(3, 0x03),
            writer_sn: 0,
            inline_qos: InlineQos::default(),
            serialized_payload: None,
            key_only: false,
        });
        let bytes = encode(&data);
        let len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        assert!(Submessage::decode(bytes[0], bytes[1], &bytes[4..4 + len]).is_err());
    }

    #[test]
    fn test_gap_from_sequences() {
        let gap = Gap::from_sequences(EntityId::UNKNOWN, EntityId::UNKNOWN, &[4, 5, 6, 9]).unwrap();
        assert_eq!(gap.gap_start, 4);
        assert_eq!(gap.gap_list.base(), 7);
        assert_eq!(gap.irrelevant().collect::<Vec<_>>(), vec![4, 5, 6, 9]);
        let sub = Submessage::Gap(gap);
        assert_eq!(reparse(&encode(&sub)), sub);
    }

    #[test]
    fn test_acknack_big_endian_decode() {
        // ACKNACK, flags = final only (big-endian), base=3 numBits=1 bitmap=0x80000000 count=2
        let mut body = vec![0, 0, 0, 0x07, 0, 0, 1, 0x02];
        body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 3]);
        body.extend_from_slice(&[0, 0, 0, 1]);
        body.extend_from_slice(&[0x80, 0, 0, 0]);
        body.extend_from_slice(&[0, 0, 0, 2]);
        let sub = Submessage::decode(SUBMSG_ACKNACK, FLAG_FINAL, &body).unwrap();
        match sub {
            Submessage::AckNack(an) => {
                assert_eq!(an.reader_sn_state.base(), 3);
                assert_eq!(an.reader_sn_state.iter().collect::<Vec<_>>(), vec![3]);
                assert_eq!(an.count, 2);
                assert!(an.final_flag);
                assert_eq!(an.writer_id, EntityId::from_key(1, 0x02));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_info_ts_invalidate() {
        let sub = Submessage::InfoTs(InfoTs { timestamp: None });
        let bytes = encode(&sub);
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[1], FLAG_ENDIANNESS | FLAG_INVALIDATE);
        assert_eq!(reparse(&bytes), sub);
    }
}
