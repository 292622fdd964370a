// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS message = 20-byte header + submessages.

use super::codec::ByteWriter;
use super::constants::*;
use super::submessage::Submessage;
use super::DecodeError;
use crate::core::guid::GuidPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: (u8, u8),
    pub vendor_id: [u8; 2],
    pub guid_prefix: GuidPrefix,
}

impl Header {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            version: (RTPS_VERSION_MAJOR, RTPS_VERSION_MINOR),
            vendor_id: HDDS_VENDOR_ID,
            guid_prefix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpsMessage {
    pub header: Header,
    pub submessages: Vec<Submessage>,
}

impl RtpsMessage {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            header: Header::new(guid_prefix),
            submessages: Vec::new(),
        }
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, sub: Submessage) -> Self {
        self.submessages.push(sub);
        self
    }

    pub fn push(&mut self, sub: Submessage) {
        self.submessages.push(sub);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(64);
        w.put_bytes(RTPS_MAGIC);
        w.put_u8(self.header.version.0);
        w.put_u8(self.header.version.1);
        w.put_bytes(&self.header.vendor_id);
        w.put_bytes(&self.header.guid_prefix);
        for sub in &self.submessages {
            sub.encode_into(&mut w);
        }
        w.into_inner()
    }

    /// Decode a full datagram.
    ///
    /// A submessage that fails to parse invalidates the remainder of the message
    /// (Sec.8.3.4.1); the submessages decoded before it are kept.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < RTPS_HEADER_LEN {
            return Err(DecodeError::Truncated);
        }
        if &buf[0..4] != RTPS_MAGIC {
            return Err(DecodeError::InvalidHeader("bad magic"));
        }
        if buf[4] != RTPS_VERSION_MAJOR {
            return Err(DecodeError::InvalidHeader("unsupported major version"));
        }
        let mut guid_prefix = [0u8; 12];
        guid_prefix.copy_from_slice(&buf[8..20]);
        let header = Header {
            version: (buf[4], buf[5]),
            vendor_id: [buf[6], buf[7]],
            guid_prefix,
        };

        let mut submessages = Vec::new();
        let mut offset = RTPS_HEADER_LEN;
        while offset + SUBMESSAGE_HEADER_LEN <= buf.len() {
            let id = buf[offset];
            let flags = buf[offset + 1];
            let raw_len = if flags & FLAG_ENDIANNESS != 0 {
                u16::from_le_bytes([buf[offset + 2], buf[offset + 3]])
            } else {
                u16::from_be_bytes([buf[offset + 2], buf[offset + 3]])
            } as usize;
            let body_start = offset + SUBMESSAGE_HEADER_LEN;
            // octetsToNextHeader == 0 means "extends to the end of the message"
            // except for PAD / INFO_TS where it is a genuinely empty body.
            let body_end = if raw_len == 0 && id != SUBMSG_PAD && id != SUBMSG_INFO_TS {
                buf.len()
            } else {
                body_start + raw_len
            };
            if body_end > buf.len() {
                if submessages.is_empty() {
                    return Err(DecodeError::Truncated);
                }
                log::debug!("[rtps] truncated trailing submessage 0x{:02x} ignored", id);
                break;
            }
            match Submessage::decode(id, flags, &buf[body_start..body_end]) {
                Ok(Submessage::Unknown { id }) if id == SUBMSG_PAD => {}
                Ok(sub) => submessages.push(sub),
                Err(e) => {
                    log::debug!("[rtps] submessage 0x{:02x} rejected: {}", id, e);
                    break;
                }
            }
            offset = body_end;
        }

        Ok(Self {
            header,
            submessages,
        })
    }
}
