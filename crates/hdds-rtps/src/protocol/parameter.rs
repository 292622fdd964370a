// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter lists (PL_CDR) used for discovery data and DATA inline QoS.
//!
//! ```text
//! +----------------+----------------+
//! | parameterId    | length (bytes) |   length is a multiple of 4
//! +----------------+----------------+
//! | value ...                        |
//! +---------------------------------+
//! ...
//! | PID_SENTINEL   | 0              |
//! ```

use std::time::Duration;

use super::codec::{ByteReader, ByteWriter};
use super::constants::{PID_PAD, PID_SENTINEL};
use super::DecodeError;
use crate::core::guid::GUID;
use crate::core::time::{duration_from_wire, duration_to_wire};
use crate::transport::Locator;

/// One encoded parameter. `value` is already padded to a multiple of 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub pid: u16,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterList {
    params: Vec<Parameter>,
    little_endian: bool,
}

impl Default for ParameterList {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            little_endian: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    // ------------------------------------------------------------------------
    // Building (always little-endian)
    // ------------------------------------------------------------------------

    pub fn push_raw(&mut self, pid: u16, value: &[u8]) {
        let mut v = value.to_vec();
        while v.len() % 4 != 0 {
            v.push(0);
        }
        self.params.push(Parameter { pid, value: v });
    }

    pub fn push_u32(&mut self, pid: u16, v: u32) {
        self.push_raw(pid, &v.to_le_bytes());
    }

    pub fn push_bool(&mut self, pid: u16, v: bool) {
        self.push_raw(pid, &[u8::from(v), 0, 0, 0]);
    }

    /// CDR string: length (including NUL), bytes, NUL.
    pub fn push_string(&mut self, pid: u16, s: &str) {
        let mut v = Vec::with_capacity(s.len() + 5);
        v.extend_from_slice(&((s.len() + 1) as u32).to_le_bytes());
        v.extend_from_slice(s.as_bytes());
        v.push(0);
        self.push_raw(pid, &v);
    }

    /// Sequence of CDR strings (used by PARTITION).
    pub fn push_string_seq(&mut self, pid: u16, items: &[String]) {
        let mut w = ByteWriter::new();
        w.put_u32(items.len() as u32);
        for s in items {
            w.align(4);
            w.put_u32((s.len() + 1) as u32);
            w.put_bytes(s.as_bytes());
            w.put_u8(0);
        }
        self.push_raw(pid, &w.into_inner());
    }

    pub fn push_guid(&mut self, pid: u16, guid: &GUID) {
        self.push_raw(pid, &guid.as_bytes());
    }

    pub fn push_locator(&mut self, pid: u16, loc: &Locator) {
        let mut w = ByteWriter::with_capacity(24);
        w.put_i32(loc.kind);
        w.put_u32(loc.port);
        w.put_bytes(&loc.address);
        self.push_raw(pid, &w.into_inner());
    }

    pub fn push_duration(&mut self, pid: u16, d: Duration) {
        let (secs, frac) = duration_to_wire(d);
        let mut w = ByteWriter::with_capacity(8);
        w.put_i32(secs);
        w.put_u32(frac);
        self.push_raw(pid, &w.into_inner());
    }

    /// Serialize with a trailing sentinel.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode_into(&mut w);
        w.into_inner()
    }

    pub(crate) fn encode_into(&self, w: &mut ByteWriter) {
        for p in &self.params {
            w.put_u16(p.pid);
            w.put_u16(p.value.len() as u16);
            w.put_bytes(&p.value);
        }
        w.put_u16(PID_SENTINEL);
        w.put_u16(0);
    }

    /// Encoded length in bytes, sentinel included.
    pub fn wire_len(&self) -> usize {
        self.params.iter().map(|p| 4 + p.value.len()).sum::<usize>() + 4
    }

    // ------------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------------

    /// Parse a parameter list, stopping at the sentinel.
    pub fn decode(buf: &[u8], little_endian: bool) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(buf, little_endian);
        Self::decode_from(&mut r, little_endian)
    }

    pub(crate) fn decode_from(
        r: &mut ByteReader<'_>,
        little_endian: bool,
    ) -> Result<Self, DecodeError> {
        let mut params = Vec::new();
        loop {
            let pid = r.u16()?;
            let len = r.u16()? as usize;
            if pid == PID_SENTINEL {
                break;
            }
            let value = r.take(len)?;
            if pid == PID_PAD {
                continue;
            }
            params.push(Parameter {
                pid,
                value: value.to_vec(),
            });
        }
        Ok(Self {
            params,
            little_endian,
        })
    }

    pub fn get(&self, pid: u16) -> Option<&[u8]> {
        self.params
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| p.value.as_slice())
    }

    pub fn get_all(&self, pid: u16) -> impl Iterator<Item = &[u8]> + '_ {
        self.params
            .iter()
            .filter(move |p| p.pid == pid)
            .map(|p| p.value.as_slice())
    }

    pub fn get_u32(&self, pid: u16) -> Option<u32> {
        let v = self.get(pid)?;
        ByteReader::new(v, self.little_endian).u32().ok()
    }

    pub fn get_bool(&self, pid: u16) -> Option<bool> {
        self.get(pid).and_then(|v| v.first()).map(|b| *b != 0)
    }

    pub fn get_string(&self, pid: u16) -> Option<String> {
        let v = self.get(pid)?;
        let mut r = ByteReader::new(v, self.little_endian);
        read_cdr_string(&mut r).ok()
    }

    pub fn get_string_seq(&self, pid: u16) -> Option<Vec<String>> {
        let v = self.get(pid)?;
        let mut r = ByteReader::new(v, self.little_endian);
        let n = r.u32().ok()? as usize;
        let mut out = Vec::with_capacity(n.min(64));
        for _ in 0..n {
            r.align(4).ok()?;
            out.push(read_cdr_string(&mut r).ok()?);
        }
        Some(out)
    }

    pub fn get_guid(&self, pid: u16) -> Option<GUID> {
        let v = self.get(pid)?;
        let bytes: [u8; 16] = v.get(..16)?.try_into().ok()?;
        Some(GUID::from_bytes(bytes))
    }

    pub fn get_locators(&self, pid: u16) -> Vec<Locator> {
        self.get_all(pid)
            .filter_map(|v| {
                let mut r = ByteReader::new(v, self.little_endian);
                let kind = r.i32().ok()?;
                let port = r.u32().ok()?;
                let address: [u8; 16] = r.take(16).ok()?.try_into().ok()?;
                Some(Locator {
                    kind,
                    port,
                    address,
                })
            })
            .collect()
    }

    pub fn get_duration(&self, pid: u16) -> Option<Duration> {
        let v = self.get(pid)?;
        let mut r = ByteReader::new(v, self.little_endian);
        let secs = r.i32().ok()?;
        let frac = r.u32().ok()?;
        Some(duration_from_wire(secs, frac))
    }

    /// Raw reader over a parameter value honouring the list's endianness.
    pub(crate) fn reader<'a>(&self, value: &'a [u8]) -> ByteReader<'a> {
        ByteReader::new(value, self.little_endian)
    }
}

fn read_cdr_string(r: &mut ByteReader<'_>) -> Result<String, DecodeError> {
    let len = r.u32()? as usize;
    if len == 0 {
        return Ok(String::new());
    }
    let bytes = r.take(len)?;
    let text = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    String::from_utf8(text.to_vec()).map_err(|_| DecodeError::InvalidSubmessage("string not utf-8"))
}
