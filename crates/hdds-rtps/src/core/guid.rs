// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS identity types: GUID prefix, entity id (with kind byte), GUID and instance handle.
//!
//! # Entity kinds (RTPS 2.3 Sec.9.3.1.2)
//!
//! | Kind byte | Meaning                       |
//! |-----------|-------------------------------|
//! | `0x02`    | user writer, WITH_KEY         |
//! | `0x03`    | user writer, NO_KEY           |
//! | `0x04`    | user reader, NO_KEY           |
//! | `0x07`    | user reader, WITH_KEY         |
//! | `0xC1`    | built-in participant          |
//! | `0xC2`    | built-in writer, WITH_KEY     |
//! | `0xC7`    | built-in reader, WITH_KEY     |
//!
//! Static discovery files rely on these exact bytes, so they are never remapped.

use std::fmt;

/// 12-byte GUID prefix identifying a participant.
pub type GuidPrefix = [u8; 12];

/// Unknown GUID prefix (all zeros).
pub const GUIDPREFIX_UNKNOWN: GuidPrefix = [0; 12];

/// Entity kind bytes (last octet of an [`EntityId`]).
pub mod entity_kind {
    /// User-defined writer on a keyed topic.
    pub const WRITER_WITH_KEY: u8 = 0x02;
    /// User-defined writer on an unkeyed topic.
    pub const WRITER_NO_KEY: u8 = 0x03;
    /// User-defined reader on an unkeyed topic.
    pub const READER_NO_KEY: u8 = 0x04;
    /// User-defined reader on a keyed topic.
    pub const READER_WITH_KEY: u8 = 0x07;
    /// User-defined publisher.
    pub const WRITER_GROUP: u8 = 0x08;
    /// User-defined subscriber.
    pub const READER_GROUP: u8 = 0x09;
    /// Built-in participant entity.
    pub const BUILTIN_PARTICIPANT: u8 = 0xC1;
    /// Built-in writer, keyed.
    pub const BUILTIN_WRITER_WITH_KEY: u8 = 0xC2;
    /// Built-in reader, keyed.
    pub const BUILTIN_READER_WITH_KEY: u8 = 0xC7;
}

/// RTPS EntityId: 3-byte key followed by 1 kind byte.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub [u8; 4]);

impl EntityId {
    pub const UNKNOWN: Self = Self([0x00, 0x00, 0x00, 0x00]);
    pub const PARTICIPANT: Self = Self([0x00, 0x00, 0x01, 0xC1]);
    pub const SPDP_BUILTIN_PARTICIPANT_WRITER: Self = Self([0x00, 0x01, 0x00, 0xC2]);
    pub const SPDP_BUILTIN_PARTICIPANT_READER: Self = Self([0x00, 0x01, 0x00, 0xC7]);
    pub const SEDP_BUILTIN_PUBLICATIONS_WRITER: Self = Self([0x00, 0x00, 0x03, 0xC2]);
    pub const SEDP_BUILTIN_PUBLICATIONS_READER: Self = Self([0x00, 0x00, 0x03, 0xC7]);
    pub const SEDP_BUILTIN_SUBSCRIPTIONS_WRITER: Self = Self([0x00, 0x00, 0x04, 0xC2]);
    pub const SEDP_BUILTIN_SUBSCRIPTIONS_READER: Self = Self([0x00, 0x00, 0x04, 0xC7]);

    /// Build a user entity id from a 24-bit key and a kind byte.
    ///
    /// The key is stored big-endian in the first three octets, matching the
    /// layout used by static discovery files.
    pub const fn from_key(key: u32, kind: u8) -> Self {
        Self([(key >> 16) as u8, (key >> 8) as u8, key as u8, kind])
    }

    /// 24-bit entity key.
    #[must_use]
    pub fn key(&self) -> u32 {
        (u32::from(self.0[0]) << 16) | (u32::from(self.0[1]) << 8) | u32::from(self.0[2])
    }

    /// Kind byte (last octet).
    #[must_use]
    pub fn kind(&self) -> u8 {
        self.0[3]
    }

    /// Built-in entities have both high bits of the kind set.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.0[3] & 0xC0 == 0xC0
    }

    #[must_use]
    pub fn is_writer(&self) -> bool {
        matches!(self.0[3] & 0x0F, 0x02 | 0x03)
    }

    #[must_use]
    pub fn is_reader(&self) -> bool {
        matches!(self.0[3] & 0x0F, 0x04 | 0x07)
    }

    /// True for WITH_KEY writers and readers.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self.0[3] & 0x0F, 0x02 | 0x07)
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}{:02x}.{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// RTPS GUID (Globally Unique Identifier)
///
/// 16-byte identifier following DDS-RTPS v2.3 spec.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct GUID {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl GUID {
    /// Create GUID from separate prefix and entity ID
    pub const fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    /// Create GUID from raw bytes (16 bytes total)
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self {
            prefix,
            entity_id: EntityId(entity_id),
        }
    }

    /// Convert GUID to 16-byte array
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix);
        bytes[12..16].copy_from_slice(&self.entity_id.0);
        bytes
    }

    /// Create GUID with all zeros (invalid/placeholder)
    pub const fn zero() -> Self {
        Self {
            prefix: GUIDPREFIX_UNKNOWN,
            entity_id: EntityId::UNKNOWN,
        }
    }

    /// Check if GUID is zero (invalid)
    pub fn is_zero(&self) -> bool {
        self.prefix == GUIDPREFIX_UNKNOWN && self.entity_id.is_unknown()
    }

    /// GUID of the participant owning this entity.
    #[must_use]
    pub fn participant(&self) -> Self {
        Self::new(self.prefix, EntityId::PARTICIPANT)
    }
}

impl fmt::Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID({})", self)
    }
}

/// 16-byte instance handle derived from the topic key (RTPS key hash).
///
/// Unkeyed topics use [`InstanceHandle::NIL`] for every sample.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl InstanceHandle {
    /// Well-known "no key" handle.
    pub const NIL: Self = Self([0; 16]);

    #[must_use]
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Instance handle identifying a whole entity (used for discovery data keys).
    pub fn from_guid(guid: &GUID) -> Self {
        Self(guid.as_bytes())
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IH(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(")")
    }
}

/// Build a random-ish GUID prefix for a new participant.
///
/// Layout: vendor id (2 bytes), host id (4), process id (4), participant counter (2).
pub fn generate_prefix(vendor_id: [u8; 2], host_id: u32, participant_id: u16) -> GuidPrefix {
    let mut prefix = [0u8; 12];
    prefix[0..2].copy_from_slice(&vendor_id);
    prefix[2..6].copy_from_slice(&host_id.to_be_bytes());
    prefix[6..10].copy_from_slice(&std::process::id().to_be_bytes());
    prefix[10..12].copy_from_slice(&participant_id.to_be_bytes());
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_bytes() {
        let w = EntityId::from_key(5, entity_kind::WRITER_WITH_KEY);
        assert_eq!(w.0, [0x00, 0x00, 0x05, 0x02]);
        assert!(w.is_writer());
        assert!(w.is_keyed());
        assert!(!w.is_builtin());

        let r = EntityId::from_key(0x0102_03, entity_kind::READER_NO_KEY);
        assert_eq!(r.0, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(r.key(), 0x010203);
        assert!(r.is_reader());
        assert!(!r.is_keyed());
    }

    #[test]
    fn test_builtin_entities() {
        assert!(EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER.is_builtin());
        assert!(EntityId::SEDP_BUILTIN_PUBLICATIONS_WRITER.is_writer());
        assert!(EntityId::SPDP_BUILTIN_PARTICIPANT_READER.is_reader());
        assert!(EntityId::PARTICIPANT.is_builtin());
    }

    #[test]
    fn test_guid_bytes_roundtrip() {
        let bytes = [1, 15, 172, 16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193];
        let guid = GUID::from_bytes(bytes);
        assert_eq!(guid.as_bytes(), bytes);
        assert_eq!(guid.entity_id, EntityId::PARTICIPANT);
        assert_eq!(
            guid.to_string(),
            "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
        );
    }

    #[test]
    fn test_participant_guid() {
        let guid = GUID::new([7; 12], EntityId::from_key(1, entity_kind::WRITER_NO_KEY));
        assert_eq!(guid.participant(), GUID::new([7; 12], EntityId::PARTICIPANT));
        assert!(GUID::zero().is_zero());
    }
}
