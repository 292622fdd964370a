// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serialization contract between application types and the engines.

use md5::{Digest, Md5};

use super::{Error, Result};
use crate::core::guid::InstanceHandle;
use crate::protocol::encapsulation::{self, EncapsulationKind};

/// A type that can be published on a topic.
///
/// `serialize` produces the little-endian CDR body (the encapsulation header is
/// added by the writer). Keyed types also provide `serialize_key`: the key members
/// in big-endian CDR, which the instance handle is derived from.
pub trait TopicType: Sized + Send + Sync + 'static {
    /// Registered type name, compared by discovery.
    fn type_name() -> &'static str;

    /// Encode to a CDR LE body.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the sample cannot be represented.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Decode from a CDR LE body.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the buffer is truncated or contains invalid data.
    fn deserialize(body: &[u8]) -> Result<Self>;

    /// Returns true if this type has key members.
    #[must_use]
    fn has_key() -> bool {
        false
    }

    /// Key members in big-endian CDR. Empty for unkeyed types.
    fn serialize_key(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Upper bound of `serialize` output, if known.
    #[must_use]
    fn max_serialized_size() -> Option<usize> {
        None
    }
}

/// Instance handle of a serialized key: the key itself zero-padded when it fits
/// in 16 bytes, its MD5 digest otherwise.
pub fn key_hash(key_be: &[u8]) -> InstanceHandle {
    let mut hash = [0u8; 16];
    if key_be.len() <= hash.len() {
        hash[..key_be.len()].copy_from_slice(key_be);
    } else {
        hash.copy_from_slice(&Md5::digest(key_be));
    }
    InstanceHandle(hash)
}

pub(crate) fn instance_of<T: TopicType>(sample: &T) -> InstanceHandle {
    if T::has_key() {
        key_hash(&sample.serialize_key())
    } else {
        InstanceHandle::NIL
    }
}

/// Encapsulated payload of one sample.
pub(crate) fn encode<T: TopicType>(sample: &T) -> Result<Vec<u8>> {
    let body = sample.serialize()?;
    if let Some(max) = T::max_serialized_size() {
        if body.len() > max {
            return Err(Error::SerializationError(format!(
                "{} bytes exceeds max_serialized_size {} of {}",
                body.len(),
                max,
                T::type_name()
            )));
        }
    }
    Ok(encapsulation::encapsulate(EncapsulationKind::CdrLe, &body))
}

/// Payload of a dispose / unregister change: the encapsulated key.
pub(crate) fn encode_key<T: TopicType>(sample: &T) -> Vec<u8> {
    encapsulation::encapsulate(EncapsulationKind::CdrBe, &sample.serialize_key())
}

pub(crate) fn decode<T: TopicType>(payload: &[u8]) -> Result<T> {
    let (kind, body) = encapsulation::split(payload)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    if kind.is_parameter_list() || !kind.is_little_endian() {
        return Err(Error::SerializationError(format!(
            "unsupported encapsulation {:?} for {}",
            kind,
            T::type_name()
        )));
    }
    T::deserialize(body)
}
