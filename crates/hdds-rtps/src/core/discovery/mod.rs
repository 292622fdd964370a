// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SPDP/SEDP discovery.
//!
//! - [`Pdp`]: registry of remote participants with lease expiry.
//! - [`Edp`]: local/remote endpoint tables and the matching that wires proxies into
//!   the delivery engines.
//! - [`matcher`]: topic, type, partition and QoS (RxO) compatibility.
//! - [`wire`]: SPDP/SEDP parameter-list encoding.
//! - [`static_xml`]: endpoint declarations loaded from an XML file instead of SEDP.

pub mod data;
pub mod edp;
pub mod matcher;
pub mod pdp;
pub mod static_xml;
pub mod wire;

use std::fmt;

pub use data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
pub use edp::Edp;
pub use pdp::{Pdp, PdpEvent};
pub use static_xml::{StaticEndpoint, StaticEndpointKind, StaticTable};

/// Result alias for discovery-related operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovery subsystem error categorisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Requested participant not present in the registry.
    ParticipantNotFound { guid: String },
    /// Parsing or decoding failed.
    ParseFailed { reason: String },
    /// A static endpoint id (userId / entityID) was declared twice.
    DuplicateId { id: i64 },
    /// A static endpoint id is zero or negative.
    InvalidId { id: i64 },
    /// Generic invalid data or invariant violation.
    InvalidData { reason: String },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::ParticipantNotFound { guid } => {
                write!(f, "Participant not found: {}", guid)
            }
            DiscoveryError::ParseFailed { reason } => write!(f, "Parse failed: {}", reason),
            DiscoveryError::DuplicateId { id } => write!(f, "Repeated endpoint id: {}", id),
            DiscoveryError::InvalidId { id } => write!(f, "Endpoint id must be > 0: {}", id),
            DiscoveryError::InvalidData { reason } => write!(f, "Invalid data: {}", reason),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<crate::protocol::DecodeError> for DiscoveryError {
    fn from(e: crate::protocol::DecodeError) -> Self {
        DiscoveryError::ParseFailed {
            reason: e.to_string(),
        }
    }
}
