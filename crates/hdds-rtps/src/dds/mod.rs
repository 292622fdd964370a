// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS API
//!
//! Typed entities on top of the RTPS engines.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hdds_rtps::dds::{DomainParticipant, TopicType};
//! use hdds_rtps::qos::QoS;
//! use hdds_rtps::transport::UdpTransport;
//! use hdds_rtps::config::ParticipantConfig;
//!
//! # #[derive(Clone, Debug)] struct Temperature { sensor: u32, value: f32 }
//! # impl TopicType for Temperature {
//! #     fn type_name() -> &'static str { "Temperature" }
//! #     fn serialize(&self) -> hdds_rtps::dds::Result<Vec<u8>> { Ok(Vec::new()) }
//! #     fn deserialize(_: &[u8]) -> hdds_rtps::dds::Result<Self> { Ok(Self { sensor: 0, value: 0.0 }) }
//! # }
//! let transport = Arc::new(UdpTransport::new()?);
//! let participant = DomainParticipant::new(ParticipantConfig::new("sensors"), transport)?;
//! let writer = participant.create_writer::<Temperature>("temperature", QoS::reliable())?;
//! writer.write(&Temperature { sensor: 1, value: 21.5 })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Entities are owned by their [`DomainParticipant`]; writer and reader handles
//! refer back to it by index, so dropping the participant tears everything down.

pub mod listener;
mod participant;
mod reader;
mod type_support;
mod writer;

pub use listener::{
    DataReaderListener, DataWriterListener, DeadlineMissedStatus, DomainParticipantListener,
    IncompatibleQosStatus, LivelinessChangedStatus, LivelinessLostStatus,
    OfferedDeadlineMissedStatus, OfferedIncompatibleQosStatus, PublicationMatchedStatus,
    PublisherListener, QosPolicyCount, RequestedDeadlineMissedStatus,
    RequestedIncompatibleQosStatus, SampleLostStatus, SampleRejectedReason, SampleRejectedStatus,
    StatusMask, SubscriberListener, SubscriptionMatchedStatus,
};
pub use participant::{DomainParticipant, Publisher, Subscriber};
pub use reader::{DataReader, Sample};
pub use type_support::{key_hash, TopicType};
pub use writer::DataWriter;

pub use crate::core::history::{InstanceState, SampleInfo, SampleState, ViewState};

use crate::core::discovery::DiscoveryError;

/// Errors returned by DDS operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// An argument is invalid (maps to `RETCODE_BAD_PARAMETER`).
    BadParameter(String),
    /// The entity is not in a state that allows the operation.
    PreconditionNotMet(String),
    /// QoS policy is invalid or inconsistent.
    InvalidQos(String),
    /// Configuration could not be loaded or is out of range.
    Config(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// History limits reached and the write cannot wait.
    ResourceLimitExceeded(String),
    /// Operation would block.
    WouldBlock,
    /// `max_blocking_time` or the caller's timeout elapsed.
    Timeout,

    // ========================================================================
    // Entity Errors
    // ========================================================================
    /// The entity (or its participant) was already deleted.
    AlreadyDeleted,
    /// Requested entity does not exist.
    NotFound(String),

    // ========================================================================
    // Data / Transport / Discovery Errors
    // ========================================================================
    /// Sample could not be serialized or deserialized.
    SerializationError(String),
    /// Socket bind, channel open or send failure.
    TransportError(String),
    /// Discovery subsystem failure.
    Discovery(DiscoveryError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadParameter(msg) => write!(f, "Bad parameter: {}", msg),
            Error::PreconditionNotMet(msg) => write!(f, "Precondition not met: {}", msg),
            Error::InvalidQos(msg) => write!(f, "Invalid QoS: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::ResourceLimitExceeded(msg) => write!(f, "Resource limit exceeded: {}", msg),
            Error::WouldBlock => write!(f, "Operation would block"),
            Error::Timeout => write!(f, "Timeout"),
            Error::AlreadyDeleted => write!(f, "Entity already deleted"),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::SerializationError(msg) => write!(f, "Serialization failed: {}", msg),
            Error::TransportError(msg) => write!(f, "Transport error: {}", msg),
            Error::Discovery(e) => write!(f, "Discovery error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Discovery(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DiscoveryError> for Error {
    fn from(e: DiscoveryError) -> Self {
        Error::Discovery(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::TransportError(e.to_string())
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
