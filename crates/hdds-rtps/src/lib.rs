// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS RTPS - reliable stateful publish/subscribe core
//!
//! A pure Rust implementation of the RTPS (Real-Time Publish-Subscribe) stateful
//! writer/reader protocol underneath a small DDS entity API: bounded change
//! histories, HEARTBEAT/ACKNACK/GAP driven reliable delivery, SPDP/SEDP discovery
//! (or static XML endpoint tables), QoS matching and writer liveliness.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hdds_rtps::{DomainParticipant, ParticipantConfig, QoS, Result, TopicType};
//! use hdds_rtps::transport::UdpTransport;
//!
//! # #[derive(Clone, Debug)] struct Temperature { value: f64 }
//! # impl TopicType for Temperature {
//! #     fn type_name() -> &'static str { "Temperature" }
//! #     fn serialize(&self) -> Result<Vec<u8>> { Ok(self.value.to_le_bytes().to_vec()) }
//! #     fn deserialize(_: &[u8]) -> Result<Self> { Ok(Self { value: 0.0 }) }
//! # }
//! fn main() -> Result<()> {
//!     let transport = Arc::new(UdpTransport::new()?);
//!     let participant = DomainParticipant::new(ParticipantConfig::new("my_app"), transport)?;
//!
//!     let writer = participant.create_writer::<Temperature>("sensors/temperature", QoS::reliable())?;
//!     writer.write(&Temperature { value: 42.0 })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                           DDS Layer                                 |
//! |   DomainParticipant -> Publisher/Subscriber -> DataWriter/Reader    |
//! |   listeners cascade: endpoint -> publisher/subscriber -> participant|
//! +---------------------------------------------------------------------+
//! |                          Core Layer                                 |
//! |   StatefulWriter / StatefulReader | History | Liveliness | Timers   |
//! |   PDP / EDP (dynamic or static XML) | QoS matching                  |
//! +---------------------------------------------------------------------+
//! |                        Protocol Layer                               |
//! |   RTPS header + DATA / HEARTBEAT / ACKNACK / GAP / INFO_TS / INFO_DST|
//! +---------------------------------------------------------------------+
//! |                        Transport Layer                              |
//! |   UDPv4 unicast + multicast (socket2) | in-process loopback         |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`dds`] - typed entity API (start here)
//! - [`qos`] - Quality of Service policies
//! - [`core`] - history, delivery engines, discovery, liveliness, timers
//! - [`protocol`] - RTPS wire codec
//! - [`transport`] - UDP and loopback transports
//! - [`config`] - port mapping and participant configuration

/// Participant configuration and RTPS port mapping.
pub mod config;
/// History caches, reliable delivery engines, discovery, liveliness and timers.
pub mod core;
/// Typed DDS API (DomainParticipant, DataWriter, DataReader, listeners).
pub mod dds;
/// RTPS message and submessage encoding/decoding.
pub mod protocol;
/// `QoS` (Quality of Service) policies for DDS entities.
pub mod qos;
/// Datagram transports (UDP, loopback).
pub mod transport;

pub use config::ParticipantConfig;
pub use core::guid::{EntityId, GuidPrefix, InstanceHandle, GUID};
pub use dds::{
    DataReader, DataWriter, DomainParticipant, Error, Publisher, Result, Sample, SampleInfo,
    Subscriber, TopicType,
};
pub use qos::QoS;
