// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Core Runtime Components
//!
//! The RTPS machinery underneath the typed [`crate::dds`] API.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `history` | Bounded change caches with KEEP_LAST / KEEP_ALL admission |
//! | `writer` | StatefulWriter engine, one ReaderProxy per matched reader |
//! | `reader` | StatefulReader engine, one WriterProxy per matched writer |
//! | `timer` | Shared timed-event scheduler |
//! | `liveliness` | Timer-owner liveliness manager |
//! | `deadline` | Per-instance deadline tracking |
//! | `discovery` | PDP/EDP registries, QoS matching, static XML endpoints |
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                    DDS Layer                        |
//! |        (Participant, DataWriter, DataReader)        |
//! +-----------------------------------------------------+
//! |                    Core Layer                       |
//! |  +----------+ +----------+ +----------+ +-------+  |
//! |  |Discovery | | Writer   | | Reader   | | Timer |  |
//! |  | PDP/EDP  | | engine   | | engine   | |       |  |
//! |  +----------+ +----------+ +----------+ +-------+  |
//! |             history / liveliness / deadline         |
//! +-----------------------------------------------------+
//! ```
//!
//! Most users should use the high-level [`crate::dds`] API instead of
//! interacting with core modules directly.

/// Change representation and sequence numbers.
pub mod cache_change;
pub mod deadline;
/// PDP/EDP registries, QoS matcher and static endpoint tables.
pub mod discovery;
/// GUIDs, entity ids and instance handles.
pub mod guid;
/// Writer and reader history caches.
pub mod history;
pub mod liveliness;
pub(crate) mod outbound;
/// Reliable reader engine (RTPS Sec.8.4.10).
pub mod reader;
pub mod time;
/// Timed-event scheduler shared by every engine of a participant.
pub mod timer;
/// Reliable writer engine (RTPS Sec.8.4.9).
pub mod writer;

#[cfg(test)]
pub(crate) mod test_util;
