// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS protocol constants (DDS-RTPS v2.3 Sec.8.3 / Sec.9.4 / Sec.9.6)
//!
//! Submessage ids, flag bits and the parameter ids used by discovery data and
//! inline QoS. Built-in entity ids live on [`crate::core::guid::EntityId`].

/// RTPS protocol magic string: "RTPS" (Sec.8.3.3.1)
pub const RTPS_MAGIC: &[u8; 4] = b"RTPS";

/// RTPS protocol version 2.3.
pub const RTPS_VERSION_MAJOR: u8 = 0x02;
pub const RTPS_VERSION_MINOR: u8 = 0x03;

/// HDDS Vendor ID (experimental, not registered with OMG).
pub const HDDS_VENDOR_ID: [u8; 2] = [0x01, 0xAA];

/// RTPS header length ("RTPS" + version + vendor + prefix).
pub const RTPS_HEADER_LEN: usize = 20;

/// Submessage header length (id + flags + octetsToNextHeader).
pub const SUBMESSAGE_HEADER_LEN: usize = 4;

// ============================================================================
// Submessage ids (Sec.9.4.5.1.1)
// ============================================================================

pub const SUBMSG_PAD: u8 = 0x01;
pub const SUBMSG_ACKNACK: u8 = 0x06;
pub const SUBMSG_HEARTBEAT: u8 = 0x07;
pub const SUBMSG_GAP: u8 = 0x08;
pub const SUBMSG_INFO_TS: u8 = 0x09;
pub const SUBMSG_INFO_DST: u8 = 0x0E;
pub const SUBMSG_DATA: u8 = 0x15;

// ============================================================================
// Flag bits
// ============================================================================

/// Endianness flag (all submessages): set = little-endian.
pub const FLAG_ENDIANNESS: u8 = 0x01;
/// HEARTBEAT / ACKNACK final flag.
pub const FLAG_FINAL: u8 = 0x02;
/// HEARTBEAT liveliness flag.
pub const FLAG_LIVELINESS: u8 = 0x04;
/// INFO_TS invalidate flag (no timestamp follows).
pub const FLAG_INVALIDATE: u8 = 0x02;
/// DATA inline QoS present.
pub const FLAG_INLINE_QOS: u8 = 0x02;
/// DATA serialized payload is sample data.
pub const FLAG_DATA: u8 = 0x04;
/// DATA serialized payload is a serialized key.
pub const FLAG_KEY: u8 = 0x08;

/// Bytes between the end of `octetsToInlineQos` and the first inline QoS octet.
pub const DATA_OCTETS_TO_INLINE_QOS: u16 = 16;

// ============================================================================
// Parameter ids (Sec.9.6.2.2.2)
// ============================================================================

pub const PID_PAD: u16 = 0x0000;
pub const PID_SENTINEL: u16 = 0x0001;
pub const PID_PARTICIPANT_LEASE_DURATION: u16 = 0x0002;
pub const PID_TOPIC_NAME: u16 = 0x0005;
pub const PID_TYPE_NAME: u16 = 0x0007;
pub const PID_DOMAIN_ID: u16 = 0x000f;
pub const PID_PROTOCOL_VERSION: u16 = 0x0015;
pub const PID_VENDORID: u16 = 0x0016;
pub const PID_RELIABILITY: u16 = 0x001a;
pub const PID_LIVELINESS: u16 = 0x001b;
pub const PID_DURABILITY: u16 = 0x001d;
pub const PID_OWNERSHIP: u16 = 0x001f;
pub const PID_DEADLINE: u16 = 0x0023;
pub const PID_PARTITION: u16 = 0x0029;
pub const PID_LIFESPAN: u16 = 0x002b;
pub const PID_UNICAST_LOCATOR: u16 = 0x002f;
pub const PID_MULTICAST_LOCATOR: u16 = 0x0030;
pub const PID_DEFAULT_UNICAST_LOCATOR: u16 = 0x0031;
pub const PID_DEFAULT_MULTICAST_LOCATOR: u16 = 0x0048;
pub const PID_METATRAFFIC_UNICAST_LOCATOR: u16 = 0x0032;
pub const PID_METATRAFFIC_MULTICAST_LOCATOR: u16 = 0x0033;
pub const PID_EXPECTS_INLINE_QOS: u16 = 0x0043;
pub const PID_HISTORY: u16 = 0x0040;
pub const PID_RESOURCE_LIMITS: u16 = 0x0041;
pub const PID_PARTICIPANT_GUID: u16 = 0x0050;
pub const PID_BUILTIN_ENDPOINT_SET: u16 = 0x0058;
pub const PID_ENDPOINT_GUID: u16 = 0x005a;
pub const PID_ENTITY_NAME: u16 = 0x0062;
pub const PID_KEY_HASH: u16 = 0x0070;
pub const PID_STATUS_INFO: u16 = 0x0071;

// ============================================================================
// STATUS_INFO bits (Sec.9.6.3.4)
// ============================================================================

pub const STATUS_INFO_DISPOSED: u32 = 0x0000_0001;
pub const STATUS_INFO_UNREGISTERED: u32 = 0x0000_0002;

// ============================================================================
// Built-in endpoint set bits (Sec.8.5.3.2)
// ============================================================================

pub const BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER: u32 = 1 << 0;
pub const BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR: u32 = 1 << 1;
pub const BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER: u32 = 1 << 2;
pub const BUILTIN_ENDPOINT_PUBLICATION_DETECTOR: u32 = 1 << 3;
pub const BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER: u32 = 1 << 4;
pub const BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR: u32 = 1 << 5;

/// Endpoint set advertised by every participant (SPDP + SEDP pubs/subs).
pub const BUILTIN_ENDPOINT_SET_DEFAULT: u32 = BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER
    | BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR
    | BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER
    | BUILTIN_ENDPOINT_PUBLICATION_DETECTOR
    | BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER
    | BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR;
