// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport layer for RTPS communication.
//!
//! The delivery engines and discovery only depend on two narrow contracts:
//! [`Transport::send`] to push an opaque datagram to a [`Locator`], and a
//! [`ReceiveHandler`] registered per listening locator through
//! [`Transport::open_input_channel`].
//!
//! # Modules
//!
//! - `loopback` - in-process bus (crossbeam channel + delivery thread), used by tests
//! - `udp` - UDPv4 sockets (socket2), one receive thread per input channel
//!
//! # Example
//!
//! ```
//! use hdds_rtps::transport::{Locator, LoopbackNetwork, Transport};
//!
//! let net = LoopbackNetwork::new();
//! let transport = net.transport();
//! assert!(transport.send(b"RTPS", &Locator::udpv4([127, 0, 0, 1], 7411)));
//! ```

pub mod loopback;
pub mod udp;

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

pub use loopback::{DropFilter, LoopbackNetwork, LoopbackTransport};
pub use udp::UdpTransport;

// ============================================================================
// Locator
// ============================================================================

pub const LOCATOR_KIND_INVALID: i32 = -1;
pub const LOCATOR_KIND_UDPV4: i32 = 1;
pub const LOCATOR_KIND_UDPV6: i32 = 2;

/// RTPS Locator_t: kind, port and a 16-byte address (IPv4 in the last 4 octets).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    pub address: [u8; 16],
}

impl Locator {
    pub const INVALID: Self = Self {
        kind: LOCATOR_KIND_INVALID,
        port: 0,
        address: [0; 16],
    };

    pub const fn udpv4(ip: [u8; 4], port: u32) -> Self {
        let mut address = [0u8; 16];
        address[12] = ip[0];
        address[13] = ip[1];
        address[14] = ip[2];
        address[15] = ip[3];
        Self {
            kind: LOCATOR_KIND_UDPV4,
            port,
            address,
        }
    }

    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(v4) => Self::udpv4(v4.octets(), u32::from(addr.port())),
            IpAddr::V6(v6) => Self {
                kind: LOCATOR_KIND_UDPV6,
                port: u32::from(addr.port()),
                address: v6.octets(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.kind, LOCATOR_KIND_UDPV4 | LOCATOR_KIND_UDPV6) && self.port <= 65535
    }

    /// IPv4 part of a UDPv4 locator.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.kind != LOCATOR_KIND_UDPV4 {
            return None;
        }
        Some(Ipv4Addr::new(
            self.address[12],
            self.address[13],
            self.address[14],
            self.address[15],
        ))
    }

    pub fn is_multicast(&self) -> bool {
        match self.kind {
            LOCATOR_KIND_UDPV4 => self.address[12] & 0xF0 == 0xE0,
            LOCATOR_KIND_UDPV6 => self.address[0] == 0xFF,
            _ => false,
        }
    }

    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        if !self.is_valid() {
            return None;
        }
        let port = self.port as u16;
        match self.kind {
            LOCATOR_KIND_UDPV4 => self
                .ipv4()
                .map(|ip| SocketAddr::new(IpAddr::V4(ip), port)),
            _ => Some(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::from(self.address)),
                port,
            )),
        }
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_socket_addr() {
            Some(addr) => write!(f, "udp://{}", addr),
            None => write!(f, "locator(kind={}, port={})", self.kind, self.port),
        }
    }
}

// ============================================================================
// Contracts
// ============================================================================

/// Callback invoked for every datagram received on an input channel.
pub trait ReceiveHandler: Send + Sync {
    fn on_receive(&self, data: &[u8], source: &Locator);
}

/// Datagram transport used by the participant.
pub trait Transport: Send + Sync {
    /// Best-effort send; false when the datagram could not be handed to the network.
    fn send(&self, data: &[u8], destination: &Locator) -> bool;

    /// Start listening on `locator`, dispatching every datagram to `handler`.
    fn open_input_channel(
        &self,
        locator: &Locator,
        handler: Arc<dyn ReceiveHandler>,
    ) -> io::Result<()>;

    /// Stop listening; false when no channel was open on `locator`.
    fn close_input_channel(&self, locator: &Locator) -> bool;

    /// Unicast locators other hosts can use to reach `port` on this transport.
    fn unicast_locators(&self, port: u32) -> Vec<Locator>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udpv4_locator_layout() {
        let loc = Locator::udpv4([192, 168, 1, 7], 7411);
        assert_eq!(&loc.address[12..], &[192, 168, 1, 7]);
        assert!(loc.address[..12].iter().all(|b| *b == 0));
        assert_eq!(loc.ipv4(), Some(Ipv4Addr::new(192, 168, 1, 7)));
        assert_eq!(
            loc.to_socket_addr(),
            Some("192.168.1.7:7411".parse().unwrap())
        );
        assert!(!loc.is_multicast());
    }

    #[test]
    fn test_multicast_and_invalid() {
        assert!(Locator::udpv4([239, 255, 0, 1], 7400).is_multicast());
        assert!(!Locator::INVALID.is_valid());
        assert_eq!(Locator::INVALID.to_socket_addr(), None);
    }

    #[test]
    fn test_socket_addr_roundtrip() {
        let addr: SocketAddr = "10.1.2.3:7650".parse().unwrap();
        assert_eq!(
            Locator::from_socket_addr(&addr).to_socket_addr(),
            Some(addr)
        );
    }
}
