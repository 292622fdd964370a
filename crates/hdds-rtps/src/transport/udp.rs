// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPv4 transport.
//!
//! One unbound send socket shared by all destinations, and one socket plus receive
//! thread (`hdds-udp-rx`) per input channel. Multicast input channels join the group
//! on every non-loopback interface.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};

use super::{Locator, ReceiveHandler, Transport};
use crate::config::MAX_PACKET_SIZE;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const MULTICAST_TTL: u32 = 1;

struct InputChannel {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputChannel {
    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// UDPv4 transport (socket2).
pub struct UdpTransport {
    send_socket: UdpSocket,
    channels: DashMap<Locator, InputChannel>,
    interfaces: Vec<Ipv4Addr>,
}

impl UdpTransport {
    pub fn new() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
        let bind: SocketAddr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind.into())?;
        let send_socket: UdpSocket = socket.into();

        let interfaces = multicast_interfaces();
        log::debug!(
            "[transport] udp send socket {:?}, {} multicast interface(s)",
            send_socket.local_addr().ok(),
            interfaces.len()
        );
        Ok(Self {
            send_socket,
            channels: DashMap::new(),
            interfaces,
        })
    }

    fn bind_input(&self, locator: &Locator) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        if locator.is_multicast() {
            // several participants on one host share the well-known multicast port
            socket.set_reuse_port(true)?;
        }
        let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, locator.port as u16));
        socket.bind(&bind.into())?;
        let socket: UdpSocket = socket.into();

        if let Some(group) = locator.ipv4().filter(|_| locator.is_multicast()) {
            self.join_group(&socket, group)?;
        }
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        Ok(socket)
    }

    fn join_group(&self, socket: &UdpSocket, group: Ipv4Addr) -> io::Result<()> {
        if self.interfaces.is_empty() {
            return socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED);
        }
        let mut joined = false;
        for iface in &self.interfaces {
            match socket.join_multicast_v4(&group, iface) {
                Ok(()) => joined = true,
                Err(e) => log::debug!(
                    "[transport] join {} on {} failed (non-fatal): {}",
                    group,
                    iface,
                    e
                ),
            }
        }
        if joined {
            Ok(())
        } else {
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        }
    }

    fn run_loop(socket: UdpSocket, handler: Arc<dyn ReceiveHandler>, running: Arc<AtomicBool>) {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        while running.load(Ordering::Relaxed) {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    let source = Locator::from_socket_addr(&from);
                    handler.on_receive(&buf[..len], &source);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    log::warn!("[transport] udp recv error: {}", e);
                    thread::sleep(RECV_TIMEOUT);
                }
            }
        }
    }
}

impl Transport for UdpTransport {
    fn send(&self, data: &[u8], destination: &Locator) -> bool {
        let Some(addr) = destination.to_socket_addr() else {
            log::warn!("[transport] udp send to invalid locator {}", destination);
            return false;
        };
        match self.send_socket.send_to(data, addr) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("[transport] udp send to {} failed: {}", addr, e);
                false
            }
        }
    }

    fn open_input_channel(
        &self,
        locator: &Locator,
        handler: Arc<dyn ReceiveHandler>,
    ) -> io::Result<()> {
        if self.channels.contains_key(locator) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("channel {} already open", locator),
            ));
        }
        let socket = self.bind_input(locator)?;
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("hdds-udp-rx-{}", locator.port))
            .spawn(move || Self::run_loop(socket, handler, running_clone))?;
        self.channels.insert(
            *locator,
            InputChannel {
                running,
                handle: Some(handle),
            },
        );
        log::debug!("[transport] udp: listening on {}", locator);
        Ok(())
    }

    fn close_input_channel(&self, locator: &Locator) -> bool {
        match self.channels.remove(locator) {
            Some((_, mut channel)) => {
                channel.stop();
                true
            }
            None => false,
        }
    }

    fn unicast_locators(&self, port: u32) -> Vec<Locator> {
        match self.interfaces.first() {
            Some(ip) => vec![Locator::udpv4(ip.octets(), port)],
            None => vec![Locator::udpv4([127, 0, 0, 1], port)],
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for mut entry in self.channels.iter_mut() {
            entry.value_mut().stop();
        }
        self.channels.clear();
    }
}

/// Non-loopback IPv4 interfaces, as reported by `local_ip_address`.
fn multicast_interfaces() -> Vec<Ipv4Addr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs
            .into_iter()
            .filter_map(|(_, ip)| match ip {
                std::net::IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
                _ => None,
            })
            .collect(),
        Err(e) => {
            log::debug!("[transport] failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Instant;

    struct Collect(Mutex<Vec<Vec<u8>>>);

    impl ReceiveHandler for Collect {
        fn on_receive(&self, data: &[u8], _source: &Locator) {
            self.0.lock().push(data.to_vec());
        }
    }

    #[test]
    fn test_udp_unicast_roundtrip() {
        let transport = UdpTransport::new().unwrap();
        // pick a free port
        let scratch = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = scratch.local_addr().unwrap().port();
        drop(scratch);

        let loc = Locator::udpv4([127, 0, 0, 1], u32::from(port));
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        transport.open_input_channel(&loc, sink.clone()).unwrap();
        assert!(transport.send(b"ping", &loc));

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.0.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.0.lock().first().map(Vec::as_slice), Some(&b"ping"[..]));
        assert!(transport.close_input_channel(&loc));
        assert!(!transport.close_input_channel(&loc));
    }

    #[test]
    fn test_send_invalid_locator() {
        let transport = UdpTransport::new().unwrap();
        assert!(!transport.send(b"x", &Locator::INVALID));
    }
}
