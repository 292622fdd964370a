// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport.
//!
//! A [`LoopbackNetwork`] is a shared bus: every [`LoopbackTransport`] created from it
//! can open input channels on arbitrary locators, and datagrams sent to a locator
//! are delivered asynchronously (on the `hdds-loopback` thread) to every handler
//! listening there. Multicast and unicast locators behave the same way.
//!
//! An optional drop filter simulates packet loss.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{Locator, ReceiveHandler, Transport};

/// Loss simulation predicate: return true to drop the datagram sent to the locator.
pub type DropFilter = Box<dyn Fn(&[u8], &Locator) -> bool + Send + Sync>;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Packet {
    data: Vec<u8>,
    source: Locator,
    destination: Locator,
}

type Listeners = Vec<(u64, Arc<dyn ReceiveHandler>)>;

#[derive(Default)]
struct Bus {
    channels: DashMap<Locator, Listeners>,
    delivered: AtomicU64,
}

impl Bus {
    fn deliver(&self, packet: &Packet) {
        // Clone the handler list so no shard lock is held during callbacks.
        let listeners: Listeners = match self.channels.get(&packet.destination) {
            Some(entry) => entry.value().clone(),
            None => {
                log::trace!("[transport] loopback: no listener on {}", packet.destination);
                return;
            }
        };
        for (_, handler) in listeners {
            handler.on_receive(&packet.data, &packet.source);
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Shared in-process datagram bus.
pub struct LoopbackNetwork {
    bus: Arc<Bus>,
    sender: Sender<Packet>,
    drop_filter: ArcSwapOption<DropFilter>,
    dropped: AtomicU64,
    next_id: AtomicU64,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = channel::unbounded();
        let bus = Arc::new(Bus::default());
        let running = Arc::new(AtomicBool::new(true));

        let bus_clone = Arc::clone(&bus);
        let running_clone = Arc::clone(&running);
        let worker = thread::Builder::new()
            .name("hdds-loopback".to_string())
            .spawn(move || Self::run_loop(receiver, bus_clone, running_clone));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("[transport] loopback worker spawn failed: {}", e);
                None
            }
        };

        Arc::new(Self {
            bus,
            sender,
            drop_filter: ArcSwapOption::empty(),
            dropped: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            running,
            worker: Mutex::new(worker),
        })
    }

    fn run_loop(receiver: Receiver<Packet>, bus: Arc<Bus>, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(packet) => bus.deliver(&packet),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::trace!("[transport] loopback worker exiting");
    }

    /// New transport handle attached to this bus.
    pub fn transport(self: &Arc<Self>) -> LoopbackTransport {
        LoopbackTransport {
            network: Arc::clone(self),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            source: Mutex::new(Locator::INVALID),
        }
    }

    /// Install a loss filter; it sees every datagram before it is queued.
    pub fn set_drop_filter<F>(&self, filter: F)
    where
        F: Fn(&[u8], &Locator) -> bool + Send + Sync + 'static,
    {
        let boxed: DropFilter = Box::new(filter);
        self.drop_filter.store(Some(Arc::new(boxed)));
    }

    pub fn clear_drop_filter(&self) {
        self.drop_filter.store(None);
    }

    /// Datagrams discarded by the drop filter so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Datagram deliveries (one per listening handler) so far.
    pub fn delivered(&self) -> u64 {
        self.bus.delivered.load(Ordering::Relaxed)
    }

    fn submit(&self, data: &[u8], source: Locator, destination: &Locator) -> bool {
        if let Some(filter) = self.drop_filter.load().as_ref() {
            if (**filter)(data, destination) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("[transport] loopback: dropped {} bytes to {}", data.len(), destination);
                return true;
            }
        }
        let packet = Packet {
            data: data.to_vec(),
            source,
            destination: *destination,
        };
        if self.worker.lock().is_none() {
            self.bus.deliver(&packet);
            return true;
        }
        self.sender.send(packet).is_ok()
    }
}

impl Drop for LoopbackNetwork {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.worker.lock().take() {
            // The last reference may be released by a handler running on the worker.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// One participant's view of a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
    id: u64,
    source: Mutex<Locator>,
}

impl LoopbackTransport {
    pub fn network(&self) -> &Arc<LoopbackNetwork> {
        &self.network
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, data: &[u8], destination: &Locator) -> bool {
        let source = *self.source.lock();
        self.network.submit(data, source, destination)
    }

    fn open_input_channel(
        &self,
        locator: &Locator,
        handler: Arc<dyn ReceiveHandler>,
    ) -> io::Result<()> {
        let mut listeners = self.network.bus.channels.entry(*locator).or_default();
        if listeners.iter().any(|(id, _)| *id == self.id) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("channel {} already open", locator),
            ));
        }
        listeners.push((self.id, handler));
        drop(listeners);

        if !locator.is_multicast() {
            let mut source = self.source.lock();
            if !source.is_valid() {
                *source = *locator;
            }
        }
        log::debug!("[transport] loopback: opened {}", locator);
        Ok(())
    }

    fn close_input_channel(&self, locator: &Locator) -> bool {
        let mut removed = false;
        if let Some(mut listeners) = self.network.bus.channels.get_mut(locator) {
            let before = listeners.len();
            listeners.retain(|(id, _)| *id != self.id);
            removed = listeners.len() != before;
        }
        self.network
            .bus
            .channels
            .remove_if(locator, |_, listeners| listeners.is_empty());
        removed
    }

    fn unicast_locators(&self, port: u32) -> Vec<Locator> {
        vec![Locator::udpv4([127, 0, 0, 1], port)]
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let id = self.id;
        self.network
            .bus
            .channels
            .retain(|_, listeners| {
                listeners.retain(|(owner, _)| *owner != id);
                !listeners.is_empty()
            });
    }
}
