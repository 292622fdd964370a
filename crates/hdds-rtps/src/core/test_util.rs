// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Helpers shared by the engine unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::protocol::{RtpsMessage, Submessage};
use crate::transport::{Locator, ReceiveHandler, Transport};

/// Transport that records every datagram instead of sending it.
/// Destinations passed to [`Capture::fail_to`] refuse every send.
#[derive(Default)]
pub(crate) struct Capture {
    pub sent: Mutex<Vec<(Vec<u8>, Locator)>>,
    unreachable: Mutex<HashSet<Locator>>,
}

impl Capture {
    pub fn fail_to(&self, dst: Locator) {
        self.unreachable.lock().insert(dst);
    }

    pub fn restore(&self, dst: &Locator) {
        self.unreachable.lock().remove(dst);
    }

    pub fn messages(&self) -> Vec<RtpsMessage> {
        self.sent
            .lock()
            .iter()
            .map(|(bytes, _)| RtpsMessage::decode(bytes).unwrap())
            .collect()
    }

    pub fn submessages(&self) -> Vec<Submessage> {
        self.messages()
            .into_iter()
            .flat_map(|m| m.submessages)
            .collect()
    }

    pub fn submessages_to(&self, dst: Locator) -> Vec<Submessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(_, to)| *to == dst)
            .flat_map(|(bytes, _)| RtpsMessage::decode(bytes).unwrap().submessages)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for Capture {
    fn send(&self, data: &[u8], destination: &Locator) -> bool {
        if self.unreachable.lock().contains(destination) {
            return false;
        }
        self.sent.lock().push((data.to_vec(), *destination));
        true
    }

    fn open_input_channel(
        &self,
        _locator: &Locator,
        _handler: Arc<dyn ReceiveHandler>,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn close_input_channel(&self, _locator: &Locator) -> bool {
        true
    }

    fn unicast_locators(&self, port: u32) -> Vec<Locator> {
        vec![Locator::udpv4([127, 0, 0, 1], port)]
    }
}

/// Poll `cond` every 5 ms until it holds or `timeout` elapses.
pub(crate) fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
