// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant Discovery Protocol registry.
//!
//! ```text
//!   SPDP DATA ──> DISCOVERED ──(announcement / any traffic)──> lease renewed
//!                      │
//!                      ├── lease expiry ──┐
//!                      └── withdrawal ────┴──> REMOVED ──> removal callback
//! ```
//!
//! Lease expiry uses one timer armed for the earliest expiration across all
//! remote participants, rearmed after every check. The removal callback runs with
//! the registry lock released, so it may query the registry or cascade into
//! endpoint discovery.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::data::ParticipantProxyData;
use crate::core::guid::GuidPrefix;
use crate::core::time::is_infinite;
use crate::core::timer::{EventAction, TimedEvent, TimedEventScheduler};

/// What an incoming SPDP announcement meant to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdpEvent {
    /// First announcement from this participant.
    Discovered(ParticipantProxyData),
    /// Known participant whose data changed.
    Updated(ParticipantProxyData),
    /// Known participant, same data; only the lease was renewed.
    Renewed,
}

pub type RemovalCallback = Arc<dyn Fn(&ParticipantProxyData) + Send + Sync>;

struct Entry {
    data: ParticipantProxyData,
    /// `None` for an infinite lease.
    expires: Option<Instant>,
}

impl Entry {
    fn renew(&mut self, now: Instant) {
        self.expires = if is_infinite(self.data.lease_duration) {
            None
        } else {
            now.checked_add(self.data.lease_duration)
        };
    }
}

struct Shared {
    participants: Mutex<HashMap<GuidPrefix, Entry>>,
    on_removed: RemovalCallback,
}

impl Shared {
    fn next_expiration(participants: &HashMap<GuidPrefix, Entry>) -> Option<Instant> {
        participants.values().filter_map(|e| e.expires).min()
    }

    fn check_leases(&self) -> EventAction {
        let now = Instant::now();
        let (expired, next) = {
            let mut participants = self.participants.lock();
            let prefixes: Vec<GuidPrefix> = participants
                .iter()
                .filter(|(_, e)| e.expires.is_some_and(|exp| exp <= now))
                .map(|(prefix, _)| *prefix)
                .collect();
            let expired: Vec<ParticipantProxyData> = prefixes
                .iter()
                .filter_map(|p| participants.remove(p))
                .map(|e| e.data)
                .collect();
            (expired, Self::next_expiration(&participants))
        };

        for data in &expired {
            log::info!(
                "[PDP] participant '{}' ({}) lease expired after {:?}",
                data.name,
                data.guid(),
                data.lease_duration
            );
            (self.on_removed)(data);
        }

        match next {
            Some(exp) => EventAction::RestartAfter(exp.saturating_duration_since(now)),
            None => EventAction::Stop,
        }
    }
}

/// Registry of remote participants.
pub struct Pdp {
    local: ParticipantProxyData,
    shared: Arc<Shared>,
    lease_timer: TimedEvent,
}

impl Pdp {
    pub fn new<F>(local: ParticipantProxyData, scheduler: &TimedEventScheduler, on_removed: F) -> Self
    where
        F: Fn(&ParticipantProxyData) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            participants: Mutex::new(HashMap::new()),
            on_removed: Arc::new(on_removed),
        });
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let lease_timer =
            scheduler.create_event(local.lease_duration, move || match weak.upgrade() {
                Some(shared) => shared.check_leases(),
                None => EventAction::Stop,
            });
        Self {
            local,
            shared,
            lease_timer,
        }
    }

    /// What this participant announces.
    pub fn local_data(&self) -> &ParticipantProxyData {
        &self.local
    }

    /// Feed one SPDP announcement. `None` for our own announcement looping back.
    pub fn on_participant_data(&self, data: ParticipantProxyData) -> Option<PdpEvent> {
        if data.guid_prefix == self.local.guid_prefix {
            return None;
        }
        if data.domain_id != self.local.domain_id {
            log::trace!(
                "[PDP] ignoring '{}' from domain {} (local domain {})",
                data.name,
                data.domain_id,
                self.local.domain_id
            );
            return None;
        }

        let now = Instant::now();
        let event = {
            let mut participants = self.shared.participants.lock();
            match participants.get_mut(&data.guid_prefix) {
                Some(entry) if entry.data == data => {
                    entry.renew(now);
                    PdpEvent::Renewed
                }
                Some(entry) => {
                    entry.data = data.clone();
                    entry.renew(now);
                    PdpEvent::Updated(data)
                }
                None => {
                    let mut entry = Entry {
                        data: data.clone(),
                        expires: None,
                    };
                    entry.renew(now);
                    participants.insert(data.guid_prefix, entry);
                    PdpEvent::Discovered(data)
                }
            }
        };

        match &event {
            PdpEvent::Discovered(data) => {
                log::info!(
                    "[PDP] discovered participant '{}' ({}), lease {:?}",
                    data.name,
                    data.guid(),
                    data.lease_duration
                );
                self.rearm();
            }
            PdpEvent::Updated(data) => {
                log::debug!("[PDP] participant '{}' updated its data", data.name);
                self.rearm();
            }
            PdpEvent::Renewed => {
                if !self.lease_timer.is_armed() {
                    self.rearm();
                }
            }
        }
        Some(event)
    }

    /// Renew the lease of a known participant. False when it is unknown.
    pub fn assert_participant(&self, prefix: &GuidPrefix) -> bool {
        let renewed = match self.shared.participants.lock().get_mut(prefix) {
            Some(entry) => {
                entry.renew(Instant::now());
                true
            }
            None => false,
        };
        if renewed && !self.lease_timer.is_armed() {
            self.rearm();
        }
        renewed
    }

    /// Explicit removal (SPDP withdrawal). Runs the removal callback.
    pub fn remove_participant(&self, prefix: &GuidPrefix) -> Option<ParticipantProxyData> {
        let removed = self.shared.participants.lock().remove(prefix)?.data;
        log::info!(
            "[PDP] participant '{}' ({}) removed",
            removed.name,
            removed.guid()
        );
        (self.shared.on_removed)(&removed);
        self.rearm();
        Some(removed)
    }

    pub fn participant(&self, prefix: &GuidPrefix) -> Option<ParticipantProxyData> {
        self.shared
            .participants
            .lock()
            .get(prefix)
            .map(|e| e.data.clone())
    }

    pub fn participants(&self) -> Vec<ParticipantProxyData> {
        self.shared
            .participants
            .lock()
            .values()
            .map(|e| e.data.clone())
            .collect()
    }

    pub fn is_known(&self, prefix: &GuidPrefix) -> bool {
        self.shared.participants.lock().contains_key(prefix)
    }

    pub fn len(&self) -> usize {
        self.shared.participants.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rearm(&self) {
        let next = Shared::next_expiration(&self.shared.participants.lock());
        match next {
            Some(exp) => {
                self.lease_timer
                    .restart_timer_after(exp.saturating_duration_since(Instant::now()));
            }
            None => {
                self.lease_timer.cancel_timer();
            }
        }
    }

    /// Time left on a participant's lease, `None` if unknown or infinite.
    pub fn lease_remaining(&self, prefix: &GuidPrefix) -> Option<Duration> {
        let participants = self.shared.participants.lock();
        let expires = participants.get(prefix)?.expires?;
        Some(expires.saturating_duration_since(Instant::now()))
    }
}

impl Drop for Pdp {
    fn drop(&mut self) {
        self.lease_timer.recreate_timer();
    }
}
