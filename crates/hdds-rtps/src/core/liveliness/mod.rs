// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LivelinessManager
//!
//! Tracks a set of writers (local ones for LIVELINESS_LOST, remote ones for
//! LIVELINESS_CHANGED) and demotes them to NOT_ASSERTED once their lease runs out.
//!
//! A single [`TimedEvent`] is armed for the earliest expiration among alive
//! writers. When it fires, every writer past its expiration is demoted, the
//! callback runs once per demoted writer, and the timer is rearmed for the next
//! earliest expiration.
//!
//! Assertion scope follows the liveliness kind:
//! - AUTOMATIC / MANUAL_BY_PARTICIPANT: asserting one writer refreshes every writer
//!   of the same kind in the same participant.
//! - MANUAL_BY_TOPIC: only the asserted writer is refreshed.


use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::guid::{GuidPrefix, GUID};
use crate::core::timer::{EventAction, TimedEvent, TimedEventScheduler};
use crate::qos::LivelinessKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivelinessStatus {
    Alive,
    NotAsserted,
}

/// Liveliness bookkeeping of one writer.
#[derive(Debug, Clone)]
pub struct LivelinessData {
    pub guid: GUID,
    pub kind: LivelinessKind,
    pub lease_duration: Duration,
    pub status: LivelinessStatus,
    pub last_assertion: Instant,
}

impl LivelinessData {
    /// `None` for an infinite lease.
    fn expiration(&self) -> Option<Instant> {
        self.last_assertion.checked_add(self.lease_duration)
    }
}

/// One status transition reported by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivelinessEvent {
    pub guid: GUID,
    pub kind: LivelinessKind,
    pub lease_duration: Duration,
    pub alive_change: i32,
    pub not_alive_change: i32,
}

impl LivelinessEvent {
    fn lost(data: &LivelinessData) -> Self {
        Self {
            guid: data.guid,
            kind: data.kind,
            lease_duration: data.lease_duration,
            alive_change: -1,
            not_alive_change: 1,
        }
    }

    fn recovered(data: &LivelinessData) -> Self {
        Self {
            guid: data.guid,
            kind: data.kind,
            lease_duration: data.lease_duration,
            alive_change: 1,
            not_alive_change: -1,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.alive_change < 0
    }
}

pub type LivelinessCallback = Arc<dyn Fn(&LivelinessEvent) + Send + Sync>;

struct Shared {
    writers: Mutex<Vec<LivelinessData>>,
    callback: LivelinessCallback,
}

impl Shared {
    fn next_expiration(writers: &[LivelinessData]) -> Option<Instant> {
        writers
            .iter()
            .filter(|w| w.status == LivelinessStatus::Alive)
            .filter_map(LivelinessData::expiration)
            .min()
    }

    fn on_timer(&self) -> EventAction {
        let now = Instant::now();
        let (lost, next) = {
            let mut writers = self.writers.lock();
            let mut lost = Vec::new();
            for w in writers.iter_mut() {
                if w.status == LivelinessStatus::Alive
                    && w.expiration().is_some_and(|exp| exp <= now)
                {
                    w.status = LivelinessStatus::NotAsserted;
                    lost.push(LivelinessEvent::lost(w));
                }
            }
            (lost, Self::next_expiration(&writers))
        };

        for event in &lost {
            log::debug!(
                "[liveliness] writer {} lost liveliness (lease {:?})",
                event.guid,
                event.lease_duration
            );
            (self.callback)(event);
        }

        match next {
            Some(exp) => EventAction::RestartAfter(exp.saturating_duration_since(now)),
            None => EventAction::Stop,
        }
    }
}

pub struct LivelinessManager {
    shared: Arc<Shared>,
    timer: TimedEvent,
}

impl LivelinessManager {
    pub fn new<F>(scheduler: &TimedEventScheduler, callback: F) -> Self
    where
        F: Fn(&LivelinessEvent) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            writers: Mutex::new(Vec::new()),
            callback: Arc::new(callback),
        });
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let timer = scheduler.create_event(Duration::from_secs(1), move || match weak.upgrade() {
            Some(shared) => shared.on_timer(),
            None => EventAction::Stop,
        });
        Self { shared, timer }
    }

    /// Start tracking a writer. Its lease starts now, in the ALIVE state.
    /// Returns false if the writer is already tracked.
    pub fn add_writer(&self, guid: GUID, kind: LivelinessKind, lease_duration: Duration) -> bool {
        {
            let mut writers = self.shared.writers.lock();
            if writers.iter().any(|w| w.guid == guid) {
                return false;
            }
            writers.push(LivelinessData {
                guid,
                kind,
                lease_duration,
                status: LivelinessStatus::Alive,
                last_assertion: Instant::now(),
            });
        }
        log::trace!("[liveliness] tracking {} ({:?}, {:?})", guid, kind, lease_duration);
        self.reschedule();
        true
    }

    /// Stop tracking a writer; returns its last data.
    pub fn remove_writer(&self, guid: &GUID) -> Option<LivelinessData> {
        let removed = {
            let mut writers = self.shared.writers.lock();
            let pos = writers.iter().position(|w| w.guid == *guid)?;
            writers.remove(pos)
        };
        self.reschedule();
        Some(removed)
    }

    /// Assert one writer, widened to its participant for AUTOMATIC and
    /// MANUAL_BY_PARTICIPANT writers. Returns false if the writer is unknown.
    pub fn assert_liveliness(&self, guid: &GUID) -> bool {
        let kind = {
            let writers = self.shared.writers.lock();
            match writers.iter().find(|w| w.guid == *guid) {
                Some(w) => w.kind,
                None => return false,
            }
        };
        match kind {
            LivelinessKind::ManualByTopic => self.refresh(|w| w.guid == *guid),
            _ => self.refresh(|w| w.kind == kind && w.guid.prefix == guid.prefix),
        };
        true
    }

    /// Assert every writer of `kind`, restricted to one participant when given.
    /// Returns false if no writer matched.
    pub fn assert_liveliness_kind(&self, kind: LivelinessKind, prefix: Option<GuidPrefix>) -> bool {
        self.refresh(|w| w.kind == kind && prefix.map_or(true, |p| w.guid.prefix == p)) > 0
    }

    fn refresh(&self, mut select: impl FnMut(&LivelinessData) -> bool) -> usize {
        let now = Instant::now();
        let (count, recovered) = {
            let mut writers = self.shared.writers.lock();
            let mut count = 0;
            let mut recovered = Vec::new();
            for w in writers.iter_mut().filter(|w| select(w)) {
                count += 1;
                w.last_assertion = now;
                if w.status == LivelinessStatus::NotAsserted {
                    w.status = LivelinessStatus::Alive;
                    recovered.push(LivelinessEvent::recovered(w));
                }
            }
            (count, recovered)
        };
        for event in &recovered {
            log::debug!("[liveliness] writer {} recovered liveliness", event.guid);
            (self.shared.callback)(event);
        }
        if count > 0 {
            self.reschedule();
        }
        count
    }

    /// Rearm the single timer for the earliest expiration among alive writers.
    fn reschedule(&self) {
        let next = Shared::next_expiration(&self.shared.writers.lock());
        match next {
            Some(exp) => {
                self.timer
                    .restart_timer_after(exp.saturating_duration_since(Instant::now()));
            }
            None => {
                self.timer.cancel_timer();
            }
        }
    }

    pub fn status(&self, guid: &GUID) -> Option<LivelinessStatus> {
        self.shared
            .writers
            .lock()
            .iter()
            .find(|w| w.guid == *guid)
            .map(|w| w.status)
    }

    pub fn is_any_alive(&self, kind: LivelinessKind) -> bool {
        self.shared
            .writers
            .lock()
            .iter()
            .any(|w| w.kind == kind && w.status == LivelinessStatus::Alive)
    }

    /// Snapshot of the tracked writers.
    pub fn writers(&self) -> Vec<LivelinessData> {
        self.shared.writers.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.shared.writers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.writers.lock().is_empty()
    }
}
