// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timed-event scheduler
//!
//! One worker thread (`hdds-timer`) serves every periodic or one-shot event of a
//! participant: heartbeats, ACKNACK responses, deadline and lifespan checks,
//! liveliness leases.
//!
//! ```text
//!   TimedEvent::restart_timer()        hdds-timer
//!        |                                 |
//!        +--> heap.push(due, id, gen) ---> pop min due
//!                                          |  stale gen?  -> discard
//!                                          |  not due?    -> wait_until(due)
//!                                          +-> callback() -> Restart | Stop
//! ```
//!
//! Each event carries a generation counter. Restarting or cancelling bumps it, so
//! heap entries scheduled before are recognized as stale when they surface. A
//! callback runs with the scheduler lock released; [`TimedEvent::recreate_timer`]
//! and dropping a [`TimedEvent`] wait for a running callback to finish, which lets
//! an owner tear down state the callback closes over without racing it.

#[cfg(test)]
mod tests;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// What the scheduler does once a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Fire again one interval from now.
    Restart,
    /// Fire again after the given delay, interval unchanged.
    RestartAfter(Duration),
    /// Stay idle until restarted.
    Stop,
}

type Callback = Box<dyn FnMut() -> EventAction + Send>;

struct EventEntry {
    generation: u64,
    interval: Duration,
    armed: bool,
    /// `None` while the callback is running on the worker.
    callback: Option<Callback>,
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Reverse<(Instant, u64, u64)>>,
    events: HashMap<u64, EventEntry>,
    next_id: u64,
    firing: Option<u64>,
    worker: Option<ThreadId>,
}

struct Inner {
    state: Mutex<State>,
    cond: Condvar,
    running: AtomicBool,
}

impl Inner {
    fn schedule(&self, id: u64, delay: Option<Duration>) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(entry) = state.events.get_mut(&id) else {
            return false;
        };
        entry.generation += 1;
        // An infinite interval never fires.
        let Some(due) = Instant::now().checked_add(delay.unwrap_or(entry.interval)) else {
            entry.armed = false;
            return false;
        };
        entry.armed = true;
        let generation = entry.generation;
        state.heap.push(Reverse((due, id, generation)));
        drop(guard);
        self.cond.notify_all();
        true
    }

    fn cancel(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        match state.events.get_mut(&id) {
            Some(entry) if entry.armed => {
                entry.generation += 1;
                entry.armed = false;
                true
            }
            _ => false,
        }
    }

    /// Block while the callback of `id` is running, unless called from that callback.
    fn wait_idle(&self, id: u64) {
        let mut state = self.state.lock();
        if state.worker == Some(thread::current().id()) {
            return;
        }
        while state.firing == Some(id) {
            self.cond.wait(&mut state);
        }
    }

    fn run(&self) {
        let mut state = self.state.lock();
        state.worker = Some(thread::current().id());
        while self.running.load(Ordering::Acquire) {
            let Some(Reverse((due, id, generation))) = state.heap.peek().copied() else {
                self.cond.wait(&mut state);
                continue;
            };

            let current = state
                .events
                .get(&id)
                .filter(|e| e.armed && e.generation == generation)
                .is_some();
            if !current {
                state.heap.pop();
                continue;
            }

            if due > Instant::now() {
                let _ = self.cond.wait_until(&mut state, due);
                continue;
            }

            state.heap.pop();
            let callback = state.events.get_mut(&id).and_then(|e| {
                e.armed = false;
                e.callback.take()
            });
            let Some(mut callback) = callback else {
                continue;
            };
            state.firing = Some(id);
            drop(state);

            let action = callback();

            state = self.state.lock();
            state.firing = None;
            let st = &mut *state;
            let orphan = match st.events.get_mut(&id) {
                Some(entry) => {
                    entry.callback = Some(callback);
                    // A restart or cancel issued from inside the callback wins.
                    let delay = match action {
                        EventAction::Restart => Some(entry.interval),
                        EventAction::RestartAfter(delay) => Some(delay),
                        EventAction::Stop => None,
                    };
                    if let (Some(delay), false, true) =
                        (delay, entry.armed, entry.generation == generation)
                    {
                        if let Some(next) = Instant::now().checked_add(delay) {
                            entry.generation += 1;
                            entry.armed = true;
                            let generation = entry.generation;
                            st.heap.push(Reverse((next, id, generation)));
                        }
                    }
                    None
                }
                None => Some(callback),
            };
            self.cond.notify_all();
            if let Some(orphan) = orphan {
                // The event was dropped from its own callback; captured state may
                // own other events, so release the lock first.
                drop(state);
                drop(orphan);
                state = self.state.lock();
            }
        }
        log::trace!("[timer] worker exiting");
    }
}

/// Owner of the timer thread. Events created from it stop firing once it is dropped.
pub struct TimedEventScheduler {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimedEventScheduler {
    pub fn new() -> io::Result<Self> {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
            running: AtomicBool::new(true),
        });
        let inner_clone = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name("hdds-timer".to_string())
            .spawn(move || inner_clone.run())?;
        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Register an event. It stays idle until [`TimedEvent::restart_timer`] is called.
    pub fn create_event<F>(&self, interval: Duration, callback: F) -> TimedEvent
    where
        F: FnMut() -> EventAction + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.events.insert(
            id,
            EventEntry {
                generation: 0,
                interval,
                armed: false,
                callback: Some(Box::new(callback)),
            },
        );
        TimedEvent {
            id,
            scheduler: Arc::downgrade(&self.inner),
        }
    }

    /// Events currently waiting to fire.
    pub fn armed_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .events
            .values()
            .filter(|e| e.armed)
            .count()
    }
}

impl Drop for TimedEventScheduler {
    fn drop(&mut self) {
        {
            // Under the lock so the worker cannot miss the wakeup.
            let _state = self.inner.state.lock();
            self.inner.running.store(false, Ordering::Release);
        }
        self.inner.cond.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Handle to one scheduled callback.
pub struct TimedEvent {
    id: u64,
    scheduler: Weak<Inner>,
}

impl TimedEvent {
    /// (Re)arm the event one interval from now, superseding any pending firing.
    pub fn restart_timer(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.schedule(self.id, None))
    }

    /// (Re)arm the event to fire after `delay`; the interval is unchanged.
    pub fn restart_timer_after(&self, delay: Duration) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.schedule(self.id, Some(delay)))
    }

    /// Disarm the event. No-op if it already fired or was cancelled.
    pub fn cancel_timer(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.cancel(self.id))
    }

    /// Disarm the event and wait for a running callback to return.
    pub fn recreate_timer(&self) {
        if let Some(inner) = self.scheduler.upgrade() {
            inner.cancel(self.id);
            inner.wait_idle(self.id);
        }
    }

    pub fn update_interval(&self, interval: Duration) {
        if let Some(inner) = self.scheduler.upgrade() {
            if let Some(entry) = inner.state.lock().events.get_mut(&self.id) {
                entry.interval = interval;
            }
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        let inner = self.scheduler.upgrade()?;
        let state = inner.state.lock();
        state.events.get(&self.id).map(|e| e.interval)
    }

    pub fn is_armed(&self) -> bool {
        self.scheduler.upgrade().is_some_and(|inner| {
            inner
                .state
                .lock()
                .events
                .get(&self.id)
                .is_some_and(|e| e.armed)
        })
    }
}

impl Drop for TimedEvent {
    fn drop(&mut self) {
        if let Some(inner) = self.scheduler.upgrade() {
            inner.cancel(self.id);
            inner.wait_idle(self.id);
            let entry = inner.state.lock().events.remove(&self.id);
            drop(entry);
        }
    }
}

impl std::fmt::Debug for TimedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedEvent").field("id", &self.id).finish()
    }
}
