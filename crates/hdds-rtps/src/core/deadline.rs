// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-instance DEADLINE bookkeeping.
//!
//! The owning endpoint keeps a single timer armed for [`DeadlineTracker::next_due`];
//! when it fires, [`DeadlineTracker::check`] reports the instances that missed their
//! period and rearms them one period later.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::guid::InstanceHandle;
use crate::core::time::is_infinite;

#[derive(Debug)]
pub(crate) struct DeadlineTracker {
    period: Duration,
    due: HashMap<InstanceHandle, Instant>,
}

impl DeadlineTracker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            due: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !is_infinite(self.period) && !self.period.is_zero()
    }

    /// The instance was written (or received) at `now`.
    pub fn touch(&mut self, instance: InstanceHandle, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        if let Some(due) = now.checked_add(self.period) {
            self.due.insert(instance, due);
        }
    }

    /// Stop tracking an instance (disposed or unregistered).
    pub fn remove(&mut self, instance: &InstanceHandle) {
        self.due.remove(instance);
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.due.values().min().copied()
    }

    /// Instances whose deadline passed by `now`; each is rearmed one period later.
    pub fn check(&mut self, now: Instant) -> Vec<InstanceHandle> {
        let period = self.period;
        let mut missed = Vec::new();
        for (handle, due) in self.due.iter_mut() {
            if *due <= now {
                missed.push(*handle);
                *due = now.checked_add(period).unwrap_or(now);
            }
        }
        missed
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }
}
