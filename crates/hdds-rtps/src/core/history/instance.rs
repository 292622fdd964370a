// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-instance state tracked by reader histories.

use std::collections::HashSet;

use crate::core::cache_change::ChangeKind;
use crate::core::guid::GUID;

/// Whether the application already accessed a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleState {
    #[default]
    NotRead,
    Read,
}

/// Whether the instance was seen by the application since it (re)appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    New,
    NotNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    #[default]
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

impl InstanceState {
    pub fn is_alive(self) -> bool {
        self == InstanceState::Alive
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct InstanceRecord {
    pub state: InstanceState,
    pub view: ViewState,
    pub disposed_generation_count: u32,
    pub no_writers_generation_count: u32,
    writers: HashSet<GUID>,
}

impl InstanceRecord {
    /// Sum used for generation ranks.
    pub fn generation(&self) -> u32 {
        self.disposed_generation_count
            .saturating_add(self.no_writers_generation_count)
    }

    /// Apply a received change from `writer`.
    pub fn apply(&mut self, kind: ChangeKind, writer: GUID) {
        if kind.is_alive() {
            match self.state {
                InstanceState::NotAliveDisposed => {
                    self.disposed_generation_count += 1;
                    self.view = ViewState::New;
                }
                InstanceState::NotAliveNoWriters => {
                    self.no_writers_generation_count += 1;
                    self.view = ViewState::New;
                }
                InstanceState::Alive => {}
            }
            self.state = InstanceState::Alive;
            self.writers.insert(writer);
            return;
        }

        if kind.is_disposed() {
            self.state = InstanceState::NotAliveDisposed;
        }
        if kind.is_unregistered() {
            self.writers.remove(&writer);
            if self.writers.is_empty() && self.state == InstanceState::Alive {
                self.state = InstanceState::NotAliveNoWriters;
            }
        }
    }

    /// A matched writer went away. Returns true if the instance lost its last writer.
    pub fn writer_removed(&mut self, writer: &GUID) -> bool {
        if !self.writers.remove(writer) || !self.writers.is_empty() {
            return false;
        }
        if self.state == InstanceState::Alive {
            self.state = InstanceState::NotAliveNoWriters;
            return true;
        }
        false
    }
}
