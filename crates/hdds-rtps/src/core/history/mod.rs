// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Change histories
//!
//! [`HistoryCache`] is the ordered store shared by both sides: changes in insertion
//! order, an index per instance, and the admission rules of the HISTORY and
//! RESOURCE_LIMITS policies.
//!
//! - KEEP_LAST(depth): at most `depth` changes per instance (a single list for
//!   unkeyed topics); admitting one more evicts the oldest of that instance. At
//!   global capacity the oldest change is evicted as well.
//! - KEEP_ALL: once `max_samples`, `max_samples_per_instance` or `max_instances`
//!   is reached the change is rejected and the history is left unchanged.
//!
//! [`WriterHistory`] and [`ReaderHistory`] add the side-specific bookkeeping.
//! Neither is internally synchronized: each is owned by its endpoint and guarded
//! by the endpoint lock.

mod instance;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::core::cache_change::{CacheChange, SampleIdentity};
use crate::core::guid::InstanceHandle;
use crate::dds::listener::SampleRejectedReason;
use crate::qos::{History, ResourceLimits};

pub use instance::{InstanceState, SampleState, ViewState};
pub use reader::{ReaderHistory, SampleInfo};
pub use writer::WriterHistory;

/// A change plus side-specific metadata.
#[derive(Debug, Clone)]
pub(crate) struct Slot<M> {
    pub change: CacheChange,
    pub meta: M,
}

/// Outcome of a successful admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admit,
    /// Admit after removing the change at this insertion index.
    EvictThenAdmit(u64),
}

pub(crate) struct HistoryCache<M> {
    policy: History,
    limits: ResourceLimits,
    slots: BTreeMap<u64, Slot<M>>,
    instances: HashMap<InstanceHandle, VecDeque<u64>>,
    index_of: HashMap<SampleIdentity, u64>,
    next_index: u64,
}

impl<M> HistoryCache<M> {
    pub fn new(policy: History, limits: ResourceLimits) -> Self {
        Self {
            policy,
            limits,
            slots: BTreeMap::new(),
            instances: HashMap::new(),
            index_of: HashMap::new(),
            next_index: 0,
        }
    }

    pub fn policy(&self) -> History {
        self.policy
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Instances currently holding at least one change.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instance_len(&self, instance: &InstanceHandle) -> usize {
        self.instances.get(instance).map_or(0, VecDeque::len)
    }

    /// True when the next admission of a new change cannot succeed without eviction.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.limits.max_samples
    }

    /// Effective KEEP_LAST depth, bounded by `max_samples_per_instance`.
    fn depth(&self) -> Option<usize> {
        match self.policy {
            History::KeepLast(depth) => {
                Some((depth as usize).min(self.limits.max_samples_per_instance))
            }
            History::KeepAll => None,
        }
    }

    /// Decide whether a change for `instance` may enter. `reserved` slots are held
    /// back for changes known to precede it (KEEP_ALL only).
    pub fn admission(
        &self,
        instance: &InstanceHandle,
        reserved: usize,
    ) -> Result<Admission, SampleRejectedReason> {
        let list = self.instances.get(instance);
        let inst_len = list.map_or(0, VecDeque::len);

        if inst_len == 0 && self.instances.len() >= self.limits.max_instances {
            return Err(SampleRejectedReason::RejectedByInstancesLimit);
        }

        match self.depth() {
            Some(depth) => {
                if inst_len >= depth {
                    return list
                        .and_then(|l| l.front().copied())
                        .map(Admission::EvictThenAdmit)
                        .ok_or(SampleRejectedReason::RejectedBySamplesPerInstanceLimit);
                }
                if self.slots.len() >= self.limits.max_samples {
                    let victim = list
                        .and_then(|l| l.front().copied())
                        .or_else(|| self.slots.keys().next().copied());
                    return victim
                        .map(Admission::EvictThenAdmit)
                        .ok_or(SampleRejectedReason::RejectedBySamplesLimit);
                }
                Ok(Admission::Admit)
            }
            None => {
                if inst_len.saturating_add(reserved) >= self.limits.max_samples_per_instance {
                    return Err(SampleRejectedReason::RejectedBySamplesPerInstanceLimit);
                }
                if self.slots.len().saturating_add(reserved) >= self.limits.max_samples {
                    return Err(SampleRejectedReason::RejectedBySamplesLimit);
                }
                Ok(Admission::Admit)
            }
        }
    }

    /// Admission check, eviction and insertion in one step. Returns the evicted slot.
    pub fn add(
        &mut self,
        change: CacheChange,
        meta: M,
        reserved: usize,
    ) -> Result<Option<Slot<M>>, SampleRejectedReason> {
        let evicted = match self.admission(&change.instance_handle, reserved)? {
            Admission::Admit => None,
            Admission::EvictThenAdmit(index) => self.remove_index(index),
        };
        self.insert(change, meta);
        Ok(evicted)
    }

    fn insert(&mut self, change: CacheChange, meta: M) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.instances
            .entry(change.instance_handle)
            .or_default()
            .push_back(index);
        self.index_of.insert(change.identity(), index);
        self.slots.insert(index, Slot { change, meta });
        index
    }

    pub fn remove_index(&mut self, index: u64) -> Option<Slot<M>> {
        let slot = self.slots.remove(&index)?;
        self.index_of.remove(&slot.change.identity());
        let instance = slot.change.instance_handle;
        if let Some(list) = self.instances.get_mut(&instance) {
            list.retain(|i| *i != index);
            if list.is_empty() {
                self.instances.remove(&instance);
            }
        }
        Some(slot)
    }

    pub fn remove(&mut self, identity: &SampleIdentity) -> Option<Slot<M>> {
        let index = *self.index_of.get(identity)?;
        self.remove_index(index)
    }

    pub fn contains(&self, identity: &SampleIdentity) -> bool {
        self.index_of.contains_key(identity)
    }

    pub fn get(&self, identity: &SampleIdentity) -> Option<&Slot<M>> {
        self.index_of
            .get(identity)
            .and_then(|index| self.slots.get(index))
    }

    pub fn first(&self) -> Option<(u64, &Slot<M>)> {
        self.slots.iter().next().map(|(i, s)| (*i, s))
    }

    pub fn last(&self) -> Option<(u64, &Slot<M>)> {
        self.slots.iter().next_back().map(|(i, s)| (*i, s))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Slot<M>)> + '_ {
        self.slots.iter().map(|(i, s)| (*i, s))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut Slot<M>)> + '_ {
        self.slots.iter_mut().map(|(i, s)| (*i, s))
    }

    /// Slots with insertion index `>= from`.
    pub fn range_from(&self, from: u64) -> impl Iterator<Item = (u64, &Slot<M>)> + '_ {
        self.slots.range(from..).map(|(i, s)| (*i, s))
    }

    pub fn slot_mut(&mut self, index: u64) -> Option<&mut Slot<M>> {
        self.slots.get_mut(&index)
    }

    /// Remove every slot matching `pred`; returns them in insertion order.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Slot<M>) -> bool) -> Vec<Slot<M>> {
        let victims: Vec<u64> = self
            .slots
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(i, _)| *i)
            .collect();
        victims
            .into_iter()
            .filter_map(|i| self.remove_index(i))
            .collect()
    }
}
