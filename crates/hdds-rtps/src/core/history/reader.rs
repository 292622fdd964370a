// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-side history: admission with SAMPLE_REJECTED accounting, instance
//! lifecycle and the read/take access paths that produce [`SampleInfo`].

use std::collections::HashMap;

use super::instance::InstanceRecord;
use super::{HistoryCache, InstanceState, SampleState, Slot, ViewState};
use crate::core::cache_change::{CacheChange, SampleIdentity};
use crate::core::guid::{InstanceHandle, GUID};
use crate::core::time::Timestamp;
use crate::dds::listener::{SampleRejectedReason, SampleRejectedStatus};
use crate::qos::{History, Lifespan, ResourceLimits};

/// Metadata returned alongside each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_state: SampleState,
    pub view_state: ViewState,
    pub instance_state: InstanceState,
    pub disposed_generation_count: u32,
    pub no_writers_generation_count: u32,
    /// Samples of the same instance following this one in the returned collection.
    pub sample_rank: u32,
    /// Generations between this sample and the most recent sample of the instance
    /// in the collection.
    pub generation_rank: u32,
    /// Generations between this sample and the most recent sample of the instance
    /// in the history.
    pub absolute_generation_rank: u32,
    pub source_timestamp: Timestamp,
    pub instance_handle: InstanceHandle,
    pub publication_handle: GUID,
    /// False for dispose/unregister notifications.
    pub valid_data: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReaderMeta {
    state: SampleState,
    disposed_generation: u32,
    no_writers_generation: u32,
}

impl ReaderMeta {
    fn generation(&self) -> u32 {
        self.disposed_generation
            .saturating_add(self.no_writers_generation)
    }
}

pub struct ReaderHistory {
    cache: HistoryCache<ReaderMeta>,
    instances: HashMap<InstanceHandle, InstanceRecord>,
    rejected: SampleRejectedStatus,
    last_rejected: Option<SampleIdentity>,
    /// Every slot below this insertion index has been read.
    read_cursor: u64,
}

impl ReaderHistory {
    pub fn new(history: History, limits: ResourceLimits) -> Self {
        Self {
            cache: HistoryCache::new(history, limits),
            instances: HashMap::new(),
            rejected: SampleRejectedStatus::default(),
            last_rejected: None,
            read_cursor: 0,
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Admit a received change whose instance handle is already resolved.
    ///
    /// `unknown_missing` is the number of sequence numbers from the same writer that
    /// precede this change and have not arrived yet; under KEEP_ALL they keep slots
    /// reserved so an out-of-order arrival cannot starve them.
    ///
    /// Returns `Ok(false)` for a change already held (duplicate). On rejection the
    /// history is left unchanged and the rejected status is updated once per
    /// distinct sample.
    pub fn received_change(
        &mut self,
        change: CacheChange,
        unknown_missing: usize,
    ) -> Result<bool, SampleRejectedReason> {
        let identity = change.identity();
        if self.cache.contains(&identity) {
            return Ok(false);
        }

        let instance = change.instance_handle;
        if let Err(reason) = self.cache.admission(&instance, unknown_missing) {
            self.record_rejection(identity, instance, reason);
            return Err(reason);
        }

        let record = self.instances.entry(instance).or_default();
        record.apply(change.kind, change.writer_guid);
        let meta = ReaderMeta {
            state: SampleState::NotRead,
            disposed_generation: record.disposed_generation_count,
            no_writers_generation: record.no_writers_generation_count,
        };

        match self.cache.add(change, meta, unknown_missing) {
            Ok(Some(evicted)) => {
                log::trace!(
                    "[history] reader evicted {}:{} (KEEP_LAST)",
                    evicted.change.writer_guid,
                    evicted.change.sequence_number
                );
                Ok(true)
            }
            Ok(None) => Ok(true),
            Err(reason) => {
                self.record_rejection(identity, instance, reason);
                Err(reason)
            }
        }
    }

    fn record_rejection(
        &mut self,
        identity: SampleIdentity,
        instance: InstanceHandle,
        reason: SampleRejectedReason,
    ) {
        if self.last_rejected == Some(identity) {
            return;
        }
        self.last_rejected = Some(identity);
        self.rejected.total_count += 1;
        self.rejected.total_count_change += 1;
        self.rejected.last_reason = reason;
        self.rejected.last_instance_handle = instance;
        self.rejected.last_seq_num = identity.sequence_number;
        log::warn!(
            "[history] sample {}:{} rejected: {:?}",
            identity.writer_guid,
            identity.sequence_number,
            reason
        );
    }

    /// Admission check for a change that will be buffered before delivery.
    /// A failure is recorded in the rejected status like a real rejection.
    pub fn check_admission(
        &mut self,
        change: &CacheChange,
        unknown_missing: usize,
    ) -> Result<(), SampleRejectedReason> {
        let instance = change.instance_handle;
        self.cache
            .admission(&instance, unknown_missing)
            .map(|_| ())
            .map_err(|reason| {
                self.record_rejection(change.identity(), instance, reason);
                reason
            })
    }

    /// Whether a change for `instance` would currently be admitted.
    pub fn can_admit(&self, instance: &InstanceHandle, unknown_missing: usize) -> bool {
        self.cache.admission(instance, unknown_missing).is_ok()
    }

    pub fn remove_change(&mut self, identity: &SampleIdentity) -> bool {
        let removed = self.cache.remove(identity);
        if let Some(slot) = &removed {
            self.prune_instance(&slot.change.instance_handle);
        }
        removed.is_some()
    }

    /// Drop changes whose lifespan expired at `now`. Returns how many went.
    pub fn remove_expired(&mut self, lifespan: &Lifespan, now: Timestamp) -> usize {
        if lifespan.is_infinite() {
            return 0;
        }
        let removed = self
            .cache
            .remove_where(|slot| lifespan.is_expired(slot.change.source_timestamp, now));
        for slot in &removed {
            self.prune_instance(&slot.change.instance_handle);
        }
        removed.len()
    }

    /// A matched writer disappeared; instances left without a writer become
    /// NOT_ALIVE_NO_WRITERS. Returns the affected instances.
    pub fn writer_removed(&mut self, writer: &GUID) -> Vec<InstanceHandle> {
        self.instances
            .iter_mut()
            .filter_map(|(handle, rec)| rec.writer_removed(writer).then_some(*handle))
            .collect()
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn sample_rejected_status(&self) -> SampleRejectedStatus {
        self.rejected
    }

    /// Current status with the change counter reset.
    pub fn take_sample_rejected_status(&mut self) -> SampleRejectedStatus {
        let status = self.rejected;
        self.rejected.total_count_change = 0;
        status
    }

    pub fn instance_state(&self, instance: &InstanceHandle) -> Option<InstanceState> {
        self.instances.get(instance).map(|rec| rec.state)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn instance_len(&self, instance: &InstanceHandle) -> usize {
        self.cache.instance_len(instance)
    }

    pub fn instance_count(&self) -> usize {
        self.cache.instance_count()
    }

    pub fn contains(&self, identity: &SampleIdentity) -> bool {
        self.cache.contains(identity)
    }

    pub fn has_unread(&self) -> bool {
        self.cache
            .range_from(self.read_cursor)
            .any(|(_, slot)| slot.meta.state == SampleState::NotRead)
    }

    /// Oldest held change.
    pub fn get_earliest_change(&self) -> Option<&CacheChange> {
        self.cache.first().map(|(_, slot)| &slot.change)
    }

    /// Held changes in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheChange> + '_ {
        self.cache.iter().map(|(_, slot)| &slot.change)
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.cache
            .iter()
            .map(|(_, slot)| slot.change.source_timestamp)
            .min()
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Up to `max` samples in arrival order, marked read and left in the history.
    pub fn read(&mut self, max: usize) -> Vec<(CacheChange, SampleInfo)> {
        let picked: Vec<u64> = self.cache.iter().take(max).map(|(i, _)| i).collect();
        let out = self.collect(&picked);
        self.mark_read(&picked);
        out
    }

    /// Up to `max` samples in arrival order, removed from the history.
    pub fn take(&mut self, max: usize) -> Vec<(CacheChange, SampleInfo)> {
        let picked: Vec<u64> = self.cache.iter().take(max).map(|(i, _)| i).collect();
        let out = self.collect(&picked);
        self.remove_picked(&picked);
        out
    }

    /// Next sample not yet read, marked read.
    pub fn get_next_unread(&mut self) -> Option<(CacheChange, SampleInfo)> {
        let index = self.next_unread_index()?;
        let out = self.collect(&[index]).pop();
        self.mark_read(&[index]);
        out
    }

    /// Next sample not yet read, removed from the history.
    pub fn take_next_unread(&mut self) -> Option<(CacheChange, SampleInfo)> {
        let index = self.next_unread_index()?;
        let out = self.collect(&[index]).pop();
        self.remove_picked(&[index]);
        out
    }

    /// Oldest sample still held whatever its sample state, removed from the history.
    pub fn get_next_untaken(&mut self) -> Option<(CacheChange, SampleInfo)> {
        let (index, _) = self.cache.first()?;
        let out = self.collect(&[index]).pop();
        self.remove_picked(&[index]);
        out
    }

    fn next_unread_index(&mut self) -> Option<u64> {
        let found = self
            .cache
            .range_from(self.read_cursor)
            .find(|(_, slot)| slot.meta.state == SampleState::NotRead)
            .map(|(i, _)| i);
        if let Some(index) = found {
            self.read_cursor = self.read_cursor.max(index);
        }
        found
    }

    fn collect(&self, picked: &[u64]) -> Vec<(CacheChange, SampleInfo)> {
        let slots: Vec<(u64, &Slot<ReaderMeta>)> = self
            .cache
            .iter()
            .filter(|(i, _)| picked.contains(i))
            .collect();

        // Per instance: samples remaining after the current one, and the generation
        // of the most recent sample in the collection.
        let mut remaining: HashMap<InstanceHandle, u32> = HashMap::new();
        let mut newest_generation: HashMap<InstanceHandle, u32> = HashMap::new();
        for (_, slot) in &slots {
            let handle = slot.change.instance_handle;
            *remaining.entry(handle).or_default() += 1;
            newest_generation.insert(handle, slot.meta.generation());
        }

        slots
            .into_iter()
            .map(|(_, slot)| {
                let handle = slot.change.instance_handle;
                let left = remaining.entry(handle).or_default();
                *left = left.saturating_sub(1);
                let record = self.instances.get(&handle);
                let sample_generation = slot.meta.generation();
                let info = SampleInfo {
                    sample_state: slot.meta.state,
                    view_state: record.map_or(ViewState::New, |r| r.view),
                    instance_state: record.map_or(InstanceState::Alive, |r| r.state),
                    disposed_generation_count: slot.meta.disposed_generation,
                    no_writers_generation_count: slot.meta.no_writers_generation,
                    sample_rank: *left,
                    generation_rank: newest_generation
                        .get(&handle)
                        .copied()
                        .unwrap_or(sample_generation)
                        .saturating_sub(sample_generation),
                    absolute_generation_rank: record
                        .map_or(sample_generation, InstanceRecord::generation)
                        .saturating_sub(sample_generation),
                    source_timestamp: slot.change.source_timestamp,
                    instance_handle: handle,
                    publication_handle: slot.change.writer_guid,
                    valid_data: slot.change.kind.is_alive(),
                };
                (slot.change.clone(), info)
            })
            .collect()
    }

    fn mark_read(&mut self, picked: &[u64]) {
        for index in picked {
            if let Some(slot) = self.cache.slot_mut(*index) {
                slot.meta.state = SampleState::Read;
                let handle = slot.change.instance_handle;
                if let Some(rec) = self.instances.get_mut(&handle) {
                    rec.view = ViewState::NotNew;
                }
            }
        }
        self.advance_cursor();
    }

    fn remove_picked(&mut self, picked: &[u64]) {
        for index in picked {
            if let Some(slot) = self.cache.remove_index(*index) {
                let handle = slot.change.instance_handle;
                if let Some(rec) = self.instances.get_mut(&handle) {
                    rec.view = ViewState::NotNew;
                }
                self.prune_instance(&handle);
            }
        }
        self.advance_cursor();
    }

    fn advance_cursor(&mut self) {
        let next = self
            .cache
            .range_from(self.read_cursor)
            .find(|(_, slot)| slot.meta.state == SampleState::NotRead)
            .map(|(i, _)| i);
        if let Some(index) = next {
            self.read_cursor = index;
        } else if let Some((last, _)) = self.cache.last() {
            self.read_cursor = last + 1;
        }
    }

    /// Forget instance records that hold no samples and are no longer alive.
    fn prune_instance(&mut self, instance: &InstanceHandle) {
        if self.cache.instance_len(instance) > 0 {
            return;
        }
        if self
            .instances
            .get(instance)
            .is_some_and(|rec| !rec.state.is_alive())
        {
            self.instances.remove(instance);
        }
    }
}
