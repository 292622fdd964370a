// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! StatefulReader - reader-side delivery engine (RTPS Sec.8.4.10)
//!
//! Owns the [`ReaderHistory`] and one [`WriterProxy`] per matched writer under a
//! single endpoint mutex. Changes from one writer enter the history strictly in
//! sequence-number order; out-of-order arrivals wait in the proxy.
//!
//! ```text
//!   DATA ----> WriterProxy ---- in order ----> ReaderHistory ---> read / take
//!                  |  ^
//!   HEARTBEAT -----+  +------ GAP (irrelevant)
//!                  |
//!                  +--> ACKNACK (after heartbeat_response_delay)
//! ```
//!
//! Remote writer liveliness is tracked by a private [`LivelinessManager`]; never
//! call it with the state lock held, its callback takes that lock.

mod proxy;

pub use proxy::{ProxyUpdate, RemoteWriterAttributes, WriterProxy};

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::cache_change::{CacheChange, ChangeKind, SequenceNumber};
use crate::core::deadline::DeadlineTracker;
use crate::core::guid::{GuidPrefix, InstanceHandle, GUID};
use crate::core::history::{InstanceState, ReaderHistory, SampleInfo};
use crate::core::liveliness::{LivelinessEvent, LivelinessManager, LivelinessStatus};
use crate::core::outbound::{self, MessageBuilder, Outgoing};
use crate::core::time::{is_infinite, Timestamp};
use crate::core::timer::{EventAction, TimedEvent, TimedEventScheduler};
use crate::dds::listener::{
    DeadlineMissedStatus, IncompatibleQosStatus, LivelinessChangedStatus, SampleLostStatus,
    SampleRejectedStatus, SubscriptionMatchedStatus,
};
use crate::protocol::{Data, Gap, Heartbeat, Submessage};
use crate::qos::{LivelinessKind, QoS, QosPolicyId};
use crate::transport::Transport;

/// Receives reader status changes. Returning true means a listener consumed the
/// event, which resets the `*_change` fields of that status.
pub trait ReaderStatusSink: Send + Sync {
    fn data_available(&self, _reader: GUID) {}
    fn subscription_matched(&self, _reader: GUID, _status: &SubscriptionMatchedStatus) -> bool {
        false
    }
    fn requested_incompatible_qos(&self, _reader: GUID, _status: &IncompatibleQosStatus) -> bool {
        false
    }
    fn sample_rejected(&self, _reader: GUID, _status: &SampleRejectedStatus) -> bool {
        false
    }
    fn sample_lost(&self, _reader: GUID, _status: &SampleLostStatus) -> bool {
        false
    }
    fn requested_deadline_missed(&self, _reader: GUID, _status: &DeadlineMissedStatus) -> bool {
        false
    }
    fn liveliness_changed(&self, _reader: GUID, _status: &LivelinessChangedStatus) -> bool {
        false
    }
}

impl ReaderStatusSink for () {}

/// Maps a serialized payload to its instance when DATA carries no KEY_HASH.
pub type KeyResolver = Arc<dyn Fn(&[u8]) -> Option<InstanceHandle> + Send + Sync>;

#[derive(Debug, Default)]
struct ReaderStatuses {
    subscription_matched: SubscriptionMatchedStatus,
    requested_incompatible_qos: IncompatibleQosStatus,
    requested_deadline_missed: DeadlineMissedStatus,
    sample_lost: SampleLostStatus,
    liveliness_changed: LivelinessChangedStatus,
}

struct ReaderState {
    history: ReaderHistory,
    proxies: BTreeMap<GUID, WriterProxy>,
    deadline: DeadlineTracker,
    status: ReaderStatuses,
    closed: bool,
}

/// What one incoming submessage changed, reported once the lock is released.
#[derive(Default)]
struct Effects {
    delivered: usize,
    lost: u32,
    rejected: bool,
    outgoing: Vec<Outgoing>,
    schedule_acknack: bool,
}

pub struct StatefulReader {
    guid: GUID,
    qos: QoS,
    keyed: bool,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ReaderStatusSink>,
    key_resolver: Option<KeyResolver>,
    state: Mutex<ReaderState>,
    liveliness: LivelinessManager,
    acknack_timer: TimedEvent,
    deadline_timer: TimedEvent,
    lifespan_timer: TimedEvent,
}

fn engine_timer(
    scheduler: &TimedEventScheduler,
    interval: Duration,
    weak: &Weak<StatefulReader>,
    on_fire: fn(&StatefulReader) -> EventAction,
) -> TimedEvent {
    let weak = weak.clone();
    scheduler.create_event(interval, move || match weak.upgrade() {
        Some(reader) => on_fire(&reader),
        None => EventAction::Stop,
    })
}

/// Store one in-order change. False when the history refused it.
fn store(
    history: &mut ReaderHistory,
    change: CacheChange,
    delivered: &mut Vec<(InstanceHandle, ChangeKind)>,
) -> bool {
    let entry = (change.instance_handle, change.kind);
    match history.received_change(change, 0) {
        Ok(true) => {
            delivered.push(entry);
            true
        }
        Ok(false) => true,
        Err(_) => false,
    }
}

/// Move every change that is now in order from the proxy to the history.
fn drain_ready(
    history: &mut ReaderHistory,
    proxy: &mut WriterProxy,
    delivered: &mut Vec<(InstanceHandle, ChangeKind)>,
) {
    while let Some(change) = proxy.pop_ready() {
        let seq = change.sequence_number;
        if !store(history, change, delivered) {
            // requested again through the next ACKNACK
            proxy.unreceive(seq);
            break;
        }
    }
}

impl StatefulReader {
    pub fn new(
        guid: GUID,
        qos: QoS,
        scheduler: &TimedEventScheduler,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ReaderStatusSink>,
        key_resolver: Option<KeyResolver>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let on_liveliness = weak.clone();
            Self {
                guid,
                keyed: guid.entity_id.is_keyed(),
                transport,
                sink,
                key_resolver,
                state: Mutex::new(ReaderState {
                    history: ReaderHistory::new(qos.history, qos.resource_limits),
                    proxies: BTreeMap::new(),
                    deadline: DeadlineTracker::new(qos.deadline.period),
                    status: ReaderStatuses::default(),
                    closed: false,
                }),
                liveliness: LivelinessManager::new(scheduler, move |event| {
                    if let Some(reader) = on_liveliness.upgrade() {
                        reader.on_liveliness_event(event);
                    }
                }),
                acknack_timer: engine_timer(
                    scheduler,
                    qos.times.heartbeat_response_delay,
                    weak,
                    Self::on_acknack_timer,
                ),
                deadline_timer: engine_timer(scheduler, qos.deadline.period, weak, Self::on_deadline_timer),
                lifespan_timer: engine_timer(scheduler, qos.lifespan.duration, weak, Self::on_lifespan_timer),
                qos,
            }
        })
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn qos(&self) -> &QoS {
        &self.qos
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// DATA from `writer`, with the INFO_TS timestamp that preceded it.
    pub fn on_data(&self, writer: GUID, data: &Data, timestamp: Option<Timestamp>) {
        let kind = data
            .inline_qos
            .status_info
            .map_or(ChangeKind::Alive, ChangeKind::from_status_info);
        let payload: Arc<[u8]> = match &data.serialized_payload {
            Some(bytes) => Arc::from(bytes.as_slice()),
            None => Arc::from(Vec::new()),
        };
        let instance = self.resolve_instance(data, &payload);
        let seq = data.writer_sn;
        let change = CacheChange::new(kind, writer, seq, instance, payload)
            .with_timestamp(outbound::timestamp_or_now(timestamp));

        let now = Instant::now();
        let mut effects = Effects::default();
        let (rejected_status, lost_status, next_deadline) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(proxy) = state.proxies.get_mut(&writer) else {
                log::trace!("[reader] {} DATA from unmatched {}", self.guid, writer);
                return;
            };
            let rejected_before = state.history.sample_rejected_status().total_count;
            let mut delivered = Vec::new();

            if proxy.is_reliable() {
                if proxy.is_duplicate(seq) {
                    log::trace!("[reader] {} duplicate {}:{}", self.guid, writer, seq);
                    drop(guard);
                    self.liveliness.assert_liveliness(&writer);
                    return;
                }
                let ahead = proxy.missing_below(seq);
                let admitted = ahead == 0 || state.history.check_admission(&change, ahead).is_ok();
                if admitted {
                    proxy.buffer(change);
                    drain_ready(&mut state.history, proxy, &mut delivered);
                }
            } else {
                match proxy.accept_best_effort(seq) {
                    Some(skipped) => {
                        effects.lost += skipped;
                        store(&mut state.history, change, &mut delivered);
                    }
                    None => {
                        log::trace!("[reader] {} stale best-effort {}:{}", self.guid, writer, seq);
                    }
                }
            }

            for (instance, kind) in &delivered {
                if kind.is_alive() {
                    state.deadline.touch(*instance, now);
                } else {
                    state.deadline.remove(instance);
                }
            }
            effects.delivered = delivered.len();
            self.finish_effects(state, &mut effects, rejected_before)
        };

        if effects.delivered > 0 {
            log::trace!(
                "[reader] {} delivered {} change(s) from {}",
                self.guid,
                effects.delivered,
                writer
            );
        }
        self.liveliness.assert_liveliness(&writer);
        self.arm_timers(next_deadline, effects.delivered > 0);
        self.report(effects, rejected_status, lost_status);
    }

    /// HEARTBEAT from `writer`.
    pub fn on_heartbeat(&self, writer: GUID, hb: &Heartbeat) {
        let now = Instant::now();
        let mut effects = Effects::default();
        let assert_writer;
        let (rejected_status, lost_status, next_deadline) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(proxy) = state.proxies.get_mut(&writer) else {
                log::trace!("[reader] {} HEARTBEAT from unmatched {}", self.guid, writer);
                return;
            };
            assert_writer =
                hb.liveliness_flag || proxy.attributes().liveliness.kind == LivelinessKind::Automatic;
            if !proxy.is_reliable() {
                drop(guard);
                if assert_writer {
                    self.liveliness.assert_liveliness(&writer);
                }
                return;
            }
            let rejected_before = state.history.sample_rejected_status().total_count;
            let mut delivered = Vec::new();

            if let Some(update) = proxy.on_heartbeat(hb) {
                effects.lost = update.lost;
                for change in update.released {
                    store(&mut state.history, change, &mut delivered);
                }
                drain_ready(&mut state.history, proxy, &mut delivered);

                let needs_ack = !hb.final_flag || proxy.has_missing();
                if needs_ack
                    && proxy.request_ack(self.qos.times.heartbeat_supression_duration, now)
                {
                    if self.qos.times.heartbeat_response_delay.is_zero() {
                        effects.outgoing.extend(self.acknack_for(proxy, now));
                    } else {
                        effects.schedule_acknack = true;
                    }
                }
                log::trace!(
                    "[reader] {} HEARTBEAT {}..{} from {} floor={}",
                    self.guid,
                    hb.first_sn,
                    hb.last_sn,
                    writer,
                    proxy.floor()
                );
            }

            for (instance, kind) in &delivered {
                if kind.is_alive() {
                    state.deadline.touch(*instance, now);
                } else {
                    state.deadline.remove(instance);
                }
            }
            effects.delivered = delivered.len();
            self.finish_effects(state, &mut effects, rejected_before)
        };

        if assert_writer {
            self.liveliness.assert_liveliness(&writer);
        }
        self.arm_timers(next_deadline, effects.delivered > 0);
        self.report(effects, rejected_status, lost_status);
    }

    /// GAP from `writer`: the listed sequence numbers will never arrive.
    pub fn on_gap(&self, writer: GUID, gap: &Gap) {
        let now = Instant::now();
        let mut effects = Effects::default();
        let (rejected_status, lost_status, next_deadline) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(proxy) = state.proxies.get_mut(&writer) else {
                return;
            };
            if !proxy.is_reliable() {
                return;
            }
            let rejected_before = state.history.sample_rejected_status().total_count;
            let mut delivered = Vec::new();
            let update = proxy.on_gap(gap);
            effects.lost = update.lost;
            for change in update.released {
                store(&mut state.history, change, &mut delivered);
            }
            drain_ready(&mut state.history, proxy, &mut delivered);
            log::trace!(
                "[reader] {} GAP from {} start={} floor={}",
                self.guid,
                writer,
                gap.gap_start,
                proxy.floor()
            );

            for (instance, kind) in &delivered {
                if kind.is_alive() {
                    state.deadline.touch(*instance, now);
                } else {
                    state.deadline.remove(instance);
                }
            }
            effects.delivered = delivered.len();
            self.finish_effects(state, &mut effects, rejected_before)
        };
        self.arm_timers(next_deadline, effects.delivered > 0);
        self.report(effects, rejected_status, lost_status);
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Start accepting data from a remote writer. Returns false if it is already matched.
    pub fn matched_writer_add(&self, mut attributes: RemoteWriterAttributes) -> bool {
        let guid = attributes.guid;
        attributes.reliable &= self.qos.is_reliable();
        let reliable = attributes.reliable;
        let liveliness = attributes.liveliness;

        let (matched, alive) = {
            let mut state = self.state.lock();
            if state.closed || state.proxies.contains_key(&guid) {
                return false;
            }
            state.proxies.insert(guid, WriterProxy::new(attributes));

            let st = &mut state.status.subscription_matched;
            st.total_count += 1;
            st.total_count_change += 1;
            st.current_count += 1;
            st.current_count_change += 1;
            st.last_publication_handle = Some(guid);
            let matched = st.clone();

            let lv = &mut state.status.liveliness_changed;
            lv.alive_count += 1;
            lv.alive_count_change += 1;
            lv.last_publication_handle = Some(guid);
            (matched, lv.clone())
        };

        if !is_infinite(liveliness.lease_duration) {
            self.liveliness
                .add_writer(guid, liveliness.kind, liveliness.lease_duration);
        }
        log::info!(
            "[reader] {} matched writer {} ({})",
            self.guid,
            guid,
            if reliable { "reliable" } else { "best-effort" }
        );
        if self.sink.subscription_matched(self.guid, &matched) {
            Self::reset_matched(&mut self.state.lock().status.subscription_matched);
        }
        if self.sink.liveliness_changed(self.guid, &alive) {
            Self::reset_liveliness(&mut self.state.lock().status.liveliness_changed);
        }
        true
    }

    /// Forget a remote writer. Instances it alone was writing become
    /// NOT_ALIVE_NO_WRITERS. Returns false if it was not matched.
    pub fn matched_writer_remove(&self, writer: &GUID) -> bool {
        let tracked = self.liveliness.remove_writer(writer);
        let (matched, alive) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.proxies.remove(writer).is_none() {
                return false;
            }
            let orphaned = state.history.writer_removed(writer);
            if !orphaned.is_empty() {
                log::debug!(
                    "[reader] {} {} instance(s) lost their last writer",
                    self.guid,
                    orphaned.len()
                );
            }

            let st = &mut state.status.subscription_matched;
            st.current_count = st.current_count.saturating_sub(1);
            st.current_count_change -= 1;
            st.last_publication_handle = Some(*writer);
            let matched = st.clone();

            let lv = &mut state.status.liveliness_changed;
            if tracked.is_some_and(|d| d.status == LivelinessStatus::NotAsserted) {
                lv.not_alive_count = lv.not_alive_count.saturating_sub(1);
                lv.not_alive_count_change -= 1;
            } else {
                lv.alive_count = lv.alive_count.saturating_sub(1);
                lv.alive_count_change -= 1;
            }
            lv.last_publication_handle = Some(*writer);
            (matched, lv.clone())
        };

        log::info!("[reader] {} unmatched writer {}", self.guid, writer);
        if self.sink.subscription_matched(self.guid, &matched) {
            Self::reset_matched(&mut self.state.lock().status.subscription_matched);
        }
        if self.sink.liveliness_changed(self.guid, &alive) {
            Self::reset_liveliness(&mut self.state.lock().status.liveliness_changed);
        }
        true
    }

    /// A discovered writer on this topic failed the QoS check.
    pub fn record_incompatible_qos(&self, policy: QosPolicyId) {
        let status = {
            let mut state = self.state.lock();
            state.status.requested_incompatible_qos.record(policy);
            state.status.requested_incompatible_qos.clone()
        };
        if self.sink.requested_incompatible_qos(self.guid, &status) {
            self.state.lock().status.requested_incompatible_qos.total_count_change = 0;
        }
    }

    /// The remote participant announced itself: its AUTOMATIC writers are alive.
    pub fn assert_remote_participant(&self, prefix: GuidPrefix) {
        self.liveliness
            .assert_liveliness_kind(LivelinessKind::Automatic, Some(prefix));
    }

    /// Detach the engine from its entity: drop every writer proxy and stop the
    /// timers. Incoming traffic is ignored afterwards. Idempotent.
    pub fn close(&self) {
        let writers: Vec<GUID> = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.deadline = DeadlineTracker::new(self.qos.deadline.period);
            std::mem::take(&mut state.proxies).into_keys().collect()
        };
        for writer in &writers {
            self.liveliness.remove_writer(writer);
        }
        self.acknack_timer.recreate_timer();
        self.deadline_timer.recreate_timer();
        self.lifespan_timer.recreate_timer();
        log::debug!("[reader] {} closed ({} writer(s) dropped)", self.guid, writers.len());
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn matched_writers(&self) -> Vec<GUID> {
        self.state.lock().proxies.keys().copied().collect()
    }

    /// Highest sequence number from `writer` below which nothing is outstanding.
    pub fn writer_floor(&self, writer: &GUID) -> Option<SequenceNumber> {
        self.state.lock().proxies.get(writer).map(WriterProxy::floor)
    }

    pub fn writer_liveliness(&self, writer: &GUID) -> Option<LivelinessStatus> {
        self.liveliness.status(writer)
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn read(&self, max: usize) -> Vec<(CacheChange, SampleInfo)> {
        self.state.lock().history.read(max)
    }

    pub fn take(&self, max: usize) -> Vec<(CacheChange, SampleInfo)> {
        self.state.lock().history.take(max)
    }

    pub fn read_next(&self) -> Option<(CacheChange, SampleInfo)> {
        self.state.lock().history.get_next_unread()
    }

    pub fn take_next(&self) -> Option<(CacheChange, SampleInfo)> {
        self.state.lock().history.take_next_unread()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn instance_state(&self, instance: &InstanceHandle) -> Option<InstanceState> {
        self.state.lock().history.instance_state(instance)
    }

    // ========================================================================
    // Status getters (reading resets the `*_change` fields)
    // ========================================================================

    pub fn subscription_matched_status(&self) -> SubscriptionMatchedStatus {
        let mut state = self.state.lock();
        let status = state.status.subscription_matched.clone();
        Self::reset_matched(&mut state.status.subscription_matched);
        status
    }

    pub fn requested_incompatible_qos_status(&self) -> IncompatibleQosStatus {
        let mut state = self.state.lock();
        let status = state.status.requested_incompatible_qos.clone();
        state.status.requested_incompatible_qos.total_count_change = 0;
        status
    }

    pub fn requested_deadline_missed_status(&self) -> DeadlineMissedStatus {
        let mut state = self.state.lock();
        let status = state.status.requested_deadline_missed;
        state.status.requested_deadline_missed.total_count_change = 0;
        status
    }

    pub fn sample_lost_status(&self) -> SampleLostStatus {
        let mut state = self.state.lock();
        let status = state.status.sample_lost.clone();
        state.status.sample_lost.total_count_change = 0;
        status
    }

    pub fn sample_rejected_status(&self) -> SampleRejectedStatus {
        self.state.lock().history.take_sample_rejected_status()
    }

    pub fn liveliness_changed_status(&self) -> LivelinessChangedStatus {
        let mut state = self.state.lock();
        let status = state.status.liveliness_changed.clone();
        Self::reset_liveliness(&mut state.status.liveliness_changed);
        status
    }

    fn reset_matched(status: &mut SubscriptionMatchedStatus) {
        status.total_count_change = 0;
        status.current_count_change = 0;
    }

    fn reset_liveliness(status: &mut LivelinessChangedStatus) {
        status.alive_count_change = 0;
        status.not_alive_count_change = 0;
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn resolve_instance(&self, data: &Data, payload: &[u8]) -> InstanceHandle {
        if !self.keyed {
            return InstanceHandle::NIL;
        }
        if let Some(handle) = data.inline_qos.key_hash {
            return handle;
        }
        if data.key_only {
            return InstanceHandle::NIL;
        }
        self.key_resolver
            .as_ref()
            .and_then(|resolve| resolve(payload))
            .unwrap_or(InstanceHandle::NIL)
    }

    fn acknack_for(&self, proxy: &mut WriterProxy, now: Instant) -> Option<Outgoing> {
        let acknack = proxy.make_acknack(self.guid.entity_id, now);
        log::trace!(
            "[reader] {} ACKNACK to {} base={} missing={}",
            self.guid,
            proxy.guid(),
            acknack.reader_sn_state.base(),
            acknack.reader_sn_state.iter().count()
        );
        let mut msg = MessageBuilder::new(self.guid.prefix, Some(proxy.guid().prefix));
        msg.push(Submessage::AckNack(acknack));
        msg.finish(proxy.destinations())
    }

    /// Fold lost samples into the status; snapshot what the listeners need.
    fn finish_effects(
        &self,
        state: &mut ReaderState,
        effects: &mut Effects,
        rejected_before: u32,
    ) -> (SampleRejectedStatus, SampleLostStatus, Option<Instant>) {
        if effects.lost > 0 {
            state.status.sample_lost.total_count += effects.lost;
            state.status.sample_lost.total_count_change +=
                i32::try_from(effects.lost).unwrap_or(i32::MAX);
        }
        let rejected = state.history.sample_rejected_status();
        effects.rejected = rejected.total_count > rejected_before;
        (
            rejected,
            state.status.sample_lost.clone(),
            state.deadline.next_due(),
        )
    }

    fn arm_timers(&self, next_deadline: Option<Instant>, delivered: bool) {
        if let Some(due) = next_deadline {
            if !self.deadline_timer.is_armed() {
                self.deadline_timer
                    .restart_timer_after(due.saturating_duration_since(Instant::now()));
            }
        }
        if delivered && !self.qos.lifespan.is_infinite() && !self.lifespan_timer.is_armed() {
            self.lifespan_timer.restart_timer_after(self.qos.lifespan.duration);
        }
    }

    /// Send queued messages and notify the sink; the lock is not held.
    fn report(&self, effects: Effects, rejected: SampleRejectedStatus, lost: SampleLostStatus) {
        if effects.schedule_acknack && !self.acknack_timer.is_armed() {
            self.acknack_timer.restart_timer();
        }
        if effects.lost > 0 {
            log::debug!("[reader] {} lost {} sample(s)", self.guid, effects.lost);
            if self.sink.sample_lost(self.guid, &lost) {
                self.state.lock().status.sample_lost.total_count_change = 0;
            }
        }
        if effects.rejected && self.sink.sample_rejected(self.guid, &rejected) {
            self.state.lock().history.take_sample_rejected_status();
        }
        if effects.delivered > 0 {
            self.sink.data_available(self.guid);
        }
        self.send(effects.outgoing);
    }

    fn send(&self, outgoing: Vec<Outgoing>) {
        if outgoing.is_empty() {
            return;
        }
        let failures = outbound::flush(self.transport.as_ref(), outgoing);
        if failures > 0 {
            log::warn!("[reader] {} {} send(s) failed", self.guid, failures);
        }
    }

    fn on_liveliness_event(&self, event: &LivelinessEvent) {
        let status = {
            let mut state = self.state.lock();
            if !state.proxies.contains_key(&event.guid) {
                return;
            }
            let lv = &mut state.status.liveliness_changed;
            lv.alive_count = lv.alive_count.saturating_add_signed(event.alive_change);
            lv.alive_count_change += event.alive_change;
            lv.not_alive_count = lv.not_alive_count.saturating_add_signed(event.not_alive_change);
            lv.not_alive_count_change += event.not_alive_change;
            lv.last_publication_handle = Some(event.guid);
            lv.clone()
        };
        log::debug!(
            "[reader] {} writer {} {}",
            self.guid,
            event.guid,
            if event.is_lost() { "not alive" } else { "alive again" }
        );
        if self.sink.liveliness_changed(self.guid, &status) {
            Self::reset_liveliness(&mut self.state.lock().status.liveliness_changed);
        }
    }

    // ========================================================================
    // Timer callbacks
    // ========================================================================

    fn on_acknack_timer(&self) -> EventAction {
        let now = Instant::now();
        let outgoing: Vec<Outgoing> = {
            let mut state = self.state.lock();
            let mut out = Vec::new();
            for proxy in state.proxies.values_mut().filter(|p| p.must_ack()) {
                out.extend(self.acknack_for(proxy, now));
            }
            out
        };
        self.send(outgoing);
        EventAction::Stop
    }

    fn on_deadline_timer(&self) -> EventAction {
        let now = Instant::now();
        let (missed, status, next) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed {
                return EventAction::Stop;
            }
            let missed = state.deadline.check(now);
            let st = &mut state.status.requested_deadline_missed;
            for instance in &missed {
                st.total_count += 1;
                st.total_count_change += 1;
                st.last_instance_handle = *instance;
            }
            (missed.len(), *st, state.deadline.next_due())
        };
        if missed > 0 {
            log::debug!("[reader] {} missed {} requested deadline(s)", self.guid, missed);
            if self.sink.requested_deadline_missed(self.guid, &status) {
                self.state.lock().status.requested_deadline_missed.total_count_change = 0;
            }
        }
        match next {
            Some(due) => EventAction::RestartAfter(due.saturating_duration_since(now)),
            None => EventAction::Stop,
        }
    }

    fn on_lifespan_timer(&self) -> EventAction {
        let lifespan = self.qos.lifespan;
        if lifespan.is_infinite() {
            return EventAction::Stop;
        }
        let now = Timestamp::now();
        let oldest = {
            let mut state = self.state.lock();
            if state.closed {
                return EventAction::Stop;
            }
            let expired = state.history.remove_expired(&lifespan, now);
            if expired > 0 {
                log::debug!("[reader] {} dropped {} expired sample(s)", self.guid, expired);
            }
            state.history.oldest_timestamp()
        };
        match oldest {
            Some(ts) => EventAction::RestartAfter(
                lifespan.expiry_of(ts).saturating_since(now) + Duration::from_millis(1),
            ),
            None => EventAction::Stop,
        }
    }
}

impl Drop for StatefulReader {
    fn drop(&mut self) {
        self.acknack_timer.recreate_timer();
        self.deadline_timer.recreate_timer();
        self.lifespan_timer.recreate_timer();
    }
}

#[cfg(test)]
mod tests;
