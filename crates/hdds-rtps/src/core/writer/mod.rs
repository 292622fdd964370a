// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! StatefulWriter - writer-side delivery engine (RTPS Sec.8.4.9)
//!
//! Owns the [`WriterHistory`] and one [`ReaderProxy`] per matched reader, all under
//! a single endpoint mutex. Four timed events drive it:
//!
//! | Event | Fires | Does |
//! |-------|-------|------|
//! | heartbeat | every `heartbeat_period` while a reliable reader lags | HEARTBEAT to lagging readers |
//! | nack response | `nack_response_delay` after an ACKNACK with requests | DATA / GAP repairs, unicast |
//! | deadline | next instance deadline | OFFERED_DEADLINE_MISSED |
//! | lifespan | oldest change expiry | drop expired changes |
//!
//! Messages are built under the lock and sent after it is released; status sinks
//! are called without the lock held.

mod proxy;

pub use proxy::{AckNackOutcome, ReaderProxy, RemoteReaderAttributes};

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::cache_change::{ChangeKind, SequenceNumber};
use crate::core::deadline::DeadlineTracker;
use crate::core::guid::{InstanceHandle, GUID};
use crate::core::history::WriterHistory;
use crate::core::outbound::{self, gap_submessages, MessageBuilder, Outgoing};
use crate::core::time::{is_infinite, Timestamp};
use crate::core::timer::{EventAction, TimedEvent, TimedEventScheduler};
use crate::dds::listener::{
    DeadlineMissedStatus, IncompatibleQosStatus, LivelinessLostStatus, PublicationMatchedStatus,
};
use crate::dds::{Error, Result};
use crate::protocol::{Heartbeat, Submessage};
use crate::qos::{Durability, History, QoS, QosPolicyId};
use crate::transport::Transport;

/// Receives writer status changes. Returning true means a listener consumed the
/// event, which resets the `*_change` fields of that status.
pub trait WriterStatusSink: Send + Sync {
    fn publication_matched(&self, _writer: GUID, _status: &PublicationMatchedStatus) -> bool {
        false
    }
    fn offered_incompatible_qos(&self, _writer: GUID, _status: &IncompatibleQosStatus) -> bool {
        false
    }
    fn offered_deadline_missed(&self, _writer: GUID, _status: &DeadlineMissedStatus) -> bool {
        false
    }
    fn liveliness_lost(&self, _writer: GUID, _status: &LivelinessLostStatus) -> bool {
        false
    }
}

impl WriterStatusSink for () {}

#[derive(Debug, Default)]
struct WriterStatuses {
    publication_matched: PublicationMatchedStatus,
    offered_incompatible_qos: IncompatibleQosStatus,
    offered_deadline_missed: DeadlineMissedStatus,
    liveliness_lost: LivelinessLostStatus,
}

struct WriterState {
    history: WriterHistory,
    proxies: BTreeMap<GUID, ReaderProxy>,
    heartbeat_count: u32,
    deadline: DeadlineTracker,
    status: WriterStatuses,
    closed: bool,
}

pub struct StatefulWriter {
    guid: GUID,
    qos: QoS,
    keyed: bool,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn WriterStatusSink>,
    state: Mutex<WriterState>,
    /// Signalled whenever acknowledgments advance or history space frees up.
    acked: Condvar,
    heartbeat: TimedEvent,
    nack_response: TimedEvent,
    deadline_timer: TimedEvent,
    lifespan_timer: TimedEvent,
}

fn engine_timer(
    scheduler: &TimedEventScheduler,
    interval: Duration,
    weak: &Weak<StatefulWriter>,
    on_fire: fn(&StatefulWriter) -> EventAction,
) -> TimedEvent {
    let weak = weak.clone();
    scheduler.create_event(interval, move || match weak.upgrade() {
        Some(writer) => on_fire(&writer),
        None => EventAction::Stop,
    })
}

impl StatefulWriter {
    pub fn new(
        guid: GUID,
        qos: QoS,
        scheduler: &TimedEventScheduler,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn WriterStatusSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let times = qos.times;
            Self {
                guid,
                keyed: guid.entity_id.is_keyed(),
                transport,
                sink,
                state: Mutex::new(WriterState {
                    history: WriterHistory::new(guid, qos.history, qos.resource_limits),
                    proxies: BTreeMap::new(),
                    heartbeat_count: 0,
                    deadline: DeadlineTracker::new(qos.deadline.period),
                    status: WriterStatuses::default(),
                    closed: false,
                }),
                acked: Condvar::new(),
                heartbeat: engine_timer(scheduler, times.heartbeat_period, weak, Self::on_heartbeat_timer),
                nack_response: engine_timer(
                    scheduler,
                    times.nack_response_delay,
                    weak,
                    Self::on_nack_response_timer,
                ),
                deadline_timer: engine_timer(scheduler, qos.deadline.period, weak, Self::on_deadline_timer),
                lifespan_timer: engine_timer(
                    scheduler,
                    qos.lifespan.duration,
                    weak,
                    Self::on_lifespan_timer,
                ),
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
    // Writing
    // ========================================================================

    /// Add a change to the history and push it to every matched reader.
    ///
    /// When the history is full the call waits up to `max_blocking_time` for
    /// acknowledgments to free a slot, then fails with [`Error::Timeout`]
    /// (or [`Error::ResourceLimitExceeded`] when `max_blocking_time` is zero).
    /// Fails with [`Error::AlreadyDeleted`] once the engine is closed.
    pub fn write_change(
        &self,
        kind: ChangeKind,
        instance: InstanceHandle,
        payload: Arc<[u8]>,
        timestamp: Timestamp,
    ) -> Result<SequenceNumber> {
        let blocking = self.qos.max_blocking_time;
        let give_up = Instant::now().checked_add(blocking);
        let now = Instant::now();

        let (seq, outgoing, arm_heartbeat, next_deadline) = {
            let mut guard = self.state.lock();
            loop {
                if guard.closed {
                    return Err(Error::AlreadyDeleted);
                }
                if self.make_room(&mut guard, &instance) || blocking.is_zero() {
                    break;
                }
                match give_up {
                    Some(at) => {
                        if self.acked.wait_until(&mut guard, at).timed_out() {
                            if guard.closed {
                                return Err(Error::AlreadyDeleted);
                            }
                            self.make_room(&mut guard, &instance);
                            break;
                        }
                    }
                    None => self.acked.wait(&mut guard),
                }
            }

            let state = &mut *guard;
            let seq = match state.history.add_change(kind, instance, payload, timestamp) {
                Ok(seq) => seq,
                Err(reason) => {
                    log::debug!("[writer] {} write rejected: {:?}", self.guid, reason);
                    return Err(if blocking.is_zero() {
                        Error::ResourceLimitExceeded(format!("{:?}", reason))
                    } else {
                        Error::Timeout
                    });
                }
            };

            if kind.is_alive() {
                state.deadline.touch(instance, now);
            } else {
                state.deadline.remove(&instance);
            }

            let outgoing = self.collect_unsent(state, None);
            self.remove_acked(state);
            let last_sn = state.history.last_sn();
            let arm_heartbeat = state.proxies.values().any(|p| p.has_unacked(last_sn));
            (seq, outgoing, arm_heartbeat, state.deadline.next_due())
        };

        log::trace!("[writer] {} wrote seq={} ({:?})", self.guid, seq, kind);
        self.send(outgoing);
        if arm_heartbeat && !self.heartbeat.is_armed() {
            self.heartbeat.restart_timer();
        }
        if let Some(due) = next_deadline {
            if !self.deadline_timer.is_armed() {
                self.deadline_timer
                    .restart_timer_after(due.saturating_duration_since(Instant::now()));
            }
        }
        if !self.qos.lifespan.is_infinite() && !self.lifespan_timer.is_armed() {
            self.lifespan_timer.restart_timer_after(self.qos.lifespan.duration);
        }
        Ok(seq)
    }

    /// Block until every matched reliable reader acknowledged everything written so far.
    pub fn wait_for_acknowledgments(&self, timeout: Duration) -> Result<()> {
        let give_up = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        let target = state.history.last_sn();
        loop {
            if state.closed {
                return Err(Error::AlreadyDeleted);
            }
            let done = state
                .proxies
                .values()
                .filter(|p| p.is_reliable())
                .all(|p| p.highest_acked() >= target);
            if done {
                return Ok(());
            }
            match give_up {
                Some(at) => {
                    if self.acked.wait_until(&mut state, at).timed_out() {
                        let done = state
                            .proxies
                            .values()
                            .filter(|p| p.is_reliable())
                            .all(|p| p.highest_acked() >= target);
                        return if done { Ok(()) } else { Err(Error::Timeout) };
                    }
                }
                None => self.acked.wait(&mut state),
            }
        }
    }

    /// HEARTBEAT with the liveliness flag to every matched reader.
    pub fn assert_liveliness(&self) {
        let outgoing = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut out = Vec::new();
            for proxy in state.proxies.values() {
                state.heartbeat_count += 1;
                let hb = self.heartbeat_for(proxy, &state.history, state.heartbeat_count, true, true);
                let mut msg = MessageBuilder::new(self.guid.prefix, Some(proxy.guid().prefix));
                msg.push(Submessage::Heartbeat(hb));
                out.extend(msg.finish(proxy.destinations()));
            }
            out
        };
        self.send(outgoing);
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Start delivering to a remote reader. Returns false if it is already matched.
    pub fn matched_reader_add(&self, mut attributes: RemoteReaderAttributes) -> bool {
        let guid = attributes.guid;
        attributes.reliable &= self.qos.is_reliable();
        let reliable = attributes.reliable;

        let (outgoing, status) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed || state.proxies.contains_key(&guid) {
                return false;
            }
            let replay = self.qos.durability >= Durability::TransientLocal
                && attributes.durability >= Durability::TransientLocal;
            let start_after = if replay {
                state.history.first_sn() - 1
            } else {
                state.history.last_sn()
            };
            state
                .proxies
                .insert(guid, ReaderProxy::new(attributes, start_after));

            let st = &mut state.status.publication_matched;
            st.total_count += 1;
            st.total_count_change += 1;
            st.current_count += 1;
            st.current_count_change += 1;
            st.last_subscription_handle = Some(guid);
            let status = st.clone();

            (self.collect_unsent(state, Some(guid)), status)
        };

        log::info!(
            "[writer] {} matched reader {} ({})",
            self.guid,
            guid,
            if reliable { "reliable" } else { "best-effort" }
        );
        self.send(outgoing);
        if reliable && !self.heartbeat.is_armed() {
            self.heartbeat.restart_timer();
        }
        if self.sink.publication_matched(self.guid, &status) {
            Self::reset_matched(&mut self.state.lock().status.publication_matched);
        }
        true
    }

    /// Stop delivering to a remote reader. Returns false if it was not matched.
    pub fn matched_reader_remove(&self, reader: &GUID) -> bool {
        let status = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.proxies.remove(reader).is_none() {
                return false;
            }
            self.remove_acked(state);
            self.acked.notify_all();

            let st = &mut state.status.publication_matched;
            st.current_count = st.current_count.saturating_sub(1);
            st.current_count_change -= 1;
            st.last_subscription_handle = Some(*reader);
            st.clone()
        };
        log::info!("[writer] {} unmatched reader {}", self.guid, reader);
        if self.sink.publication_matched(self.guid, &status) {
            Self::reset_matched(&mut self.state.lock().status.publication_matched);
        }
        true
    }

    /// A discovered reader on this topic failed the QoS check.
    pub fn record_incompatible_qos(&self, policy: QosPolicyId) {
        let status = {
            let mut state = self.state.lock();
            state.status.offered_incompatible_qos.record(policy);
            state.status.offered_incompatible_qos.clone()
        };
        if self.sink.offered_incompatible_qos(self.guid, &status) {
            self.state.lock().status.offered_incompatible_qos.total_count_change = 0;
        }
    }

    /// The participant's liveliness manager saw this writer miss its lease.
    pub fn on_liveliness_lost(&self) {
        let status = {
            let mut state = self.state.lock();
            state.status.liveliness_lost.total_count += 1;
            state.status.liveliness_lost.total_count_change += 1;
            state.status.liveliness_lost.clone()
        };
        log::debug!("[writer] {} liveliness lost", self.guid);
        if self.sink.liveliness_lost(self.guid, &status) {
            self.state.lock().status.liveliness_lost.total_count_change = 0;
        }
    }

    /// Detach the engine from its entity: drop every reader proxy, wake blocked
    /// writers and stop the timers. Later writes fail with
    /// [`Error::AlreadyDeleted`]. Idempotent.
    pub fn close(&self) {
        let dropped = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.deadline = DeadlineTracker::new(self.qos.deadline.period);
            std::mem::take(&mut state.proxies).len()
        };
        self.acked.notify_all();
        self.heartbeat.recreate_timer();
        self.nack_response.recreate_timer();
        self.deadline_timer.recreate_timer();
        self.lifespan_timer.recreate_timer();
        log::debug!("[writer] {} closed ({} reader(s) dropped)", self.guid, dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn matched_readers(&self) -> Vec<GUID> {
        self.state.lock().proxies.keys().copied().collect()
    }

    /// Acknowledged floor of one matched reader.
    pub fn reader_highest_acked(&self, reader: &GUID) -> Option<SequenceNumber> {
        self.state
            .lock()
            .proxies
            .get(reader)
            .map(ReaderProxy::highest_acked)
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// ACKNACK from `reader`.
    pub fn on_acknack(&self, reader: GUID, acknack: &crate::protocol::AckNack) {
        let now = Instant::now();
        let (outgoing, schedule) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let last_sn = state.history.last_sn();
            let Some(proxy) = state.proxies.get_mut(&reader) else {
                log::trace!("[writer] {} ACKNACK from unmatched {}", self.guid, reader);
                return;
            };
            let Some(outcome) = proxy.on_acknack(
                acknack,
                last_sn,
                self.qos.times.nack_supression_duration,
                now,
            ) else {
                return;
            };
            log::trace!(
                "[writer] {} ACKNACK from {} base={} requested={}",
                self.guid,
                reader,
                acknack.reader_sn_state.base(),
                outcome.requested
            );
            if outcome.acked_advanced {
                self.remove_acked(state);
                self.acked.notify_all();
            }
            if outcome.requested == 0 {
                (Vec::new(), false)
            } else if self.qos.times.nack_response_delay.is_zero() {
                (self.collect_repairs(state, now), false)
            } else {
                (Vec::new(), true)
            }
        };
        self.send(outgoing);
        if schedule && !self.nack_response.is_armed() {
            self.nack_response.restart_timer();
        }
    }

    // ========================================================================
    // Status getters (reading resets the `*_change` fields)
    // ========================================================================

    pub fn publication_matched_status(&self) -> PublicationMatchedStatus {
        let mut state = self.state.lock();
        let status = state.status.publication_matched.clone();
        Self::reset_matched(&mut state.status.publication_matched);
        status
    }

    pub fn offered_incompatible_qos_status(&self) -> IncompatibleQosStatus {
        let mut state = self.state.lock();
        let status = state.status.offered_incompatible_qos.clone();
        state.status.offered_incompatible_qos.total_count_change = 0;
        status
    }

    pub fn offered_deadline_missed_status(&self) -> DeadlineMissedStatus {
        let mut state = self.state.lock();
        let status = state.status.offered_deadline_missed;
        state.status.offered_deadline_missed.total_count_change = 0;
        status
    }

    pub fn liveliness_lost_status(&self) -> LivelinessLostStatus {
        let mut state = self.state.lock();
        let status = state.status.liveliness_lost.clone();
        state.status.liveliness_lost.total_count_change = 0;
        status
    }

    fn reset_matched(status: &mut PublicationMatchedStatus) {
        status.total_count_change = 0;
        status.current_count_change = 0;
    }

    // ========================================================================
    // History inspection
    // ========================================================================

    pub fn last_sn(&self) -> SequenceNumber {
        self.state.lock().history.last_sn()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Writes that failed admission.
    pub fn rejected_count(&self) -> u64 {
        self.state.lock().history.rejected_count()
    }

    pub fn is_acked_by_all(&self, seq: SequenceNumber) -> bool {
        self.state
            .lock()
            .proxies
            .values()
            .filter(|p| p.is_reliable())
            .all(|p| p.is_acked(seq))
    }

    // ========================================================================
    // Internals (called with the state lock held)
    // ========================================================================

    fn heartbeat_for(
        &self,
        proxy: &ReaderProxy,
        history: &WriterHistory,
        count: u32,
        final_flag: bool,
        liveliness_flag: bool,
    ) -> Heartbeat {
        let last_sn = history.last_sn();
        let first_sn = history
            .first_sn()
            .max(proxy.first_relevant())
            .min(last_sn + 1);
        Heartbeat {
            reader_id: proxy.guid().entity_id,
            writer_id: self.guid.entity_id,
            first_sn,
            last_sn,
            count,
            final_flag,
            liveliness_flag,
        }
    }

    /// Push changes each reader has not seen yet. `announce` also gets a
    /// HEARTBEAT when it has nothing pending, so a new reader learns the range.
    fn collect_unsent(&self, state: &mut WriterState, announce: Option<GUID>) -> Vec<Outgoing> {
        let last_sn = state.history.last_sn();
        let mut out = Vec::new();
        for proxy in state.proxies.values_mut() {
            let announced = announce == Some(proxy.guid());
            if !proxy.has_unsent(last_sn) && !(announced && proxy.is_reliable()) {
                continue;
            }
            let reader = proxy.guid();
            let destinations = proxy.destinations();
            let mut msg = MessageBuilder::new(self.guid.prefix, Some(reader.prefix));
            let mut cursor = proxy.highest_sent();
            while let Some(change) = state.history.next_change_after(cursor) {
                if !msg.has_room_for(change.payload.len()) {
                    let full = std::mem::replace(
                        &mut msg,
                        MessageBuilder::new(self.guid.prefix, Some(reader.prefix)),
                    );
                    out.extend(full.finish(destinations.clone()));
                }
                msg.push_change(change, reader.entity_id, self.keyed);
                cursor = change.sequence_number;
            }
            proxy.mark_sent(last_sn);
            if proxy.is_reliable() {
                state.heartbeat_count += 1;
                let hb = self.heartbeat_for(proxy, &state.history, state.heartbeat_count, false, false);
                msg.push(Submessage::Heartbeat(hb));
            }
            out.extend(msg.finish(destinations));
        }
        out
    }

    /// Answer pending ACKNACK requests: DATA for held changes, GAP for the rest.
    fn collect_repairs(&self, state: &mut WriterState, now: Instant) -> Vec<Outgoing> {
        let mut out = Vec::new();
        for proxy in state.proxies.values_mut() {
            if !proxy.has_requested() {
                continue;
            }
            let reader = proxy.guid();
            let destinations = proxy.destinations();
            let mut msg = MessageBuilder::new(self.guid.prefix, Some(reader.prefix));
            let mut irrelevant = Vec::new();
            let mut repaired = 0usize;
            for seq in proxy.take_requested(now) {
                match state.history.get_change(seq) {
                    Some(change) if seq >= proxy.first_relevant() => {
                        if !msg.has_room_for(change.payload.len()) {
                            let full = std::mem::replace(
                                &mut msg,
                                MessageBuilder::new(self.guid.prefix, Some(reader.prefix)),
                            );
                            out.extend(full.finish(destinations.clone()));
                        }
                        msg.push_change(change, reader.entity_id, self.keyed);
                        repaired += 1;
                    }
                    _ => irrelevant.push(seq),
                }
            }
            for gap in gap_submessages(reader.entity_id, self.guid.entity_id, &irrelevant) {
                msg.push(Submessage::Gap(gap));
            }
            state.heartbeat_count += 1;
            let hb = self.heartbeat_for(proxy, &state.history, state.heartbeat_count, false, false);
            msg.push(Submessage::Heartbeat(hb));
            log::debug!(
                "[writer] {} repairing {} change(s) for {} ({} gapped)",
                self.guid,
                repaired,
                reader,
                irrelevant.len()
            );
            out.extend(msg.finish(destinations));
        }
        out
    }

    /// True once `instance` can take one more change. Under KEEP_ALL a full
    /// history gives up its oldest changes that every matched reader has
    /// acknowledged; with no matched reader nothing is released.
    fn make_room(&self, state: &mut WriterState, instance: &InstanceHandle) -> bool {
        if state.history.can_admit(instance) {
            return true;
        }
        if self.qos.history != History::KeepAll {
            return false;
        }
        let Some(floor) = state.proxies.values().map(ReaderProxy::highest_acked).min() else {
            return false;
        };
        let mut released = 0usize;
        while !state.history.can_admit(instance) {
            let full = state.history.is_full();
            let victim = state
                .history
                .iter()
                .filter(|c| c.sequence_number <= floor)
                .find(|c| full || c.instance_handle == *instance)
                .map(|c| c.sequence_number);
            match victim {
                Some(seq) => {
                    state.history.remove_change(seq);
                    released += 1;
                }
                None => break,
            }
        }
        if released > 0 {
            log::trace!(
                "[writer] {} released {} acknowledged change(s) to admit a write",
                self.guid,
                released
            );
        }
        state.history.can_admit(instance)
    }

    /// VOLATILE: drop changes every matched reader has acknowledged.
    fn remove_acked(&self, state: &mut WriterState) {
        if self.qos.durability != Durability::Volatile {
            return;
        }
        let Some(floor) = state.proxies.values().map(ReaderProxy::highest_acked).min() else {
            return;
        };
        let removed = state.history.remove_acked_up_to(floor);
        if removed > 0 {
            log::trace!(
                "[writer] {} released {} acknowledged change(s) up to seq={}",
                self.guid,
                removed,
                floor
            );
            self.acked.notify_all();
        }
    }

    fn send(&self, outgoing: Vec<Outgoing>) {
        if outgoing.is_empty() {
            return;
        }
        let failures = outbound::flush(self.transport.as_ref(), outgoing);
        if failures > 0 {
            log::warn!("[writer] {} {} send(s) failed", self.guid, failures);
        }
    }

    // ========================================================================
    // Timer callbacks
    // ========================================================================

    fn on_heartbeat_timer(&self) -> EventAction {
        let outgoing = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed {
                return EventAction::Stop;
            }
            let last_sn = state.history.last_sn();
            let mut out = Vec::new();
            for proxy in state.proxies.values().filter(|p| p.has_unacked(last_sn)) {
                state.heartbeat_count += 1;
                let hb = self.heartbeat_for(proxy, &state.history, state.heartbeat_count, false, false);
                let mut msg = MessageBuilder::new(self.guid.prefix, Some(proxy.guid().prefix));
                msg.push(Submessage::Heartbeat(hb));
                out.extend(msg.finish(proxy.destinations()));
            }
            out
        };
        if outgoing.is_empty() {
            return EventAction::Stop;
        }
        self.send(outgoing);
        EventAction::Restart
    }

    fn on_nack_response_timer(&self) -> EventAction {
        let outgoing = {
            let mut guard = self.state.lock();
            self.collect_repairs(&mut guard, Instant::now())
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
            let st = &mut state.status.offered_deadline_missed;
            for instance in &missed {
                st.total_count += 1;
                st.total_count_change += 1;
                st.last_instance_handle = *instance;
            }
            (missed.len(), *st, state.deadline.next_due())
        };
        if missed > 0 {
            log::debug!("[writer] {} missed {} offered deadline(s)", self.guid, missed);
            if self.sink.offered_deadline_missed(self.guid, &status) {
                self.state.lock().status.offered_deadline_missed.total_count_change = 0;
            }
        }
        match next {
            Some(due) => EventAction::RestartAfter(due.saturating_duration_since(now)),
            None => EventAction::Stop,
        }
    }

    fn on_lifespan_timer(&self) -> EventAction {
        let lifespan = self.qos.lifespan;
        if is_infinite(lifespan.duration) {
            return EventAction::Stop;
        }
        let now = Timestamp::now();
        let oldest = {
            let mut state = self.state.lock();
            if state.closed {
                return EventAction::Stop;
            }
            let expired = state.history.remove_expired(&lifespan, now);
            if !expired.is_empty() {
                log::debug!(
                    "[writer] {} dropped {} expired change(s)",
                    self.guid,
                    expired.len()
                );
                self.acked.notify_all();
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

impl Drop for StatefulWriter {
    fn drop(&mut self) {
        // No callback may run against a half-dropped writer.
        self.heartbeat.recreate_timer();
        self.nack_response.recreate_timer();
        self.deadline_timer.recreate_timer();
        self.lifespan_timer.recreate_timer();
    }
}

#[cfg(test)]
mod tests;
