// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint Discovery Protocol: pairs local endpoints with everything known on
//! the same topic and hands matched proxies to the delivery engines.
//!
//! Every (writer, reader) pair is in one of three states: matched, incompatible
//! (first failing policy remembered) or neither. A pair is re-evaluated whenever
//! either side is (re)announced with different data, so a periodic SEDP refresh
//! repeating the same data never re-reports an incompatibility, while a QoS change
//! does.
//!
//! Match decisions are taken under the EDP lock; the resulting engine calls are
//! queued and applied in order once it is released, so status listeners may
//! create or delete endpoints. A call made from inside a listener is queued
//! behind the one being applied and runs before the outer call returns.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use super::matcher::{match_endpoints, MatchResult};
use super::static_xml::{StaticEndpointKind, StaticTable};
use crate::core::guid::{GuidPrefix, GUID};
use crate::core::reader::{RemoteWriterAttributes, StatefulReader};
use crate::core::writer::{RemoteReaderAttributes, StatefulWriter};
use crate::qos::QosPolicyId;

/// Engine update decided under the EDP lock.
enum EngineCall {
    ReaderAdd(Arc<StatefulWriter>, RemoteReaderAttributes),
    ReaderRemove(Arc<StatefulWriter>, GUID),
    WriterAdd(Arc<StatefulReader>, RemoteWriterAttributes),
    WriterRemove(Arc<StatefulReader>, GUID),
    OfferedIncompatible(Arc<StatefulWriter>, QosPolicyId),
    RequestedIncompatible(Arc<StatefulReader>, QosPolicyId),
}

impl EngineCall {
    fn apply(self) {
        match self {
            Self::ReaderAdd(engine, attributes) => {
                engine.matched_reader_add(attributes);
            }
            Self::ReaderRemove(engine, reader) => {
                engine.matched_reader_remove(&reader);
            }
            Self::WriterAdd(engine, attributes) => {
                engine.matched_writer_add(attributes);
            }
            Self::WriterRemove(engine, writer) => {
                engine.matched_writer_remove(&writer);
            }
            Self::OfferedIncompatible(engine, policy) => engine.record_incompatible_qos(policy),
            Self::RequestedIncompatible(engine, policy) => engine.record_incompatible_qos(policy),
        }
    }
}

struct LocalWriter {
    data: WriterProxyData,
    engine: Arc<StatefulWriter>,
}

struct LocalReader {
    data: ReaderProxyData,
    engine: Arc<StatefulReader>,
}

#[derive(Default)]
struct Pairs {
    matched: HashSet<(GUID, GUID)>,
    incompatible: HashMap<(GUID, GUID), QosPolicyId>,
    /// Remote endpoints declared by the static XML table.
    declared: HashSet<GUID>,
    calls: VecDeque<EngineCall>,
}

impl Pairs {
    fn outcome(&self, writer: &WriterProxyData, reader: &ReaderProxyData) -> MatchResult {
        if self.declared.contains(&writer.guid) || self.declared.contains(&reader.guid) {
            // Pre-declared endpoints are trusted: only the topic pairs them.
            return if writer.topic_name == reader.topic_name {
                MatchResult::Compatible
            } else {
                MatchResult::Unrelated
            };
        }
        match_endpoints(writer, reader)
    }

    /// Bring one pair to the state `match_endpoints` says it should be in.
    fn evaluate(
        &mut self,
        writer: &WriterProxyData,
        writer_engine: Option<&Arc<StatefulWriter>>,
        reader: &ReaderProxyData,
        reader_engine: Option<&Arc<StatefulReader>>,
    ) {
        let key = (writer.guid, reader.guid);
        match self.outcome(writer, reader) {
            MatchResult::Compatible => {
                self.incompatible.remove(&key);
                if self.matched.insert(key) {
                    log::debug!(
                        "[EDP] match writer {} -> reader {} on '{}'",
                        writer.guid,
                        reader.guid,
                        writer.topic_name
                    );
                    if let Some(engine) = writer_engine {
                        self.calls.push_back(EngineCall::ReaderAdd(
                            Arc::clone(engine),
                            reader.remote_attributes(),
                        ));
                    }
                    if let Some(engine) = reader_engine {
                        self.calls.push_back(EngineCall::WriterAdd(
                            Arc::clone(engine),
                            writer.remote_attributes(),
                        ));
                    }
                }
            }
            MatchResult::Unrelated => {
                self.incompatible.remove(&key);
                self.unmatch(key, writer_engine, reader_engine);
            }
            MatchResult::Incompatible(policy) => {
                self.unmatch(key, writer_engine, reader_engine);
                if self.incompatible.insert(key, policy) != Some(policy) {
                    log::warn!(
                        "[EDP] writer {} / reader {} on '{}' incompatible: {:?}",
                        writer.guid,
                        reader.guid,
                        writer.topic_name,
                        policy
                    );
                    if let Some(engine) = writer_engine {
                        self.calls
                            .push_back(EngineCall::OfferedIncompatible(Arc::clone(engine), policy));
                    }
                    if let Some(engine) = reader_engine {
                        self.calls
                            .push_back(EngineCall::RequestedIncompatible(Arc::clone(engine), policy));
                    }
                }
            }
        }
    }

    fn unmatch(
        &mut self,
        key: (GUID, GUID),
        writer_engine: Option<&Arc<StatefulWriter>>,
        reader_engine: Option<&Arc<StatefulReader>>,
    ) {
        if self.matched.remove(&key) {
            log::debug!("[EDP] unmatch writer {} -> reader {}", key.0, key.1);
            if let Some(engine) = writer_engine {
                self.calls
                    .push_back(EngineCall::ReaderRemove(Arc::clone(engine), key.1));
            }
            if let Some(engine) = reader_engine {
                self.calls
                    .push_back(EngineCall::WriterRemove(Arc::clone(engine), key.0));
            }
        }
    }

    /// Drop every pair involving `guid`, returning the matched ones.
    fn forget(&mut self, guid: &GUID) -> Vec<(GUID, GUID)> {
        self.incompatible.retain(|(w, r), _| w != guid && r != guid);
        self.declared.remove(guid);
        let gone: Vec<(GUID, GUID)> = self
            .matched
            .iter()
            .filter(|(w, r)| w == guid || r == guid)
            .copied()
            .collect();
        for key in &gone {
            self.matched.remove(key);
        }
        gone
    }
}

#[derive(Default)]
struct EdpState {
    local_writers: BTreeMap<GUID, LocalWriter>,
    local_readers: BTreeMap<GUID, LocalReader>,
    remote_writers: BTreeMap<GUID, WriterProxyData>,
    remote_readers: BTreeMap<GUID, ReaderProxyData>,
    pairs: Pairs,
    /// A thread is applying queued engine calls.
    dispatching: bool,
}

impl EdpState {
    fn writer_data(&self, guid: &GUID) -> Option<&WriterProxyData> {
        self.local_writers
            .get(guid)
            .map(|w| &w.data)
            .or_else(|| self.remote_writers.get(guid))
    }

    fn reader_data(&self, guid: &GUID) -> Option<&ReaderProxyData> {
        self.local_readers
            .get(guid)
            .map(|r| &r.data)
            .or_else(|| self.remote_readers.get(guid))
    }

    /// Pair a writer (local or remote) against every local reader, and against
    /// remote readers too when the writer itself is local.
    fn pair_writer(&mut self, guid: GUID) {
        let EdpState {
            local_writers,
            local_readers,
            remote_writers,
            remote_readers,
            pairs,
            ..
        } = self;
        let (data, engine) = match local_writers.get(&guid) {
            Some(local) => (&local.data, Some(&local.engine)),
            None => match remote_writers.get(&guid) {
                Some(data) => (data, None),
                None => return,
            },
        };
        for reader in local_readers.values() {
            pairs.evaluate(data, engine, &reader.data, Some(&reader.engine));
        }
        if engine.is_some() {
            for reader in remote_readers.values() {
                pairs.evaluate(data, engine, reader, None);
            }
        }
    }

    fn pair_reader(&mut self, guid: GUID) {
        let EdpState {
            local_writers,
            local_readers,
            remote_writers,
            remote_readers,
            pairs,
            ..
        } = self;
        let (data, engine) = match local_readers.get(&guid) {
            Some(local) => (&local.data, Some(&local.engine)),
            None => match remote_readers.get(&guid) {
                Some(data) => (data, None),
                None => return,
            },
        };
        for writer in local_writers.values() {
            pairs.evaluate(&writer.data, Some(&writer.engine), data, engine);
        }
        if engine.is_some() {
            for writer in remote_writers.values() {
                pairs.evaluate(writer, None, data, engine);
            }
        }
    }

    /// Unmatch every pair of a departing endpoint on the local side.
    fn release(&mut self, guid: &GUID) {
        for (writer, reader) in self.pairs.forget(guid) {
            if writer != *guid {
                if let Some(local) = self.local_writers.get(&writer) {
                    self.pairs
                        .calls
                        .push_back(EngineCall::ReaderRemove(Arc::clone(&local.engine), reader));
                }
            }
            if reader != *guid {
                if let Some(local) = self.local_readers.get(&reader) {
                    self.pairs
                        .calls
                        .push_back(EngineCall::WriterRemove(Arc::clone(&local.engine), writer));
                }
            }
        }
    }
}

/// Endpoint registry and matcher for one participant.
pub struct Edp {
    local_prefix: GuidPrefix,
    static_table: Option<StaticTable>,
    state: Mutex<EdpState>,
}

impl Edp {
    /// Dynamic EDP (SEDP data feeds `on_remote_*`).
    pub fn new(local_prefix: GuidPrefix) -> Self {
        Self {
            local_prefix,
            static_table: None,
            state: Mutex::new(EdpState::default()),
        }
    }

    /// Static EDP: remote endpoints come from `table` when their participant is
    /// discovered.
    pub fn with_static_table(local_prefix: GuidPrefix, table: StaticTable) -> Self {
        Self {
            static_table: Some(table),
            ..Self::new(local_prefix)
        }
    }

    pub fn is_static(&self) -> bool {
        self.static_table.is_some()
    }

    pub fn static_table(&self) -> Option<&StaticTable> {
        self.static_table.as_ref()
    }

    /// Release the lock and apply queued engine calls in order. A thread that
    /// finds another one dispatching leaves its calls to it.
    fn dispatch(&self, mut state: MutexGuard<'_, EdpState>) {
        if state.dispatching {
            return;
        }
        state.dispatching = true;
        loop {
            let batch: Vec<EngineCall> = state.pairs.calls.drain(..).collect();
            if batch.is_empty() {
                state.dispatching = false;
                return;
            }
            MutexGuard::unlocked(&mut state, || {
                for call in batch {
                    call.apply();
                }
            });
        }
    }

    // ========================================================================
    // Local endpoints
    // ========================================================================

    pub fn register_writer(&self, data: WriterProxyData, engine: Arc<StatefulWriter>) {
        let guid = data.guid;
        log::debug!(
            "[EDP] local writer {} on '{}' ({})",
            guid,
            data.topic_name,
            data.type_name
        );
        let mut state = self.state.lock();
        state.local_writers.insert(guid, LocalWriter { data, engine });
        state.pair_writer(guid);
        self.dispatch(state);
    }

    pub fn register_reader(&self, data: ReaderProxyData, engine: Arc<StatefulReader>) {
        let guid = data.guid;
        log::debug!(
            "[EDP] local reader {} on '{}' ({})",
            guid,
            data.topic_name,
            data.type_name
        );
        let mut state = self.state.lock();
        state.local_readers.insert(guid, LocalReader { data, engine });
        state.pair_reader(guid);
        self.dispatch(state);
    }

    /// Remove a local writer, unmatching every local reader paired with it.
    pub fn unregister_writer(&self, guid: &GUID) -> Option<WriterProxyData> {
        let mut state = self.state.lock();
        let local = state.local_writers.remove(guid)?;
        state.release(guid);
        self.dispatch(state);
        Some(local.data)
    }

    pub fn unregister_reader(&self, guid: &GUID) -> Option<ReaderProxyData> {
        let mut state = self.state.lock();
        let local = state.local_readers.remove(guid)?;
        state.release(guid);
        self.dispatch(state);
        Some(local.data)
    }

    pub fn local_writers(&self) -> Vec<WriterProxyData> {
        self.state
            .lock()
            .local_writers
            .values()
            .map(|w| w.data.clone())
            .collect()
    }

    pub fn local_readers(&self) -> Vec<ReaderProxyData> {
        self.state
            .lock()
            .local_readers
            .values()
            .map(|r| r.data.clone())
            .collect()
    }

    // ========================================================================
    // Remote endpoints
    // ========================================================================

    /// SEDP publication data. Returns false when it repeats what is known.
    pub fn on_remote_writer(&self, data: WriterProxyData) -> bool {
        if data.guid.prefix == self.local_prefix {
            return false;
        }
        let guid = data.guid;
        let mut state = self.state.lock();
        if state.remote_writers.get(&guid) == Some(&data) {
            return false;
        }
        log::debug!(
            "[EDP] remote writer {} on '{}' ({})",
            guid,
            data.topic_name,
            data.type_name
        );
        state.remote_writers.insert(guid, data);
        state.pair_writer(guid);
        self.dispatch(state);
        true
    }

    /// SEDP subscription data. Returns false when it repeats what is known.
    pub fn on_remote_reader(&self, data: ReaderProxyData) -> bool {
        if data.guid.prefix == self.local_prefix {
            return false;
        }
        let guid = data.guid;
        let mut state = self.state.lock();
        if state.remote_readers.get(&guid) == Some(&data) {
            return false;
        }
        log::debug!(
            "[EDP] remote reader {} on '{}' ({})",
            guid,
            data.topic_name,
            data.type_name
        );
        state.remote_readers.insert(guid, data);
        state.pair_reader(guid);
        self.dispatch(state);
        true
    }

    pub fn remove_remote_writer(&self, guid: &GUID) -> bool {
        let mut state = self.state.lock();
        if state.remote_writers.remove(guid).is_none() {
            return false;
        }
        log::debug!("[EDP] remote writer {} withdrawn", guid);
        state.release(guid);
        self.dispatch(state);
        true
    }

    pub fn remove_remote_reader(&self, guid: &GUID) -> bool {
        let mut state = self.state.lock();
        if state.remote_readers.remove(guid).is_none() {
            return false;
        }
        log::debug!("[EDP] remote reader {} withdrawn", guid);
        state.release(guid);
        self.dispatch(state);
        true
    }

    /// Forget every endpoint of a departed participant. Returns how many were known.
    pub fn remove_participant(&self, prefix: &GuidPrefix) -> usize {
        let mut state = self.state.lock();
        let writers: Vec<GUID> = state
            .remote_writers
            .keys()
            .filter(|g| g.prefix == *prefix)
            .copied()
            .collect();
        let readers: Vec<GUID> = state
            .remote_readers
            .keys()
            .filter(|g| g.prefix == *prefix)
            .copied()
            .collect();
        for guid in &writers {
            state.remote_writers.remove(guid);
            state.release(guid);
        }
        for guid in &readers {
            state.remote_readers.remove(guid);
            state.release(guid);
        }
        self.dispatch(state);
        let removed = writers.len() + readers.len();
        if removed > 0 {
            log::info!(
                "[EDP] dropped {} endpoint(s) of participant {:02x?}",
                removed,
                prefix
            );
        }
        removed
    }

    /// Static EDP: load the declared endpoints of a newly discovered participant.
    /// Returns how many were added; zero in dynamic mode.
    pub fn on_static_participant(&self, participant: &ParticipantProxyData) -> usize {
        let Some(table) = &self.static_table else {
            return 0;
        };
        if participant.guid_prefix == self.local_prefix {
            return 0;
        }
        let mut added = 0;
        for endpoint in table.endpoints_of(&participant.name) {
            let guid = endpoint.guid(participant.guid_prefix);
            self.state.lock().pairs.declared.insert(guid);
            let fresh = match endpoint.kind {
                StaticEndpointKind::Writer => {
                    let mut data = endpoint.writer_data(participant.guid_prefix);
                    data.inherit_locators(participant);
                    self.on_remote_writer(data)
                }
                StaticEndpointKind::Reader => {
                    let mut data = endpoint.reader_data(participant.guid_prefix);
                    data.inherit_locators(participant);
                    self.on_remote_reader(data)
                }
            };
            if fresh {
                added += 1;
            }
        }
        log::info!(
            "[static-edp] participant '{}': {} declared endpoint(s) loaded",
            participant.name,
            added
        );
        added
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn remote_writer(&self, guid: &GUID) -> Option<WriterProxyData> {
        self.state.lock().remote_writers.get(guid).cloned()
    }

    pub fn remote_reader(&self, guid: &GUID) -> Option<ReaderProxyData> {
        self.state.lock().remote_readers.get(guid).cloned()
    }

    pub fn remote_endpoint_count(&self) -> usize {
        let state = self.state.lock();
        state.remote_writers.len() + state.remote_readers.len()
    }

    pub fn is_matched(&self, writer: &GUID, reader: &GUID) -> bool {
        self.state.lock().pairs.matched.contains(&(*writer, *reader))
    }

    /// First failing policy of a known incompatible pair.
    pub fn incompatibility(&self, writer: &GUID, reader: &GUID) -> Option<QosPolicyId> {
        self.state
            .lock()
            .pairs
            .incompatible
            .get(&(*writer, *reader))
            .copied()
    }

    /// Topic and type of a known writer, local or remote.
    pub fn writer_topic(&self, guid: &GUID) -> Option<(String, String)> {
        let state = self.state.lock();
        state
            .writer_data(guid)
            .map(|d| (d.topic_name.clone(), d.type_name.clone()))
    }

    pub fn reader_topic(&self, guid: &GUID) -> Option<(String, String)> {
        let state = self.state.lock();
        state
            .reader_data(guid)
            .map(|d| (d.topic_name.clone(), d.type_name.clone()))
    }
}
