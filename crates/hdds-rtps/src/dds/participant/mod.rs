// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DDS Participant
//!
//! The [`DomainParticipant`] joins one domain over a [`Transport`] and owns every
//! entity created through it: publishers, subscribers, writers and readers live in
//! arenas keyed by [`EntityId`], and the handles given to the application only keep
//! a weak link back to the participant plus their id. Deleting an entity (or
//! dropping the participant) invalidates its handles; later calls on them return
//! [`Error::AlreadyDeleted`].
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                 DomainParticipant                   |
//! |  publishers / subscribers / writers / readers       |
//! |  (arenas by EntityId)                               |
//! +-----------------------------------------------------+
//! |  Pdp (leases) | Edp (matching) | LivelinessManager  |
//! +-----------------------------------------------------+
//! |  TimedEventScheduler | Receiver | Transport         |
//! +-----------------------------------------------------+
//! ```
//!
//! Discovery traffic (SPDP/SEDP) is handled by `builtin`, incoming datagrams are
//! routed by `receiver`, and engine status changes reach listeners through the
//! cascade in `sinks`.

mod builtin;
mod receiver;
pub(super) mod sinks;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use self::builtin::Sequences;
use self::receiver::Receiver;
use self::sinks::{attach, ParticipantSlots, ReaderSink, Slot, SubscriberSlots, WriterSink};
use super::listener::{
    DataReaderListener, DataWriterListener, DomainParticipantListener, PublisherListener,
    StatusMask, SubscriberListener,
};
use super::reader::DataReader;
use super::type_support::{self, TopicType};
use super::writer::DataWriter;
use super::{Error, Result};
use crate::config::{self, ParticipantConfig, PortMapping};
use crate::core::discovery::wire::BuiltinTopic;
use crate::core::discovery::{
    Edp, ParticipantProxyData, Pdp, ReaderProxyData, StaticEndpointKind, StaticTable,
    WriterProxyData,
};
use crate::core::guid::{entity_kind, generate_prefix, EntityId, GuidPrefix, GUID};
use crate::core::liveliness::{LivelinessEvent, LivelinessManager};
use crate::core::reader::{KeyResolver, ReaderStatusSink, StatefulReader};
use crate::core::time::is_infinite;
use crate::core::timer::{EventAction, TimedEvent, TimedEventScheduler};
use crate::core::writer::{StatefulWriter, WriterStatusSink};
use crate::protocol::constants::HDDS_VENDOR_ID;
use crate::protocol::encapsulation::{self, EncapsulationKind};
use crate::qos::{LivelinessKind, QoS};
use crate::transport::{Locator, ReceiveHandler, Transport};

/// Distinguishes participants created by the same process.
static INSTANCE_COUNTER: AtomicU16 = AtomicU16::new(0);

/// First key handed out to user entities; lower keys are left to static tables.
const FIRST_ENTITY_KEY: u32 = 0x100;

// ============================================================================
// Arena records
// ============================================================================

struct PublisherRecord {
    listener: Arc<Slot<dyn DataWriterListener>>,
}

struct SubscriberRecord {
    guid: GUID,
    listeners: Arc<SubscriberSlots>,
}

pub(crate) struct WriterRecord {
    pub engine: Arc<StatefulWriter>,
    publisher: EntityId,
    liveliness: LivelinessKind,
    lease: Duration,
}

pub(crate) struct ReaderRecord {
    pub engine: Arc<StatefulReader>,
    subscriber: EntityId,
}

// ============================================================================
// Shared participant state
// ============================================================================

pub(crate) struct Inner {
    config: ParticipantConfig,
    prefix: GuidPrefix,
    ports: PortMapping,
    pub(crate) transport: Arc<dyn Transport>,
    scheduler: TimedEventScheduler,
    pub(crate) pdp: Pdp,
    pub(crate) edp: Edp,
    /// Leases of local writers with a finite liveliness lease.
    liveliness: LivelinessManager,
    spdp_timer: TimedEvent,
    automatic_timer: TimedEvent,
    user_unicast: Vec<Locator>,
    channels: Mutex<Vec<Locator>>,
    listeners: Arc<ParticipantSlots>,
    publishers: DashMap<EntityId, PublisherRecord>,
    subscribers: DashMap<EntityId, SubscriberRecord>,
    pub(crate) writers: DashMap<EntityId, WriterRecord>,
    pub(crate) readers: DashMap<EntityId, ReaderRecord>,
    default_publisher: Mutex<Option<EntityId>>,
    default_subscriber: Mutex<Option<EntityId>>,
    next_key: AtomicU32,
    sequences: Sequences,
}

impl Inner {
    pub(crate) fn prefix(&self) -> GuidPrefix {
        self.prefix
    }

    pub(crate) fn writer_engine(&self, id: &EntityId) -> Option<Arc<StatefulWriter>> {
        self.writers.get(id).map(|r| Arc::clone(&r.engine))
    }

    pub(crate) fn reader_engines(&self) -> Vec<Arc<StatefulReader>> {
        self.readers.iter().map(|r| Arc::clone(&r.engine)).collect()
    }

    fn entity_in_use(&self, id: &EntityId) -> bool {
        self.writers.contains_key(id)
            || self.readers.contains_key(id)
            || self.publishers.contains_key(id)
            || self.subscribers.contains_key(id)
    }

    fn allocate_entity(&self, kind: u8) -> EntityId {
        loop {
            let key = self.next_key.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;
            let id = EntityId::from_key(key, kind);
            if key != 0 && !self.entity_in_use(&id) {
                return id;
            }
        }
    }

    /// Entity id of a new endpoint: its declaration when running static EDP,
    /// a fresh key otherwise.
    fn endpoint_id(&self, kind: StaticEndpointKind, topic: &str, kind_byte: u8) -> EntityId {
        if let Some(table) = self.edp.static_table() {
            let used: HashSet<EntityId> = self
                .writers
                .iter()
                .map(|r| *r.key())
                .chain(self.readers.iter().map(|r| *r.key()))
                .collect();
            match table.find(&self.config.name, kind, topic, &used) {
                Some(declared) => return declared.entity_id,
                None => log::warn!(
                    "[static-edp] no {:?} declared for '{}' on topic '{}', remote peers will not match it",
                    kind,
                    self.config.name,
                    topic
                ),
            }
        }
        self.allocate_entity(kind_byte)
    }

    // ========================================================================
    // Publishers / subscribers
    // ========================================================================

    fn create_publisher(self: &Arc<Self>) -> Publisher {
        let id = self.allocate_entity(entity_kind::WRITER_GROUP);
        let guid = GUID::new(self.prefix, id);
        let listener: Arc<Slot<dyn DataWriterListener>> = Arc::default();
        self.publishers.insert(
            id,
            PublisherRecord {
                listener: Arc::clone(&listener),
            },
        );
        log::debug!("[writer] publisher {} created", guid);
        Publisher {
            participant: Arc::downgrade(self),
            guid,
            listener,
        }
    }

    fn create_subscriber(self: &Arc<Self>) -> Subscriber {
        let id = self.allocate_entity(entity_kind::READER_GROUP);
        let guid = GUID::new(self.prefix, id);
        let listeners: Arc<SubscriberSlots> = Arc::default();
        self.subscribers.insert(
            id,
            SubscriberRecord {
                guid,
                listeners: Arc::clone(&listeners),
            },
        );
        log::debug!("[reader] subscriber {} created", guid);
        Subscriber {
            participant: Arc::downgrade(self),
            guid,
            listeners,
        }
    }

    fn default_publisher(self: &Arc<Self>) -> EntityId {
        let mut default = self.default_publisher.lock();
        match *default {
            Some(id) if self.publishers.contains_key(&id) => id,
            _ => {
                let id = self.create_publisher().guid.entity_id;
                *default = Some(id);
                id
            }
        }
    }

    fn default_subscriber(self: &Arc<Self>) -> EntityId {
        let mut default = self.default_subscriber.lock();
        match *default {
            Some(id) if self.subscribers.contains_key(&id) => id,
            _ => {
                let id = self.create_subscriber().guid.entity_id;
                *default = Some(id);
                id
            }
        }
    }

    fn delete_publisher(&self, id: &EntityId) -> Result<()> {
        if self.writers.iter().any(|w| w.publisher == *id) {
            return Err(Error::PreconditionNotMet(
                "publisher still has writers".to_string(),
            ));
        }
        self.publishers.remove(id).ok_or(Error::AlreadyDeleted)?;
        let mut default = self.default_publisher.lock();
        if *default == Some(*id) {
            *default = None;
        }
        Ok(())
    }

    fn delete_subscriber(&self, id: &EntityId) -> Result<()> {
        if self.readers.iter().any(|r| r.subscriber == *id) {
            return Err(Error::PreconditionNotMet(
                "subscriber still has readers".to_string(),
            ));
        }
        self.subscribers.remove(id).ok_or(Error::AlreadyDeleted)?;
        let mut default = self.default_subscriber.lock();
        if *default == Some(*id) {
            *default = None;
        }
        Ok(())
    }

    // ========================================================================
    // Writers
    // ========================================================================

    fn create_writer<T: TopicType>(
        self: &Arc<Self>,
        publisher: EntityId,
        topic: &str,
        qos: QoS,
    ) -> Result<DataWriter<T>> {
        if topic.is_empty() {
            return Err(Error::BadParameter("empty topic name".to_string()));
        }
        qos.validate().map_err(Error::InvalidQos)?;
        let publisher_slot = match self.publishers.get(&publisher) {
            Some(record) => Arc::clone(&record.listener),
            None => return Err(Error::AlreadyDeleted),
        };

        let kind_byte = if T::has_key() {
            entity_kind::WRITER_WITH_KEY
        } else {
            entity_kind::WRITER_NO_KEY
        };
        let id = self.endpoint_id(StaticEndpointKind::Writer, topic, kind_byte);
        let guid = GUID::new(self.prefix, id);
        let sink = Arc::new(WriterSink::new(publisher_slot, Arc::clone(&self.listeners)));
        let engine = StatefulWriter::new(
            guid,
            qos.clone(),
            &self.scheduler,
            Arc::clone(&self.transport),
            Arc::clone(&sink) as Arc<dyn WriterStatusSink>,
        );

        let liveliness = qos.liveliness;
        if !is_infinite(liveliness.lease_duration) {
            self.liveliness
                .add_writer(guid, liveliness.kind, liveliness.lease_duration);
        }
        self.writers.insert(
            id,
            WriterRecord {
                engine: Arc::clone(&engine),
                publisher,
                liveliness: liveliness.kind,
                lease: liveliness.lease_duration,
            },
        );
        if liveliness.kind == LivelinessKind::Automatic && !is_infinite(liveliness.lease_duration)
        {
            self.rearm_automatic_liveliness();
        }

        let mut data = WriterProxyData::new(guid, topic, T::type_name(), qos);
        data.unicast_locators = self.user_unicast.clone();
        log::info!("[writer] {} created on '{}' ({})", guid, topic, T::type_name());
        self.edp.register_writer(data.clone(), Arc::clone(&engine));
        if !self.edp.is_static() {
            self.announce_writer(&data);
        }
        Ok(DataWriter::new(
            Arc::downgrade(self),
            guid,
            topic,
            &engine,
            sink,
        ))
    }

    pub(crate) fn delete_writer(&self, id: &EntityId, publisher: Option<&EntityId>) -> Result<()> {
        if let (Some(publisher), Some(record)) = (publisher, self.writers.get(id)) {
            if record.publisher != *publisher {
                return Err(Error::PreconditionNotMet(
                    "writer belongs to another publisher".to_string(),
                ));
            }
        }
        let (_, record) = self.writers.remove(id).ok_or(Error::AlreadyDeleted)?;
        let guid = record.engine.guid();
        self.edp.unregister_writer(&guid);
        record.engine.close();
        self.liveliness.remove_writer(&guid);
        if !self.edp.is_static() {
            self.withdraw_endpoint(BuiltinTopic::Publications, &guid);
        }
        log::info!("[writer] {} deleted", guid);
        Ok(())
    }

    /// Local write or explicit assertion of a writer with a finite lease.
    pub(crate) fn assert_local_liveliness(&self, guid: &GUID) {
        self.liveliness.assert_liveliness(guid);
    }

    fn on_local_liveliness(&self, event: &LivelinessEvent) {
        if !event.is_lost() || event.kind == LivelinessKind::Automatic {
            return;
        }
        if event.guid.prefix != self.prefix {
            return;
        }
        if let Some(engine) = self.writer_engine(&event.guid.entity_id) {
            engine.on_liveliness_lost();
        }
    }

    fn automatic_period(&self) -> Option<Duration> {
        self.writers
            .iter()
            .filter(|w| w.liveliness == LivelinessKind::Automatic && !is_infinite(w.lease))
            .map(|w| w.lease / 3)
            .min()
            .map(|period| period.max(Duration::from_millis(1)))
    }

    fn rearm_automatic_liveliness(&self) {
        if let Some(period) = self.automatic_period() {
            self.automatic_timer.restart_timer_after(period);
        }
    }

    /// The participant asserts every AUTOMATIC writer on their behalf.
    fn on_automatic_timer(&self) -> EventAction {
        let engines: Vec<Arc<StatefulWriter>> = self
            .writers
            .iter()
            .filter(|w| w.liveliness == LivelinessKind::Automatic && !is_infinite(w.lease))
            .map(|w| Arc::clone(&w.engine))
            .collect();
        if engines.is_empty() {
            return EventAction::Stop;
        }
        self.liveliness
            .assert_liveliness_kind(LivelinessKind::Automatic, Some(self.prefix));
        for engine in &engines {
            engine.assert_liveliness();
        }
        match self.automatic_period() {
            Some(period) => EventAction::RestartAfter(period),
            None => EventAction::Stop,
        }
    }

    fn assert_participant_liveliness(&self) {
        self.liveliness
            .assert_liveliness_kind(LivelinessKind::ManualByParticipant, Some(self.prefix));
        let engines: Vec<Arc<StatefulWriter>> = self
            .writers
            .iter()
            .filter(|w| w.liveliness == LivelinessKind::ManualByParticipant)
            .map(|w| Arc::clone(&w.engine))
            .collect();
        for engine in &engines {
            engine.assert_liveliness();
        }
    }

    // ========================================================================
    // Readers
    // ========================================================================

    fn create_reader<T: TopicType>(
        self: &Arc<Self>,
        subscriber: EntityId,
        topic: &str,
        qos: QoS,
    ) -> Result<DataReader<T>> {
        if topic.is_empty() {
            return Err(Error::BadParameter("empty topic name".to_string()));
        }
        qos.validate().map_err(Error::InvalidQos)?;
        let (subscriber_guid, slots) = match self.subscribers.get(&subscriber) {
            Some(record) => (record.guid, Arc::clone(&record.listeners)),
            None => return Err(Error::AlreadyDeleted),
        };

        let kind_byte = if T::has_key() {
            entity_kind::READER_WITH_KEY
        } else {
            entity_kind::READER_NO_KEY
        };
        let id = self.endpoint_id(StaticEndpointKind::Reader, topic, kind_byte);
        let guid = GUID::new(self.prefix, id);
        let sink = Arc::new(ReaderSink::new(
            subscriber_guid,
            slots,
            Arc::clone(&self.listeners),
        ));
        let engine = StatefulReader::new(
            guid,
            qos.clone(),
            &self.scheduler,
            Arc::clone(&self.transport),
            Arc::clone(&sink) as Arc<dyn ReaderStatusSink>,
            key_resolver::<T>(),
        );
        self.readers.insert(
            id,
            ReaderRecord {
                engine: Arc::clone(&engine),
                subscriber,
            },
        );

        let mut data = ReaderProxyData::new(guid, topic, T::type_name(), qos);
        data.unicast_locators = self.user_unicast.clone();
        log::info!("[reader] {} created on '{}' ({})", guid, topic, T::type_name());
        self.edp.register_reader(data.clone(), Arc::clone(&engine));
        if !self.edp.is_static() {
            self.announce_reader(&data);
        }
        Ok(DataReader::new(Arc::downgrade(self), guid, &engine, sink))
    }

    pub(crate) fn delete_reader(&self, id: &EntityId, subscriber: Option<&EntityId>) -> Result<()> {
        if let (Some(subscriber), Some(record)) = (subscriber, self.readers.get(id)) {
            if record.subscriber != *subscriber {
                return Err(Error::PreconditionNotMet(
                    "reader belongs to another subscriber".to_string(),
                ));
            }
        }
        let (_, record) = self.readers.remove(id).ok_or(Error::AlreadyDeleted)?;
        let guid = record.engine.guid();
        self.edp.unregister_reader(&guid);
        record.engine.close();
        if !self.edp.is_static() {
            self.withdraw_endpoint(BuiltinTopic::Subscriptions, &guid);
        }
        log::info!("[reader] {} deleted", guid);
        Ok(())
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    fn shutdown(&self) {
        self.spdp_timer.cancel_timer();
        self.automatic_timer.cancel_timer();
        self.withdraw_participant();

        let channels: Vec<Locator> = self.channels.lock().drain(..).collect();
        for locator in &channels {
            self.transport.close_input_channel(locator);
        }

        let writers: Vec<EntityId> = self.writers.iter().map(|w| *w.key()).collect();
        for id in &writers {
            if let Some((_, record)) = self.writers.remove(id) {
                self.edp.unregister_writer(&record.engine.guid());
                record.engine.close();
                self.liveliness.remove_writer(&record.engine.guid());
            }
        }
        let readers: Vec<EntityId> = self.readers.iter().map(|r| *r.key()).collect();
        for id in &readers {
            if let Some((_, record)) = self.readers.remove(id) {
                self.edp.unregister_reader(&record.engine.guid());
                record.engine.close();
            }
        }
        self.publishers.clear();
        self.subscribers.clear();

        self.spdp_timer.recreate_timer();
        self.automatic_timer.recreate_timer();
        log::info!("[PDP] participant '{}' left domain {}", self.config.name, self.config.domain_id);
    }
}

/// Instance resolution for DATA without KEY_HASH: key-only payloads are the
/// big-endian key itself, full samples are decoded.
fn key_resolver<T: TopicType>() -> Option<KeyResolver> {
    if !T::has_key() {
        return None;
    }
    Some(Arc::new(|payload: &[u8]| {
        let (kind, body) = encapsulation::split(payload).ok()?;
        if kind == EncapsulationKind::CdrBe {
            return Some(type_support::key_hash(body));
        }
        type_support::decode::<T>(payload)
            .ok()
            .map(|sample| type_support::instance_of(&sample))
    }))
}

fn local_host_id() -> u32 {
    match local_ip_address::local_ip() {
        Ok(std::net::IpAddr::V4(ip)) => u32::from(ip),
        _ => u32::from(std::net::Ipv4Addr::LOCALHOST),
    }
}

// ============================================================================
// DomainParticipant
// ============================================================================

/// Entry point to a DDS domain and owner of every entity created through it.
pub struct DomainParticipant {
    inner: Arc<Inner>,
}

impl DomainParticipant {
    /// Join `config.domain_id` over `transport`.
    ///
    /// Opens the metatraffic multicast, metatraffic unicast and user unicast
    /// channels, loads the static EDP table when configured, and starts the
    /// periodic SPDP announcement.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the configuration is out of range
    /// - [`Error::Discovery`] when the static EDP file cannot be parsed
    /// - [`Error::TransportError`] when an input channel cannot be opened
    pub fn new(config: ParticipantConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let static_table = match &config.static_edp_xml {
            Some(path) => {
                let table = StaticTable::from_file(path)?;
                for rejected in table.rejected() {
                    log::warn!("[static-edp] {}: entry skipped: {}", path.display(), rejected);
                }
                Some(table)
            }
            None => None,
        };
        let scheduler = TimedEventScheduler::new()
            .map_err(|e| Error::TransportError(format!("timer thread: {}", e)))?;

        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let host_id = local_host_id() ^ (u32::from(instance) << 16);
        let prefix = generate_prefix(HDDS_VENDOR_ID, host_id, config.participant_id as u16);
        let ports = config::port_mapping(config.domain_id, config.participant_id);

        let mut local = ParticipantProxyData::new(prefix, &config.name, config.domain_id);
        local.lease_duration = config.lease_duration;
        local.metatraffic_unicast = transport.unicast_locators(u32::from(ports.metatraffic_unicast));
        local.metatraffic_multicast = vec![Locator::udpv4(
            config::MULTICAST_IP,
            u32::from(ports.metatraffic_multicast),
        )];
        local.default_unicast = transport.unicast_locators(u32::from(ports.user_unicast));
        let user_unicast = local.default_unicast.clone();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let on_removed = weak.clone();
            let pdp = Pdp::new(local, &scheduler, move |data: &ParticipantProxyData| {
                if let Some(inner) = on_removed.upgrade() {
                    inner.edp.remove_participant(&data.guid_prefix);
                }
            });
            let edp = match static_table {
                Some(table) => Edp::with_static_table(prefix, table),
                None => Edp::new(prefix),
            };
            let on_liveliness = weak.clone();
            let liveliness = LivelinessManager::new(&scheduler, move |event| {
                if let Some(inner) = on_liveliness.upgrade() {
                    inner.on_local_liveliness(event);
                }
            });
            let on_spdp = weak.clone();
            let spdp_timer = scheduler.create_event(config.announcement_period, move || {
                match on_spdp.upgrade() {
                    Some(inner) => inner.on_spdp_timer(),
                    None => EventAction::Stop,
                }
            });
            let on_automatic = weak.clone();
            let automatic_timer = scheduler.create_event(config.lease_duration, move || {
                match on_automatic.upgrade() {
                    Some(inner) => inner.on_automatic_timer(),
                    None => EventAction::Stop,
                }
            });
            Inner {
                config,
                prefix,
                ports,
                transport,
                scheduler,
                pdp,
                edp,
                liveliness,
                spdp_timer,
                automatic_timer,
                user_unicast,
                channels: Mutex::new(Vec::new()),
                listeners: Arc::default(),
                publishers: DashMap::new(),
                subscribers: DashMap::new(),
                writers: DashMap::new(),
                readers: DashMap::new(),
                default_publisher: Mutex::new(None),
                default_subscriber: Mutex::new(None),
                next_key: AtomicU32::new(FIRST_ENTITY_KEY),
                sequences: Sequences::default(),
            }
        });
        let participant = Self { inner };
        participant.open_channels()?;

        let inner = &participant.inner;
        log::info!(
            "[PDP] participant '{}' ({}) joined domain {}",
            inner.config.name,
            GUID::new(inner.prefix, EntityId::PARTICIPANT),
            inner.config.domain_id
        );
        inner.announce_participant();
        inner.spdp_timer.restart_timer();
        Ok(participant)
    }

    fn open_channels(&self) -> Result<()> {
        let inner = &self.inner;
        let handler: Arc<dyn ReceiveHandler> = Arc::new(Receiver::new(Arc::downgrade(inner)));
        let local = inner.pdp.local_data();
        let locators: Vec<Locator> = local
            .metatraffic_multicast
            .iter()
            .chain(&local.metatraffic_unicast)
            .chain(&inner.user_unicast)
            .copied()
            .collect();
        for locator in locators {
            inner
                .transport
                .open_input_channel(&locator, Arc::clone(&handler))
                .map_err(|e| Error::TransportError(format!("open {}: {}", locator, e)))?;
            inner.channels.lock().push(locator);
        }
        Ok(())
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn guid(&self) -> GUID {
        GUID::new(self.inner.prefix, EntityId::PARTICIPANT)
    }

    pub fn guid_prefix(&self) -> GuidPrefix {
        self.inner.prefix
    }

    pub fn domain_id(&self) -> u32 {
        self.inner.config.domain_id
    }

    pub fn config(&self) -> &ParticipantConfig {
        &self.inner.config
    }

    pub fn port_mapping(&self) -> PortMapping {
        self.inner.ports
    }

    /// Participants currently known through SPDP.
    pub fn discovered_participants(&self) -> Vec<ParticipantProxyData> {
        self.inner.pdp.participants()
    }

    /// Runs static EDP (endpoints come from an XML file instead of SEDP).
    pub fn is_static_discovery(&self) -> bool {
        self.inner.edp.is_static()
    }

    // ========================================================================
    // Factories
    // ========================================================================

    pub fn create_publisher(&self) -> Publisher {
        self.inner.create_publisher()
    }

    /// # Errors
    ///
    /// [`Error::PreconditionNotMet`] while the publisher still has writers.
    pub fn delete_publisher(&self, publisher: &Publisher) -> Result<()> {
        self.inner.delete_publisher(&publisher.guid.entity_id)
    }

    pub fn create_subscriber(&self) -> Subscriber {
        self.inner.create_subscriber()
    }

    /// # Errors
    ///
    /// [`Error::PreconditionNotMet`] while the subscriber still has readers.
    pub fn delete_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        self.inner.delete_subscriber(&subscriber.guid.entity_id)
    }

    /// Create a writer under the implicit default publisher.
    pub fn create_writer<T: TopicType>(&self, topic: &str, qos: QoS) -> Result<DataWriter<T>> {
        let publisher = self.inner.default_publisher();
        self.inner.create_writer(publisher, topic, qos)
    }

    /// Create a reader under the implicit default subscriber.
    pub fn create_reader<T: TopicType>(&self, topic: &str, qos: QoS) -> Result<DataReader<T>> {
        let subscriber = self.inner.default_subscriber();
        self.inner.create_reader(subscriber, topic, qos)
    }

    pub fn delete_writer<T: TopicType>(&self, writer: &DataWriter<T>) -> Result<()> {
        self.inner.delete_writer(&writer.guid().entity_id, None)
    }

    pub fn delete_reader<T: TopicType>(&self, reader: &DataReader<T>) -> Result<()> {
        self.inner.delete_reader(&reader.guid().entity_id, None)
    }

    // ========================================================================
    // Listeners & liveliness
    // ========================================================================

    /// Participant-level listener, the last level of both cascades.
    pub fn set_listener<L: DomainParticipantListener + 'static>(
        &self,
        listener: Arc<L>,
        mask: StatusMask,
    ) {
        attach(
            &self.inner.listeners.writer,
            Some(Arc::clone(&listener) as Arc<dyn DataWriterListener>),
            mask,
        );
        attach(
            &self.inner.listeners.reader,
            Some(listener as Arc<dyn DataReaderListener>),
            mask,
        );
    }

    pub fn clear_listener(&self) {
        self.inner.listeners.writer.store(None);
        self.inner.listeners.reader.store(None);
    }

    /// Assert every MANUAL_BY_PARTICIPANT writer of this participant.
    pub fn assert_liveliness(&self) {
        self.inner.assert_participant_liveliness();
    }
}

impl Drop for DomainParticipant {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

// ============================================================================
// Publisher / Subscriber
// ============================================================================

/// Groups writers and provides the middle level of the writer listener cascade.
pub struct Publisher {
    participant: Weak<Inner>,
    guid: GUID,
    listener: Arc<Slot<dyn DataWriterListener>>,
}

impl Publisher {
    pub fn guid(&self) -> GUID {
        self.guid
    }

    fn participant(&self) -> Result<Arc<Inner>> {
        let inner = self.participant.upgrade().ok_or(Error::AlreadyDeleted)?;
        if !inner.publishers.contains_key(&self.guid.entity_id) {
            return Err(Error::AlreadyDeleted);
        }
        Ok(inner)
    }

    pub fn create_writer<T: TopicType>(&self, topic: &str, qos: QoS) -> Result<DataWriter<T>> {
        self.participant()?
            .create_writer(self.guid.entity_id, topic, qos)
    }

    /// # Errors
    ///
    /// [`Error::PreconditionNotMet`] if the writer was created by another publisher.
    pub fn delete_writer<T: TopicType>(&self, writer: &DataWriter<T>) -> Result<()> {
        self.participant()?
            .delete_writer(&writer.guid().entity_id, Some(&self.guid.entity_id))
    }

    pub fn set_listener<L: PublisherListener + 'static>(&self, listener: Arc<L>, mask: StatusMask) {
        attach(
            &self.listener,
            Some(listener as Arc<dyn DataWriterListener>),
            mask,
        );
    }

    pub fn clear_listener(&self) {
        self.listener.store(None);
    }
}

/// Groups readers and provides the middle level of the reader listener cascade.
pub struct Subscriber {
    participant: Weak<Inner>,
    guid: GUID,
    listeners: Arc<SubscriberSlots>,
}

impl Subscriber {
    pub fn guid(&self) -> GUID {
        self.guid
    }

    fn participant(&self) -> Result<Arc<Inner>> {
        let inner = self.participant.upgrade().ok_or(Error::AlreadyDeleted)?;
        if !inner.subscribers.contains_key(&self.guid.entity_id) {
            return Err(Error::AlreadyDeleted);
        }
        Ok(inner)
    }

    pub fn create_reader<T: TopicType>(&self, topic: &str, qos: QoS) -> Result<DataReader<T>> {
        self.participant()?
            .create_reader(self.guid.entity_id, topic, qos)
    }

    /// # Errors
    ///
    /// [`Error::PreconditionNotMet`] if the reader was created by another subscriber.
    pub fn delete_reader<T: TopicType>(&self, reader: &DataReader<T>) -> Result<()> {
        self.participant()?
            .delete_reader(&reader.guid().entity_id, Some(&self.guid.entity_id))
    }

    /// The listener is used for reader statuses and, when `mask` contains
    /// [`StatusMask::DATA_ON_READERS`], replaces per-reader `on_data_available`.
    pub fn set_listener<L: SubscriberListener + 'static>(&self, listener: Arc<L>, mask: StatusMask) {
        attach(
            &self.listeners.reader,
            Some(Arc::clone(&listener) as Arc<dyn DataReaderListener>),
            mask,
        );
        attach(
            &self.listeners.on_readers,
            Some(listener as Arc<dyn SubscriberListener>),
            mask,
        );
    }

    pub fn clear_listener(&self) {
        self.listeners.reader.store(None);
        self.listeners.on_readers.store(None);
    }
}

#[cfg(test)]
mod tests;
