// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static endpoint discovery from an XML description.
//!
//! ```xml
//! <staticdiscovery>
//!   <participant>
//!     <name>HelloWorldSubscriber</name>
//!     <reader>
//!       <userId>3</userId>
//!       <entityID>4</entityID>
//!       <topicName>HelloWorldTopic</topicName>
//!       <topicDataType>HelloWorld</topicDataType>
//!       <topicKind>WITH_KEY</topicKind>
//!       <unicastLocator address="192.168.0.128" port="5000"/>
//!       <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
//!       <durabilityQos>VOLATILE_DURABILITY_QOS</durabilityQos>
//!       <livelinessQos kind="AUTOMATIC_LIVELINESS_QOS" leaseDuration_ms="1000"/>
//!     </reader>
//!   </participant>
//! </staticdiscovery>
//! ```
//!
//! `userId` and `entityID` must be positive and unique across the whole file.
//! An endpoint that breaks a rule is logged and skipped; the rest of the file
//! still loads. Only a document that is not XML at all fails the load.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use roxmltree::{Document, Node};

use super::data::{ReaderProxyData, WriterProxyData};
use super::{DiscoveryError, DiscoveryResult};
use crate::core::guid::{entity_kind, EntityId, GuidPrefix, GUID};
use crate::core::time::DURATION_INFINITE;
use crate::qos::{Durability, Liveliness, LivelinessKind, OwnershipKind, Partition, QoS, Reliability};
use crate::transport::Locator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticEndpointKind {
    Reader,
    Writer,
}

/// One endpoint declared in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEndpoint {
    pub participant_name: String,
    pub kind: StaticEndpointKind,
    pub user_id: i64,
    pub entity_id: EntityId,
    pub topic_name: String,
    pub type_name: String,
    pub qos: QoS,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub expects_inline_qos: bool,
}

impl StaticEndpoint {
    pub fn is_keyed(&self) -> bool {
        self.entity_id.is_keyed()
    }

    pub fn guid(&self, prefix: GuidPrefix) -> GUID {
        GUID::new(prefix, self.entity_id)
    }

    /// Proxy data for this writer living in participant `prefix`.
    pub fn writer_data(&self, prefix: GuidPrefix) -> WriterProxyData {
        let mut data = WriterProxyData::new(
            self.guid(prefix),
            &self.topic_name,
            &self.type_name,
            self.qos.clone(),
        );
        data.unicast_locators = self.unicast_locators.clone();
        data.multicast_locators = self.multicast_locators.clone();
        data
    }

    /// Proxy data for this reader living in participant `prefix`.
    pub fn reader_data(&self, prefix: GuidPrefix) -> ReaderProxyData {
        let mut data = ReaderProxyData::new(
            self.guid(prefix),
            &self.topic_name,
            &self.type_name,
            self.qos.clone(),
        );
        data.unicast_locators = self.unicast_locators.clone();
        data.multicast_locators = self.multicast_locators.clone();
        data.expects_inline_qos = self.expects_inline_qos;
        data
    }
}

/// Every endpoint accepted from one XML file.
#[derive(Debug, Default, Clone)]
pub struct StaticTable {
    endpoints: Vec<StaticEndpoint>,
    rejected: Vec<DiscoveryError>,
}

impl StaticTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> DiscoveryResult<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|e| {
            log::error!("[static-edp] {}: bad file ({})", path.display(), e);
            DiscoveryError::ParseFailed {
                reason: format!("{}: {}", path.display(), e),
            }
        })?;
        Self::from_xml_str(&xml)
    }

    pub fn from_xml_str(xml: &str) -> DiscoveryResult<Self> {
        let doc = Document::parse(xml).map_err(|e| {
            log::error!("[static-edp] XML has errors: {}", e);
            DiscoveryError::ParseFailed {
                reason: e.to_string(),
            }
        })?;

        let mut loader = Loader::default();
        let root = doc.root_element();
        let participants: Vec<Node<'_, '_>> = if root.has_tag_name("participant") {
            vec![root]
        } else {
            root.descendants()
                .filter(|n| n.has_tag_name("participant"))
                .collect()
        };
        for participant in participants {
            loader.participant(participant);
        }

        log::debug!(
            "[static-edp] loaded {} endpoints, {} rejected",
            loader.table.endpoints.len(),
            loader.table.rejected.len()
        );
        Ok(loader.table)
    }

    pub fn endpoints(&self) -> &[StaticEndpoint] {
        &self.endpoints
    }

    /// Errors of the entries that were skipped, in file order.
    pub fn rejected(&self) -> &[DiscoveryError] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints_of<'a>(
        &'a self,
        participant_name: &'a str,
    ) -> impl Iterator<Item = &'a StaticEndpoint> + 'a {
        self.endpoints
            .iter()
            .filter(move |e| e.participant_name == participant_name)
    }

    /// Declaration for a local endpoint about to be created.
    pub fn find(
        &self,
        participant_name: &str,
        kind: StaticEndpointKind,
        topic_name: &str,
        used: &HashSet<EntityId>,
    ) -> Option<&StaticEndpoint> {
        self.endpoints.iter().find(|e| {
            e.participant_name == participant_name
                && e.kind == kind
                && e.topic_name == topic_name
                && !used.contains(&e.entity_id)
        })
    }
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Default)]
struct Loader {
    table: StaticTable,
    user_ids: HashSet<i64>,
    entity_ids: HashSet<i64>,
}

impl Loader {
    fn participant(&mut self, node: Node<'_, '_>) {
        let name = node
            .children()
            .find(|n| n.has_tag_name("name"))
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string());
        let Some(name) = name else {
            self.reject(DiscoveryError::InvalidData {
                reason: "participant without <name>".into(),
            });
            return;
        };

        for child in node.children().filter(Node::is_element) {
            let kind = match child.tag_name().name() {
                "reader" => StaticEndpointKind::Reader,
                "writer" => StaticEndpointKind::Writer,
                "name" => continue,
                other => {
                    log::warn!("[static-edp] unknown participant tag <{}>, ignoring", other);
                    continue;
                }
            };
            match self.endpoint(&name, kind, child) {
                Ok(endpoint) => {
                    log::debug!(
                        "[static-edp] {} {:?} userId={} entity={:?} topic '{}'",
                        endpoint.participant_name,
                        endpoint.kind,
                        endpoint.user_id,
                        endpoint.entity_id,
                        endpoint.topic_name
                    );
                    self.table.endpoints.push(endpoint);
                }
                Err(e) => self.reject(e),
            }
        }
    }

    fn reject(&mut self, error: DiscoveryError) {
        log::error!("[static-edp] endpoint has error, ignoring: {}", error);
        self.table.rejected.push(error);
    }

    fn endpoint(
        &mut self,
        participant: &str,
        kind: StaticEndpointKind,
        node: Node<'_, '_>,
    ) -> DiscoveryResult<StaticEndpoint> {
        let mut user_id: Option<i64> = None;
        let mut entity_key: Option<i64> = None;
        let mut keyed = false;
        let mut topic_name = String::new();
        let mut type_name = String::new();
        let mut expects_inline_qos = false;
        let mut partitions = Vec::new();
        let mut unicast_locators = Vec::new();
        let mut multicast_locators = Vec::new();
        let mut qos = match kind {
            StaticEndpointKind::Writer => QoS::reliable(),
            StaticEndpointKind::Reader => QoS::best_effort(),
        };

        for child in node.children().filter(Node::is_element) {
            let text = child.text().map(str::trim).unwrap_or("");
            match child.tag_name().name() {
                "userId" => user_id = Some(parse_id(text)?),
                "entityID" => entity_key = Some(parse_id(text)?),
                "expectsInlineQos" => {
                    expects_inline_qos = match text {
                        "true" => true,
                        "false" => false,
                        other => return Err(bad_value("expectsInlineQos", other)),
                    }
                }
                "topicName" => topic_name = text.to_string(),
                "topicDataType" => type_name = text.to_string(),
                "topicKind" => keyed = parse_topic_kind(text)?,
                "topic" => {
                    topic_name = child.attribute("name").unwrap_or_default().to_string();
                    type_name = child.attribute("dataType").unwrap_or_default().to_string();
                    keyed = parse_topic_kind(child.attribute("kind").unwrap_or_default())?;
                }
                "partitionQos" => partitions.push(text.to_string()),
                "unicastLocator" => unicast_locators.push(parse_locator(child)?),
                "multicastLocator" => multicast_locators.push(parse_locator(child)?),
                "reliabilityQos" => {
                    qos.reliability = match text {
                        "RELIABLE_RELIABILITY_QOS" => Reliability::Reliable,
                        "BEST_EFFORT_RELIABILITY_QOS" => Reliability::BestEffort,
                        other => return Err(bad_value("reliabilityQos", other)),
                    }
                }
                "durabilityQos" => {
                    qos.durability = match text {
                        "VOLATILE_DURABILITY_QOS" => Durability::Volatile,
                        "TRANSIENT_LOCAL_DURABILITY_QOS" => Durability::TransientLocal,
                        "TRANSIENT_DURABILITY_QOS" => Durability::Transient,
                        "PERSISTENT_DURABILITY_QOS" => Durability::Persistent,
                        other => return Err(bad_value("durabilityQos", other)),
                    }
                }
                "ownershipQos" => {
                    qos.ownership.kind = match child.attribute("kind").unwrap_or_default() {
                        "SHARED_OWNERSHIP_QOS" => OwnershipKind::Shared,
                        "EXCLUSIVE_OWNERSHIP_QOS" => OwnershipKind::Exclusive,
                        other => return Err(bad_value("ownershipQos", other)),
                    }
                }
                "livelinessQos" => qos.liveliness = parse_liveliness(child)?,
                other => {
                    log::warn!("[static-edp] unknown endpoint tag <{}>, ignoring", other);
                }
            }
        }

        let user_id = user_id.ok_or_else(|| DiscoveryError::InvalidData {
            reason: format!("{:?} endpoint of '{}' with no userId", kind, participant),
        })?;
        if topic_name.is_empty() || type_name.is_empty() {
            return Err(DiscoveryError::InvalidData {
                reason: format!("endpoint userId={} has no topic or type name", user_id),
            });
        }
        // Without an explicit entityID the userId doubles as the entity key.
        let entity_key = entity_key.unwrap_or(user_id);
        if self.user_ids.contains(&user_id) {
            return Err(DiscoveryError::DuplicateId { id: user_id });
        }
        if self.entity_ids.contains(&entity_key) {
            return Err(DiscoveryError::DuplicateId { id: entity_key });
        }
        let key = u32::try_from(entity_key)
            .ok()
            .filter(|k| *k <= 0x00FF_FFFF)
            .ok_or(DiscoveryError::InvalidId { id: entity_key })?;
        self.user_ids.insert(user_id);
        self.entity_ids.insert(entity_key);

        let kind_byte = match (kind, keyed) {
            (StaticEndpointKind::Reader, true) => entity_kind::READER_WITH_KEY,
            (StaticEndpointKind::Reader, false) => entity_kind::READER_NO_KEY,
            (StaticEndpointKind::Writer, true) => entity_kind::WRITER_WITH_KEY,
            (StaticEndpointKind::Writer, false) => entity_kind::WRITER_NO_KEY,
        };
        if !partitions.is_empty() {
            qos.partition = Partition::new(partitions);
        }

        Ok(StaticEndpoint {
            participant_name: participant.to_string(),
            kind,
            user_id,
            entity_id: EntityId::from_key(key, kind_byte),
            topic_name,
            type_name,
            qos,
            unicast_locators,
            multicast_locators,
            expects_inline_qos,
        })
    }
}

fn parse_id(text: &str) -> DiscoveryResult<i64> {
    let id: i64 = text.parse().map_err(|_| DiscoveryError::ParseFailed {
        reason: format!("'{}' is not an integer id", text),
    })?;
    if id <= 0 {
        return Err(DiscoveryError::InvalidId { id });
    }
    Ok(id)
}

fn parse_topic_kind(text: &str) -> DiscoveryResult<bool> {
    match text {
        "WITH_KEY" => Ok(true),
        "NO_KEY" => Ok(false),
        other => Err(bad_value("topicKind", other)),
    }
}

fn parse_locator(node: Node<'_, '_>) -> DiscoveryResult<Locator> {
    let address = node.attribute("address").unwrap_or("0.0.0.0");
    let ip: Ipv4Addr = address
        .parse()
        .map_err(|_| bad_value("locator address", address))?;
    let port_text = node.attribute("port").unwrap_or("0");
    let port: u32 = port_text
        .parse()
        .map_err(|_| bad_value("locator port", port_text))?;
    Ok(Locator::udpv4(ip.octets(), port))
}

fn parse_liveliness(node: Node<'_, '_>) -> DiscoveryResult<Liveliness> {
    let kind = match node.attribute("kind").unwrap_or_default() {
        "AUTOMATIC_LIVELINESS_QOS" => LivelinessKind::Automatic,
        "MANUAL_BY_PARTICIPANT_LIVELINESS_QOS" => LivelinessKind::ManualByParticipant,
        "MANUAL_BY_TOPIC_LIVELINESS_QOS" => LivelinessKind::ManualByTopic,
        other => return Err(bad_value("livelinessQos kind", other)),
    };
    let lease = match node.attribute("leaseDuration_ms") {
        None | Some("INF") => DURATION_INFINITE,
        Some(ms) => {
            let ms: u64 = ms
                .parse()
                .map_err(|_| bad_value("livelinessQos leaseDuration_ms", ms))?;
            if ms == 0 {
                log::warn!("[static-edp] livelinessQos leaseDuration is 0");
            }
            Duration::from_millis(ms)
        }
    };
    Ok(Liveliness::new(kind, lease))
}

fn bad_value(field: &str, value: &str) -> DiscoveryError {
    DiscoveryError::InvalidData {
        reason: format!("{} '{}' is not valid", field, value),
    }
}
