// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! A static discovery file declaring two readers with the same `userId`: the
//! first is kept, the second is rejected, and the entries after it still load.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{config, Indexed};
use hdds_rtps::core::discovery::{DiscoveryError, StaticEndpointKind, StaticTable};
use hdds_rtps::transport::LoopbackNetwork;
use hdds_rtps::{DomainParticipant, EntityId, QoS};
use tempfile::NamedTempFile;

const XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<staticdiscovery>
  <participant>
    <name>static_sub</name>
    <reader>
      <userId>5</userId>
      <topicName>first</topicName>
      <topicDataType>tests::Indexed</topicDataType>
      <topicKind>WITH_KEY</topicKind>
      <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
    </reader>
    <reader>
      <userId>5</userId>
      <topicName>second</topicName>
      <topicDataType>tests::Indexed</topicDataType>
      <topicKind>WITH_KEY</topicKind>
    </reader>
    <writer>
      <userId>6</userId>
      <topicName>third</topicName>
      <topicDataType>tests::Indexed</topicDataType>
      <topicKind>WITH_KEY</topicKind>
    </writer>
  </participant>
</staticdiscovery>
"#;

fn xml_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(XML.as_bytes()).expect("write xml");
    file.flush().expect("flush xml");
    file
}

#[test]
fn test_duplicate_user_id_is_rejected_and_loading_continues() {
    let file = xml_file();
    let table = StaticTable::from_file(file.path()).expect("document parses");

    let endpoints = table.endpoints();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].user_id, 5);
    assert_eq!(endpoints[0].topic_name, "first");
    assert_eq!(endpoints[0].kind, StaticEndpointKind::Reader);
    assert_eq!(endpoints[1].user_id, 6);
    assert_eq!(endpoints[1].kind, StaticEndpointKind::Writer);

    assert_eq!(table.rejected(), &[DiscoveryError::DuplicateId { id: 5 }]);
}

#[test]
fn test_rejected_reader_is_not_a_declared_endpoint() {
    let file = xml_file();
    let network = LoopbackNetwork::new();
    let participant = DomainParticipant::new(
        config("static_sub", 0).static_edp_xml(file.path()),
        Arc::new(network.transport()),
    )
    .expect("participant");
    assert!(participant.is_static_discovery());

    let first = participant
        .create_reader::<Indexed>("first", QoS::reliable())
        .expect("declared reader");
    assert_eq!(first.guid().entity_id, EntityId::from_key(5, 0x07));

    // Not in the table: it still gets created, under an automatic id.
    let second = participant
        .create_reader::<Indexed>("second", QoS::best_effort())
        .expect("undeclared reader");
    assert_ne!(second.guid().entity_id, EntityId::from_key(5, 0x07));
    assert_ne!(second.guid().entity_id, first.guid().entity_id);
}
