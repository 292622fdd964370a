// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Instance lifecycle seen by a remote reader: dispose, and the last writer of an
//! instance going away.

mod common;

use common::{pair, wait_for, Indexed, WAIT};
use hdds_rtps::dds::InstanceState;
use hdds_rtps::transport::LoopbackNetwork;
use hdds_rtps::{Error, QoS};

#[test]
fn test_dispose_reaches_reader_as_invalid_sample() {
    let network = LoopbackNetwork::new();
    let (a, b) = pair(&network);
    let writer = a
        .create_writer::<Indexed>("shapes", QoS::reliable().keep_all())
        .expect("writer");
    let reader = b
        .create_reader::<Indexed>("shapes", QoS::reliable().keep_all())
        .expect("reader");
    assert!(wait_for(WAIT, || writer
        .matched_subscriptions()
        .map_or(false, |m| m.len() == 1)));

    let square = Indexed::new(4, 1);
    let handle = writer.lookup_instance(&square);
    writer.write(&square).expect("write");
    writer.dispose(&square).expect("dispose");
    writer.wait_for_acknowledgments(WAIT).expect("acknowledged");

    assert_eq!(
        reader.instance_state(&handle).expect("state"),
        Some(InstanceState::NotAliveDisposed)
    );
    let samples = reader.read(10).expect("read");
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].data, Some(square));
    assert!(samples[0].info.valid_data);
    assert!(samples[1].data.is_none());
    assert!(!samples[1].info.valid_data);
    assert_eq!(samples[1].info.instance_handle, handle);
    assert_eq!(samples[1].info.instance_state, InstanceState::NotAliveDisposed);
}

#[test]
fn test_deleted_writer_leaves_instance_without_writers() {
    let network = LoopbackNetwork::new();
    let (a, b) = pair(&network);
    let writer = a
        .create_writer::<Indexed>("orphans", QoS::reliable())
        .expect("writer");
    let reader = b
        .create_reader::<Indexed>("orphans", QoS::reliable())
        .expect("reader");
    assert!(wait_for(WAIT, || writer
        .matched_subscriptions()
        .map_or(false, |m| m.len() == 1)));

    let sample = Indexed::new(8, 1);
    let handle = reader.lookup_instance(&sample);
    writer.write(&sample).expect("write");
    writer.wait_for_acknowledgments(WAIT).expect("acknowledged");
    assert_eq!(
        reader.instance_state(&handle).expect("state"),
        Some(InstanceState::Alive)
    );

    a.delete_writer(&writer).expect("delete writer");
    assert!(matches!(writer.write(&sample), Err(Error::AlreadyDeleted)));
    assert!(wait_for(WAIT, || reader
        .matched_publications()
        .map_or(false, |m| m.is_empty())));
    assert_eq!(
        reader.instance_state(&handle).expect("state"),
        Some(InstanceState::NotAliveNoWriters)
    );
}

#[test]
fn test_deleted_endpoints_refuse_every_call() {
    let network = LoopbackNetwork::new();
    let (a, b) = pair(&network);
    let reader = b
        .create_reader::<Indexed>("churn", QoS::reliable())
        .expect("reader");

    for round in 0..20u32 {
        let writer = a
            .create_writer::<Indexed>("churn", QoS::reliable())
            .expect("writer");
        assert!(wait_for(WAIT, || writer
            .matched_subscriptions()
            .map_or(false, |m| m.len() == 1)));
        let sample = Indexed::new(round, u64::from(round));
        writer.write(&sample).expect("write");

        a.delete_writer(&writer).expect("delete writer");
        assert!(
            matches!(writer.write(&sample), Err(Error::AlreadyDeleted)),
            "round {}",
            round
        );
        assert!(matches!(writer.matched_subscriptions(), Err(Error::AlreadyDeleted)));
        assert!(matches!(a.delete_writer(&writer), Err(Error::AlreadyDeleted)));
        assert!(wait_for(WAIT, || reader
            .matched_publications()
            .map_or(false, |m| m.is_empty())));
    }

    b.delete_reader(&reader).expect("delete reader");
    assert!(matches!(reader.take(10), Err(Error::AlreadyDeleted)));
    assert!(matches!(reader.matched_publications(), Err(Error::AlreadyDeleted)));
}
