// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for the integration tests: a keyed sample type, participant
//! configuration tuned for fast discovery, and a polling helper.

#![allow(dead_code)] // Each test binary uses a different subset

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hdds_rtps::transport::LoopbackNetwork;
use hdds_rtps::{DomainParticipant, Error, ParticipantConfig, Result, TopicType};

pub const WAIT: Duration = Duration::from_secs(10);
pub const DOMAIN: u32 = 3;

/// Keyed sample: `id` is the key, `index` the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexed {
    pub id: u32,
    pub index: u64,
}

impl Indexed {
    pub fn new(id: u32, index: u64) -> Self {
        Self { id, index }
    }
}

impl TopicType for Indexed {
    fn type_name() -> &'static str {
        "tests::Indexed"
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.index.to_le_bytes());
        Ok(out)
    }

    fn deserialize(body: &[u8]) -> Result<Self> {
        let id = body
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| Error::SerializationError("Indexed: short id".into()))?;
        let index = body
            .get(8..16)
            .and_then(|b| b.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| Error::SerializationError("Indexed: short index".into()))?;
        Ok(Self { id, index })
    }

    fn has_key() -> bool {
        true
    }

    fn serialize_key(&self) -> Vec<u8> {
        self.id.to_be_bytes().to_vec()
    }
}

pub fn config(name: &str, participant_id: u32) -> ParticipantConfig {
    ParticipantConfig::new(name)
        .domain_id(DOMAIN)
        .participant_id(participant_id)
        .announcement_period(Duration::from_millis(100))
        .lease_duration(Duration::from_secs(3))
}

pub fn participant(network: &Arc<LoopbackNetwork>, name: &str, id: u32) -> DomainParticipant {
    DomainParticipant::new(config(name, id), Arc::new(network.transport()))
        .expect("participant creation")
}

/// Two participants on one bus that already discovered each other.
pub fn pair(network: &Arc<LoopbackNetwork>) -> (DomainParticipant, DomainParticipant) {
    let a = participant(network, "alpha", 0);
    let b = participant(network, "beta", 1);
    assert!(
        wait_for(WAIT, || a.discovered_participants().len() == 1
            && b.discovered_participants().len() == 1),
        "participants did not discover each other"
    );
    (a, b)
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
