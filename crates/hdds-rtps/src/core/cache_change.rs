// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CacheChange: one versioned sample held by a writer or reader history.

use std::sync::Arc;

use crate::core::guid::{InstanceHandle, GUID};
use crate::core::time::Timestamp;
use crate::protocol::constants::{STATUS_INFO_DISPOSED, STATUS_INFO_UNREGISTERED};

/// RTPS sequence number. Valid values start at 1; 0 means "unknown".
pub type SequenceNumber = u64;

pub const SEQUENCENUMBER_UNKNOWN: SequenceNumber = 0;

/// What a change does to its instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChangeKind {
    #[default]
    Alive,
    NotAliveDisposed,
    NotAliveUnregistered,
    NotAliveDisposedUnregistered,
}

impl ChangeKind {
    pub fn is_alive(self) -> bool {
        self == ChangeKind::Alive
    }

    pub fn is_disposed(self) -> bool {
        matches!(
            self,
            ChangeKind::NotAliveDisposed | ChangeKind::NotAliveDisposedUnregistered
        )
    }

    pub fn is_unregistered(self) -> bool {
        matches!(
            self,
            ChangeKind::NotAliveUnregistered | ChangeKind::NotAliveDisposedUnregistered
        )
    }

    /// PID_STATUS_INFO flags; `None` for ALIVE.
    pub fn to_status_info(self) -> Option<u32> {
        match self {
            ChangeKind::Alive => None,
            ChangeKind::NotAliveDisposed => Some(STATUS_INFO_DISPOSED),
            ChangeKind::NotAliveUnregistered => Some(STATUS_INFO_UNREGISTERED),
            ChangeKind::NotAliveDisposedUnregistered => {
                Some(STATUS_INFO_DISPOSED | STATUS_INFO_UNREGISTERED)
            }
        }
    }

    pub fn from_status_info(flags: u32) -> Self {
        let disposed = flags & STATUS_INFO_DISPOSED != 0;
        let unregistered = flags & STATUS_INFO_UNREGISTERED != 0;
        match (disposed, unregistered) {
            (false, false) => ChangeKind::Alive,
            (true, false) => ChangeKind::NotAliveDisposed,
            (false, true) => ChangeKind::NotAliveUnregistered,
            (true, true) => ChangeKind::NotAliveDisposedUnregistered,
        }
    }
}

/// (writer GUID, sequence number): the identity of a change across the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SampleIdentity {
    pub writer_guid: GUID,
    pub sequence_number: SequenceNumber,
}

impl SampleIdentity {
    pub fn new(writer_guid: GUID, sequence_number: SequenceNumber) -> Self {
        Self {
            writer_guid,
            sequence_number,
        }
    }
}

/// One sample. `payload` carries the encapsulation header followed by the CDR body
/// (or the serialized key for dispose/unregister changes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheChange {
    pub kind: ChangeKind,
    pub writer_guid: GUID,
    pub sequence_number: SequenceNumber,
    pub instance_handle: InstanceHandle,
    pub source_timestamp: Timestamp,
    pub payload: Arc<[u8]>,
    pub related_sample_identity: Option<SampleIdentity>,
}

impl CacheChange {
    pub fn new(
        kind: ChangeKind,
        writer_guid: GUID,
        sequence_number: SequenceNumber,
        instance_handle: InstanceHandle,
        payload: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            kind,
            writer_guid,
            sequence_number,
            instance_handle,
            source_timestamp: Timestamp::now(),
            payload: payload.into(),
            related_sample_identity: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, ts: Timestamp) -> Self {
        self.source_timestamp = ts;
        self
    }

    pub fn identity(&self) -> SampleIdentity {
        SampleIdentity::new(self.writer_guid, self.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_info_mapping() {
        for kind in [
            ChangeKind::NotAliveDisposed,
            ChangeKind::NotAliveUnregistered,
            ChangeKind::NotAliveDisposedUnregistered,
        ] {
            let flags = kind.to_status_info().unwrap();
            assert_eq!(ChangeKind::from_status_info(flags), kind);
        }
        assert_eq!(ChangeKind::Alive.to_status_info(), None);
        assert_eq!(ChangeKind::from_status_info(0), ChangeKind::Alive);
        assert!(ChangeKind::NotAliveDisposedUnregistered.is_disposed());
        assert!(ChangeKind::NotAliveDisposedUnregistered.is_unregistered());
    }

    #[test]
    fn test_identity() {
        let c = CacheChange::new(
            ChangeKind::Alive,
            GUID::zero(),
            7,
            InstanceHandle::NIL,
            vec![0u8, 1, 0, 0],
        );
        assert_eq!(c.identity(), SampleIdentity::new(GUID::zero(), 7));
        assert_eq!(&*c.payload, &[0, 1, 0, 0]);
    }
}
