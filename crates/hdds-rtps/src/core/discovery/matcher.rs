// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS compatibility checking (RxO - Request vs Offered).
//!
//! | Policy      | Rule                                                      |
//! |-------------|-----------------------------------------------------------|
//! | Reliability | Writer >= Reader (Reliable > BestEffort)                  |
//! | Durability  | Writer >= Reader (Persistent > Transient > TransientLocal > Volatile) |
//! | Deadline    | Writer period <= Reader period                            |
//! | Ownership   | Must match exactly                                        |
//! | Liveliness  | Writer kind >= Reader kind, writer lease <= reader lease  |
//!
//! Partition is not an RxO policy: endpoints without a common partition simply do
//! not see each other, and no incompatibility is reported.

use super::data::{ReaderProxyData, WriterProxyData};
use crate::qos::{QoS, QosPolicyId, Reliability};

/// Outcome of pairing one writer with one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Compatible,
    /// Different topic, type or partition: not a candidate at all.
    Unrelated,
    /// Candidate with an RxO violation on this policy.
    Incompatible(QosPolicyId),
}

/// First failing RxO policy of `offered` (writer) against `requested` (reader).
pub fn check_compatibility(offered: &QoS, requested: &QoS) -> Result<(), QosPolicyId> {
    if offered.reliability == Reliability::BestEffort
        && requested.reliability == Reliability::Reliable
    {
        log::debug!(
            "[MATCH-QOS] Reliability mismatch (writer={:?}, reader={:?})",
            offered.reliability,
            requested.reliability
        );
        return Err(QosPolicyId::Reliability);
    }

    if offered.durability < requested.durability {
        log::debug!(
            "[MATCH-QOS] Durability mismatch (writer={:?}, reader={:?})",
            offered.durability,
            requested.durability
        );
        return Err(QosPolicyId::Durability);
    }

    if !offered.deadline.is_compatible_with(&requested.deadline) {
        log::debug!(
            "[MATCH-QOS] Deadline mismatch (writer={:?}, reader={:?})",
            offered.deadline.period,
            requested.deadline.period
        );
        return Err(QosPolicyId::Deadline);
    }

    if !offered.ownership.is_compatible_with(&requested.ownership) {
        log::debug!(
            "[MATCH-QOS] Ownership mismatch (writer={:?}, reader={:?})",
            offered.ownership.kind,
            requested.ownership.kind
        );
        return Err(QosPolicyId::Ownership);
    }

    if !offered.liveliness.is_compatible_with(&requested.liveliness) {
        log::debug!(
            "[MATCH-QOS] Liveliness mismatch (writer={:?}, reader={:?})",
            offered.liveliness,
            requested.liveliness
        );
        return Err(QosPolicyId::Liveliness);
    }

    Ok(())
}

/// Full pairing check: topic, type, partition, then QoS.
pub fn match_endpoints(writer: &WriterProxyData, reader: &ReaderProxyData) -> MatchResult {
    if writer.topic_name != reader.topic_name || writer.type_name != reader.type_name {
        return MatchResult::Unrelated;
    }
    if !writer.qos.partition.intersects(&reader.qos.partition) {
        log::trace!(
            "[MATCH-QOS] no common partition on '{}' ({} / {})",
            writer.topic_name,
            writer.guid,
            reader.guid
        );
        return MatchResult::Unrelated;
    }
    match check_compatibility(&writer.qos, &reader.qos) {
        Ok(()) => MatchResult::Compatible,
        Err(policy) => MatchResult::Incompatible(policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::{entity_kind, EntityId, GUID};
    use std::time::Duration;

    fn writer(topic: &str, qos: QoS) -> WriterProxyData {
        let guid = GUID::new([1; 12], EntityId::from_key(1, entity_kind::WRITER_NO_KEY));
        WriterProxyData::new(guid, topic, "T", qos)
    }

    fn reader(topic: &str, qos: QoS) -> ReaderProxyData {
        let guid = GUID::new([2; 12], EntityId::from_key(1, entity_kind::READER_NO_KEY));
        ReaderProxyData::new(guid, topic, "T", qos)
    }

    #[test]
    fn test_reliability_rule() {
        assert_eq!(
            check_compatibility(&QoS::best_effort(), &QoS::reliable()),
            Err(QosPolicyId::Reliability)
        );
        assert!(check_compatibility(&QoS::reliable(), &QoS::best_effort()).is_ok());
        assert!(check_compatibility(&QoS::reliable(), &QoS::reliable()).is_ok());
    }

    #[test]
    fn test_durability_ordering() {
        let offered = QoS::reliable().transient_local();
        assert!(check_compatibility(&offered, &QoS::reliable().volatile()).is_ok());
        assert!(check_compatibility(&offered, &QoS::reliable().transient_local()).is_ok());
        assert_eq!(
            check_compatibility(&offered, &QoS::reliable().transient()),
            Err(QosPolicyId::Durability)
        );
        assert!(check_compatibility(&QoS::reliable().persistent(), &QoS::reliable().transient()).is_ok());
    }

    #[test]
    fn test_first_failing_policy_wins() {
        // Reliability and durability both fail; reliability is checked first.
        let offered = QoS::best_effort().volatile();
        let requested = QoS::reliable().transient_local();
        assert_eq!(
            check_compatibility(&offered, &requested),
            Err(QosPolicyId::Reliability)
        );
    }

    #[test]
    fn test_deadline_ownership_liveliness() {
        let slow = QoS::reliable().deadline(Duration::from_millis(200));
        let fast = QoS::reliable().deadline(Duration::from_millis(100));
        assert_eq!(check_compatibility(&slow, &fast), Err(QosPolicyId::Deadline));
        assert!(check_compatibility(&fast, &slow).is_ok());

        assert_eq!(
            check_compatibility(&QoS::reliable(), &QoS::reliable().ownership_exclusive()),
            Err(QosPolicyId::Ownership)
        );

        let auto_writer = QoS::reliable().liveliness_automatic(Duration::from_secs(1));
        let manual_reader = QoS::reliable().liveliness_manual_topic(Duration::from_secs(1));
        assert_eq!(
            check_compatibility(&auto_writer, &manual_reader),
            Err(QosPolicyId::Liveliness)
        );
        let long_lease = QoS::reliable().liveliness_manual_topic(Duration::from_secs(5));
        assert!(check_compatibility(&long_lease, &QoS::reliable().liveliness_automatic(Duration::from_secs(10))).is_ok());
        assert_eq!(
            check_compatibility(
                &long_lease,
                &QoS::reliable().liveliness_automatic(Duration::from_secs(2))
            ),
            Err(QosPolicyId::Liveliness)
        );
    }

    #[test]
    fn test_match_endpoints_filters_before_qos() {
        let w = writer("A", QoS::best_effort());
        assert_eq!(
            match_endpoints(&w, &reader("B", QoS::reliable())),
            MatchResult::Unrelated
        );
        assert_eq!(
            match_endpoints(&w, &reader("A", QoS::reliable())),
            MatchResult::Incompatible(QosPolicyId::Reliability)
        );
        assert_eq!(
            match_endpoints(&w, &reader("A", QoS::best_effort())),
            MatchResult::Compatible
        );
    }

    #[test]
    fn test_partition_is_silent() {
        let w = writer("A", QoS::best_effort().partition("left"));
        let r = reader("A", QoS::reliable().partition("right"));
        assert_eq!(match_endpoints(&w, &r), MatchResult::Unrelated);

        let mut typed = reader("A", QoS::best_effort().partition("left"));
        typed.type_name = "Other".into();
        assert_eq!(match_endpoints(&w, &typed), MatchResult::Unrelated);
    }
}
