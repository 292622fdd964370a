// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PARTITION QoS policy (DDS v1.4 Sec.2.2.3.13)
//!
//! Writers and readers communicate only if their partitions intersect. An empty list
//! is the default partition and only intersects another default partition.
//! A partition mismatch is a silent filter: no incompatible-QoS status is raised.
//!
//! # Examples
//!
//! ```
//! use hdds_rtps::qos::partition::Partition;
//!
//! let writer = Partition::new(vec!["sensor".to_string(), "actuator".to_string()]);
//! let reader = Partition::single("actuator");
//! assert!(writer.intersects(&reader));
//! ```

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    /// Empty list = default partition
    pub names: Vec<String>,
}

impl Partition {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn single(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn is_default(&self) -> bool {
        self.names.is_empty()
    }

    pub fn intersects(&self, other: &Partition) -> bool {
        if self.is_default() || other.is_default() {
            return self.is_default() && other.is_default();
        }
        self.names.iter().any(|n| other.names.contains(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_partitions() {
        assert!(Partition::default().intersects(&Partition::default()));
        assert!(!Partition::default().intersects(&Partition::single("a")));
        assert!(!Partition::single("a").intersects(&Partition::default()));
    }

    #[test]
    fn test_intersection_case_sensitive() {
        assert!(Partition::single("a").intersects(&Partition::single("a")));
        assert!(!Partition::single("a").intersects(&Partition::single("A")));
    }
}
