// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OWNERSHIP QoS policy (DDS v1.4 Sec.2.2.3.9)
//!
//! **Rule:** Writer kind must match Reader kind (exact match required)
//!
//! - Writer SHARED, Reader SHARED -> Compatible \[OK\]
//! - Writer SHARED, Reader EXCLUSIVE -> Incompatible \[X\]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipKind {
    /// Multiple writers can update the same instance (default)
    #[default]
    Shared,
    /// Only the highest-strength writer updates an instance.
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ownership {
    pub kind: OwnershipKind,
}

impl Ownership {
    pub fn shared() -> Self {
        Self {
            kind: OwnershipKind::Shared,
        }
    }

    pub fn exclusive() -> Self {
        Self {
            kind: OwnershipKind::Exclusive,
        }
    }

    pub fn is_compatible_with(&self, requested: &Ownership) -> bool {
        self.kind == requested.kind
    }
}
