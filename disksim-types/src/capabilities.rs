// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::error::ErrorReason;

/// Operations offered by a region's context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Shrink,
    Extend,
    Delete,
    Format,
    Rename,
    Properties,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Self::Create,
        Self::Shrink,
        Self::Extend,
        Self::Delete,
        Self::Format,
        Self::Rename,
        Self::Properties,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Shrink => "shrink",
            Self::Extend => "extend",
            Self::Delete => "delete",
            Self::Format => "format",
            Self::Rename => "rename",
            Self::Properties => "properties",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedOperation {
    pub operation: Operation,
    pub reason: ErrorReason,
    pub message: String,
}

/// Capability set for menu gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Capabilities {
    pub supported: Vec<Operation>,
    pub blocked: Vec<BlockedOperation>,
}

impl Capabilities {
    pub fn is_supported(&self, operation: Operation) -> bool {
        self.supported.contains(&operation)
    }

    pub fn blocked_reason(&self, operation: Operation) -> Option<ErrorReason> {
        self.blocked
            .iter()
            .find(|entry| entry.operation == operation)
            .map(|entry| entry.reason)
    }

    pub fn blocked_message(&self, operation: Operation) -> Option<&str> {
        self.blocked
            .iter()
            .find(|entry| entry.operation == operation)
            .map(|entry| entry.message.as_str())
    }

    pub fn is_allowed(&self, operation: Operation) -> bool {
        self.is_supported(operation) && self.blocked_reason(operation).is_none()
    }

    pub fn block(&mut self, operation: Operation, reason: ErrorReason, message: impl Into<String>) {
        self.blocked.push(BlockedOperation {
            operation,
            reason,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_operations_are_not_allowed() {
        let mut caps = Capabilities {
            supported: vec![Operation::Extend, Operation::Delete],
            blocked: Vec::new(),
        };
        caps.block(
            Operation::Extend,
            ErrorReason::NoAdjacentUnallocated,
            "no free space to the right",
        );

        assert!(caps.is_supported(Operation::Extend));
        assert!(!caps.is_allowed(Operation::Extend));
        assert!(caps.is_allowed(Operation::Delete));
        assert!(!caps.is_allowed(Operation::Rename));
        assert_eq!(
            caps.blocked_reason(Operation::Extend),
            Some(ErrorReason::NoAdjacentUnallocated)
        );
        assert_eq!(
            caps.blocked_message(Operation::Extend),
            Some("no free space to the right")
        );
    }

    #[test]
    fn serde_roundtrip_capabilities() {
        let mut caps = Capabilities {
            supported: Operation::ALL.to_vec(),
            blocked: Vec::new(),
        };
        caps.block(Operation::Delete, ErrorReason::ExtendedPartitionOccupied, "occupied");
        let json = serde_json::to_string(&caps).expect("serialize caps");
        let parsed: Capabilities = serde_json::from_str(&json).expect("deserialize caps");
        assert_eq!(parsed, caps);
    }
}
