// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use disksim_types::{FileSystem, PartitionType, RegionId, Side};

/// Parameters of a create command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Drive letter or label. The next free drive letter is used when empty;
    /// ignored for extended partitions.
    #[serde(default)]
    pub name: Option<String>,
    pub size_mb: u64,
    #[serde(default)]
    pub partition_type: PartitionType,
    /// Gap to carve from; defaults to the largest suitable one.
    #[serde(default)]
    pub target: Option<RegionId>,
    #[serde(default)]
    pub file_system: Option<FileSystem>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, size_mb: u64, partition_type: PartitionType) -> Self {
        Self {
            name: Some(name.into()),
            size_mb,
            partition_type,
            target: None,
            file_system: None,
        }
    }

    pub fn extended(size_mb: u64) -> Self {
        Self {
            name: None,
            size_mb,
            partition_type: PartitionType::Extended,
            target: None,
            file_system: None,
        }
    }

    pub fn in_gap(mut self, target: impl Into<RegionId>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_file_system(mut self, file_system: FileSystem) -> Self {
        self.file_system = Some(file_system);
        self
    }
}

/// A table mutation. Regions are addressed by reference: id, name or
/// the literal `Extended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Create(CreateRequest),
    Shrink {
        target: String,
        amount_mb: u64,
        #[serde(default)]
        side: Side,
    },
    Extend {
        target: String,
        amount_mb: u64,
        #[serde(default)]
        side: Side,
    },
    Delete {
        target: String,
    },
    Format {
        target: String,
        #[serde(default)]
        file_system: Option<FileSystem>,
    },
    Rename {
        target: String,
        name: String,
    },
    Reset,
}

impl Command {
    /// Short verb used in logs.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Shrink { .. } => "shrink",
            Self::Extend { .. } => "extend",
            Self::Delete { .. } => "delete",
            Self::Format { .. } => "format",
            Self::Rename { .. } => "rename",
            Self::Reset => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_with_tag() {
        let command = Command::Shrink {
            target: "C:".to_string(),
            amount_mb: 20480,
            side: Side::Right,
        };
        let json = serde_json::to_string(&command).expect("serialize command");
        assert!(json.contains("\"command\":\"shrink\""));
        let parsed: Command = serde_json::from_str(&json).expect("deserialize command");
        assert_eq!(parsed, command);
    }

    #[test]
    fn create_defaults_fill_in() {
        let command: Command =
            serde_json::from_str(r#"{"command":"create","size_mb":1024}"#).expect("parse");
        let Command::Create(request) = command else {
            panic!("expected create");
        };
        assert_eq!(request.partition_type, PartitionType::Primary);
        assert_eq!(request.name, None);
        assert_eq!(request.target, None);
    }

    #[test]
    fn extend_side_defaults_to_right() {
        let command: Command =
            serde_json::from_str(r#"{"command":"extend","target":"C:","amount_mb":5}"#)
                .expect("parse");
        assert_eq!(
            command,
            Command::Extend {
                target: "C:".to_string(),
                amount_mb: 5,
                side: Side::Right,
            }
        );
        assert_eq!(command.action(), "extend");
    }
}
