// SPDX-License-Identifier: GPL-3.0-only

//! Region model of a simulated MBR-style disk
//!
//! The top level of a disk is an ordered run of [`Region`]s. At most one of
//! them is an [`Extended`] container, whose own ordered run of
//! [`NestedRegion`]s holds the logical drives. Unallocated gaps appear at both
//! levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::filesystem::{FileSystem, VolumeStatus};

/// Stable identifier of a region within one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which edge of a region an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    #[default]
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            other => Err(anyhow::anyhow!("Unknown side: {}", other)),
        }
    }
}

/// Kind of a region as seen by a flattened listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Primary,
    Extended,
    Logical,
    Unallocated,
}

impl RegionKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Primary => "Primary Partition",
            Self::Extended => "Extended Partition",
            Self::Logical => "Logical Drive",
            Self::Unallocated => "Unallocated",
        }
    }

    pub fn is_partition(self) -> bool {
        !matches!(self, Self::Unallocated)
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Partition type requested when creating a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionType {
    #[default]
    Primary,
    Extended,
    Logical,
}

impl PartitionType {
    pub fn kind(self) -> RegionKind {
        match self {
            Self::Primary => RegionKind::Primary,
            Self::Extended => RegionKind::Extended,
            Self::Logical => RegionKind::Logical,
        }
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Extended => f.write_str("extended"),
            Self::Logical => f.write_str("logical"),
        }
    }
}

impl FromStr for PartitionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "extended" => Ok(Self::Extended),
            "logical" => Ok(Self::Logical),
            other => Err(anyhow::anyhow!("Unknown partition type: {}", other)),
        }
    }
}

/// A formatted (or raw) volume: a primary partition or a logical drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: RegionId,
    pub name: String,
    pub size_mb: u64,
    pub file_system: FileSystem,
    pub used_mb: u64,
    pub status: VolumeStatus,
}

impl Volume {
    pub fn new(id: RegionId, name: impl Into<String>, size_mb: u64, file_system: FileSystem) -> Self {
        Self {
            id,
            name: name.into(),
            size_mb,
            file_system,
            used_mb: 0,
            status: file_system.status(),
        }
    }

    pub fn free_mb(&self) -> u64 {
        self.size_mb.saturating_sub(self.used_mb)
    }

    /// Wipe the volume with `file_system`. Size and placement are untouched.
    pub fn format(&mut self, file_system: FileSystem) {
        self.file_system = file_system;
        self.used_mb = 0;
        self.status = file_system.status();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpace {
    pub id: RegionId,
    pub size_mb: u64,
}

impl FreeSpace {
    pub fn new(id: RegionId, size_mb: u64) -> Self {
        Self { id, size_mb }
    }
}

/// The extended container. Its children always add up to `size_mb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extended {
    pub id: RegionId,
    pub size_mb: u64,
    pub children: Vec<NestedRegion>,
}

impl Extended {
    pub fn logical_count(&self) -> usize {
        self.children
            .iter()
            .filter(|child| matches!(child, NestedRegion::Logical(_)))
            .count()
    }

    pub fn has_logicals(&self) -> bool {
        self.logical_count() > 0
    }

    /// Total unallocated space inside the container.
    pub fn free_mb(&self) -> u64 {
        self.children
            .iter()
            .filter_map(|child| match child {
                NestedRegion::Unallocated(free) => Some(free.size_mb),
                NestedRegion::Logical(_) => None,
            })
            .sum()
    }

    /// Unallocated space touching the given edge of the container.
    pub fn edge_free_mb(&self, side: Side) -> u64 {
        let edge = match side {
            Side::Left => self.children.first(),
            Side::Right => self.children.last(),
        };
        match edge {
            Some(NestedRegion::Unallocated(free)) => free.size_mb,
            _ => 0,
        }
    }
}

/// A top-level region of the disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Region {
    Primary(Volume),
    Extended(Extended),
    Unallocated(FreeSpace),
}

impl Region {
    pub fn id(&self) -> &RegionId {
        match self {
            Self::Primary(volume) => &volume.id,
            Self::Extended(extended) => &extended.id,
            Self::Unallocated(free) => &free.id,
        }
    }

    pub fn size_mb(&self) -> u64 {
        match self {
            Self::Primary(volume) => volume.size_mb,
            Self::Extended(extended) => extended.size_mb,
            Self::Unallocated(free) => free.size_mb,
        }
    }

    pub fn kind(&self) -> RegionKind {
        match self {
            Self::Primary(_) => RegionKind::Primary,
            Self::Extended(_) => RegionKind::Extended,
            Self::Unallocated(_) => RegionKind::Unallocated,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Primary(volume) => Some(&volume.name),
            _ => None,
        }
    }
}

/// A region inside the extended container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NestedRegion {
    Logical(Volume),
    Unallocated(FreeSpace),
}

impl NestedRegion {
    pub fn id(&self) -> &RegionId {
        match self {
            Self::Logical(volume) => &volume.id,
            Self::Unallocated(free) => &free.id,
        }
    }

    pub fn size_mb(&self) -> u64 {
        match self {
            Self::Logical(volume) => volume.size_mb,
            Self::Unallocated(free) => free.size_mb,
        }
    }

    pub fn kind(&self) -> RegionKind {
        match self {
            Self::Logical(_) => RegionKind::Logical,
            Self::Unallocated(_) => RegionKind::Unallocated,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Logical(volume) => Some(&volume.name),
            Self::Unallocated(_) => None,
        }
    }
}
