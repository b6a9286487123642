// SPDX-License-Identifier: GPL-3.0-only

//! Read-only projections of a table for renderers and scripts

use serde::{Deserialize, Serialize};

use crate::common::{format_size, percent_of_disk};
use crate::filesystem::{FileSystem, VolumeStatus};
use crate::region::{RegionId, RegionKind};

/// One row of the flattened disk layout.
///
/// Logical drives and the extended container's internal gaps follow their
/// container and carry its id in `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionView {
    pub id: RegionId,
    pub name: Option<String>,
    pub kind: RegionKind,
    pub size_mb: u64,
    pub offset_mb: u64,
    pub percent_of_disk: f64,
    pub file_system: Option<FileSystem>,
    pub used_mb: u64,
    pub free_mb: u64,
    pub status: Option<VolumeStatus>,
    pub parent_id: Option<RegionId>,
}

impl RegionView {
    /// Label used by listings: the name, or the kind when unnamed.
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.kind.display_name(),
        }
    }

    pub fn is_nested(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Disk-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSummary {
    pub total_mb: u64,
    pub unallocated_mb: u64,
    pub extended_free_mb: u64,
    pub primary_count: usize,
    pub logical_count: usize,
    pub has_extended: bool,
}

impl DiskSummary {
    pub fn allocated_mb(&self) -> u64 {
        self.total_mb.saturating_sub(self.unallocated_mb)
    }

    pub fn unallocated_percent(&self) -> f64 {
        percent_of_disk(self.unallocated_mb, self.total_mb)
    }
}

/// Immutable copy of the whole layout after a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub total_mb: u64,
    pub regions: Vec<RegionView>,
}

impl Snapshot {
    pub fn find(&self, id: &RegionId) -> Option<&RegionView> {
        self.regions.iter().find(|view| &view.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RegionView> {
        self.regions.iter().find(|view| {
            view.name
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
        })
    }

    pub fn top_level(&self) -> impl Iterator<Item = &RegionView> {
        self.regions.iter().filter(|view| !view.is_nested())
    }

    pub fn children_of<'a>(&'a self, parent: &'a RegionId) -> impl Iterator<Item = &'a RegionView> {
        self.regions
            .iter()
            .filter(move |view| view.parent_id.as_ref() == Some(parent))
    }

    /// Compact one-line rendering, e.g.
    /// `C: 120 GB | Extended 200 GB {D: 200 GB} | Free 180 GB`.
    pub fn layout_line(&self) -> String {
        let mut parts = Vec::new();
        for view in self.top_level() {
            let mut text = match view.kind {
                RegionKind::Unallocated => format!("Free {}", format_size(view.size_mb)),
                RegionKind::Extended => format!("Extended {}", format_size(view.size_mb)),
                _ => format!("{} {}", view.label(), format_size(view.size_mb)),
            };
            if view.kind == RegionKind::Extended {
                let inner: Vec<String> = self
                    .children_of(&view.id)
                    .map(|child| match child.kind {
                        RegionKind::Unallocated => format!("Free {}", format_size(child.size_mb)),
                        _ => format!("{} {}", child.label(), format_size(child.size_mb)),
                    })
                    .collect();
                text.push_str(&format!(" {{{}}}", inner.join(", ")));
            }
            parts.push(text);
        }
        parts.join(" | ")
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub snapshot: Snapshot,
    /// Amount actually moved by a resize, after clamping.
    pub applied_mb: Option<u64>,
    pub message: String,
}
