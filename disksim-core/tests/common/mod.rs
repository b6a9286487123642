#![allow(dead_code)]

use disksim_core::{DiskManager, PartitionTable};
use disksim_types::{MB_PER_GB, RegionKind};

pub fn gb(value: u64) -> u64 {
    value * MB_PER_GB
}

/// Kind, name, size and nesting of every row; ids are left out so layouts
/// that differ only in generated ids compare equal.
pub fn signature(manager: &DiskManager) -> Vec<(RegionKind, Option<String>, u64, bool)> {
    manager
        .list_regions()
        .into_iter()
        .map(|view| {
            let nested = view.is_nested();
            (view.kind, view.name, view.size_mb, nested)
        })
        .collect()
}

pub fn assert_invariants(table: &PartitionTable) {
    if let Err(error) = table.verify() {
        panic!("table invariants broken: {error}");
    }
}

pub fn default_manager() -> DiskManager {
    DiskManager::default()
}
