// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_PARTITION_MB: u64 = 100;
pub const DEFAULT_MIN_SHRINK_MB: u64 = 50;
/// MBR tables have four primary slots; the extended container takes one.
pub const DEFAULT_MAX_PRIMARY_SLOTS: usize = 4;

/// Engine-wide size and count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub min_partition_mb: u64,
    pub min_shrink_mb: u64,
    pub max_primary_slots: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_partition_mb: DEFAULT_MIN_PARTITION_MB,
            min_shrink_mb: DEFAULT_MIN_SHRINK_MB,
            max_primary_slots: DEFAULT_MAX_PRIMARY_SLOTS,
        }
    }
}
