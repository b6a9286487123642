// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File systems the simulator can put on a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileSystem {
    #[default]
    #[serde(rename = "NTFS", alias = "ntfs")]
    Ntfs,
    #[serde(rename = "FAT32", alias = "fat32")]
    Fat32,
    #[serde(rename = "exFAT", alias = "exfat")]
    ExFat,
    #[serde(rename = "RAW", alias = "raw")]
    Raw,
}

impl FileSystem {
    pub const ALL: [FileSystem; 4] = [Self::Ntfs, Self::Fat32, Self::ExFat, Self::Raw];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ntfs => "NTFS",
            Self::Fat32 => "FAT32",
            Self::ExFat => "exFAT",
            Self::Raw => "RAW",
        }
    }

    /// Health reported for a volume freshly formatted with this file system.
    pub fn status(self) -> VolumeStatus {
        match self {
            Self::Raw => VolumeStatus::Unformatted,
            _ => VolumeStatus::Healthy,
        }
    }
}

impl fmt::Display for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileSystem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|fs| fs.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| anyhow::anyhow!("Unknown file system: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VolumeStatus {
    #[default]
    Healthy,
    Unformatted,
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("Healthy"),
            Self::Unformatted => f.write_str("Unformatted"),
        }
    }
}
