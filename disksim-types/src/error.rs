// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a command or layout was rejected.
///
/// Every reason is recoverable: the table is left in its last valid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    InsufficientSpace,
    ExtendedAlreadyExists,
    NoAdjacentUnallocated,
    BelowUsedFloor,
    InvalidAmount,
    ExtendedPartitionOccupied,
    NameConflict,
    InvalidNameFormat,
    RegionNotFound,
    OperationInProgress,
    PrimaryLimitReached,
    ExtendedRequired,
    NotAPartition,
    InvalidTarget,
    InvalidLayout,
}

impl ErrorReason {
    /// Stable identifier used in script output and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientSpace => "insufficient_space",
            Self::ExtendedAlreadyExists => "extended_already_exists",
            Self::NoAdjacentUnallocated => "no_adjacent_unallocated",
            Self::BelowUsedFloor => "below_used_floor",
            Self::InvalidAmount => "invalid_amount",
            Self::ExtendedPartitionOccupied => "extended_partition_occupied",
            Self::NameConflict => "name_conflict",
            Self::InvalidNameFormat => "invalid_name_format",
            Self::RegionNotFound => "region_not_found",
            Self::OperationInProgress => "operation_in_progress",
            Self::PrimaryLimitReached => "primary_limit_reached",
            Self::ExtendedRequired => "extended_required",
            Self::NotAPartition => "not_a_partition",
            Self::InvalidTarget => "invalid_target",
            Self::InvalidLayout => "invalid_layout",
        }
    }
}

/// A rejected operation: the typed reason plus the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct DiskError {
    pub reason: ErrorReason,
    pub message: String,
}

impl DiskError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(reference: &str) -> Self {
        Self::new(
            ErrorReason::RegionNotFound,
            format!("The specified partition \"{reference}\" could not be found."),
        )
    }

    pub fn busy() -> Self {
        Self::new(
            ErrorReason::OperationInProgress,
            "Another operation is in progress. Finish or cancel it first.",
        )
    }

    pub fn invalid_layout(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::InvalidLayout, message)
    }
}

pub type Result<T> = std::result::Result<T, DiskError>;
