// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the disk partition simulator
//!
//! This crate defines the data shared by the engine and its front ends:
//!
//! - **disksim-core**: owns a table built from these types and mutates it
//! - **disksim-cli**: renders snapshots and reports errors
//!
//! ## Architecture
//!
//! ### Tree (the authoritative layout)
//! - `Region` → top-level primary, extended or unallocated region
//! - `NestedRegion` → logical drive or gap inside the extended container
//!
//! ### Flat (for display)
//! - `RegionView` → one row per region, nested rows after their container
//! - `Snapshot` → the whole flattened layout at one point in time

pub mod capabilities;
pub mod common;
pub mod error;
pub mod filesystem;
pub mod region;
pub mod view;

pub use capabilities::{BlockedOperation, Capabilities, Operation};
pub use common::{
    MB_PER_GB, clamp_percent, format_size, format_size_detailed, parse_size, percent_of_disk,
    pixels_to_percent, size_for_percent,
};
pub use error::{DiskError, ErrorReason, Result};
pub use filesystem::{FileSystem, VolumeStatus};
pub use region::{
    Extended, FreeSpace, NestedRegion, PartitionType, Region, RegionId, RegionKind, Side, Volume,
};
pub use view::{DiskSummary, Outcome, RegionView, Snapshot};
