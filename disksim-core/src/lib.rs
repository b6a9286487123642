// SPDX-License-Identifier: GPL-3.0-only

//! Partition table engine for the disk partition simulator
//!
//! - [`table`]: the nested region model and its mutation primitives
//! - [`validate`]: admission checks that reject a command with a typed reason
//! - [`manager`]: the command layer; validate, mutate a working copy, verify, swap
//! - [`drag`]: pointer-driven resizing that ends in at most one command
//! - [`layout`]: initial layouts loaded from `resources/layouts`

pub mod command;
pub mod drag;
pub mod layout;
pub mod limits;
pub mod manager;
pub mod table;
pub mod validate;

pub use command::{Command, CreateRequest};
pub use drag::{DragCommit, DragPreview, DragSession, DragSettings, DragState, DragTarget};
pub use layout::{LayoutError, LayoutSpec};
pub use limits::Limits;
pub use manager::{DiskManager, EngineSettings};
pub use table::{Location, PartitionTable};
pub use validate::{is_valid_name, suggest_drive_letter};
