// SPDX-License-Identifier: GPL-3.0-only

//! Command layer
//!
//! [`DiskManager`] owns the table for a session. Every command is validated
//! and applied to a working copy; the copy replaces the table only after all
//! invariants hold again, so a rejected command leaves no trace.

use serde::{Deserialize, Serialize};

use disksim_types::{
    Capabilities, DiskError, DiskSummary, ErrorReason, FileSystem, Operation, Outcome,
    PartitionType, RegionKind, RegionView, Result, Side, Snapshot, Volume, format_size,
};

use crate::command::{Command, CreateRequest};
use crate::drag::{DragPreview, DragSession, DragSettings, DragTarget};
use crate::limits::Limits;
use crate::table::{Location, PRIMARY_ID_PREFIX, PartitionTable};
use crate::validate::{
    suggest_drive_letter, validate_create, validate_delete, validate_extend,
    validate_partition_name, validate_shrink,
};

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub limits: Limits,
    pub default_file_system: FileSystem,
    pub drag: DragSettings,
}

#[derive(Debug, Clone)]
pub struct DiskManager {
    table: PartitionTable,
    initial: PartitionTable,
    settings: EngineSettings,
    drag: DragSession,
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new(PartitionTable::default_layout(), EngineSettings::default())
    }
}

impl DiskManager {
    /// Start a session on `table`, which also becomes the layout restored by
    /// [`DiskManager::reset`].
    pub fn new(table: PartitionTable, settings: EngineSettings) -> Self {
        Self {
            initial: table.clone(),
            table,
            settings,
            drag: DragSession::new(settings.drag),
        }
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_active()
    }

    pub fn list_regions(&self) -> Vec<RegionView> {
        self.table.views()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.table.snapshot()
    }

    pub fn summary(&self) -> DiskSummary {
        self.table.summary()
    }

    pub fn create_partition(&mut self, request: CreateRequest) -> Result<Outcome> {
        self.ensure_idle("create")?;
        self.create(request)
    }

    pub fn shrink_partition(&mut self, reference: &str, amount_mb: u64, side: Side) -> Result<Outcome> {
        self.ensure_idle("shrink")?;
        self.shrink(reference, amount_mb, side)
    }

    /// Extend into the free space on the right.
    pub fn extend_partition(&mut self, reference: &str, amount_mb: u64) -> Result<Outcome> {
        self.extend_partition_on(reference, amount_mb, Side::Right)
    }

    pub fn extend_partition_on(
        &mut self,
        reference: &str,
        amount_mb: u64,
        side: Side,
    ) -> Result<Outcome> {
        self.ensure_idle("extend")?;
        self.extend(reference, amount_mb, side)
    }

    pub fn delete_partition(&mut self, reference: &str) -> Result<Outcome> {
        self.ensure_idle("delete")?;
        let reference = reference.to_string();
        self.commit("delete", move |table| {
            let location = locate(table, &reference)?;
            validate_delete(table, location)?;
            let label = label_at(table, location);
            table.release(location)?;
            Ok((None, format!("Partition \"{label}\" deleted")))
        })
    }

    /// Format with the configured default file system.
    pub fn format_partition(&mut self, reference: &str) -> Result<Outcome> {
        let file_system = self.settings.default_file_system;
        self.format_partition_as(reference, file_system)
    }

    pub fn format_partition_as(&mut self, reference: &str, file_system: FileSystem) -> Result<Outcome> {
        self.ensure_idle("format")?;
        let reference = reference.to_string();
        self.commit("format", move |table| {
            let location = locate(table, &reference)?;
            match table.kind_at(location) {
                Some(RegionKind::Extended) => {
                    return Ok((
                        None,
                        "The extended partition holds no file system; nothing to format".to_string(),
                    ));
                }
                Some(RegionKind::Unallocated) => return Err(not_a_partition("formatted")),
                _ => {}
            }
            let volume = table
                .volume_at_mut(location)
                .ok_or_else(|| DiskError::not_found(&reference))?;
            volume.format(file_system);
            Ok((
                None,
                format!("Partition \"{}\" formatted as {file_system}", volume.name),
            ))
        })
    }

    pub fn rename_partition(&mut self, reference: &str, name: &str) -> Result<Outcome> {
        self.ensure_idle("rename")?;
        let reference = reference.to_string();
        let name = name.trim().to_string();
        self.commit("rename", move |table| {
            let location = locate(table, &reference)?;
            let Some(volume) = table.volume_at(location) else {
                return Err(not_a_partition("renamed"));
            };
            let id = volume.id.clone();
            let old_name = volume.name.clone();
            validate_partition_name(table, &name, Some(&id))?;
            if let Some(volume) = table.volume_at_mut(location) {
                volume.name = name.clone();
            }
            Ok((None, format!("Partition \"{old_name}\" renamed to \"{name}\"")))
        })
    }

    /// Restore the layout the session started with.
    pub fn reset(&mut self) -> Result<Outcome> {
        self.ensure_idle("reset")?;
        self.table = self.initial.clone();
        let message = "Disk reset to default state".to_string();
        tracing::info!(action = "reset", "{message}");
        Ok(Outcome {
            snapshot: self.table.snapshot(),
            applied_mb: None,
            message,
        })
    }

    /// Apply a serialized command.
    pub fn execute(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::Create(request) => self.create_partition(request),
            Command::Shrink {
                target,
                amount_mb,
                side,
            } => self.shrink_partition(&target, amount_mb, side),
            Command::Extend {
                target,
                amount_mb,
                side,
            } => self.extend_partition_on(&target, amount_mb, side),
            Command::Delete { target } => self.delete_partition(&target),
            Command::Format {
                target,
                file_system,
            } => match file_system {
                Some(file_system) => self.format_partition_as(&target, file_system),
                None => self.format_partition(&target),
            },
            Command::Rename { target, name } => self.rename_partition(&target, &name),
            Command::Reset => self.reset(),
        }
    }

    /// Which context-menu operations apply to a region and which of those are
    /// currently blocked.
    pub fn capabilities(&self, reference: &str) -> Result<Capabilities> {
        let table = &self.table;
        let limits = &self.settings.limits;
        let location = locate(table, reference)?;
        let mut caps = Capabilities::default();

        match table.kind_at(location) {
            Some(RegionKind::Unallocated) => {
                caps.supported = vec![Operation::Create, Operation::Properties];
                let partition_type = if location.is_nested() {
                    PartitionType::Logical
                } else {
                    PartitionType::Primary
                };
                let id = table.id_at(location).cloned();
                if let Err(error) = validate_create(
                    table,
                    limits,
                    limits.min_partition_mb,
                    partition_type,
                    id.as_ref(),
                ) {
                    caps.block(Operation::Create, error.reason, error.message);
                }
            }
            Some(kind) => {
                caps.supported = match kind {
                    RegionKind::Extended => vec![
                        Operation::Shrink,
                        Operation::Extend,
                        Operation::Delete,
                        Operation::Properties,
                    ],
                    _ => vec![
                        Operation::Shrink,
                        Operation::Extend,
                        Operation::Delete,
                        Operation::Format,
                        Operation::Rename,
                        Operation::Properties,
                    ],
                };

                let shrink = [Side::Right, Side::Left].into_iter().map(|side| {
                    validate_shrink(table, limits, location, limits.min_shrink_mb, side)
                });
                if let Some(error) = first_error_unless_any_ok(shrink) {
                    caps.block(Operation::Shrink, error.reason, error.message);
                }

                let extend = [Side::Right, Side::Left]
                    .into_iter()
                    .map(|side| validate_extend(table, location, 1, side).map(|_| ()));
                if let Some(error) = first_error_unless_any_ok(extend) {
                    caps.block(Operation::Extend, error.reason, error.message);
                }

                if let Err(error) = validate_delete(table, location) {
                    caps.block(Operation::Delete, error.reason, error.message);
                }
            }
            None => return Err(DiskError::not_found(reference)),
        }

        if self.drag.is_active() {
            for operation in caps.supported.clone() {
                if operation != Operation::Properties && caps.blocked_reason(operation).is_none() {
                    let busy = DiskError::busy();
                    caps.block(operation, busy.reason, busy.message);
                }
            }
        }
        Ok(caps)
    }

    /// Grab an edge of a partition. Free space cannot be dragged.
    pub fn begin_drag(&mut self, reference: &str, side: Side, pointer_px: f64) -> Result<DragPreview> {
        if self.drag.is_active() {
            return Err(DiskError::busy());
        }
        let location = locate(&self.table, reference)?;
        if self.table.kind_at(location) == Some(RegionKind::Unallocated) {
            return Err(not_a_partition("resized"));
        }
        let (Some(region_id), Some(baseline_mb)) =
            (self.table.id_at(location), self.table.size_at(location))
        else {
            return Err(DiskError::not_found(reference));
        };

        let target = DragTarget {
            region_id: region_id.clone(),
            side,
            baseline_mb,
            total_mb: self.table.total_mb(),
        };
        self.drag.begin(target, pointer_px)
    }

    /// Preview the drag at `pointer_px`. `None` when no drag is active.
    pub fn drag_to(&mut self, pointer_px: f64) -> Option<DragPreview> {
        self.drag.update(pointer_px)
    }

    /// Release the drag and apply its single resulting command. Returns
    /// `Ok(None)` when nothing had to change.
    pub fn end_drag(&mut self, pointer_px: f64) -> Result<Option<Outcome>> {
        let Some(commit) = self.drag.end(pointer_px) else {
            return Ok(None);
        };
        match commit.command() {
            Some(Command::Extend {
                target,
                amount_mb,
                side,
            }) => self.extend(&target, amount_mb, side).map(Some),
            Some(Command::Shrink {
                target,
                amount_mb,
                side,
            }) => self.shrink(&target, amount_mb, side).map(Some),
            _ => Ok(None),
        }
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.drag.cancel()
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        if self.drag.is_active() {
            let error = DiskError::busy();
            tracing::warn!(action, reason = error.reason.as_str(), "{}", error.message);
            return Err(error);
        }
        Ok(())
    }

    fn create(&mut self, request: CreateRequest) -> Result<Outcome> {
        let limits = self.settings.limits;
        let default_file_system = self.settings.default_file_system;
        self.commit("create", move |table| {
            let size_mb = request.size_mb;
            let gap = validate_create(
                table,
                &limits,
                size_mb,
                request.partition_type,
                request.target.as_ref(),
            )?;

            if request.partition_type == PartitionType::Extended {
                table.insert_extended(gap, size_mb)?;
                return Ok((
                    Some(size_mb),
                    format!("Extended partition created ({})", format_size(size_mb)),
                ));
            }

            let name = match request.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => suggest_drive_letter(table).ok_or_else(|| {
                    DiskError::new(
                        ErrorReason::NameConflict,
                        "Every drive letter is in use. Choose a label instead.",
                    )
                })?,
            };
            validate_partition_name(table, &name, None)?;

            let file_system = request.file_system.unwrap_or(default_file_system);
            let id = table.fresh_id(PRIMARY_ID_PREFIX);
            table.insert_volume(gap, Volume::new(id, name.as_str(), size_mb, file_system))?;
            Ok((
                Some(size_mb),
                format!(
                    "Partition \"{name}\" created successfully ({})",
                    format_size(size_mb)
                ),
            ))
        })
    }

    fn shrink(&mut self, reference: &str, amount_mb: u64, side: Side) -> Result<Outcome> {
        let limits = self.settings.limits;
        let reference = reference.to_string();
        self.commit("shrink", move |table| {
            let location = locate(table, &reference)?;
            validate_shrink(table, &limits, location, amount_mb, side)?;
            let label = label_at(table, location);
            table.shrink(location, side, amount_mb)?;
            Ok((
                Some(amount_mb),
                format!("Partition \"{label}\" shrunk by {}", format_size(amount_mb)),
            ))
        })
    }

    fn extend(&mut self, reference: &str, amount_mb: u64, side: Side) -> Result<Outcome> {
        let reference = reference.to_string();
        self.commit("extend", move |table| {
            let location = locate(table, &reference)?;
            let applied_mb = validate_extend(table, location, amount_mb, side)?;
            let label = label_at(table, location);
            table.grow(location, side, applied_mb)?;
            Ok((
                Some(applied_mb),
                format!("Partition \"{label}\" extended by {}", format_size(applied_mb)),
            ))
        })
    }

    /// Run `mutate` on a working copy and keep the copy only if it succeeds
    /// and every invariant still holds.
    fn commit<F>(&mut self, action: &str, mutate: F) -> Result<Outcome>
    where
        F: FnOnce(&mut PartitionTable) -> Result<(Option<u64>, String)>,
    {
        let mut work = self.table.clone();
        let result = mutate(&mut work).and_then(|applied| {
            work.verify()?;
            Ok(applied)
        });

        match result {
            Ok((applied_mb, message)) => {
                self.table = work;
                tracing::info!(action, applied_mb, "{message}");
                Ok(Outcome {
                    snapshot: self.table.snapshot(),
                    applied_mb,
                    message,
                })
            }
            Err(error) => {
                tracing::warn!(action, reason = error.reason.as_str(), "{}", error.message);
                Err(error)
            }
        }
    }
}

fn locate(table: &PartitionTable, reference: &str) -> Result<Location> {
    table
        .locate(reference)
        .ok_or_else(|| DiskError::not_found(reference))
}

fn label_at(table: &PartitionTable, location: Location) -> String {
    match table.volume_at(location) {
        Some(volume) => volume.name.clone(),
        None => table
            .kind_at(location)
            .map_or("Unknown", RegionKind::display_name)
            .to_string(),
    }
}

fn not_a_partition(verb: &str) -> DiskError {
    DiskError::new(
        ErrorReason::NotAPartition,
        format!("Only partitions and logical drives can be {verb}."),
    )
}

/// `None` when any attempt succeeded, else the first failure.
fn first_error_unless_any_ok(results: impl Iterator<Item = Result<()>>) -> Option<DiskError> {
    let mut first = None;
    for result in results {
        match result {
            Ok(()) => return None,
            Err(error) => {
                first.get_or_insert(error);
            }
        }
    }
    first
}
