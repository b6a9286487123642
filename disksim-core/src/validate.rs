// SPDX-License-Identifier: GPL-3.0-only

//! Pure admission checks for table commands
//!
//! Every check reads the table and either approves the command or returns the
//! reason it must be rejected. None of them mutate anything.

use disksim_types::{
    DiskError, ErrorReason, PartitionType, Region, RegionId, RegionKind, Result, Side,
};

use crate::limits::Limits;
use crate::table::{
    EXTENDED_ID_PREFIX, EXTENDED_REFERENCE, FREE_ID_PREFIX, Location, PRIMARY_ID_PREFIX,
    PartitionTable,
};

pub const MAX_LABEL_LEN: usize = 11;

/// A drive letter (`C:`) or a label of 1-11 letters, digits, spaces, `-`, `_`.
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    !name.is_empty()
        && name.len() <= MAX_LABEL_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
}

/// Check a partition name for format and disk-wide uniqueness. `exclude`
/// names the region being renamed, which may keep its own name.
pub fn validate_partition_name(
    table: &PartitionTable,
    name: &str,
    exclude: Option<&RegionId>,
) -> Result<()> {
    if !is_valid_name(name) {
        return Err(DiskError::new(
            ErrorReason::InvalidNameFormat,
            format!(
                "\"{name}\" is not a valid name. Use a drive letter such as E: or up to {MAX_LABEL_LEN} letters, digits, spaces, - or _."
            ),
        ));
    }

    let taken = table.volumes().any(|volume| {
        Some(&volume.id) != exclude && volume.name.eq_ignore_ascii_case(name)
    });
    if taken {
        return Err(DiskError::new(
            ErrorReason::NameConflict,
            format!("A partition named \"{name}\" already exists."),
        ));
    }

    if shadows_reference(table, name, exclude) {
        return Err(DiskError::new(
            ErrorReason::NameConflict,
            format!("\"{name}\" is reserved because it already refers to a region."),
        ));
    }
    Ok(())
}

/// Whether `name` would resolve to a different region than the one it labels:
/// the `Extended` keyword, another region's id, or the shape of a generated id.
pub(crate) fn shadows_reference(
    table: &PartitionTable,
    name: &str,
    own_id: Option<&RegionId>,
) -> bool {
    let name = name.trim();
    if name.eq_ignore_ascii_case(EXTENDED_REFERENCE) || looks_generated(name) {
        return true;
    }
    table
        .all_locations()
        .filter_map(|location| table.id_at(location))
        .any(|id| Some(id) != own_id && id.as_str().eq_ignore_ascii_case(name))
}

fn looks_generated(name: &str) -> bool {
    [PRIMARY_ID_PREFIX, EXTENDED_ID_PREFIX, FREE_ID_PREFIX]
        .iter()
        .any(|prefix| {
            name.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                && name.len() > prefix.len()
                && name[prefix.len()..].bytes().all(|b| b.is_ascii_digit())
        })
}

/// Next unused drive letter from `C:` to `Z:`.
pub fn suggest_drive_letter(table: &PartitionTable) -> Option<String> {
    ('C'..='Z')
        .map(|letter| format!("{letter}:"))
        .find(|candidate| {
            !table
                .volumes()
                .any(|volume| volume.name.eq_ignore_ascii_case(candidate))
        })
}

/// Pick the gap a new partition of `size_mb` will be carved from.
///
/// Primary and extended partitions live at the top level, logical drives
/// inside the extended container. Without `target` the largest gap of the
/// relevant sequence is used.
pub fn validate_create(
    table: &PartitionTable,
    limits: &Limits,
    size_mb: u64,
    partition_type: PartitionType,
    target: Option<&RegionId>,
) -> Result<Location> {
    if size_mb == 0 || size_mb < limits.min_partition_mb {
        return Err(DiskError::new(
            ErrorReason::InvalidAmount,
            format!(
                "Partitions must be at least {} MB.",
                limits.min_partition_mb
            ),
        ));
    }

    match partition_type {
        PartitionType::Extended if table.extended().is_some() => {
            return Err(DiskError::new(
                ErrorReason::ExtendedAlreadyExists,
                "Only one extended partition is allowed per disk.",
            ));
        }
        PartitionType::Primary | PartitionType::Extended
            if table.primary_slots_used() >= limits.max_primary_slots =>
        {
            return Err(DiskError::new(
                ErrorReason::PrimaryLimitReached,
                format!(
                    "A disk can hold at most {} primary partitions (including the extended partition). Create a logical drive instead.",
                    limits.max_primary_slots
                ),
            ));
        }
        PartitionType::Logical if table.extended().is_none() => {
            return Err(DiskError::new(
                ErrorReason::ExtendedRequired,
                "Logical drives can only be created inside an extended partition.",
            ));
        }
        _ => {}
    }

    let nested = partition_type == PartitionType::Logical;
    let gap = match target {
        Some(id) => {
            let location = table
                .locate_id(id)
                .ok_or_else(|| DiskError::not_found(id.as_str()))?;
            if location.is_nested() != nested || table.gap_at(location).is_none() {
                let place = if nested {
                    "inside the extended partition"
                } else {
                    "outside the extended partition"
                };
                return Err(DiskError::new(
                    ErrorReason::InvalidTarget,
                    format!("A {partition_type} partition needs unallocated space {place}."),
                ));
            }
            location
        }
        None => table.largest_gap(nested).ok_or_else(|| insufficient(size_mb, 0))?,
    };

    let available = table.gap_at(gap).map_or(0, |free| free.size_mb);
    if available < size_mb {
        return Err(insufficient(size_mb, available));
    }
    Ok(gap)
}

fn insufficient(requested: u64, available: u64) -> DiskError {
    DiskError::new(
        ErrorReason::InsufficientSpace,
        format!(
            "Not enough unallocated space: {requested} MB requested, {available} MB available."
        ),
    )
}

/// Check a shrink of `amount_mb` that frees space on `side`.
///
/// A volume cannot drop below its used space. An extended partition can only
/// give up the unallocated space at the shrinking edge.
pub fn validate_shrink(
    table: &PartitionTable,
    limits: &Limits,
    location: Location,
    amount_mb: u64,
    side: Side,
) -> Result<()> {
    let size_mb = partition_size(table, location)?;

    if amount_mb == 0 || amount_mb >= size_mb {
        return Err(DiskError::new(
            ErrorReason::InvalidAmount,
            format!("Enter an amount between 1 and {} MB.", size_mb.saturating_sub(1)),
        ));
    }

    let floor_mb = match (table.volume_at(location), location) {
        (Some(volume), _) => volume.used_mb,
        (None, Location::Top(index)) => match &table.regions()[index] {
            Region::Extended(extended) => {
                size_mb.saturating_sub(extended.edge_free_mb(side))
            }
            _ => 0,
        },
        (None, Location::Nested { .. }) => 0,
    };
    if size_mb - amount_mb < floor_mb {
        return Err(DiskError::new(
            ErrorReason::BelowUsedFloor,
            format!(
                "Cannot shrink below the used space. At most {} MB can be freed.",
                size_mb - floor_mb
            ),
        ));
    }

    if amount_mb < limits.min_shrink_mb {
        return Err(DiskError::new(
            ErrorReason::InvalidAmount,
            format!("Shrink by at least {} MB.", limits.min_shrink_mb),
        ));
    }
    if size_mb - amount_mb < limits.min_partition_mb {
        return Err(DiskError::new(
            ErrorReason::InvalidAmount,
            format!(
                "The partition would be smaller than the minimum of {} MB.",
                limits.min_partition_mb
            ),
        ));
    }
    Ok(())
}

/// Check an extend on `side` and return the amount that will actually be
/// applied, clamped to the adjacent free space.
pub fn validate_extend(
    table: &PartitionTable,
    location: Location,
    amount_mb: u64,
    side: Side,
) -> Result<u64> {
    partition_size(table, location)?;

    if amount_mb == 0 {
        return Err(DiskError::new(
            ErrorReason::InvalidAmount,
            "The extend amount must be greater than zero.",
        ));
    }

    let gap = table.neighbor_gap(location, side).ok_or_else(|| {
        DiskError::new(
            ErrorReason::NoAdjacentUnallocated,
            format!("There is no unallocated space directly to the {side} of this partition."),
        )
    })?;
    Ok(amount_mb.min(gap.size_mb))
}

pub fn validate_delete(table: &PartitionTable, location: Location) -> Result<()> {
    partition_size(table, location)?;

    if let Some(extended) = table.extended()
        && table.kind_at(location) == Some(RegionKind::Extended)
        && extended.has_logicals()
    {
        return Err(DiskError::new(
            ErrorReason::ExtendedPartitionOccupied,
            "Delete all logical drives before deleting the extended partition.",
        ));
    }
    Ok(())
}

/// Size of the partition at `location`; free space is rejected.
fn partition_size(table: &PartitionTable, location: Location) -> Result<u64> {
    match table.kind_at(location) {
        Some(RegionKind::Unallocated) => Err(DiskError::new(
            ErrorReason::NotAPartition,
            "This is unallocated space, not a partition.",
        )),
        Some(_) => table.size_at(location).ok_or_else(|| {
            DiskError::new(ErrorReason::RegionNotFound, "The partition no longer exists.")
        }),
        None => Err(DiskError::new(
            ErrorReason::RegionNotFound,
            "The partition no longer exists.",
        )),
    }
}
