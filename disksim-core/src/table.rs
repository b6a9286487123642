// SPDX-License-Identifier: GPL-3.0-only

//! The authoritative partition table
//!
//! A table is a nested structure: top-level regions, one of which may be the
//! extended container with its own run of logical drives and gaps. Adjacency
//! is always structural; two regions are neighbors only when they sit next to
//! each other in the same sequence.
//!
//! The sequence primitives (`carve`, `release`, `take_from_neighbor`,
//! `give_to_neighbor`) are generic over [`Extent`] so both levels share one
//! implementation. They stay private to the crate and may leave a table
//! temporarily inconsistent; callers run them on a working copy and
//! [`PartitionTable::verify`] before swapping.

use std::collections::HashSet;

use disksim_types::{
    DiskError, DiskSummary, ErrorReason, Extended, FileSystem, FreeSpace, MB_PER_GB, NestedRegion,
    Region, RegionId, RegionKind, RegionView, Result, Side, Snapshot, Volume, VolumeStatus,
    percent_of_disk,
};

use crate::validate::{is_valid_name, shadows_reference};

/// Size of the demo disk (500 GB).
pub const DEFAULT_DISK_MB: u64 = 500 * MB_PER_GB;

pub const PRIMARY_ID_PREFIX: &str = "part-";
pub const EXTENDED_ID_PREFIX: &str = "ext-";
pub const FREE_ID_PREFIX: &str = "free-";

/// Reference that resolves to the extended container.
pub const EXTENDED_REFERENCE: &str = "Extended";

/// Structural position of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Top(usize),
    /// `index` inside the children of the extended region at top-level `parent`.
    Nested { parent: usize, index: usize },
}

impl Location {
    pub fn is_nested(self) -> bool {
        matches!(self, Self::Nested { .. })
    }

    fn with_index(self, index: usize) -> Self {
        match self {
            Self::Top(_) => Self::Top(index),
            Self::Nested { parent, .. } => Self::Nested { parent, index },
        }
    }
}

/// An element of a region sequence, at either level of the table.
pub trait Extent {
    fn extent_id(&self) -> &RegionId;
    fn extent_mb(&self) -> u64;
    fn gap(id: RegionId, size_mb: u64) -> Self;
    fn as_gap(&self) -> Option<&FreeSpace>;
    fn as_gap_mut(&mut self) -> Option<&mut FreeSpace>;

    fn is_gap(&self) -> bool {
        self.as_gap().is_some()
    }
}

impl Extent for Region {
    fn extent_id(&self) -> &RegionId {
        self.id()
    }

    fn extent_mb(&self) -> u64 {
        self.size_mb()
    }

    fn gap(id: RegionId, size_mb: u64) -> Self {
        Region::Unallocated(FreeSpace::new(id, size_mb))
    }

    fn as_gap(&self) -> Option<&FreeSpace> {
        match self {
            Region::Unallocated(free) => Some(free),
            _ => None,
        }
    }

    fn as_gap_mut(&mut self) -> Option<&mut FreeSpace> {
        match self {
            Region::Unallocated(free) => Some(free),
            _ => None,
        }
    }
}

impl Extent for NestedRegion {
    fn extent_id(&self) -> &RegionId {
        self.id()
    }

    fn extent_mb(&self) -> u64 {
        self.size_mb()
    }

    fn gap(id: RegionId, size_mb: u64) -> Self {
        NestedRegion::Unallocated(FreeSpace::new(id, size_mb))
    }

    fn as_gap(&self) -> Option<&FreeSpace> {
        match self {
            NestedRegion::Unallocated(free) => Some(free),
            NestedRegion::Logical(_) => None,
        }
    }

    fn as_gap_mut(&mut self) -> Option<&mut FreeSpace> {
        match self {
            NestedRegion::Unallocated(free) => Some(free),
            NestedRegion::Logical(_) => None,
        }
    }
}

fn neighbor_index(len: usize, index: usize, side: Side) -> Option<usize> {
    match side {
        Side::Left => index.checked_sub(1),
        Side::Right => (index + 1 < len).then_some(index + 1),
    }
}

fn no_adjacent_gap(side: Side) -> DiskError {
    DiskError::new(
        ErrorReason::NoAdjacentUnallocated,
        format!("There is no unallocated space directly to the {side} of this partition."),
    )
}

/// Carve `region` out of the gap at `index`.
///
/// The new region takes the leading part of the gap; the remainder keeps the
/// gap's id and stays to its right, or disappears when nothing is left.
pub(crate) fn carve<T: Extent>(seq: &mut Vec<T>, index: usize, region: T) -> Result<()> {
    let size_mb = region.extent_mb();
    let Some(gap) = seq.get_mut(index).and_then(T::as_gap_mut) else {
        return Err(DiskError::new(
            ErrorReason::InvalidTarget,
            "Partitions can only be created in unallocated space.",
        ));
    };
    if gap.size_mb < size_mb {
        return Err(DiskError::new(
            ErrorReason::InsufficientSpace,
            "Not enough unallocated space for the requested size.",
        ));
    }

    let remainder = gap.size_mb - size_mb;
    if remainder == 0 {
        seq[index] = region;
    } else {
        gap.size_mb = remainder;
        seq.insert(index, region);
    }
    Ok(())
}

/// Turn the slot at `index` into free space and merge it with free neighbors.
///
/// The merged gap keeps the left neighbor's id when that was free, else the
/// right neighbor's, else `fresh`. Returns the index of the merged gap.
pub(crate) fn release<T: Extent>(seq: &mut Vec<T>, index: usize, fresh: RegionId) -> Result<usize> {
    if index >= seq.len() {
        return Err(stale_location());
    }
    let left_gap = index > 0 && seq[index - 1].is_gap();
    let right_gap = seq.get(index + 1).is_some_and(T::is_gap);

    let id = if left_gap {
        seq[index - 1].extent_id().clone()
    } else if right_gap {
        seq[index + 1].extent_id().clone()
    } else {
        fresh
    };

    let start = if left_gap { index - 1 } else { index };
    let end = if right_gap { index + 1 } else { index };
    let size_mb = seq[start..=end].iter().map(T::extent_mb).sum();

    seq.splice(start..=end, [T::gap(id, size_mb)]);
    Ok(start)
}

/// Remove `amount_mb` from the gap beside `index` on `side`.
///
/// The caller grows the region itself. A gap reduced to zero is removed.
/// Returns the region's index afterwards.
pub(crate) fn take_from_neighbor<T: Extent>(
    seq: &mut Vec<T>,
    index: usize,
    side: Side,
    amount_mb: u64,
) -> Result<usize> {
    if index >= seq.len() {
        return Err(stale_location());
    }
    let neighbor = neighbor_index(seq.len(), index, side).ok_or_else(|| no_adjacent_gap(side))?;
    let gap = seq[neighbor]
        .as_gap_mut()
        .ok_or_else(|| no_adjacent_gap(side))?;
    if gap.size_mb < amount_mb {
        return Err(DiskError::new(
            ErrorReason::InsufficientSpace,
            "The adjacent unallocated space is smaller than the requested amount.",
        ));
    }

    gap.size_mb -= amount_mb;
    if gap.size_mb == 0 {
        seq.remove(neighbor);
        if side == Side::Left {
            return Ok(index - 1);
        }
    }
    Ok(index)
}

/// Hand `amount_mb` to the neighbor on `side`: a free neighbor grows,
/// otherwise a new gap with id `fresh` is inserted. Returns the region's
/// index afterwards.
pub(crate) fn give_to_neighbor<T: Extent>(
    seq: &mut Vec<T>,
    index: usize,
    side: Side,
    amount_mb: u64,
    fresh: RegionId,
) -> usize {
    if let Some(neighbor) = neighbor_index(seq.len(), index, side)
        && let Some(gap) = seq[neighbor].as_gap_mut()
    {
        gap.size_mb += amount_mb;
        return index;
    }

    match side {
        Side::Left => {
            seq.insert(index, T::gap(fresh, amount_mb));
            index + 1
        }
        Side::Right => {
            seq.insert(index + 1, T::gap(fresh, amount_mb));
            index
        }
    }
}

/// Add free space at one end of a sequence, merging into an edge gap.
pub(crate) fn grow_edge<T: Extent>(seq: &mut Vec<T>, side: Side, amount_mb: u64, fresh: RegionId) {
    let edge = match side {
        Side::Left => 0,
        Side::Right => seq.len().saturating_sub(1),
    };
    if let Some(gap) = seq.get_mut(edge).and_then(T::as_gap_mut) {
        gap.size_mb += amount_mb;
        return;
    }

    match side {
        Side::Left => seq.insert(0, T::gap(fresh, amount_mb)),
        Side::Right => seq.push(T::gap(fresh, amount_mb)),
    }
}

/// Consume free space at one end of a sequence.
pub(crate) fn shrink_edge<T: Extent>(seq: &mut Vec<T>, side: Side, amount_mb: u64) -> Result<()> {
    let edge = match side {
        Side::Left => Some(0),
        Side::Right => seq.len().checked_sub(1),
    };
    let below_floor = || {
        DiskError::new(
            ErrorReason::BelowUsedFloor,
            format!(
                "The extended partition has less than {} MB of unallocated space at its {side} edge.",
                amount_mb
            ),
        )
    };

    let Some(edge) = edge else {
        return Err(below_floor());
    };
    let gap = seq
        .get_mut(edge)
        .and_then(T::as_gap_mut)
        .ok_or_else(below_floor)?;
    if gap.size_mb < amount_mb {
        return Err(below_floor());
    }

    gap.size_mb -= amount_mb;
    if gap.size_mb == 0 {
        seq.remove(edge);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    total_mb: u64,
    regions: Vec<Region>,
    next_id: u64,
}

impl PartitionTable {
    /// A disk with nothing on it.
    pub fn blank(total_mb: u64) -> Result<Self> {
        Self::from_regions(
            total_mb,
            vec![Region::Unallocated(FreeSpace::new(
                RegionId::new(format!("{FREE_ID_PREFIX}0")),
                total_mb,
            ))],
        )
    }

    /// Build a table from explicit regions, rejecting any broken invariant.
    pub fn from_regions(total_mb: u64, regions: Vec<Region>) -> Result<Self> {
        let table = Self {
            total_mb,
            regions,
            next_id: 1,
        };
        table
            .verify()
            .map_err(|error| DiskError::invalid_layout(error.message))?;
        Ok(table)
    }

    /// The demo layout: C: 120 GB, Extended 200 GB { D: 200 GB }, 180 GB free.
    pub fn default_layout() -> Self {
        let c = Volume {
            id: "p1".into(),
            name: "C:".to_string(),
            size_mb: 120 * MB_PER_GB,
            file_system: FileSystem::Ntfs,
            used_mb: 60 * MB_PER_GB,
            status: VolumeStatus::Healthy,
        };
        let d = Volume {
            id: "p2".into(),
            name: "D:".to_string(),
            size_mb: 200 * MB_PER_GB,
            file_system: FileSystem::Ntfs,
            used_mb: 100 * MB_PER_GB,
            status: VolumeStatus::Healthy,
        };

        Self {
            total_mb: DEFAULT_DISK_MB,
            regions: vec![
                Region::Primary(c),
                Region::Extended(Extended {
                    id: "ext1".into(),
                    size_mb: 200 * MB_PER_GB,
                    children: vec![NestedRegion::Logical(d)],
                }),
                Region::Unallocated(FreeSpace::new("unallocated-1".into(), 180 * MB_PER_GB)),
            ],
            next_id: 1,
        }
    }

    pub fn total_mb(&self) -> u64 {
        self.total_mb
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn extended_index(&self) -> Option<usize> {
        self.regions
            .iter()
            .position(|region| matches!(region, Region::Extended(_)))
    }

    pub fn extended(&self) -> Option<&Extended> {
        self.regions.iter().find_map(|region| match region {
            Region::Extended(extended) => Some(extended),
            _ => None,
        })
    }

    /// Primary partitions plus the extended container.
    pub fn primary_slots_used(&self) -> usize {
        self.regions
            .iter()
            .filter(|region| !matches!(region, Region::Unallocated(_)))
            .count()
    }

    /// Resolve a reference: a region id, a partition name (case-insensitive),
    /// or the literal `Extended`.
    pub fn locate(&self, reference: &str) -> Option<Location> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(location) = self.locate_id(&RegionId::from(reference)) {
            return Some(location);
        }

        let by_name = self.all_locations().find(|location| {
            self.volume_at(*location)
                .is_some_and(|volume| volume.name.eq_ignore_ascii_case(reference))
        });
        if by_name.is_some() {
            return by_name;
        }

        if reference.eq_ignore_ascii_case(EXTENDED_REFERENCE) {
            return self.extended_index().map(Location::Top);
        }
        None
    }

    pub fn locate_id(&self, id: &RegionId) -> Option<Location> {
        self.all_locations()
            .find(|location| self.id_at(*location) == Some(id))
    }

    /// Every location in structural order, nested ones after their container.
    pub fn all_locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.regions
            .iter()
            .enumerate()
            .flat_map(|(parent, region)| {
                let nested = match region {
                    Region::Extended(extended) => extended.children.len(),
                    _ => 0,
                };
                std::iter::once(Location::Top(parent))
                    .chain((0..nested).map(move |index| Location::Nested { parent, index }))
            })
    }

    fn children(&self, parent: usize) -> Option<&Vec<NestedRegion>> {
        match self.regions.get(parent)? {
            Region::Extended(extended) => Some(&extended.children),
            _ => None,
        }
    }

    fn children_mut(&mut self, parent: usize) -> Result<&mut Vec<NestedRegion>> {
        match self.regions.get_mut(parent) {
            Some(Region::Extended(extended)) => Ok(&mut extended.children),
            _ => Err(DiskError::new(
                ErrorReason::ExtendedRequired,
                "There is no extended partition at this position.",
            )),
        }
    }

    fn nested(&self, parent: usize, index: usize) -> Option<&NestedRegion> {
        self.children(parent)?.get(index)
    }

    /// Reject a location that no longer points at a region.
    fn check_location(&self, location: Location) -> Result<()> {
        self.id_at(location).map(|_| ()).ok_or_else(stale_location)
    }

    pub fn id_at(&self, location: Location) -> Option<&RegionId> {
        match location {
            Location::Top(index) => self.regions.get(index).map(Region::id),
            Location::Nested { parent, index } => self.nested(parent, index).map(NestedRegion::id),
        }
    }

    pub fn kind_at(&self, location: Location) -> Option<RegionKind> {
        match location {
            Location::Top(index) => self.regions.get(index).map(Region::kind),
            Location::Nested { parent, index } => {
                self.nested(parent, index).map(NestedRegion::kind)
            }
        }
    }

    pub fn size_at(&self, location: Location) -> Option<u64> {
        match location {
            Location::Top(index) => self.regions.get(index).map(Region::size_mb),
            Location::Nested { parent, index } => {
                self.nested(parent, index).map(NestedRegion::size_mb)
            }
        }
    }

    pub fn volume_at(&self, location: Location) -> Option<&Volume> {
        match location {
            Location::Top(index) => match self.regions.get(index)? {
                Region::Primary(volume) => Some(volume),
                _ => None,
            },
            Location::Nested { parent, index } => match self.nested(parent, index)? {
                NestedRegion::Logical(volume) => Some(volume),
                NestedRegion::Unallocated(_) => None,
            },
        }
    }

    pub fn volume_at_mut(&mut self, location: Location) -> Option<&mut Volume> {
        match location {
            Location::Top(index) => match self.regions.get_mut(index)? {
                Region::Primary(volume) => Some(volume),
                _ => None,
            },
            Location::Nested { parent, index } => match self.children_mut(parent).ok()?.get_mut(index)? {
                NestedRegion::Logical(volume) => Some(volume),
                NestedRegion::Unallocated(_) => None,
            },
        }
    }

    pub fn gap_at(&self, location: Location) -> Option<&FreeSpace> {
        match location {
            Location::Top(index) => self.regions.get(index)?.as_gap(),
            Location::Nested { parent, index } => self.nested(parent, index)?.as_gap(),
        }
    }

    /// Free space structurally adjacent to `location` on `side`.
    pub fn neighbor_gap(&self, location: Location, side: Side) -> Option<&FreeSpace> {
        let len = self.sequence_len(location)?;
        let index = match location {
            Location::Top(index) | Location::Nested { index, .. } => index,
        };
        let neighbor = neighbor_index(len, index, side)?;
        self.gap_at(location.with_index(neighbor))
    }

    fn sequence_len(&self, location: Location) -> Option<usize> {
        match location {
            Location::Top(_) => Some(self.regions.len()),
            Location::Nested { parent, .. } => self.children(parent).map(Vec::len),
        }
    }

    /// The largest gap at the top level, or inside the extended container.
    /// Ties go to the leftmost gap.
    pub fn largest_gap(&self, nested: bool) -> Option<Location> {
        let mut best: Option<(Location, u64)> = None;
        let candidates: Vec<Location> = if nested {
            let parent = self.extended_index()?;
            let len = self.children(parent).map_or(0, Vec::len);
            (0..len)
                .map(|index| Location::Nested { parent, index })
                .collect()
        } else {
            (0..self.regions.len()).map(Location::Top).collect()
        };

        for location in candidates {
            if let Some(gap) = self.gap_at(location)
                && best.is_none_or(|(_, size)| gap.size_mb > size)
            {
                best = Some((location, gap.size_mb));
            }
        }
        best.map(|(location, _)| location)
    }

    /// All volumes with their names, in structural order.
    pub fn volumes(&self) -> impl Iterator<Item = &Volume> + '_ {
        self.all_locations()
            .filter_map(|location| self.volume_at(location))
    }

    pub fn contains_id(&self, id: &RegionId) -> bool {
        self.locate_id(id).is_some()
    }

    /// Allocate an id with `prefix` that is not used anywhere in the table.
    pub fn fresh_id(&mut self, prefix: &str) -> RegionId {
        loop {
            let id = RegionId::new(format!("{prefix}{}", self.next_id));
            self.next_id += 1;
            if !self.contains_id(&id) {
                return id;
            }
        }
    }

    /// Carve a volume out of the gap at `gap`. Top-level gaps produce a
    /// primary partition, nested ones a logical drive.
    pub fn insert_volume(&mut self, gap: Location, volume: Volume) -> Result<Location> {
        self.check_location(gap)?;
        match gap {
            Location::Top(index) => carve(&mut self.regions, index, Region::Primary(volume))?,
            Location::Nested { parent, index } => {
                carve(self.children_mut(parent)?, index, NestedRegion::Logical(volume))?
            }
        }
        Ok(gap)
    }

    /// Carve an empty extended container out of a top-level gap.
    pub fn insert_extended(&mut self, gap: Location, size_mb: u64) -> Result<Location> {
        let Location::Top(index) = gap else {
            return Err(DiskError::new(
                ErrorReason::InvalidTarget,
                "An extended partition cannot be nested inside another one.",
            ));
        };
        self.check_location(gap)?;
        let id = self.fresh_id(EXTENDED_ID_PREFIX);
        let free_id = self.fresh_id(FREE_ID_PREFIX);
        let extended = Extended {
            id,
            size_mb,
            children: vec![NestedRegion::gap(free_id, size_mb)],
        };
        carve(&mut self.regions, index, Region::Extended(extended))?;
        Ok(gap)
    }

    /// Convert the region at `location` into free space. Returns the
    /// location of the resulting (possibly merged) gap.
    pub fn release(&mut self, location: Location) -> Result<Location> {
        self.check_location(location)?;
        let fresh = self.fresh_id(FREE_ID_PREFIX);
        let index = match location {
            Location::Top(index) => release(&mut self.regions, index, fresh)?,
            Location::Nested { parent, index } => {
                release(self.children_mut(parent)?, index, fresh)?
            }
        };
        Ok(location.with_index(index))
    }

    /// Grow the region at `location` by `amount_mb` taken from its free
    /// neighbor on `side`. Returns the region's new location.
    pub fn grow(&mut self, location: Location, side: Side, amount_mb: u64) -> Result<Location> {
        self.check_location(location)?;
        let fresh = self.fresh_id(FREE_ID_PREFIX);
        match location {
            Location::Top(index) => {
                let index = take_from_neighbor(&mut self.regions, index, side, amount_mb)?;
                match &mut self.regions[index] {
                    Region::Primary(volume) => volume.size_mb += amount_mb,
                    Region::Extended(extended) => {
                        extended.size_mb += amount_mb;
                        grow_edge(&mut extended.children, side, amount_mb, fresh);
                    }
                    Region::Unallocated(_) => return Err(not_a_partition()),
                }
                Ok(Location::Top(index))
            }
            Location::Nested { parent, index } => {
                let children = self.children_mut(parent)?;
                let index = take_from_neighbor(children, index, side, amount_mb)?;
                match &mut children[index] {
                    NestedRegion::Logical(volume) => volume.size_mb += amount_mb,
                    NestedRegion::Unallocated(_) => return Err(not_a_partition()),
                }
                Ok(Location::Nested { parent, index })
            }
        }
    }

    /// Shrink the region at `location` by `amount_mb`, handing the space to
    /// its neighbor on `side`. Returns the region's new location.
    pub fn shrink(&mut self, location: Location, side: Side, amount_mb: u64) -> Result<Location> {
        self.check_location(location)?;
        let fresh = self.fresh_id(FREE_ID_PREFIX);
        match location {
            Location::Top(index) => {
                match self.regions.get_mut(index) {
                    Some(Region::Primary(volume)) => shrink_volume(volume, amount_mb)?,
                    Some(Region::Extended(extended)) => {
                        if amount_mb >= extended.size_mb {
                            return Err(too_large_shrink());
                        }
                        shrink_edge(&mut extended.children, side, amount_mb)?;
                        extended.size_mb -= amount_mb;
                    }
                    _ => return Err(not_a_partition()),
                }
                let index = give_to_neighbor(&mut self.regions, index, side, amount_mb, fresh);
                Ok(Location::Top(index))
            }
            Location::Nested { parent, index } => {
                let children = self.children_mut(parent)?;
                match children.get_mut(index) {
                    Some(NestedRegion::Logical(volume)) => shrink_volume(volume, amount_mb)?,
                    _ => return Err(not_a_partition()),
                }
                let index = give_to_neighbor(children, index, side, amount_mb, fresh);
                Ok(Location::Nested { parent, index })
            }
        }
    }

    /// Check every structural invariant of the table.
    pub fn verify(&self) -> Result<()> {
        let top_sum = checked_total(self.regions.iter().map(Region::size_mb))?;
        if top_sum != self.total_mb {
            return Err(broken(format!(
                "regions add up to {top_sum} MB but the disk has {} MB",
                self.total_mb
            )));
        }

        let extended_count = self
            .regions
            .iter()
            .filter(|region| matches!(region, Region::Extended(_)))
            .count();
        if extended_count > 1 {
            return Err(broken("more than one extended partition"));
        }

        check_sequence(&self.regions)?;

        for region in &self.regions {
            if let Region::Extended(extended) = region {
                let inner_sum = checked_total(extended.children.iter().map(NestedRegion::size_mb))?;
                if inner_sum != extended.size_mb {
                    return Err(broken(format!(
                        "extended partition {} holds {inner_sum} MB but is {} MB",
                        extended.id, extended.size_mb
                    )));
                }
                check_sequence(&extended.children)?;
            }
        }

        let mut ids = HashSet::new();
        for location in self.all_locations() {
            if let Some(id) = self.id_at(location)
                && !ids.insert(id)
            {
                return Err(broken(format!("duplicate region id {id}")));
            }
        }

        let mut names = HashSet::new();
        for volume in self.volumes() {
            if volume.used_mb > volume.size_mb {
                return Err(broken(format!(
                    "{} uses {} MB of {} MB",
                    volume.name, volume.used_mb, volume.size_mb
                )));
            }
            if !is_valid_name(&volume.name) {
                return Err(broken(format!("invalid partition name \"{}\"", volume.name)));
            }
            if shadows_reference(self, &volume.name, Some(&volume.id)) {
                return Err(broken(format!(
                    "partition name \"{}\" collides with a region reference",
                    volume.name
                )));
            }
            if !names.insert(volume.name.to_ascii_lowercase()) {
                return Err(broken(format!("duplicate partition name \"{}\"", volume.name)));
            }
        }

        Ok(())
    }

    /// Flattened rows for renderers.
    pub fn views(&self) -> Vec<RegionView> {
        let mut views = Vec::new();
        let mut offset_mb = 0;

        for region in &self.regions {
            views.push(self.view(region_row(region), offset_mb, None));
            if let Region::Extended(extended) = region {
                let mut child_offset = offset_mb;
                for child in &extended.children {
                    views.push(self.view(nested_row(child), child_offset, Some(&extended.id)));
                    child_offset += child.size_mb();
                }
            }
            offset_mb += region.size_mb();
        }
        views
    }

    fn view(&self, row: Row<'_>, offset_mb: u64, parent: Option<&RegionId>) -> RegionView {
        let (name, file_system, used_mb, status) = match row.volume {
            Some(volume) => (
                Some(volume.name.clone()),
                Some(volume.file_system),
                volume.used_mb,
                Some(volume.status),
            ),
            None => (None, None, row.size_mb - row.free_mb, None),
        };
        RegionView {
            id: row.id.clone(),
            name,
            kind: row.kind,
            size_mb: row.size_mb,
            offset_mb,
            percent_of_disk: percent_of_disk(row.size_mb, self.total_mb),
            file_system,
            used_mb,
            free_mb: row.free_mb,
            status,
            parent_id: parent.cloned(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_mb: self.total_mb,
            regions: self.views(),
        }
    }

    pub fn summary(&self) -> DiskSummary {
        let extended = self.extended();
        DiskSummary {
            total_mb: self.total_mb,
            unallocated_mb: self
                .regions
                .iter()
                .filter_map(|region| region.as_gap().map(|gap| gap.size_mb))
                .sum(),
            extended_free_mb: extended.map_or(0, Extended::free_mb),
            primary_count: self
                .regions
                .iter()
                .filter(|region| matches!(region, Region::Primary(_)))
                .count(),
            logical_count: extended.map_or(0, Extended::logical_count),
            has_extended: extended.is_some(),
        }
    }
}

struct Row<'a> {
    id: &'a RegionId,
    kind: RegionKind,
    size_mb: u64,
    free_mb: u64,
    volume: Option<&'a Volume>,
}

fn region_row(region: &Region) -> Row<'_> {
    match region {
        Region::Primary(volume) => Row {
            id: &volume.id,
            kind: RegionKind::Primary,
            size_mb: volume.size_mb,
            free_mb: volume.free_mb(),
            volume: Some(volume),
        },
        Region::Extended(extended) => Row {
            id: &extended.id,
            kind: RegionKind::Extended,
            size_mb: extended.size_mb,
            free_mb: extended.free_mb(),
            volume: None,
        },
        Region::Unallocated(free) => Row {
            id: &free.id,
            kind: RegionKind::Unallocated,
            size_mb: free.size_mb,
            free_mb: free.size_mb,
            volume: None,
        },
    }
}

fn nested_row(region: &NestedRegion) -> Row<'_> {
    match region {
        NestedRegion::Logical(volume) => Row {
            id: &volume.id,
            kind: RegionKind::Logical,
            size_mb: volume.size_mb,
            free_mb: volume.free_mb(),
            volume: Some(volume),
        },
        NestedRegion::Unallocated(free) => Row {
            id: &free.id,
            kind: RegionKind::Unallocated,
            size_mb: free.size_mb,
            free_mb: free.size_mb,
            volume: None,
        },
    }
}

fn check_sequence<T: Extent>(seq: &[T]) -> Result<()> {
    for item in seq {
        if item.extent_mb() == 0 {
            return Err(broken(format!("region {} has no size", item.extent_id())));
        }
    }
    for pair in seq.windows(2) {
        if pair[0].is_gap() && pair[1].is_gap() {
            return Err(broken(format!(
                "unallocated regions {} and {} are adjacent",
                pair[0].extent_id(),
                pair[1].extent_id()
            )));
        }
    }
    Ok(())
}

fn shrink_volume(volume: &mut Volume, amount_mb: u64) -> Result<()> {
    if amount_mb >= volume.size_mb {
        return Err(too_large_shrink());
    }
    if volume.size_mb - amount_mb < volume.used_mb {
        return Err(DiskError::new(
            ErrorReason::BelowUsedFloor,
            "Cannot shrink below the space already used by files.",
        ));
    }
    volume.size_mb -= amount_mb;
    Ok(())
}

fn too_large_shrink() -> DiskError {
    DiskError::new(
        ErrorReason::InvalidAmount,
        "The shrink amount must be smaller than the partition.",
    )
}

fn not_a_partition() -> DiskError {
    DiskError::new(
        ErrorReason::NotAPartition,
        "Unallocated space is not a partition.",
    )
}

fn broken(message: impl Into<String>) -> DiskError {
    DiskError::new(ErrorReason::InvalidLayout, message)
}

fn checked_total(mut sizes: impl Iterator<Item = u64>) -> Result<u64> {
    sizes
        .try_fold(0u64, u64::checked_add)
        .ok_or_else(|| broken("region sizes overflow"))
}

fn stale_location() -> DiskError {
    DiskError::new(
        ErrorReason::RegionNotFound,
        "The specified region no longer exists.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(id: &str, size_mb: u64) -> Region {
        Region::Unallocated(FreeSpace::new(id.into(), size_mb))
    }

    fn primary(id: &str, name: &str, size_mb: u64) -> Region {
        Region::Primary(Volume::new(id.into(), name, size_mb, FileSystem::Ntfs))
    }

    fn sizes(table: &PartitionTable) -> Vec<(String, u64)> {
        table
            .regions()
            .iter()
            .map(|region| (region.id().to_string(), region.size_mb()))
            .collect()
    }

    #[test]
    fn default_layout_is_consistent() {
        let table = PartitionTable::default_layout();
        table.verify().unwrap();
        assert_eq!(table.total_mb(), 512_000);
        assert_eq!(table.primary_slots_used(), 2);
        assert_eq!(table.extended().map(Extended::logical_count), Some(1));
    }

    #[test]
    fn carve_keeps_remainder_to_the_right() {
        let mut seq = vec![gap("free-a", 1000)];
        carve(&mut seq, 0, primary("p1", "C:", 400)).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0].id().as_str(), "p1");
        assert_eq!(seq[1].id().as_str(), "free-a");
        assert_eq!(seq[1].size_mb(), 600);
    }

    #[test]
    fn carve_consumes_exact_gap() {
        let mut seq = vec![gap("free-a", 400)];
        carve(&mut seq, 0, primary("p1", "C:", 400)).unwrap();
        assert_eq!(seq, vec![primary("p1", "C:", 400)]);
    }

    #[test]
    fn carve_rejects_oversized_and_non_gap_targets() {
        let mut seq = vec![primary("p1", "C:", 400), gap("free-a", 100)];
        let error = carve(&mut seq, 1, primary("p2", "D:", 200)).unwrap_err();
        assert_eq!(error.reason, ErrorReason::InsufficientSpace);
        let error = carve(&mut seq, 0, primary("p2", "D:", 50)).unwrap_err();
        assert_eq!(error.reason, ErrorReason::InvalidTarget);
    }

    #[test]
    fn release_merges_both_neighbors_keeping_left_id() {
        let mut seq = vec![
            gap("free-a", 100),
            primary("p1", "C:", 200),
            gap("free-b", 300),
        ];
        let index = release(&mut seq, 1, "fresh".into()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(seq, vec![gap("free-a", 600)]);
    }

    #[test]
    fn release_uses_right_id_then_fresh() {
        let mut seq = vec![primary("p1", "C:", 200), gap("free-b", 300)];
        release(&mut seq, 0, "fresh".into()).unwrap();
        assert_eq!(seq, vec![gap("free-b", 500)]);

        let mut seq = vec![primary("p1", "C:", 200), primary("p2", "D:", 300)];
        release(&mut seq, 1, "fresh".into()).unwrap();
        assert_eq!(seq[1], gap("fresh", 300));
    }

    #[test]
    fn take_from_neighbor_removes_exhausted_gap() {
        let mut seq = vec![gap("free-a", 100), primary("p1", "C:", 200)];
        let index = take_from_neighbor(&mut seq, 1, Side::Left, 100).unwrap();
        assert_eq!(index, 0);
        assert_eq!(seq.len(), 1);

        let error = take_from_neighbor(&mut seq, 0, Side::Right, 10).unwrap_err();
        assert_eq!(error.reason, ErrorReason::NoAdjacentUnallocated);
    }

    #[test]
    fn give_to_neighbor_inserts_gap_when_needed() {
        let mut seq = vec![primary("p1", "C:", 200), primary("p2", "D:", 200)];
        let index = give_to_neighbor(&mut seq, 1, Side::Left, 50, "free-x".into());
        assert_eq!(index, 2);
        assert_eq!(seq[1], gap("free-x", 50));

        let index = give_to_neighbor(&mut seq, 0, Side::Right, 25, "unused".into());
        assert_eq!(index, 0);
        assert_eq!(seq[1], gap("free-x", 75));
    }

    #[test]
    fn stale_locations_are_rejected_without_mutation() {
        let mut table = PartitionTable::default_layout();
        let before = table.clone();

        let error = table.release(Location::Top(99)).unwrap_err();
        assert_eq!(error.reason, ErrorReason::RegionNotFound);
        let error = table.grow(Location::Top(9), Side::Left, 1).unwrap_err();
        assert_eq!(error.reason, ErrorReason::RegionNotFound);
        let error = table
            .shrink(Location::Nested { parent: 1, index: 5 }, Side::Right, 1)
            .unwrap_err();
        assert_eq!(error.reason, ErrorReason::RegionNotFound);
        let volume = Volume::new("p9".into(), "Z:", 100, FileSystem::Ntfs);
        let error = table.insert_volume(Location::Top(42), volume).unwrap_err();
        assert_eq!(error.reason, ErrorReason::RegionNotFound);

        assert_eq!(table.regions(), before.regions());

        let mut seq = vec![primary("p1", "C:", 200)];
        assert!(release(&mut seq, 3, "fresh".into()).is_err());
        assert!(take_from_neighbor(&mut seq, 3, Side::Left, 1).is_err());
    }

    #[test]
    fn names_shadowing_references_fail_verification() {
        let error = PartitionTable::from_regions(
            300,
            vec![primary("p1", "Extended", 100), primary("p2", "p1", 200)],
        )
        .unwrap_err();
        assert_eq!(error.reason, ErrorReason::InvalidLayout);
    }

    #[test]
    fn overflowing_sizes_fail_verification() {
        let error = PartitionTable::from_regions(
            u64::MAX,
            vec![primary("p1", "C:", u64::MAX), gap("free-1", 2)],
        )
        .unwrap_err();
        assert_eq!(error.reason, ErrorReason::InvalidLayout);
        assert!(error.message.contains("overflow"));
    }

    #[test]
    fn shrink_edge_requires_edge_gap() {
        let mut seq = vec![
            NestedRegion::gap("free-a".into(), 100),
            NestedRegion::Logical(Volume::new("p2".into(), "D:", 200, FileSystem::Ntfs)),
        ];
        let error = shrink_edge(&mut seq, Side::Right, 10).unwrap_err();
        assert_eq!(error.reason, ErrorReason::BelowUsedFloor);
        shrink_edge(&mut seq, Side::Left, 100).unwrap();
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn locate_by_id_name_and_extended_literal() {
        let table = PartitionTable::default_layout();
        assert_eq!(table.locate("p1"), Some(Location::Top(0)));
        assert_eq!(table.locate("c:"), Some(Location::Top(0)));
        assert_eq!(
            table.locate("D:"),
            Some(Location::Nested {
                parent: 1,
                index: 0
            })
        );
        assert_eq!(table.locate("Extended"), Some(Location::Top(1)));
        assert_eq!(table.locate("Z:"), None);
        assert_eq!(table.locate(""), None);
    }

    #[test]
    fn shrink_then_grow_restores_sizes() {
        let mut table = PartitionTable::default_layout();
        let before = sizes(&table);

        let location = table.shrink(Location::Top(0), Side::Right, 20 * 1024).unwrap();
        table.verify().unwrap();
        assert_eq!(table.regions().len(), 4);

        table.grow(location, Side::Right, 20 * 1024).unwrap();
        table.verify().unwrap();
        assert_eq!(sizes(&table), before);
    }

    #[test]
    fn growing_extended_adds_internal_gap_at_matching_edge() {
        let mut table = PartitionTable::default_layout();
        table.grow(Location::Top(1), Side::Right, 1024).unwrap();
        table.verify().unwrap();

        let extended = table.extended().unwrap();
        assert_eq!(extended.size_mb, 201 * 1024);
        assert_eq!(extended.edge_free_mb(Side::Right), 1024);

        table.shrink(Location::Top(1), Side::Right, 1024).unwrap();
        table.verify().unwrap();
        assert_eq!(table.extended().unwrap().children.len(), 1);
    }

    #[test]
    fn verify_reports_broken_invariants() {
        let error = PartitionTable::from_regions(1000, vec![gap("a", 500), gap("b", 500)])
            .unwrap_err();
        assert_eq!(error.reason, ErrorReason::InvalidLayout);

        let error = PartitionTable::from_regions(1000, vec![gap("a", 900)]).unwrap_err();
        assert_eq!(error.reason, ErrorReason::InvalidLayout);

        let error = PartitionTable::from_regions(
            1000,
            vec![primary("p1", "C:", 500), primary("p2", "c:", 500)],
        )
        .unwrap_err();
        assert!(error.message.contains("duplicate partition name"));
    }

    #[test]
    fn fresh_ids_skip_existing_ones() {
        let mut table =
            PartitionTable::from_regions(1000, vec![primary("part-1", "C:", 1000)]).unwrap();
        assert_eq!(table.fresh_id(PRIMARY_ID_PREFIX).as_str(), "part-2");
        assert_eq!(table.fresh_id(FREE_ID_PREFIX).as_str(), "free-3");
    }

    #[test]
    fn views_carry_offsets_and_parents() {
        let table = PartitionTable::default_layout();
        let views = table.views();
        assert_eq!(views.len(), 4);
        assert_eq!(views[1].kind, RegionKind::Extended);
        assert_eq!(views[2].parent_id.as_ref().map(RegionId::as_str), Some("ext1"));
        assert_eq!(views[2].offset_mb, 120 * 1024);
        assert_eq!(views[3].offset_mb, 320 * 1024);
        assert!((views[0].percent_of_disk - 24.0).abs() < 1e-9);
    }

    #[test]
    fn summary_counts_partitions() {
        let summary = PartitionTable::default_layout().summary();
        assert_eq!(summary.unallocated_mb, 180 * 1024);
        assert_eq!(summary.primary_count, 1);
        assert_eq!(summary.logical_count, 1);
        assert_eq!(summary.extended_free_mb, 0);
        assert!(summary.has_extended);
    }
}
