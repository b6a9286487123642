// SPDX-License-Identifier: GPL-3.0-only

//! Initial disk layouts described in TOML
//!
//! Layout files live in `resources/layouts/<name>.toml`. Sizes are either a
//! whole number of megabytes or size text such as `"120 GB"`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use disksim_types::{
    DiskError, Extended, FileSystem, FreeSpace, NestedRegion, Region, RegionId, Volume, parse_size,
};

use crate::table::{EXTENDED_ID_PREFIX, FREE_ID_PREFIX, PRIMARY_ID_PREFIX, PartitionTable};

pub const BUILTIN_LAYOUT: &str = "default";

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout '{name}' not found in resources/layouts")]
    NotFound { name: String },
    #[error("cannot read layout {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("invalid layout '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LayoutError>;

impl From<LayoutError> for DiskError {
    fn from(error: LayoutError) -> Self {
        DiskError::invalid_layout(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Mb(u64),
    Text(String),
}

impl SizeSpec {
    fn to_mb(&self) -> std::result::Result<u64, String> {
        match self {
            Self::Mb(value) => Ok(*value),
            Self::Text(text) => parse_size(text).map_err(|error| error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSpecKind {
    Primary,
    Extended,
    Logical,
    Unallocated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    #[serde(rename = "type")]
    pub kind: RegionSpecKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub size: SizeSpec,
    #[serde(default)]
    pub used: Option<SizeSpec>,
    #[serde(default)]
    pub file_system: Option<FileSystem>,
    #[serde(default)]
    pub children: Vec<RegionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub total: SizeSpec,
    pub regions: Vec<RegionSpec>,
}

impl LayoutSpec {
    /// Turn the description into a table, checking every invariant.
    pub fn build(&self) -> Result<PartitionTable> {
        let invalid = |reason: String| LayoutError::Invalid {
            name: self.name.clone(),
            reason,
        };

        let total_mb = self.total.to_mb().map_err(&invalid)?;
        let mut ids = IdAllocator::new(&self.regions);
        let mut regions = Vec::with_capacity(self.regions.len());

        for spec in &self.regions {
            let size_mb = spec.size.to_mb().map_err(&invalid)?;
            let region = match spec.kind {
                RegionSpecKind::Primary => {
                    let id = ids.next(spec, PRIMARY_ID_PREFIX);
                    Region::Primary(volume(spec, size_mb, id).map_err(&invalid)?)
                }
                RegionSpecKind::Extended => {
                    let mut children = Vec::with_capacity(spec.children.len());
                    for child in &spec.children {
                        let child_mb = child.size.to_mb().map_err(&invalid)?;
                        children.push(match child.kind {
                            RegionSpecKind::Logical => NestedRegion::Logical(
                                volume(child, child_mb, ids.next(child, PRIMARY_ID_PREFIX))
                                    .map_err(&invalid)?,
                            ),
                            RegionSpecKind::Unallocated => NestedRegion::Unallocated(
                                FreeSpace::new(ids.next(child, FREE_ID_PREFIX), child_mb),
                            ),
                            other => {
                                return Err(invalid(format!(
                                    "{other:?} regions cannot be nested in the extended partition"
                                )));
                            }
                        });
                    }
                    Region::Extended(Extended {
                        id: ids.next(spec, EXTENDED_ID_PREFIX),
                        size_mb,
                        children,
                    })
                }
                RegionSpecKind::Unallocated => {
                    Region::Unallocated(FreeSpace::new(ids.next(spec, FREE_ID_PREFIX), size_mb))
                }
                RegionSpecKind::Logical => {
                    return Err(invalid(
                        "logical drives must be children of the extended partition".to_string(),
                    ));
                }
            };

            if spec.kind != RegionSpecKind::Extended && !spec.children.is_empty() {
                return Err(invalid(format!(
                    "only the extended partition can have children ({})",
                    region.id()
                )));
            }
            regions.push(region);
        }

        PartitionTable::from_regions(total_mb, regions).map_err(|error| invalid(error.message))
    }
}

fn volume(spec: &RegionSpec, size_mb: u64, id: RegionId) -> std::result::Result<Volume, String> {
    let name = spec
        .name
        .clone()
        .ok_or_else(|| format!("partition {id} needs a name"))?;
    let used_mb = match &spec.used {
        Some(used) => used.to_mb()?,
        None => 0,
    };
    let mut volume = Volume::new(id, name, size_mb, spec.file_system.unwrap_or_default());
    volume.used_mb = used_mb;
    Ok(volume)
}

/// Hands out ids for regions that do not name one, avoiding every explicit id.
struct IdAllocator {
    taken: HashSet<String>,
    counter: u64,
}

impl IdAllocator {
    fn new(regions: &[RegionSpec]) -> Self {
        let mut taken = HashSet::new();
        for spec in regions {
            taken.extend(spec.id.clone());
            for child in &spec.children {
                taken.extend(child.id.clone());
            }
        }
        Self { taken, counter: 0 }
    }

    fn next(&mut self, spec: &RegionSpec, prefix: &str) -> RegionId {
        if let Some(id) = &spec.id {
            return RegionId::new(id.clone());
        }
        loop {
            self.counter += 1;
            let candidate = format!("{prefix}{}", self.counter);
            if self.taken.insert(candidate.clone()) {
                return RegionId::new(candidate);
            }
        }
    }
}

pub fn workspace_root() -> PathBuf {
    if let Ok(value) = std::env::var("DISKSIM_WORKSPACE_ROOT") {
        return PathBuf::from(value);
    }

    if let Ok(current_dir) = std::env::current_dir()
        && current_dir.join("resources/layouts").exists()
    {
        return current_dir;
    }

    let manifest_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if manifest_root.join("resources/layouts").exists() {
        return manifest_root;
    }

    PathBuf::from(".")
}

pub fn layouts_root() -> PathBuf {
    workspace_root().join("resources/layouts")
}

pub fn layout_path_for_name(layout_name: &str) -> PathBuf {
    layouts_root().join(format!("{layout_name}.toml"))
}

/// Names of the layouts shipped in `resources/layouts`, sorted.
pub fn available_layouts() -> Vec<String> {
    let Ok(entries) = fs::read_dir(layouts_root()) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    names.sort();
    names
}

pub fn parse(layout_name: &str, raw: &str) -> Result<LayoutSpec> {
    toml::from_str(raw).map_err(|error| LayoutError::Invalid {
        name: layout_name.to_string(),
        reason: error.to_string(),
    })
}

pub fn load_path(path: &Path) -> Result<LayoutSpec> {
    let raw = fs::read_to_string(path).map_err(|error| LayoutError::Unreadable {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    let layout_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse(&layout_name, &raw)
}

pub fn load_by_name(layout_name: &str) -> Result<LayoutSpec> {
    let path = layout_path_for_name(layout_name);
    if !path.exists() {
        return Err(LayoutError::NotFound {
            name: layout_name.to_string(),
        });
    }
    load_path(&path)
}

/// Build the table for a layout name or file path. The built-in default
/// needs no file on disk.
pub fn resolve(layout: &str) -> Result<PartitionTable> {
    let path = Path::new(layout);
    if path.extension().is_some_and(|ext| ext == "toml") || path.components().count() > 1 {
        return load_path(path)?.build();
    }

    if layout == BUILTIN_LAYOUT && !layout_path_for_name(layout).exists() {
        tracing::debug!("Using built-in default layout");
        return Ok(PartitionTable::default_layout());
    }
    load_by_name(layout)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    use disksim_types::ErrorReason;

    #[test]
    fn shipped_default_matches_builtin_layout() {
        let table = load_by_name(BUILTIN_LAYOUT).unwrap().build().unwrap();
        assert_eq!(table.regions(), PartitionTable::default_layout().regions());
        assert_eq!(table.total_mb(), PartitionTable::default_layout().total_mb());
    }

    #[test]
    fn every_shipped_layout_is_valid() {
        let names = available_layouts();
        assert!(names.contains(&BUILTIN_LAYOUT.to_string()));
        for name in names {
            load_by_name(&name).unwrap().build().unwrap();
        }
    }

    #[test]
    fn missing_ids_are_generated_without_collisions() {
        let spec = parse(
            "inline",
            r#"
name = "inline"
total = 3000

[[regions]]
type = "primary"
name = "C:"
size = 1000

[[regions]]
type = "unallocated"
id = "free-1"
size = 1000

[[regions]]
type = "primary"
name = "D:"
size = 1000
used = 200
file_system = "FAT32"
"#,
        )
        .unwrap();
        let table = spec.build().unwrap();
        let ids: Vec<&str> = table.regions().iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["part-1", "free-1", "part-2"]);
    }

    #[test]
    fn broken_layouts_are_rejected() {
        let spec = parse(
            "gaps",
            r#"
name = "gaps"
total = "2 GB"

[[regions]]
type = "unallocated"
size = "1 GB"

[[regions]]
type = "unallocated"
size = "1 GB"
"#,
        )
        .unwrap();
        let error = spec.build().unwrap_err();
        assert!(matches!(error, LayoutError::Invalid { .. }));
        let error = DiskError::from(error);
        assert_eq!(error.reason, ErrorReason::InvalidLayout);

        let spec = parse(
            "stray",
            r#"
name = "stray"
total = 1000

[[regions]]
type = "logical"
name = "E:"
size = 1000
"#,
        )
        .unwrap();
        assert!(spec.build().is_err());

        assert!(matches!(
            load_by_name("does-not-exist"),
            Err(LayoutError::NotFound { .. })
        ));
    }

    #[test]
    fn resolve_falls_back_to_builtin_default() {
        let table = resolve(BUILTIN_LAYOUT).unwrap();
        assert_eq!(table.regions(), PartitionTable::default_layout().regions());
    }
}
