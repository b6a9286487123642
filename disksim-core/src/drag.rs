// SPDX-License-Identifier: GPL-3.0-only

//! Drag-to-resize interaction
//!
//! A [`DragSession`] turns continuous pointer motion on one edge of a region
//! into a single signed size delta. It never touches the table: motion only
//! produces previews, and release produces at most one [`Command`].

use serde::{Deserialize, Serialize};

use disksim_types::{
    DiskError, RegionId, Result, Side, clamp_percent, percent_of_disk, pixels_to_percent,
    size_for_percent,
};

use crate::command::Command;

pub const DEFAULT_BAR_WIDTH_PX: f64 = 1000.0;
pub const DEFAULT_MIN_WIDTH_PERCENT: f64 = 5.0;
pub const DEFAULT_MAX_WIDTH_PERCENT: f64 = 95.0;

/// Geometry used to convert pointer motion into sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragSettings {
    pub bar_width_px: f64,
    pub min_width_percent: f64,
    pub max_width_percent: f64,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            bar_width_px: DEFAULT_BAR_WIDTH_PX,
            min_width_percent: DEFAULT_MIN_WIDTH_PERCENT,
            max_width_percent: DEFAULT_MAX_WIDTH_PERCENT,
        }
    }
}

/// The region edge being dragged, captured when the drag begins.
#[derive(Debug, Clone, PartialEq)]
pub struct DragTarget {
    pub region_id: RegionId,
    pub side: Side,
    pub baseline_mb: u64,
    pub total_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        target: DragTarget,
        origin_px: f64,
        current_px: f64,
    },
}

/// Size the region would have if released at the current pointer position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragPreview {
    pub region_id: RegionId,
    pub side: Side,
    pub baseline_mb: u64,
    pub candidate_mb: u64,
    pub delta_mb: i64,
    pub percent_of_disk: f64,
}

/// Final delta of a released drag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragCommit {
    pub region_id: RegionId,
    pub side: Side,
    pub delta_mb: i64,
}

impl DragCommit {
    /// The one command this drag maps to: grow becomes an extend, a smaller
    /// size a shrink, and no change nothing at all.
    pub fn command(&self) -> Option<Command> {
        let target = self.region_id.to_string();
        let amount_mb = self.delta_mb.unsigned_abs();
        match self.delta_mb {
            0 => None,
            delta if delta > 0 => Some(Command::Extend {
                target,
                amount_mb,
                side: self.side,
            }),
            _ => Some(Command::Shrink {
                target,
                amount_mb,
                side: self.side,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DragState,
    settings: DragSettings,
}

impl DragSession {
    pub fn new(settings: DragSettings) -> Self {
        Self {
            state: DragState::Idle,
            settings,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn settings(&self) -> &DragSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn begin(&mut self, target: DragTarget, pointer_px: f64) -> Result<DragPreview> {
        if self.is_active() {
            return Err(DiskError::busy());
        }

        let preview = self.preview(&target, 0.0);
        tracing::debug!(
            region = %target.region_id,
            side = %target.side,
            baseline_mb = target.baseline_mb,
            "Drag started"
        );
        self.state = DragState::Dragging {
            target,
            origin_px: pointer_px,
            current_px: pointer_px,
        };
        Ok(preview)
    }

    /// Track the pointer. Returns `None` when no drag is active.
    pub fn update(&mut self, pointer_px: f64) -> Option<DragPreview> {
        let DragState::Dragging {
            target,
            origin_px,
            current_px,
        } = &mut self.state
        else {
            return None;
        };

        *current_px = pointer_px;
        let delta_px = pointer_px - *origin_px;
        let target = target.clone();
        let preview = self.preview(&target, delta_px);
        tracing::debug!(
            region = %preview.region_id,
            candidate_mb = preview.candidate_mb,
            delta_mb = preview.delta_mb,
            "Drag preview"
        );
        Some(preview)
    }

    /// Release the pointer and return to idle. Returns `None` when no drag
    /// was active.
    pub fn end(&mut self, pointer_px: f64) -> Option<DragCommit> {
        let DragState::Dragging {
            target, origin_px, ..
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };

        let preview = self.preview(&target, pointer_px - origin_px);
        Some(DragCommit {
            region_id: target.region_id,
            side: target.side,
            delta_mb: preview.delta_mb,
        })
    }

    /// Abandon the drag. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        if was_active {
            tracing::debug!("Drag cancelled");
        }
        self.state = DragState::Idle;
        was_active
    }

    fn preview(&self, target: &DragTarget, delta_px: f64) -> DragPreview {
        let baseline_percent = percent_of_disk(target.baseline_mb, target.total_mb);
        let delta_percent = pixels_to_percent(delta_px, self.settings.bar_width_px);
        let raw_percent = match target.side {
            Side::Right => baseline_percent + delta_percent,
            Side::Left => baseline_percent - delta_percent,
        };

        // A region already outside the bounds may stay where it is.
        let low = self.settings.min_width_percent.min(baseline_percent);
        let high = self.settings.max_width_percent.max(baseline_percent);
        let percent = clamp_percent(raw_percent, low, high);

        let candidate_mb = if delta_percent == 0.0 {
            target.baseline_mb
        } else {
            size_for_percent(percent, target.total_mb)
        };
        DragPreview {
            region_id: target.region_id.clone(),
            side: target.side,
            baseline_mb: target.baseline_mb,
            candidate_mb,
            delta_mb: candidate_mb as i64 - target.baseline_mb as i64,
            percent_of_disk: percent,
        }
    }
}
