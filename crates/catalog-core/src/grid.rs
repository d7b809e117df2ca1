//! Grid metrics and overlay rectangles.
//!
//! The page lays products out in a CSS-like grid; the engine mirrors that grid
//! on the object plane so invisible overlay hit-targets and 3D objects stay
//! pixel-aligned.

use crate::constants::*;
use crate::projection::{Projector, Viewport};
use glam::Vec3;
use serde::Serialize;

/// Snapshot of the grid for one viewport size. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GridMetrics {
    pub columns: usize,
    pub row_height_px: f32,
    pub top_offset_px: f32,
    pub column_width_px: f32,
    pub viewport_height_px: f32,
    pub world_column_width: f32,
    pub world_row_height: f32,
    pub world_total_width: f32,
    pub first_row_world_y: f32,
    pub units_per_px_y: f32,
    /// Per-item world size for a regular tile.
    pub target_size: f32,
}

impl GridMetrics {
    /// World Y of the line above the first row.
    pub fn top_world_y(&self) -> f32 {
        self.first_row_world_y + self.world_row_height * 0.5
    }

    pub fn rows_for(&self, count: usize) -> usize {
        count.div_ceil(self.columns.max(1))
    }

    /// Resting world position of the tile at `index`.
    pub fn cell_world_position(&self, index: usize, slide: f32) -> Vec3 {
        let columns = self.columns.max(1);
        let row = index / columns;
        let col = index % columns;
        let col_offset = col as f32 - (columns as f32 - 1.0) / 2.0;
        Vec3::new(
            DEFAULT_CAM_POS.x + col_offset * self.world_column_width,
            self.first_row_world_y - row as f32 * self.world_row_height + slide,
            OBJECT_PLANE_Z,
        )
    }

    /// Pixel rectangle of the tile at `index`, relative to the scroll content.
    pub fn cell_rect(&self, index: usize) -> (f32, f32, f32, f32) {
        let columns = self.columns.max(1);
        let row = index / columns;
        let col = index % columns;
        (
            col as f32 * self.column_width_px,
            self.top_offset_px + row as f32 * self.row_height_px,
            self.column_width_px,
            self.row_height_px,
        )
    }

    /// Height of the scrollable content for `count` tiles.
    pub fn content_height_px(&self, count: usize) -> f32 {
        let rows = count.max(1).div_ceil(self.columns.max(1));
        rows as f32 * self.row_height_px + self.row_height_px * CONTENT_BOTTOM_PADDING_ROWS
    }
}

/// Derive grid metrics from the viewport.
///
/// Pixel sizes convert to world units at the object plane as seen from the
/// default camera depth `camera_z`. Pure and idempotent.
pub fn compute_metrics(viewport: Viewport, camera_z: f32, fovy_radians: f32) -> GridMetrics {
    let size = viewport.size();
    let (w, h) = (size.x, size.y);
    let narrow = w <= NARROW_LAYOUT_MAX_WIDTH_PX;
    let columns = if narrow { NARROW_COLUMNS } else { WIDE_COLUMNS };
    let row_height_px = h * if narrow {
        NARROW_ROW_HEIGHT_FRAC
    } else {
        WIDE_ROW_HEIGHT_FRAC
    };
    let top_offset_px = h * GRID_TOP_OFFSET_FRAC;
    let column_width_px = w / columns as f32;

    let projector = Projector {
        eye: Vec3::new(DEFAULT_CAM_POS.x, DEFAULT_CAM_POS.y, camera_z),
        fovy_radians,
        viewport,
    };
    let depth = projector.dist_obj();
    let units_per_px_x = projector.units_per_px_x_at(depth);
    let units_per_px_y = projector.units_per_px_y_at(depth);

    let world_column_width = column_width_px * units_per_px_x;
    let world_row_height = row_height_px * units_per_px_y;
    let first_row_center_px = top_offset_px + row_height_px * 0.5;
    let first_row_world_y = DEFAULT_CAM_POS.y + (h * 0.5 - first_row_center_px) * units_per_px_y;

    GridMetrics {
        columns,
        row_height_px,
        top_offset_px,
        column_width_px,
        viewport_height_px: h,
        world_column_width,
        world_row_height,
        world_total_width: world_column_width * columns as f32,
        first_row_world_y,
        units_per_px_y,
        target_size: world_row_height.min(world_column_width) * CELL_FILL_FRAC,
    }
}

/// Pixel-space hit region for one loaded entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRect {
    pub id: String,
    pub index: usize,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// What the page polls each frame. Replace wholesale when `version` changes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayData {
    pub rects: Vec<OverlayRect>,
    pub content_height_px: f32,
    pub top_offset_px: f32,
    pub row_height_px: f32,
    pub version: u64,
}

/// Versioned overlay state; the version only moves on a genuine change.
#[derive(Debug, Default)]
pub struct OverlayState {
    rects: Vec<OverlayRect>,
    content_height_px: f32,
    top_offset_px: f32,
    row_height_px: f32,
    version: u64,
}

impl OverlayState {
    /// Offer a freshly computed layout; returns true if the version bumped.
    pub fn publish(&mut self, rects: Vec<OverlayRect>, metrics: &GridMetrics, count: usize) -> bool {
        let content_height_px = metrics.content_height_px(count);
        let mut changed = rects != self.rects;
        if !changed {
            let height_changed =
                (content_height_px - self.content_height_px).abs() > OVERLAY_METRIC_EPSILON_PX;
            let top_changed =
                (metrics.top_offset_px - self.top_offset_px).abs() > OVERLAY_METRIC_EPSILON_PX;
            changed = height_changed || top_changed;
        }
        if changed {
            self.rects = rects;
            self.content_height_px = content_height_px;
            self.top_offset_px = metrics.top_offset_px;
            self.row_height_px = metrics.row_height_px;
            self.version += 1;
        }
        changed
    }

    /// Drop every rect when the entries they describe are gone. Returns true
    /// if the version bumped.
    pub fn clear(&mut self) -> bool {
        if self.rects.is_empty() {
            return false;
        }
        self.rects.clear();
        self.version += 1;
        true
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> OverlayData {
        OverlayData {
            rects: self.rects.clone(),
            content_height_px: self.content_height_px,
            top_offset_px: self.top_offset_px,
            row_height_px: self.row_height_px,
            version: self.version,
        }
    }
}
