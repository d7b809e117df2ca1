// Host-side tests for grid metrics and the overlay version counter.

use catalog_core::constants::*;
use catalog_core::grid::{compute_metrics, OverlayRect, OverlayState};
use catalog_core::projection::{Projector, Viewport};
use glam::Vec3;

fn fovy() -> f32 {
    CAMERA_FOV_Y_DEG.to_radians()
}

#[test]
fn columns_span_the_viewport_at_object_depth() {
    for (w, h) in [(1200.0, 800.0), (390.0, 844.0), (2560.0, 1440.0)] {
        let vp = Viewport::new(w, h);
        let m = compute_metrics(vp, DEFAULT_CAM_POS.z, fovy());
        let p = Projector {
            eye: DEFAULT_CAM_POS,
            fovy_radians: fovy(),
            viewport: vp,
        };
        let expected = p.viewport_width_at_depth(p.dist_obj());
        let total = m.world_column_width * m.columns as f32;
        assert!((total - expected).abs() < 1e-4, "{w}x{h}: {total} vs {expected}");
        assert!((m.world_total_width - expected).abs() < 1e-4);
    }
}

#[test]
fn narrow_viewports_use_two_columns() {
    let narrow = compute_metrics(Viewport::new(600.0, 900.0), DEFAULT_CAM_POS.z, fovy());
    let wide = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, fovy());
    assert_eq!(narrow.columns, NARROW_COLUMNS);
    assert_eq!(wide.columns, WIDE_COLUMNS);
    assert!((narrow.row_height_px - 900.0 * NARROW_ROW_HEIGHT_FRAC).abs() < 1e-4);
}

#[test]
fn metrics_are_idempotent() {
    let vp = Viewport::new(1024.0, 768.0);
    let a = compute_metrics(vp, DEFAULT_CAM_POS.z, fovy());
    let b = compute_metrics(vp, DEFAULT_CAM_POS.z, fovy());
    assert_eq!(a, b);
}

#[test]
fn cell_positions_project_onto_their_overlay_rects() {
    let vp = Viewport::new(1200.0, 800.0);
    let m = compute_metrics(vp, DEFAULT_CAM_POS.z, fovy());
    let p = Projector {
        eye: DEFAULT_CAM_POS,
        fovy_radians: fovy(),
        viewport: vp,
    };
    for index in [0, 3, 5] {
        let (left, top, width, height) = m.cell_rect(index);
        let px = p.project_to_px(m.cell_world_position(index, 0.0));
        assert!((px.x - (left + width * 0.5)).abs() < 0.05, "x {index}: {px:?}");
        assert!((px.y - (top + height * 0.5)).abs() < 0.05, "y {index}: {px:?}");
    }
    assert_eq!(m.cell_world_position(0, 0.0).z, OBJECT_PLANE_Z);
}

#[test]
fn slide_shifts_cells_vertically() {
    let m = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, fovy());
    let a = m.cell_world_position(2, 0.0);
    let b = m.cell_world_position(2, -0.5);
    assert_eq!(b - a, Vec3::new(0.0, -0.5, 0.0));
}

#[test]
fn content_height_counts_rows_plus_padding() {
    let m = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, fovy());
    let expected = 2.0 * m.row_height_px + m.row_height_px * CONTENT_BOTTOM_PADDING_ROWS;
    assert!((m.content_height_px(5) - expected).abs() < 1e-3);
    assert_eq!(m.content_height_px(0), m.content_height_px(1));
}

#[test]
fn overlay_version_moves_only_on_change() {
    let m = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, fovy());
    let rect = |id: &str, index: usize| {
        let (left, top, width, height) = m.cell_rect(index);
        OverlayRect {
            id: id.to_string(),
            index,
            left,
            top,
            width,
            height,
        }
    };
    let mut state = OverlayState::default();
    assert!(state.publish(vec![rect("a", 0)], &m, 1));
    let v = state.version();
    assert!(!state.publish(vec![rect("a", 0)], &m, 1));
    assert_eq!(state.version(), v);

    assert!(state.publish(vec![rect("a", 0), rect("b", 1)], &m, 2));
    assert_eq!(state.version(), v + 1);
    let data = state.data();
    assert_eq!(data.rects.len(), 2);
    assert_eq!(data.version, v + 1);

    assert!(state.clear());
    assert!(state.data().rects.is_empty());
    assert_eq!(state.version(), v + 2);
    assert!(!state.clear());
    assert_eq!(state.version(), v + 2);
}
