// Host-side tests for the camera state machine.

use catalog_core::camera::{section_target, CameraMode, CameraRig, CameraSettle};
use catalog_core::config::{EngineConfig, Tuning};
use catalog_core::constants::*;
use catalog_core::grid::compute_metrics;
use catalog_core::projection::{Projector, Viewport};
use glam::Vec3;

fn settle(rig: &mut CameraRig) -> Option<CameraSettle> {
    let tuning = Tuning::default();
    for _ in 0..2000 {
        if let Some(s) = rig.step(1.0 / 60.0, &tuning) {
            return Some(s);
        }
    }
    None
}

#[test]
fn scroll_follow_maps_pixels_to_object_plane_units() {
    let vp = Viewport::new(1200.0, 800.0);
    let mut rig = CameraRig::default();
    rig.sync_to_scroll(400.0, vp);
    let upp = CameraRig::scroll_units_per_px(vp);
    assert!((rig.position().y + 400.0 * upp).abs() < 1e-6);
    assert_eq!(rig.position().z, DEFAULT_CAM_POS.z);
    assert_eq!(rig.mode(), CameraMode::ScrollFollow);

    // content 400px down now sits at the screen centre
    let p = Projector::new(&rig.camera, vp);
    let unscrolled = Projector::new(&CameraRig::default().camera, vp);
    let y = unscrolled.world_y_at_obj_from_screen_y(400.0 + 400.0);
    assert!((p.project_to_px(Vec3::new(0.0, y, OBJECT_PLANE_Z)).y - 400.0).abs() < 0.05);
}

#[test]
fn focus_ignores_scroll_until_released() {
    let vp = Viewport::new(1200.0, 800.0);
    let mut rig = CameraRig::default();
    rig.sync_to_scroll(250.0, vp);
    let y = rig.position().y;
    rig.focus_selection(250.0);
    assert_eq!(rig.mode(), CameraMode::FocusSelection);
    rig.sync_to_scroll(0.0, vp);
    assert_eq!(rig.position().y, y);
    assert_eq!(settle(&mut rig), Some(CameraSettle::Arrived));

    rig.release_selection(vp);
    assert_eq!(settle(&mut rig), Some(CameraSettle::Returned { scroll_top: 250.0 }));
    assert_eq!(rig.mode(), CameraMode::ScrollFollow);
}

#[test]
fn section_round_trip_returns_to_recorded_scroll() {
    let vp = Viewport::new(1200.0, 800.0);
    let cfg = EngineConfig::default();
    let metrics = compute_metrics(vp, DEFAULT_CAM_POS.z, CAMERA_FOV_Y_DEG.to_radians());
    let mut rig = CameraRig::default();
    rig.sync_to_scroll(120.0, vp);

    let about = section_target(&cfg.section("about"), &metrics, vp, rig.camera.fovy_radians);
    rig.focus_section("about", about, 120.0);
    assert_eq!(rig.mode(), CameraMode::FocusSection);
    assert!(rig.is_transitioning());
    assert_eq!(settle(&mut rig), Some(CameraSettle::Arrived));
    assert!((rig.position() - about).length() < 1e-6);

    rig.release_section(vp);
    assert_eq!(settle(&mut rig), Some(CameraSettle::Returned { scroll_top: 120.0 }));
    let upp = CameraRig::scroll_units_per_px(vp);
    assert!((rig.position() - Vec3::new(0.0, -120.0 * upp, DEFAULT_CAM_POS.z)).length() < 1e-5);
}

#[test]
fn section_opened_from_a_selection_keeps_the_original_scroll() {
    let vp = Viewport::new(1200.0, 800.0);
    let mut rig = CameraRig::default();
    rig.focus_selection(300.0);
    rig.focus_section("about", Vec3::new(0.0, 0.82, 2.8), 0.0);
    settle(&mut rig);
    rig.release_section(vp);
    assert_eq!(settle(&mut rig), Some(CameraSettle::Returned { scroll_top: 300.0 }));
}

#[test]
fn pushed_section_puts_grid_top_at_the_requested_fraction() {
    let vp = Viewport::new(1200.0, 800.0);
    let cfg = EngineConfig::default();
    let fovy = CAMERA_FOV_Y_DEG.to_radians();
    let metrics = compute_metrics(vp, DEFAULT_CAM_POS.z, fovy);
    let legal = cfg.section("legal");
    let target = section_target(&legal, &metrics, vp, fovy);
    assert_eq!((target.x, target.z), (legal.x, legal.z));

    let p = Projector {
        eye: target,
        fovy_radians: fovy,
        viewport: vp,
    };
    let px = p.project_to_px(Vec3::new(0.0, metrics.top_world_y(), OBJECT_PLANE_Z));
    assert!((px.y - 800.0 * LEGAL_GRID_SCREEN_FRAC).abs() < 0.5, "{px:?}");
}
