// Host-side tests for the background shop layout.

use catalog_core::background::{shelf_rows, BackgroundManager};
use catalog_core::constants::*;
use catalog_core::grid::{compute_metrics, GridMetrics};
use catalog_core::model::primitives::{box_mesh, ModelBuilder};
use catalog_core::model::ModelData;
use catalog_core::projection::{Camera, Projector, Viewport};
use catalog_core::scene::Scene;
use glam::Vec3;

fn shop() -> ModelData {
    let mut b = ModelBuilder::new();
    let root = b.node("Shop", None, Vec3::ZERO, None);
    b.node(
        "BarTop",
        Some(root),
        Vec3::new(0.0, -0.5, 0.0),
        Some(box_mesh("counter", Vec3::new(2.0, 0.2, 0.5), [0.6, 0.4, 0.2, 1.0])),
    );
    b.node(
        "shelf",
        Some(root),
        Vec3::new(0.0, 0.5, -0.3),
        Some(box_mesh("shelf", Vec3::new(2.0, 0.3, 0.2), [0.5; 4])),
    );
    b.node(
        "Character",
        None,
        Vec3::new(0.5, 0.0, 0.2),
        Some(box_mesh("body", Vec3::new(0.3, 1.0, 0.3), [0.9, 0.7, 0.6, 1.0])),
    );
    b.build()
}

fn metrics(vp: Viewport) -> GridMetrics {
    compute_metrics(vp, DEFAULT_CAM_POS.z, CAMERA_FOV_Y_DEG.to_radians())
}

fn loaded() -> (Scene, BackgroundManager) {
    let mut scene = Scene::new();
    let mut bg = BackgroundManager::new();
    let req = bg.begin_load("/SHOP.glb").unwrap();
    assert!(bg.begin_load("/SHOP.glb").is_none());
    assert!(bg.complete_load(&req, &shop(), &mut scene, None));
    (scene, bg)
}

#[test]
fn named_nodes_are_found_case_insensitively() {
    let (_, bg) = loaded();
    assert!(bg.is_loaded());
    assert!(!bg.is_loading());
    assert!(bg.bar_top().is_some());
    assert!(bg.character().is_some());
    assert!(bg.character_wrapper().is_some());
    assert!(bg.top_stuff().is_none());
    assert_eq!(bg.shelf_count(), 1);
}

#[test]
fn shelf_count_tracks_rows() {
    for vp in [Viewport::new(1200.0, 800.0), Viewport::new(600.0, 900.0)] {
        let m = metrics(vp);
        let (mut scene, mut bg) = loaded();
        for n in [0, 1, 4, 17] {
            bg.layout(&m, n, 0.0, BARTOP_EXTRA, vp, &mut scene);
            assert_eq!(bg.shelf_count(), shelf_rows(n, m.columns), "n={n} cols={}", m.columns);
        }
    }
}

#[test]
fn shrinking_releases_cloned_shelves() {
    let vp = Viewport::new(1200.0, 800.0);
    let m = metrics(vp);
    let (mut scene, mut bg) = loaded();
    bg.layout(&m, 17, 0.0, BARTOP_EXTRA, vp, &mut scene);
    assert_eq!(bg.shelf_count(), 6);
    let removed: Vec<_> = bg.shelves()[2..].to_vec();
    scene.drain_released();

    bg.layout(&m, 1, 0.0, BARTOP_EXTRA, vp, &mut scene);
    assert_eq!(bg.shelf_count(), 2);
    assert_eq!(scene.drain_released().len(), 4);
    assert!(removed.iter().all(|id| !scene.contains(*id)));
}

#[test]
fn shelves_fill_grid_rows() {
    let vp = Viewport::new(1200.0, 800.0);
    let m = metrics(vp);
    let (mut scene, mut bg) = loaded();
    bg.layout(&m, 8, 0.0, BARTOP_EXTRA, vp, &mut scene);
    let p = Projector::new(&Camera::default(), vp);
    for (r, &shelf) in bg.shelves().iter().enumerate() {
        let b = scene.world_bounds(shelf).unwrap();
        let z = scene.world_position(shelf).z;
        let bottom = m.first_row_world_y - r as f32 * m.world_row_height - m.world_row_height * 0.5;
        assert!((b.min.y - p.map_y_to_depth(bottom, z)).abs() < 1e-3, "row {r}");
        assert!((b.size().x - p.map_len_to_depth(m.world_total_width, z)).abs() < 1e-3);
    }
}

#[test]
fn counter_sits_on_the_grid_top() {
    let vp = Viewport::new(1200.0, 800.0);
    let m = metrics(vp);
    let p = Projector::new(&Camera::default(), vp);
    for extra in [BARTOP_EXTRA, 0.0, 2.0] {
        let (mut scene, mut bg) = loaded();
        bg.layout(&m, 4, 0.0, extra, vp, &mut scene);
        let bar = bg.bar_top().unwrap();
        let b = scene.world_bounds(bar).unwrap();
        let z = scene.world_position(bar).z;
        assert!((b.min.y - p.map_y_to_depth(m.top_world_y(), z)).abs() < 1e-3);
        let width = p.map_len_to_depth(m.world_total_width * (1.0 + extra), z);
        assert!((b.size().x - width).abs() < 1e-3, "extra {extra}");
        assert!(scene.world_position(bar).x.abs() < 1e-4);
    }
}

#[test]
fn character_feet_are_pinned_to_the_grid_top() {
    let vp = Viewport::new(1200.0, 800.0);
    let m = metrics(vp);
    let (mut scene, bg) = loaded();
    let p = Projector::new(&Camera::default(), vp);
    for slide in [0.0, -0.75] {
        bg.pin_character(&m, slide, vp, &mut scene);
        let b = scene.world_bounds(bg.character().unwrap()).unwrap();
        let expected = p.map_y_to_depth(m.top_world_y() + slide, b.center().z);
        assert!((bg.character_feet_y(&scene).unwrap() - expected).abs() < 1e-4, "slide {slide}");
    }
}

#[test]
fn ray_through_the_character_hits() {
    let (scene, bg) = loaded();
    let c = scene.world_bounds(bg.character().unwrap()).unwrap().center();
    assert!(bg.character_hit(Vec3::new(c.x, c.y, 10.0), Vec3::NEG_Z, &scene));
    assert!(!bg.character_hit(Vec3::new(c.x + 50.0, c.y, 10.0), Vec3::NEG_Z, &scene));
}

#[test]
fn superseded_load_is_ignored() {
    let mut scene = Scene::new();
    let mut bg = BackgroundManager::new();
    let first = bg.begin_load("/SHOP.glb").unwrap();
    bg.reset_inflight();
    let second = bg.begin_load("/SHOP.glb").unwrap();
    assert!(!bg.complete_load(&first, &shop(), &mut scene, None));
    assert!(bg.complete_load(&second, &shop(), &mut scene, None));
    bg.clear(&mut scene);
    assert!(!bg.is_loaded());
    assert!(scene.is_empty());
}
