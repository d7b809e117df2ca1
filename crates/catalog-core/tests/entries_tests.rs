// Host-side tests for product entry lifecycle and selection easing.

use catalog_core::config::Tuning;
use catalog_core::constants::*;
use catalog_core::entries::{EntryManager, ProductItem};
use catalog_core::grid::compute_metrics;
use catalog_core::model::primitives::cuboid;
use catalog_core::projection::Viewport;
use catalog_core::scene::Scene;
use glam::Vec3;

fn item(id: &str, url: Option<&str>) -> ProductItem {
    ProductItem {
        id: id.to_string(),
        handle: format!("h-{id}"),
        model_url: url.map(str::to_string),
        available: true,
        is_special_tile: false,
    }
}

#[test]
fn only_items_with_models_are_requested() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(
        &[item("a", Some("/a.glb")), item("b", None), item("c", Some(""))],
        &mut scene,
    );
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].index, 0);
    assert_eq!(m.item_count(), 3);
    assert_eq!(m.pending(), 1);
}

#[test]
fn stale_generation_is_dropped() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let old = m.load_products(&[item("a", Some("/a.glb"))], &mut scene);
    let new = m.load_products(&[item("b", Some("/b.glb"))], &mut scene);
    let model = cuboid("thing", Vec3::ONE);

    assert!(!m.complete_load(&old[0], &model, &mut scene, None));
    assert!(m.is_empty());
    assert!(m.complete_load(&new[0], &model, &mut scene, None));
    assert_eq!(m.len(), 1);
    assert_eq!(m.entries()[0].id, "b");
    assert_eq!(m.entries()[0].handle, "h-b");
    assert_eq!(m.pending(), 0);
}

#[test]
fn entries_stay_in_index_order() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(
        &[item("a", Some("/a.glb")), item("b", Some("/b.glb")), item("c", Some("/c.glb"))],
        &mut scene,
    );
    let model = cuboid("thing", Vec3::ONE);
    for r in reqs.iter().rev() {
        assert!(m.complete_load(r, &model, &mut scene, None));
    }
    let ids: Vec<&str> = m.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[test]
fn models_are_normalised_to_grid_size() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(&[item("a", Some("/a.glb"))], &mut scene);
    m.complete_load(&reqs[0], &cuboid("tall", Vec3::new(0.5, 4.0, 0.5)), &mut scene, None);

    let metrics = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, CAMERA_FOV_Y_DEG.to_radians());
    let rects = m.layout(&metrics, 0.0, &mut scene);
    assert_eq!(rects.len(), 1);

    let e = &m.entries()[0];
    let b = scene.world_bounds(e.root).unwrap();
    assert!((b.size().max_element() - metrics.target_size).abs() < 1e-4);
    assert!((b.center() - metrics.cell_world_position(0, 0.0)).length() < 1e-4);
}

#[test]
fn failed_load_leaves_the_slot_empty() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(&[item("a", Some("/a.glb"))], &mut scene);
    m.fail_load(&reqs[0], "404");
    assert!(m.is_empty());
    assert_eq!(m.pending(), 0);
}

#[test]
fn deselected_entry_returns_to_grid_size() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(&[item("a", Some("/a.glb")), item("b", Some("/b.glb"))], &mut scene);
    let model = cuboid("thing", Vec3::ONE);
    for r in &reqs {
        m.complete_load(r, &model, &mut scene, None);
    }
    let metrics = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, CAMERA_FOV_Y_DEG.to_radians());
    m.layout(&metrics, 0.0, &mut scene);
    let tuning = Tuning::default();
    let target = Vec3::new(0.0, 0.0, SELECT_TARGET_Z);

    m.select(Some("a"), Some(0.5));
    assert_eq!(m.selected(), Some("a"));
    for _ in 0..300 {
        m.update(1.0 / 60.0, &tuning, Some(target), 0.05, &mut scene);
    }
    assert!((m.world_size("a", &scene).unwrap() - 0.5).abs() < 1e-3);
    let root = m.get("a").unwrap().root;
    assert!((scene.world_position(root) - target).length() < 1e-3);
    assert!(scene.node(root).unwrap().rotation.angle_between(glam::Quat::IDENTITY) > 1e-3);

    m.select(None, None);
    assert!(m.get("a").unwrap().returning_scale);
    for _ in 0..300 {
        m.update(1.0 / 60.0, &tuning, None, 0.0, &mut scene);
    }
    let a = m.get("a").unwrap();
    assert!(!a.returning_scale);
    assert_eq!(a.current_size, a.grid_size);
    assert_eq!(scene.node(a.root).unwrap().translation, a.grid_position);
    assert_eq!(scene.node(a.root).unwrap().rotation, a.base_rotation);
    assert_eq!(m.world_size("b", &scene), Some(metrics.target_size));
}

#[test]
fn special_tiles_are_larger_and_return_to_that_size() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let mut special = item("s", Some("/s.glb"));
    special.is_special_tile = true;
    let reqs = m.load_products(&[special, item("n", Some("/n.glb"))], &mut scene);
    let model = cuboid("thing", Vec3::ONE);
    for r in &reqs {
        m.complete_load(r, &model, &mut scene, None);
    }
    let metrics = compute_metrics(Viewport::new(1200.0, 800.0), DEFAULT_CAM_POS.z, CAMERA_FOV_Y_DEG.to_radians());
    m.layout(&metrics, 0.0, &mut scene);

    let s = m.get("s").unwrap();
    assert!(s.special);
    assert!((s.grid_size - metrics.target_size * SPECIAL_SIZE_MULTIPLIER).abs() < 1e-6);
    assert!((m.world_size("s", &scene).unwrap() - s.grid_size).abs() < 1e-6);
    let n = m.get("n").unwrap();
    assert!(!n.special);
    assert_eq!(n.grid_size, metrics.target_size);

    let tuning = Tuning::default();
    m.select(Some("s"), Some(metrics.target_size * 2.0));
    for _ in 0..300 {
        m.update(1.0 / 60.0, &tuning, Some(Vec3::new(0.0, 0.0, SELECT_TARGET_Z)), 0.0, &mut scene);
    }
    m.select(None, None);
    for _ in 0..300 {
        m.update(1.0 / 60.0, &tuning, None, 0.0, &mut scene);
    }
    let s = m.get("s").unwrap();
    assert!(!s.returning_scale);
    assert_eq!(s.current_size, metrics.target_size * SPECIAL_SIZE_MULTIPLIER);
}

#[test]
fn clear_releases_meshes() {
    let mut scene = Scene::new();
    let mut m = EntryManager::new();
    let reqs = m.load_products(&[item("a", Some("/a.glb"))], &mut scene);
    m.complete_load(&reqs[0], &cuboid("thing", Vec3::ONE), &mut scene, None);
    scene.drain_released();
    m.clear(&mut scene);
    assert_eq!(scene.drain_released().len(), 1);
    assert!(scene.is_empty());
}
