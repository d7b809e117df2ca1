//! Per-product 3D instances.
//!
//! Each loaded product gets a wrapper node positioned on its grid cell. The
//! decoded model sits under the wrapper, offset so it rotates about its
//! bounding-box centre and scaled so its largest dimension is one unit; the
//! wrapper scale is therefore the entry's world size.
//!
//! Loads are asynchronous. [`EntryManager::load_products`] hands out
//! [`ModelRequest`]s stamped with a generation; a completion carrying an
//! older generation is dropped.

use crate::animation::slerp_toward;
use crate::config::Tuning;
use crate::constants::*;
use crate::grid::{GridMetrics, OverlayRect};
use crate::model::ModelData;
use crate::scene::{NodeId, Scene};
use glam::{Quat, Vec3};
use serde::Deserialize;

/// One catalog item as handed over by the page.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductItem {
    pub id: String,
    pub handle: String,
    pub model_url: Option<String>,
    pub available: bool,
    pub is_special_tile: bool,
}

/// A model fetch the host must perform and report back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRequest {
    pub generation: u64,
    pub index: usize,
    pub id: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub id: String,
    pub handle: String,
    pub index: usize,
    pub root: NodeId,
    pub base_rotation: Quat,
    pub grid_position: Vec3,
    /// Current world size (largest dimension).
    pub current_size: f32,
    pub grid_size: f32,
    pub selected_size: Option<f32>,
    pub returning_scale: bool,
    pub special: bool,
}

#[derive(Debug, Default)]
pub struct EntryManager {
    generation: u64,
    entries: Vec<Entry>,
    specials: Vec<bool>,
    handles: Vec<String>,
    item_count: usize,
    pending: usize,
    selected: Option<String>,
}

impl EntryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Loaded entries ordered by index.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of products in the current list, loaded or not.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Model loads of the current generation still outstanding.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Start a new product list: supersede any in-flight loads, drop every
    /// entry, and return the fetches to perform.
    pub fn load_products(&mut self, items: &[ProductItem], scene: &mut Scene) -> Vec<ModelRequest> {
        self.generation += 1;
        self.clear(scene);
        self.item_count = items.len();
        self.specials = items.iter().map(|it| it.is_special_tile).collect();
        self.handles = items.iter().map(|it| it.handle.clone()).collect();
        let requests: Vec<ModelRequest> = items
            .iter()
            .enumerate()
            .filter_map(|(index, it)| {
                let url = it.model_url.as_ref().filter(|u| !u.is_empty())?;
                Some(ModelRequest {
                    generation: self.generation,
                    index,
                    id: it.id.clone(),
                    url: url.clone(),
                })
            })
            .collect();
        self.pending = requests.len();
        log::info!(
            "[entries] generation {}: {} items, {} models",
            self.generation,
            items.len(),
            requests.len()
        );
        requests
    }

    /// Remove every entry and its scene subtree.
    pub fn clear(&mut self, scene: &mut Scene) {
        for e in self.entries.drain(..) {
            scene.remove_subtree(e.root);
        }
        self.selected = None;
        self.pending = 0;
    }

    pub fn is_current(&self, request: &ModelRequest) -> bool {
        request.generation == self.generation
    }

    /// Insert a decoded model for `request`. Returns false for stale
    /// generations and for models without geometry.
    pub fn complete_load(
        &mut self,
        request: &ModelRequest,
        model: &ModelData,
        scene: &mut Scene,
        parent: Option<NodeId>,
    ) -> bool {
        if !self.is_current(request) {
            log::info!(
                "[entries] dropping stale model {} (generation {} != {})",
                request.id,
                request.generation,
                self.generation
            );
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        let Some(bounds) = model.bounds().filter(|b| b.is_finite()) else {
            log::warn!("[entries] model for {} has no geometry", request.id);
            return false;
        };
        let max_dim = bounds.size().max_element();
        let normalize = if max_dim > 1e-6 { 1.0 / max_dim } else { 1.0 };

        if let Some(pos) = self.entries.iter().position(|e| e.id == request.id) {
            let old = self.entries.remove(pos);
            scene.remove_subtree(old.root);
        }

        let root = scene.add_node(&format!("entry:{}", request.id), parent);
        let content = scene.add_node("normalize", Some(root));
        if let Some(n) = scene.node_mut(content) {
            n.scale = Vec3::splat(normalize);
            n.translation = -bounds.center() * normalize;
        }
        scene.instantiate(model, "model", Some(content));

        let base_rotation = scene.node(root).map(|n| n.rotation).unwrap_or(Quat::IDENTITY);
        let entry = Entry {
            id: request.id.clone(),
            handle: self.handles.get(request.index).cloned().unwrap_or_default(),
            index: request.index,
            root,
            base_rotation,
            grid_position: Vec3::new(0.0, 0.0, OBJECT_PLANE_Z),
            current_size: 0.0,
            grid_size: 0.0,
            selected_size: None,
            returning_scale: false,
            special: self.specials.get(request.index).copied().unwrap_or(false),
        };
        let at = self.entries.partition_point(|e| e.index < entry.index);
        self.entries.insert(at, entry);
        true
    }

    /// Record a failed load; the slot stays empty.
    pub fn fail_load(&mut self, request: &ModelRequest, reason: &str) {
        if self.is_current(request) {
            self.pending = self.pending.saturating_sub(1);
        }
        log::error!("[entries] model load failed for {} ({}): {}", request.id, request.url, reason);
    }

    /// Recompute resting positions and sizes from `metrics` and return the
    /// overlay rects, one per loaded entry in index order.
    pub fn layout(&mut self, metrics: &GridMetrics, slide: f32, scene: &mut Scene) -> Vec<OverlayRect> {
        let mut rects = Vec::with_capacity(self.entries.len());
        for e in &mut self.entries {
            e.grid_position = metrics.cell_world_position(e.index, slide);
            let selected = self.selected.as_deref() == Some(e.id.as_str());
            e.grid_size = metrics.target_size * if e.special { SPECIAL_SIZE_MULTIPLIER } else { 1.0 };
            if !selected && !e.returning_scale {
                e.current_size = e.grid_size;
            }
            if let Some(n) = scene.node_mut(e.root) {
                if !selected {
                    n.translation = e.grid_position;
                }
                n.scale = Vec3::splat(e.current_size.max(1e-6));
            }
            let (left, top, width, height) = metrics.cell_rect(e.index);
            rects.push(OverlayRect {
                id: e.id.clone(),
                index: e.index,
                left,
                top,
                width,
                height,
            });
        }
        rects
    }

    /// Mark at most one entry selected. `selected_size` is the one-time
    /// world size derived from the selection anchor.
    pub fn select(&mut self, id: Option<&str>, selected_size: Option<f32>) {
        let prev = self.selected.take();
        self.selected = id.filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(sel) = self.selected.clone() {
            if let Some(e) = self.entries.iter_mut().find(|e| e.id == sel) {
                e.selected_size = selected_size.filter(|s| s.is_finite() && *s > 0.0);
                e.returning_scale = false;
            }
        }
        if let Some(prev) = prev.filter(|p| Some(p) != self.selected.as_ref()) {
            if let Some(e) = self.entries.iter_mut().find(|e| e.id == prev) {
                e.returning_scale = true;
                e.selected_size = None;
            }
        }
    }

    /// Per-frame easing. `target` is where the selected entry should sit and
    /// `spin` its rotation delta for this frame.
    pub fn update(
        &mut self,
        dt: f32,
        tuning: &Tuning,
        target: Option<Vec3>,
        spin: f32,
        scene: &mut Scene,
    ) {
        let k_move = approach_factor(tuning.entry_move_rate, dt);
        for e in &mut self.entries {
            let selected = self.selected.as_deref() == Some(e.id.as_str());
            let Some(n) = scene.node_mut(e.root) else {
                continue;
            };
            let goal = match (selected, target) {
                (true, Some(t)) => t,
                _ => e.grid_position,
            };
            n.translation = n.translation.lerp(goal, k_move);

            if selected || e.returning_scale {
                let desired = if selected {
                    e.selected_size.unwrap_or(e.grid_size)
                } else {
                    e.grid_size
                };
                let cur = if e.current_size > 0.0 { e.current_size } else { desired };
                let next = cur + (desired - cur) * k_move;
                e.current_size = finite_or(next, desired);
                if !selected && (e.current_size - desired).abs() < SCALE_SETTLE_EPSILON {
                    e.current_size = desired;
                    e.returning_scale = false;
                }
                n.scale = Vec3::splat(e.current_size.max(1e-6));
            }

            if selected {
                if spin != 0.0 && spin.is_finite() {
                    n.rotation = (n.rotation * Quat::from_rotation_y(spin)).normalize();
                }
            } else {
                n.rotation = slerp_toward(n.rotation, e.base_rotation, tuning.entry_turn_rate, dt);
                if n.translation.distance_squared(e.grid_position) < 1e-6 {
                    n.translation = e.grid_position;
                }
                if n.rotation.angle_between(e.base_rotation) < 1e-3 {
                    n.rotation = e.base_rotation;
                }
            }
        }
    }

    /// World scale currently applied to an entry's root.
    pub fn world_size(&self, id: &str, scene: &Scene) -> Option<f32> {
        let e = self.get(id)?;
        scene.node(e.root).map(|n| n.scale.x)
    }
}
