//! Background shop scene: counter-top, shelf rows and the pinned character.
//!
//! Optional sub-nodes are found by case-insensitive name. Every lookup that
//! comes back empty turns the dependent layout step into a no-op.
//!
//! Layout happens on the object plane and is mapped to each node's own depth
//! through a reference camera at the default position, so the background stays
//! world-fixed while the real camera scrolls past it.

use crate::animation::{AnimationMixer, CharacterAnimator};
use crate::bounds::ray_aabb;
use crate::constants::*;
use crate::grid::GridMetrics;
use crate::model::ModelData;
use crate::projection::{Camera, Projector, Viewport};
use crate::scene::{NodeId, Scene};
use glam::Vec3;

/// A background fetch the host must perform and report back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundRequest {
    pub token: u64,
    pub url: String,
}

#[derive(Clone, Copy, Debug, Default)]
struct CharacterPin {
    wrapper: Option<NodeId>,
    /// Bind-pose feet anchor relative to the wrapper origin, cached once.
    anchor_offset: Vec3,
    /// Anchor X/Z at load time, used when there is no placement node.
    rest_anchor: Vec3,
}

#[derive(Default)]
pub struct BackgroundManager {
    load_token: u64,
    inflight: Option<u64>,
    url: Option<String>,
    root: Option<NodeId>,
    bar_top: Option<NodeId>,
    top_stuff: Option<NodeId>,
    shelf_proto: Option<NodeId>,
    shelves: Vec<NodeId>,
    char_placer: Option<NodeId>,
    character: Option<NodeId>,
    pin: CharacterPin,
    top_stuff_base_scale: Option<Vec3>,
    top_stuff_applied: Option<f32>,
    animator: Option<CharacterAnimator>,
}

fn set_world_x(scene: &mut Scene, id: NodeId, x: f32) {
    let mut p = scene.world_position(id);
    p.x = x;
    scene.set_world_translation(id, p);
}

fn set_bottom_world_y(scene: &mut Scene, id: NodeId, y: f32) {
    let Some(b) = scene.world_bounds(id) else {
        return;
    };
    let mut p = scene.world_position(id);
    p.y += y - b.min.y;
    scene.set_world_translation(id, p);
}

fn fit_width_to(scene: &mut Scene, id: NodeId, target: f32) {
    let Some(cw) = scene.world_bounds(id).map(|b| b.size().x.max(1e-6)) else {
        return;
    };
    if let Some(n) = scene.node_mut(id) {
        let s = n.scale.x * target / cw;
        if s.is_finite() && s > 0.0 {
            n.scale.x = s;
        }
    }
}

fn fit_height_to(scene: &mut Scene, id: NodeId, target: f32) {
    let Some(ch) = scene.world_bounds(id).map(|b| b.size().y.max(1e-6)) else {
        return;
    };
    if let Some(n) = scene.node_mut(id) {
        let s = n.scale.y * target / ch;
        if s.is_finite() && s > 0.0 {
            n.scale.y = s;
        }
    }
}

/// Lerp the decoration scale between the narrow and wide viewport widths.
pub fn top_stuff_scale(width_px: f32) -> f32 {
    let w = finite_or(width_px, 1.0).max(1.0);
    let t = ((w - TOPSTUFF_MIN_WIDTH_PX) / (TOPSTUFF_MAX_WIDTH_PX - TOPSTUFF_MIN_WIDTH_PX)).clamp(0.0, 1.0);
    TOPSTUFF_MIN_SCALE + t * (TOPSTUFF_MAX_SCALE - TOPSTUFF_MIN_SCALE)
}

/// Rows of shelving for `item_count` products: one per grid row plus a spare.
pub fn shelf_rows(item_count: usize, columns: usize) -> usize {
    item_count.div_ceil(columns.max(1)) + 1
}

impl BackgroundManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.root.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.inflight.is_some()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn shelf_count(&self) -> usize {
        self.shelves.len()
    }

    pub fn shelves(&self) -> &[NodeId] {
        &self.shelves
    }

    pub fn bar_top(&self) -> Option<NodeId> {
        self.bar_top
    }

    pub fn top_stuff(&self) -> Option<NodeId> {
        self.top_stuff
    }

    pub fn character(&self) -> Option<NodeId> {
        self.character
    }

    pub fn character_wrapper(&self) -> Option<NodeId> {
        self.pin.wrapper
    }

    pub fn animator(&self) -> Option<&CharacterAnimator> {
        self.animator.as_ref()
    }

    /// Start loading `url` unless a background is present or already loading.
    pub fn begin_load(&mut self, url: &str) -> Option<BackgroundRequest> {
        self.url = Some(url.to_string());
        if self.root.is_some() || self.inflight.is_some() {
            return None;
        }
        self.load_token += 1;
        self.inflight = Some(self.load_token);
        log::info!("[background] loading {}", url);
        Some(BackgroundRequest {
            token: self.load_token,
            url: url.to_string(),
        })
    }

    /// Install a decoded background. Returns false when the request was superseded.
    pub fn complete_load(
        &mut self,
        request: &BackgroundRequest,
        model: &ModelData,
        scene: &mut Scene,
        parent: Option<NodeId>,
    ) -> bool {
        if request.token != self.load_token {
            log::info!("[background] dropping superseded load {}", request.token);
            return false;
        }
        self.inflight = None;
        self.clear(scene);

        let instance = scene.instantiate(model, "background", parent);
        let max_dim = model
            .bounds()
            .map(|b| b.size().max_element())
            .filter(|d| d.is_finite() && *d > 1e-6)
            .unwrap_or(1.0);
        if let Some(n) = scene.node_mut(instance.root) {
            n.scale = Vec3::splat(BG_NORMALIZED_SIZE / max_dim);
            n.translation = BG_OFFSET;
        }
        self.root = Some(instance.root);

        let root = instance.root;
        self.bar_top = scene.find_by_name_ci(root, NODE_BAR_TOP);
        self.top_stuff = scene.find_by_name_ci(root, NODE_TOP_STUFF);
        self.shelf_proto = scene.find_by_name_ci(root, NODE_SHELF);
        self.char_placer = scene.find_by_name_ci(root, NODE_CHAR_PLACER);
        self.character = scene.find_by_name_ci(root, NODE_CHARACTER);
        self.shelves = self.shelf_proto.into_iter().collect();

        if let Some(character) = self.character {
            self.pin = Self::make_pin(scene, character);
        }
        if !model.animations.is_empty() {
            let mixer = AnimationMixer::new(model.animations.clone(), instance.nodes, scene);
            self.animator = Some(CharacterAnimator::new(mixer));
        }
        log::info!(
            "[background] ready: barTop={} topstuff={} shelf={} character={} charplacer={}",
            self.bar_top.is_some(),
            self.top_stuff.is_some(),
            self.shelf_proto.is_some(),
            self.character.is_some(),
            self.char_placer.is_some()
        );
        true
    }

    /// Wrap the character so it can be moved rigidly, and cache its bind-pose feet.
    fn make_pin(scene: &mut Scene, character: NodeId) -> CharacterPin {
        let Some(wrapper) = scene.insert_parent(character, "character-pin") else {
            return CharacterPin::default();
        };
        let Some(b) = scene.world_bounds(character) else {
            return CharacterPin {
                wrapper: Some(wrapper),
                ..CharacterPin::default()
            };
        };
        let anchor = Vec3::new(b.center().x, b.min.y, b.center().z);
        CharacterPin {
            wrapper: Some(wrapper),
            anchor_offset: anchor - scene.world_position(wrapper),
            rest_anchor: anchor,
        }
    }

    pub fn fail_load(&mut self, request: &BackgroundRequest, reason: &str) {
        if request.token == self.load_token {
            self.inflight = None;
        }
        log::warn!("[background] load failed for {}: {}", request.url, reason);
    }

    /// Drop the background subtree and every cached reference.
    pub fn clear(&mut self, scene: &mut Scene) {
        if let Some(root) = self.root.take() {
            scene.remove_subtree(root);
        }
        self.bar_top = None;
        self.top_stuff = None;
        self.shelf_proto = None;
        self.shelves.clear();
        self.char_placer = None;
        self.character = None;
        self.pin = CharacterPin::default();
        self.top_stuff_base_scale = None;
        self.top_stuff_applied = None;
        self.animator = None;
    }

    /// Forget a load in flight so a fresh `begin_load` can start, e.g. after
    /// a GPU context restore.
    pub fn reset_inflight(&mut self) {
        self.load_token += 1;
        self.inflight = None;
    }

    fn reference(viewport: Viewport) -> Projector {
        Projector::new(&Camera::default(), viewport)
    }

    /// Fit counter-top and shelves to the grid. `bartop_extra` is how far the
    /// counter overshoots the grid width, as a fraction of it.
    pub fn layout(
        &mut self,
        metrics: &GridMetrics,
        item_count: usize,
        slide: f32,
        bartop_extra: f32,
        viewport: Viewport,
        scene: &mut Scene,
    ) {
        if self.root.is_none() {
            return;
        }
        let projector = Self::reference(viewport);
        self.layout_bar_top(metrics, slide, bartop_extra, &projector, viewport, scene);
        self.layout_shelves(metrics, item_count, slide, &projector, scene);
    }

    fn layout_bar_top(
        &mut self,
        metrics: &GridMetrics,
        slide: f32,
        extra: f32,
        projector: &Projector,
        viewport: Viewport,
        scene: &mut Scene,
    ) {
        let Some(bar) = self.bar_top.filter(|b| scene.contains(*b)) else {
            return;
        };
        if scene.has_skinned_descendants(bar) {
            return;
        }
        let z = scene.world_position(bar).z;
        let width = metrics.world_total_width * (1.0 + finite_or(extra, BARTOP_EXTRA).max(0.0));
        fit_width_to(scene, bar, projector.map_len_to_depth(width, z));
        if let Some(n) = scene.node_mut(bar) {
            n.scale.y = 1.0;
            n.scale.z = 1.0;
        }
        set_world_x(scene, bar, projector.map_x_to_depth(DEFAULT_CAM_POS.x, z));
        let top = metrics.top_world_y() + slide;
        set_bottom_world_y(scene, bar, projector.map_y_to_depth(top, z));

        let bar_pos = scene.world_position(bar);
        if let Some(placer) = self.char_placer.filter(|p| scene.contains(*p)) {
            scene.set_world_translation(placer, bar_pos);
        }
        if let Some(top_stuff) = self.top_stuff.filter(|t| scene.contains(*t)) {
            scene.set_world_translation(top_stuff, bar_pos);
            self.apply_top_stuff_scale(top_stuff, viewport.size().x, scene);
        }
    }

    fn apply_top_stuff_scale(&mut self, id: NodeId, width_px: f32, scene: &mut Scene) {
        let target = top_stuff_scale(width_px);
        if self
            .top_stuff_applied
            .is_some_and(|applied| (applied - target).abs() < 1e-4)
        {
            return;
        }
        let Some(n) = scene.node_mut(id) else {
            return;
        };
        let base = *self.top_stuff_base_scale.get_or_insert(n.scale);
        n.scale = Vec3::new(base.x * target, base.y, base.z);
        self.top_stuff_applied = Some(target);
    }

    fn ensure_shelf_instances(&mut self, rows: usize, scene: &mut Scene) {
        let Some(proto) = self.shelf_proto.filter(|p| scene.contains(*p)) else {
            return;
        };
        self.shelves.retain(|s| scene.contains(*s));
        if self.shelves.first() != Some(&proto) {
            self.shelves = vec![proto];
        }
        let parent = scene.node(proto).and_then(|n| n.parent);
        while self.shelves.len() < rows {
            match scene.clone_subtree(proto, parent) {
                Some(clone) => self.shelves.push(clone),
                None => break,
            }
        }
        while self.shelves.len() > rows.max(1) {
            if let Some(extra) = self.shelves.pop() {
                scene.remove_subtree(extra);
            }
        }
    }

    fn layout_shelves(
        &mut self,
        metrics: &GridMetrics,
        item_count: usize,
        slide: f32,
        projector: &Projector,
        scene: &mut Scene,
    ) {
        let rows = shelf_rows(item_count, metrics.columns);
        self.ensure_shelf_instances(rows, scene);
        for (r, &shelf) in self.shelves.iter().enumerate() {
            if scene.has_skinned_descendants(shelf) {
                continue;
            }
            let z = scene.world_position(shelf).z;
            fit_width_to(scene, shelf, projector.map_len_to_depth(metrics.world_total_width, z));
            fit_height_to(scene, shelf, projector.map_len_to_depth(metrics.world_row_height, z));
            set_world_x(scene, shelf, projector.map_x_to_depth(DEFAULT_CAM_POS.x, z));
            let center = metrics.first_row_world_y - r as f32 * metrics.world_row_height + slide;
            let bottom = center - metrics.world_row_height * 0.5;
            set_bottom_world_y(scene, shelf, projector.map_y_to_depth(bottom, z));
        }
    }

    /// Rigidly move the character wrapper so the cached feet sit on the grid top.
    pub fn pin_character(&self, metrics: &GridMetrics, slide: f32, viewport: Viewport, scene: &mut Scene) {
        let Some(wrapper) = self.pin.wrapper.filter(|w| scene.contains(*w)) else {
            return;
        };
        let projector = Self::reference(viewport);
        let current = scene.world_position(wrapper) + self.pin.anchor_offset;
        let (x, z) = match self.char_placer.filter(|p| scene.contains(*p)) {
            Some(p) => {
                let pp = scene.world_position(p);
                (pp.x, pp.z)
            }
            None => (self.pin.rest_anchor.x, self.pin.rest_anchor.z),
        };
        let y = projector.map_y_to_depth(metrics.top_world_y() + slide, current.z);
        let anchor = Vec3::new(x, y, z);
        if anchor.is_finite() {
            scene.set_world_translation(wrapper, anchor - self.pin.anchor_offset);
        }
    }

    /// World-space bottom of the character's bind-pose bounds.
    pub fn character_feet_y(&self, scene: &Scene) -> Option<f32> {
        self.character
            .and_then(|c| scene.world_bounds(c))
            .map(|b| b.min.y)
    }

    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        if let Some(animator) = self.animator.as_mut() {
            animator.update(dt, scene);
        }
    }

    pub fn play_talk_once(&mut self) {
        if let Some(animator) = self.animator.as_mut() {
            animator.play_talk_once();
        }
    }

    /// Whether a world-space ray hits the character's bounds.
    pub fn character_hit(&self, origin: Vec3, dir: Vec3, scene: &Scene) -> bool {
        self.character
            .and_then(|c| scene.world_bounds(c))
            .is_some_and(|b| ray_aabb(origin, dir, &b).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_stuff_scale_clamps_and_lerps() {
        assert_eq!(top_stuff_scale(320.0), TOPSTUFF_MIN_SCALE);
        assert_eq!(top_stuff_scale(1920.0), TOPSTUFF_MAX_SCALE);
        assert!((top_stuff_scale(750.0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn shelf_rows_include_spare() {
        assert_eq!(shelf_rows(0, 4), 1);
        assert_eq!(shelf_rows(5, 4), 3);
        assert_eq!(shelf_rows(17, 2), 10);
    }
}
