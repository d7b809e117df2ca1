//! The catalog engine facade.
//!
//! [`CatalogEngine`] owns the scene, camera rig, entries, background and
//! the per-frame update. The hosting page talks to it through the methods
//! below and supplies two narrow adapters: a [`PageSurface`] for viewport
//! size and the selection anchor, and a [`ScrollSource`] for the scroll
//! offset. Asset I/O stays outside: load calls return requests, and the host
//! reports results back with the matching `complete_*` call.

use crate::background::{BackgroundManager, BackgroundRequest};
use crate::bounds::ray_aabb;
use crate::camera::{section_target, CameraRig, CameraSettle};
use crate::config::EngineConfig;
use crate::constants::*;
use crate::entries::{EntryManager, ModelRequest, ProductItem};
use crate::error::Result;
use crate::events::{EngineEvent, EventBus, SubscriptionId};
use crate::grid::{compute_metrics, GridMetrics, OverlayData, OverlayState};
use crate::input::{PointerPhase, PointerSample, PointerTracker};
use crate::model::ModelData;
use crate::progress::{LoadingManager, ProgressEvent};
use crate::projection::{Camera, Projector, Viewport};
use crate::recovery::{ContextRecovery, RecoveryDecision};
use crate::scene::{NodeId, Scene};
use crate::spin::SpinController;
use glam::{Mat4, Vec3};

/// Pixel rectangle relative to the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl AnchorRect {
    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.left.is_finite() && self.top.is_finite()
    }
}

/// Viewport and layout queries answered by the hosting page.
pub trait PageSurface {
    fn viewport(&self) -> Viewport;
    /// The fixed UI slot the focused product should fill.
    fn selection_anchor(&self) -> Option<AnchorRect>;
}

/// The page's scrolling content element.
pub trait ScrollSource {
    fn scroll_top(&self) -> f32;
    fn set_scroll_top(&self, value: f32);
}

/// Longest frame step the easing sees; larger gaps (tab switches) are clamped.
const MAX_FRAME_DT: f32 = 0.1;

pub struct CatalogEngine {
    config: EngineConfig,
    surface: Option<Box<dyn PageSurface>>,
    scroll: Option<Box<dyn ScrollSource>>,
    scene: Scene,
    entries_group: NodeId,
    bg_container: NodeId,
    rig: CameraRig,
    viewport: Viewport,
    metrics: Option<GridMetrics>,
    overlay: OverlayState,
    entries: EntryManager,
    background: BackgroundManager,
    spin: SpinController,
    pointer: PointerTracker,
    loading: LoadingManager,
    bus: EventBus,
    recovery: ContextRecovery,
    slide: f32,
    slide_target: f32,
    lock_grid_y: bool,
    locked_first_row_y: Option<f32>,
    grid_should_hide: bool,
    relayout_pending: bool,
    last_frame: Option<f64>,
    now: f64,
    scrolled_past_fold: Option<bool>,
    suspended: bool,
}

impl Default for CatalogEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CatalogEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut scene = Scene::new();
        let bg_container = scene.add_node("background-container", None);
        let entries_group = scene.add_node("entries", None);
        let spin = SpinController::new(config.tuning.clone());
        let recovery = ContextRecovery::new(config.tuning.context_reload_min_interval_sec);
        Self {
            config,
            surface: None,
            scroll: None,
            scene,
            entries_group,
            bg_container,
            rig: CameraRig::default(),
            viewport: Viewport::new(0.0, 0.0),
            metrics: None,
            overlay: OverlayState::default(),
            entries: EntryManager::new(),
            background: BackgroundManager::new(),
            spin,
            pointer: PointerTracker::default(),
            loading: LoadingManager::new(),
            bus: EventBus::new(),
            recovery,
            slide: 0.0,
            slide_target: 0.0,
            lock_grid_y: false,
            locked_first_row_y: None,
            grid_should_hide: false,
            relayout_pending: true,
            last_frame: None,
            now: 0.0,
            scrolled_past_fold: None,
            suspended: false,
        }
    }

    // ---------------- wiring ----------------

    /// Attach the page surface. Calling again swaps the surface and keeps state.
    pub fn init(&mut self, surface: Box<dyn PageSurface>) {
        self.surface = Some(surface);
        self.refresh_viewport();
        self.relayout_pending = true;
        self.sync_camera_to_scroll();
        log::info!(
            "[engine] init {}x{}",
            self.viewport.width,
            self.viewport.height
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    /// Attach the scroll source and sync the camera to it.
    pub fn attach_scroll(&mut self, source: Box<dyn ScrollSource>) {
        self.scroll = Some(source);
        self.scrolled_past_fold = None;
        self.on_scroll();
    }

    pub fn subscribe<F: FnMut(&EngineEvent) + 'static>(&mut self, f: F) -> SubscriptionId {
        self.bus.subscribe(f)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn emit(&mut self, event: EngineEvent) {
        self.bus.emit(&event);
    }

    fn emit_progress(&mut self, events: Vec<ProgressEvent>) {
        for ev in events {
            self.emit(EngineEvent::Progress(ev));
        }
    }

    /// Count an externally fetched asset (e.g. the environment map) in the progress stream.
    pub fn track_asset_start(&mut self, url: &str) {
        let evs = self.loading.item_start(url);
        self.emit_progress(evs);
    }

    pub fn track_asset_end(&mut self, url: &str, ok: bool) {
        let evs = if ok {
            self.loading.item_end(url)
        } else {
            self.loading.item_error(url)
        };
        self.emit_progress(evs);
    }

    // ---------------- accessors ----------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.rig.camera
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn view_proj(&self) -> Mat4 {
        self.rig.camera.view_proj()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn metrics(&self) -> Option<&GridMetrics> {
        self.metrics.as_ref()
    }

    pub fn entries(&self) -> &EntryManager {
        &self.entries
    }

    pub fn background(&self) -> &BackgroundManager {
        &self.background
    }

    pub fn spin(&self) -> &SpinController {
        &self.spin
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.entries.selected()
    }

    pub fn slide(&self) -> f32 {
        self.slide
    }

    pub fn slide_target(&self) -> f32 {
        self.slide_target
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn overlay_data(&self) -> OverlayData {
        self.overlay.data()
    }

    pub fn overlay_version(&self) -> u64 {
        self.overlay.version()
    }

    // ---------------- viewport & layout ----------------

    fn scroll_top(&self) -> f32 {
        self.scroll
            .as_ref()
            .map(|s| finite_or(s.scroll_top(), 0.0))
            .unwrap_or(0.0)
    }

    /// Re-read the viewport; a change queues a relayout.
    pub fn refresh_viewport(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let vp = surface.viewport();
        if vp != self.viewport {
            self.viewport = vp;
            self.rig.camera.aspect = vp.aspect();
            self.relayout_pending = true;
        }
    }

    /// Resize notification from the page.
    pub fn on_resize(&mut self) {
        self.refresh_viewport();
        self.relayout_pending = true;
    }

    fn fovy(&self) -> f32 {
        self.rig.camera.fovy_radians
    }

    fn compute_metrics(&mut self) -> GridMetrics {
        let mut m = compute_metrics(self.viewport, DEFAULT_CAM_POS.z, self.fovy());
        if self.lock_grid_y {
            match self.locked_first_row_y {
                Some(y) => m.first_row_world_y = y,
                None => self.locked_first_row_y = Some(m.first_row_world_y),
            }
        }
        self.metrics = Some(m);
        m
    }

    /// Recompute entry positions, overlay rects and the background fit.
    /// Deferred to the next stable frame while the viewport is unstable.
    pub fn relayout_entries(&mut self) {
        if !self.viewport.is_stable() {
            self.relayout_pending = true;
            return;
        }
        let metrics = self.compute_metrics();
        self.layout_with(&metrics);
        self.relayout_pending = false;
    }

    fn layout_with(&mut self, metrics: &GridMetrics) {
        let rects = self.entries.layout(metrics, self.slide, &mut self.scene);
        if self.overlay.publish(rects, metrics, self.entries.len()) {
            log::info!("[entries] overlay version {}", self.overlay.version());
        }
        self.background.layout(
            metrics,
            self.entries.len(),
            self.slide,
            self.config.bartop_extra,
            self.viewport,
            &mut self.scene,
        );
        self.background
            .pin_character(metrics, self.slide, self.viewport, &mut self.scene);
    }

    /// Follow the page scroll (no-op while focused).
    pub fn sync_camera_to_scroll(&mut self) {
        let top = self.scroll_top();
        self.rig.sync_to_scroll(top, self.viewport);
    }

    /// Scroll notification from the page.
    pub fn on_scroll(&mut self) {
        self.sync_camera_to_scroll();
        let threshold = self.viewport.size().y / 3.0;
        let scrolled = self.scroll_top() > threshold;
        if self.scrolled_past_fold != Some(scrolled) {
            self.scrolled_past_fold = Some(scrolled);
            self.emit(EngineEvent::ScrolledPastFold(scrolled));
        }
    }

    // ---------------- products ----------------

    /// Replace the product list. Returns the model fetches the host must run.
    pub fn load_products(&mut self, items: &[ProductItem]) -> Vec<ModelRequest> {
        let requests = self.entries.load_products(items, &mut self.scene);
        // old rects must not outlive their entries while layout is deferred
        self.overlay.clear();
        for r in &requests {
            let evs = self.loading.item_start(&r.url);
            self.emit_progress(evs);
        }
        if requests.is_empty() && !self.loading.is_loading() {
            let done = self.loading.done_now();
            self.emit(EngineEvent::Progress(done));
        }
        self.relayout_entries();
        requests
    }

    /// Apply a model fetch result. Stale generations are ignored; failures
    /// leave the slot empty.
    pub fn complete_model_load(&mut self, request: &ModelRequest, result: Result<ModelData>) {
        match result {
            Ok(model) => {
                let inserted = self.entries.complete_load(
                    request,
                    &model,
                    &mut self.scene,
                    Some(self.entries_group),
                );
                if inserted {
                    self.relayout_entries();
                }
                self.track_asset_end(&request.url, true);
            }
            Err(e) => {
                self.entries.fail_load(request, &e.to_string());
                self.track_asset_end(&request.url, false);
            }
        }
    }

    // ---------------- background ----------------

    /// Start the one-per-session background load; `None` when already
    /// loaded or in flight.
    pub fn begin_background_load(&mut self) -> Option<BackgroundRequest> {
        if self.background.is_loaded() {
            let done = self.loading.done_now();
            self.emit(EngineEvent::Progress(done));
            return None;
        }
        let url = self.config.background_url.clone();
        let request = self.background.begin_load(&url)?;
        self.track_asset_start(&request.url);
        Some(request)
    }

    pub fn complete_background_load(&mut self, request: &BackgroundRequest, result: Result<ModelData>) {
        match result {
            Ok(model) => {
                if self.background.complete_load(
                    request,
                    &model,
                    &mut self.scene,
                    Some(self.bg_container),
                ) {
                    self.relayout_pending = true;
                }
                self.track_asset_end(&request.url, true);
            }
            Err(e) => {
                self.background.fail_load(request, &e.to_string());
                self.track_asset_end(&request.url, false);
            }
        }
    }

    pub fn play_talk_once(&mut self) {
        self.background.play_talk_once();
    }

    // ---------------- selection & sections ----------------

    fn projector(&self) -> Projector {
        Projector::new(&self.rig.camera, self.viewport)
    }

    fn anchor(&self) -> Option<AnchorRect> {
        self.surface
            .as_ref()
            .and_then(|s| s.selection_anchor())
            .filter(AnchorRect::is_usable)
    }

    /// Where the selected entry should sit: the anchor centre at the selection depth.
    fn select_target_position(&self) -> Vec3 {
        let p = self.projector();
        let z = SELECT_TARGET_Z;
        match self.anchor() {
            Some(r) => {
                let cx = r.left + r.width * 0.5;
                let cy = r.top + r.height * 0.5;
                let y = p.map_y_to_depth(p.world_y_at_obj_from_screen_y(cy), z);
                let x = p.map_x_to_depth(p.world_x_at_obj_from_screen_x(cx), z);
                Vec3::new(x, y, z)
            }
            None => {
                let cy = self.viewport.size().y * 0.5;
                let y = p.map_y_to_depth(p.world_y_at_obj_from_screen_y(cy), z);
                Vec3::new(0.0, y, z)
            }
        }
    }

    /// One-time world size that makes the selected model fill the anchor.
    fn select_target_size(&self) -> Option<f32> {
        let r = self.anchor()?;
        let p = self.projector();
        let depth = p.dist_at_z(SELECT_TARGET_Z).max(1e-6);
        let w = r.width * p.units_per_px_x_at(depth);
        let h = r.height * p.units_per_px_y_at(depth);
        Some((w.min(h) * SELECT_ANCHOR_PADDING).max(1e-6))
    }

    /// Select one entry, or clear the selection with `None`.
    pub fn select_by_id(&mut self, id: Option<&str>) {
        let id = id.filter(|s| !s.is_empty());
        let size = id.and_then(|_| self.select_target_size());
        self.entries.select(id, size);
        if id.is_some() {
            self.rig.active_section = None;
            self.grid_should_hide = true;
            self.spin.reset_for_selection(self.now);
        } else {
            self.grid_should_hide = false;
            self.spin.clear(self.now);
        }
        log::info!("[entries] select {:?}", id);
        self.update_slide_target();
    }

    pub fn focus_selected_to_anchor(&mut self) {
        let top = self.scroll_top();
        self.rig.focus_selection(top);
    }

    pub fn release_selected_to_scroll(&mut self) {
        self.rig.release_selection(self.viewport);
    }

    pub fn focus_section_to_fixed(&mut self, name: &str) {
        let metrics = self.metrics.unwrap_or_else(|| {
            compute_metrics(self.viewport, DEFAULT_CAM_POS.z, self.rig.camera.fovy_radians)
        });
        let section = self.config.section(name);
        let target = section_target(&section, &metrics, self.viewport, self.fovy());
        let top = self.scroll_top();
        self.rig.focus_section(name, target, top);
        self.grid_should_hide = false;
        self.update_slide_target();
    }

    pub fn release_section_to_scroll(&mut self) {
        self.rig.release_section(self.viewport);
        self.update_slide_target();
    }

    /// Freeze the grid origin while an overlay or focus view is up.
    pub fn set_lock_grid_y(&mut self, lock: bool) {
        self.lock_grid_y = lock;
        self.locked_first_row_y = if lock {
            self.metrics.map(|m| m.first_row_world_y)
        } else {
            None
        };
        self.update_slide_target();
        if !lock {
            self.relayout_pending = true;
        }
    }

    fn section_keeps_grid(&self) -> bool {
        self.rig
            .active_section
            .as_deref()
            .is_some_and(|s| self.config.section(s).push_grid_to_screen_frac.is_some())
    }

    fn update_slide_target(&mut self) {
        let Some(metrics) = self.metrics else {
            return;
        };
        let h = self.viewport.size().y;
        let upp = metrics.units_per_px_y;
        if !upp.is_finite() || upp == 0.0 {
            return;
        }
        self.slide_target = if self.grid_should_hide {
            let eye = self.rig.reference_eye();
            let p = self.projector().with_eye(Vec3::new(DEFAULT_CAM_POS.x, eye.y, eye.z));
            let y = p.world_y_at_obj_from_screen_y(h * SLIDE_HIDDEN_SCREEN_FRAC);
            finite_or(y - metrics.top_world_y(), 0.0)
        } else if self.section_keeps_grid() {
            0.0
        } else if self.lock_grid_y {
            -(h * upp * SLIDE_LOCKED_VIEWPORTS)
        } else {
            0.0
        };
    }

    // ---------------- input ----------------

    pub fn on_selection_drag_start(&mut self, x: f32, now: f64) {
        if self.entries.selected().is_none() {
            return;
        }
        self.spin.on_drag_start(x, now);
    }

    pub fn on_selection_drag_move(&mut self, x: f32, now: f64) {
        if self.entries.selected().is_none() {
            return;
        }
        self.spin.on_drag_move(x, now);
    }

    pub fn on_selection_drag_end(&mut self, now: f64) {
        self.spin.on_drag_end(now);
    }

    /// Route a normalised pointer sample to the spin controller.
    pub fn handle_pointer(&mut self, sample: PointerSample, now: f64) {
        // a press that misses the selected model must not latch the tracker
        if sample.phase == PointerPhase::Down && !self.selected_hit(sample.x, sample.y) {
            return;
        }
        if !self.pointer.accept(&sample) {
            return;
        }
        match sample.phase {
            PointerPhase::Down => self.on_selection_drag_start(sample.x, now),
            PointerPhase::Move => self.on_selection_drag_move(sample.x, now),
            PointerPhase::Up | PointerPhase::Cancel => self.on_selection_drag_end(now),
        }
    }

    fn selected_hit(&self, x: f32, y: f32) -> bool {
        let Some(entry) = self.entries.selected().and_then(|id| self.entries.get(id)) else {
            return false;
        };
        let (origin, dir) = self.projector().screen_ray(x, y);
        self.scene
            .world_bounds(entry.root)
            .is_some_and(|b| ray_aabb(origin, dir, &b).is_some())
    }

    /// Canvas click at canvas pixels; emits `CharacterClicked` on a hit.
    pub fn on_click(&mut self, x: f32, y: f32) -> bool {
        if self.entries.selected().is_some() {
            return false;
        }
        let (origin, dir) = self.projector().screen_ray(x, y);
        let hit = self.background.character_hit(origin, dir, &self.scene);
        if hit {
            self.emit(EngineEvent::CharacterClicked);
        }
        hit
    }

    // ---------------- GPU context ----------------

    pub fn on_context_lost(&mut self, now: f64) -> RecoveryDecision {
        let decision = self.recovery.on_lost(now);
        if decision != RecoveryDecision::AlreadyHandled {
            self.suspended = true;
            log::warn!("[gpu] context lost: {:?}", decision);
            self.emit(EngineEvent::ContextLost);
        }
        decision
    }

    /// The renderer could not be rebuilt; rendering stays suspended and the
    /// returned decision says when to try again.
    pub fn on_context_rebuild_failed(&mut self, now: f64) -> RecoveryDecision {
        let decision = self.recovery.on_rebuild_failed(now);
        self.suspended = true;
        log::warn!("[gpu] rebuild failed, retrying: {:?}", decision);
        decision
    }

    /// The renderer has been rebuilt. Returns a background request when the
    /// background must be reloaded from scratch.
    pub fn on_context_restored(&mut self) -> Option<BackgroundRequest> {
        self.recovery.on_restored();
        self.suspended = false;
        self.last_frame = None;
        self.relayout_pending = true;
        self.emit(EngineEvent::ContextRestored);
        if self.background.is_loaded() {
            return None;
        }
        self.background.reset_inflight();
        self.begin_background_load()
    }

    // ---------------- frame ----------------

    /// Advance one frame at `now` seconds. Returns false while rendering is suspended.
    pub fn frame(&mut self, now: f64) -> bool {
        if self.suspended {
            return false;
        }
        let dt = match self.last_frame {
            Some(prev) => ((now - prev) as f32).clamp(0.0, MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_frame = Some(now);
        self.now = now;

        self.refresh_viewport();
        if self.relayout_pending && self.viewport.is_stable() {
            self.relayout_entries();
            self.update_slide_target();
            self.sync_camera_to_scroll();
        }

        let tuning = self.config.tuning.clone();
        let delta = self.slide_target - self.slide;
        if delta.abs() > SLIDE_SETTLE_EPSILON && self.viewport.is_stable() {
            self.slide += delta * approach_factor(tuning.grid_slide_rate, dt);
            if let Some(m) = self.metrics {
                self.layout_with(&m);
            }
        }

        self.background.update(dt, &mut self.scene);

        match self.rig.step(dt, &tuning) {
            Some(CameraSettle::Returned { scroll_top }) => {
                if let Some(s) = self.scroll.as_ref() {
                    s.set_scroll_top(scroll_top);
                }
                self.sync_camera_to_scroll();
                self.update_slide_target();
            }
            Some(CameraSettle::Arrived) => self.update_slide_target(),
            None => {}
        }

        let selected = self.entries.selected().is_some();
        let target = selected.then(|| self.select_target_position());
        let spin = if selected { self.spin.step(dt, now) } else { 0.0 };
        self.entries
            .update(dt, &tuning, target, spin, &mut self.scene);

        if let Some(m) = self.metrics {
            self.background
                .pin_character(&m, self.slide, self.viewport, &mut self.scene);
        }
        true
    }
}
