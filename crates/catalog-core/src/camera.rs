//! Camera state machine: scroll-follow, selection focus, section focus.
//!
//! Scroll-follow derives camera Y from the page scroll offset. Focusing on a
//! selection or a section records the scroll offset and disables following;
//! releasing eases back and only re-enables following once the camera has
//! settled, at which point the recorded scroll offset is handed back to the
//! page.

use crate::config::{SectionConfig, Tuning};
use crate::constants::*;
use crate::grid::GridMetrics;
use crate::projection::{Camera, Projector, Viewport};
use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMode {
    ScrollFollow,
    FocusSelection,
    FocusSection,
}

/// Outcome of one camera step when an eased motion completes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraSettle {
    /// A focus transition arrived; the camera stays put.
    Arrived,
    /// A release transition arrived; scroll-follow is back on and the page
    /// scroll offset must be restored to the carried value.
    Returned { scroll_top: f32 },
}

#[derive(Clone, Debug)]
pub struct CameraRig {
    pub camera: Camera,
    pub target_y: Option<f32>,
    pub target: Option<Vec3>,
    pub mode_3d: bool,
    pub returning: bool,
    pub follow_scroll: bool,
    pub prev_scroll_top: f32,
    pub active_section: Option<String>,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            target_y: None,
            target: None,
            mode_3d: false,
            returning: false,
            follow_scroll: true,
            prev_scroll_top: 0.0,
            active_section: None,
        }
    }
}

impl CameraRig {
    pub fn position(&self) -> Vec3 {
        self.camera.position
    }

    pub fn mode(&self) -> CameraMode {
        if self.follow_scroll {
            CameraMode::ScrollFollow
        } else if self.active_section.is_some() || self.mode_3d {
            CameraMode::FocusSection
        } else {
            CameraMode::FocusSelection
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.target.is_some() || self.target_y.is_some()
    }

    /// Units per pixel on the object plane as seen from the default camera.
    pub fn scroll_units_per_px(viewport: Viewport) -> f32 {
        let reference = Camera::default();
        Projector::new(&reference, viewport).units_per_px()
    }

    /// Place the camera from the page scroll offset; no-op unless following.
    pub fn sync_to_scroll(&mut self, scroll_top: f32, viewport: Viewport) {
        if !self.follow_scroll {
            return;
        }
        let upp = Self::scroll_units_per_px(viewport);
        self.camera.position = Vec3::new(
            DEFAULT_CAM_POS.x,
            -finite_or(scroll_top, 0.0) * upp,
            DEFAULT_CAM_POS.z,
        );
    }

    pub fn focus_selection(&mut self, scroll_top: f32) {
        self.target = None;
        self.mode_3d = false;
        self.prev_scroll_top = finite_or(scroll_top, 0.0);
        self.target_y = Some(self.camera.position.y);
        self.follow_scroll = false;
        self.returning = false;
        log::info!("[camera] focus selection (scroll {:.1})", self.prev_scroll_top);
    }

    pub fn release_selection(&mut self, viewport: Viewport) {
        let upp = Self::scroll_units_per_px(viewport);
        self.target_y = Some(-self.prev_scroll_top * upp);
        self.returning = true;
    }

    /// Ease toward a fixed 3D position for a named section.
    pub fn focus_section(&mut self, name: &str, target: Vec3, scroll_top: f32) {
        // a section opened straight from a selection keeps the original scroll offset
        if self.follow_scroll {
            self.prev_scroll_top = finite_or(scroll_top, 0.0);
        }
        self.target_y = None;
        self.target = Some(target);
        self.mode_3d = true;
        self.follow_scroll = false;
        self.returning = false;
        self.active_section = Some(name.to_string());
        log::info!("[camera] focus section '{}' -> {:?}", name, target);
    }

    pub fn release_section(&mut self, viewport: Viewport) {
        let upp = Self::scroll_units_per_px(viewport);
        self.target_y = None;
        self.target = Some(Vec3::new(
            DEFAULT_CAM_POS.x,
            -self.prev_scroll_top * upp,
            DEFAULT_CAM_POS.z,
        ));
        self.mode_3d = true;
        self.returning = true;
        self.active_section = None;
    }

    /// Advance eased motion by `dt` seconds.
    pub fn step(&mut self, dt: f32, tuning: &Tuning) -> Option<CameraSettle> {
        if self.mode_3d {
            let target = self.target?;
            let k = approach_factor(tuning.camera_3d_rate, dt);
            let pos = self.camera.position.lerp(target, k);
            self.camera.position = pos;
            if pos.distance(target) >= CAMERA_SETTLE_EPSILON {
                return None;
            }
            self.camera.position = target;
            self.target = None;
            self.mode_3d = false;
            return Some(self.finish());
        }
        if self.follow_scroll {
            return None;
        }
        let target_y = self.target_y?;
        let k = approach_factor(tuning.camera_y_rate, dt);
        let p = &mut self.camera.position;
        p.y += (target_y - p.y) * k;
        p.x = DEFAULT_CAM_POS.x;
        p.z = DEFAULT_CAM_POS.z;
        if (p.y - target_y).abs() >= CAMERA_SETTLE_EPSILON {
            return None;
        }
        p.y = target_y;
        self.target_y = None;
        Some(self.finish())
    }

    fn finish(&mut self) -> CameraSettle {
        if self.returning {
            self.returning = false;
            self.follow_scroll = true;
            log::info!("[camera] back to scroll-follow (scroll {:.1})", self.prev_scroll_top);
            CameraSettle::Returned {
                scroll_top: self.prev_scroll_top,
            }
        } else {
            CameraSettle::Arrived
        }
    }

    /// Camera Y/Z that layout targets should assume: the pending target when
    /// one is set, otherwise the current position.
    pub fn reference_eye(&self) -> Vec3 {
        if let (true, Some(t)) = (self.mode_3d, self.target) {
            return t;
        }
        let mut eye = self.camera.position;
        if let Some(y) = self.target_y {
            eye.y = y;
        }
        eye
    }
}

/// Section camera target, lowered when the section asks for the grid top to
/// sit at a given screen fraction (so a page overlay fully covers it).
pub fn section_target(
    section: &SectionConfig,
    metrics: &GridMetrics,
    viewport: Viewport,
    fovy_radians: f32,
) -> Vec3 {
    let mut target = section.position();
    let Some(frac) = section.push_grid_to_screen_frac else {
        return target;
    };
    let h = viewport.size().y;
    let projector = Projector {
        eye: target,
        fovy_radians,
        viewport,
    };
    let target_world_y = projector.world_y_at_obj_from_screen_y(h * frac);
    let slide = target_world_y - metrics.top_world_y();
    if slide.is_finite() {
        target.y -= slide;
    }
    target
}
