//! Pixel/world conversions at a camera-relative depth.
//!
//! All grid content is authored on the object plane (`OBJECT_PLANE_Z`); the
//! helpers here convert pixel distances to world units at that depth and
//! project between screen space and the plane. Nothing here panics: a
//! degenerate viewport or camera yields finite fallbacks.

use crate::constants::*;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Canvas size in CSS pixels plus page visibility.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub visible: bool,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            visible: true,
        }
    }

    /// Width/height clamped to at least one pixel.
    pub fn size(&self) -> Vec2 {
        Vec2::new(
            finite_or(self.width, 1.0).max(1.0),
            finite_or(self.height, 1.0).max(1.0),
        )
    }

    pub fn aspect(&self) -> f32 {
        let s = self.size();
        s.x / s.y
    }

    /// Layout is skipped while the viewport is near-zero or the page hidden.
    pub fn is_stable(&self) -> bool {
        self.visible
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > MIN_STABLE_VIEWPORT_PX
            && self.height > MIN_STABLE_VIEWPORT_PX
    }
}

/// Perspective camera looking down -Z with no rotation.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub fovy_radians: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DEFAULT_CAM_POS,
            fovy_radians: CAMERA_FOV_Y_DEG.to_radians(),
            aspect: 1.0,
            znear: CAMERA_NEAR,
            zfar: CAMERA_FAR,
        }
    }
}

impl Camera {
    /// Compute the clip-space projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect.max(1e-6), self.znear, self.zfar)
    }
    /// Compute the view matrix that transforms world to view space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, Vec3::NEG_Z, Vec3::Y)
    }
    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Visible world height of the frustum at `depth` from the eye.
#[inline]
pub fn view_height_at_depth(fovy_radians: f32, depth: f32) -> f32 {
    2.0 * (fovy_radians * 0.5).tan() * depth
}

/// A camera paired with the viewport it renders into.
#[derive(Clone, Copy, Debug)]
pub struct Projector {
    pub eye: Vec3,
    pub fovy_radians: f32,
    pub viewport: Viewport,
}

impl Projector {
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        Self {
            eye: camera.position,
            fovy_radians: camera.fovy_radians,
            viewport,
        }
    }

    /// Same projector with the eye moved, e.g. a reference camera.
    pub fn with_eye(&self, eye: Vec3) -> Self {
        Self { eye, ..*self }
    }

    pub fn dist_at_z(&self, z_world: f32) -> f32 {
        (self.eye.z - z_world).abs()
    }

    pub fn dist_obj(&self) -> f32 {
        self.dist_at_z(OBJECT_PLANE_Z)
    }

    pub fn units_per_px_y_at(&self, depth: f32) -> f32 {
        let h = self.viewport.size().y;
        finite_or(view_height_at_depth(self.fovy_radians, depth) / h, 0.001)
    }

    pub fn units_per_px_x_at(&self, depth: f32) -> f32 {
        let w = self.viewport.size().x;
        finite_or(self.viewport_width_at_depth(depth) / w, 0.001)
    }

    pub fn viewport_width_at_depth(&self, depth: f32) -> f32 {
        let view_w = view_height_at_depth(self.fovy_radians, depth) * self.viewport.aspect();
        finite_or(view_w, 1.0)
    }

    /// World units per pixel on the object plane.
    pub fn units_per_px(&self) -> f32 {
        self.units_per_px_y_at(self.dist_obj())
    }

    pub fn world_y_at_obj_from_screen_y(&self, screen_y: f32) -> f32 {
        let h = self.viewport.size().y;
        self.eye.y - (screen_y - h * 0.5) * self.units_per_px()
    }

    pub fn world_x_at_obj_from_screen_x(&self, screen_x: f32) -> f32 {
        let w = self.viewport.size().x;
        self.eye.x + (screen_x - w * 0.5) * self.units_per_px_x_at(self.dist_obj())
    }

    fn depth_ratio(&self, z_target: f32) -> f32 {
        finite_or(self.dist_at_z(z_target) / self.dist_obj().max(1e-6), 1.0)
    }

    /// Map an object-plane Y to the Y that projects to the same pixel at `z_target`.
    pub fn map_y_to_depth(&self, y_obj: f32, z_target: f32) -> f32 {
        let cy = self.eye.y;
        finite_or(cy + (y_obj - cy) * self.depth_ratio(z_target), cy)
    }

    pub fn map_x_to_depth(&self, x_obj: f32, z_target: f32) -> f32 {
        let cx = self.eye.x;
        finite_or(cx + (x_obj - cx) * self.depth_ratio(z_target), cx)
    }

    /// Map an object-plane length to the length covering the same pixels at `z_target`.
    pub fn map_len_to_depth(&self, len_obj: f32, z_target: f32) -> f32 {
        len_obj * self.depth_ratio(z_target)
    }

    fn camera(&self) -> Camera {
        Camera {
            position: self.eye,
            aspect: self.viewport.aspect(),
            fovy_radians: self.fovy_radians,
            ..Camera::default()
        }
    }

    /// Project a world position to pixel coordinates (origin top-left).
    pub fn project_to_px(&self, world: Vec3) -> Vec2 {
        let s = self.viewport.size();
        let clip = self.camera().view_proj() * world.extend(1.0);
        if clip.w.abs() < 1e-9 {
            return Vec2::ZERO;
        }
        let ndc = clip.truncate() / clip.w;
        Vec2::new((ndc.x * 0.5 + 0.5) * s.x, (0.5 - ndc.y * 0.5) * s.y)
    }

    /// Compute a world-space ray through a pixel.
    ///
    /// Returns `(ray_origin, ray_direction)` in world space.
    pub fn screen_ray(&self, sx: f32, sy: f32) -> (Vec3, Vec3) {
        let s = self.viewport.size();
        let ndc_x = (2.0 * sx / s.x) - 1.0;
        let ndc_y = 1.0 - (2.0 * sy / s.y);
        let inv = self.camera().view_proj().inverse();
        let p_far = inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let p1: Vec3 = p_far.truncate() / p_far.w;
        let ro = self.eye;
        let rd = (p1 - ro).normalize_or_zero();
        (ro, rd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projector() -> Projector {
        Projector::new(&Camera::default(), Viewport::new(1200.0, 800.0))
    }

    #[test]
    fn screen_center_maps_to_eye_axis() {
        let p = projector();
        assert!((p.world_y_at_obj_from_screen_y(400.0) - p.eye.y).abs() < 1e-6);
        let px = p.project_to_px(Vec3::new(0.0, 0.0, OBJECT_PLANE_Z));
        assert!((px - Vec2::new(600.0, 400.0)).length() < 1e-3);
    }

    #[test]
    fn object_plane_pixel_round_trip() {
        let p = projector();
        let y = p.world_y_at_obj_from_screen_y(100.0);
        let x = p.world_x_at_obj_from_screen_x(900.0);
        let px = p.project_to_px(Vec3::new(x, y, OBJECT_PLANE_Z));
        assert!((px.x - 900.0).abs() < 0.05, "{px:?}");
        assert!((px.y - 100.0).abs() < 0.05, "{px:?}");
    }

    #[test]
    fn depth_mapping_preserves_screen_position() {
        let p = projector();
        let y_obj = 0.4;
        let y_bg = p.map_y_to_depth(y_obj, BG_Z);
        let a = p.project_to_px(Vec3::new(0.0, y_obj, OBJECT_PLANE_Z));
        let b = p.project_to_px(Vec3::new(0.0, y_bg, BG_Z));
        assert!((a.y - b.y).abs() < 0.05);
    }

    #[test]
    fn tiny_viewport_is_unstable() {
        assert!(!Viewport::new(5.0, 800.0).is_stable());
        let mut v = Viewport::new(800.0, 600.0);
        assert!(v.is_stable());
        v.visible = false;
        assert!(!v.is_stable());
    }
}
