use glam::Vec3;

// Shared layout/animation tuning constants used by the engine and the web frontend.

// Camera
pub const DEFAULT_CAM_POS: Vec3 = Vec3::new(0.0, 0.0, 3.0);
pub const CAMERA_FOV_Y_DEG: f32 = 55.0;
pub const CAMERA_NEAR: f32 = 0.01;
pub const CAMERA_FAR: f32 = 1000.0;

// Scene depths (world Z)
pub const OBJECT_PLANE_Z: f32 = 0.6; // all grid content lives here
pub const BG_Z: f32 = -0.6;
pub const SELECT_TARGET_Z: f32 = 2.0; // depth of the focused product

// Grid layout
pub const NARROW_LAYOUT_MAX_WIDTH_PX: f32 = 700.0;
pub const NARROW_COLUMNS: usize = 2;
pub const WIDE_COLUMNS: usize = 4;
pub const NARROW_ROW_HEIGHT_FRAC: f32 = 0.30; // of viewport height
pub const WIDE_ROW_HEIGHT_FRAC: f32 = 0.20;
pub const GRID_TOP_OFFSET_FRAC: f32 = 0.50;
pub const CELL_FILL_FRAC: f32 = 0.85; // item size relative to the smaller cell side
pub const SPECIAL_SIZE_MULTIPLIER: f32 = 1.1;
pub const CONTENT_BOTTOM_PADDING_ROWS: f32 = 0.35;
pub const OVERLAY_METRIC_EPSILON_PX: f32 = 0.5;

// Viewport stability
pub const MIN_STABLE_VIEWPORT_PX: f32 = 10.0;

// Selection
pub const SELECT_ANCHOR_PADDING: f32 = 0.92; // inset so the model sits inside the slot

// Background
pub const BARTOP_EXTRA: f32 = 0.8; // counter overshoot beyond the grid width
pub const BG_NORMALIZED_SIZE: f32 = 3.3;
pub const BG_OFFSET: Vec3 = Vec3::new(0.0, -0.3, BG_Z + 0.3);
pub const TOPSTUFF_MIN_WIDTH_PX: f32 = 500.0;
pub const TOPSTUFF_MAX_WIDTH_PX: f32 = 1000.0;
pub const TOPSTUFF_MIN_SCALE: f32 = 0.6;
pub const TOPSTUFF_MAX_SCALE: f32 = 1.0;

// Background node names (matched case-insensitively)
pub const NODE_BAR_TOP: &str = "barTop";
pub const NODE_TOP_STUFF: &str = "topstuff";
pub const NODE_SHELF: &str = "shelf";
pub const NODE_CHARACTER: &str = "character";
pub const NODE_CHAR_PLACER: &str = "charplacer";

// Grid slide targets (in viewport heights)
pub const SLIDE_HIDDEN_SCREEN_FRAC: f32 = 1.5; // grid top pushed below the fold on selection
pub const SLIDE_LOCKED_VIEWPORTS: f32 = 1.2;
pub const LEGAL_GRID_SCREEN_FRAC: f32 = 0.9;

// Spin (defaults for `Tuning`)
pub const AUTO_SPIN_SPEED: f32 = 4.9; // radians per second
pub const DRAG_SPIN_SCALE: f32 = 0.01; // radians per pixel dragged
pub const DRAG_MIN_DT: f32 = 0.008; // seconds
pub const SPIN_DAMPING_RATE: f32 = 3.0;
pub const AUTO_SPIN_RESUME_DELAY: f32 = 1.0; // seconds
pub const AUTO_SPIN_BLEND_RATE: f32 = 1.2;
pub const AUTO_SPIN_THRESHOLD: f32 = 0.2; // rad/s
pub const SPIN_VELOCITY_LIMIT: f32 = 6.0; // rad/s
pub const SPIN_REST_EPSILON: f32 = 0.01;

// Exponential approach rates (per second)
pub const CAMERA_Y_RATE: f32 = 6.0;
pub const CAMERA_3D_RATE: f32 = 4.5;
pub const ENTRY_MOVE_RATE: f32 = 8.0;
pub const ENTRY_TURN_RATE: f32 = 6.0;
pub const GRID_SLIDE_RATE: f32 = 6.0;

// Convergence thresholds
pub const CAMERA_SETTLE_EPSILON: f32 = 1e-3;
pub const SCALE_SETTLE_EPSILON: f32 = 1e-3;
pub const SLIDE_SETTLE_EPSILON: f32 = 1e-4;

// Animation fades (seconds)
pub const TALK_FADE_OUT_SEC: f32 = 0.12;
pub const IDLE_FADE_IN_SEC: f32 = 0.2;

// GPU context recovery
pub const CONTEXT_RELOAD_MIN_INTERVAL_SEC: f64 = 5.0;
pub const CONTEXT_RELOAD_DELAY_MS: i32 = 250;

/// Frame-rate independent blend factor for an exponential approach at `rate`.
#[inline]
pub fn approach_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt.max(0.0)).exp()
}

/// Replace a non-finite value with a fallback.
#[inline]
pub fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}
