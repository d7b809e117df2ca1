//! Drag-to-spin physics for the selected product.
//!
//! Idle auto-spin → dragging → released (exponential damping) → auto-spin
//! again once the pointer has been idle past the resume delay or the
//! velocity has decayed below the resume threshold. Times are seconds.

use crate::config::Tuning;
use crate::constants::{approach_factor, SPIN_REST_EPSILON};

#[derive(Clone, Debug)]
pub struct SpinController {
    pub dragging: bool,
    pub last_x: f32,
    pub last_time: f64,
    pub last_input: Option<f64>,
    pub pending_delta: f32,
    pub angular_velocity: f32,
    pub auto_speed: f32,
    tuning: Tuning,
}

impl SpinController {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            dragging: false,
            last_x: 0.0,
            last_time: 0.0,
            last_input: None,
            pending_delta: 0.0,
            angular_velocity: 0.0,
            auto_speed: tuning.auto_spin_speed,
            tuning,
        }
    }

    /// Fresh selection: spin at auto speed right away.
    pub fn reset_for_selection(&mut self, now: f64) {
        self.dragging = false;
        self.pending_delta = 0.0;
        self.auto_speed = self.tuning.auto_spin_speed;
        self.angular_velocity = self.auto_speed;
        // pretend the last input was long ago so auto-spin holds
        self.last_input = Some(now - 3.0);
        self.last_time = now;
    }

    /// Selection cleared: stop spinning.
    pub fn clear(&mut self, now: f64) {
        self.dragging = false;
        self.pending_delta = 0.0;
        self.angular_velocity = 0.0;
        self.last_input = Some(now);
        self.last_time = now;
    }

    pub fn on_drag_start(&mut self, x: f32, now: f64) {
        self.dragging = true;
        self.last_x = if x.is_finite() { x } else { 0.0 };
        self.last_time = now;
        self.last_input = Some(now);
        self.pending_delta = 0.0;
        self.angular_velocity = 0.0;
    }

    pub fn on_drag_move(&mut self, x: f32, now: f64) {
        if !self.dragging {
            return;
        }
        let x = if x.is_finite() { x } else { 0.0 };
        let dx = x - self.last_x;
        let dt = ((now - self.last_time) as f32).max(self.tuning.drag_min_dt);
        let delta = dx * self.tuning.drag_spin_scale;
        self.pending_delta += delta;
        let vel = delta / dt;
        if vel.is_finite() {
            let limit = self.tuning.spin_velocity_limit;
            self.angular_velocity = vel.clamp(-limit, limit);
        }
        self.last_x = x;
        self.last_time = now;
        self.last_input = Some(now);
    }

    pub fn on_drag_end(&mut self, now: f64) {
        self.last_input = Some(now);
        if !self.dragging {
            return;
        }
        self.dragging = false;
        self.last_time = now;
    }

    /// Advance one frame; returns the Y rotation to apply to the selected entry.
    pub fn step(&mut self, dt: f32, now: f64) -> f32 {
        let dt = dt.max(0.0);
        let mut rotation = std::mem::take(&mut self.pending_delta);
        if !self.dragging {
            let idle_for = self
                .last_input
                .map(|t| (now - t) as f32)
                .unwrap_or(f32::INFINITY);
            let idle = idle_for > self.tuning.auto_spin_resume_delay;
            // once idle, damping would hold the blend below auto speed
            if !idle {
                self.angular_velocity *= (-self.tuning.spin_damping_rate * dt).exp();
                if self.angular_velocity.abs() < SPIN_REST_EPSILON {
                    self.angular_velocity = 0.0;
                }
            }
            if idle || self.angular_velocity.abs() < self.tuning.auto_spin_threshold {
                let blend = approach_factor(self.tuning.auto_spin_blend_rate, dt);
                self.angular_velocity += (self.auto_speed - self.angular_velocity) * blend;
            }
        }
        rotation += self.angular_velocity * dt;
        rotation
    }
}

impl Default for SpinController {
    fn default() -> Self {
        Self::new(Tuning::default())
    }
}
