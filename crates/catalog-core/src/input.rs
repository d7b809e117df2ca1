//! Unified pointer input.
//!
//! Mouse, pen and touch events are normalised into [`PointerSample`]s at the
//! web boundary so the engine only ever sees one input path.

use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    /// Canvas-relative CSS pixels.
    pub x: f32,
    pub y: f32,
    /// Pointer id, or touch identifier.
    pub id: i32,
    pub phase: PointerPhase,
}

impl PointerSample {
    pub fn new(x: f32, y: f32, id: i32, phase: PointerPhase) -> Self {
        Self { x, y, id, phase }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Tracks the single pointer that owns the current drag.
#[derive(Default, Clone, Copy, Debug)]
pub struct PointerTracker {
    active: Option<i32>,
}

impl PointerTracker {
    /// Filter a sample down to the drag it belongs to. Samples from a second
    /// finger while one is already down are ignored.
    pub fn accept(&mut self, s: &PointerSample) -> bool {
        match (s.phase, self.active) {
            (PointerPhase::Down, None) => {
                self.active = Some(s.id);
                true
            }
            (PointerPhase::Down, Some(_)) => false,
            (PointerPhase::Move, Some(id)) => id == s.id,
            (PointerPhase::Up | PointerPhase::Cancel, Some(id)) if id == s.id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_finger_is_ignored() {
        let mut t = PointerTracker::default();
        assert!(t.accept(&PointerSample::new(0.0, 0.0, 1, PointerPhase::Down)));
        assert!(!t.accept(&PointerSample::new(0.0, 0.0, 2, PointerPhase::Down)));
        assert!(!t.accept(&PointerSample::new(5.0, 0.0, 2, PointerPhase::Move)));
        assert!(t.accept(&PointerSample::new(5.0, 0.0, 1, PointerPhase::Move)));
        assert!(t.accept(&PointerSample::new(5.0, 0.0, 1, PointerPhase::Up)));
        assert!(!t.is_active());
    }
}
