// Host-side tests for drag-to-spin physics.

use catalog_core::constants::*;
use catalog_core::spin::SpinController;

#[test]
fn drag_velocity_is_pixels_over_time() {
    let mut s = SpinController::default();
    s.on_drag_start(0.0, 0.0);
    s.on_drag_move(100.0, 0.2);
    // 100 px * 0.01 rad/px over 0.2 s
    assert!((s.angular_velocity - 5.0).abs() < 1e-4);
    assert!((s.pending_delta - 1.0).abs() < 1e-5);
}

#[test]
fn drag_velocity_is_clamped() {
    let mut s = SpinController::default();
    s.on_drag_start(0.0, 0.0);
    s.on_drag_move(-300.0, 0.2);
    assert_eq!(s.angular_velocity, -SPIN_VELOCITY_LIMIT);
}

#[test]
fn tiny_time_steps_use_the_minimum_dt() {
    let mut s = SpinController::default();
    s.on_drag_start(10.0, 1.0);
    s.on_drag_move(10.4, 1.0);
    assert!((s.angular_velocity - 0.004 / DRAG_MIN_DT).abs() < 1e-4);
}

#[test]
fn release_damps_before_the_resume_delay() {
    let mut s = SpinController::default();
    s.on_drag_start(0.0, 0.0);
    s.on_drag_move(100.0, 0.2);
    s.on_drag_end(0.2);

    let rot = s.step(0.1, 0.3);
    let damped = 5.0 * (-SPIN_DAMPING_RATE * 0.1f32).exp();
    assert!((s.angular_velocity - damped).abs() < 1e-4);
    // the drag delta is applied once, plus this frame's coast
    assert!((rot - (1.0 + damped * 0.1)).abs() < 1e-4);
    assert_eq!(s.step(0.0, 0.3), 0.0);
}

#[test]
fn auto_spin_resumes_after_idle() {
    let mut s = SpinController::default();
    s.on_drag_start(0.0, 0.0);
    s.on_drag_move(100.0, 0.2);
    s.on_drag_end(0.2);
    let mut now = 0.2;
    for _ in 0..600 {
        now += 1.0 / 60.0;
        s.step(1.0 / 60.0, now);
    }
    assert!((s.angular_velocity - AUTO_SPIN_SPEED).abs() < 0.01, "{}", s.angular_velocity);
}

#[test]
fn selection_starts_at_auto_speed_and_clear_stops() {
    let mut s = SpinController::default();
    s.reset_for_selection(10.0);
    assert_eq!(s.angular_velocity, AUTO_SPIN_SPEED);
    let rot = s.step(0.1, 10.1);
    assert!(rot > 0.0);
    s.clear(11.0);
    assert_eq!(s.angular_velocity, 0.0);
    assert!(!s.dragging);
}

#[test]
fn moves_without_a_drag_are_ignored() {
    let mut s = SpinController::default();
    s.on_drag_move(500.0, 1.0);
    assert_eq!(s.pending_delta, 0.0);
    assert_eq!(s.angular_velocity, 0.0);
}

#[test]
fn speed_never_grows_while_coasting() {
    let mut s = SpinController::default();
    s.on_drag_start(0.0, 0.0);
    s.on_drag_move(100.0, 0.2);
    s.on_drag_end(0.2);
    let mut now = 0.2;
    let mut prev = s.angular_velocity.abs();
    while now < 0.2 + AUTO_SPIN_RESUME_DELAY as f64 - 0.1 {
        now += 1.0 / 60.0;
        s.step(1.0 / 60.0, now);
        assert!(s.angular_velocity.abs() <= prev + 1e-6);
        prev = s.angular_velocity.abs();
    }
}
