// Host-side tests for loading progress and the event bus.

use catalog_core::events::{EngineEvent, EventBus};
use catalog_core::progress::{LoadingManager, ProgressMeter, ProgressPhase};
use catalog_core::recovery::{ContextRecovery, RecoveryDecision};
use std::cell::RefCell;
use std::rc::Rc;

fn phases(evs: &[catalog_core::ProgressEvent]) -> Vec<ProgressPhase> {
    evs.iter().map(|e| e.phase).collect()
}

#[test]
fn cycle_reports_start_progress_done() {
    let mut lm = LoadingManager::new();
    assert_eq!(phases(&lm.item_start("/a.glb")), [ProgressPhase::Start]);
    assert!(lm.item_start("/b.glb").is_empty());
    assert!(lm.is_loading());

    let first = lm.item_end("/a.glb");
    assert_eq!(phases(&first), [ProgressPhase::Progress]);
    assert_eq!((first[0].loaded, first[0].total), (1, 2));

    let last = lm.item_error("/b.glb");
    assert_eq!(
        phases(&last),
        [ProgressPhase::Error, ProgressPhase::Progress, ProgressPhase::Done]
    );
    assert!(!lm.is_loading());
    assert_eq!(phases(&lm.item_start("/c.glb")), [ProgressPhase::Start]);
}

#[test]
fn unknown_completions_do_not_advance_the_cycle() {
    let mut lm = LoadingManager::new();
    lm.item_start("/a.glb");
    lm.item_start("/a.glb");
    assert!(lm.item_end("/other.glb").is_empty());
    assert!(lm.item_error("/other.glb").is_empty());

    let first = lm.item_end("/a.glb");
    assert_eq!((first[0].loaded, first[0].total), (1, 2));
    assert_eq!(
        phases(&lm.item_end("/a.glb")),
        [ProgressPhase::Progress, ProgressPhase::Done]
    );
    assert!(lm.item_end("/a.glb").is_empty());
}

#[test]
fn meter_ignores_events_after_done_until_reset() {
    let mut lm = LoadingManager::new();
    let mut meter = ProgressMeter::default();
    assert_eq!(meter.fraction(), 0.1);

    for ev in lm.item_start("/a.glb").iter().chain(lm.item_start("/b.glb").iter()) {
        meter.apply(ev);
    }
    for ev in lm.item_end("/a.glb") {
        meter.apply(&ev);
    }
    assert!((meter.fraction() - 0.5).abs() < 1e-6);
    for ev in lm.item_end("/b.glb") {
        meter.apply(&ev);
    }
    assert!(meter.done);
    assert_eq!(meter.fraction(), 1.0);

    for ev in lm.item_start("/late.glb") {
        meter.apply(&ev);
    }
    assert_eq!(meter.fraction(), 1.0);
    meter.reset();
    assert!(!meter.done);
}

#[test]
fn progress_serialises_lowercase_phase() {
    let mut lm = LoadingManager::new();
    let ev = lm.item_start("/a.glb").remove(0);
    let json = serde_json::to_string(&ev).unwrap();
    assert!(json.contains(r#""phase":"start""#), "{json}");
}

#[test]
fn bus_delivers_until_unsubscribed() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut bus = EventBus::new();
    let sink = Rc::clone(&seen);
    let id = bus.subscribe(move |e: &EngineEvent| sink.borrow_mut().push(e.name()));
    bus.emit(&EngineEvent::CharacterClicked);
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    bus.emit(&EngineEvent::ContextLost);
    assert_eq!(*seen.borrow(), ["character_click"]);
    assert!(bus.is_empty());
}

#[test]
fn context_rebuilds_are_rate_limited() {
    let mut r = ContextRecovery::new(5.0);
    assert!(matches!(r.on_lost(1.0), RecoveryDecision::Schedule { .. }));
    assert_eq!(r.on_lost(1.5), RecoveryDecision::AlreadyHandled);
    r.on_restored();
    assert_eq!(r.on_lost(3.0), RecoveryDecision::Suppressed);
    assert!(r.is_lost());
    r.on_restored();
    assert!(matches!(r.on_lost(9.0), RecoveryDecision::Schedule { .. }));
}

#[test]
fn failed_rebuild_retries_after_the_interval() {
    let mut r = ContextRecovery::new(5.0);
    assert_eq!(r.on_lost(10.0), RecoveryDecision::Schedule { delay_ms: 250 });
    assert_eq!(r.on_rebuild_failed(10.5), RecoveryDecision::Schedule { delay_ms: 4750 });
    assert!(r.is_lost());
    // the retry itself counts as an attempt
    assert_eq!(r.on_rebuild_failed(15.25), RecoveryDecision::Schedule { delay_ms: 5250 });
    r.on_restored();
    assert!(!r.is_lost());
    assert_eq!(r.on_lost(21.0), RecoveryDecision::Suppressed);
}
