use rig_hardware::util::Debouncer;
use rstest::rstest;
use std::time::{Duration, Instant};

fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

#[test]
fn short_glitch_is_filtered() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::from_millis(50), false);
    assert!(!d.update(true, at(t0, 0)));
    assert!(!d.update(true, at(t0, 20)));
    // Line returns to the stable level before the window elapses
    assert!(!d.update(false, at(t0, 30)));
    assert!(!d.update(false, at(t0, 100)));
}

#[test]
fn held_transition_is_accepted_after_window() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::from_millis(50), false);
    assert!(!d.update(true, at(t0, 0)));
    assert!(!d.update(true, at(t0, 49)));
    assert!(d.update(true, at(t0, 50)));
    assert!(d.state());
}

#[rstest]
#[case(true)]
#[case(false)]
fn initial_state_is_reported_until_contradicted(#[case] initial: bool) {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::from_millis(10), initial);
    assert_eq!(d.update(initial, at(t0, 0)), initial);
    assert_eq!(d.update(!initial, at(t0, 1)), initial);
    assert_eq!(d.update(!initial, at(t0, 11)), !initial);
}

#[test]
fn bounce_restarts_the_window() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::from_millis(50), false);
    assert!(!d.update(true, at(t0, 0)));
    assert!(!d.update(false, at(t0, 10))); // bounce back
    assert!(!d.update(true, at(t0, 20))); // window restarts here
    assert!(!d.update(true, at(t0, 60))); // only 40ms since restart
    assert!(d.update(true, at(t0, 70)));
}

#[test]
fn zero_window_follows_raw_immediately() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::ZERO, false);
    assert!(d.update(true, at(t0, 0)));
    assert!(!d.update(false, at(t0, 0)));
}
