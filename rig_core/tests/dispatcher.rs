//! End-to-end protocol tests: scripted serial input in, response lines out,
//! with every device mocked.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use rig_core::dispatcher::{Dispatcher, DispatcherCfg, ServiceOutcome};
use rig_core::mocks::{
    MockActuator, MockEndstop, MockPin, MockPixels, SeqInput, SharedBuf, SimClock,
    mock_peripherals,
};
use rig_core::pipette::{MotionCfg, Pipette};
use rig_core::Peripherals;

const TRIP_AT: i64 = 600;

type TestDispatcher = Dispatcher<Cursor<Vec<u8>>, SharedBuf, MockActuator, MockEndstop>;

fn dispatcher_with(input: &str, devices: Peripherals) -> (TestDispatcher, SharedBuf) {
    let clock: Arc<SimClock> = Arc::new(SimClock::new());
    let actuator = MockActuator::new();
    let endstop = MockEndstop::new(actuator.physical_position(), TRIP_AT);
    let pipette = Pipette::builder()
        .with_actuator(actuator)
        .with_endstop(endstop)
        .with_motion(MotionCfg::default())
        .with_clock(clock.clone())
        .build()
        .expect("build pipette");
    let out = SharedBuf::new();
    let cfg = DispatcherCfg {
        payload_poll: Duration::from_millis(1),
        sensor_test_cycles: 3,
        sensor_test_period: Duration::from_millis(10),
        ring_test_step: Duration::ZERO,
    };
    let d = Dispatcher::new(
        Cursor::new(input.as_bytes().to_vec()),
        out.clone(),
        pipette,
        devices,
        cfg,
        clock,
    );
    (d, out)
}

/// Serve the whole script and return the emitted lines.
fn serve(input: &str) -> Vec<String> {
    serve_with(input, mock_peripherals())
}

fn serve_with(input: &str, devices: Peripherals) -> Vec<String> {
    let (mut d, out) = dispatcher_with(input, devices);
    d.run(&AtomicBool::new(false)).expect("serve");
    out.lines()
}

#[test]
fn scenario_home_then_status() {
    let lines = serve("9\n13\n");
    assert_eq!(
        lines,
        [
            "Homing pipette...",
            "OK:109",
            "STATUS:1,0.50,0.00",
            "OK:113"
        ]
    );
}

#[test]
fn scenario_move_then_status() {
    let lines = serve("9\n10\n5.0\n13\n");
    assert_eq!(lines[1], "OK:109");
    assert_eq!(lines[2], "OK:110");
    assert_eq!(lines[3], "STATUS:1,5.00,0.00");
    assert_eq!(lines[4], "OK:113");
}

#[test]
fn scenario_aspirate_accumulates_volume() {
    let lines = serve("9\n10\n5.0\n11\n20.0\n13\n");
    assert_eq!(lines[2], "OK:110");
    assert_eq!(lines[3], "OK:111");
    assert_eq!(lines[4], "STATUS:1,7.00,20.00");
    assert_eq!(lines[5], "OK:113");
}

#[test]
fn scenario_overdraw_dispense_is_rejected_and_state_kept() {
    let lines = serve("9\n10\n5.0\n11\n20.0\n12\n50.0\n13\n");
    assert_eq!(lines[3], "OK:111");
    assert_eq!(lines[4], "ERROR: not enough volume in pipette");
    assert_eq!(lines[5], "ERR:112");
    assert_eq!(lines[6], "STATUS:1,7.00,20.00");
}

#[test]
fn scenario_move_before_homing_is_rejected() {
    let lines = serve("10\n1.0\n13\n");
    assert_eq!(lines[0], "ERROR: pipette not homed");
    assert_eq!(lines[1], "ERR:110");
    assert_eq!(lines[2], "STATUS:0,0.00,0.00");
}

#[test]
fn unknown_codes_get_the_sentinel_and_nothing_else() {
    let lines = serve("42\n0\nfoo\n-7\n99\n");
    assert_eq!(lines, ["-1", "-1", "-1", "-1", "999"]);
}

#[test]
fn unknown_code_does_not_touch_the_pipette() {
    let (mut d, _out) = dispatcher_with("42\n", mock_peripherals());
    assert_eq!(d.service().expect("service"), ServiceOutcome::Handled);
    let s = d.pipette().status();
    assert!(!s.homed);
    assert_eq!(s.position_mm, 0.0);
    assert_eq!(s.volume_ul, 0.0);
}

#[test]
fn connectivity_check_answers_bare_999() {
    assert_eq!(serve("99\n"), ["999"]);
}

#[test]
fn move_out_of_bounds_reports_err_with_diagnostic() {
    let lines = serve("9\n10\n250.0\n");
    assert_eq!(lines[1], "OK:109");
    assert!(lines[2].starts_with("ERROR: position 250.00 mm out of bounds"));
    assert_eq!(lines[3], "ERR:110");
}

#[test]
fn malformed_payload_fails_without_desync() {
    let lines = serve("9\n10\nabc\n13\n");
    assert_eq!(lines[1], "OK:109");
    assert!(lines[2].starts_with("ERROR: payload is not a number"));
    assert_eq!(lines[3], "ERR:110");
    // The next command still parses cleanly.
    assert_eq!(lines[4], "STATUS:1,0.50,0.00");
}

#[test]
fn trailing_garbage_on_a_line_is_discarded() {
    let lines = serve("9\n10 5.0 garbage\n13\n");
    assert_eq!(lines[2], "OK:110");
    assert_eq!(lines[3], "STATUS:1,5.00,0.00");
}

#[test]
fn eof_mid_payload_disconnects_without_a_response() {
    let (mut d, out) = dispatcher_with("9\n10\n", mock_peripherals());
    d.run(&AtomicBool::new(false)).expect("serve");
    let lines = out.lines();
    assert_eq!(lines.last().map(String::as_str), Some("OK:109"));
}

#[test]
fn ring_commands_always_acknowledge() {
    assert_eq!(serve("1\n2\n"), ["OK:101", "OK:102"]);
}

#[test]
fn dot_commands_verify_read_back() {
    assert_eq!(serve("3\n4\n"), ["OK:103", "OK:104"]);

    // A dot that ignores writes must flip the response to a failure flag.
    let mut devices = mock_peripherals();
    devices.dot_a = Box::new(MockPixels::with_dead_pixel(1, 0));
    assert_eq!(serve_with("3\n", devices), ["ERR:103"]);
}

#[test]
fn magnet_commands_verify_the_pin() {
    assert_eq!(serve("5\n6\n"), ["OK:105", "OK:106"]);

    // Output stuck low: on fails verification, off still matches.
    let mut devices = mock_peripherals();
    devices.magnet = Box::new(MockPin::stuck_at(false));
    assert_eq!(serve_with("5\n6\n", devices), ["ERR:105", "OK:106"]);
}

#[test]
fn beam_read_reports_broken_or_clear() {
    let mut devices = mock_peripherals();
    devices.beam = Box::new(SeqInput::new([true, false]));
    assert_eq!(serve_with("7\n7\n", devices), ["107", "108"]);
}

#[test]
fn beam_test_prints_cycles_and_transition_codes() {
    let mut devices = mock_peripherals();
    // Three test cycles observe clear -> broken -> broken; only the one
    // state change produces a bare transition code.
    devices.beam = Box::new(SeqInput::new([false, true, true]));
    let (mut d, out) = dispatcher_with("8\n", devices);
    d.run(&AtomicBool::new(false)).expect("serve");
    assert_eq!(out.lines(), ["beam clear", "beam broken", "107", "beam broken"]);
}

#[test]
fn payload_may_arrive_in_a_later_chunk() {
    // Two-message exchange over a channel transport: the code and its
    // payload land in separate chunks, with idle WouldBlock polls between.
    let (tx, link) = rig_core::mocks::channel_link();
    let clock: Arc<SimClock> = Arc::new(SimClock::new());
    let actuator = MockActuator::new();
    let endstop = MockEndstop::new(actuator.physical_position(), TRIP_AT);
    let pipette = Pipette::builder()
        .with_actuator(actuator)
        .with_endstop(endstop)
        .with_motion(MotionCfg::default())
        .with_clock(clock.clone())
        .build()
        .expect("build pipette");
    let out = SharedBuf::new();
    let cfg = DispatcherCfg {
        payload_poll: Duration::from_millis(1),
        ring_test_step: Duration::ZERO,
        ..DispatcherCfg::default()
    };
    let mut d = Dispatcher::new(link, out.clone(), pipette, mock_peripherals(), cfg, clock);

    tx.send(b"9\n".to_vec()).expect("send");
    tx.send(b"10\n".to_vec()).expect("send");
    tx.send(b"5.0\n".to_vec()).expect("send");
    drop(tx);
    d.run(&AtomicBool::new(false)).expect("serve");

    let lines = out.lines();
    assert_eq!(lines[1], "OK:109");
    assert_eq!(lines[2], "OK:110");
}

#[test]
fn boot_prints_readiness_and_ring_test() {
    let (mut d, out) = dispatcher_with("", mock_peripherals());
    d.boot().expect("boot");
    assert_eq!(out.lines(), ["OK", "Ring Test Complete"]);
}

#[test]
fn responses_come_back_in_command_order() {
    let lines = serve("99\n1\n99\n2\n");
    assert_eq!(lines, ["999", "OK:101", "999", "OK:102"]);
}
