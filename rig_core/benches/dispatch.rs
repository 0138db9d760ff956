use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use rig_core::dispatcher::{Dispatcher, DispatcherCfg};
use rig_core::mocks::{MockActuator, MockEndstop, SharedBuf, SimClock, mock_peripherals};
use rig_core::pipette::{MotionCfg, Pipette};

type BenchDispatcher = Dispatcher<Cursor<Vec<u8>>, SharedBuf, MockActuator, MockEndstop>;

fn make_dispatcher(script: &str) -> BenchDispatcher {
    let clock: Arc<SimClock> = Arc::new(SimClock::new());
    let actuator = MockActuator::new();
    let endstop = MockEndstop::new(actuator.physical_position(), 600);
    let pipette = Pipette::builder()
        .with_actuator(actuator)
        .with_endstop(endstop)
        .with_motion(MotionCfg::default())
        .with_clock(clock.clone())
        .build()
        .expect("build pipette");
    let cfg = DispatcherCfg {
        payload_poll: Duration::from_millis(1),
        ring_test_step: Duration::ZERO,
        ..DispatcherCfg::default()
    };
    Dispatcher::new(
        Cursor::new(script.as_bytes().to_vec()),
        SharedBuf::new(),
        pipette,
        mock_peripherals(),
        cfg,
        clock,
    )
}

fn bench_dispatch(c: &mut Criterion) {
    c.bench_function("dispatch_hello", |b| {
        b.iter_batched(
            || make_dispatcher("99\n"),
            |mut d| d.service().expect("service"),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("dispatch_unknown_code", |b| {
        b.iter_batched(
            || make_dispatcher("424242\n"),
            |mut d| d.service().expect("service"),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("home_move_aspirate_script", |b| {
        b.iter_batched(
            || make_dispatcher("9\n10\n5.0\n11\n20.0\n13\n"),
            |mut d| d.run(&AtomicBool::new(false)).expect("serve"),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
