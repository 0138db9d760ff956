//! Device assembly and the serve loop.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;

use rig_config::Config;
use rig_core::dispatcher::{Dispatcher, DispatcherCfg};
use rig_core::peripherals::Peripherals;
use rig_core::pipette::{MotionCfg, Pipette};
use rig_hardware::{SimulatedActuator, SimulatedBeam, SimulatedEndstop, SimulatedPin, SimulatedPixels};
use rig_traits::{Clock, MonotonicClock};

/// Steps the simulated carriage covers per settle poll (1 mm at the default
/// steps-per-mm).
const SIM_STEPS_PER_POLL: i64 = 200;
/// Simulated endstop location in physical steps from the power-on position.
const SIM_ENDSTOP_AT: i64 = 500;

pub fn serve(
    cfg: &Config,
    device: Option<&Path>,
    sim: bool,
    no_boot: bool,
    rt: bool,
) -> eyre::Result<()> {
    setup_rt(rt);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("install signal handler")?;
    }

    match device {
        None => {
            tracing::info!(backend = backend_name(sim), "serving on stdio");
            run_loop(cfg, std::io::stdin(), std::io::stdout(), sim, no_boot, &shutdown)
        }
        Some(path) => {
            tracing::info!(
                device = %path.display(),
                baud = cfg.serial.baud,
                backend = backend_name(sim),
                "serving on device"
            );
            let (input, output) = open_device(cfg, path)?;
            run_loop(cfg, input, output, sim, no_boot, &shutdown)
        }
    }
}

/// Boot sequence only: readiness line and ring self-test on stdout.
pub fn self_check(cfg: &Config, sim: bool) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut dispatcher = build_sim_dispatcher(
        cfg,
        std::io::empty(),
        std::io::stdout(),
        Arc::clone(&clock),
    )?;
    let _ = sim; // GPIO self-check uses the same commanded-frame path
    dispatcher.boot()?;
    tracing::info!("self-check complete");
    Ok(())
}

fn backend_name(sim: bool) -> &'static str {
    if sim || !cfg!(feature = "hardware") {
        "sim"
    } else {
        "gpio"
    }
}

fn setup_rt(requested: bool) {
    if !requested {
        return;
    }
    #[cfg(target_os = "linux")]
    crate::rt::setup_rt_once();
    #[cfg(not(target_os = "linux"))]
    tracing::warn!("--rt is only supported on Linux");
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
type DeviceLink = rig_hardware::gpio::UartLink;
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
type DeviceLink = std::fs::File;

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_device(cfg: &Config, path: &Path) -> eyre::Result<(DeviceLink, DeviceLink)> {
    let input = rig_hardware::gpio::UartLink::open(&path.display().to_string(), cfg.serial.baud)
        .wrap_err("open uart")?;
    let output = rig_hardware::gpio::UartLink::open(&path.display().to_string(), cfg.serial.baud)
        .wrap_err("open uart")?;
    Ok((input, output))
}

/// Without the hardware feature the device node is opened as a plain file
/// pair; line discipline and baud are whatever the OS already applied.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_device(_cfg: &Config, path: &Path) -> eyre::Result<(DeviceLink, DeviceLink)> {
    let input = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .wrap_err_with(|| format!("open device {}", path.display()))?;
    let output = input
        .try_clone()
        .wrap_err("clone device handle")?;
    Ok((input, output))
}

fn run_loop<R: Read, W: Write>(
    cfg: &Config,
    input: R,
    output: W,
    sim: bool,
    no_boot: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    if sim || !cfg!(feature = "hardware") {
        let mut dispatcher = build_sim_dispatcher(cfg, input, output, clock)?;
        if !no_boot {
            dispatcher.boot()?;
        }
        dispatcher.run(shutdown)?;
    } else {
        #[cfg(all(feature = "hardware", target_os = "linux"))]
        {
            let mut dispatcher = build_gpio_dispatcher(cfg, input, output, clock)?;
            if !no_boot {
                dispatcher.boot()?;
            }
            dispatcher.run(shutdown)?;
        }
    }
    tracing::info!("serve loop ended");
    Ok(())
}

fn build_sim_dispatcher<R: Read, W: Write>(
    cfg: &Config,
    input: R,
    output: W,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<Dispatcher<R, W, SimulatedActuator, SimulatedEndstop>> {
    let actuator = SimulatedActuator::new(SIM_STEPS_PER_POLL);
    let endstop = SimulatedEndstop::new(actuator.physical_position(), SIM_ENDSTOP_AT);
    let pipette = Pipette::builder()
        .with_actuator(actuator)
        .with_endstop(endstop)
        .with_motion(MotionCfg::from(&cfg.motion))
        .with_clock(Arc::clone(&clock))
        .build()?;
    let devices = Peripherals {
        ring: Box::new(SimulatedPixels::new(cfg.illumination.ring_pixels)),
        dot_a: Box::new(SimulatedPixels::new(1)),
        dot_b: Box::new(SimulatedPixels::new(1)),
        magnet: Box::new(SimulatedPin::new()),
        beam: Box::new(SimulatedBeam::new(false)),
        beam_led: Box::new(SimulatedPin::new()),
    };
    Ok(Dispatcher::new(
        input,
        output,
        pipette,
        devices,
        DispatcherCfg::from(cfg),
        clock,
    ))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn build_gpio_dispatcher<R: Read, W: Write>(
    cfg: &Config,
    input: R,
    output: W,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<
    Dispatcher<R, W, rig_hardware::gpio::StepDirActuator, rig_hardware::gpio::GpioInput>,
> {
    use std::time::Duration;

    use rig_hardware::gpio::{GpioInput, GpioOutput, StepDirActuator};

    let pins = &cfg.pins;
    let debounce = Duration::from_millis(cfg.sensor.debounce_ms);

    let actuator =
        StepDirActuator::new(pins.pipette_step, pins.pipette_dir).wrap_err("open stepper pins")?;
    let endstop =
        GpioInput::new(pins.pipette_limit, true, debounce).wrap_err("open limit switch")?;
    let pipette = Pipette::builder()
        .with_actuator(actuator)
        .with_endstop(endstop)
        .with_motion(MotionCfg::from(&cfg.motion))
        .with_clock(Arc::clone(&clock))
        .build()?;

    // The pixel driver itself is an external collaborator; the firmware
    // tracks the commanded frame and verifies against it.
    let devices = Peripherals {
        ring: Box::new(SimulatedPixels::new(cfg.illumination.ring_pixels)),
        dot_a: Box::new(SimulatedPixels::new(1)),
        dot_b: Box::new(SimulatedPixels::new(1)),
        magnet: Box::new(GpioOutput::new(pins.magnet).wrap_err("open magnet pin")?),
        beam: Box::new(GpioInput::new(pins.beam_sensor, true, Duration::ZERO).wrap_err("open beam sensor")?),
        beam_led: Box::new(GpioOutput::new(pins.beam_led).wrap_err("open beam led")?),
    };
    Ok(Dispatcher::new(
        input,
        output,
        pipette,
        devices,
        DispatcherCfg::from(cfg),
        clock,
    ))
}
