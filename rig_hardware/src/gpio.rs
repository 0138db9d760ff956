//! Raspberry Pi backends for the rig's capability traits, via rppal.
//!
//! The step generator here is deliberately minimal: a constant-rate pulse
//! train toward the target, with the acceleration profile left to the
//! external driver board. Poll bursts are kept short so the control loop
//! stays responsive between chunks of motion.

use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, InputPin, Level, OutputPin as RppalOutput};
use rppal::uart::{Parity, Uart};

use crate::error::{HwError, Result};
use crate::util::Debouncer;
use rig_traits::{Actuator, DigitalInput, OutputPin};

/// Steps emitted per `poll` call before yielding back to the loop.
const POLL_BURST_STEPS: i64 = 64;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub struct GpioOutput {
    pin: RppalOutput,
}

impl GpioOutput {
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let pin = Gpio::new()
            .map_err(gpio_err)?
            .get(bcm_pin)
            .map_err(gpio_err)?
            .into_output_low();
        Ok(Self { pin })
    }
}

impl OutputPin for GpioOutput {
    fn set(&mut self, on: bool) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
    fn read_back(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.pin.is_set_high())
    }
}

/// Pulled-up digital input with software debounce. `active_low` matches the
/// rig's wiring: both the endstop and the beam sensor read low when active.
pub struct GpioInput {
    pin: InputPin,
    active_low: bool,
    debounce: Debouncer,
}

impl GpioInput {
    pub fn new(bcm_pin: u8, active_low: bool, debounce_window: Duration) -> Result<Self> {
        let pin = Gpio::new()
            .map_err(gpio_err)?
            .get(bcm_pin)
            .map_err(gpio_err)?
            .into_input_pullup();
        let initial = match pin.read() {
            Level::Low => active_low,
            Level::High => !active_low,
        };
        Ok(Self {
            pin,
            active_low,
            debounce: Debouncer::new(debounce_window, initial),
        })
    }
}

impl DigitalInput for GpioInput {
    fn read(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let raw = match self.pin.read() {
            Level::Low => self.active_low,
            Level::High => !self.active_low,
        };
        Ok(self.debounce.update(raw, Instant::now()))
    }
}

/// STEP/DIR pulse generator.
pub struct StepDirActuator {
    step: RppalOutput,
    dir: RppalOutput,
    position: i64,
    target: i64,
    max_speed: u32,
}

impl StepDirActuator {
    pub fn new(step_pin: u8, dir_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let step = gpio.get(step_pin).map_err(gpio_err)?.into_output_low();
        let dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output_low();
        Ok(Self {
            step,
            dir,
            position: 0,
            target: 0,
            max_speed: 1,
        })
    }

    fn pulse(&mut self, half_period: Duration) {
        self.step.set_high();
        std::thread::sleep(half_period);
        self.step.set_low();
        std::thread::sleep(half_period);
    }
}

impl Actuator for StepDirActuator {
    fn set_max_speed(
        &mut self,
        steps_per_sec: u32,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.max_speed = steps_per_sec.max(1);
        Ok(())
    }
    fn move_to(&mut self, target: i64) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = target;
        Ok(())
    }
    fn move_by(&mut self, delta: i64) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target += delta;
        Ok(())
    }
    fn poll(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut remaining = self.target - self.position;
        if remaining == 0 {
            return Ok(false);
        }
        let forward = remaining > 0;
        if forward {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        let half_period =
            Duration::from_micros((1_000_000 / u64::from(self.max_speed) / 2).max(1));
        let burst = remaining.abs().min(POLL_BURST_STEPS);
        for _ in 0..burst {
            self.pulse(half_period);
            self.position += if forward { 1 } else { -1 };
        }
        remaining = self.target - self.position;
        tracing::trace!(position = self.position, target = self.target, "step burst");
        Ok(remaining != 0)
    }
    fn stop(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = self.position;
        self.step.set_low();
        Ok(())
    }
    fn set_zero(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.position = 0;
        self.target = 0;
        Ok(())
    }
    fn position(&self) -> i64 {
        self.position
    }
}

/// Blocking `Read`/`Write` adapter over the Pi's UART for serving the
/// protocol on a real serial link.
pub struct UartLink {
    uart: Uart,
}

impl UartLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let mut uart = Uart::with_path(path, baud, Parity::None, 8, 1)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        // Block until at least one byte is available; the token layer
        // handles framing.
        uart.set_read_mode(1, Duration::ZERO)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        Ok(Self { uart })
    }
}

impl std::io::Read for UartLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.uart
            .read(buf)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

impl std::io::Write for UartLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.uart
            .write(buf)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.uart
            .drain()
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}
