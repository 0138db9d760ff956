//! Device implementations for the rig's capability traits.
//!
//! The simulated backend is always available and is what `serve --sim` and
//! the integration tests run against. Raspberry Pi GPIO implementations
//! live behind the `hardware` feature.

pub mod error;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use rig_traits::{Actuator, DigitalInput, OutputPin, PixelStrip, Rgb};
use std::cell::Cell;
use std::rc::Rc;

/// Simulated linear actuator. Physical position is shared through an
/// `Rc<Cell>` so a [`SimulatedEndstop`] can trip when the carriage crosses
/// the switch location, which makes homing behave end to end in sim runs.
pub struct SimulatedActuator {
    physical: Rc<Cell<i64>>,
    /// Physical step count that maps to logical zero.
    origin: i64,
    /// Logical target commanded by the last move.
    target: i64,
    steps_per_poll: i64,
    max_speed: u32,
}

impl SimulatedActuator {
    pub fn new(steps_per_poll: i64) -> Self {
        SimulatedActuator {
            physical: Rc::new(Cell::new(0)),
            origin: 0,
            target: 0,
            steps_per_poll: steps_per_poll.max(1),
            max_speed: 0,
        }
    }

    /// Handle to the physical position, for wiring up a simulated endstop.
    pub fn physical_position(&self) -> Rc<Cell<i64>> {
        Rc::clone(&self.physical)
    }

    pub fn max_speed(&self) -> u32 {
        self.max_speed
    }
}

impl Actuator for SimulatedActuator {
    fn set_max_speed(
        &mut self,
        steps_per_sec: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.max_speed = steps_per_sec;
        Ok(())
    }
    fn move_to(&mut self, target: i64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = target;
        Ok(())
    }
    fn move_by(&mut self, delta: i64) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target += delta;
        Ok(())
    }
    fn poll(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let pos = self.physical.get() - self.origin;
        let remaining = self.target - pos;
        if remaining == 0 {
            return Ok(false);
        }
        let step = remaining.clamp(-self.steps_per_poll, self.steps_per_poll);
        self.physical.set(self.physical.get() + step);
        tracing::trace!(pos = pos + step, target = self.target, "sim actuator step");
        Ok(remaining != step)
    }
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.target = self.physical.get() - self.origin;
        Ok(())
    }
    fn set_zero(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.origin = self.physical.get();
        self.target = 0;
        Ok(())
    }
    fn position(&self) -> i64 {
        self.physical.get() - self.origin
    }
}

/// Simulated homing switch: trips while the shared physical position is at
/// or past the switch location.
pub struct SimulatedEndstop {
    physical: Rc<Cell<i64>>,
    trip_at: i64,
}

impl SimulatedEndstop {
    pub fn new(physical: Rc<Cell<i64>>, trip_at: i64) -> Self {
        SimulatedEndstop { physical, trip_at }
    }
}

impl DigitalInput for SimulatedEndstop {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.physical.get() >= self.trip_at)
    }
}

/// Simulated beam-break sensor with an externally togglable state.
pub struct SimulatedBeam {
    broken: Rc<Cell<bool>>,
}

impl SimulatedBeam {
    pub fn new(initially_broken: bool) -> Self {
        SimulatedBeam {
            broken: Rc::new(Cell::new(initially_broken)),
        }
    }

    pub fn handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.broken)
    }
}

impl DigitalInput for SimulatedBeam {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.broken.get())
    }
}

/// Simulated digital output; read-back reports the last write.
pub struct SimulatedPin {
    level: Rc<Cell<bool>>,
}

impl SimulatedPin {
    pub fn new() -> Self {
        SimulatedPin {
            level: Rc::new(Cell::new(false)),
        }
    }

    pub fn handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.level)
    }
}

impl Default for SimulatedPin {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPin for SimulatedPin {
    fn set(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.level.set(on);
        Ok(())
    }
    fn read_back(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.level.get())
    }
}

/// In-memory pixel buffer. Also used by hardware builds: the physical pixel
/// driver is an external collaborator, so the firmware only tracks the
/// commanded frame and verifies against it.
pub struct SimulatedPixels {
    px: Vec<Rgb>,
}

impl SimulatedPixels {
    pub fn new(len: usize) -> Self {
        SimulatedPixels {
            px: vec![Rgb::OFF; len],
        }
    }
}

impl PixelStrip for SimulatedPixels {
    fn len(&self) -> usize {
        self.px.len()
    }
    fn set_pixel(
        &mut self,
        index: usize,
        color: Rgb,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(p) = self.px.get_mut(index) {
            *p = color;
        }
        Ok(())
    }
    fn fill(&mut self, color: Rgb) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.px.fill(color);
        Ok(())
    }
    fn clear(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.px.fill(Rgb::OFF);
        Ok(())
    }
    fn pixel(&self, index: usize) -> Rgb {
        self.px.get(index).copied().unwrap_or(Rgb::OFF)
    }
}
