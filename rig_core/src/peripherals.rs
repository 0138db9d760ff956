//! Stateless peripheral handlers: illumination, status dots, electromagnet,
//! and the beam-break sensor.
//!
//! The verified operations follow a write-then-read-back contract: after a
//! hardware write, the driver-visible state is compared to the intended
//! value and the command only reports success on a match. This is a cheap
//! closed-loop check against stuck or floating outputs, not a diagnostic.

use std::time::Duration;

use rig_traits::{Clock, DigitalInput, OutputPin, PixelStrip, Rgb};

use crate::error::{Result, RigError};

/// Ring pixels painted blue as visual feedback while the dots are lit.
const RING_FEEDBACK_PIXELS: [usize; 2] = [6, 18];

/// The rig's non-motion devices, owned by the control loop and handed to
/// handlers by reference.
pub struct Peripherals {
    pub ring: Box<dyn PixelStrip>,
    pub dot_a: Box<dyn PixelStrip>,
    pub dot_b: Box<dyn PixelStrip>,
    pub magnet: Box<dyn OutputPin>,
    pub beam: Box<dyn DigitalInput>,
    pub beam_led: Box<dyn OutputPin>,
}

fn dev_err(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(RigError::Hardware(e.to_string()))
}

impl Peripherals {
    pub fn ring_on(&mut self) -> Result<()> {
        self.ring.fill(Rgb::WHITE).map_err(dev_err)
    }

    pub fn ring_off(&mut self) -> Result<()> {
        self.ring.clear().map_err(dev_err)
    }

    /// Light both status dots red (plus ring feedback pixels) and verify
    /// the dots read back red.
    pub fn dots_on(&mut self) -> Result<bool> {
        self.dot_a.set_pixel(0, Rgb::RED).map_err(dev_err)?;
        self.dot_b.set_pixel(0, Rgb::RED).map_err(dev_err)?;
        for idx in RING_FEEDBACK_PIXELS {
            if idx < self.ring.len() {
                self.ring.set_pixel(idx, Rgb::BLUE).map_err(dev_err)?;
            }
        }
        let ok = self.dot_a.pixel(0) == Rgb::RED && self.dot_b.pixel(0) == Rgb::RED;
        if !ok {
            tracing::warn!("dot read-back does not match commanded red");
        }
        Ok(ok)
    }

    /// Clear both dots (and the feedback ring) and verify they read back
    /// dark.
    pub fn dots_off(&mut self) -> Result<bool> {
        self.dot_a.clear().map_err(dev_err)?;
        self.dot_b.clear().map_err(dev_err)?;
        self.ring.clear().map_err(dev_err)?;
        let ok = self.dot_a.pixel(0).is_off() && self.dot_b.pixel(0).is_off();
        if !ok {
            tracing::warn!("dot read-back does not match commanded off");
        }
        Ok(ok)
    }

    /// Drive the electromagnet and verify the pin reads back the intended
    /// level.
    pub fn set_magnet(&mut self, on: bool) -> Result<bool> {
        self.magnet.set(on).map_err(dev_err)?;
        let ok = self.magnet.read_back().map_err(dev_err)? == on;
        if !ok {
            tracing::warn!(intended = on, "magnet pin read-back mismatch");
        }
        Ok(ok)
    }

    /// One raw beam reading; true while the beam is interrupted.
    pub fn beam_broken(&mut self) -> Result<bool> {
        self.beam.read().map_err(dev_err)
    }

    pub fn set_beam_led(&mut self, on: bool) -> Result<()> {
        self.beam_led.set(on).map_err(dev_err)
    }

    /// Boot-time visual check: light each ring pixel blue in turn, then
    /// leave the ring dark.
    pub fn ring_self_test(&mut self, clock: &dyn Clock, step: Duration) -> Result<()> {
        for i in 0..self.ring.len() {
            self.ring.set_pixel(i, Rgb::BLUE).map_err(dev_err)?;
            clock.sleep(step);
            self.ring.set_pixel(i, Rgb::OFF).map_err(dev_err)?;
        }
        self.ring.clear().map_err(dev_err)
    }
}
