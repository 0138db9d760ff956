//! Pipette motion state machine: homing, bounded moves, and volume
//! bookkeeping.
//!
//! Every motion operation funnels through [`Pipette::move_to`] so the
//! bounds check and the actuator interaction live in one place, and
//! position/volume are only updated after the driver reports the move
//! settled. The driver is trusted to report settlement truthfully; no
//! independent position verification is performed.

use std::sync::Arc;
use std::time::Duration;

use rig_traits::{Actuator, Clock, DigitalInput, MonotonicClock};

use crate::error::{BuildError, Result, RigError};

/// Fixed linear plunger calibration: 1 mm of travel displaces 10 uL.
pub const UL_PER_MM: f32 = 10.0;

/// Steps commanded per iteration of the first homing approach.
const COARSE_SEEK_STEPS: i64 = 100;
/// Steps commanded per iteration of the precision re-approach.
const FINE_SEEK_STEPS: i64 = 10;
/// Sleep between endstop polls while seeking.
const SEEK_POLL: Duration = Duration::from_millis(1);

/// Motion limits and homing parameters. Mirrors `[motion]` in the config
/// file; fixed for the life of the process.
#[derive(Debug, Clone, Copy)]
pub struct MotionCfg {
    pub max_position_mm: f32,
    pub steps_per_mm: u32,
    pub max_speed_sps: u32,
    pub homing_speed_sps: u32,
    pub backoff_mm: f32,
    pub safe_start_mm: f32,
    pub settle_poll: Duration,
    /// 0 disables the bound; homing then waits on the switch
    /// indefinitely.
    pub homing_timeout_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            max_position_mm: 100.0,
            steps_per_mm: 200,
            max_speed_sps: 10_000,
            homing_speed_sps: 2_000,
            backoff_mm: 0.5,
            safe_start_mm: 0.5,
            settle_poll: Duration::from_micros(500),
            homing_timeout_ms: 0,
        }
    }
}

impl From<&rig_config::Motion> for MotionCfg {
    fn from(m: &rig_config::Motion) -> Self {
        Self {
            max_position_mm: m.max_position_mm,
            steps_per_mm: m.steps_per_mm,
            max_speed_sps: m.max_speed_sps,
            homing_speed_sps: m.homing_speed_sps,
            backoff_mm: m.backoff_mm,
            safe_start_mm: m.safe_start_mm,
            settle_poll: Duration::from_micros(m.settle_poll_us),
            homing_timeout_ms: m.homing_timeout_ms,
        }
    }
}

/// Snapshot reported by the status command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipetteStatus {
    pub homed: bool,
    pub position_mm: f32,
    pub volume_ul: f32,
}

/// Type-state marker for a builder slot that has not been provided.
pub struct Missing;

pub struct Pipette<A, L> {
    actuator: A,
    endstop: L,
    cfg: MotionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    homed: bool,
    position_mm: f32,
    volume_ul: f32,
}

impl Pipette<Missing, Missing> {
    pub fn builder() -> PipetteBuilder<Missing, Missing> {
        PipetteBuilder::default()
    }
}

impl<A, L> core::fmt::Debug for Pipette<A, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipette")
            .field("homed", &self.homed)
            .field("position_mm", &self.position_mm)
            .field("volume_ul", &self.volume_ul)
            .finish()
    }
}

impl<A: Actuator, L: DigitalInput> Pipette<A, L> {
    /// One background pass: refresh the debounced endstop and advance any
    /// in-flight motion. Called every control-loop iteration.
    pub fn service(&mut self) -> Result<()> {
        self.read_endstop()?;
        self.actuator
            .poll()
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
        Ok(())
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    pub fn position_mm(&self) -> f32 {
        self.position_mm
    }

    pub fn volume_ul(&self) -> f32 {
        self.volume_ul
    }

    pub fn status(&self) -> PipetteStatus {
        PipetteStatus {
            homed: self.homed,
            position_mm: self.position_mm,
            volume_ul: self.volume_ul,
        }
    }

    /// Establish the zero reference: creep onto the endstop at homing
    /// speed, back off, re-approach at half speed for a precise second
    /// trigger, zero the actuator there, then move to the safe start
    /// offset. Clears held volume and marks the pipette homed.
    pub fn home(&mut self) -> Result<()> {
        let deadline = (self.cfg.homing_timeout_ms > 0)
            .then(|| self.clock.now() + Duration::from_millis(self.cfg.homing_timeout_ms));

        self.set_speed(self.cfg.homing_speed_sps)?;
        self.seek_endstop(COARSE_SEEK_STEPS, deadline)?;
        self.actuator
            .stop()
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;

        // Back off, then find the switch again at lower speed for precision.
        let backoff_steps = self.mm_to_steps(self.cfg.backoff_mm);
        self.actuator
            .move_by(-backoff_steps)
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
        self.wait_settled()?;

        self.set_speed(self.cfg.homing_speed_sps / 2)?;
        self.seek_endstop(FINE_SEEK_STEPS, deadline)?;

        self.actuator
            .set_zero()
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
        self.position_mm = 0.0;
        self.volume_ul = 0.0;
        self.homed = true;
        tracing::info!("pipette homed");

        self.set_speed(self.cfg.max_speed_sps)?;
        // Park just off the switch so the plunger doesn't rest on it.
        self.move_to(self.cfg.safe_start_mm)
    }

    /// Move to an absolute plunger position, blocking until the actuator
    /// settles. Fails without motion when unhomed or out of bounds.
    pub fn move_to(&mut self, target_mm: f32) -> Result<()> {
        if !self.homed {
            return Err(eyre::Report::new(RigError::NotHomed));
        }
        if !target_mm.is_finite()
            || target_mm < 0.0
            || target_mm > self.cfg.max_position_mm
        {
            return Err(eyre::Report::new(RigError::OutOfBounds {
                target_mm,
                max_mm: self.cfg.max_position_mm,
            }));
        }

        let target_steps = self.mm_to_steps(target_mm);
        self.actuator
            .move_to(target_steps)
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
        self.wait_settled()?;
        self.position_mm = target_mm;
        tracing::debug!(target_mm, "pipette moved");
        Ok(())
    }

    /// Draw liquid by moving the plunger up; the held volume only grows
    /// after the motion settles.
    pub fn aspirate(&mut self, volume_ul: f32) -> Result<()> {
        if !self.homed {
            return Err(eyre::Report::new(RigError::NotHomed));
        }
        if !volume_ul.is_finite() || volume_ul < 0.0 {
            return Err(eyre::Report::new(RigError::InvalidVolume));
        }
        let target_mm = self.position_mm + volume_ul / UL_PER_MM;
        if target_mm > self.cfg.max_position_mm {
            let free_ul = (self.cfg.max_position_mm - self.position_mm) * UL_PER_MM;
            return Err(eyre::Report::new(RigError::CapacityExceeded {
                requested_ul: volume_ul,
                free_ul,
            }));
        }
        self.move_to(target_mm)?;
        self.volume_ul += volume_ul;
        tracing::debug!(volume_ul, held_ul = self.volume_ul, "aspirated");
        Ok(())
    }

    /// Expel liquid by moving the plunger down; fails when more volume is
    /// requested than is held.
    pub fn dispense(&mut self, volume_ul: f32) -> Result<()> {
        if !self.homed {
            return Err(eyre::Report::new(RigError::NotHomed));
        }
        if !volume_ul.is_finite() || volume_ul < 0.0 {
            return Err(eyre::Report::new(RigError::InvalidVolume));
        }
        if volume_ul > self.volume_ul {
            return Err(eyre::Report::new(RigError::InsufficientVolume {
                requested_ul: volume_ul,
                held_ul: self.volume_ul,
            }));
        }
        let target_mm = self.position_mm - volume_ul / UL_PER_MM;
        if target_mm < 0.0 {
            return Err(eyre::Report::new(RigError::BelowZero));
        }
        self.move_to(target_mm)?;
        self.volume_ul -= volume_ul;
        tracing::debug!(volume_ul, held_ul = self.volume_ul, "dispensed");
        Ok(())
    }

    fn mm_to_steps(&self, mm: f32) -> i64 {
        (mm * self.cfg.steps_per_mm as f32).round() as i64
    }

    fn set_speed(&mut self, sps: u32) -> Result<()> {
        self.actuator
            .set_max_speed(sps.max(1))
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))
    }

    fn read_endstop(&mut self) -> Result<bool> {
        self.endstop
            .read()
            .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))
    }

    /// Creep toward the switch in small relative moves until it triggers.
    /// Without a deadline the wait is unbounded; the switch is assumed to
    /// sit in the travel path.
    fn seek_endstop(&mut self, chunk: i64, deadline: Option<std::time::Instant>) -> Result<()> {
        while !self.read_endstop()? {
            if let Some(d) = deadline
                && self.clock.now() >= d
            {
                return Err(eyre::Report::new(RigError::HomingTimeout(
                    self.cfg.homing_timeout_ms,
                )));
            }
            self.actuator
                .move_by(chunk)
                .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
            self.actuator
                .poll()
                .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
            self.clock.sleep(SEEK_POLL);
        }
        Ok(())
    }

    /// Block until the actuator reports no motion remaining. No timeout:
    /// a stalled driver stalls the loop, an accepted risk in the rig's
    /// controlled environment.
    fn wait_settled(&mut self) -> Result<()> {
        loop {
            let moving = self
                .actuator
                .poll()
                .map_err(|e| eyre::Report::new(RigError::Hardware(e.to_string())))?;
            if !moving {
                return Ok(());
            }
            self.clock.sleep(self.cfg.settle_poll);
        }
    }
}

pub struct PipetteBuilder<A, L> {
    actuator: A,
    endstop: L,
    cfg: Option<MotionCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for PipetteBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            actuator: Missing,
            endstop: Missing,
            cfg: None,
            clock: None,
        }
    }
}

impl<A, L> PipetteBuilder<A, L> {
    pub fn with_motion(mut self, cfg: MotionCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Provide a custom clock; defaults to the monotonic clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_actuator<A2: Actuator>(self, actuator: A2) -> PipetteBuilder<A2, L> {
        PipetteBuilder {
            actuator,
            endstop: self.endstop,
            cfg: self.cfg,
            clock: self.clock,
        }
    }

    pub fn with_endstop<L2: DigitalInput>(self, endstop: L2) -> PipetteBuilder<A, L2> {
        PipetteBuilder {
            actuator: self.actuator,
            endstop,
            cfg: self.cfg,
            clock: self.clock,
        }
    }
}

impl<A: Actuator, L: DigitalInput> PipetteBuilder<A, L> {
    /// Validate the motion parameters and build. Only available once both
    /// the actuator and the endstop are provided.
    pub fn build(self) -> Result<Pipette<A, L>> {
        let cfg = self.cfg.unwrap_or_default();
        if !cfg.max_position_mm.is_finite() || cfg.max_position_mm <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_position_mm must be positive",
            )));
        }
        if cfg.steps_per_mm == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "steps_per_mm must be > 0",
            )));
        }
        if cfg.max_speed_sps == 0 || cfg.homing_speed_sps == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "motion speeds must be > 0",
            )));
        }
        if !(0.0..=cfg.max_position_mm).contains(&cfg.safe_start_mm) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "safe_start_mm must be in [0, max_position_mm]",
            )));
        }
        if !cfg.backoff_mm.is_finite() || cfg.backoff_mm < 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "backoff_mm must be >= 0",
            )));
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(Pipette {
            actuator: self.actuator,
            endstop: self.endstop,
            cfg,
            clock,
            homed: false,
            position_mm: 0.0,
            volume_ul: 0.0,
        })
    }
}
