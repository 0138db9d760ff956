#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the sample-handling rig firmware.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Defaults reproduce the rig's wiring and motion constants, so an empty
//!   file is a usable bench configuration.
use serde::Deserialize;

/// Serial transport settings. The baud rate applies when serving a real
/// device node; stdio transports ignore it.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SerialCfg {
    pub baud: u32,
    /// Sleep between polls while waiting for a payload token (ms).
    /// There is deliberately no timeout on this wait; an absent host
    /// payload stalls the loop until more bytes arrive.
    pub poll_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud: 115_200,
            poll_ms: 10,
        }
    }
}

/// BCM pin assignments for hardware builds; unused by the simulated backend
/// but always parsed so one file serves both.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    pub ring: u8,
    pub dot_a: u8,
    pub dot_b: u8,
    pub magnet: u8,
    pub beam_sensor: u8,
    pub beam_led: u8,
    pub pipette_step: u8,
    pub pipette_dir: u8,
    pub pipette_limit: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            ring: 2,
            dot_a: 6,
            dot_b: 6,
            magnet: 3,
            beam_sensor: 4,
            beam_led: 7,
            pipette_step: 9,
            pipette_dir: 8,
            pipette_limit: 10,
        }
    }
}

/// Pipette motion limits and homing parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Motion {
    /// Maximum plunger travel in mm.
    pub max_position_mm: f32,
    pub steps_per_mm: u32,
    /// Normal travel speed (steps per second).
    pub max_speed_sps: u32,
    /// Acceleration handed to the actuator driver (steps/s^2).
    pub accel_sps2: u32,
    /// Reduced speed for the first homing approach; the precision
    /// re-approach runs at half this.
    pub homing_speed_sps: u32,
    /// Distance to back off the endstop between the two approaches (mm).
    pub backoff_mm: f32,
    /// Offset moved to after homing so the plunger doesn't rest on the
    /// switch (mm).
    pub safe_start_mm: f32,
    /// Sleep between settlement polls while a move is in flight (us).
    pub settle_poll_us: u64,
    /// Bound on a single homing attempt. 0 disables the bound and
    /// homing waits on the switch indefinitely.
    pub homing_timeout_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            max_position_mm: 100.0,
            steps_per_mm: 200,
            max_speed_sps: 10_000,
            accel_sps2: 800,
            homing_speed_sps: 2_000,
            backoff_mm: 0.5,
            safe_start_mm: 0.5,
            settle_poll_us: 500,
            homing_timeout_ms: 0,
        }
    }
}

/// Ring and status-dot illumination parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Illumination {
    pub ring_pixels: usize,
    pub brightness: u8,
    /// Per-pixel dwell during the boot self-test (ms). Set 0 to make the
    /// self-test instantaneous on the bench.
    pub test_step_ms: u64,
}

impl Default for Illumination {
    fn default() -> Self {
        Self {
            ring_pixels: 24,
            brightness: 255,
            test_step_ms: 500,
        }
    }
}

/// Beam-break sensor parameters.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Sensor {
    /// Endstop debounce window (ms).
    pub debounce_ms: u64,
    /// Number of cycles in the interactive sensor test.
    pub test_cycles: u32,
    /// Delay between sensor-test readings (ms).
    pub test_period_ms: u64,
}

impl Default for Sensor {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            test_cycles: 10,
            test_period_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub pins: Pins,
    pub motion: Motion,
    pub illumination: Illumination,
    pub sensor: Sensor,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.poll_ms == 0 {
            eyre::bail!("serial.poll_ms must be >= 1");
        }

        // Motion
        if !self.motion.max_position_mm.is_finite() || self.motion.max_position_mm <= 0.0 {
            eyre::bail!("motion.max_position_mm must be a positive finite number");
        }
        if self.motion.steps_per_mm == 0 {
            eyre::bail!("motion.steps_per_mm must be > 0");
        }
        if self.motion.max_speed_sps == 0 || self.motion.homing_speed_sps == 0 {
            eyre::bail!("motion speeds must be > 0");
        }
        if self.motion.homing_speed_sps > self.motion.max_speed_sps {
            eyre::bail!("motion.homing_speed_sps must not exceed motion.max_speed_sps");
        }
        if self.motion.accel_sps2 == 0 {
            eyre::bail!("motion.accel_sps2 must be > 0");
        }
        if !self.motion.backoff_mm.is_finite() || self.motion.backoff_mm < 0.0 {
            eyre::bail!("motion.backoff_mm must be >= 0");
        }
        if !self.motion.safe_start_mm.is_finite()
            || self.motion.safe_start_mm < 0.0
            || self.motion.safe_start_mm > self.motion.max_position_mm
        {
            eyre::bail!("motion.safe_start_mm must be in [0, max_position_mm]");
        }
        if self.motion.settle_poll_us == 0 {
            eyre::bail!("motion.settle_poll_us must be >= 1");
        }

        // Illumination
        if self.illumination.ring_pixels == 0 {
            eyre::bail!("illumination.ring_pixels must be >= 1");
        }

        // Sensor
        if self.sensor.test_cycles == 0 {
            eyre::bail!("sensor.test_cycles must be >= 1");
        }
        if self.sensor.test_cycles > 1000 {
            eyre::bail!("sensor.test_cycles is unreasonably large (>1000)");
        }

        Ok(())
    }
}
