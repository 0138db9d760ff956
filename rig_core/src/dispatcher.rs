//! Command dispatch: one command per control-loop pass, strictly in
//! arrival order, with the response emitted before the next command is
//! read.
//!
//! Each service pass first refreshes the endstop and advances any in-flight
//! motion, then decodes at most one command. Motion commands block the loop
//! until the payload token arrives and the move settles, which keeps the
//! protocol single-outstanding-command.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rig_traits::{Actuator, Clock, DigitalInput};

use crate::error::{Result, RigError};
use crate::peripherals::Peripherals;
use crate::pipette::Pipette;
use crate::protocol::{Command, ResponseCode, SENTINEL_UNKNOWN};
use crate::wire::{ResponseWriter, TokenReader};

/// Loop-facing knobs; everything else about a command's behavior is fixed
/// by the protocol table.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherCfg {
    /// Sleep between polls while waiting for serial bytes.
    pub payload_poll: Duration,
    /// Cycle count for the interactive beam-sensor test.
    pub sensor_test_cycles: u32,
    /// Delay between beam-sensor test readings.
    pub sensor_test_period: Duration,
    /// Per-pixel dwell during the boot ring self-test.
    pub ring_test_step: Duration,
}

impl Default for DispatcherCfg {
    fn default() -> Self {
        Self {
            payload_poll: Duration::from_millis(10),
            sensor_test_cycles: 10,
            sensor_test_period: Duration::from_millis(100),
            ring_test_step: Duration::from_millis(500),
        }
    }
}

impl From<&rig_config::Config> for DispatcherCfg {
    fn from(cfg: &rig_config::Config) -> Self {
        Self {
            payload_poll: Duration::from_millis(cfg.serial.poll_ms),
            sensor_test_cycles: cfg.sensor.test_cycles,
            sensor_test_period: Duration::from_millis(cfg.sensor.test_period_ms),
            ring_test_step: Duration::from_millis(cfg.illumination.test_step_ms),
        }
    }
}

/// Result of one service pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// A command (or the unknown-code sentinel) was handled.
    Handled,
    /// The transport reached end of input; the serve loop should stop.
    Disconnected,
}

enum Payload {
    Value(f32),
    Malformed(String),
}

pub struct Dispatcher<R, W, A, L> {
    tokens: TokenReader<R>,
    out: ResponseWriter<W>,
    pipette: Pipette<A, L>,
    devices: Peripherals,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: DispatcherCfg,
    /// Last reported beam state, for transition lines in the sensor test.
    last_beam_broken: bool,
}

impl<R: Read, W: Write, A: Actuator, L: DigitalInput> Dispatcher<R, W, A, L> {
    pub fn new(
        input: R,
        output: W,
        pipette: Pipette<A, L>,
        devices: Peripherals,
        cfg: DispatcherCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let tokens = TokenReader::new(input, cfg.payload_poll, Arc::clone(&clock));
        Self {
            tokens,
            out: ResponseWriter::new(output),
            pipette,
            devices,
            clock,
            cfg,
            last_beam_broken: false,
        }
    }

    pub fn pipette(&self) -> &Pipette<A, L> {
        &self.pipette
    }

    /// Startup sequence: readiness line, ring self-test, beam LED seeded
    /// from the sensor's current state. Not part of the command protocol.
    pub fn boot(&mut self) -> Result<()> {
        self.out.line("OK")?;
        self.devices
            .ring_self_test(self.clock.as_ref(), self.cfg.ring_test_step)?;
        self.out.line("Ring Test Complete")?;

        let broken = self.devices.beam_broken()?;
        self.devices.set_beam_led(broken)?;
        self.last_beam_broken = broken;
        tracing::info!(beam_broken = broken, "boot complete");
        Ok(())
    }

    /// One control-loop pass: background motion/endstop service, then at
    /// most one command. Blocks while a command (payload wait, homing,
    /// moves, the sensor test) is in progress.
    pub fn service(&mut self) -> Result<ServiceOutcome> {
        if let Err(e) = self.pipette.service() {
            tracing::warn!(error = %e, "background service");
        }

        let Some(token) = self.tokens.next_token()? else {
            return Ok(ServiceOutcome::Disconnected);
        };
        let outcome = match token.parse::<i64>().ok().and_then(Command::from_wire) {
            None => {
                tracing::debug!(token = %token, "unrecognized command");
                self.out.bare(SENTINEL_UNKNOWN)?;
                ServiceOutcome::Handled
            }
            Some(cmd) => self.execute(cmd)?,
        };
        // Re-synchronize: drop whatever is left of the current line.
        self.tokens.discard_to_boundary();
        Ok(outcome)
    }

    /// Serve until the transport closes or `shutdown` is raised.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        while !shutdown.load(Ordering::Relaxed) {
            match self.service()? {
                ServiceOutcome::Handled => {}
                ServiceOutcome::Disconnected => break,
            }
        }
        Ok(())
    }

    fn execute(&mut self, cmd: Command) -> Result<ServiceOutcome> {
        tracing::info!(code = cmd.code(), "command");
        match cmd {
            Command::RingOn => {
                if let Err(e) = self.devices.ring_on() {
                    tracing::error!(error = %e, "ring on");
                }
                self.out.ok(ResponseCode::RingOn)?;
            }
            Command::RingOff => {
                if let Err(e) = self.devices.ring_off() {
                    tracing::error!(error = %e, "ring off");
                }
                self.out.ok(ResponseCode::RingOff)?;
            }
            Command::DotsOn => {
                let ok = self.unwrap_verified(Peripherals::dots_on);
                self.out.verified(ResponseCode::DotsOn, ok)?;
            }
            Command::DotsOff => {
                let ok = self.unwrap_verified(Peripherals::dots_off);
                self.out.verified(ResponseCode::DotsOff, ok)?;
            }
            Command::MagnetOn => {
                let ok = self.unwrap_verified(|d| d.set_magnet(true));
                self.out.verified(ResponseCode::MagnetOn, ok)?;
            }
            Command::MagnetOff => {
                let ok = self.unwrap_verified(|d| d.set_magnet(false));
                self.out.verified(ResponseCode::MagnetOff, ok)?;
            }
            Command::BeamRead => {
                // On a sensor fault, report broken: the safe reading for a
                // rig that gates motion on a clear beam.
                let broken = self.devices.beam_broken().unwrap_or_else(|e| {
                    tracing::error!(error = %e, "beam read");
                    true
                });
                let code = if broken {
                    ResponseCode::BeamBroken
                } else {
                    ResponseCode::BeamClear
                };
                self.out.bare(code.code())?;
            }
            Command::BeamTest => self.beam_test()?,
            Command::PipetteHome => {
                self.out.line("Homing pipette...")?;
                match self.pipette.home() {
                    Ok(()) => self.out.ok(ResponseCode::PipetteHomed)?,
                    Err(e) => {
                        self.diagnose(&e)?;
                        self.out.err(ResponseCode::PipetteHomed)?;
                    }
                }
            }
            Command::PipetteMove => {
                return self.motion_command(ResponseCode::PipetteMoved, Pipette::move_to);
            }
            Command::PipetteAspirate => {
                return self.motion_command(ResponseCode::PipetteAspirated, Pipette::aspirate);
            }
            Command::PipetteDispense => {
                return self.motion_command(ResponseCode::PipetteDispensed, Pipette::dispense);
            }
            Command::PipetteStatus => {
                let status = self.pipette.status();
                self.out.status(&status)?;
                self.out.ok(ResponseCode::PipetteStatus)?;
            }
            Command::Hello => {
                self.out.bare(ResponseCode::Hello.code())?;
            }
        }
        Ok(ServiceOutcome::Handled)
    }

    /// Shared shape of the three payload-carrying motion commands: block
    /// for the float token, run the state-machine operation, map failures
    /// to a diagnostic line plus the failure-flagged response.
    fn motion_command(
        &mut self,
        resp: ResponseCode,
        op: impl FnOnce(&mut Pipette<A, L>, f32) -> Result<()>,
    ) -> Result<ServiceOutcome> {
        let Some(payload) = self.read_payload()? else {
            return Ok(ServiceOutcome::Disconnected);
        };
        match payload {
            Payload::Value(v) => match op(&mut self.pipette, v) {
                Ok(()) => self.out.ok(resp)?,
                Err(e) => {
                    self.diagnose(&e)?;
                    self.out.err(resp)?;
                }
            },
            Payload::Malformed(token) => {
                tracing::warn!(token = %token, "malformed payload");
                let err = RigError::BadPayload(token);
                self.out.line(&format!("ERROR: {err}"))?;
                self.out.err(resp)?;
            }
        }
        Ok(ServiceOutcome::Handled)
    }

    /// Block (cooperatively) until the payload token arrives. `None` means
    /// the transport closed mid-command.
    fn read_payload(&mut self) -> Result<Option<Payload>> {
        let Some(token) = self.tokens.next_token()? else {
            return Ok(None);
        };
        Ok(Some(match token.parse::<f32>() {
            Ok(v) => Payload::Value(v),
            Err(_) => Payload::Malformed(token),
        }))
    }

    fn unwrap_verified(&mut self, op: impl FnOnce(&mut Peripherals) -> Result<bool>) -> bool {
        op(&mut self.devices).unwrap_or_else(|e| {
            tracing::error!(error = %e, "verified peripheral op");
            false
        })
    }

    /// Free-text diagnostic preceding a failure-flagged response.
    fn diagnose(&mut self, err: &eyre::Report) -> Result<()> {
        tracing::warn!(error = %err, "command failed");
        self.out.line(&format!("ERROR: {}", err.root_cause()))?;
        Ok(())
    }

    /// Fixed-cycle sensor test: per-cycle state line, beam LED and dots
    /// driven from the reading, bare transition codes on state changes.
    /// Runs to completion; no other command is serviced meanwhile.
    fn beam_test(&mut self) -> Result<()> {
        for _ in 0..self.cfg.sensor_test_cycles {
            let broken = self.devices.beam_broken().unwrap_or_else(|e| {
                tracing::error!(error = %e, "beam read");
                true
            });

            self.devices.set_beam_led(broken)?;
            if broken {
                let _ = self.devices.dots_on()?;
                self.out.line("beam broken")?;
            } else {
                let _ = self.devices.dots_off()?;
                self.out.line("beam clear")?;
            }

            if broken != self.last_beam_broken {
                let code = if broken {
                    ResponseCode::BeamBroken
                } else {
                    ResponseCode::BeamClear
                };
                self.out.bare(code.code())?;
                self.last_beam_broken = broken;
            }

            self.clock.sleep(self.cfg.sensor_test_period);
        }
        Ok(())
    }
}
