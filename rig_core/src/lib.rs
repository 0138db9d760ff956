#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core control logic for the sample-handling rig (hardware-agnostic).
//!
//! All hardware interactions go through the `rig_traits` capability traits,
//! so the same dispatcher serves simulated devices, the bench, and the rig.
//!
//! ## Architecture
//!
//! - **Protocol**: closed command/response code tables (`protocol` module)
//! - **Wire**: ASCII token framing and response lines (`wire` module)
//! - **Pipette**: homing and bounded-motion state machine (`pipette` module)
//! - **Peripherals**: illumination, electromagnet, and beam-sensor
//!   handlers with verification read-back (`peripherals` module)
//! - **Dispatcher**: one command per control-loop pass (`dispatcher` module)
//!
//! ## Blocking model
//!
//! The loop is single-threaded and cooperative: payload waits and actuator
//! settlement block it with short `Clock` sleeps, and there is no
//! cancellation once a command starts. One outstanding command,
//! responses strictly in arrival order.

pub mod dispatcher;
pub mod error;
pub mod mocks;
pub mod peripherals;
pub mod pipette;
pub mod protocol;
pub mod wire;

pub use dispatcher::{Dispatcher, DispatcherCfg, ServiceOutcome};
pub use error::{BuildError, Result, RigError};
pub use peripherals::Peripherals;
pub use pipette::{MotionCfg, Pipette, PipetteStatus, UL_PER_MM};
pub use protocol::{Command, ResponseCode, SENTINEL_UNKNOWN};
