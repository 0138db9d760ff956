use thiserror::Error;

/// Failures surfaced to the host as `ERR:` responses. Display text doubles
/// as the free-text diagnostic line, so it is written for an operator.
#[derive(Debug, Error, Clone)]
pub enum RigError {
    #[error("pipette not homed")]
    NotHomed,
    #[error("position {target_mm:.2} mm out of bounds (limit {max_mm:.2} mm)")]
    OutOfBounds { target_mm: f32, max_mm: f32 },
    #[error("requested volume exceeds pipette capacity")]
    CapacityExceeded { requested_ul: f32, free_ul: f32 },
    #[error("not enough volume in pipette")]
    InsufficientVolume { requested_ul: f32, held_ul: f32 },
    #[error("volume must be finite and non-negative")]
    InvalidVolume,
    #[error("dispense would pass the zero stop")]
    BelowZero,
    #[error("homing timed out after {0} ms")]
    HomingTimeout(u64),
    #[error("payload is not a number: {0:?}")]
    BadPayload(String),
    #[error("hardware fault: {0}")]
    Hardware(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing endstop")]
    MissingEndstop,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
