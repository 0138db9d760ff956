//! The serial command/response vocabulary.
//!
//! The tables here are the single source of truth for the wire protocol:
//! decoding goes through [`Command::from_wire`], so no unmapped code can
//! reach a handler, and every handler answers with a [`ResponseCode`].

/// Commands accepted on the wire, one integer code each. Motion commands
/// carry a single trailing float payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 1: ring full white
    RingOn,
    /// 2: ring off
    RingOff,
    /// 3: status dots on (verified)
    DotsOn,
    /// 4: status dots off (verified)
    DotsOff,
    /// 5: electromagnet on (verified)
    MagnetOn,
    /// 6: electromagnet off (verified)
    MagnetOff,
    /// 7: read the beam sensor once
    BeamRead,
    /// 8: multi-cycle beam sensor test
    BeamTest,
    /// 9: home the pipette
    PipetteHome,
    /// 10: move to an absolute position (payload: mm)
    PipetteMove,
    /// 11: aspirate (payload: uL)
    PipetteAspirate,
    /// 12: dispense (payload: uL)
    PipetteDispense,
    /// 13: report homed state, position, volume
    PipetteStatus,
    /// 99: connectivity check
    Hello,
}

/// Bare sentinel line sent for unrecognized command codes.
pub const SENTINEL_UNKNOWN: i32 = -1;

impl Command {
    pub fn from_wire(code: i64) -> Option<Command> {
        Some(match code {
            1 => Command::RingOn,
            2 => Command::RingOff,
            3 => Command::DotsOn,
            4 => Command::DotsOff,
            5 => Command::MagnetOn,
            6 => Command::MagnetOff,
            7 => Command::BeamRead,
            8 => Command::BeamTest,
            9 => Command::PipetteHome,
            10 => Command::PipetteMove,
            11 => Command::PipetteAspirate,
            12 => Command::PipetteDispense,
            13 => Command::PipetteStatus,
            99 => Command::Hello,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            Command::RingOn => 1,
            Command::RingOff => 2,
            Command::DotsOn => 3,
            Command::DotsOff => 4,
            Command::MagnetOn => 5,
            Command::MagnetOff => 6,
            Command::BeamRead => 7,
            Command::BeamTest => 8,
            Command::PipetteHome => 9,
            Command::PipetteMove => 10,
            Command::PipetteAspirate => 11,
            Command::PipetteDispense => 12,
            Command::PipetteStatus => 13,
            Command::Hello => 99,
        }
    }

    /// Whether the command reads one trailing float token before executing.
    pub const fn wants_payload(self) -> bool {
        matches!(
            self,
            Command::PipetteMove | Command::PipetteAspirate | Command::PipetteDispense
        )
    }
}

/// Numeric response codes paired with an `OK:`/`ERR:` tag, or sent bare for
/// the sensor read and the connectivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    RingOn,
    RingOff,
    DotsOn,
    DotsOff,
    MagnetOn,
    MagnetOff,
    BeamBroken,
    BeamClear,
    PipetteHomed,
    PipetteMoved,
    PipetteAspirated,
    PipetteDispensed,
    PipetteStatus,
    Hello,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            ResponseCode::RingOn => 101,
            ResponseCode::RingOff => 102,
            ResponseCode::DotsOn => 103,
            ResponseCode::DotsOff => 104,
            ResponseCode::MagnetOn => 105,
            ResponseCode::MagnetOff => 106,
            ResponseCode::BeamBroken => 107,
            ResponseCode::BeamClear => 108,
            ResponseCode::PipetteHomed => 109,
            ResponseCode::PipetteMoved => 110,
            ResponseCode::PipetteAspirated => 111,
            ResponseCode::PipetteDispensed => 112,
            ResponseCode::PipetteStatus => 113,
            ResponseCode::Hello => 999,
        }
    }
}
