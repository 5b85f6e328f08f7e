/// Serial wire protocol between the host and the rig microcontroller
///
/// Every message from the rig starts with one ASCII flag byte; only the
/// height flag carries a payload (a newline-terminated ASCII float).
/// Commands from the host are single bytes with no payload.

use anyhow::{anyhow, Result};

/// Message flags received from the rig firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Encoder pins not yet located; calibration still in progress.
    PinsNotLocated,
    /// A height measurement follows as a newline-terminated decimal.
    Height,
    /// The firmware hit an unrecoverable error.
    FirmwareError,
    /// Anything the protocol does not know about.
    Unexpected(u8),
}

impl Flag {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'l' => Flag::PinsNotLocated,
            b'h' => Flag::Height,
            b'e' => Flag::FirmwareError,
            other => Flag::Unexpected(other),
        }
    }
}

/// Single-byte commands sent to the rig firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Zero the height measurement at the current position.
    SetFloor,
    /// Tell the firmware the operator changed the display unit.
    ChangeUnit,
    /// Stop the firmware loop; host is shutting down.
    Shutdown,
}

impl Command {
    pub fn byte(self) -> u8 {
        match self {
            Command::SetFloor => b'f',
            Command::ChangeUnit => b'c',
            Command::Shutdown => b's',
        }
    }
}

/// Parse the payload line of a height message.
///
/// The line arrives with its terminator still attached; trailing CR/LF is
/// stripped before parsing. May be negative (below the set floor) and may
/// carry a fractional part.
pub fn parse_height(line: &str) -> Result<f64> {
    let trimmed = line.trim();
    trimmed
        .parse::<f64>()
        .map_err(|e| anyhow!("malformed height payload {:?}: {}", trimmed, e))
}
