//! Module `action` holds the vocabulary shared by the sequence parser and the
//! bus engines.
//!
//! A command line such as `[0xA0 0x00 r:4]` is turned into a list of
//! `Action` values by `crate::parse::parse`, and that list is then replayed
//! by whichever bus mode is currently active.

use core::fmt;

/// `Action` is a single step of a bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start condition, or chip select asserted, or bus reset, depending on
    /// the bus.
    Start,

    /// Stop condition, or chip select released.
    Stop,

    /// `Write` emits `value` on the bus `repeat` times, as separate unit
    /// transfers.
    Write { value: u8, repeat: u16 },

    /// `Read` samples `repeat` bytes from the bus.
    Read { repeat: u16 },

    /// A bare clock pulse, for raw-wire style buses.
    ClockTick { repeat: u16 },

    /// A single-bit read, for raw-wire style buses.
    BitRead { repeat: u16 },

    ClockHigh,
    ClockLow,
    DataHigh,
    DataLow,
    ReadPin,
}

impl Action {
    /// `repeat` returns how many unit transfers the action stands for.
    /// Markers always count as one.
    pub fn repeat(&self) -> u16 {
        match *self {
            Action::Write { repeat, .. }
            | Action::Read { repeat }
            | Action::ClockTick { repeat }
            | Action::BitRead { repeat } => repeat,
            _ => 1,
        }
    }
}

/// Formats the action as a token that parses back to the same action.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (token, repeat) = match *self {
            Action::Start => return f.write_str("["),
            Action::Stop => return f.write_str("]"),
            Action::ClockHigh => return f.write_str("/"),
            Action::ClockLow => return f.write_str("\\"),
            Action::DataHigh => return f.write_str("-"),
            Action::DataLow => return f.write_str("_"),
            Action::ReadPin => return f.write_str("."),
            Action::Write { value, repeat } => {
                write!(f, "0x{:02X}", value)?;
                ("", repeat)
            }
            Action::Read { repeat } => ("r", repeat),
            Action::ClockTick { repeat } => ("^", repeat),
            Action::BitRead { repeat } => ("!", repeat),
        };
        f.write_str(token)?;
        if repeat > 1 {
            write!(f, ":{}", repeat)?;
        }
        Ok(())
    }
}
