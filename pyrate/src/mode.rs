//! Module `mode` defines the interactive bus modes and the table they are
//! selected from.

use crate::action::Action;
use crate::board::{Board, UserPin};
use crate::console::Terminal;
use crate::macros::MacroTable;
use crate::{hiz, i2c, onewire, spi, uart, Error};
use alloc::boxed::Box;
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// Optional behavior a mode supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// The pull-up resistors make sense on this bus.
        const PULLUPS = 1 << 0;
        /// The mode reports the direction of its bus pins.
        const PIN_DIRECTIONS = 1 << 1;
        /// The mode owns a chip select pin that the user may drive.
        const CHIP_SELECT = 1 << 2;
    }
}

/// `Mode` is an interactive bus mode.
///
/// A mode owns the peripherals and pins it claimed while being built, and
/// releases them when dropped.
pub trait Mode {
    fn name(&self) -> &'static str;

    /// `run_sequence` replays `actions` on the bus, writing a transcript of
    /// what happened to `term`.
    fn run_sequence(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error>;

    fn run_macro(&mut self, key: u8, term: &mut dyn Terminal) -> Result<(), Error> {
        MacroTable::<()>::new().resolve(key, term)?;
        Ok(())
    }

    /// `pin_functions` labels the CLK, MOSI, CS and MISO columns of the pin
    /// table.
    fn pin_functions(&self) -> &'static str;

    fn pin_directions(&self) -> &'static str {
        "I       I       I       I"
    }

    fn cs_pin(&mut self) -> Option<&mut dyn UserPin> {
        None
    }
}

/// `Build` constructs a mode, asking the user for its settings.
pub type Build<B> = fn(&mut B, &mut dyn Terminal) -> Result<Box<dyn Mode>, Error>;

pub struct ModeEntry<B> {
    pub name: &'static str,
    pub capabilities: Capabilities,
    pub build: Build<B>,
}

/// `Registry` is the list of modes offered by the `m` command, numbered
/// from 1.
pub struct Registry<B> {
    entries: Vec<ModeEntry<B>>,
}

impl<B: Board> Registry<B> {
    pub fn standard() -> Self {
        let entries = alloc::vec![
            ModeEntry {
                name: hiz::NAME,
                capabilities: hiz::CAPABILITIES,
                build: hiz::build::<B>,
            },
            ModeEntry {
                name: onewire::NAME,
                capabilities: onewire::CAPABILITIES,
                build: onewire::build::<B>,
            },
            ModeEntry {
                name: uart::NAME,
                capabilities: uart::CAPABILITIES,
                build: uart::build::<B>,
            },
            ModeEntry {
                name: i2c::NAME,
                capabilities: i2c::CAPABILITIES,
                build: i2c::build::<B>,
            },
            ModeEntry {
                name: spi::NAME,
                capabilities: spi::CAPABILITIES,
                build: spi::build::<B>,
            },
        ];
        Self { entries }
    }

    /// `entry` returns mode `number`, counting from 1.
    pub fn entry(&self, number: usize) -> Option<&ModeEntry<B>> {
        number.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeEntry<B>> {
        self.entries.iter()
    }
}
