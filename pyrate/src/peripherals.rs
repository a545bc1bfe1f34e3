use crate::board::{Board, UserPin};
use crate::bus::BusError;

/// `Config` is the pin and rail state carried by the `0100wxyz` command
/// that every binary sub-engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub power_supply: bool,
    pub pull_ups: bool,
    pub aux: bool,
    pub cs: bool,
}

impl Config {
    /// `from_command_byte` decodes a `0x4x` command, or returns `None` for
    /// any other byte.
    pub fn from_command_byte(cmd: u8) -> Option<Self> {
        if cmd & 0xF0 != 0x40 {
            return None;
        }
        Some(Config {
            power_supply: cmd & 0b1000 != 0,
            pull_ups: cmd & 0b0100 != 0,
            aux: cmd & 0b0010 != 0,
            cs: cmd & 0b0001 != 0,
        })
    }

    pub fn command_byte(&self) -> u8 {
        let mut cmd = 0b0100_0000u8;
        cmd |= (self.power_supply as u8) << 3;
        cmd |= (self.pull_ups as u8) << 2;
        cmd |= (self.aux as u8) << 1;
        cmd |= self.cs as u8;
        cmd
    }

    /// `apply` switches the rails and drives AUX and CS to the configured
    /// levels.
    pub fn apply<B: Board>(
        &self,
        board: &mut B,
        aux: &mut dyn UserPin,
        cs: &mut dyn UserPin,
    ) -> Result<(), BusError> {
        log::debug!("peripherals {:?}", self);
        board.set_power(self.power_supply);
        board.set_pullups(self.pull_ups);
        aux.set_output(self.aux)?;
        cs.set_output(self.cs)
    }
}
