use crate::action::Action;
use crate::board::Board;
use crate::console::Terminal;
use crate::mode::{Capabilities, Mode};
use crate::Error;
use alloc::boxed::Box;

pub const NAME: &str = "HiZ";
pub const CAPABILITIES: Capabilities = Capabilities::PIN_DIRECTIONS;

/// `HiZ` is the safe idle mode: no bus, every pin an input.
pub struct HiZ;

pub fn build<B: Board>(_board: &mut B, _term: &mut dyn Terminal) -> Result<Box<dyn Mode>, Error> {
    Ok(Box::new(HiZ))
}

impl Mode for HiZ {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run_sequence(&mut self, actions: &[Action], _term: &mut dyn Terminal) -> Result<(), Error> {
        log::debug!("HiZ ignores {} actions", actions.len());
        Ok(())
    }

    fn pin_functions(&self) -> &'static str {
        "CLK     MOSI    CS      MISO"
    }
}
