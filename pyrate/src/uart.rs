//! Module `uart` holds the UART configuration and the interactive UART
//! mode.

use crate::action::Action;
use crate::board::Board;
use crate::bus::UartPort;
use crate::console::{print_bytes, select_option, Line, Terminal};
use crate::macros::MacroTable;
use crate::mode::{Capabilities, Mode};
use crate::Error;
use alloc::boxed::Box;
use alloc::vec;

pub const NAME: &str = "UART";
pub const CAPABILITIES: Capabilities = Capabilities::PULLUPS.union(Capabilities::PIN_DIRECTIONS);

/// Baud rates offered by the speed menu, in menu order.
pub const MENU_SPEEDS: [u32; 10] = [300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 31250];

/// Baud rates selected by the `0x6x` binary command.
pub const BINARY_SPEEDS: [u32; 10] = [300, 1200, 2400, 4800, 9600, 19200, 31250, 38400, 57600, 115200];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            baud: 300,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl Config {
    /// `with_format` applies the data bits and parity option shared by the
    /// menu and the binary protocol: 8N, 8E, 8O, 9N.
    fn with_format(self, format: u8, two_stop_bits: bool) -> Self {
        let (data_bits, parity) = match format {
            1 => (8, Parity::Even),
            2 => (8, Parity::Odd),
            3 => (9, Parity::None),
            _ => (8, Parity::None),
        };
        Config {
            data_bits,
            parity,
            stop_bits: if two_stop_bits { 2 } else { 1 },
            ..self
        }
    }

    /// `with_command_byte` applies a `0x8x`/`0x9x` binary configuration
    /// command. Open-drain output and inverted receive polarity are not
    /// supported.
    pub fn with_command_byte(self, cmd: u8) -> Option<Self> {
        if cmd & 0xE0 != 0x80 || cmd & 0x10 == 0 || cmd & 0x01 != 0 {
            return None;
        }
        Some(self.with_format((cmd >> 2) & 0x3, cmd & 0x02 != 0))
    }
}

#[derive(Debug, Clone, Copy)]
enum Macro {
    Bridge,
    Monitor,
}

pub struct Uart<U: UartPort> {
    port: U,
    macros: MacroTable<Macro>,
}

pub fn build<B: Board>(board: &mut B, term: &mut dyn Terminal) -> Result<Box<dyn Mode>, Error> {
    let speeds = [
        "300", "1200", "2400", "4800", "9600", "19200", "38400", "57600", "115200", "31250",
    ];
    let speed = select_option(term, "Set serial port speed: (bps)", &speeds, 0)?;
    let format = select_option(
        term,
        "Data bits and parity:",
        &["8, NONE *default", "8, EVEN", "8, ODD", "9, NONE"],
        0,
    )?;
    let stop = select_option(term, "Stop bits:", &["1 *default", "2"], 0)?;

    let config = Config {
        baud: MENU_SPEEDS[speed],
        ..Config::default()
    }
    .with_format(format as u8, stop == 1);

    let pins = board.pins();
    let port = board.uart(pins.mosi, pins.miso, &config)?;
    Ok(Box::new(Uart::new(port)))
}

impl<U: UartPort> Uart<U> {
    pub fn new(port: U) -> Self {
        let mut macros = MacroTable::new();
        macros.register(1, "Transparent bridge", Macro::Bridge);
        macros.register(2, "Live monitor", Macro::Monitor);
        macros.register(3, "Bridge with flow control", Macro::Bridge);
        Self { port, macros }
    }

    /// `bridge` forwards bytes both ways until the link to the user fails.
    fn bridge(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "UART bridge")?;
        writeln!(term, "Reset to exit")?;
        match term.read_line("Are you sure? ")? {
            Line::Text(answer) if answer.trim() == "y" => {}
            Line::Text(_) => return Ok(()),
            Line::ModeSwitch => return Err(Error::ModeSwitch),
        }
        let mut buffer = [0u8; 64];
        loop {
            if let Some(key) = term.poll_key()? {
                self.port.write(&[key])?;
            }
            self.forward(term, &mut buffer)?;
        }
    }

    fn monitor(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "Raw UART input")?;
        writeln!(term, "Any key to exit")?;
        let mut buffer = [0u8; 64];
        while term.poll_key()?.is_none() {
            self.forward(term, &mut buffer)?;
        }
        Ok(())
    }

    fn forward(&mut self, term: &mut dyn Terminal, buffer: &mut [u8]) -> Result<(), Error> {
        let waiting = self.port.available().min(buffer.len());
        if waiting > 0 {
            let n = self.port.read(&mut buffer[..waiting]);
            term.write_bytes(&buffer[..n])?;
        }
        Ok(())
    }
}

impl<U: UartPort + 'static> Mode for Uart<U> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run_sequence(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error> {
        for action in actions {
            match *action {
                Action::Start => self.port.clear_input(),
                Action::Write { value, repeat } => {
                    let buffer = vec![value; usize::from(repeat)];
                    print_bytes(term, "WRITE", &buffer)?;
                    self.port.write(&buffer)?;
                }
                Action::Read { repeat } => {
                    let mut buffer = vec![0u8; usize::from(repeat)];
                    let n = self.port.read(&mut buffer);
                    if n > 0 {
                        print_bytes(term, "READ", &buffer[..n])?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_macro(&mut self, key: u8, term: &mut dyn Terminal) -> Result<(), Error> {
        match self.macros.resolve(key, term)? {
            Some(Macro::Bridge) => self.bridge(term),
            Some(Macro::Monitor) => self.monitor(term),
            None => Ok(()),
        }
    }

    fn pin_functions(&self) -> &'static str {
        "-       TxD     -       RxD"
    }

    fn pin_directions(&self) -> &'static str {
        "I       O       I       I"
    }
}
