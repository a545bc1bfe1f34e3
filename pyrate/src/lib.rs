//! Bus Pirate protocol emulation engine
//!
//! This library turns a board with a few spare pins into something that
//! behaves like a [Bus Pirate](http://dangerousprototypes.com/docs/Bus_Pirate)
//! v3: a human can drive I2C, SPI, UART and 1-Wire buses by typing short
//! transaction strings at a prompt, and host tools that speak the Bus Pirate
//! binary protocol ("BBIO1") can drive the same buses programmatically over
//! the same serial link.
//!
//! The board itself is described by implementing `board::Board`, which hands
//! out bus peripherals and digital pins. Everything above that boundary is
//! provided here:
//!
//! ```rust,ignore
//! let (tx, rx) = port.split();
//! let mut console = pyrate::console::Console::new(tx, rx);
//! let mut pyrate = pyrate::Pyrate::new(board)?;
//! pyrate.serve(&mut console)?;
//! ```
//!
//! `Pyrate::serve` runs the interactive prompt. When the host sends the
//! twenty NUL bytes that announce the binary protocol, the prompt hands the
//! serial channel over to `bitbang::run` until the host asks to return to
//! the terminal.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod action;
pub mod binary;
pub mod bitbang;
pub mod board;
pub mod bus;
pub mod console;
pub mod hiz;
pub mod i2c;
mod low;
pub mod macros;
pub mod mode;
pub mod onewire;
pub mod parse;
pub mod peripherals;
pub mod spi;
pub mod stream;
pub mod uart;

#[cfg(test)]
mod testing;

pub use low::Channel;

use crate::board::{Board, Probe, Unavailable, UserPin};
use crate::bus::BusError;
use crate::console::{Console, Line, Terminal};
use crate::mode::{Capabilities, Mode, Registry};
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use core::fmt::{self, Write as _};
use embedded_hal::serial;

const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_MENU: &str = "\
MENUS
?    \tHelp
= X  \tConverts X to dec/hex/bin
| X  \tReverse bits in byte X
i    \tVersion & status info
b    \tSet baud rate
c/C  \tAUX assignment (aux pin/CS)
a/A/@\tAUXPIN (low/HIGH/READ)
d/D  \tMeasure ADC (once/CONT.)
m    \tChange mode
(0)  \tList current macros
(x)  \tMacro x
w/W  \tPSU (off/ON)
v    \tShow volts/states
p/P  \tPull-up resistors (off/ON)
#    \tReset
PROTOCOL INTERACTION
[/{  \tStart
]/}  \tStop
123  \tSend value
0x12 \tSend hex value
0b10 \tSend binary value
r    \tRead
:    \tRepeat e.g. r:10";

/// `Error` represents failures of the interactive engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A board resource could not be claimed.
    Unavailable(Unavailable),

    /// A bus transfer or pin operation failed below the protocol level.
    Bus(BusError),

    /// The serial link to the user failed.
    Link,

    /// The host announced the binary protocol while the engine was waiting
    /// for a line of text.
    ModeSwitch,

    /// The operation was abandoned before it did anything.
    Aborted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(what) => write!(f, "{}", what),
            Self::Bus(err) => write!(f, "{}", err),
            Self::Link => write!(f, "serial link failed"),
            Self::ModeSwitch => write!(f, "binary mode requested"),
            Self::Aborted => write!(f, "operation aborted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<Unavailable> for Error {
    fn from(err: Unavailable) -> Self {
        Error::Unavailable(err)
    }
}

impl From<BusError> for Error {
    fn from(err: BusError) -> Self {
        Error::Bus(err)
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::Link
    }
}

/// `LinkError` represents failures of the raw serial channel used by the
/// binary protocol.
#[derive(Debug)]
pub enum LinkError<TXErr, RXErr> {
    /// `Write` indicates that the underlying serial write object returned an
    /// error.
    ///
    /// The data is the error returned by the underlying serial implementation.
    Write(TXErr),

    /// `Read` indicates that the underlying serial read object returned an
    /// error.
    ///
    /// The data is the error returned by the underlying serial implementation.
    Read(RXErr),
}

impl<TXErr, RXErr> LinkError<TXErr, RXErr> {
    fn tx(got: TXErr) -> Self {
        LinkError::Write(got)
    }

    fn rx(got: RXErr) -> Self {
        LinkError::Read(got)
    }
}

impl<TXErr: fmt::Debug, RXErr: fmt::Debug> fmt::Display for LinkError<TXErr, RXErr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(err) => write!(f, "serial write failed: {:?}", err),
            Self::Read(err) => write!(f, "serial read failed: {:?}", err),
        }
    }
}

/// `Flow` tells the prompt loop what to do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,

    /// The host asked for the binary protocol in the middle of a command.
    Binary,

    /// The user confirmed a reset.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinRole {
    Aux,
    Cs,
}

/// `Pyrate` is the interactive command dispatcher.
///
/// It owns the board, the current bus mode and the pins that the user can
/// toggle directly. Exactly one mode is alive at a time; switching modes
/// drops the previous one, releasing its pins and peripherals, before the
/// next one is built.
pub struct Pyrate<B: Board> {
    board: B,
    registry: Registry<B>,
    mode: Box<dyn Mode>,
    capabilities: Capabilities,
    aux: B::Pin,
    cs: Option<B::Pin>,
    user_pin: PinRole,
}

impl<B: Board> Pyrate<B> {
    /// `Pyrate::new` claims the AUX pin, switches the power rails, pull-ups
    /// and mode LED off and starts in HiZ mode.
    pub fn new(mut board: B) -> Result<Self, Error> {
        let aux = board.pin(board.pins().aux)?;
        board.set_power(false);
        board.set_pullups(false);
        board.set_mode_led(false);
        Ok(Self {
            board,
            registry: Registry::standard(),
            mode: Box::new(hiz::HiZ),
            capabilities: hiz::CAPABILITIES,
            aux,
            cs: None,
            user_pin: PinRole::Aux,
        })
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }

    /// `prompt` returns the prompt text for the current mode.
    pub fn prompt(&self) -> String {
        let mut prompt = String::from(self.mode.name());
        prompt.push_str("> ");
        prompt
    }

    /// `serve` runs the interactive prompt on `console` until the user
    /// resets the engine or the serial link fails.
    pub fn serve<TX, RX>(&mut self, console: &mut Console<TX, RX>) -> Result<(), Error>
    where
        TX: serial::Write<u8>,
        RX: serial::Read<u8>,
        TX::Error: fmt::Debug,
        RX::Error: fmt::Debug,
    {
        loop {
            let prompt = self.prompt();
            let flow = match console.read_line(&prompt)? {
                Line::ModeSwitch => Flow::Binary,
                Line::Text(line) => match self.run_command(&line, console) {
                    Ok(flow) => flow,
                    Err(Error::ModeSwitch) => Flow::Binary,
                    Err(Error::Link) => return Err(Error::Link),
                    Err(err) => {
                        log::warn!("command {:?} failed: {}", line, err);
                        Flow::Continue
                    }
                },
            };
            match flow {
                Flow::Continue => {}
                Flow::Binary => self.run_binary_mode(console)?,
                Flow::Reset => return Ok(()),
            }
        }
    }

    /// `run_command` executes one line typed at the prompt.
    pub fn run_command(&mut self, line: &str, term: &mut dyn Terminal) -> Result<Flow, Error> {
        let mut chars = line.chars();
        let command = match chars.next() {
            Some(c) => c,
            None => return Ok(Flow::Continue),
        };
        let args = chars.as_str().trim();

        match command {
            '?' => writeln!(term, "{}", HELP_MENU)?,
            'i' => self.version_info(term)?,
            'b' => writeln!(term, "No baud rate change required for USB!")?,
            '=' => convert_value(args, false, term)?,
            '|' => convert_value(args, true, term)?,
            'c' => {
                self.cs = None;
                self.user_pin = PinRole::Aux;
            }
            'C' => self.select_cs()?,
            'a' => {
                self.user_pin().set_output(false)?;
                writeln!(term, "AUX LOW")?;
            }
            'A' => {
                self.user_pin().set_output(true)?;
                writeln!(term, "AUX HIGH")?;
            }
            '@' => {
                let pin = self.user_pin();
                pin.set_input()?;
                let level = pin.is_high()?;
                writeln!(term, "AUX INPUT/HI-Z, READ: {}", level as u8)?;
            }
            'd' => self.read_one_voltage(term)?,
            'D' => self.run_voltmeter(term)?,
            'm' => return self.change_mode(args, term),
            'w' => {
                self.board.set_power(false);
                writeln!(term, "Power supplies OFF")?;
            }
            'W' => {
                self.board.set_power(true);
                writeln!(term, "Power supplies ON")?;
            }
            'v' => self.print_pin_states(term)?,
            'p' => self.set_pullups(false, term)?,
            'P' => self.set_pullups(true, term)?,
            '(' => {
                let number = line.trim().trim_matches(|c| c == '(' || c == ')');
                match parse::parse_int(number) {
                    Some(key) if key <= u32::from(u8::MAX) => {
                        self.mode.run_macro(key as u8, term)?
                    }
                    _ => writeln!(term, "Invalid input! {}", number)?,
                }
            }
            '#' | '$' => {
                if let Line::Text(answer) = term.read_line("Are you sure? ")? {
                    if answer.trim() == "y" {
                        self.soft_reset(term)?;
                        return Ok(Flow::Reset);
                    }
                } else {
                    return Ok(Flow::Binary);
                }
            }
            _ => {
                let actions = parse::parse(line);
                if !actions.is_empty() {
                    self.mode.run_sequence(&actions, term)?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn user_pin(&mut self) -> &mut dyn UserPin {
        if self.user_pin == PinRole::Cs {
            if let Some(pin) = self.cs.as_mut() {
                return pin;
            }
            if let Some(pin) = self.mode.cs_pin() {
                return pin;
            }
        }
        &mut self.aux
    }

    fn select_cs(&mut self) -> Result<(), Error> {
        if !self.capabilities.contains(Capabilities::CHIP_SELECT) && self.cs.is_none() {
            let cs = self.board.pins().cs;
            self.cs = Some(self.board.pin(cs)?);
        }
        self.user_pin = PinRole::Cs;
        Ok(())
    }

    fn version_info(&self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "Bus Pirate on {}", self.board.name())?;
        writeln!(term, "Firmware v{}", FIRMWARE_VERSION)?;
        writeln!(term, "Mode: {}", self.mode.name())?;
        Ok(())
    }

    fn read_one_voltage(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "VOLTAGE PROBE {:.2}V", self.board.voltage(Probe::Adc))?;
        Ok(())
    }

    fn run_voltmeter(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "VOLTMETER MODE\nAny key to exit")?;
        while term.poll_key()?.is_none() {
            self.read_one_voltage(term)?;
            self.board.delay_ms(100);
        }
        writeln!(term, "DONE")?;
        Ok(())
    }

    fn print_pin_states(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        writeln!(term, "Pinstates:")?;
        writeln!(
            term,
            "1.(BR)  2.(RD)  3.(OR)  4.(YW)  5.(GN)  6.(BL)  7.(PU)  8.(GR)  9.(WT)  0.(Blk)"
        )?;
        writeln!(
            term,
            "GND     3.3V    5.0V    ADC     VPU     AUX     {}",
            self.mode.pin_functions()
        )?;
        let directions = if self.capabilities.contains(Capabilities::PIN_DIRECTIONS) {
            self.mode.pin_directions()
        } else {
            "-       -       -       -"
        };
        writeln!(term, "P       P       P       I       I       I       {}", directions)?;
        write!(term, "GND     ")?;
        for probe in [Probe::V3, Probe::V5, Probe::Adc, Probe::Vpullup] {
            write!(term, "{:1.2}V   ", self.board.voltage(probe))?;
        }
        writeln!(term, "L       L       L       L       L")?;
        Ok(())
    }

    fn set_pullups(&mut self, on: bool, term: &mut dyn Terminal) -> Result<(), Error> {
        if !self.capabilities.contains(Capabilities::PULLUPS) {
            writeln!(term, "Command not used in this mode")?;
            return Ok(());
        }
        self.board.set_pullups(on);
        if on {
            writeln!(term, "Pull-up resistors ON")?;
            if self.board.voltage(Probe::Vpullup) < 0.1 {
                writeln!(term, "Warning: no voltage on Vpullup pin")?;
            }
        } else {
            writeln!(term, "Pull-up resistors OFF")?;
        }
        Ok(())
    }

    fn change_mode(&mut self, args: &str, term: &mut dyn Terminal) -> Result<Flow, Error> {
        let selection = if args.is_empty() {
            for (i, entry) in self.registry.iter().enumerate() {
                writeln!(term, "{}. {}", i + 1, entry.name)?;
            }
            match term.read_line("(1) > ")? {
                Line::Text(text) => text,
                Line::ModeSwitch => return Ok(Flow::Binary),
            }
        } else {
            args.to_string()
        };

        self.release_mode();
        let number = parse::parse_int(selection.trim()).unwrap_or(1) as usize;
        let entry = self
            .registry
            .entry(number)
            .map(|entry| (entry.name, entry.capabilities, entry.build));

        let mut flow = Flow::Continue;
        match entry {
            None => writeln!(term, "Unknown mode")?,
            Some((name, capabilities, build)) => match build(&mut self.board, term) {
                Ok(mode) => {
                    self.mode = mode;
                    self.capabilities = capabilities;
                    if name != hiz::NAME {
                        writeln!(term, "Mode selected")?;
                    }
                }
                Err(Error::ModeSwitch) => flow = Flow::Binary,
                Err(Error::Link) => return Err(Error::Link),
                Err(err) => {
                    log::warn!("{} mode failed: {}", name, err);
                    writeln!(term, "Mode failed")?;
                }
            },
        }
        log::debug!("mode is now {}", self.mode.name());
        self.board.set_mode_led(self.mode.name() != hiz::NAME);
        Ok(flow)
    }

    /// `release_mode` drops the current mode and the standalone chip select
    /// pin, leaving the engine in HiZ.
    fn release_mode(&mut self) {
        self.mode = Box::new(hiz::HiZ);
        self.capabilities = hiz::CAPABILITIES;
        self.cs = None;
    }

    fn soft_reset(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        self.release_mode();
        self.user_pin = PinRole::Aux;
        self.board.set_mode_led(false);
        self.version_info(term)
    }

    fn run_binary_mode<TX, RX>(&mut self, console: &mut Console<TX, RX>) -> Result<(), Error>
    where
        TX: serial::Write<u8>,
        RX: serial::Read<u8>,
        TX::Error: fmt::Debug,
        RX::Error: fmt::Debug,
    {
        log::info!("entering binary mode");
        self.release_mode();
        self.board.set_mode_led(false);
        let cs = self.board.pins().cs;
        let mut cs = self.board.pin(cs)?;
        let result = bitbang::run(console.channel_mut(), &mut self.board, &mut self.aux, &mut cs);
        drop(cs);
        log::info!("leaving binary mode");
        if let Err(err) = result {
            log::error!("binary mode failed: {}", err);
            return Err(Error::Link);
        }
        self.soft_reset(console)
    }
}

/// `reverse_bits` mirrors the bit order of a byte.
pub fn reverse_bits(value: u8) -> u8 {
    let mut value = value;
    let mut flipped = 0u8;
    for _ in 0..8 {
        flipped = (flipped << 1) | (value & 1);
        value >>= 1;
    }
    flipped
}

fn convert_value(args: &str, reverse: bool, term: &mut dyn Terminal) -> Result<(), Error> {
    let value = match parse::parse_int(args) {
        Some(value) => value,
        None => {
            writeln!(term, "Invalid input! {}", args)?;
            return Ok(());
        }
    };
    let value = if reverse {
        u32::from(reverse_bits(value as u8))
    } else {
        value
    };
    writeln!(term, "0x{:02X} = {} = {:08b} ", value, value, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBoard, Script};
    use alloc::vec;

    fn pyrate() -> Pyrate<FakeBoard> {
        Pyrate::new(FakeBoard::new()).unwrap()
    }

    #[test]
    fn reversing_twice_is_identity() {
        for value in 0..=255u8 {
            assert_eq!(reverse_bits(reverse_bits(value)), value);
        }
        assert_eq!(reverse_bits(0x01), 0x80);
        assert_eq!(reverse_bits(0xA0), 0x05);
    }

    #[test]
    fn starts_in_hiz_with_rails_off() {
        let p = pyrate();
        assert_eq!(p.prompt(), "HiZ> ");
        let wiring = p.board().wiring.borrow();
        assert!(!wiring.power);
        assert!(!wiring.pullups);
        assert!(!wiring.mode_led);
        assert!(wiring.claimed.contains(&"AUX"));
    }

    #[test]
    fn value_conversion() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("= 0x41", &mut term).unwrap();
        p.run_command("| 0x01", &mut term).unwrap();
        p.run_command("= zz", &mut term).unwrap();
        assert_eq!(
            term.out,
            "0x41 = 65 = 01000001 \n0x80 = 128 = 10000000 \nInvalid input! zz\n"
        );
    }

    #[test]
    fn aux_pin_commands() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("A", &mut term).unwrap();
        assert_eq!(p.board().wiring.borrow().levels.get("AUX"), Some(&true));
        p.run_command("a", &mut term).unwrap();
        assert_eq!(p.board().wiring.borrow().levels.get("AUX"), Some(&false));
        p.run_command("@", &mut term).unwrap();
        assert_eq!(term.out, "AUX HIGH\nAUX LOW\nAUX INPUT/HI-Z, READ: 0\n");
    }

    #[test]
    fn cs_as_user_pin_in_hiz() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("C", &mut term).unwrap();
        p.run_command("A", &mut term).unwrap();
        assert_eq!(p.board().wiring.borrow().levels.get("CS"), Some(&true));
        p.run_command("c", &mut term).unwrap();
        assert!(!p.board().wiring.borrow().claimed.contains(&"CS"));
    }

    #[test]
    fn mode_menu_selects_i2c() {
        let mut p = pyrate();
        // mode number, then speed and software/hardware menus
        let mut term = Script::new(&["4", "", "2"]);
        assert_eq!(p.run_command("m", &mut term).unwrap(), Flow::Continue);
        assert!(term.out.starts_with("1. HiZ\n2. 1-WIRE\n3. UART\n4. I2C\n5. SPI\n"));
        assert!(term.out.ends_with("Mode selected\n"));
        assert_eq!(p.prompt(), "I2C> ");
        assert!(p.board().wiring.borrow().mode_led);
    }

    #[test]
    fn unparseable_mode_falls_back_to_hiz() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("m 2", &mut term).unwrap();
        assert_eq!(p.prompt(), "1-WIRE> ");
        p.run_command("m bogus", &mut term).unwrap();
        assert_eq!(p.prompt(), "HiZ> ");
        assert!(!p.board().wiring.borrow().mode_led);
    }

    #[test]
    fn unknown_mode_number() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("m 9", &mut term).unwrap();
        assert_eq!(term.out, "Unknown mode\n");
        assert_eq!(p.prompt(), "HiZ> ");
    }

    #[test]
    fn unknown_mode_turns_the_led_off() {
        let mut p = pyrate();
        let mut term = Script::new(&["", "2"]);
        p.run_command("m 4", &mut term).unwrap();
        assert!(p.board().wiring.borrow().mode_led);
        p.run_command("m 9", &mut term).unwrap();
        assert_eq!(p.prompt(), "HiZ> ");
        assert!(!p.board().wiring.borrow().mode_led);
    }

    #[test]
    fn failed_mode_returns_to_hiz() {
        let mut board = FakeBoard::new();
        board.uart_available = false;
        let mut p = Pyrate::new(board).unwrap();
        let mut term = Script::new(&["", "", ""]);
        p.run_command("m 3", &mut term).unwrap();
        assert!(term.out.ends_with("Mode failed\n"));
        assert_eq!(p.prompt(), "HiZ> ");
    }

    #[test]
    fn mode_switch_during_menu() {
        let mut p = pyrate();
        let mut term = Script::new(&[]).mode_switch();
        assert_eq!(p.run_command("m 5", &mut term).unwrap(), Flow::Binary);
        assert_eq!(p.prompt(), "HiZ> ");
    }

    #[test]
    fn switching_modes_releases_pins() {
        let mut p = pyrate();
        let mut term = Script::new(&["", "", "", ""]);
        p.run_command("m 5", &mut term).unwrap();
        assert!(p.board().wiring.borrow().claimed.contains(&"CS"));
        p.run_command("m 1", &mut term).unwrap();
        assert!(!p.board().wiring.borrow().claimed.contains(&"CS"));
    }

    #[test]
    fn pullups_need_capability() {
        let mut p = pyrate();
        let mut term = Script::new(&["", "", ""]);
        p.run_command("P", &mut term).unwrap();
        assert_eq!(term.out, "Command not used in this mode\n");
        p.run_command("m 2", &mut term).unwrap();
        term.out.clear();
        p.run_command("P", &mut term).unwrap();
        assert_eq!(
            term.out,
            "Pull-up resistors ON\nWarning: no voltage on Vpullup pin\n"
        );
        assert!(p.board().wiring.borrow().pullups);
    }

    #[test]
    fn power_commands() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("W", &mut term).unwrap();
        assert!(p.board().wiring.borrow().power);
        p.run_command("w", &mut term).unwrap();
        assert!(!p.board().wiring.borrow().power);
        assert_eq!(term.out, "Power supplies ON\nPower supplies OFF\n");
    }

    #[test]
    fn voltmeter_runs_until_key() {
        let mut p = pyrate();
        let mut term = Script::new(&[]).with_keys(&[None, None, Some(b'x')]);
        p.run_command("D", &mut term).unwrap();
        assert_eq!(term.out.matches("VOLTAGE PROBE").count(), 2);
        assert!(term.out.ends_with("DONE\n"));
    }

    #[test]
    fn pin_table_without_directions() {
        let mut p = pyrate();
        let mut term = Script::new(&["", "1"]);
        p.run_command("m 4", &mut term).unwrap();
        term.out.clear();
        p.run_command("v", &mut term).unwrap();
        let lines: vec::Vec<&str> = term.out.lines().collect();
        assert_eq!(lines[2], "GND     3.3V    5.0V    ADC     VPU     AUX     SCL     SDA     -       -");
        assert_eq!(lines[3], "P       P       P       I       I       I       -       -       -       -");
    }

    #[test]
    fn reset_needs_confirmation() {
        let mut p = pyrate();
        let mut term = Script::new(&["n", "y"]);
        assert_eq!(p.run_command("#", &mut term).unwrap(), Flow::Continue);
        assert_eq!(p.run_command("#", &mut term).unwrap(), Flow::Reset);
        assert!(term.out.starts_with("Bus Pirate on fake"));
    }

    #[test]
    fn hiz_ignores_sequences_and_lists_no_macros() {
        let mut p = pyrate();
        let mut term = Script::new(&[]);
        p.run_command("[0x40 r]", &mut term).unwrap();
        p.run_command("(0)", &mut term).unwrap();
        p.run_command("(3)", &mut term).unwrap();
        assert_eq!(
            term.out,
            "0. Macro menu\nUnknown macro, try ? or (0) for help\n"
        );
    }
}
