//! Module `onewire` is the interactive 1-Wire mode.
//!
//! Besides raw reset/write/read sequences, the mode offers ROM command
//! macros. A ROM search turns every device it finds into a numbered macro
//! that addresses that device.

use crate::action::Action;
use crate::board::Board;
use crate::bus::{OneWireBus, Rom};
use crate::console::{print_bytes, Terminal};
use crate::macros::MacroTable;
use crate::mode::{Capabilities, Mode};
use crate::Error;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

pub const NAME: &str = "1-WIRE";
pub const CAPABILITIES: Capabilities = Capabilities::PULLUPS.union(Capabilities::PIN_DIRECTIONS);

const READ_ROM: u8 = 0x33;
const SKIP_ROM: u8 = 0xCC;

/// Highest macro number handed out to devices found by a search.
const DEVICE_MACROS: u8 = 50;

const KNOWN_DEVICES: [(u8, &str); 5] = [
    (0x10, "DS18S20 High Prec Dig Therm"),
    (0x28, "DS18B20 Prog Res Dig Therm"),
    (0x22, "DS1822 Econo Dig Therm"),
    (0x04, "DS2404 EconoRAM time Chip"),
    (0x2D, "DS2431 1K EEPROM"),
];

/// `device_name` names a device by its family code.
pub fn device_name(family: u8) -> &'static str {
    KNOWN_DEVICES
        .iter()
        .find(|(code, _)| *code == family)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown device")
}

fn format_rom(rom: &Rom) -> String {
    let mut text = String::new();
    for (i, b) in rom.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&format!("0x{:02X}", b));
    }
    text
}

#[derive(Debug, Clone, Copy)]
enum Macro {
    ReadRom,
    SkipRom,
    SearchRom,
    Device(usize),
}

pub struct OneWire<W: OneWireBus> {
    bus: W,
    macros: MacroTable<Macro>,
    devices: Vec<Rom>,
}

pub fn build<B: Board>(board: &mut B, _term: &mut dyn Terminal) -> Result<Box<dyn Mode>, Error> {
    let pin = board.pins().mosi;
    Ok(Box::new(OneWire::new(board.onewire(pin)?)))
}

impl<W: OneWireBus> OneWire<W> {
    pub fn new(bus: W) -> Self {
        let mut macros = MacroTable::new();
        macros.register(51, "READ ROM (0x33) *for single device bus", Macro::ReadRom);
        macros.register(204, "SKIP ROM (0xCC) *followed by command", Macro::SkipRom);
        macros.register(240, "SEARCH ROM (0xF0)", Macro::SearchRom);
        Self {
            bus,
            macros,
            devices: Vec::new(),
        }
    }

    fn reset(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        if self.bus.reset()? {
            writeln!(term, "BUS RESET  OK")?;
        } else {
            writeln!(term, "BUS RESET  NO DEVICE")?;
        }
        Ok(())
    }

    fn read_rom(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        self.reset(term)?;
        self.bus.write(&[READ_ROM])?;
        let mut rom: Rom = [0; 8];
        self.bus.read(&mut rom)?;
        print_bytes(term, "READ ROM (0x33):", &rom)?;
        writeln!(term, "{}", device_name(rom[0]))?;
        Ok(())
    }

    fn skip_rom(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        print_bytes(term, "WRITE:", &[SKIP_ROM])?;
        self.bus.write(&[SKIP_ROM])?;
        Ok(())
    }

    fn search_rom(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        let found = self.bus.search()?;
        for key in 1..=DEVICE_MACROS {
            self.macros.remove(key);
        }

        writeln!(term, "Macro    1WIRE address")?;
        for (i, rom) in found.iter().enumerate() {
            let formatted = format_rom(rom);
            let name = device_name(rom[0]);
            writeln!(term, " {}. {}", i + 1, formatted)?;
            writeln!(term, "{}", name)?;
            if i < usize::from(DEVICE_MACROS) {
                self.macros.register(
                    (i + 1) as u8,
                    format!("{}\n   {}", formatted, name),
                    Macro::Device(i),
                );
            }
        }
        self.devices = found;
        Ok(())
    }

    fn address_device(&mut self, index: usize, term: &mut dyn Terminal) -> Result<(), Error> {
        let rom = match self.devices.get(index) {
            Some(rom) => *rom,
            None => return Ok(()),
        };
        writeln!(term, "ADDRESS MACRO {}: {}", index + 1, format_rom(&rom))?;
        self.bus.write(&rom)?;
        Ok(())
    }
}

impl<W: OneWireBus + 'static> Mode for OneWire<W> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run_sequence(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error> {
        for action in actions {
            match *action {
                Action::Start => self.reset(term)?,
                Action::Write { value, repeat } => {
                    let buffer = vec![value; usize::from(repeat)];
                    print_bytes(term, "WRITE:", &buffer)?;
                    self.bus.write(&buffer)?;
                }
                Action::Read { repeat } => {
                    let mut buffer = vec![0u8; usize::from(repeat)];
                    self.bus.read(&mut buffer)?;
                    print_bytes(term, "READ:", &buffer)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_macro(&mut self, key: u8, term: &mut dyn Terminal) -> Result<(), Error> {
        match self.macros.resolve(key, term)? {
            Some(Macro::ReadRom) => self.read_rom(term),
            Some(Macro::SkipRom) => self.skip_rom(term),
            Some(Macro::SearchRom) => self.search_rom(term),
            Some(Macro::Device(index)) => self.address_device(index, term),
            None => Ok(()),
        }
    }

    fn pin_functions(&self) -> &'static str {
        "-       OWD     -       -"
    }
}
