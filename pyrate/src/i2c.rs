//! Module `i2c` is the interactive I2C mode.
//!
//! A command line is split into groups, each running from a start to the
//! next stop. The first byte of a group is the address byte; its low bit
//! picks the direction. A second start inside the group turns it into a
//! write-then-read with a repeated start:
//!
//! ```text
//! [0xA0 0x00 [0xA1 r:4]
//! ```
//!
//! Every group becomes exactly one bus transaction.

use crate::action::Action;
use crate::board::{claim_i2c, Board, Peripheral, PinId};
use crate::bus::I2cBus;
use crate::console::{select_option, Terminal};
use crate::macros::MacroTable;
use crate::mode::{Capabilities, Mode};
use crate::Error;
use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;

pub const NAME: &str = "I2C";
pub const CAPABILITIES: Capabilities = Capabilities::PULLUPS;

/// Bus speeds offered by the speed menu, in kHz.
pub const SPEEDS_KHZ: [u32; 4] = [5, 50, 100, 400];

#[derive(Debug, Clone, Copy)]
enum Macro {
    AddressSearch,
}

pub struct I2c<I: I2cBus> {
    bus: I,
    macros: MacroTable<Macro>,
}

pub fn build<B: Board>(board: &mut B, term: &mut dyn Terminal) -> Result<Box<dyn Mode>, Error> {
    let pins = board.pins();
    let (mut scl, mut sda) = (pins.clock, pins.mosi);
    if let (Some(alt_scl), Some(alt_sda)) = (pins.scl, pins.sda) {
        let options = [
            format!("{}/{}", pins.clock, pins.mosi),
            format!("{}/{}", alt_scl, alt_sda),
        ];
        if select_option(term, "I2C pinout:", &options, 0)? == 1 {
            scl = alt_scl;
            sda = alt_sda;
        }
    }

    let speed = select_option(term, "Set speed:", &["~5KHz", "~50KHz", "~100KHz", "~400KHz"], 0)?;
    let hz = SPEEDS_KHZ[speed] * 1000;

    let bus = match claim_i2c(board, scl, sda, hz)? {
        Peripheral::Hardware(bus) => {
            if select_option(term, "I2C mode:", &["Software", "Hardware"], 0)? == 0 {
                drop(bus);
                Peripheral::Bitbang(board.soft_i2c(scl, sda, hz)?)
            } else {
                Peripheral::Hardware(bus)
            }
        }
        bitbang => bitbang,
    };
    Ok(Box::new(I2c::new(bus)))
}

impl<I: I2cBus> I2c<I> {
    pub fn new(bus: I) -> Self {
        let mut macros = MacroTable::new();
        macros.register(1, "7bit address search", Macro::AddressSearch);
        Self { bus, macros }
    }

    fn scan(&mut self, term: &mut dyn Terminal) -> Result<(), Error> {
        if !self.bus.try_lock() {
            return Ok(());
        }
        let found = self.bus.scan();
        self.bus.unlock();

        writeln!(term, "Searching I2C address space. Found devices at:")?;
        let mut space = "";
        for address in found {
            writeln!(term, "{}0x{:02X}(0x{:02X} W)", space, address << 1, address)?;
            space = " ";
        }
        Ok(())
    }

    /// `execute` runs one planned group. It returns `false` when the bus
    /// could not be locked.
    fn execute(
        &mut self,
        group: &Group<'_>,
        term: &mut dyn Terminal,
    ) -> Result<bool, Error> {
        let writes = group.write_buffer();
        let mut reads = alloc::vec![0u8; group.read_len()];

        if !self.bus.try_lock() {
            return Ok(false);
        }
        let started = writeln!(term, "I2C START BIT");
        let result = if reads.is_empty() {
            self.bus.write(group.device, &writes)
        } else if writes.is_empty() {
            self.bus.read(group.device, &mut reads)
        } else {
            self.bus.write_read(group.device, &writes, &mut reads)
        };
        self.bus.unlock();
        started?;

        if let Err(err) = result {
            log::debug!("address 0x{:02X}: {}", group.device, err);
            writeln!(term, "WRITE 0x{:02X} NACK", group.address)?;
            writeln!(term, "I2C STOP BIT")?;
            return Ok(true);
        }

        writeln!(term, "WRITE 0x{:02X} ACK", group.address)?;
        print_runs(term, "WRITE", group.writes, &writes)?;
        if let Some(second) = group.repeated_address {
            writeln!(term, "I2C START BIT")?;
            writeln!(term, "WRITE 0x{:02X} ACK", second)?;
        }
        print_runs(term, "READ", group.reads, &reads)?;
        writeln!(term, "I2C STOP BIT")?;
        Ok(true)
    }
}

/// `Group` is one start-to-stop transaction, checked and split into its
/// write and read parts.
struct Group<'a> {
    /// The address byte as typed, direction bit included.
    address: u8,
    device: u8,
    repeated_address: Option<u8>,
    writes: &'a [Action],
    reads: &'a [Action],
}

impl<'a> Group<'a> {
    /// `plan` checks the actions between a start and its stop. The error is
    /// the message to show the user.
    fn plan(actions: &'a [Action]) -> Result<Self, &'static str> {
        let address = match actions.first() {
            Some(Action::Write { value, repeat: 1 }) => *value,
            _ => return Err("Address not single byte write"),
        };
        let device = address >> 1;
        let body = &actions[1..];

        let restart = body.iter().position(|a| *a == Action::Start);
        let (writes, reads, repeated_address) = match restart {
            Some(i) => {
                if address & 1 == 1 {
                    return Err("First address must be write with repeated start");
                }
                let second = match body.get(i + 1) {
                    Some(Action::Write { value, repeat: 1 }) if value & 1 == 1 => *value,
                    _ => return Err("Second address must be read with repeat 1"),
                };
                if second >> 1 != device {
                    return Err("Addresses don't match");
                }
                (&body[..i], &body[i + 2..], Some(second))
            }
            None if address & 1 == 0 => (body, &body[..0], None),
            None => (&body[..0], body, None),
        };

        Ok(Self {
            address,
            device,
            repeated_address,
            writes,
            reads,
        })
    }

    fn write_buffer(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        for action in self.writes {
            if let Action::Write { value, repeat } = *action {
                buffer.extend(core::iter::repeat(value).take(usize::from(repeat)));
            }
        }
        buffer
    }

    fn read_len(&self) -> usize {
        self.reads
            .iter()
            .filter(|action| matches!(action, Action::Read { .. }))
            .map(|action| usize::from(action.repeat()))
            .sum()
    }
}

/// `print_runs` writes the transcript of the write or read runs in
/// `actions`, taking the bytes from `data` in order.
fn print_runs(
    term: &mut dyn Terminal,
    verb: &str,
    actions: &[Action],
    data: &[u8],
) -> Result<(), Error> {
    let mut bytes = data.iter();
    for action in actions {
        let repeat = match (*action, verb) {
            (Action::Write { repeat, .. }, "WRITE") | (Action::Read { repeat }, "READ") => repeat,
            _ => continue,
        };
        if repeat == 1 {
            if let Some(b) = bytes.next() {
                writeln!(term, "{} 0x{:02X} ACK", verb, b)?;
            }
            continue;
        }
        writeln!(term, "{} 0x{:02X} BYTES:", verb, repeat)?;
        let mut space = "";
        for b in bytes.by_ref().take(usize::from(repeat)) {
            write!(term, "{}0x{:02X} ACK", space, b)?;
            space = " ";
        }
        writeln!(term)?;
    }
    Ok(())
}

impl<I: I2cBus + 'static> Mode for I2c<I> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run_sequence(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error> {
        let mut next = 0;
        while actions.get(next) == Some(&Action::Start) {
            let start = next;
            let stop = match actions[start + 1..].iter().position(|a| *a == Action::Stop) {
                Some(i) => start + 1 + i,
                None => {
                    log::warn!("I2C group without stop");
                    writeln!(term, "Missing stop")?;
                    break;
                }
            };
            next = stop + 1;

            match Group::plan(&actions[start + 1..stop]) {
                Ok(group) => {
                    if !self.execute(&group, term)? {
                        return Ok(());
                    }
                }
                Err(message) => {
                    log::warn!("rejected I2C group: {}", message);
                    writeln!(term, "{}", message)?;
                }
            }
        }
        Ok(())
    }

    fn run_macro(&mut self, key: u8, term: &mut dyn Terminal) -> Result<(), Error> {
        match self.macros.resolve(key, term)? {
            Some(Macro::AddressSearch) => self.scan(term),
            None => Ok(()),
        }
    }

    fn pin_functions(&self) -> &'static str {
        "SCL     SDA     -       -"
    }
}

/// `default_pins` returns the SCL and SDA pins used when no menu is shown.
pub fn default_pins<B: Board>(board: &B) -> (PinId, PinId) {
    let pins = board.pins();
    match (pins.scl, pins.sda) {
        (Some(scl), Some(sda)) => (scl, sda),
        _ => (pins.clock, pins.mosi),
    }
}
