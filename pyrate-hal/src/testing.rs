//! Simulated wires for the bit-banged bus tests.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

pub struct NoDelay;

impl DelayUs<u32> for NoDelay {
    fn delay_us(&mut self, _us: u32) {}
}

struct WireState {
    level: bool,
    rising_edges: usize,
}

/// `Wire` is a push-pull line: whatever was last driven reads back.
#[derive(Clone)]
pub struct Wire(Rc<RefCell<WireState>>);

impl Wire {
    pub fn new(level: bool) -> Self {
        Wire(Rc::new(RefCell::new(WireState {
            level,
            rising_edges: 0,
        })))
    }

    pub fn level(&self) -> bool {
        self.0.borrow().level
    }

    pub fn rising_edges(&self) -> usize {
        self.0.borrow().rising_edges
    }

    fn drive(&self, level: bool) {
        let mut state = self.0.borrow_mut();
        if level && !state.level {
            state.rising_edges += 1;
        }
        state.level = level;
    }
}

impl OutputPin for Wire {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

impl InputPin for Wire {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.level())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.level())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Receiving { address: bool },
    Sending,
}

/// `Target` is an I2C target that acknowledges one address, records what
/// it is sent and answers reads from a queue.
struct Target {
    address: Option<u8>,
    phase: Phase,
    clocks: u8,
    shift: u8,
    reading: bool,
    outgoing: VecDeque<u8>,
    current: u8,
    master_acked: bool,
    received: Vec<u8>,
    pulls_low: bool,
}

impl Target {
    fn start(&mut self) {
        self.phase = Phase::Receiving { address: true };
        self.clocks = 0;
        self.shift = 0;
        self.pulls_low = false;
    }

    fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.pulls_low = false;
    }

    fn rising(&mut self, sda: bool) {
        if self.phase == Phase::Idle {
            return;
        }
        self.clocks += 1;
        match self.phase {
            Phase::Receiving { .. } if self.clocks <= 8 => {
                self.shift = (self.shift << 1) | sda as u8;
            }
            Phase::Sending if self.clocks == 9 => self.master_acked = !sda,
            _ => {}
        }
    }

    fn falling(&mut self) {
        match (self.phase, self.clocks) {
            (Phase::Receiving { address: true }, 8) => {
                if Some(self.shift >> 1) == self.address {
                    self.reading = self.shift & 1 != 0;
                    self.pulls_low = true;
                } else {
                    self.stop();
                }
            }
            (Phase::Receiving { address: false }, 8) => {
                self.received.push(self.shift);
                self.pulls_low = true;
            }
            (Phase::Receiving { address }, 9) => {
                self.pulls_low = false;
                self.clocks = 0;
                self.shift = 0;
                if address && self.reading {
                    self.phase = Phase::Sending;
                    self.load();
                } else {
                    self.phase = Phase::Receiving { address: false };
                }
            }
            (Phase::Sending, 8) => self.pulls_low = false,
            (Phase::Sending, 9) => {
                self.clocks = 0;
                if self.master_acked {
                    self.load();
                } else {
                    self.stop();
                }
            }
            (Phase::Sending, n) if n < 8 => self.drive_bit(7 - n),
            _ => {}
        }
    }

    fn load(&mut self) {
        self.current = self.outgoing.pop_front().unwrap_or(0xFF);
        self.drive_bit(7);
    }

    fn drive_bit(&mut self, bit: u8) {
        self.pulls_low = (self.current >> bit) & 1 == 0;
    }
}

struct Lines {
    scl: bool,
    sda: bool,
    target: Target,
}

impl Lines {
    /// `levels` returns what is actually on the wires: SCL and SDA.
    fn levels(&self) -> (bool, bool) {
        (self.scl, self.sda && !self.target.pulls_low)
    }

    fn drive(&mut self, line: Line, level: bool) {
        let (scl_before, sda_before) = self.levels();
        match line {
            Line::Scl => self.scl = level,
            Line::Sda => self.sda = level,
        }
        let (scl, sda) = self.levels();
        if scl != scl_before {
            if scl {
                self.target.rising(sda);
            } else {
                self.target.falling();
            }
        } else if scl && sda != sda_before {
            if sda {
                self.target.stop();
            } else {
                self.target.start();
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Line {
    Scl,
    Sda,
}

/// `I2cLines` is a pair of pulled-up I2C lines with at most one target on
/// them.
pub struct I2cLines(Rc<RefCell<Lines>>);

impl I2cLines {
    pub fn new(address: Option<u8>, outgoing: &[u8]) -> Self {
        I2cLines(Rc::new(RefCell::new(Lines {
            scl: true,
            sda: true,
            target: Target {
                address,
                phase: Phase::Idle,
                clocks: 0,
                shift: 0,
                reading: false,
                outgoing: outgoing.iter().copied().collect(),
                current: 0xFF,
                master_acked: false,
                received: Vec::new(),
                pulls_low: false,
            },
        })))
    }

    pub fn scl(&self) -> I2cPin {
        I2cPin {
            lines: self.0.clone(),
            line: Line::Scl,
        }
    }

    pub fn sda(&self) -> I2cPin {
        I2cPin {
            lines: self.0.clone(),
            line: Line::Sda,
        }
    }

    pub fn received(&self) -> Vec<u8> {
        self.0.borrow().target.received.clone()
    }

    /// `is_idle` reports whether the last transaction ended with a stop and
    /// both lines are released.
    pub fn is_idle(&self) -> bool {
        let lines = self.0.borrow();
        lines.target.phase == Phase::Idle && lines.levels() == (true, true)
    }
}

pub struct I2cPin {
    lines: Rc<RefCell<Lines>>,
    line: Line,
}

impl OutputPin for I2cPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.lines.borrow_mut().drive(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.lines.borrow_mut().drive(self.line, true);
        Ok(())
    }
}

impl InputPin for I2cPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        let (scl, sda) = self.lines.borrow().levels();
        Ok(match self.line {
            Line::Scl => scl,
            Line::Sda => sda,
        })
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Command { bits: u8, shift: u8 },
    ReadRom { bit: u8 },
    Search { bit: u8, step: u8 },
    Idle,
}

/// `Slaves` are the 1-Wire devices on a simulated line, answering reset,
/// Read ROM and Search ROM in real time.
struct Slaves {
    now: u64,
    master_low: bool,
    fell_at: u64,
    presence: Option<(u64, u64)>,
    hold_until: u64,
    roms: Vec<[u8; 8]>,
    active: Vec<bool>,
    protocol: Protocol,
    received: Vec<u8>,
}

fn rom_bit(rom: &[u8; 8], bit: u8) -> bool {
    (rom[(bit / 8) as usize] >> (bit % 8)) & 1 != 0
}

impl Slaves {
    fn level(&self) -> bool {
        let presence = self
            .presence
            .map_or(false, |(from, to)| self.now >= from && self.now < to);
        !(self.master_low || presence || self.now < self.hold_until)
    }

    /// `wired_and` is what the active devices put on the line together when
    /// each sends `bit_of(rom)`.
    fn wired_and(&self, bit_of: impl Fn(&[u8; 8]) -> bool) -> bool {
        self.roms
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .all(|(rom, _)| bit_of(rom))
    }

    fn sending(&self) -> Option<bool> {
        match self.protocol {
            Protocol::ReadRom { bit } => Some(self.wired_and(|rom| rom_bit(rom, bit))),
            Protocol::Search { bit, step: 0 } => Some(self.wired_and(|rom| rom_bit(rom, bit))),
            Protocol::Search { bit, step: 1 } => Some(self.wired_and(|rom| !rom_bit(rom, bit))),
            _ => None,
        }
    }

    fn fall(&mut self) {
        self.master_low = true;
        self.fell_at = self.now;
        if self.sending() == Some(false) {
            self.hold_until = self.now + 30;
        }
    }

    fn release(&mut self) {
        self.master_low = false;
        let low_for = self.now - self.fell_at;
        if low_for >= 480 {
            self.presence = if self.roms.is_empty() {
                None
            } else {
                Some((self.now + 15, self.now + 135))
            };
            self.active = self.roms.iter().map(|_| true).collect();
            self.protocol = Protocol::Command { bits: 0, shift: 0 };
            return;
        }
        let written = low_for < 15;
        self.protocol = match self.protocol {
            Protocol::Command { bits, shift } => {
                let shift = (shift >> 1) | ((written as u8) << 7);
                if bits < 7 {
                    Protocol::Command {
                        bits: bits + 1,
                        shift,
                    }
                } else {
                    match shift {
                        0x33 => Protocol::ReadRom { bit: 0 },
                        0xF0 => Protocol::Search { bit: 0, step: 0 },
                        other => {
                            self.received.push(other);
                            Protocol::Command { bits: 0, shift: 0 }
                        }
                    }
                }
            }
            Protocol::ReadRom { bit: 63 } => Protocol::Idle,
            Protocol::ReadRom { bit } => Protocol::ReadRom { bit: bit + 1 },
            Protocol::Search { bit, step: 2 } => {
                for (rom, active) in self.roms.iter().zip(self.active.iter_mut()) {
                    if rom_bit(rom, bit) != written {
                        *active = false;
                    }
                }
                if bit == 63 {
                    Protocol::Idle
                } else {
                    Protocol::Search {
                        bit: bit + 1,
                        step: 0,
                    }
                }
            }
            Protocol::Search { bit, step } => Protocol::Search {
                bit,
                step: step + 1,
            },
            Protocol::Idle => Protocol::Idle,
        };
    }
}

/// `OneWireLine` is a pulled-up 1-Wire line with devices on it. Time only
/// passes through the line's `Clock`.
pub struct OneWireLine(Rc<RefCell<Slaves>>);

impl OneWireLine {
    pub fn new(roms: &[[u8; 8]]) -> Self {
        OneWireLine(Rc::new(RefCell::new(Slaves {
            now: 0,
            master_low: false,
            fell_at: 0,
            presence: None,
            hold_until: 0,
            roms: roms.to_vec(),
            active: roms.iter().map(|_| true).collect(),
            protocol: Protocol::Idle,
            received: Vec::new(),
        })))
    }

    pub fn pin(&self) -> OneWirePin {
        OneWirePin(self.0.clone())
    }

    pub fn clock(&self) -> Clock {
        Clock(self.0.clone())
    }

    /// `received` returns the command bytes the devices did not recognize.
    pub fn received(&self) -> Vec<u8> {
        self.0.borrow().received.clone()
    }

    pub fn is_released(&self) -> bool {
        self.0.borrow().level()
    }
}

pub struct OneWirePin(Rc<RefCell<Slaves>>);

impl OutputPin for OneWirePin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut slaves = self.0.borrow_mut();
        if !slaves.master_low {
            slaves.fall();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut slaves = self.0.borrow_mut();
        if slaves.master_low {
            slaves.release();
        }
        Ok(())
    }
}

impl InputPin for OneWirePin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().level())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().level())
    }
}

pub struct Clock(Rc<RefCell<Slaves>>);

impl DelayUs<u32> for Clock {
    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().now += u64::from(us);
    }
}
