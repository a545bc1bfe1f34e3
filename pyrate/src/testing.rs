//! Fakes shared by the unit tests: a scripted terminal, an in-memory serial
//! channel, and a board whose peripherals record what they were asked to do.

use crate::board::{Board, PinId, PinSet, Probe, Unavailable, UserPin};
use crate::bus::{BusError, BusLock, I2cBus, OneWireBus, Rom, SpiBus, UartPort};
use crate::console::{Line, Terminal};
use crate::low::Channel;
use crate::{spi, uart, Error};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use embedded_hal::serial;

/// The error of the fake serial halves: the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

pub type Sent = Rc<RefCell<Vec<u8>>>;

pub struct FakeTx {
    sent: Sent,
}

impl serial::Write<u8> for FakeTx {
    type Error = Disconnected;

    fn write(&mut self, word: u8) -> nb::Result<(), Disconnected> {
        self.sent.borrow_mut().push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Disconnected> {
        Ok(())
    }
}

pub struct FakeRx {
    input: VecDeque<u8>,
}

impl serial::Read<u8> for FakeRx {
    type Error = Disconnected;

    fn read(&mut self) -> nb::Result<u8, Disconnected> {
        self.input.pop_front().ok_or(nb::Error::Other(Disconnected))
    }
}

/// `serial_pair` returns a channel that reads `input` and then fails, and a
/// handle on everything written to it.
pub fn serial_pair(input: &[u8]) -> (Channel<FakeTx, FakeRx>, Sent) {
    let sent = Sent::default();
    let ch = Channel::new(
        FakeTx { sent: sent.clone() },
        FakeRx {
            input: input.iter().copied().collect(),
        },
    );
    (ch, sent)
}

/// `Script` is a terminal that answers prompts from a list and fails once
/// the list runs out.
pub struct Script {
    lines: VecDeque<Line>,
    keys: VecDeque<Option<u8>>,
    pub out: String,
    pub raw: Vec<u8>,
}

impl Script {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| Line::Text(String::from(*l))).collect(),
            keys: VecDeque::new(),
            out: String::new(),
            raw: Vec::new(),
        }
    }

    pub fn mode_switch(mut self) -> Self {
        self.lines.push_back(Line::ModeSwitch);
        self
    }

    pub fn with_keys(mut self, keys: &[Option<u8>]) -> Self {
        self.keys.extend(keys.iter().copied());
        self
    }
}

impl fmt::Write for Script {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

impl Terminal for Script {
    fn read_line(&mut self, _prompt: &str) -> Result<Line, Error> {
        self.lines.pop_front().ok_or(Error::Link)
    }

    fn poll_key(&mut self) -> Result<Option<u8>, Error> {
        self.keys.pop_front().ok_or(Error::Link)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.raw.extend_from_slice(bytes);
        Ok(())
    }
}

/// `State` is everything the fake board's rails, pins and peripherals have
/// been told.
#[derive(Debug, Default)]
pub struct State {
    pub power: bool,
    pub pullups: bool,
    pub mode_led: bool,
    pub levels: BTreeMap<&'static str, bool>,
    pub claimed: Vec<&'static str>,
    /// Pins whose output drivers fail.
    pub broken: Vec<&'static str>,
    pub i2c_log: Vec<String>,
    pub i2c_hz: Option<u32>,
    pub spi_log: Vec<Vec<u8>>,
    pub spi_hz: Option<u32>,
    pub spi_config: Option<spi::Config>,
    pub uart_tx: Vec<u8>,
    pub uart_rx: VecDeque<u8>,
    pub uart_config: Option<uart::Config>,
}

pub type Wiring = Rc<RefCell<State>>;

pub struct FakeBoard {
    pub wiring: Wiring,
    pub hardware: bool,
    pub uart_available: bool,
    pub i2c_devices: Vec<u8>,
    pub onewire_roms: Vec<Rom>,
    pins: PinSet,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self {
            wiring: Wiring::default(),
            hardware: true,
            uart_available: true,
            i2c_devices: Vec::new(),
            onewire_roms: Vec::new(),
            pins: PinSet {
                mosi: PinId("MOSI"),
                clock: PinId("CLK"),
                miso: PinId("MISO"),
                cs: PinId("CS"),
                aux: PinId("AUX"),
                scl: None,
                sda: None,
            },
        }
    }

    pub fn with_i2c_header() -> Self {
        let mut board = Self::new();
        board.pins.scl = Some(PinId("SCL"));
        board.pins.sda = Some(PinId("SDA"));
        board
    }
}

impl Board for FakeBoard {
    type I2c = FakeI2c;
    type SoftI2c = FakeI2c;
    type Spi = FakeSpi;
    type SoftSpi = FakeSpi;
    type Uart = FakeUart;
    type OneWire = FakeOneWire;
    type Pin = FakePin;

    fn name(&self) -> &str {
        "fake"
    }

    fn pins(&self) -> PinSet {
        self.pins
    }

    fn i2c(&mut self, scl: PinId, sda: PinId, hz: u32) -> Result<FakeI2c, Unavailable> {
        if !self.hardware {
            return Err(Unavailable::NoHardware);
        }
        self.soft_i2c(scl, sda, hz)
    }

    fn soft_i2c(&mut self, _scl: PinId, _sda: PinId, hz: u32) -> Result<FakeI2c, Unavailable> {
        self.wiring.borrow_mut().i2c_hz = Some(hz);
        Ok(FakeI2c::new(self.wiring.clone(), &self.i2c_devices))
    }

    fn spi(&mut self, clock: PinId, mosi: PinId, miso: PinId) -> Result<FakeSpi, Unavailable> {
        if !self.hardware {
            return Err(Unavailable::NoHardware);
        }
        self.soft_spi(clock, mosi, miso)
    }

    fn soft_spi(&mut self, _: PinId, _: PinId, _: PinId) -> Result<FakeSpi, Unavailable> {
        Ok(FakeSpi {
            wiring: self.wiring.clone(),
            locked: false,
        })
    }

    fn uart(&mut self, _: PinId, _: PinId, config: &uart::Config) -> Result<FakeUart, Unavailable> {
        if !self.uart_available {
            return Err(Unavailable::NoHardware);
        }
        self.wiring.borrow_mut().uart_config = Some(*config);
        Ok(FakeUart {
            wiring: self.wiring.clone(),
        })
    }

    fn onewire(&mut self, _pin: PinId) -> Result<FakeOneWire, Unavailable> {
        Ok(FakeOneWire::new(&self.onewire_roms))
    }

    fn pin(&mut self, id: PinId) -> Result<FakePin, Unavailable> {
        let mut wiring = self.wiring.borrow_mut();
        if wiring.claimed.contains(&id.0) {
            return Err(Unavailable::PinBusy(id));
        }
        wiring.claimed.push(id.0);
        Ok(FakePin {
            name: id.0,
            wiring: self.wiring.clone(),
        })
    }

    fn set_power(&mut self, on: bool) {
        self.wiring.borrow_mut().power = on;
    }

    fn set_pullups(&mut self, on: bool) {
        self.wiring.borrow_mut().pullups = on;
    }

    fn set_mode_led(&mut self, on: bool) {
        self.wiring.borrow_mut().mode_led = on;
    }

    fn voltage(&mut self, probe: Probe) -> f32 {
        let power = self.wiring.borrow().power;
        match probe {
            Probe::V3 if power => 3.3,
            Probe::V5 if power => 5.0,
            _ => 0.0,
        }
    }

    fn delay_ms(&mut self, _ms: u32) {}
}

/// `FakePin` releases its claim when dropped.
pub struct FakePin {
    name: &'static str,
    wiring: Wiring,
}

impl UserPin for FakePin {
    fn set_output(&mut self, high: bool) -> Result<(), BusError> {
        let mut wiring = self.wiring.borrow_mut();
        if wiring.broken.contains(&self.name) {
            return Err(BusError::Fault);
        }
        wiring.levels.insert(self.name, high);
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, BusError> {
        Ok(self.wiring.borrow().levels.get(self.name).copied().unwrap_or(false))
    }
}

impl Drop for FakePin {
    fn drop(&mut self) {
        self.wiring.borrow_mut().claimed.retain(|name| *name != self.name);
    }
}

fn hex(bytes: &[u8]) -> String {
    let parts: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    parts.join(" ")
}

/// `FakeI2c` acknowledges the listed addresses. Reads return `0xA0`,
/// `0xA1` and so on. Successful transfers are logged, except the empty
/// writes of an address scan.
pub struct FakeI2c {
    wiring: Wiring,
    devices: Vec<u8>,
    locked: bool,
}

impl FakeI2c {
    pub fn new(wiring: Wiring, devices: &[u8]) -> Self {
        Self {
            wiring,
            devices: devices.to_vec(),
            locked: false,
        }
    }

    fn present(&self, address: u8) -> Result<(), BusError> {
        if self.devices.contains(&address) {
            Ok(())
        } else {
            Err(BusError::Nack)
        }
    }

    fn log(&self, entry: String) {
        self.wiring.borrow_mut().i2c_log.push(entry);
    }
}

fn fill(buffer: &mut [u8]) {
    for (i, b) in buffer.iter_mut().enumerate() {
        *b = 0xA0u8.wrapping_add(i as u8);
    }
}

impl BusLock for FakeI2c {
    fn try_lock(&mut self) -> bool {
        !core::mem::replace(&mut self.locked, true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

impl I2cBus for FakeI2c {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        self.wiring.borrow_mut().i2c_hz = Some(hz);
        Ok(())
    }

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.present(address)?;
        if !bytes.is_empty() {
            self.log(format!("W {:02X}: {}", address, hex(bytes)));
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        self.present(address)?;
        fill(buffer);
        self.log(format!("R {:02X}: {}", address, buffer.len()));
        Ok(())
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError> {
        self.present(address)?;
        fill(buffer);
        self.log(format!("WR {:02X}: {} -> {}", address, hex(bytes), buffer.len()));
        Ok(())
    }
}

/// `FakeSpi` is a loopback: every transfer reads back what it sent.
pub struct FakeSpi {
    wiring: Wiring,
    locked: bool,
}

impl BusLock for FakeSpi {
    fn try_lock(&mut self) -> bool {
        !core::mem::replace(&mut self.locked, true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

impl SpiBus for FakeSpi {
    fn configure(&mut self, config: &spi::Config) -> Result<(), BusError> {
        let mut wiring = self.wiring.borrow_mut();
        wiring.spi_hz = Some(config.speed.hz());
        wiring.spi_config = Some(*config);
        Ok(())
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        self.wiring.borrow_mut().spi_log.push(words.to_vec());
        Ok(())
    }
}

/// `FakeUart` transmits into `State::uart_tx` and receives from
/// `State::uart_rx`.
pub struct FakeUart {
    wiring: Wiring,
}

impl UartPort for FakeUart {
    fn configure(&mut self, config: &uart::Config) -> Result<(), BusError> {
        self.wiring.borrow_mut().uart_config = Some(*config);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.wiring.borrow_mut().uart_tx.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let mut wiring = self.wiring.borrow_mut();
        let mut n = 0;
        for slot in buffer.iter_mut() {
            match wiring.uart_rx.pop_front() {
                Some(b) => *slot = b,
                None => break,
            }
            n += 1;
        }
        n
    }

    fn available(&self) -> usize {
        self.wiring.borrow().uart_rx.len()
    }

    fn clear_input(&mut self) {
        self.wiring.borrow_mut().uart_rx.clear();
    }
}

/// `FakeOneWire` answers resets when it has devices, replies to READ ROM
/// with the first device's ROM and reads `0xFF` otherwise.
pub struct FakeOneWire {
    pub roms: Vec<Rom>,
    pub log: Rc<RefCell<Vec<u8>>>,
    pending: VecDeque<u8>,
}

impl FakeOneWire {
    pub fn new(roms: &[Rom]) -> Self {
        Self {
            roms: roms.to_vec(),
            log: Rc::default(),
            pending: VecDeque::new(),
        }
    }
}

impl OneWireBus for FakeOneWire {
    fn reset(&mut self) -> Result<bool, BusError> {
        self.pending.clear();
        Ok(!self.roms.is_empty())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.log.borrow_mut().extend_from_slice(bytes);
        if bytes == [0x33] {
            if let Some(rom) = self.roms.first() {
                self.pending.extend(rom.iter().copied());
            }
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        for b in buffer.iter_mut() {
            *b = self.pending.pop_front().unwrap_or(0xFF);
        }
        Ok(())
    }

    fn search(&mut self) -> Result<Vec<Rom>, BusError> {
        Ok(self.roms.clone())
    }
}
