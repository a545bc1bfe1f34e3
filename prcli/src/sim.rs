//! A simulated board with a few devices wired to its buses, for trying
//! the emulator without hardware.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::{i2c, spi};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::spi::{Mode, Phase, Polarity};
use pyrate::board::{Board, PinId, PinSet, Probe, Unavailable, UserPin};
use pyrate::bus::{BusError, OneWireBus, Rom, UartPort};
use pyrate::uart;
use pyrate_hal::{BitbangSpi, Hardware, Reconfigure};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;
use thiserror::Error;

const MOSI: PinId = PinId("MOSI");
const CLOCK: PinId = PinId("CLK");
const MISO: PinId = PinId("MISO");
const CS: PinId = PinId("CS");
const AUX: PinId = PinId("AUX");

const EEPROM_ADDRESS: u8 = 0x50;
const SENSOR_ADDRESS: u8 = 0x48;

const ROMS: [Rom; 2] = [
    [0x28, 0xFF, 0x4C, 0x1A, 0x61, 0x16, 0x03, 0x9E],
    [0x2D, 0x54, 0xD2, 0xEF, 0x00, 0x00, 0x00, 0x2B],
];

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no device at address 0x{0:02X}")]
    NoDevice(u8),
}

/// `Wires` is the electrical state shared by everything on the board.
#[derive(Default)]
struct Wires {
    power: bool,
    pullups: bool,
    driven: HashMap<&'static str, bool>,
    claimed: HashSet<&'static str>,
}

impl Wires {
    /// An undriven MISO follows MOSI, which is looped back to it. Any other
    /// undriven pin floats to the pull-ups.
    fn level(&self, pin: PinId) -> bool {
        match self.driven.get(pin.0) {
            Some(&level) => level,
            None if pin == MISO => self.driven.get(MOSI.0).copied().unwrap_or(false),
            None => self.pullups && self.power,
        }
    }
}

type Shared<T> = Rc<RefCell<T>>;

/// `SimBoard` exposes five pins with an I2C EEPROM and a temperature sensor,
/// MOSI looped back to MISO, a UART looped back to itself and two 1-Wire
/// devices.
pub struct SimBoard {
    wires: Shared<Wires>,
    devices: Shared<I2cDevices>,
    bitbang: bool,
}

impl SimBoard {
    /// With `bitbang` set the board claims to have no SPI or I2C
    /// controllers.
    pub fn new(bitbang: bool) -> Self {
        Self {
            wires: Rc::default(),
            devices: Rc::new(RefCell::new(I2cDevices::new())),
            bitbang,
        }
    }

    fn claim(&mut self, id: PinId) -> Result<SimPin, Unavailable> {
        if !self.wires.borrow_mut().claimed.insert(id.0) {
            return Err(Unavailable::PinBusy(id));
        }
        Ok(SimPin {
            id,
            wires: self.wires.clone(),
        })
    }
}

impl Board for SimBoard {
    type I2c = Hardware<SimI2c>;
    type SoftI2c = Hardware<SimI2c>;
    type Spi = Hardware<SimSpi>;
    type SoftSpi = BitbangSpi<SimPin, SimPin, SimPin, Settled>;
    type Uart = SimUart;
    type OneWire = SimOneWire;
    type Pin = SimPin;

    fn name(&self) -> &str {
        "simulator"
    }

    fn pins(&self) -> PinSet {
        PinSet {
            mosi: MOSI,
            clock: CLOCK,
            miso: MISO,
            cs: CS,
            aux: AUX,
            scl: None,
            sda: None,
        }
    }

    fn i2c(&mut self, scl: PinId, sda: PinId, hz: u32) -> Result<Self::I2c, Unavailable> {
        if self.bitbang {
            return Err(Unavailable::NoHardware);
        }
        self.soft_i2c(scl, sda, hz)
    }

    // The devices are modelled at transaction level, so there are no wires
    // to bit-bang.
    fn soft_i2c(&mut self, _scl: PinId, _sda: PinId, hz: u32) -> Result<Self::SoftI2c, Unavailable> {
        let mut bus = SimI2c {
            devices: self.devices.clone(),
            hz: 0,
        };
        bus.set_frequency(hz).map_err(|_| Unavailable::Unsupported)?;
        Ok(Hardware::new(bus))
    }

    fn spi(&mut self, _clock: PinId, _mosi: PinId, _miso: PinId) -> Result<Self::Spi, Unavailable> {
        if self.bitbang {
            return Err(Unavailable::NoHardware);
        }
        Ok(Hardware::new(SimSpi))
    }

    fn soft_spi(
        &mut self,
        clock: PinId,
        mosi: PinId,
        miso: PinId,
    ) -> Result<Self::SoftSpi, Unavailable> {
        let clock = self.claim(clock)?;
        let mosi = self.claim(mosi)?;
        let miso = self.claim(miso)?;
        Ok(BitbangSpi::new(clock, mosi, miso, Settled))
    }

    fn uart(
        &mut self,
        _tx: PinId,
        _rx: PinId,
        config: &uart::Config,
    ) -> Result<Self::Uart, Unavailable> {
        let mut port = SimUart::default();
        port.configure(config).map_err(|_| Unavailable::Unsupported)?;
        Ok(port)
    }

    fn onewire(&mut self, _pin: PinId) -> Result<Self::OneWire, Unavailable> {
        Ok(SimOneWire {
            roms: ROMS.to_vec(),
            pending: VecDeque::new(),
        })
    }

    fn pin(&mut self, id: PinId) -> Result<Self::Pin, Unavailable> {
        self.claim(id)
    }

    fn set_power(&mut self, on: bool) {
        log::info!("power supplies {}", if on { "on" } else { "off" });
        self.wires.borrow_mut().power = on;
    }

    fn set_pullups(&mut self, on: bool) {
        log::info!("pull-ups {}", if on { "on" } else { "off" });
        self.wires.borrow_mut().pullups = on;
    }

    fn set_mode_led(&mut self, on: bool) {
        log::debug!("mode LED {}", if on { "on" } else { "off" });
    }

    fn voltage(&mut self, probe: Probe) -> f32 {
        let wires = self.wires.borrow();
        match probe {
            Probe::V3 | Probe::Vpullup if wires.power => 3.3,
            Probe::V5 if wires.power => 5.0,
            Probe::Adc if wires.level(AUX) => 3.3,
            _ => 0.0,
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// `SimPin` is a board pin. Dropping it releases both the claim and
/// whatever level it was driving.
pub struct SimPin {
    id: PinId,
    wires: Shared<Wires>,
}

impl SimPin {
    fn drive(&self, high: bool) {
        self.wires.borrow_mut().driven.insert(self.id.0, high);
    }

    fn level(&self) -> bool {
        self.wires.borrow().level(self.id)
    }
}

impl Drop for SimPin {
    fn drop(&mut self) {
        let mut wires = self.wires.borrow_mut();
        wires.driven.remove(self.id.0);
        wires.claimed.remove(self.id.0);
    }
}

impl UserPin for SimPin {
    fn set_output(&mut self, high: bool) -> Result<(), BusError> {
        log::trace!("{} output {}", self.id, high as u8);
        self.drive(high);
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), BusError> {
        self.wires.borrow_mut().driven.remove(self.id.0);
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, BusError> {
        Ok(self.level())
    }
}

impl OutputPin for SimPin {
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

// MISO is read as an input while the bit-banged SPI bus owns it.
impl InputPin for SimPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.level())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.level())
    }
}

/// `Settled` is the delay of the bit-banged buses. Simulated wires settle
/// instantly.
pub struct Settled;

impl DelayUs<u32> for Settled {
    fn delay_us(&mut self, _us: u32) {}
}

/// `I2cDevice` is a simulated I2C target.
trait I2cDevice {
    fn write(&mut self, bytes: &[u8]);
    fn read(&mut self, buffer: &mut [u8]);
}

/// A 24xx02-style EEPROM: the first byte written sets the address, later
/// bytes are stored from there on.
struct Eeprom {
    memory: [u8; 256],
    pointer: u8,
}

impl I2cDevice for Eeprom {
    fn write(&mut self, bytes: &[u8]) {
        if let Some((&pointer, data)) = bytes.split_first() {
            self.pointer = pointer;
            for &b in data {
                self.memory[usize::from(self.pointer)] = b;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for b in buffer.iter_mut() {
            *b = self.memory[usize::from(self.pointer)];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// An LM75-style sensor stuck at 25.5°C. Register 0 is the temperature,
/// register 1 the configuration byte.
struct Thermometer {
    pointer: u8,
    config: u8,
}

impl I2cDevice for Thermometer {
    fn write(&mut self, bytes: &[u8]) {
        match bytes {
            [pointer] => self.pointer = *pointer,
            [1, config, ..] => {
                self.pointer = 1;
                self.config = *config;
            }
            [pointer, ..] => self.pointer = *pointer,
            [] => {}
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        let register: &[u8] = match self.pointer {
            0 => &[0x19, 0x80],
            1 => core::slice::from_ref(&self.config),
            _ => &[0x00],
        };
        for (b, value) in buffer.iter_mut().zip(register.iter().cycle()) {
            *b = *value;
        }
    }
}

struct I2cDevices(Vec<(u8, Box<dyn I2cDevice>)>);

impl I2cDevices {
    fn new() -> Self {
        I2cDevices(vec![
            (
                EEPROM_ADDRESS,
                Box::new(Eeprom {
                    memory: [0xFF; 256],
                    pointer: 0,
                }),
            ),
            (
                SENSOR_ADDRESS,
                Box::new(Thermometer {
                    pointer: 0,
                    config: 0,
                }),
            ),
        ])
    }

    fn get(&mut self, address: u8) -> Result<&mut Box<dyn I2cDevice>, SimError> {
        self.0
            .iter_mut()
            .find(|(a, _)| *a == address)
            .map(|(_, device)| device)
            .ok_or(SimError::NoDevice(address))
    }
}

/// `SimI2c` is the board's I2C controller.
pub struct SimI2c {
    devices: Shared<I2cDevices>,
    hz: u32,
}

impl Reconfigure for SimI2c {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        log::debug!("I2C clock {} -> {} Hz", self.hz, hz);
        self.hz = hz;
        Ok(())
    }
}

impl i2c::Write for SimI2c {
    type Error = SimError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), SimError> {
        self.devices.borrow_mut().get(address)?.write(bytes);
        Ok(())
    }
}

impl i2c::Read for SimI2c {
    type Error = SimError;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), SimError> {
        self.devices.borrow_mut().get(address)?.read(buffer);
        Ok(())
    }
}

impl i2c::WriteRead for SimI2c {
    type Error = SimError;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), SimError> {
        let mut devices = self.devices.borrow_mut();
        let device = devices.get(address)?;
        device.write(bytes);
        device.read(buffer);
        Ok(())
    }
}

/// `SimSpi` is the board's SPI controller. MOSI is looped back to MISO, so
/// every transfer reads back what it sent.
pub struct SimSpi;

impl Reconfigure for SimSpi {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        log::debug!("SPI clock {} Hz", hz);
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), BusError> {
        log::debug!("SPI {}", mode_name(mode));
        Ok(())
    }
}

/// `mode_name` numbers an SPI mode the usual way, CPOL then CPHA.
fn mode_name(mode: Mode) -> &'static str {
    let idle_high = mode.polarity == Polarity::IdleHigh;
    let second_edge = mode.phase == Phase::CaptureOnSecondTransition;
    match (idle_high, second_edge) {
        (false, false) => "mode 0",
        (false, true) => "mode 1",
        (true, false) => "mode 2",
        (true, true) => "mode 3",
    }
}

impl spi::Transfer<u8> for SimSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Infallible> {
        Ok(words)
    }
}

impl spi::Write<u8> for SimSpi {
    type Error = Infallible;

    fn write(&mut self, _words: &[u8]) -> Result<(), Infallible> {
        Ok(())
    }
}

/// `SimUart` has its TX wired to its own RX.
#[derive(Default)]
pub struct SimUart {
    received: VecDeque<u8>,
}

impl UartPort for SimUart {
    fn configure(&mut self, config: &uart::Config) -> Result<(), BusError> {
        log::debug!("UART {:?}", config);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.received.extend(bytes);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let n = buffer.len().min(self.received.len());
        for (b, got) in buffer.iter_mut().zip(self.received.drain(..n)) {
            *b = got;
        }
        n
    }

    fn available(&self) -> usize {
        self.received.len()
    }

    fn clear_input(&mut self) {
        self.received.clear();
    }
}

/// `SimOneWire` answers reset, Read ROM and Search ROM at byte level.
pub struct SimOneWire {
    roms: Vec<Rom>,
    pending: VecDeque<u8>,
}

impl OneWireBus for SimOneWire {
    fn reset(&mut self) -> Result<bool, BusError> {
        self.pending.clear();
        Ok(!self.roms.is_empty())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        if bytes.first() == Some(&0x33) {
            if let Some(rom) = self.roms.first() {
                self.pending.extend(rom);
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
