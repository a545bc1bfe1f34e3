//! Module `board` is the boundary between the engine and the hardware it
//! runs on.
//!
//! A board knows which of its pins play which bus role, how to turn those
//! pins into peripherals, and how to switch its power rails. The engine
//! claims resources through `Board` and releases them by dropping what it
//! was given.

use crate::bus::{BusError, BusLock, I2cBus, OneWireBus, SpiBus, UartPort};
use crate::spi;
use crate::uart;
use core::fmt;

/// `PinId` names a board pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinId(pub &'static str);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// `PinSet` assigns board pins to bus roles.
///
/// `scl` and `sda` are only present on boards with a dedicated I2C header;
/// otherwise I2C runs on `clock` and `mosi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSet {
    pub mosi: PinId,
    pub clock: PinId,
    pub miso: PinId,
    pub cs: PinId,
    pub aux: PinId,
    pub scl: Option<PinId>,
    pub sda: Option<PinId>,
}

/// `Unavailable` explains why a board could not hand out a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The board has no hardware controller for this bus on these pins.
    NoHardware,

    /// The pin is already claimed.
    PinBusy(PinId),

    /// The requested configuration cannot be produced.
    Unsupported,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHardware => write!(f, "no hardware peripheral on these pins"),
            Self::PinBusy(pin) => write!(f, "pin {} is already in use", pin),
            Self::Unsupported => write!(f, "configuration not supported"),
        }
    }
}

/// `Probe` selects one of the board's voltage measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Adc,
    V3,
    V5,
    Vpullup,
}

/// `UserPin` is a digital pin the engine drives directly: AUX, or chip
/// select.
pub trait UserPin {
    fn set_output(&mut self, high: bool) -> Result<(), BusError>;
    fn set_input(&mut self) -> Result<(), BusError>;
    fn is_high(&mut self) -> Result<bool, BusError>;
}

/// `Board` hands out the peripherals and pins of the hardware the engine
/// runs on.
///
/// Hardware constructors may fail with `Unavailable::NoHardware`, in which
/// case the engine falls back to the bit-banged variant on the same pins.
pub trait Board {
    type I2c: I2cBus + 'static;
    type SoftI2c: I2cBus + 'static;
    type Spi: SpiBus + 'static;
    type SoftSpi: SpiBus + 'static;
    type Uart: UartPort + 'static;
    type OneWire: OneWireBus + 'static;
    type Pin: UserPin + 'static;

    fn name(&self) -> &str;

    fn pins(&self) -> PinSet;

    fn i2c(&mut self, scl: PinId, sda: PinId, hz: u32) -> Result<Self::I2c, Unavailable>;

    fn soft_i2c(&mut self, scl: PinId, sda: PinId, hz: u32) -> Result<Self::SoftI2c, Unavailable>;

    fn spi(&mut self, clock: PinId, mosi: PinId, miso: PinId) -> Result<Self::Spi, Unavailable>;

    fn soft_spi(
        &mut self,
        clock: PinId,
        mosi: PinId,
        miso: PinId,
    ) -> Result<Self::SoftSpi, Unavailable>;

    fn uart(&mut self, tx: PinId, rx: PinId, config: &uart::Config)
        -> Result<Self::Uart, Unavailable>;

    fn onewire(&mut self, pin: PinId) -> Result<Self::OneWire, Unavailable>;

    /// `pin` claims a pin for direct control. The claim ends when the
    /// returned pin is dropped.
    fn pin(&mut self, id: PinId) -> Result<Self::Pin, Unavailable>;

    fn set_power(&mut self, on: bool);

    fn set_pullups(&mut self, on: bool);

    fn set_mode_led(&mut self, on: bool);

    /// `voltage` measures `probe` in volts.
    fn voltage(&mut self, probe: Probe) -> f32;

    fn delay_ms(&mut self, ms: u32);
}

/// `Peripheral` is a bus that is either backed by a hardware controller or
/// bit-banged.
pub enum Peripheral<N, S> {
    Hardware(N),
    Bitbang(S),
}

impl<N, S> Peripheral<N, S> {
    pub fn is_hardware(&self) -> bool {
        matches!(self, Peripheral::Hardware(_))
    }
}

impl<N: BusLock, S: BusLock> BusLock for Peripheral<N, S> {
    fn try_lock(&mut self) -> bool {
        match self {
            Peripheral::Hardware(bus) => bus.try_lock(),
            Peripheral::Bitbang(bus) => bus.try_lock(),
        }
    }

    fn unlock(&mut self) {
        match self {
            Peripheral::Hardware(bus) => bus.unlock(),
            Peripheral::Bitbang(bus) => bus.unlock(),
        }
    }
}

impl<N: I2cBus, S: I2cBus> I2cBus for Peripheral<N, S> {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.set_frequency(hz),
            Peripheral::Bitbang(bus) => bus.set_frequency(hz),
        }
    }

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.write(address, bytes),
            Peripheral::Bitbang(bus) => bus.write(address, bytes),
        }
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.read(address, buffer),
            Peripheral::Bitbang(bus) => bus.read(address, buffer),
        }
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.write_read(address, bytes, buffer),
            Peripheral::Bitbang(bus) => bus.write_read(address, bytes, buffer),
        }
    }
}

impl<N: SpiBus, S: SpiBus> SpiBus for Peripheral<N, S> {
    fn configure(&mut self, config: &spi::Config) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.configure(config),
            Peripheral::Bitbang(bus) => bus.configure(config),
        }
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        match self {
            Peripheral::Hardware(bus) => bus.transfer(words),
            Peripheral::Bitbang(bus) => bus.transfer(words),
        }
    }
}

pub type I2cPeripheral<B> = Peripheral<<B as Board>::I2c, <B as Board>::SoftI2c>;
pub type SpiPeripheral<B> = Peripheral<<B as Board>::Spi, <B as Board>::SoftSpi>;

/// `claim_i2c` returns the board's hardware I2C controller on `scl`/`sda`,
/// or a bit-banged one when there is none.
pub fn claim_i2c<B: Board>(
    board: &mut B,
    scl: PinId,
    sda: PinId,
    hz: u32,
) -> Result<I2cPeripheral<B>, Unavailable> {
    match board.i2c(scl, sda, hz) {
        Ok(bus) => {
            log::debug!("hardware I2C on {}/{}", scl, sda);
            Ok(Peripheral::Hardware(bus))
        }
        Err(err) => {
            log::debug!("bitbang I2C on {}/{}: {}", scl, sda, err);
            Ok(Peripheral::Bitbang(board.soft_i2c(scl, sda, hz)?))
        }
    }
}

/// `claim_spi` is the SPI counterpart of `claim_i2c`.
pub fn claim_spi<B: Board>(board: &mut B) -> Result<SpiPeripheral<B>, Unavailable> {
    let pins = board.pins();
    match board.spi(pins.clock, pins.mosi, pins.miso) {
        Ok(bus) => {
            log::debug!("hardware SPI");
            Ok(Peripheral::Hardware(bus))
        }
        Err(err) => {
            log::debug!("bitbang SPI: {}", err);
            Ok(Peripheral::Bitbang(
                board.soft_spi(pins.clock, pins.mosi, pins.miso)?,
            ))
        }
    }
}
