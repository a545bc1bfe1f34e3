//! Module `hardware` adapts a HAL's own bus controllers to the engine.

use core::fmt;
use embedded_hal::blocking::{i2c, spi};
use embedded_hal::spi::Mode;
use pyrate::bus::{BusError, BusLock, I2cBus, SpiBus};

/// `Reconfigure` is what the engine needs to change on a controller after
/// it was created. `embedded-hal` leaves this to each HAL.
pub trait Reconfigure {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError>;

    /// `set_mode` only matters for SPI controllers.
    fn set_mode(&mut self, _mode: Mode) -> Result<(), BusError> {
        Ok(())
    }
}

/// `Hardware` wraps an `embedded-hal` I2C or SPI controller so the engine
/// can use it, adding the bus lock the engine expects.
pub struct Hardware<T> {
    inner: T,
    locked: bool,
}

impl<T> Hardware<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            locked: false,
        }
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> BusLock for Hardware<T> {
    fn try_lock(&mut self) -> bool {
        !core::mem::replace(&mut self.locked, true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

/// HAL I2C errors rarely say whether the device was missing, so every
/// failure is reported as a NACK.
fn nack<E: fmt::Debug>(address: u8) -> impl FnOnce(E) -> BusError {
    move |err| {
        log::debug!("I2C 0x{:02X}: {:?}", address, err);
        BusError::Nack
    }
}

impl<T, E> I2cBus for Hardware<T>
where
    T: i2c::Write<Error = E> + i2c::Read<Error = E> + i2c::WriteRead<Error = E> + Reconfigure,
    E: fmt::Debug,
{
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        self.inner.set_frequency(hz)
    }

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        i2c::Write::write(&mut self.inner, address, bytes).map_err(nack(address))
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        i2c::Read::read(&mut self.inner, address, buffer).map_err(nack(address))
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError> {
        i2c::WriteRead::write_read(&mut self.inner, address, bytes, buffer).map_err(nack(address))
    }
}

impl<T, E> SpiBus for Hardware<T>
where
    T: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E> + Reconfigure,
    E: fmt::Debug,
{
    fn configure(&mut self, config: &pyrate::spi::Config) -> Result<(), BusError> {
        self.inner.set_mode(config.mode())?;
        self.inner.set_frequency(config.speed.hz())
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        spi::Transfer::transfer(&mut self.inner, words)
            .map(|_| ())
            .map_err(|err| {
                log::warn!("SPI transfer: {:?}", err);
                BusError::Fault
            })
    }

    fn write(&mut self, words: &[u8]) -> Result<(), BusError> {
        spi::Write::write(&mut self.inner, words).map_err(|err| {
            log::warn!("SPI write: {:?}", err);
            BusError::Fault
        })
    }
}
