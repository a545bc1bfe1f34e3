//! `embedded-hal` building blocks for boards running the `pyrate` engine
//!
//! [`embedded-hal`](https://crates.io/crates/embedded-hal) is a hardware
//! abstraction layer for embedded systems. A board that wants to run the
//! Bus Pirate emulation in the `pyrate` crate has to hand out bus
//! peripherals implementing `pyrate::bus`'s traits. This library provides
//! them in terms of `embedded-hal`:
//!
//! * `Hardware` wraps a HAL's own I2C or SPI controller.
//! * `BitbangI2c`, `BitbangSpi` and `BitbangOneWire` drive the bus on plain
//!   GPIO pins, for when the chosen pins have no controller behind them.
//!   They also implement the `embedded-hal` blocking bus traits, so a HAL
//!   device driver can use them directly.
//!
//! The bit-banged buses need pins implementing both `OutputPin` and
//! `InputPin`. For I2C and 1-Wire those pins must be open-drain: setting
//! them high releases the line to its pull-up.

#![no_std]

extern crate alloc;
extern crate embedded_hal;

pub mod hardware;
pub mod i2c;
pub mod onewire;
pub mod spi;

#[cfg(test)]
mod testing;

pub use hardware::{Hardware, Reconfigure};
pub use i2c::BitbangI2c;
pub use onewire::BitbangOneWire;
pub use spi::BitbangSpi;

use core::fmt;
use pyrate::bus::BusError;

/// `BitbangError` represents failures of the bit-banged buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitbangError<E> {
    /// `Nack` indicates that no device acknowledged an I2C byte.
    Nack,

    /// `Pin` indicates that one of the GPIO pins returned an error.
    ///
    /// The data is the error returned by the pin implementation.
    Pin(E),
}

impl<E: fmt::Debug> fmt::Display for BitbangError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "no acknowledgement"),
            Self::Pin(err) => write!(f, "pin error: {:?}", err),
        }
    }
}

impl<E: fmt::Debug> From<BitbangError<E>> for BusError {
    fn from(err: BitbangError<E>) -> Self {
        match err {
            BitbangError::Nack => BusError::Nack,
            BitbangError::Pin(err) => {
                log::warn!("bitbang pin error: {:?}", err);
                BusError::Fault
            }
        }
    }
}

/// `half_period_us` returns the half clock period for `hz`, never less than
/// a microsecond.
pub(crate) fn half_period_us(hz: u32) -> u32 {
    if hz == 0 {
        return 1;
    }
    (500_000 / hz).max(1)
}
