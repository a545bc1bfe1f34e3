//! Module `bus` defines what the engines need from a bus peripheral.
//!
//! Boards hand out peripherals implementing these traits, either backed by
//! a hardware controller or bit-banged on plain pins. The engines never see
//! the difference.

use crate::spi;
use crate::uart;
use alloc::vec::Vec;
use core::fmt;

/// A 1-Wire ROM code, family code first.
pub type Rom = [u8; 8];

/// `BusError` represents a failed bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No device acknowledged the transfer.
    Nack,

    /// The peripheral or a pin reported an error.
    Fault,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "no acknowledgement from device"),
            Self::Fault => write!(f, "bus fault"),
        }
    }
}

/// `BusLock` guards a bus against concurrent use.
///
/// A failed `try_lock` means somebody else holds the bus; callers give up
/// rather than wait.
pub trait BusLock {
    fn try_lock(&mut self) -> bool;
    fn unlock(&mut self);
}

/// `I2cBus` is a controller-side I2C peripheral. Addresses are 7-bit.
pub trait I2cBus: BusLock {
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError>;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError>;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError>;

    /// `write_read` writes `bytes` and reads into `buffer` after a repeated
    /// start, without releasing the bus in between.
    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8])
        -> Result<(), BusError>;

    /// `scan` returns the addresses that acknowledge an empty write, skipping
    /// the reserved ranges.
    fn scan(&mut self) -> Vec<u8> {
        (0x08..0x78)
            .filter(|&address| self.write(address, &[]).is_ok())
            .collect()
    }
}

/// `SpiBus` is a controller-side SPI peripheral. Chip select is driven
/// separately as a plain pin.
pub trait SpiBus: BusLock {
    fn configure(&mut self, config: &spi::Config) -> Result<(), BusError>;

    /// `transfer` clocks `words` out and replaces them with what came back.
    fn transfer(&mut self, words: &mut [u8]) -> Result<(), BusError>;

    fn write(&mut self, words: &[u8]) -> Result<(), BusError> {
        let mut scratch = words.to_vec();
        self.transfer(&mut scratch)
    }

    /// `read` clocks out zero bytes and keeps what came back.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        buffer.iter_mut().for_each(|b| *b = 0);
        self.transfer(buffer)
    }
}

/// `UartPort` is a UART with a receive buffer.
pub trait UartPort {
    fn configure(&mut self, config: &uart::Config) -> Result<(), BusError>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// `read` waits up to the port's timeout and returns how many bytes
    /// were stored into `buffer`.
    fn read(&mut self, buffer: &mut [u8]) -> usize;

    /// `available` returns the number of bytes that can be read without
    /// waiting.
    fn available(&self) -> usize;

    fn clear_input(&mut self);
}

/// `OneWireBus` is a 1-Wire master.
pub trait OneWireBus {
    /// `reset` issues a reset pulse and reports whether any device answered
    /// with a presence pulse.
    fn reset(&mut self) -> Result<bool, BusError>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError>;

    /// `search` enumerates the ROM codes of every device on the bus.
    fn search(&mut self) -> Result<Vec<Rom>, BusError>;
}
