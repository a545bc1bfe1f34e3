use crate::{half_period_us, BitbangError};
use core::fmt;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use pyrate::bus::{BusError, BusLock, I2cBus};

/// `BitbangI2c` is an I2C controller on two open-drain pins.
///
/// Clock stretching is not supported.
pub struct BitbangI2c<SCL, SDA, D> {
    scl: SCL,
    sda: SDA,
    delay: D,
    half_period_us: u32,
    locked: bool,
}

impl<SCL, SDA, D, E> BitbangI2c<SCL, SDA, D>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    /// `new` releases both lines and runs the bus at `hz`.
    pub fn new(mut scl: SCL, mut sda: SDA, delay: D, hz: u32) -> Result<Self, BitbangError<E>> {
        sda.set_high().map_err(BitbangError::Pin)?;
        scl.set_high().map_err(BitbangError::Pin)?;
        Ok(Self {
            scl,
            sda,
            delay,
            half_period_us: half_period_us(hz),
            locked: false,
        })
    }

    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    pub fn set_frequency(&mut self, hz: u32) {
        self.half_period_us = half_period_us(hz);
    }

    fn wait(&mut self) {
        self.delay.delay_us(self.half_period_us);
    }

    fn scl(&mut self, high: bool) -> Result<(), BitbangError<E>> {
        if high {
            self.scl.set_high().map_err(BitbangError::Pin)
        } else {
            self.scl.set_low().map_err(BitbangError::Pin)
        }
    }

    fn sda(&mut self, high: bool) -> Result<(), BitbangError<E>> {
        if high {
            self.sda.set_high().map_err(BitbangError::Pin)
        } else {
            self.sda.set_low().map_err(BitbangError::Pin)
        }
    }

    /// `start` issues a start condition, or a repeated start if the bus is
    /// already ours.
    fn start(&mut self) -> Result<(), BitbangError<E>> {
        self.sda(true)?;
        self.scl(true)?;
        self.wait();
        self.sda(false)?;
        self.wait();
        self.scl(false)
    }

    fn stop(&mut self) -> Result<(), BitbangError<E>> {
        self.sda(false)?;
        self.scl(true)?;
        self.wait();
        self.sda(true)?;
        self.wait();
        Ok(())
    }

    /// `write_byte` clocks out `byte` and returns whether it was
    /// acknowledged.
    fn write_byte(&mut self, byte: u8) -> Result<bool, BitbangError<E>> {
        for bit in (0..8).rev() {
            self.sda((byte >> bit) & 1 != 0)?;
            self.wait();
            self.scl(true)?;
            self.wait();
            self.scl(false)?;
        }
        self.sda(true)?;
        self.wait();
        self.scl(true)?;
        self.wait();
        let ack = self.sda.is_low().map_err(BitbangError::Pin)?;
        self.scl(false)?;
        Ok(ack)
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, BitbangError<E>> {
        self.sda(true)?;
        let mut byte = 0u8;
        for _ in 0..8 {
            self.wait();
            self.scl(true)?;
            self.wait();
            let bit = self.sda.is_high().map_err(BitbangError::Pin)?;
            byte = (byte << 1) | bit as u8;
            self.scl(false)?;
        }
        self.sda(!ack)?;
        self.wait();
        self.scl(true)?;
        self.wait();
        self.scl(false)?;
        self.sda(true)?;
        Ok(byte)
    }

    fn send(&mut self, byte: u8) -> Result<(), BitbangError<E>> {
        if self.write_byte(byte)? {
            Ok(())
        } else {
            Err(BitbangError::Nack)
        }
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), BitbangError<E>> {
        let last = buffer.len().saturating_sub(1);
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = self.read_byte(i != last)?;
        }
        Ok(())
    }

    /// `transaction` runs `body` between a start and a stop. The stop is
    /// sent even when `body` fails.
    fn transaction<F>(&mut self, body: F) -> Result<(), BitbangError<E>>
    where
        F: FnOnce(&mut Self) -> Result<(), BitbangError<E>>,
    {
        self.start()?;
        let result = body(self);
        self.stop()?;
        result
    }
}

impl<SCL, SDA, D, E> i2c::Write for BitbangI2c<SCL, SDA, D>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = BitbangError<E>;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.transaction(|bus| {
            bus.send(address << 1)?;
            bytes.iter().try_for_each(|&b| bus.send(b))
        })
    }
}

impl<SCL, SDA, D, E> i2c::Read for BitbangI2c<SCL, SDA, D>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = BitbangError<E>;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.transaction(|bus| {
            bus.send((address << 1) | 1)?;
            bus.receive(buffer)
        })
    }
}

impl<SCL, SDA, D, E> i2c::WriteRead for BitbangI2c<SCL, SDA, D>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = BitbangError<E>;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transaction(|bus| {
            bus.send(address << 1)?;
            bytes.iter().try_for_each(|&b| bus.send(b))?;
            bus.start()?;
            bus.send((address << 1) | 1)?;
            bus.receive(buffer)
        })
    }
}

impl<SCL, SDA, D> BusLock for BitbangI2c<SCL, SDA, D> {
    fn try_lock(&mut self) -> bool {
        !core::mem::replace(&mut self.locked, true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

impl<SCL, SDA, D, E> I2cBus for BitbangI2c<SCL, SDA, D>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
    E: fmt::Debug,
{
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        BitbangI2c::set_frequency(self, hz);
        Ok(())
    }

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        Ok(i2c::Write::write(self, address, bytes)?)
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        Ok(i2c::Read::read(self, address, buffer)?)
    }

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError> {
        Ok(i2c::WriteRead::write_read(self, address, bytes, buffer)?)
    }
}
