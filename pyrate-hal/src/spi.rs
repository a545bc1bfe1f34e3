use crate::{half_period_us, BitbangError};
use core::fmt;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::spi::{Mode, Phase, Polarity, MODE_0};
use pyrate::bus::{BusError, BusLock, SpiBus};

/// `BitbangSpi` is an SPI controller on three GPIO pins, MSB first.
pub struct BitbangSpi<SCK, MOSI, MISO, D> {
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    delay: D,
    mode: Mode,
    half_period_us: u32,
    locked: bool,
}

impl<SCK, MOSI, MISO, D, E> BitbangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    D: DelayUs<u32>,
{
    pub fn new(sck: SCK, mosi: MOSI, miso: MISO, delay: D) -> Self {
        Self {
            sck,
            mosi,
            miso,
            delay,
            mode: MODE_0,
            half_period_us: half_period_us(30_000),
            locked: false,
        }
    }

    pub fn release(self) -> (SCK, MOSI, MISO, D) {
        (self.sck, self.mosi, self.miso, self.delay)
    }

    /// `set_mode` changes the clock polarity and phase, parking the clock at
    /// its new idle level.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), BitbangError<E>> {
        self.mode = mode;
        self.clock(false)
    }

    pub fn set_frequency(&mut self, hz: u32) {
        self.half_period_us = half_period_us(hz);
    }

    /// `clock` drives the clock to its active level, or back to idle.
    fn clock(&mut self, active: bool) -> Result<(), BitbangError<E>> {
        let high = active != (self.mode.polarity == Polarity::IdleHigh);
        if high {
            self.sck.set_high().map_err(BitbangError::Pin)
        } else {
            self.sck.set_low().map_err(BitbangError::Pin)
        }
    }

    fn put(&mut self, bit: bool) -> Result<(), BitbangError<E>> {
        if bit {
            self.mosi.set_high().map_err(BitbangError::Pin)
        } else {
            self.mosi.set_low().map_err(BitbangError::Pin)
        }
    }

    fn transfer_byte(&mut self, out: u8) -> Result<u8, BitbangError<E>> {
        let mut input = 0u8;
        for bit in (0..8).rev() {
            let out_bit = (out >> bit) & 1 != 0;
            let sampled = match self.mode.phase {
                Phase::CaptureOnFirstTransition => {
                    self.put(out_bit)?;
                    self.delay.delay_us(self.half_period_us);
                    self.clock(true)?;
                    let sampled = self.miso.is_high().map_err(BitbangError::Pin)?;
                    self.delay.delay_us(self.half_period_us);
                    self.clock(false)?;
                    sampled
                }
                Phase::CaptureOnSecondTransition => {
                    self.clock(true)?;
                    self.put(out_bit)?;
                    self.delay.delay_us(self.half_period_us);
                    self.clock(false)?;
                    let sampled = self.miso.is_high().map_err(BitbangError::Pin)?;
                    self.delay.delay_us(self.half_period_us);
                    sampled
                }
            };
            input = (input << 1) | sampled as u8;
        }
        Ok(input)
    }
}

impl<SCK, MOSI, MISO, D, E> spi::Transfer<u8> for BitbangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = BitbangError<E>;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        for word in words.iter_mut() {
            *word = self.transfer_byte(*word)?;
        }
        Ok(words)
    }
}

impl<SCK, MOSI, MISO, D, E> spi::Write<u8> for BitbangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = BitbangError<E>;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        for &word in words {
            self.transfer_byte(word)?;
        }
        Ok(())
    }
}

impl<SCK, MOSI, MISO, D> BusLock for BitbangSpi<SCK, MOSI, MISO, D> {
    fn try_lock(&mut self) -> bool {
        !core::mem::replace(&mut self.locked, true)
    }

    fn unlock(&mut self) {
        self.locked = false;
    }
}

impl<SCK, MOSI, MISO, D, E> SpiBus for BitbangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin<Error = E>,
    MOSI: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
    D: DelayUs<u32>,
    E: fmt::Debug,
{
    fn configure(&mut self, config: &pyrate::spi::Config) -> Result<(), BusError> {
        self.set_frequency(config.speed.hz());
        self.set_mode(config.mode())?;
        Ok(())
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), BusError> {
        spi::Transfer::transfer(self, words)?;
        Ok(())
    }
}
