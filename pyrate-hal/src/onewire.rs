use crate::BitbangError;
use alloc::vec::Vec;
use core::fmt;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use pyrate::bus::{BusError, OneWireBus, Rom};

const SEARCH_ROM: u8 = 0xF0;

/// `BitbangOneWire` is a 1-Wire master on one open-drain pin, using the
/// standard speed timings.
pub struct BitbangOneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D, E> BitbangOneWire<P, D>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    pub fn new(mut pin: P, delay: D) -> Result<Self, BitbangError<E>> {
        pin.set_high().map_err(BitbangError::Pin)?;
        Ok(Self { pin, delay })
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    fn low(&mut self, us: u32) -> Result<(), BitbangError<E>> {
        self.pin.set_low().map_err(BitbangError::Pin)?;
        self.delay.delay_us(us);
        self.pin.set_high().map_err(BitbangError::Pin)
    }

    fn sample(&mut self) -> Result<bool, BitbangError<E>> {
        self.pin.is_high().map_err(BitbangError::Pin)
    }

    /// `reset_pulse` returns whether any device answered with a presence
    /// pulse.
    pub fn reset_pulse(&mut self) -> Result<bool, BitbangError<E>> {
        self.low(480)?;
        self.delay.delay_us(70);
        let present = !self.sample()?;
        self.delay.delay_us(410);
        Ok(present)
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), BitbangError<E>> {
        if bit {
            self.low(6)?;
            self.delay.delay_us(64);
        } else {
            self.low(60)?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, BitbangError<E>> {
        self.low(6)?;
        self.delay.delay_us(9);
        let bit = self.sample()?;
        self.delay.delay_us(55);
        Ok(bit)
    }

    /// Bytes go out least significant bit first.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), BitbangError<E>> {
        (0..8).try_for_each(|bit| self.write_bit((byte >> bit) & 1 != 0))
    }

    pub fn read_byte(&mut self) -> Result<u8, BitbangError<E>> {
        let mut byte = 0u8;
        for bit in 0..8 {
            byte |= (self.read_bit()? as u8) << bit;
        }
        Ok(byte)
    }

    /// `search_pass` walks the ROM tree once, returning `None` when the
    /// devices stop answering mid-search.
    fn search_pass(&mut self, search: &mut Search) -> Result<Option<Rom>, BitbangError<E>> {
        search.start_pass();
        self.write_byte(SEARCH_ROM)?;
        for bit in 0..64 {
            let id = self.read_bit()?;
            let cmp = self.read_bit()?;
            match search.choose(bit, id, cmp) {
                Some(direction) => self.write_bit(direction)?,
                None => return Ok(None),
            }
        }
        Ok(Some(search.finish_pass()))
    }
}

impl<P, D, E> OneWireBus for BitbangOneWire<P, D>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
    E: fmt::Debug,
{
    fn reset(&mut self) -> Result<bool, BusError> {
        Ok(self.reset_pulse()?)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        for b in buffer.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    fn search(&mut self) -> Result<Vec<Rom>, BusError> {
        let mut search = Search::new();
        let mut found = Vec::new();
        while !search.finished() {
            if !self.reset_pulse()? {
                break;
            }
            match self.search_pass(&mut search)? {
                Some(rom) => found.push(rom),
                None => {
                    log::debug!("1-Wire search lost its devices after {} ROMs", found.len());
                    break;
                }
            }
        }
        Ok(found)
    }
}

/// `Search` is the state of a ROM search across passes. Each pass follows
/// the previous ROM up to the last unexplored branch, then takes the
/// one-branch there.
#[derive(Debug, Default)]
pub struct Search {
    rom: Rom,
    last_discrepancy: u8,
    last_zero: u8,
    done: bool,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_pass(&mut self) {
        self.last_zero = 0;
    }

    /// `choose` takes the bit and complement the devices answered for ROM
    /// bit `bit` and returns the direction to write, or `None` if no device
    /// answered at all.
    pub fn choose(&mut self, bit: u8, id: bool, cmp: bool) -> Option<bool> {
        let position = bit + 1;
        let direction = match (id, cmp) {
            (true, true) => return None,
            (id, cmp) if id != cmp => id,
            _ => {
                let direction = if position < self.last_discrepancy {
                    self.rom_bit(bit)
                } else {
                    position == self.last_discrepancy
                };
                if !direction {
                    self.last_zero = position;
                }
                direction
            }
        };
        let mask = 1 << (bit % 8);
        let byte = &mut self.rom[(bit / 8) as usize];
        if direction {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        Some(direction)
    }

    pub fn finish_pass(&mut self) -> Rom {
        self.last_discrepancy = self.last_zero;
        if self.last_discrepancy == 0 {
            self.done = true;
        }
        self.rom
    }

    pub fn finished(&self) -> bool {
        self.done
    }

    fn rom_bit(&self, bit: u8) -> bool {
        (self.rom[(bit / 8) as usize] >> (bit % 8)) & 1 != 0
    }
}
