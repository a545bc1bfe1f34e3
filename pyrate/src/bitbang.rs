//! Module `bitbang` contains the root loop of "binary bit-bang" mode.
//!
//! This mode cannot be entered directly. The interactive prompt hands its
//! serial channel over when the host sends twenty NUL bytes, and gets it
//! back when the host sends `0x0F`:
//!
//! ```text
//! host:  00 00 .. 00        01         ..  00        0F
//! us:    BBIO1              SPI1       ..  BBIO1     01
//! ```
//!
//! From the root loop the host can enter one of the protocol sub-engines in
//! `binary`. Returning from a sub-engine lands back here.

use crate::binary::{self, Session};
use crate::board::Board;
use crate::low::Channel;
use crate::LinkError;
use embedded_hal::serial;

const BANNER: &[u8; 5] = b"BBIO1";

/// Sub-engines selectable from the root loop, by command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubMode {
    Spi,
    I2c,
    Uart,
    OneWire,
    RawWire,
    OpenOcd,
}

impl SubMode {
    fn from_command_byte(cmd: u8) -> Option<Self> {
        match cmd {
            0x01 => Some(SubMode::Spi),
            0x02 => Some(SubMode::I2c),
            0x03 => Some(SubMode::Uart),
            0x04 => Some(SubMode::OneWire),
            0x05 => Some(SubMode::RawWire),
            0x06 => Some(SubMode::OpenOcd),
            _ => None,
        }
    }
}

/// `run` serves the binary protocol on `ch` until the host asks to return
/// to the interactive terminal.
///
/// `aux` and `cs` are the pins the `0x4x` peripheral command drives.
pub fn run<TX, RX, TXErr, RXErr, B>(
    ch: &mut Channel<TX, RX>,
    board: &mut B,
    aux: &mut B::Pin,
    cs: &mut B::Pin,
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    B: Board,
{
    let mut session = Session::new(board, aux, cs);
    send_banner(ch)?;

    loop {
        let cmd = ch.read()?;
        match cmd {
            0x00 => send_banner(ch)?,
            0x0F => return ch.reply(0x01),
            0x01..=0x0E => {
                let mode = match SubMode::from_command_byte(cmd) {
                    Some(mode) => mode,
                    None => continue,
                };
                log::debug!("binary {:?} requested", mode);
                match mode {
                    SubMode::Spi => binary::spi::run(ch, &mut session)?,
                    SubMode::I2c => binary::i2c::run(ch, &mut session)?,
                    SubMode::Uart => binary::uart::run(ch, &mut session)?,
                    _ => {
                        log::warn!("binary {:?} mode is not supported", mode);
                        continue;
                    }
                }
                send_banner(ch)?;
            }
            // Pin direction and level commands are accepted and ignored.
            0x40..=0x5F | 0x80..=0xFF => {}
            _ => log::debug!("unhandled bitbang command 0x{:02X}", cmd),
        }
    }
}

fn send_banner<TX, RX, TXErr, RXErr>(ch: &mut Channel<TX, RX>) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
{
    ch.write_all(BANNER)?;
    ch.flush()
}
