//! Binary SPI mode (`SPI1`).

use super::{read_paired, send_banner, Session};
use crate::board::{claim_spi, Board, UserPin};
use crate::bus::{BusLock, SpiBus};
use crate::low::Channel;
use crate::spi::{Config, Speed, DEFAULT_CONFIG};
use crate::LinkError;
use embedded_hal::serial;

const BANNER: &[u8; 4] = b"SPI1";

/// `run` serves binary SPI commands until the host sends `0x00`.
///
/// Nothing is sent if the SPI bus cannot be claimed; the host sees no
/// banner and the root loop carries on.
pub fn run<TX, RX, TXErr, RXErr, B>(
    ch: &mut Channel<TX, RX>,
    session: &mut Session<'_, B>,
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    B: Board,
{
    let mut bus = match claim_spi(&mut *session.board) {
        Ok(bus) => bus,
        Err(err) => {
            log::warn!("binary SPI unavailable: {}", err);
            return Ok(());
        }
    };
    if !bus.try_lock() {
        log::warn!("binary SPI: bus is locked");
        return Ok(());
    }
    let result = serve(ch, session, &mut bus);
    bus.unlock();
    result
}

fn serve<TX, RX, TXErr, RXErr, B, S>(
    ch: &mut Channel<TX, RX>,
    session: &mut Session<'_, B>,
    bus: &mut S,
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    B: Board,
    S: SpiBus,
{
    let mut config = DEFAULT_CONFIG;
    configure(bus, &config);
    send_banner(ch, BANNER)?;

    loop {
        let cmd = ch.read()?;
        match cmd {
            0x00 => return Ok(()),
            0x01 => send_banner(ch, BANNER)?,
            0x02 | 0x03 => {
                let status = status(session.cs.set_output(cmd == 0x03).is_ok());
                ch.reply(status)?;
            }
            0x04 | 0x05 => {
                let mut paired = match read_paired(ch)? {
                    Some(paired) => paired,
                    None => continue,
                };
                let wrap_cs = cmd == 0x04;
                let result = if wrap_cs {
                    session.cs.set_output(false).and_then(|()| {
                        let result = bus
                            .write(&paired.writes)
                            .and_then(|()| bus.read(&mut paired.reads));
                        let released = session.cs.set_output(true);
                        result.and(released)
                    })
                } else {
                    bus.write(&paired.writes)
                        .and_then(|()| bus.read(&mut paired.reads))
                };
                match result {
                    Ok(()) => {
                        ch.write(0x01)?;
                        ch.write_all(&paired.reads)?;
                        ch.flush()?;
                    }
                    Err(err) => {
                        log::warn!("SPI write/read failed: {}", err);
                        ch.reply(0x00)?;
                    }
                }
            }
            0x0C..=0x0F => log::debug!("SPI sniffer is not supported"),
            0x10..=0x1F => {
                let mut buffer = [0u8; 16];
                let words = &mut buffer[..usize::from(cmd & 0x0F) + 1];
                ch.read_exact(words)?;
                match bus.transfer(words) {
                    Ok(()) => {
                        ch.write(0x01)?;
                        ch.write_all(words)?;
                        ch.flush()?;
                    }
                    Err(err) => {
                        log::warn!("SPI bulk transfer failed: {}", err);
                        ch.reply(0x00)?;
                    }
                }
            }
            0x40..=0x4F => {
                let status = session.peripheral_command(cmd);
                ch.reply(status)?;
            }
            0x60..=0x67 => {
                if let Some(speed) = Speed::from_index(cmd & 0x07) {
                    config.speed = speed;
                }
                ch.reply(status(configure(bus, &config)))?;
            }
            0x80..=0x8F => {
                // Open-drain outputs and end-of-bit sampling are refused.
                if cmd & 0x09 != 0x08 {
                    ch.reply(0x00)?;
                    continue;
                }
                config = config.with_command_byte(cmd);
                ch.reply(status(configure(bus, &config)))?;
            }
            _ => log::debug!("unhandled SPI command 0x{:02X}", cmd),
        }
    }
}

fn configure<S: SpiBus>(bus: &mut S, config: &Config) -> bool {
    match bus.configure(config) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("SPI configuration {:?} failed: {}", config, err);
            false
        }
    }
}

fn status(ok: bool) -> u8 {
    if ok {
        0x01
    } else {
        0x00
    }
}
