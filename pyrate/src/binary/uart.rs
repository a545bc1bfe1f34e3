//! Binary UART mode (`ART1`).

use super::{send_banner, Session};
use crate::board::Board;
use crate::bus::UartPort;
use crate::low::Channel;
use crate::uart::{Config, BINARY_SPEEDS};
use crate::LinkError;
use embedded_hal::serial;

const BANNER: &[u8; 4] = b"ART1";

pub fn run<TX, RX, TXErr, RXErr, B>(
    ch: &mut Channel<TX, RX>,
    session: &mut Session<'_, B>,
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    B: Board,
{
    let pins = session.board.pins();
    let mut config = Config::default();
    let mut port = match session.board.uart(pins.mosi, pins.miso, &config) {
        Ok(port) => port,
        Err(err) => {
            log::warn!("binary UART unavailable: {}", err);
            return Ok(());
        }
    };
    send_banner(ch, BANNER)?;

    let mut echo = false;
    let mut buffer = [0u8; 64];
    loop {
        if echo {
            forward(ch, &mut port, &mut buffer)?;
        }
        let cmd = match ch.try_read()? {
            Some(cmd) => cmd,
            None => continue,
        };
        match cmd {
            0x00 => return Ok(()),
            0x01 => send_banner(ch, BANNER)?,
            0x02 => {
                port.clear_input();
                echo = true;
                ch.reply(0x01)?;
            }
            0x03 => {
                echo = false;
                ch.reply(0x01)?;
            }
            // Manual baud rate divisors are not supported.
            0x07 => ch.reply(0x00)?,
            0x0F => {
                log::info!("UART bridge until reset");
                loop {
                    if let Some(byte) = ch.try_read()? {
                        write_port(&mut port, &[byte]);
                    }
                    forward(ch, &mut port, &mut buffer)?;
                }
            }
            0x10..=0x1F => {
                ch.reply(0x01)?;
                for _ in 0..=(cmd & 0x0F) {
                    let byte = ch.read()?;
                    write_port(&mut port, &[byte]);
                    ch.reply(0x01)?;
                }
            }
            0x40..=0x4F => {
                let status = session.peripheral_command(cmd);
                ch.reply(status)?;
            }
            0x60..=0x6F => {
                let status = match BINARY_SPEEDS.get(usize::from(cmd & 0x0F)) {
                    Some(&baud) => {
                        let next = Config { baud, ..config };
                        reconfigure(&mut port, &mut config, next)
                    }
                    None => 0x00,
                };
                ch.reply(status)?;
            }
            0x80..=0x9F => {
                let status = match config.with_command_byte(cmd) {
                    Some(next) => reconfigure(&mut port, &mut config, next),
                    None => 0x00,
                };
                ch.reply(status)?;
            }
            _ => log::debug!("unhandled UART command 0x{:02X}", cmd),
        }
    }
}

fn forward<TX, RX, TXErr, RXErr, U>(
    ch: &mut Channel<TX, RX>,
    port: &mut U,
    buffer: &mut [u8],
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    U: UartPort,
{
    let waiting = port.available().min(buffer.len());
    if waiting == 0 {
        return Ok(());
    }
    let n = port.read(&mut buffer[..waiting]);
    ch.write_all(&buffer[..n])?;
    ch.flush()
}

fn write_port<U: UartPort>(port: &mut U, bytes: &[u8]) {
    if let Err(err) = port.write(bytes) {
        log::warn!("UART write failed: {}", err);
    }
}

fn reconfigure<U: UartPort>(port: &mut U, current: &mut Config, next: Config) -> u8 {
    match port.configure(&next) {
        Ok(()) => {
            *current = next;
            0x01
        }
        Err(err) => {
            log::warn!("UART configuration {:?} failed: {}", next, err);
            0x00
        }
    }
}
