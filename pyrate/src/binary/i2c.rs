//! Binary I2C mode (`I2C1`).
//!
//! Start and stop framing is implied by each transaction, so the framing
//! commands only acknowledge and the single-bit commands are ignored.

use super::{read_paired, send_banner, Session};
use crate::board::{claim_i2c, Board};
use crate::bus::I2cBus;
use crate::i2c::{default_pins, SPEEDS_KHZ};
use crate::low::Channel;
use crate::LinkError;
use embedded_hal::serial;

const BANNER: &[u8; 4] = b"I2C1";

const DEFAULT_HZ: u32 = 100_000;

const ACK: u8 = 0x00;
const NACK: u8 = 0x01;

pub fn run<TX, RX, TXErr, RXErr, B>(
    ch: &mut Channel<TX, RX>,
    session: &mut Session<'_, B>,
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
    B: Board,
{
    let (scl, sda) = default_pins(&*session.board);
    let mut bus = match claim_i2c(&mut *session.board, scl, sda, DEFAULT_HZ) {
        Ok(bus) => bus,
        Err(err) => {
            log::warn!("binary I2C unavailable: {}", err);
            return Ok(());
        }
    };
    send_banner(ch, BANNER)?;

    loop {
        let cmd = ch.read()?;
        match cmd {
            0x00 => return Ok(()),
            0x01 => send_banner(ch, BANNER)?,
            0x02 | 0x03 => ch.reply(0x01)?,
            0x04..=0x07 => log::debug!("I2C bit command 0x{:02X} ignored", cmd),
            0x08 | 0x09 => {
                let mut paired = match read_paired(ch)? {
                    Some(paired) => paired,
                    None => continue,
                };
                let device = paired.writes[0] >> 1;
                let payload = &paired.writes[1..];
                let result = locked(&mut bus, |bus| {
                    if payload.is_empty() {
                        bus.read(device, &mut paired.reads)
                    } else {
                        bus.write_read(device, payload, &mut paired.reads)
                    }
                });
                match result {
                    Some(Ok(())) => {
                        ch.write(0x01)?;
                        ch.write_all(&paired.reads)?;
                        ch.flush()?;
                    }
                    Some(Err(err)) => {
                        log::debug!("I2C 0x{:02X}: {}", device, err);
                        ch.reply(0x00)?;
                    }
                    None => ch.reply(0x00)?,
                }
            }
            0x10..=0x1F => {
                let mut buffer = [0u8; 16];
                let bytes = &mut buffer[..usize::from(cmd & 0x0F) + 1];
                ch.read_exact(bytes)?;
                let device = bytes[0] >> 1;
                let result = locked(&mut bus, |bus| bus.write(device, &bytes[1..]));
                let status = match result {
                    Some(Ok(())) => ACK,
                    Some(Err(err)) => {
                        log::debug!("I2C 0x{:02X}: {}", device, err);
                        NACK
                    }
                    None => NACK,
                };
                ch.write(0x01)?;
                for _ in 0..bytes.len() {
                    ch.write(status)?;
                }
                ch.flush()?;
            }
            0x40..=0x4F => {
                let status = session.peripheral_command(cmd);
                ch.reply(status)?;
            }
            0x60..=0x6F => {
                let status = match SPEEDS_KHZ.get(usize::from(cmd & 0x0F)) {
                    Some(khz) => match bus.set_frequency(khz * 1000) {
                        Ok(()) => 0x01,
                        Err(err) => {
                            log::warn!("I2C speed {}kHz: {}", khz, err);
                            0x00
                        }
                    },
                    None => 0x00,
                };
                ch.reply(status)?;
            }
            _ => log::debug!("unhandled I2C command 0x{:02X}", cmd),
        }
    }
}

/// `locked` runs `f` with the bus locked, or returns `None` if the lock is
/// held elsewhere.
fn locked<I: I2cBus, T>(bus: &mut I, f: impl FnOnce(&mut I) -> T) -> Option<T> {
    if !bus.try_lock() {
        log::warn!("I2C bus is locked");
        return None;
    }
    let result = f(bus);
    bus.unlock();
    Some(result)
}

#[cfg(test)]
mod tests {
    use crate::bitbang;
    use crate::board::Board;
    use crate::testing::{serial_pair, FakeBoard};
    use alloc::vec::Vec;

    fn session(board: &mut FakeBoard, input: &[u8]) -> Vec<u8> {
        let pins = board.pins();
        let mut aux = board.pin(pins.aux).unwrap();
        let mut cs = board.pin(pins.cs).unwrap();
        let (mut ch, sent) = serial_pair(input);
        bitbang::run(&mut ch, board, &mut aux, &mut cs).unwrap();
        let sent = sent.borrow().clone();
        sent
    }

    #[test]
    fn write_then_read_register() {
        let mut board = FakeBoard::new();
        board.i2c_devices = alloc::vec![0x50];
        let sent = session(
            &mut board,
            &[0x02, 0x08, 0x00, 0x02, 0x00, 0x02, 0xA0, 0x10, 0x00, 0x0F],
        );
        assert_eq!(sent, b"BBIO1I2C1\x01\xA0\xA1BBIO1\x01");
        assert_eq!(board.wiring.borrow().i2c_log, ["WR 50: 10 -> 2"]);
        assert_eq!(board.wiring.borrow().i2c_hz, Some(100_000));
    }

    #[test]
    fn address_only_reads() {
        let mut board = FakeBoard::new();
        board.i2c_devices = alloc::vec![0x50];
        let sent = session(
            &mut board,
            &[0x02, 0x09, 0x00, 0x01, 0x00, 0x01, 0xA1, 0x00, 0x0F],
        );
        assert_eq!(sent, b"BBIO1I2C1\x01\xA0BBIO1\x01");
        assert_eq!(board.wiring.borrow().i2c_log, ["R 50: 1"]);
    }

    #[test]
    fn nack_and_zero_counts_answer_zero() {
        let mut board = FakeBoard::new();
        let sent = session(
            &mut board,
            &[
                0x02, 0x08, 0x00, 0x01, 0x00, 0x01, 0xA0, // nobody home
                0x08, 0x00, 0x01, 0x00, 0x00, 0xA0, // nothing to read
                0x00, 0x0F,
            ],
        );
        assert_eq!(sent, b"BBIO1I2C1\x00\x00BBIO1\x01");
    }

    #[test]
    fn bulk_write_statuses() {
        let mut board = FakeBoard::new();
        board.i2c_devices = alloc::vec![0x50];
        let sent = session(
            &mut board,
            &[0x02, 0x12, 0xA0, 0x00, 0x42, 0x11, 0x40, 0x01, 0x00, 0x0F],
        );
        assert_eq!(
            sent,
            b"BBIO1I2C1\x01\x00\x00\x00\x01\x01\x01BBIO1\x01"
        );
        assert_eq!(board.wiring.borrow().i2c_log, ["W 50: 00 42"]);
    }

    #[test]
    fn framing_speed_and_ignored_bits() {
        let mut board = FakeBoard::new();
        let sent = session(&mut board, &[0x02, 0x02, 0x04, 0x03, 0x63, 0x64, 0x00, 0x0F]);
        assert_eq!(sent, b"BBIO1I2C1\x01\x01\x01\x00BBIO1\x01");
        assert_eq!(board.wiring.borrow().i2c_hz, Some(400_000));
    }
}
