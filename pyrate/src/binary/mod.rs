//! Module `binary` contains the protocol sub-engines that the binary root
//! loop in `bitbang` hands the serial channel to.
//!
//! Each sub-engine announces itself with a four-byte banner, answers one
//! command byte at a time, and returns to the root loop on `0x00`. The
//! `0x4x` peripheral command is shared by all of them through `Session`.

use crate::board::Board;
use crate::low::Channel;
use crate::peripherals;
use crate::LinkError;
use alloc::vec::Vec;
use embedded_hal::serial;

pub mod i2c;
pub mod spi;
pub mod uart;

/// `Session` is what the binary protocol may touch on the board besides the
/// bus a sub-engine claims for itself.
pub struct Session<'a, B: Board> {
    pub board: &'a mut B,
    pub aux: &'a mut B::Pin,
    pub cs: &'a mut B::Pin,
}

impl<'a, B: Board> Session<'a, B> {
    pub fn new(board: &'a mut B, aux: &'a mut B::Pin, cs: &'a mut B::Pin) -> Self {
        Self { board, aux, cs }
    }

    /// `peripheral_command` handles a `0x4x` command, returning the status
    /// byte to send back.
    pub fn peripheral_command(&mut self, cmd: u8) -> u8 {
        let config = match peripherals::Config::from_command_byte(cmd) {
            Some(config) => config,
            None => return 0x00,
        };
        match config.apply(&mut *self.board, &mut *self.aux, &mut *self.cs) {
            Ok(()) => 0x01,
            Err(err) => {
                log::warn!("peripheral command 0x{:02X}: {}", cmd, err);
                0x00
            }
        }
    }
}

/// `Paired` is the payload of a write-then-read command.
pub(crate) struct Paired {
    pub writes: Vec<u8>,
    pub reads: Vec<u8>,
}

/// `read_paired` reads the two big-endian counts and the write payload of
/// a write-then-read command.
///
/// A zero count, or a read buffer that cannot be allocated, refuses the
/// command: the write payload is drained, `0x00` is sent, and `None` is
/// returned.
pub(crate) fn read_paired<TX, RX, TXErr, RXErr>(
    ch: &mut Channel<TX, RX>,
) -> Result<Option<Paired>, LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
{
    let write_count = usize::from(ch.read_u16()?);
    let read_count = usize::from(ch.read_u16()?);

    let mut writes = Vec::new();
    let mut reads = Vec::new();
    let refused = write_count == 0
        || read_count == 0
        || writes.try_reserve_exact(write_count).is_err()
        || reads.try_reserve_exact(read_count).is_err();
    if refused {
        log::warn!(
            "refusing write/read of {} then {} bytes",
            write_count,
            read_count
        );
        ch.skip(write_count)?;
        ch.reply(0x00)?;
        return Ok(None);
    }

    writes.resize(write_count, 0);
    ch.read_exact(&mut writes)?;
    reads.resize(read_count, 0);
    Ok(Some(Paired { writes, reads }))
}

/// `send_banner` writes a sub-engine's four-byte banner.
pub(crate) fn send_banner<TX, RX, TXErr, RXErr>(
    ch: &mut Channel<TX, RX>,
    banner: &[u8; 4],
) -> Result<(), LinkError<TXErr, RXErr>>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
{
    ch.write_all(banner)?;
    ch.flush()
}
