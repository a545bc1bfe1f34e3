//! Serial traits over the process's standard input and output, so the
//! emulator can be tried from a terminal.

use embedded_hal::serial;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How long a read waits before reporting that nothing has arrived yet.
const POLL: Duration = Duration::from_millis(10);

pub struct StdoutTx(io::Stdout);

/// `StdinRx` reads stdin on a background thread so that reads can report
/// `WouldBlock` instead of stalling the engine.
pub struct StdinRx(Receiver<u8>);

pub fn split() -> (StdoutTx, StdinRx) {
    let (send, receive) = mpsc::channel();
    thread::spawn(move || {
        for byte in io::stdin().lock().bytes() {
            match byte {
                Ok(byte) => {
                    if send.send(byte).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::error!("stdin: {}", err);
                    break;
                }
            }
        }
        log::debug!("stdin closed");
    });
    (StdoutTx(io::stdout()), StdinRx(receive))
}

impl serial::Write<u8> for StdoutTx {
    type Error = io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), io::Error> {
        self.0.write_all(&[word]).map_err(nb::Error::Other)
    }

    fn flush(&mut self) -> nb::Result<(), io::Error> {
        self.0.flush().map_err(nb::Error::Other)
    }
}

impl serial::Read<u8> for StdinRx {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u8, io::Error> {
        match self.0.recv_timeout(POLL) {
            Ok(byte) => Ok(byte),
            Err(RecvTimeoutError::Timeout) => Err(nb::Error::WouldBlock),
            Err(RecvTimeoutError::Disconnected) => Err(nb::Error::Other(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed",
            ))),
        }
    }
}
