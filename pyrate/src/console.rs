//! Module `console` is the line-oriented front end of the interactive mode.
//!
//! Everything that prints or asks questions goes through the `Terminal`
//! trait, so that the engines can be driven by a real serial console or by
//! a script in tests.

use crate::low::Channel;
use crate::stream::{Detector, Event};
use crate::Error;
use alloc::string::String;
use core::fmt::{self, Write as _};
use embedded_hal::serial;

/// `Line` is the result of reading one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),

    /// The host announced the binary protocol instead of finishing the line.
    ModeSwitch,
}

/// `Terminal` is where transcripts are written and answers are read from.
///
/// Text is written through `fmt::Write` with `\n` line endings; the
/// implementation takes care of whatever the wire needs.
pub trait Terminal: fmt::Write {
    /// `read_line` shows `prompt` and waits for a line of input.
    fn read_line(&mut self, prompt: &str) -> Result<Line, Error>;

    /// `poll_key` returns a pending keypress, if any, without waiting.
    fn poll_key(&mut self) -> Result<Option<u8>, Error>;

    /// `write_bytes` passes raw bytes through untranslated.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

/// `select_option` prints a numbered menu and returns the zero-based index
/// of the chosen option. An empty answer picks `default`.
pub fn select_option<S: AsRef<str>>(
    term: &mut dyn Terminal,
    message: &str,
    options: &[S],
    default: usize,
) -> Result<usize, Error> {
    writeln!(term, "{}", message)?;
    for (i, option) in options.iter().enumerate() {
        writeln!(term, " {}. {}", i + 1, option.as_ref())?;
    }
    let prompt = alloc::format!("({})>", default + 1);
    loop {
        let answer = match term.read_line(&prompt)? {
            Line::Text(answer) => answer,
            Line::ModeSwitch => return Err(Error::ModeSwitch),
        };
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => return Ok(n - 1),
            _ => writeln!(term, "Invalid choice, try again")?,
        }
    }
}

/// `print_bytes` writes `label` followed by the bytes in hex on one line.
pub fn print_bytes(term: &mut dyn Terminal, label: &str, bytes: &[u8]) -> Result<(), Error> {
    term.write_str(label)?;
    for b in bytes {
        write!(term, " 0x{:02X}", b)?;
    }
    writeln!(term)?;
    Ok(())
}

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// `Console` is a `Terminal` on a serial channel.
///
/// It echoes what the user types, handles backspace, and watches the input
/// for the binary protocol announcement.
pub struct Console<TX: serial::Write<u8>, RX: serial::Read<u8>> {
    ch: Channel<TX, RX>,
    detector: Detector,
    after_cr: bool,
}

impl<TX, RX> Console<TX, RX>
where
    TX: serial::Write<u8>,
    RX: serial::Read<u8>,
    TX::Error: fmt::Debug,
    RX::Error: fmt::Debug,
{
    pub fn new(tx: TX, rx: RX) -> Self {
        Self {
            ch: Channel::new(tx, rx),
            detector: Detector::new(),
            after_cr: false,
        }
    }

    /// `channel_mut` gives direct access to the serial channel, bypassing
    /// echo and mode detection.
    pub fn channel_mut(&mut self) -> &mut Channel<TX, RX> {
        self.detector.reset();
        &mut self.ch
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ch.write_all(bytes).map_err(link_error)
    }
}

fn link_error<E: fmt::Display>(err: E) -> Error {
    log::error!("{}", err);
    Error::Link
}

impl<TX, RX> fmt::Write for Console<TX, RX>
where
    TX: serial::Write<u8>,
    RX: serial::Read<u8>,
    TX::Error: fmt::Debug,
    RX::Error: fmt::Debug,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for (i, part) in s.split('\n').enumerate() {
            if i > 0 {
                self.send(b"\r\n").map_err(|_| fmt::Error)?;
            }
            self.send(part.as_bytes()).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

impl<TX, RX> Terminal for Console<TX, RX>
where
    TX: serial::Write<u8>,
    RX: serial::Read<u8>,
    TX::Error: fmt::Debug,
    RX::Error: fmt::Debug,
{
    fn read_line(&mut self, prompt: &str) -> Result<Line, Error> {
        self.send(prompt.as_bytes())?;
        self.ch.flush().map_err(link_error)?;
        let mut line = String::new();
        loop {
            let byte = self.ch.read().map_err(link_error)?;
            let byte = match self.detector.feed(byte) {
                None => continue,
                Some(Event::ModeSwitch) => return Ok(Line::ModeSwitch),
                Some(Event::Data(byte)) => byte,
            };
            let after_cr = core::mem::replace(&mut self.after_cr, byte == b'\r');
            match byte {
                b'\n' if after_cr => {}
                b'\r' | b'\n' => {
                    self.send(b"\r\n")?;
                    return Ok(Line::Text(line));
                }
                BACKSPACE | DELETE => {
                    if line.pop().is_some() {
                        self.send(b"\x08 \x08")?;
                    }
                }
                0x20..=0x7E => {
                    line.push(char::from(byte));
                    self.send(&[byte])?;
                }
                _ => log::trace!("dropped control byte 0x{:02X}", byte),
            }
            self.ch.flush().map_err(link_error)?;
        }
    }

    fn poll_key(&mut self) -> Result<Option<u8>, Error> {
        self.ch.try_read().map_err(link_error)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.send(bytes)?;
        self.ch.flush().map_err(link_error)
    }
}
