//! Module `stream` watches the interactive input stream for the host's
//! request to switch to the binary protocol.
//!
//! Host tools enter binary mode by sending NUL bytes until they see the
//! `BBIO1` banner; the instrument answers after twenty consecutive NULs.

/// Consecutive NUL bytes that announce the binary protocol.
pub const MODE_SWITCH_NULS: u8 = 20;

/// `Event` is what the detector makes of one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Data(u8),
    ModeSwitch,
}

/// `Detector` filters NUL bytes out of an interactive input stream.
#[derive(Debug, Default)]
pub struct Detector {
    nuls: u8,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `feed` returns `None` for swallowed NUL bytes, `Event::ModeSwitch`
    /// once for every run of `MODE_SWITCH_NULS` of them, and the byte itself
    /// otherwise.
    pub fn feed(&mut self, byte: u8) -> Option<Event> {
        if byte != 0 {
            self.nuls = 0;
            return Some(Event::Data(byte));
        }
        self.nuls += 1;
        if self.nuls >= MODE_SWITCH_NULS {
            self.nuls = 0;
            return Some(Event::ModeSwitch);
        }
        None
    }

    pub fn reset(&mut self) {
        self.nuls = 0;
    }
}
