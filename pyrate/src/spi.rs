//! Module `spi` holds the SPI bus configuration shared by the interactive
//! mode and the binary protocol, and the interactive SPI mode itself.

use crate::action::Action;
use crate::board::{claim_spi, Board, UserPin};
use crate::bus::SpiBus;
use crate::console::{print_bytes, select_option, Terminal};
use crate::mode::{Capabilities, Mode};
use crate::Error;
use alloc::boxed::Box;
use alloc::vec;
use embedded_hal::spi::{Mode as SpiMode, Phase, Polarity};

pub const NAME: &str = "SPI";
pub const CAPABILITIES: Capabilities = Capabilities::PULLUPS
    .union(Capabilities::PIN_DIRECTIONS)
    .union(Capabilities::CHIP_SELECT);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Speed30KHz,
    Speed125KHz,
    Speed250KHz,
    Speed1MHz,
    Speed2MHz,
    Speed2_6MHz,
    Speed4MHz,
    Speed8MHz,
}

impl Speed {
    const ALL: [Speed; 8] = [
        Speed::Speed30KHz,
        Speed::Speed125KHz,
        Speed::Speed250KHz,
        Speed::Speed1MHz,
        Speed::Speed2MHz,
        Speed::Speed2_6MHz,
        Speed::Speed4MHz,
        Speed::Speed8MHz,
    ];

    /// `from_index` decodes the speed index used by the `0x6x` binary
    /// command.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn hz(self) -> u32 {
        match self {
            Speed::Speed30KHz => 30_000,
            Speed::Speed125KHz => 125_000,
            Speed::Speed250KHz => 250_000,
            Speed::Speed1MHz => 1_000_000,
            Speed::Speed2MHz => 2_000_000,
            Speed::Speed2_6MHz => 2_600_000,
            Speed::Speed4MHz => 4_000_000,
            Speed::Speed8MHz => 8_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutput {
    HiZ,
    Push3V3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockIdle {
    Low,
    High,
}

/// `ClockEdge` is the clock transition on which output data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEdge {
    IdleToActive,
    ActiveToIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTime {
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub speed: Speed,
    pub output: PinOutput,
    pub idle: ClockIdle,
    pub edge: ClockEdge,
    pub sample: SampleTime,
}

pub const DEFAULT_CONFIG: Config = Config {
    speed: Speed::Speed30KHz,
    output: PinOutput::HiZ,
    idle: ClockIdle::Low,
    edge: ClockEdge::ActiveToIdle,
    sample: SampleTime::Middle,
};

impl Default for Config {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl Config {
    /// `command_byte` encodes the format bits of the `0x8x` binary command.
    pub fn command_byte(&self) -> u8 {
        let mut cmd = 0b1000_0000u8;
        cmd |= (match self.output {
            PinOutput::HiZ => 0,
            PinOutput::Push3V3 => 1,
        }) << 3;
        cmd |= (match self.idle {
            ClockIdle::Low => 0,
            ClockIdle::High => 1,
        }) << 2;
        cmd |= (match self.edge {
            ClockEdge::IdleToActive => 0,
            ClockEdge::ActiveToIdle => 1,
        }) << 1;
        cmd |= match self.sample {
            SampleTime::Middle => 0,
            SampleTime::End => 1,
        };
        cmd
    }

    /// `with_command_byte` applies the format bits of a `0x8x` binary
    /// command, keeping the speed.
    pub fn with_command_byte(self, cmd: u8) -> Self {
        let bit = |n: u8| cmd & (1 << n) != 0;
        Config {
            speed: self.speed,
            output: if bit(3) { PinOutput::Push3V3 } else { PinOutput::HiZ },
            idle: if bit(2) { ClockIdle::High } else { ClockIdle::Low },
            edge: if bit(1) {
                ClockEdge::ActiveToIdle
            } else {
                ClockEdge::IdleToActive
            },
            sample: if bit(0) { SampleTime::End } else { SampleTime::Middle },
        }
    }

    /// `mode` translates the clock settings into SPI mode terms. Output
    /// changing on the active-to-idle edge means data is sampled on the
    /// first edge.
    pub fn mode(&self) -> SpiMode {
        SpiMode {
            polarity: match self.idle {
                ClockIdle::Low => Polarity::IdleLow,
                ClockIdle::High => Polarity::IdleHigh,
            },
            phase: match self.edge {
                ClockEdge::ActiveToIdle => Phase::CaptureOnFirstTransition,
                ClockEdge::IdleToActive => Phase::CaptureOnSecondTransition,
            },
        }
    }
}

/// `Spi` is the interactive SPI mode.
pub struct Spi<S: SpiBus, P: UserPin> {
    bus: S,
    cs: P,
    config: Config,
    cs_active_low: bool,
}

pub fn build<B: Board>(board: &mut B, term: &mut dyn Terminal) -> Result<Box<dyn Mode>, Error> {
    let speed = select_option(term, "Set speed:", &["30KHz", "125KHz", "250KHz", "1MHz"], 0)?;
    let idle = select_option(term, "Clock polarity:", &["Idle low *default", "Idle high"], 0)?;
    let edge = select_option(
        term,
        "Output clock edge:",
        &["Idle to active", "Active to idle *default"],
        1,
    )?;
    let cs_active_low = select_option(term, "CS:", &["CS", "/CS *default"], 1)? == 1;

    let config = Config {
        speed: Speed::ALL[speed],
        output: PinOutput::Push3V3,
        idle: if idle == 1 { ClockIdle::High } else { ClockIdle::Low },
        edge: if edge == 1 {
            ClockEdge::ActiveToIdle
        } else {
            ClockEdge::IdleToActive
        },
        sample: SampleTime::Middle,
    };

    let bus = claim_spi(board)?;
    log::debug!("spi: hardware controller {}", bus.is_hardware());
    let cs = board.pins().cs;
    let mut cs = board.pin(cs)?;
    cs.set_output(cs_active_low)?;
    Ok(Box::new(Spi {
        bus,
        cs,
        config,
        cs_active_low,
    }))
}

impl<S: SpiBus, P: UserPin> Spi<S, P> {
    fn replay(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error> {
        self.bus.configure(&self.config)?;
        let slash = if self.cs_active_low { "/" } else { "" };
        for action in actions {
            match *action {
                Action::Start => {
                    self.cs.set_output(!self.cs_active_low)?;
                    writeln!(term, "{}CS ENABLED", slash)?;
                }
                Action::Stop => {
                    self.cs.set_output(self.cs_active_low)?;
                    writeln!(term, "{}CS DISABLED", slash)?;
                }
                Action::Write { value, repeat } => {
                    let buffer = vec![value; usize::from(repeat)];
                    print_bytes(term, "WRITE", &buffer)?;
                    self.bus.write(&buffer)?;
                }
                Action::Read { repeat } => {
                    let mut buffer = vec![0u8; usize::from(repeat)];
                    self.bus.read(&mut buffer)?;
                    print_bytes(term, "READ", &buffer)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl<S: SpiBus + 'static, P: UserPin + 'static> Mode for Spi<S, P> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run_sequence(&mut self, actions: &[Action], term: &mut dyn Terminal) -> Result<(), Error> {
        if !self.bus.try_lock() {
            return Ok(());
        }
        let result = self.replay(actions, term);
        self.bus.unlock();
        result
    }

    fn pin_functions(&self) -> &'static str {
        "CLK     MOSI    CS      MISO"
    }

    fn pin_directions(&self) -> &'static str {
        "O       O       O       I"
    }

    fn cs_pin(&mut self) -> Option<&mut dyn UserPin> {
        Some(&mut self.cs)
    }
}
