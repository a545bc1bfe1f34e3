//! prcli - Bus Pirate emulator on a simulated board
//!
//! Serves the `pyrate` engine over a serial port, or over standard input
//! and output, against `SimBoard`. Host tools that speak the Bus Pirate
//! protocol can be pointed at the port (a pseudo-terminal works too).

mod sim;
mod stdio;

use clap::Parser;
use embedded_hal::serial;
use pyrate::console::Console;
use pyrate::Pyrate;
use serial_embedded_hal::{PortSettings, Serial};
use sim::SimBoard;
use std::fmt;

#[derive(Parser)]
#[command(name = "prcli")]
#[command(version, about = "Bus Pirate emulator on a simulated board", long_about = None)]
struct Cli {
    /// Serial port to serve on; standard input and output when omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate of the serial port
    #[arg(short, long, default_value_t = 115_200)]
    baud: usize,

    /// Pretend the board has no SPI or I2C controllers
    #[arg(long)]
    bitbang: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the verbosity flags.
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_default_env()
        .init();

    match &cli.port {
        Some(path) => {
            let port = Serial::new(
                path,
                &PortSettings {
                    baud_rate: serial_embedded_hal::BaudRate::from_speed(cli.baud),
                    char_size: serial_embedded_hal::CharSize::Bits8,
                    parity: serial_embedded_hal::Parity::ParityNone,
                    stop_bits: serial_embedded_hal::StopBits::Stop1,
                    flow_control: serial_embedded_hal::FlowControl::FlowNone,
                },
            )?;
            log::info!("serving on {} at {} baud", path, cli.baud);
            let (tx, rx) = port.split();
            serve(tx, rx, cli.bitbang)
        }
        None => {
            let (tx, rx) = stdio::split();
            serve(tx, rx, cli.bitbang)
        }
    }
}

fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// `serve` runs the engine until the link goes away, starting over with a
/// fresh board after every reset.
fn serve<TX, RX>(tx: TX, rx: RX, bitbang: bool) -> Result<(), Box<dyn std::error::Error>>
where
    TX: serial::Write<u8>,
    RX: serial::Read<u8>,
    TX::Error: fmt::Debug,
    RX::Error: fmt::Debug,
{
    let mut console = Console::new(tx, rx);
    loop {
        let mut pyrate = Pyrate::new(SimBoard::new(bitbang))?;
        match pyrate.serve(&mut console) {
            Ok(()) => log::info!("reset"),
            Err(pyrate::Error::Link) => {
                log::info!("serial link closed");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
}
