use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ds18x20::Thermometer;
use onewire_net::{OneWire, OneWireError, OneWireSearch, OneWireSearchKind, RomCode};

mod line;

/// Read 1-Wire thermometers through a serial port adapter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port the adapter is attached to (e.g., /dev/ttyUSB0), defaults to the first one found
    #[arg(short, long)]
    port: Option<String>,
    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,
    /// Only search for this family code, in hex (e.g., 28)
    #[arg(short, long, value_parser = parse_family)]
    family: Option<u8>,
    /// Only report devices whose alarm flag is set
    #[arg(short, long)]
    alarm: bool,
    /// Number of passes over the bus, 0 to run forever
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,
    /// Pause between passes in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,
}

fn parse_family(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid family code {s:?}: {e}"))
}

/// One search over the bus, updating every thermometer it turns up.
fn poll<T: OneWire>(
    bus: &mut T,
    kind: OneWireSearchKind,
    family: Option<u8>,
    thermometers: &mut BTreeMap<RomCode, Option<Thermometer>>,
) -> Result<(), OneWireError<T::BusError>>
where
    T::BusError: fmt::Display,
{
    let search = match family {
        Some(family) => OneWireSearch::with_family(bus, kind, family),
        None => OneWireSearch::new(bus, kind),
    };
    search.scan(|bus, rom| {
        let Some(thermometer) = thermometers
            .entry(rom)
            .or_insert_with(|| Thermometer::new(rom))
            .as_mut()
        else {
            log::debug!("{rom}: not a thermometer, skipping");
            return Ok(());
        };
        match thermometer.update(bus) {
            Ok(()) => log::info!("{thermometer}"),
            Err(OneWireError::Other(e)) => return Err(OneWireError::Other(e)),
            Err(e) => log::warn!("{rom}: {e}, last reading {thermometer}"),
        }
        Ok(())
    })
}

/// Logs protocol failures of a pass and hands back only the transport failure, which ends the run.
fn end_of_pass<E: fmt::Display>(result: Result<(), OneWireError<E>>) -> Result<(), E> {
    match result {
        Ok(()) => Ok(()),
        Err(OneWireError::Other(e)) => Err(e),
        Err(OneWireError::NoDevicesOnNet) => {
            log::warn!("no devices on the bus");
            Ok(())
        }
        Err(e) => {
            log::warn!("bus search: {e}");
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    if args.list {
        line::list_ports()?;
        return Ok(());
    }
    let path = match args.port {
        Some(path) => path,
        None => line::first_port()?.context("no serial ports found")?,
    };
    log::info!("using {path}");
    let line = line::PortLine::open(&path, Duration::from_millis(10))
        .with_context(|| format!("failed to open {path}"))?;
    let mut bus = ds9097::Ds9097Builder::default()
        .build(line, linux_embedded_hal::Delay)
        .context("failed to configure the serial adapter")?;
    let kind = if args.alarm {
        OneWireSearchKind::Alarmed
    } else {
        OneWireSearchKind::Normal
    };
    let mut thermometers = BTreeMap::new();
    let mut pass = 0;
    loop {
        end_of_pass(poll(&mut bus, kind, args.family, &mut thermometers))
            .context("serial adapter failed")?;
        pass += 1;
        if args.count != 0 && pass >= args.count {
            break;
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }
    Ok(())
}
