use std::io::{self, Read, Write};
use std::time::Duration;

use ds9097::{LineConfig, SerialLine, StopBits};
use serialport::{ClearBuffer, SerialPort};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LineError {
    #[error("serial port: {0}")]
    Port(#[from] serialport::Error),
    #[error("serial I/O: {0}")]
    Io(#[from] io::Error),
}

/// A host serial port used as a 1-Wire line.
pub struct PortLine {
    port: Box<dyn SerialPort>,
}

impl PortLine {
    pub fn open(path: &str, timeout: Duration) -> Result<Self, LineError> {
        let port = serialport::new(path, LineConfig::DATA.baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::Two)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()?;
        Ok(Self { port })
    }
}

impl SerialLine for PortLine {
    type Error = LineError;

    fn configure(&mut self, config: LineConfig) -> Result<(), Self::Error> {
        self.port.set_baud_rate(config.baud)?;
        self.port.set_stop_bits(match config.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        })?;
        Ok(())
    }

    fn purge(&mut self) -> Result<(), Self::Error> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Name of the first serial port the host reports, if any.
pub fn first_port() -> Result<Option<String>, LineError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .next()
        .map(|port| port.port_name))
}

/// Prints the serial ports the host knows about.
pub fn list_ports() -> Result<(), LineError> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => println!(
                "{} (USB {:04x}:{:04x} {})",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
