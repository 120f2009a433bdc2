use crate::{Ds9097, Ds9097Error, Ds9097Result, SerialLine};
use embedded_hal::delay::DelayNs;
use log::trace;
use onewire_net::{BusStatus, OneWire, OneWireResult};

/// Sent at reset baud rate; the low time of its start bit and four zero bits is the reset pulse.
pub(crate) const RESET_PULSE: u8 = 0xf0;
pub(crate) const SLOT_ONE: u8 = 0xff;
pub(crate) const SLOT_ZERO: u8 = 0x00;

impl<S: SerialLine, D: DelayNs> Ds9097<S, D> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Ds9097Result<(), S::Error> {
        let mut filled = 0;
        let mut tries = 0;
        while filled < buf.len() {
            let n = self.line.read(&mut buf[filled..])?;
            if n == 0 {
                if tries >= self.retries {
                    return Err(Ds9097Error::RetriesExceeded);
                }
                tries += 1;
                self.delay.delay_ms(1);
            }
            filled += n;
        }
        Ok(())
    }

    fn reset_line(&mut self) -> Ds9097Result<u8, S::Error> {
        self.line.configure(self.reset_config)?;
        self.line.purge()?;
        self.line.write(&[RESET_PULSE])?;
        let mut rx = [0; 1];
        let res = self.read_exact(&mut rx);
        self.line.configure(self.data_config)?;
        res.map(|_| rx[0])
    }
}

impl<S: SerialLine, D: DelayNs> OneWire for Ds9097<S, D> {
    type BusError = Ds9097Error<S::Error>;

    fn reset(&mut self) -> OneWireResult<BusStatus, Self::BusError> {
        let echo = self.reset_line()?;
        trace!("reset echo {echo:#04x}");
        Ok(match echo {
            0x00 => BusStatus::ShortCircuit,
            RESET_PULSE => BusStatus::NoPresence,
            _ => BusStatus::Presence,
        })
    }

    fn exchange_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError> {
        self.line
            .write(&[if bit { SLOT_ONE } else { SLOT_ZERO }])
            .map_err(Ds9097Error::from)?;
        let mut rx = [0; 1];
        self.read_exact(&mut rx)?;
        Ok(rx[0] & 0x01 != 0)
    }

    fn exchange_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError> {
        self.line.purge().map_err(Ds9097Error::from)?;
        let mut slots = [SLOT_ZERO; 8];
        for (idx, slot) in slots.iter_mut().enumerate() {
            if byte & (1 << idx) != 0 {
                *slot = SLOT_ONE;
            }
        }
        self.line.write(&slots).map_err(Ds9097Error::from)?;
        let mut rx = [0; 8];
        self.read_exact(&mut rx)?;
        Ok(rx
            .iter()
            .enumerate()
            .fold(0, |acc, (idx, echo)| acc | ((echo & 0x01) << idx)))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn max_block_len(&self) -> usize {
        self.max_block
    }
}
