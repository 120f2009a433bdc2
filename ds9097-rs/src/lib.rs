#![no_std]
#![deny(missing_docs)]

/*! # DS9097
 *
 * Drives a 1-Wire bus through a plain UART whose TX and RX lines are tied to the
 * 1-Wire data line, the way the DS9097 passive serial adapter does.
 *
 * - A reset pulse is one `0xF0` byte at 9600 baud: devices answering with a presence
 *   pulse pull some of its data bits low.
 * - Every 1-Wire time slot is one UART byte at 115200 baud: `0xFF` for a 1 (or a read
 *   slot), `0x00` for a 0. Bit 0 of the echo is the sampled level.
 */

#[cfg(test)]
extern crate alloc;

pub use onewire_net::{OneWire, OneWireError, OneWireResult};
mod error;
mod onewire;
mod traits;

pub use error::Ds9097Error;
pub use traits::{LineConfig, SerialLine, StopBits};

/// Results of DS9097-specific function calls.
pub type Ds9097Result<T, E> = Result<T, Ds9097Error<E>>;

/// A 1-Wire bus master on top of a UART.
///
/// Takes ownership of a serial line (implementing [`SerialLine`])
/// and a timer object implementing the [`DelayNs`](embedded_hal::delay::DelayNs) trait.
pub struct Ds9097<S, D> {
    pub(crate) line: S,
    pub(crate) delay: D,
    pub(crate) reset_config: LineConfig,
    pub(crate) data_config: LineConfig,
    pub(crate) max_block: usize,
    pub(crate) retries: u8,
}

/// Builder for creating a [`Ds9097`] instance with custom configuration.
pub struct Ds9097Builder {
    retries: u8,
    reset_config: LineConfig,
    data_config: LineConfig,
    max_block: usize,
}

impl Default for Ds9097Builder {
    fn default() -> Self {
        Ds9097Builder {
            retries: 100,
            reset_config: LineConfig::RESET,
            data_config: LineConfig::DATA,
            max_block: onewire_net::DEFAULT_MAX_BLOCK_LEN,
        }
    }
}

impl Ds9097Builder {
    /// Sets the retry count.
    ///
    /// The retry count is the number of empty reads, one millisecond apart,
    /// tolerated while waiting for an echo.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the framing used for the reset pulse.
    pub fn with_reset_config(mut self, config: LineConfig) -> Self {
        self.reset_config = config;
        self
    }

    /// Sets the framing used for time slots.
    pub fn with_data_config(mut self, config: LineConfig) -> Self {
        self.data_config = config;
        self
    }

    /// Sets the largest block accepted by [`OneWire::exchange_block`].
    ///
    /// Every byte of a block costs eight UART bytes, so this bounds how much
    /// the UART FIFO has to absorb.
    pub fn with_max_block(mut self, max_block: usize) -> Self {
        self.max_block = max_block;
        self
    }

    /// Builds a new `Ds9097` instance, leaving the line configured for time slots.
    pub fn build<S: SerialLine, D>(self, mut line: S, delay: D) -> Ds9097Result<Ds9097<S, D>, S::Error> {
        line.configure(self.data_config)?;
        line.purge()?;
        Ok(Ds9097 {
            line,
            delay,
            reset_config: self.reset_config,
            data_config: self.data_config,
            max_block: self.max_block,
            retries: self.retries,
        })
    }
}

impl<S, D> Ds9097<S, D> {
    /// Releases the serial line and the timer.
    pub fn release(self) -> (S, D) {
        (self.line, self.delay)
    }
}
