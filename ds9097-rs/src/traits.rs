/// Number of stop bits per UART frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit.
    One,
    /// Two stop bits.
    Two,
}

/// UART framing for one phase of the 1-Wire protocol. Always 8 data bits, no parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    /// Baud rate.
    pub baud: u32,
    /// Stop bits.
    pub stop_bits: StopBits,
}

impl LineConfig {
    /// 9600 baud, one stop bit: one UART byte spans a 1-Wire reset and presence window.
    pub const RESET: LineConfig = LineConfig {
        baud: 9600,
        stop_bits: StopBits::One,
    };

    /// 115200 baud, two stop bits: one UART byte spans a 1-Wire time slot.
    pub const DATA: LineConfig = LineConfig {
        baud: 115_200,
        stop_bits: StopBits::Two,
    };
}

/// A full-duplex serial line whose TX and RX are both tied to the 1-Wire data line.
///
/// Everything written is read back, ANDed with whatever the devices pulled low.
pub trait SerialLine {
    /// Errors reported by the serial driver.
    type Error;

    /// Changes the baud rate and framing.
    fn configure(&mut self, config: LineConfig) -> Result<(), Self::Error>;

    /// Discards pending input and output.
    fn purge(&mut self) -> Result<(), Self::Error>;

    /// Writes all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads up to `buf.len()` bytes, returning how many arrived. Zero means none yet.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<T: SerialLine + ?Sized> SerialLine for &mut T {
    type Error = T::Error;

    fn configure(&mut self, config: LineConfig) -> Result<(), Self::Error> {
        (**self).configure(config)
    }

    fn purge(&mut self) -> Result<(), Self::Error> {
        (**self).purge()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buf)
    }
}
