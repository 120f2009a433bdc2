use core::fmt;

#[derive(Debug)]
/// UART adapter errors.
pub enum Ds9097Error<E> {
    /// Serial line errors.
    Serial(E),
    /// The line stayed silent for more reads than the retry count allows.
    RetriesExceeded,
}

impl<E> From<E> for Ds9097Error<E> {
    fn from(value: E) -> Self {
        Self::Serial(value)
    }
}

impl<E: fmt::Display> fmt::Display for Ds9097Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(e) => write!(f, "serial line error: {e}"),
            Self::RetriesExceeded => f.write_str("no echo from the serial line"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for Ds9097Error<E> {}
