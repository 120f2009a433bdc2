use core::fmt;

/// One wire communication error type.
///
/// Every protocol operation either succeeds or fails with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates an unrecoverable error escalated by the underlying transport.
    Other(E),
    /// The reset sequence failed, e.g. the data line is shorted to ground.
    ResetFailed,
    /// No presence pulse was detected after a reset.
    NoDevicesOnNet,
    /// A byte or bit echoed by the bus differs from the one written.
    WriteVerifyFailed,
    /// A search round did not assemble a valid ROM code.
    SearchError,
    /// A block exceeds the per-transaction limit of the transport.
    BlockTooBig,
    /// The READ SCRATCHPAD command was not echoed correctly.
    ReadScratchpadFailed,
    /// The scratchpad never validated within the attempt budget.
    ReadStatusNotComplete,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}

impl<E: fmt::Display> fmt::Display for OneWireError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(e) => write!(f, "transport error: {e}"),
            Self::ResetFailed => f.write_str("bus reset failed"),
            Self::NoDevicesOnNet => f.write_str("no devices on the 1-Wire net"),
            Self::WriteVerifyFailed => f.write_str("write verification failed"),
            Self::SearchError => f.write_str("search round produced an invalid ROM code"),
            Self::BlockTooBig => f.write_str("block too big for the transport"),
            Self::ReadScratchpadFailed => f.write_str("read scratchpad command failed"),
            Self::ReadStatusNotComplete => f.write_str("scratchpad did not validate"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for OneWireError<E> {}
