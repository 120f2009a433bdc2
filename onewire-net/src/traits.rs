use crate::{OneWireError, OneWireResult};

/// Block limit applied when a transport does not declare its own.
///
/// Each 1-Wire bit costs one UART byte on a serial bridge, so this keeps a
/// block within a typical UART FIFO.
pub const DEFAULT_MAX_BLOCK_LEN: usize = 160;

/// Outcome of the bus reset and presence-detect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStatus {
    /// At least one device answered with a presence pulse.
    Presence,
    /// Nothing answered the reset.
    NoPresence,
    /// The data line is held low.
    ShortCircuit,
}

/// Trait for 1-Wire communication.
///
/// This trait defines the primitive operations required for 1-Wire communication.
/// Implementors own all physical timing: reset pulse width, time slot duration and
/// the presence-detect window. Every call is expected to be atomic and blocking.
///
/// The bus is open-drain: writing a `1` releases the line, so the value sampled in
/// any time slot is the logical AND of what the master and every participating
/// device drive.
pub trait OneWire {
    /// The error type escalated by the transport when the physical link itself fails.
    type BusError;

    /// Resets the 1-Wire bus and reports whether any device is present.
    ///
    /// # Errors
    /// This method returns an error if the transport cannot perform the reset at all.
    fn reset(&mut self) -> OneWireResult<BusStatus, Self::BusError>;

    /// Drives one time slot with `bit` and returns the sampled wired-AND result.
    ///
    /// Writing `true` is a read slot: the result is whatever the devices drive.
    fn exchange_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError>;

    /// Drives eight time slots, least significant bit first, and returns the sampled byte.
    ///
    /// Writing `0xff` reads a byte from the addressed device.
    fn exchange_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError>;

    /// Blocks for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Largest block accepted by [`exchange_block`](OneWire::exchange_block).
    fn max_block_len(&self) -> usize {
        DEFAULT_MAX_BLOCK_LEN
    }

    /// Exchanges every byte of `block` in place.
    ///
    /// # Errors
    /// Returns [`OneWireError::BlockTooBig`] without touching the bus if the block is
    /// longer than [`max_block_len`](OneWire::max_block_len).
    fn exchange_block(&mut self, block: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        if block.len() > self.max_block_len() {
            return Err(OneWireError::BlockTooBig);
        }
        for byte in block.iter_mut() {
            *byte = self.exchange_byte(*byte)?;
        }
        Ok(())
    }

    /// Resets the bus and maps a missing presence pulse to a protocol error.
    ///
    /// A shorted line yields [`OneWireError::ResetFailed`], a silent one
    /// [`OneWireError::NoDevicesOnNet`].
    fn reset_presence(&mut self) -> OneWireResult<(), Self::BusError> {
        match self.reset()? {
            BusStatus::Presence => Ok(()),
            BusStatus::NoPresence => Err(OneWireError::NoDevicesOnNet),
            BusStatus::ShortCircuit => Err(OneWireError::ResetFailed),
        }
    }

    /// Writes a byte and checks that the bus echoed it unchanged.
    ///
    /// # Errors
    /// Returns [`OneWireError::WriteVerifyFailed`] on any difference.
    fn write_verified(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        if self.exchange_byte(byte)? != byte {
            Err(OneWireError::WriteVerifyFailed)
        } else {
            Ok(())
        }
    }
}

impl<T: OneWire + ?Sized> OneWire for &mut T {
    type BusError = T::BusError;

    fn reset(&mut self) -> OneWireResult<BusStatus, Self::BusError> {
        (**self).reset()
    }

    fn exchange_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError> {
        (**self).exchange_bit(bit)
    }

    fn exchange_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError> {
        (**self).exchange_byte(byte)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn max_block_len(&self) -> usize {
        (**self).max_block_len()
    }

    fn exchange_block(&mut self, block: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        (**self).exchange_block(block)
    }
}
