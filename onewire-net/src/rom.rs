use core::fmt;

use crate::{ONEWIRE_MATCH_ROM_CMD, OneWire, OneWireCrc, OneWireResult};

/// A 64-bit 1-Wire ROM code.
///
/// Stored so that the byte order of [`to_bytes`](RomCode::to_bytes) is the order
/// in which the code travels on the bus:
///
/// | Bit | Description |
/// |-----|-------------|
/// | 0-7 | Family code (e.g., 0x28 for DS18B20) |
/// | 8-55 | Serial number |
/// | 56-63 | CRC-8 over bytes 0-6 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RomCode(u64);

impl RomCode {
    /// Wraps a raw value, family code in the least significant byte.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds a ROM code from its bytes in bus order.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Builds a ROM code from a family code and serial number, computing the check byte.
    pub fn from_parts(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [family, 0, 0, 0, 0, 0, 0, 0];
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = OneWireCrc::compute(&bytes[..7]);
        Self::from_bytes(bytes)
    }

    /// Bytes in bus order: family code first, check byte last.
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// The raw 64-bit value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The device family code.
    pub const fn family(self) -> u8 {
        self.0 as u8
    }

    /// The 48-bit serial number, in bus order.
    pub fn serial(self) -> [u8; 6] {
        let mut serial = [0; 6];
        serial.copy_from_slice(&self.to_bytes()[1..7]);
        serial
    }

    /// The stored check byte.
    pub const fn crc(self) -> u8 {
        (self.0 >> 56) as u8
    }

    /// Whether the CRC-8 over all eight bytes reduces to zero.
    pub fn is_valid(self) -> bool {
        OneWireCrc::validate(&self.to_bytes())
    }

    /// Selects this device with a MATCH ROM sequence.
    ///
    /// Resets the bus, sends the MATCH ROM command and then the eight ROM bytes
    /// in bus order, checking the echo of every byte. Afterwards only the matching
    /// device listens to function commands.
    ///
    /// # Errors
    /// - [`ResetFailed`](crate::OneWireError::ResetFailed) or
    ///   [`NoDevicesOnNet`](crate::OneWireError::NoDevicesOnNet) if the reset fails.
    /// - [`WriteVerifyFailed`](crate::OneWireError::WriteVerifyFailed) on the first
    ///   byte that is not echoed unchanged; nothing more is sent after it.
    pub fn access<T: OneWire + ?Sized>(self, bus: &mut T) -> OneWireResult<(), T::BusError> {
        bus.reset_presence()?;
        bus.write_verified(ONEWIRE_MATCH_ROM_CMD)?;
        for byte in self.to_bytes() {
            bus.write_verified(byte)?;
        }
        Ok(())
    }
}

impl From<u64> for RomCode {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<RomCode> for u64 {
    fn from(rom: RomCode) -> Self {
        rom.0
    }
}

impl From<[u8; 8]> for RomCode {
    fn from(bytes: [u8; 8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::LowerHex for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
