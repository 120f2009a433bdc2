//! Command constants for 1-Wire communication.

/// Command to match a specific ROM address in 1-Wire communication.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to search for devices on the 1-Wire bus.
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to search for devices in alarm state on the 1-Wire bus.
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;

/// Initiates a single temperature conversion on the addressed thermometer.
pub const ONEWIRE_CONVERT_T_CMD: u8 = 0x44;

/// Reads the contents of the scratchpad of the addressed device.
pub const ONEWIRE_READ_SCRATCHPAD_CMD: u8 = 0xbe;

/// Writes the T_H, T_L and configuration bytes to the scratchpad.
pub const ONEWIRE_WRITE_SCRATCHPAD_CMD: u8 = 0x4e;

/// Copies the T_H, T_L and configuration bytes of the scratchpad to EEPROM.
pub const ONEWIRE_COPY_SCRATCHPAD_CMD: u8 = 0x48;
