#![no_std]
#![deny(missing_docs)]
//! # ds18x20
//!
//! Polls 1-Wire thermometers addressed by ROM code: starts a conversion, reads the
//! scratchpad back, validates it and decodes the temperature according to the
//! device family. Transient faults (CRC mismatch, known DS1820 glitch signatures)
//! are retried within a fixed attempt budget.

use core::fmt;

use bitfield_struct::bitfield;
use fixed::types::I12F4;
use log::{debug, warn};
use onewire_net::{
    ONEWIRE_CONVERT_T_CMD, ONEWIRE_READ_SCRATCHPAD_CMD, OneWire, OneWireCrc, OneWireError,
    OneWireResult, RomCode,
};

/// Attempts made by [`Thermometer::update`] before giving up.
pub const DEFAULT_ATTEMPTS: u8 = 3;

/// Time allowed for a conversion. The slowest supported part needs 750 ms at 12 bits.
pub const CONVERSION_DELAY_MS: u32 = 1000;

/// Temperature reported before the first successful update: 0 K.
pub const ABSOLUTE_ZERO: f64 = -273.15;

/// Supported thermometer families, keyed by the family code of the ROM.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermometerFamily {
    /// DS1820 / DS18S20, half-degree resolution with count registers.
    Ds1820 = 0x10,
    /// DS1822 econo thermometer.
    Ds1822 = 0x22,
    /// DS18B20 programmable resolution thermometer.
    Ds18b20 = 0x28,
    /// DS1923 hygrochron temperature logger.
    Ds1923 = 0x41,
    /// DS28EA00 thermometer with sequence detect and PIO.
    Ds28ea00 = 0x42,
}

impl ThermometerFamily {
    /// The family code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether `rom` belongs to a supported thermometer.
    pub fn supports(rom: RomCode) -> bool {
        Self::try_from(rom.family()).is_ok()
    }

    fn decode(self, scratchpad: &Scratchpad, first_attempt: bool, glitch_retried: bool) -> Decoded {
        use ThermometerFamily::*;
        match self {
            Ds18b20 | Ds1822 | Ds28ea00 | Ds1923 => {
                Decoded::Celsius(scratchpad.raw_temperature().to_num::<f64>())
            }
            Ds1820 => {
                let count_per_c = scratchpad.count_per_c() as i32;
                let count_remain = scratchpad.count_remain() as i32;
                if first_attempt && count_per_c - count_remain == 1 {
                    return Decoded::Glitch;
                }
                if !glitch_retried && scratchpad.matches_ds18s20_error() {
                    return Decoded::Glitch;
                }
                let [lsb, msb, ..] = scratchpad.0;
                let half_degrees = i16::from_le_bytes([lsb, msb]) >> 1;
                let correction = (count_per_c - count_remain)
                    .checked_div(count_per_c)
                    .unwrap_or(0);
                Decoded::Celsius(half_degrees as f64 - 0.25 + correction as f64)
            }
        }
    }
}

impl TryFrom<u8> for ThermometerFamily {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ThermometerFamily::*;
        match value {
            0x10 => Ok(Ds1820),
            0x22 => Ok(Ds1822),
            0x28 => Ok(Ds18b20),
            0x41 => Ok(Ds1923),
            0x42 => Ok(Ds28ea00),
            other => Err(other),
        }
    }
}

enum Decoded {
    Celsius(f64),
    Glitch,
}

/// Conversion resolution selected by the configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 0.5 °C steps.
    Bits9,
    /// 0.25 °C steps.
    Bits10,
    /// 0.125 °C steps.
    Bits11,
    /// 0.0625 °C steps.
    #[default]
    Bits12,
}

impl Resolution {
    /// Number of significant bits.
    pub fn bits(&self) -> u8 {
        use Resolution::*;
        match self {
            Bits9 => 9,
            Bits10 => 10,
            Bits11 => 11,
            Bits12 => 12,
        }
    }
}

#[bitfield(u8)]
/// Configuration register, scratchpad byte 4.
pub struct ConfigRegister {
    #[bits(5)]
    __reserved_low: u8,
    /// R1:R0, `0b00` is 9 bits up to `0b11` for 12 bits.
    #[bits(2)]
    pub resolution_code: u8,
    #[bits(1)]
    __reserved_high: u8,
}

impl ConfigRegister {
    /// Resolution selected by R1:R0.
    pub fn resolution(&self) -> Resolution {
        match self.resolution_code() {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }
}

/// The nine scratchpad bytes as read off the bus.
///
/// | Byte | Contents |
/// |------|----------|
/// | 0 | Temperature LSB |
/// | 1 | Temperature MSB (sign byte on the DS1820) |
/// | 2 | T_H alarm register |
/// | 3 | T_L alarm register |
/// | 4 | Configuration register |
/// | 5 | Reserved |
/// | 6 | COUNT REMAIN (DS1820) |
/// | 7 | COUNT PER °C (DS1820) |
/// | 8 | CRC-8 over bytes 0-7 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad(pub [u8; 9]);

impl Scratchpad {
    /// Whether the check byte matches.
    pub fn is_valid(&self) -> bool {
        OneWireCrc::validate(&self.0)
    }

    /// Temperature register as a signed 1/16 °C fixed point value.
    pub fn raw_temperature(&self) -> I12F4 {
        I12F4::from_le_bytes([self.0[0], self.0[1]])
    }

    /// T_H alarm byte.
    pub fn alarm_high(&self) -> u8 {
        self.0[2]
    }

    /// T_L alarm byte.
    pub fn alarm_low(&self) -> u8 {
        self.0[3]
    }

    /// Configuration register.
    pub fn config(&self) -> ConfigRegister {
        ConfigRegister::from_bits(self.0[4])
    }

    /// COUNT REMAIN register.
    pub fn count_remain(&self) -> u8 {
        self.0[6]
    }

    /// COUNT PER °C register.
    pub fn count_per_c(&self) -> u8 {
        self.0[7]
    }

    // Known bad read of a DS18S20 right after power-up.
    fn matches_ds18s20_error(&self) -> bool {
        self.alarm_low() == 0xaa
            && self.alarm_high() == 0x00
            && self.count_remain() == 0x0c
            && self.count_per_c() == 0x10
    }
}

/// Last decoded state of one thermometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermometerReading {
    /// Temperature in °C.
    pub temperature: f64,
    /// Conversion resolution.
    pub resolution: Resolution,
    /// Raw T_L alarm byte.
    pub alarm_low: u8,
    /// Raw T_H alarm byte.
    pub alarm_high: u8,
}

impl Default for ThermometerReading {
    fn default() -> Self {
        Self {
            temperature: ABSOLUTE_ZERO,
            resolution: Resolution::default(),
            alarm_low: 0,
            alarm_high: 0,
        }
    }
}

/// A thermometer on the bus, identified by its ROM code.
#[derive(Debug, Clone)]
pub struct Thermometer {
    rom: RomCode,
    family: ThermometerFamily,
    reading: ThermometerReading,
    attempts: u8,
}

impl Thermometer {
    /// Creates a thermometer for `rom`, or `None` if the family is not supported.
    pub fn new(rom: RomCode) -> Option<Self> {
        let family = ThermometerFamily::try_from(rom.family()).ok()?;
        Some(Self {
            rom,
            family,
            reading: ThermometerReading::default(),
            attempts: DEFAULT_ATTEMPTS,
        })
    }

    /// Sets the number of conversion attempts made by [`update`](Thermometer::update).
    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.attempts = attempts;
        self
    }

    /// The ROM code of this thermometer.
    pub fn rom(&self) -> RomCode {
        self.rom
    }

    /// The device family.
    pub fn family(&self) -> ThermometerFamily {
        self.family
    }

    /// The last successful reading.
    pub fn reading(&self) -> &ThermometerReading {
        &self.reading
    }

    /// Temperature in °C from the last successful update.
    pub fn temperature(&self) -> f64 {
        self.reading.temperature
    }

    /// Polls the sensor and updates the reading.
    ///
    /// Each attempt addresses the device, starts a conversion, waits
    /// [`CONVERSION_DELAY_MS`], addresses it again and reads the scratchpad.
    /// An attempt whose scratchpad fails the CRC, or that shows a known DS1820
    /// glitch, is discarded and the next one is made.
    ///
    /// # Errors
    /// Addressing and command echo failures are returned immediately.
    /// [`OneWireError::ReadStatusNotComplete`] is returned once all attempts are used up;
    /// the previous reading is then left untouched.
    pub fn update<T: OneWire + ?Sized>(&mut self, bus: &mut T) -> OneWireResult<(), T::BusError> {
        let mut glitch_retried = false;
        for attempt in 0..self.attempts {
            let scratchpad = self.convert_and_read(bus)?;
            if !scratchpad.is_valid() {
                warn!("{}: scratchpad CRC mismatch on attempt {}", self.rom, attempt + 1);
                continue;
            }
            match self.family.decode(&scratchpad, attempt == 0, glitch_retried) {
                Decoded::Celsius(temperature) => {
                    self.reading = ThermometerReading {
                        temperature,
                        resolution: scratchpad.config().resolution(),
                        alarm_low: scratchpad.alarm_low(),
                        alarm_high: scratchpad.alarm_high(),
                    };
                    debug!("{self}");
                    return Ok(());
                }
                Decoded::Glitch => {
                    warn!("{}: DS1820 glitch on attempt {}", self.rom, attempt + 1);
                    glitch_retried = true;
                }
            }
        }
        Err(OneWireError::ReadStatusNotComplete)
    }

    fn convert_and_read<T: OneWire + ?Sized>(
        &self,
        bus: &mut T,
    ) -> OneWireResult<Scratchpad, T::BusError> {
        self.rom.access(bus)?;
        bus.write_verified(ONEWIRE_CONVERT_T_CMD)?;
        bus.delay_ms(CONVERSION_DELAY_MS);
        self.rom.access(bus)?;
        if bus.exchange_byte(ONEWIRE_READ_SCRATCHPAD_CMD)? != ONEWIRE_READ_SCRATCHPAD_CMD {
            return Err(OneWireError::ReadScratchpadFailed);
        }
        let mut raw = [0xff; 9];
        bus.exchange_block(&mut raw)?;
        Ok(Scratchpad(raw))
    }
}

impl fmt::Display for Thermometer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reading = &self.reading;
        write!(
            f,
            "{}: {:.4} ({}) {}<T>{}",
            self.rom,
            reading.temperature,
            reading.resolution.bits(),
            reading.alarm_low as i8,
            reading.alarm_high as i8,
        )
    }
}
