//! A bit-level simulated 1-Wire bus.
//!
//! [`SimBus`] models the open-drain line: in every time slot the sampled level is the
//! AND of the master's bit and every bit driven by a participating [`SimDevice`].
//! Devices run their own ROM and function command state machines off the sampled
//! levels, so the search engine, MATCH ROM addressing and thermometer commands are
//! exercised exactly as on a real bus.

use alloc::{collections::VecDeque, vec::Vec};
use core::convert::Infallible;

use crate::{
    BusStatus, ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_CONVERT_T_CMD, ONEWIRE_MATCH_ROM_CMD,
    ONEWIRE_READ_SCRATCHPAD_CMD, ONEWIRE_SEARCH_CMD, OneWire, OneWireCrc, OneWireResult, RomCode,
};

const SKIP_ROM_CMD: u8 = 0xcc;

/// One recorded operation on a [`SimBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// A reset and presence-detect sequence.
    Reset,
    /// A single time slot driven through [`OneWire::exchange_bit`], with the master's bit.
    Bit(bool),
    /// A byte driven through [`OneWire::exchange_byte`], with the master's byte.
    Byte(u8),
    /// A delay, in milliseconds.
    Delay(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchSlot {
    Id,
    Complement,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    /// Not taking part until the next reset.
    Idle,
    RomCommand { shift: u8, count: u8 },
    MatchRom { bit: u8 },
    Search { bit: u8, slot: SearchSlot },
    Function { shift: u8, count: u8 },
    ReadScratchpad { data: [u8; 9], bit: u8 },
}

/// A simulated slave device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    rom: RomCode,
    alarmed: bool,
    scratchpads: VecDeque<[u8; 9]>,
    state: DeviceState,
    conversions: usize,
    scratchpad_reads: usize,
}

impl SimDevice {
    /// A device with the given ROM code and an all-zero scratchpad.
    pub fn new(rom: RomCode) -> Self {
        Self {
            rom,
            alarmed: false,
            scratchpads: VecDeque::new(),
            state: DeviceState::Idle,
            conversions: 0,
            scratchpad_reads: 0,
        }
    }

    /// Marks the device as being in alarm state, so it answers ALARM SEARCH.
    pub fn alarmed(mut self) -> Self {
        self.alarmed = true;
        self
    }

    /// Queues a scratchpad, appending a correct check byte to the eight data bytes.
    pub fn with_scratchpad(self, data: [u8; 8]) -> Self {
        let mut raw = [0; 9];
        raw[..8].copy_from_slice(&data);
        raw[8] = OneWireCrc::compute(&data);
        self.with_raw_scratchpad(raw)
    }

    /// Queues a scratchpad exactly as given, check byte included.
    ///
    /// Every READ SCRATCHPAD consumes the front of the queue; the last entry is
    /// repeated once the queue is down to one.
    pub fn with_raw_scratchpad(mut self, raw: [u8; 9]) -> Self {
        self.scratchpads.push_back(raw);
        self
    }

    /// The device's ROM code.
    pub fn rom(&self) -> RomCode {
        self.rom
    }

    /// Number of CONVERT T commands received.
    pub fn conversions(&self) -> usize {
        self.conversions
    }

    /// Number of READ SCRATCHPAD commands received.
    pub fn scratchpad_reads(&self) -> usize {
        self.scratchpad_reads
    }

    /// Whether the device has been addressed and waits for a function command.
    pub fn is_selected(&self) -> bool {
        matches!(self.state, DeviceState::Function { .. })
    }

    fn rom_bit(&self, bit: u8) -> bool {
        (self.rom.value() >> bit) & 1 == 1
    }

    fn on_reset(&mut self) {
        self.state = DeviceState::RomCommand { shift: 0, count: 0 };
    }

    /// The level this device pulls the line to in the current slot, if any.
    fn drive(&self) -> Option<bool> {
        match self.state {
            DeviceState::Search {
                bit,
                slot: SearchSlot::Id,
            } => Some(self.rom_bit(bit)),
            DeviceState::Search {
                bit,
                slot: SearchSlot::Complement,
            } => Some(!self.rom_bit(bit)),
            DeviceState::ReadScratchpad { data, bit } => {
                Some((data[(bit / 8) as usize] >> (bit % 8)) & 1 == 1)
            }
            _ => None,
        }
    }

    fn sample(&mut self, level: bool) {
        self.state = match self.state {
            DeviceState::Idle => DeviceState::Idle,
            DeviceState::RomCommand { shift, count } => {
                let shift = shift | ((level as u8) << count);
                if count < 7 {
                    DeviceState::RomCommand {
                        shift,
                        count: count + 1,
                    }
                } else {
                    self.rom_command(shift)
                }
            }
            DeviceState::MatchRom { bit } => {
                if level != self.rom_bit(bit) {
                    DeviceState::Idle
                } else if bit == 63 {
                    DeviceState::Function { shift: 0, count: 0 }
                } else {
                    DeviceState::MatchRom { bit: bit + 1 }
                }
            }
            DeviceState::Search { bit, slot } => match slot {
                SearchSlot::Id => DeviceState::Search {
                    bit,
                    slot: SearchSlot::Complement,
                },
                SearchSlot::Complement => DeviceState::Search {
                    bit,
                    slot: SearchSlot::Select,
                },
                SearchSlot::Select => {
                    if level != self.rom_bit(bit) {
                        DeviceState::Idle
                    } else if bit == 63 {
                        DeviceState::Function { shift: 0, count: 0 }
                    } else {
                        DeviceState::Search {
                            bit: bit + 1,
                            slot: SearchSlot::Id,
                        }
                    }
                }
            },
            DeviceState::Function { shift, count } => {
                let shift = shift | ((level as u8) << count);
                if count < 7 {
                    DeviceState::Function {
                        shift,
                        count: count + 1,
                    }
                } else {
                    self.function_command(shift)
                }
            }
            DeviceState::ReadScratchpad { data, bit } => {
                if bit == 71 {
                    DeviceState::Idle
                } else {
                    DeviceState::ReadScratchpad { data, bit: bit + 1 }
                }
            }
        };
    }

    fn rom_command(&self, cmd: u8) -> DeviceState {
        match cmd {
            ONEWIRE_MATCH_ROM_CMD => DeviceState::MatchRom { bit: 0 },
            ONEWIRE_SEARCH_CMD => DeviceState::Search {
                bit: 0,
                slot: SearchSlot::Id,
            },
            ONEWIRE_CONDITIONAL_SEARCH_CMD if self.alarmed => DeviceState::Search {
                bit: 0,
                slot: SearchSlot::Id,
            },
            SKIP_ROM_CMD => DeviceState::Function { shift: 0, count: 0 },
            _ => DeviceState::Idle,
        }
    }

    fn function_command(&mut self, cmd: u8) -> DeviceState {
        match cmd {
            ONEWIRE_CONVERT_T_CMD => {
                self.conversions += 1;
                DeviceState::Idle
            }
            ONEWIRE_READ_SCRATCHPAD_CMD => {
                self.scratchpad_reads += 1;
                let data = if self.scratchpads.len() > 1 {
                    self.scratchpads.pop_front()
                } else {
                    self.scratchpads.front().copied()
                };
                DeviceState::ReadScratchpad {
                    data: data.unwrap_or_default(),
                    bit: 0,
                }
            }
            _ => DeviceState::Idle,
        }
    }
}

/// A simulated bus hosting a set of [`SimDevice`]s.
#[derive(Debug, Clone)]
pub struct SimBus {
    devices: Vec<SimDevice>,
    short_circuit: bool,
    corrupt_byte: Option<usize>,
    corrupt_value: Option<u8>,
    bytes_since_reset: usize,
    max_block: usize,
    log: Vec<Exchange>,
}

impl SimBus {
    /// A bus hosting `devices`. An empty set produces no presence pulse.
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            devices,
            short_circuit: false,
            corrupt_byte: None,
            corrupt_value: None,
            bytes_since_reset: 0,
            max_block: crate::DEFAULT_MAX_BLOCK_LEN,
            log: Vec::new(),
        }
    }

    /// Simulates a data line shorted to ground.
    pub fn set_short_circuit(&mut self, short: bool) {
        self.short_circuit = short;
    }

    /// Flips the echo of the `index`-th byte exchanged after each reset.
    ///
    /// Devices still see the byte that was actually written.
    pub fn corrupt_echo_of_byte(&mut self, index: usize) {
        self.corrupt_byte = Some(index);
    }

    /// Flips the echo of every byte equal to `value`.
    pub fn corrupt_echo_of_value(&mut self, value: u8) {
        self.corrupt_value = Some(value);
    }

    /// Sets the limit reported by [`OneWire::max_block_len`].
    pub fn set_max_block_len(&mut self, len: usize) {
        self.max_block = len;
    }

    /// The device at `index`.
    pub fn device(&self, index: usize) -> &SimDevice {
        &self.devices[index]
    }

    /// Every operation performed so far.
    pub fn log(&self) -> &[Exchange] {
        &self.log
    }

    /// Bytes written by the master since the most recent reset.
    pub fn bytes_since_reset(&self) -> Vec<u8> {
        let start = self
            .log
            .iter()
            .rposition(|e| *e == Exchange::Reset)
            .map_or(0, |idx| idx + 1);
        self.log[start..]
            .iter()
            .filter_map(|e| match e {
                Exchange::Byte(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// Number of resets performed.
    pub fn resets(&self) -> usize {
        self.log.iter().filter(|e| **e == Exchange::Reset).count()
    }

    /// Total time spent in [`OneWire::delay_ms`].
    pub fn delayed_ms(&self) -> u64 {
        self.log
            .iter()
            .map(|e| match e {
                Exchange::Delay(ms) => *ms as u64,
                _ => 0,
            })
            .sum()
    }

    fn slot(&mut self, bit: bool) -> bool {
        let level = self
            .devices
            .iter()
            .filter_map(SimDevice::drive)
            .fold(bit, |acc, driven| acc && driven);
        for device in self.devices.iter_mut() {
            device.sample(level);
        }
        level
    }
}

impl OneWire for SimBus {
    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<BusStatus, Self::BusError> {
        self.log.push(Exchange::Reset);
        self.bytes_since_reset = 0;
        if self.short_circuit {
            return Ok(BusStatus::ShortCircuit);
        }
        if self.devices.is_empty() {
            return Ok(BusStatus::NoPresence);
        }
        for device in self.devices.iter_mut() {
            device.on_reset();
        }
        Ok(BusStatus::Presence)
    }

    fn exchange_bit(&mut self, bit: bool) -> OneWireResult<bool, Self::BusError> {
        self.log.push(Exchange::Bit(bit));
        Ok(self.slot(bit))
    }

    fn exchange_byte(&mut self, byte: u8) -> OneWireResult<u8, Self::BusError> {
        self.log.push(Exchange::Byte(byte));
        let mut echo = 0;
        for idx in 0..8 {
            if self.slot((byte >> idx) & 1 == 1) {
                echo |= 1 << idx;
            }
        }
        if self.corrupt_byte == Some(self.bytes_since_reset) || self.corrupt_value == Some(byte) {
            echo ^= 0x01;
        }
        self.bytes_since_reset += 1;
        Ok(echo)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.push(Exchange::Delay(ms));
    }

    fn max_block_len(&self) -> usize {
        self.max_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OneWireError;
    use alloc::vec;

    #[test]
    fn wired_and_read_of_scratchpad() {
        let rom = RomCode::from_parts(0x28, [1, 2, 3, 4, 5, 6]);
        let data = [0x91, 0x00, 0x4b, 0x46, 0x7f, 0xff, 0x0f, 0x10];
        let mut bus = SimBus::new(vec![SimDevice::new(rom).with_scratchpad(data)]);
        rom.access(&mut bus).unwrap();
        bus.write_verified(ONEWIRE_READ_SCRATCHPAD_CMD).unwrap();
        let mut block = [0xff; 9];
        bus.exchange_block(&mut block).unwrap();
        assert_eq!(&block[..8], &data);
        assert!(OneWireCrc::validate(&block));
        assert_eq!(bus.device(0).scratchpad_reads(), 1);
    }

    #[test]
    fn block_limit() {
        let mut bus = SimBus::new(vec![SimDevice::new(RomCode::from_parts(0x28, [0; 6]))]);
        bus.set_max_block_len(4);
        let mut block = [0xff; 5];
        assert_eq!(
            bus.exchange_block(&mut block),
            Err(OneWireError::BlockTooBig)
        );
        assert!(bus.log().is_empty());
    }
}
