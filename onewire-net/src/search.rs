use log::{debug, trace};

use crate::{
    ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD, OneWire, OneWireCrc, OneWireError,
    OneWireResult, RomCode,
};

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It maintains the state of one scan; a new scan needs a new instance.
pub struct OneWireSearch<'a, T: ?Sized> {
    onewire: &'a mut T,
    cmd: u8,
    family: u8,
    last_device: bool,
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    rom: [u8; 8],
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Type of search performed using [`OneWireSearch`].
pub enum OneWireSearchKind {
    /// Normal search
    #[default]
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

impl<'a, T: ?Sized> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] instance.
    ///
    /// # Arguments
    /// * `onewire` - A mutable reference to a type that implements the `OneWire` trait.
    /// * `kind` - Whether to find every device or only those in alarm state.
    pub fn new(onewire: &'a mut T, kind: OneWireSearchKind) -> Self {
        Self {
            onewire,
            cmd: kind as _,
            family: 0,
            last_device: false,
            last_discrepancy: 0,
            last_family_discrepancy: 0,
            rom: [0; 8],
        }
    }

    /// Creates a new [`OneWireSearch`] restricted to one family code.
    ///
    /// The ROM buffer is seeded with the family code and the first round replays it,
    /// so the scan starts at the first device of that family and ends at the first
    /// device of any other. A family code of zero means no restriction.
    pub fn with_family(onewire: &'a mut T, kind: OneWireSearchKind, family: u8) -> Self {
        let mut search = Self::new(onewire, kind);
        if family != 0 {
            search.family = family;
            search.rom[0] = family;
            search.last_discrepancy = 64;
        }
        search
    }

    /// Bit position (1-based) of the last discrepancy inside the family code seen
    /// by the most recent round, or zero.
    ///
    /// Recorded for family-scoped refinements; the search itself never reads it.
    pub fn last_family_discrepancy(&self) -> u8 {
        self.last_family_discrepancy
    }
}

impl<T: OneWire + ?Sized> OneWireSearch<'_, T> {
    /// Runs one search round and returns the ROM code it settled on.
    ///
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    /// Each call discovers exactly one device; once every device has been visited it returns `None`.
    /// Devices are visited in increasing order of their ROM bits read least significant first,
    /// taking the `0` branch first at every discrepancy.
    ///
    /// # Errors
    /// - [`OneWireError::NoDevicesOnNet`] if the reset gets no presence pulse.
    /// - [`OneWireError::WriteVerifyFailed`] if the search command or a direction bit is not echoed.
    /// - [`OneWireError::SearchError`] if no device answers a bit position, or the assembled
    ///   code fails its CRC or has a zero family code.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> OneWireResult<Option<RomCode>, T::BusError> {
        if self.last_device {
            return Ok(None);
        }
        trace!(
            "search round: cmd {:#04x}, last discrepancy {}",
            self.cmd, self.last_discrepancy
        );
        match self.onewire.reset_presence() {
            Ok(()) => {}
            Err(OneWireError::Other(e)) => return Err(OneWireError::Other(e)),
            Err(_) => return Err(OneWireError::NoDevicesOnNet),
        }
        self.onewire.write_verified(self.cmd)?;

        let mut crc = OneWireCrc::new();
        let mut id_bit_num: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut idx: usize = 0; // Index in the ROM array
        let mut rom_mask: u8 = 1; // Mask for the current bit in the ROM byte

        while idx < 8 {
            // All participating devices send their bit, then its complement.
            let id_bit = self.onewire.exchange_bit(true)?;
            let complement_bit = self.onewire.exchange_bit(true)?;
            if id_bit && complement_bit {
                // nobody answered
                break;
            }
            let dir = if id_bit != complement_bit {
                id_bit
            } else {
                let dir = if id_bit_num < self.last_discrepancy {
                    self.rom[idx] & rom_mask != 0
                } else {
                    id_bit_num == self.last_discrepancy
                };
                if !dir {
                    last_zero = id_bit_num;
                    if last_zero < 9 {
                        self.last_family_discrepancy = last_zero;
                    }
                }
                dir
            };
            if dir {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }
            // Devices that do not hold this bit drop out of the round.
            if self.onewire.exchange_bit(dir)? != dir {
                return Err(OneWireError::WriteVerifyFailed);
            }

            id_bit_num += 1;
            rom_mask <<= 1;
            if rom_mask == 0 {
                crc.add(self.rom[idx]);
                idx += 1;
                rom_mask = 1;
            }
        }

        if id_bit_num != 65 || crc.value() != 0 || self.rom[0] == 0 {
            return Err(OneWireError::SearchError);
        }
        let rom = RomCode::from_bytes(self.rom);
        if self.family != 0 && rom.family() != self.family {
            trace!("search left family {:#04x} at {}", self.family, rom);
            self.last_device = true;
            return Ok(None);
        }
        debug!("found device {rom}");
        self.last_discrepancy = last_zero;
        self.last_device = last_zero == 0;
        Ok(Some(rom))
    }

    /// Runs search rounds until every device has been visited, calling `handler` once per device.
    ///
    /// The handler gets the bus back between rounds, so it may address the device it was handed.
    /// If it returns an error, the scan stops and that error is returned.
    pub fn scan<F>(mut self, mut handler: F) -> OneWireResult<(), T::BusError>
    where
        F: FnMut(&mut T, RomCode) -> OneWireResult<(), T::BusError>,
    {
        while let Some(rom) = self.next()? {
            handler(&mut *self.onewire, rom)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDevice};
    use alloc::{vec, vec::Vec};
    use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

    fn random_roms(rng: &mut StdRng, families: &[u8], count: usize) -> Vec<RomCode> {
        let mut roms: Vec<RomCode> = Vec::new();
        while roms.len() < count {
            let family = families[rng.random_range(0..families.len())];
            let rom = RomCode::from_parts(family, rng.random());
            if !roms.contains(&rom) {
                roms.push(rom);
            }
        }
        roms
    }

    fn bus_order_key(rom: &RomCode) -> u64 {
        rom.value().reverse_bits()
    }

    fn collect(search: OneWireSearch<'_, SimBus>) -> OneWireResult<Vec<RomCode>, core::convert::Infallible> {
        let mut found = Vec::new();
        search.scan(|_, rom| {
            found.push(rom);
            Ok(())
        })?;
        Ok(found)
    }

    #[test]
    fn single_device() {
        let rom = RomCode::from_parts(0x28, [0xff, 0x4c, 0x1a, 0x61, 0x16, 0x04]);
        let mut bus = SimBus::new(vec![SimDevice::new(rom)]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Ok(Some(rom)));
        assert_eq!(search.next(), Ok(None));
        assert_eq!(search.next(), Ok(None));
        assert_eq!(bus.resets(), 1);
    }

    #[test]
    fn finds_every_device_exactly_once() {
        let mut rng = StdRng::seed_from_u64(0xf0);
        for count in [2, 3, 8, 25] {
            let roms = random_roms(&mut rng, &[0x10, 0x28, 0x22, 0x42], count);
            let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
            let found = collect(OneWireSearch::new(&mut bus, OneWireSearchKind::Normal)).unwrap();
            assert_eq!(found.len(), roms.len());
            let mut expected = roms.clone();
            expected.sort_by_key(bus_order_key);
            assert_eq!(found, expected);
            // one reset per round
            assert_eq!(bus.resets(), count);
        }
    }

    #[test]
    fn order_independent_of_device_order() {
        let mut rng = StdRng::seed_from_u64(0xec);
        let mut roms = random_roms(&mut rng, &[0x28], 12);
        let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
        let first = collect(OneWireSearch::new(&mut bus, OneWireSearchKind::Normal)).unwrap();
        for _ in 0..5 {
            roms.shuffle(&mut rng);
            let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
            let again = collect(OneWireSearch::new(&mut bus, OneWireSearchKind::Normal)).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn neighbouring_codes() {
        // Codes that differ only deep in the serial number.
        let roms: Vec<RomCode> = (0..4u8)
            .map(|n| RomCode::from_parts(0x28, [1, 2, 3, 4, 5, 0x80 | n]))
            .collect();
        let mut bus = SimBus::new(roms.iter().rev().copied().map(SimDevice::new).collect());
        let found = collect(OneWireSearch::new(&mut bus, OneWireSearchKind::Normal)).unwrap();
        // bit 48 is explored before bit 49
        assert_eq!(found, [roms[0], roms[2], roms[1], roms[3]]);
    }

    #[test]
    fn no_presence() {
        let mut bus = SimBus::new(Vec::new());
        let mut calls = 0;
        let res = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal).scan(|_, _| {
            calls += 1;
            Ok(())
        });
        assert_eq!(res, Err(OneWireError::NoDevicesOnNet));
        assert_eq!(calls, 0);

        let mut shorted = SimBus::new(vec![SimDevice::new(RomCode::from_parts(0x28, [0; 6]))]);
        shorted.set_short_circuit(true);
        let mut search = OneWireSearch::new(&mut shorted, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Err(OneWireError::NoDevicesOnNet));
    }

    #[test]
    fn alarm_search_only_finds_alarmed() {
        let mut rng = StdRng::seed_from_u64(0x44);
        let roms = random_roms(&mut rng, &[0x28, 0x10], 10);
        let devices = roms
            .iter()
            .enumerate()
            .map(|(n, rom)| {
                let dev = SimDevice::new(*rom);
                if n % 3 == 0 { dev.alarmed() } else { dev }
            })
            .collect();
        let mut bus = SimBus::new(devices);
        let found = collect(OneWireSearch::new(&mut bus, OneWireSearchKind::Alarmed)).unwrap();
        let mut expected: Vec<RomCode> = roms.iter().step_by(3).copied().collect();
        expected.sort_by_key(bus_order_key);
        assert_eq!(found, expected);
    }

    #[test]
    fn alarm_search_with_nobody_alarmed() {
        let rom = RomCode::from_parts(0x28, [9; 6]);
        let mut bus = SimBus::new(vec![SimDevice::new(rom)]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Alarmed);
        assert_eq!(search.next(), Err(OneWireError::SearchError));
    }

    #[test]
    fn family_search() {
        let mut rng = StdRng::seed_from_u64(0x28);
        let families = [0x10, 0x22, 0x28, 0x42, 0x01];
        let roms = random_roms(&mut rng, &families, 30);
        for family in families {
            let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
            let found =
                collect(OneWireSearch::with_family(&mut bus, OneWireSearchKind::Normal, family))
                    .unwrap();
            let mut expected: Vec<RomCode> = roms
                .iter()
                .copied()
                .filter(|rom| rom.family() == family)
                .collect();
            expected.sort_by_key(bus_order_key);
            assert_eq!(found, expected, "family {family:#04x}");
        }
    }

    #[test]
    fn family_search_absent_family() {
        let roms = [
            RomCode::from_parts(0x10, [1; 6]),
            RomCode::from_parts(0x42, [2; 6]),
        ];
        let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
        let found =
            collect(OneWireSearch::with_family(&mut bus, OneWireSearchKind::Normal, 0x28)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn handler_error_aborts_scan() {
        let mut rng = StdRng::seed_from_u64(7);
        let roms = random_roms(&mut rng, &[0x28], 5);
        let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
        let mut seen = 0;
        let res = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal).scan(|_, _| {
            seen += 1;
            if seen == 2 {
                Err(OneWireError::ReadStatusNotComplete)
            } else {
                Ok(())
            }
        });
        assert_eq!(res, Err(OneWireError::ReadStatusNotComplete));
        assert_eq!(seen, 2);
        assert_eq!(bus.resets(), 2);
    }

    #[test]
    fn handler_may_use_bus() {
        let roms = [
            RomCode::from_parts(0x28, [1; 6]),
            RomCode::from_parts(0x28, [2; 6]),
        ];
        let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
        let mut found = Vec::new();
        OneWireSearch::new(&mut bus, OneWireSearchKind::Normal)
            .scan(|bus, rom| {
                rom.access(bus)?;
                found.push(rom);
                Ok(())
            })
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn corrupted_command_echo() {
        let mut bus = SimBus::new(vec![SimDevice::new(RomCode::from_parts(0x28, [3; 6]))]);
        bus.corrupt_echo_of_byte(0);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Err(OneWireError::WriteVerifyFailed));
    }

    #[test]
    fn invalid_crc_is_rejected() {
        let mut bytes = RomCode::from_parts(0x28, [5; 6]).to_bytes();
        bytes[7] ^= 0x40;
        let mut bus = SimBus::new(vec![SimDevice::new(RomCode::from_bytes(bytes))]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Err(OneWireError::SearchError));
    }

    #[test]
    fn zero_family_is_rejected() {
        let rom = RomCode::from_parts(0x00, [5; 6]);
        let mut bus = SimBus::new(vec![SimDevice::new(rom)]);
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Err(OneWireError::SearchError));
    }

    #[test]
    fn family_discrepancy_recorded() {
        // 0x28 and 0x10 first differ at bit 4 of the family code.
        let roms = [
            RomCode::from_parts(0x28, [1; 6]),
            RomCode::from_parts(0x10, [1; 6]),
        ];
        let mut bus = SimBus::new(roms.iter().copied().map(SimDevice::new).collect());
        let mut search = OneWireSearch::new(&mut bus, OneWireSearchKind::Normal);
        assert_eq!(search.next(), Ok(Some(roms[1])));
        assert_eq!(search.last_family_discrepancy(), 4);
        assert_eq!(search.next(), Ok(Some(roms[0])));
        assert_eq!(search.next(), Ok(None));
    }
}
