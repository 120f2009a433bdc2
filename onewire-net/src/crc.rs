/// Calculate CRC-8 used in 1-Wire communications.
///
/// Uses the Dallas/Maxim polynomial `x^8 + x^5 + x^4 + 1` (`0x8c` reflected).
/// After feeding a ROM code or a scratchpad including its trailing check byte,
/// a [`value`](OneWireCrc::value) of zero signals integrity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OneWireCrc(u8);

#[cfg(feature = "crc-table")]
const CRC_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut idx = 0;
    while idx < 256 {
        table[idx] = fold_bits(0, idx as u8);
        idx += 1;
    }
    table
};

const fn fold_bits(mut crc: u8, mut byte: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        let mix = (crc ^ byte) & 0x01;
        crc >>= 1;
        if mix != 0 {
            crc ^= 0x8c;
        }
        byte >>= 1;
        bit += 1;
    }
    crc
}

impl OneWireCrc {
    /// A fresh accumulator.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Fold one byte into the running CRC, least significant bit first.
    pub fn add(&mut self, byte: u8) {
        #[cfg(feature = "crc-table")]
        {
            self.0 = CRC_TABLE[(self.0 ^ byte) as usize];
        }
        #[cfg(not(feature = "crc-table"))]
        {
            self.0 = fold_bits(self.0, byte);
        }
    }

    /// Fold a sequence of bytes into the running CRC.
    pub fn add_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.add(byte);
        }
    }

    /// Compute the check byte for a payload.
    pub fn compute(payload: &[u8]) -> u8 {
        let mut crc = OneWireCrc::new();
        crc.add_slice(payload);
        crc.value()
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        Self::compute(sequence) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn application_note_rom() {
        // Family 0x02, serial 00 00 00 01 B8 1C, CRC 0xA2.
        let rom = [0x02, 0x1c, 0xb8, 0x01, 0x00, 0x00, 0x00, 0xa2];
        assert_eq!(OneWireCrc::compute(&rom[..7]), 0xa2);
        assert!(OneWireCrc::validate(&rom));
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(OneWireCrc::new().value(), 0);
        assert!(OneWireCrc::validate(&[]));
    }

    #[test]
    fn appended_check_byte_reduces_to_zero() {
        let mut rng = StdRng::seed_from_u64(0x1_0001_1001);
        for len in 1..32 {
            let mut buf = [0u8; 33];
            rng.fill(&mut buf[..len]);
            buf[len] = OneWireCrc::compute(&buf[..len]);
            assert!(OneWireCrc::validate(&buf[..=len]), "length {len}");
        }
    }

    #[test]
    fn single_bit_corruption_detected() {
        let mut rom = [0x28, 0xff, 0x4c, 0x1a, 0x61, 0x16, 0x04, 0x00];
        rom[7] = OneWireCrc::compute(&rom[..7]);
        for byte in 0..8 {
            for bit in 0..8 {
                let mut bad = rom;
                bad[byte] ^= 1 << bit;
                assert!(!OneWireCrc::validate(&bad));
            }
        }
    }

    #[test]
    fn table_matches_bitwise_fold() {
        for byte in 0..=255u8 {
            let mut crc = OneWireCrc::new();
            crc.add(0x5a);
            crc.add(byte);
            assert_eq!(crc.value(), fold_bits(fold_bits(0, 0x5a), byte));
        }
    }
}
