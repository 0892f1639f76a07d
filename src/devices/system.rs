// MIT License - Copyright (c) 2026 Peter Wright
// Battery flags

use bitflags::bitflags;

bitflags! {
    /// Battery indicator segments, status byte 30 bits 0..4.
    ///
    /// The panel drives a keypad battery icon: an outline and three level
    /// bars. A blinking outline means the battery is missing or flat.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BatteryFlags: u8 {
        const OUTLINE          = 0b0000_0001;
        const LEVEL_1          = 0b0000_0010;
        const LEVEL_2          = 0b0000_0100;
        const LEVEL_3          = 0b0000_1000;
        const OUTLINE_BLINKING = 0b0001_0000;
    }
}

impl BatteryFlags {
    /// Decode the battery byte; bits above 4 are ignored.
    pub fn from_status_byte(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }

    /// Number of lit level bars (0-3).
    pub fn level(&self) -> u8 {
        [Self::LEVEL_1, Self::LEVEL_2, Self::LEVEL_3]
            .iter()
            .filter(|bar| self.contains(**bar))
            .count() as u8
    }

    pub fn is_blinking(&self) -> bool {
        self.contains(Self::OUTLINE_BLINKING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_byte() {
        let flags = BatteryFlags::from_status_byte(0b1110_0011);
        assert_eq!(flags, BatteryFlags::OUTLINE | BatteryFlags::LEVEL_1);
        assert!(!flags.is_blinking());
    }

    #[test]
    fn test_level() {
        assert_eq!(BatteryFlags::empty().level(), 0);
        assert_eq!(BatteryFlags::from_status_byte(0b0000_1111).level(), 3);
        assert_eq!((BatteryFlags::OUTLINE | BatteryFlags::LEVEL_2).level(), 1);
    }

    #[test]
    fn test_blinking() {
        assert!(BatteryFlags::from_status_byte(0x10).is_blinking());
    }
}
