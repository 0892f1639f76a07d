// MIT License - Copyright (c) 2026 Peter Wright
// Zone flags

use bitflags::bitflags;

bitflags! {
    /// Per-zone flags, one per status bit-plane.
    ///
    /// Each plane in the status block is a little-endian 24-bit integer in
    /// which bit `i` belongs to zone `i + 1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ZoneFlags: u8 {
        /// Sensor is open right now
        const OPEN        = 0b0000_0001;
        /// Zone triggered since the last arm (memory)
        const VIOLATED    = 0b0000_0010;
        /// Bypassed
        const ANNULLED    = 0b0000_0100;
        /// Part of the stay arm set
        const STAY        = 0b0000_1000;
        /// Configured and in use
        const ENABLED     = 0b0001_0000;
        /// Wireless sensor battery low
        const LOW_BATTERY = 0b0010_0000;
    }
}

/// Flag names in the order they are rendered.
const ZONE_FLAG_NAMES: [(ZoneFlags, &str); 6] = [
    (ZoneFlags::OPEN, "open"),
    (ZoneFlags::VIOLATED, "violated"),
    (ZoneFlags::ANNULLED, "annulled"),
    (ZoneFlags::STAY, "stay"),
    (ZoneFlags::ENABLED, "enabled"),
    (ZoneFlags::LOW_BATTERY, "low_battery"),
];

impl ZoneFlags {
    /// Flags that differ between two readings.
    pub fn changed(old: Self, new: Self) -> Self {
        old ^ new
    }

    /// Names of the set flags, e.g. `["open", "enabled"]`.
    pub fn names(&self) -> Vec<&'static str> {
        ZONE_FLAG_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// One alarm zone as reported by a status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    /// 1-based zone number
    pub number: u8,
    pub flags: ZoneFlags,
}

impl Zone {
    pub fn new(number: u8, flags: ZoneFlags) -> Self {
        Self { number, flags }
    }

    pub fn is_open(&self) -> bool { self.flags.contains(ZoneFlags::OPEN) }
    pub fn is_violated(&self) -> bool { self.flags.contains(ZoneFlags::VIOLATED) }
    pub fn is_annulled(&self) -> bool { self.flags.contains(ZoneFlags::ANNULLED) }
    pub fn is_stay(&self) -> bool { self.flags.contains(ZoneFlags::STAY) }
    pub fn is_enabled(&self) -> bool { self.flags.contains(ZoneFlags::ENABLED) }
    pub fn is_low_battery(&self) -> bool { self.flags.contains(ZoneFlags::LOW_BATTERY) }

    /// Open while enabled and not bypassed: this zone would block arming.
    pub fn blocks_arming(&self) -> bool {
        self.is_open() && self.is_enabled() && !self.is_annulled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_accessors() {
        let zone = Zone::new(3, ZoneFlags::OPEN | ZoneFlags::ENABLED);
        assert!(zone.is_open());
        assert!(zone.is_enabled());
        assert!(!zone.is_violated());
        assert!(!zone.is_low_battery());
        assert!(zone.blocks_arming());
    }

    #[test]
    fn test_annulled_zone_does_not_block_arming() {
        let zone = Zone::new(1, ZoneFlags::OPEN | ZoneFlags::ENABLED | ZoneFlags::ANNULLED);
        assert!(!zone.blocks_arming());
        let disabled = Zone::new(2, ZoneFlags::OPEN);
        assert!(!disabled.blocks_arming());
    }

    #[test]
    fn test_changed_flags() {
        let old = ZoneFlags::OPEN | ZoneFlags::ENABLED;
        let new = ZoneFlags::ENABLED | ZoneFlags::VIOLATED;
        let changed = ZoneFlags::changed(old, new);
        assert!(changed.contains(ZoneFlags::OPEN));
        assert!(changed.contains(ZoneFlags::VIOLATED));
        assert!(!changed.contains(ZoneFlags::ENABLED));
    }

    #[test]
    fn test_flag_names() {
        assert_eq!((ZoneFlags::ENABLED | ZoneFlags::OPEN).names(), vec!["open", "enabled"]);
        assert!(ZoneFlags::empty().names().is_empty());
        assert_eq!(ZoneFlags::all().names().len(), 6);
    }
}
