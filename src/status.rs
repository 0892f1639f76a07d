// MIT License - Copyright (c) 2026 Peter Wright
// Status block decoding

//! Status block decoding.
//!
//! The reply to a `STATUS` request is a fixed-layout block. Zone state is
//! spread over six 24-bit little-endian bit-planes; everything else lives in
//! single flag bytes.
//!
//! | Offset  | Content                                      |
//! |---------|----------------------------------------------|
//! | 0..3    | open zones                                   |
//! | 6..9    | violated zones                               |
//! | 12..15  | annulled (bypassed) zones                    |
//! | 19      | firmware version                             |
//! | 20      | bit 0: partitioned panel                     |
//! | 21      | bit 0: partition A armed, bit 1: partition B |
//! | 28      | bit 0: AC power lost                         |
//! | 30      | battery indicator, bits 0..4                 |
//! | 37      | bit 2: siren, bit 7 (or 6): PGM              |
//! | 38..41  | low battery zones                            |
//! | 47..50  | enabled zones                                |
//! | 50..53  | stay zones                                   |

use std::fmt;

use crate::constants::{MAX_ZONES, PGM_STATUS_BIT};
use crate::devices::{BatteryFlags, Zone, ZoneFlags};
use crate::error::{AmtError, Result};

/// Shortest payload that covers every field.
pub const STATUS_MIN_LEN: usize = 53;

const OPEN_PLANE: usize = 0;
const VIOLATED_PLANE: usize = 6;
const ANNULLED_PLANE: usize = 12;
const VERSION_BYTE: usize = 19;
const PARTITIONED_BYTE: usize = 20;
const PARTITIONS_BYTE: usize = 21;
const AC_BYTE: usize = 28;
const BATTERY_BYTE: usize = 30;
const OUTPUTS_BYTE: usize = 37;
const SIREN_BIT: u8 = 2;
const LOW_BATTERY_PLANE: usize = 38;
const ENABLED_PLANE: usize = 47;
const STAY_PLANE: usize = 50;

/// Plane offsets paired with the flag they contribute.
const ZONE_PLANES: [(usize, ZoneFlags); 6] = [
    (OPEN_PLANE, ZoneFlags::OPEN),
    (VIOLATED_PLANE, ZoneFlags::VIOLATED),
    (ANNULLED_PLANE, ZoneFlags::ANNULLED),
    (STAY_PLANE, ZoneFlags::STAY),
    (ENABLED_PLANE, ZoneFlags::ENABLED),
    (LOW_BATTERY_PLANE, ZoneFlags::LOW_BATTERY),
];

/// Overall alarm state derived from the partition and siren flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Disarmed,
    /// Partition A armed
    ArmedAway,
    /// Only partition B armed
    ArmedStay,
    /// Siren sounding, regardless of arm state
    Triggered,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disarmed => "disarmed",
            Self::ArmedAway => "armed_away",
            Self::ArmedStay => "armed_stay",
            Self::Triggered => "triggered",
        })
    }
}

/// Decoded panel status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub version: u8,
    pub partitioned: bool,
    pub partition_a_armed: bool,
    pub partition_b_armed: bool,
    pub siren_triggered: bool,
    pub battery: BatteryFlags,
    /// Always `MAX_ZONES` entries, zone 1 first.
    pub zones: Vec<Zone>,
    pub pgm: bool,
    pub ac_power_lost: bool,
}

impl Status {
    /// Zone by 1-based number.
    pub fn zone(&self, number: u8) -> Option<&Zone> {
        number
            .checked_sub(1)
            .and_then(|idx| self.zones.get(idx as usize))
    }

    pub fn open_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.is_open())
    }

    /// Zones currently bypassed, as 1-based numbers.
    pub fn annulled_zones(&self) -> Vec<u8> {
        self.zones
            .iter()
            .filter(|z| z.is_annulled())
            .map(|z| z.number)
            .collect()
    }

    /// Either partition armed.
    pub fn is_armed(&self) -> bool {
        self.partition_a_armed || self.partition_b_armed
    }

    pub fn alarm_state(&self) -> AlarmState {
        if self.siren_triggered {
            AlarmState::Triggered
        } else if self.partition_a_armed {
            AlarmState::ArmedAway
        } else if self.partition_b_armed {
            AlarmState::ArmedStay
        } else {
            AlarmState::Disarmed
        }
    }

    /// Stay arming only makes sense when some enabled zone belongs to the stay set.
    pub fn supports_stay(&self) -> bool {
        self.zones.iter().any(|z| z.is_enabled() && z.is_stay())
    }
}

/// Decode a status block using the current firmware's PGM bit.
pub fn decode_status(payload: &[u8]) -> Result<Status> {
    decode_status_with_pgm_bit(payload, PGM_STATUS_BIT)
}

/// Decode a status block, reading the PGM flag from `pgm_bit` of byte 37.
pub fn decode_status_with_pgm_bit(payload: &[u8], pgm_bit: u8) -> Result<Status> {
    if payload.len() < STATUS_MIN_LEN {
        return Err(AmtError::invalid_payload(format!(
            "status block too short: {} bytes, need {}",
            payload.len(),
            STATUS_MIN_LEN
        )));
    }
    if pgm_bit > 7 {
        return Err(AmtError::invalid_payload(format!("PGM bit {} out of range", pgm_bit)));
    }

    let planes: Vec<(u32, ZoneFlags)> = ZONE_PLANES
        .iter()
        .map(|(offset, flag)| (plane(payload, *offset), *flag))
        .collect();

    let zones = (0..MAX_ZONES)
        .map(|i| {
            let flags = planes
                .iter()
                .filter(|(bits, _)| *bits & (1u32 << i) != 0)
                .fold(ZoneFlags::empty(), |acc, (_, flag)| acc | *flag);
            Zone::new(i as u8 + 1, flags)
        })
        .collect();

    Ok(Status {
        version: payload[VERSION_BYTE],
        partitioned: bit(payload[PARTITIONED_BYTE], 0),
        partition_a_armed: bit(payload[PARTITIONS_BYTE], 0),
        partition_b_armed: bit(payload[PARTITIONS_BYTE], 1),
        siren_triggered: bit(payload[OUTPUTS_BYTE], SIREN_BIT),
        battery: BatteryFlags::from_status_byte(payload[BATTERY_BYTE]),
        zones,
        pgm: bit(payload[OUTPUTS_BYTE], pgm_bit),
        ac_power_lost: bit(payload[AC_BYTE], 0),
    })
}

/// Little-endian 24-bit plane starting at `offset`.
fn plane(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([payload[offset], payload[offset + 1], payload[offset + 2], 0])
}

fn bit(byte: u8, n: u8) -> bool {
    byte & (1 << n) != 0
}
