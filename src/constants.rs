// MIT License - Copyright (c) 2026 Peter Wright
// AMT protocol constants

/// Outer frame commands.
pub const START_COMMAND: u8 = 0x94;
pub const MAC_COMMAND: u8 = 0xC4;
pub const VERSION_COMMAND: u8 = 0xC0;
pub const UNKNOWN_COMMAND: u8 = 0x80;
pub const PING: u8 = 0xF7; // Single byte on the wire, no checksum
pub const PUSH_COMMAND: u8 = 0xB4;
pub const OK: u8 = 0xFE; // Single byte on the wire, no checksum
pub const MY_HOME: u8 = 0xE9;
pub const ISEC: u8 = 0xE7;
pub const XOR_COMMAND: u8 = 0xFB;
pub const CONNECTION_COMMAND: u8 = 0xE5;

/// Handshake result bytes returned after the connection announcement.
pub const HANDSHAKE_OK: u8 = 230;
pub const HANDSHAKE_OCCUPIED: u8 = 232;
pub const HANDSHAKE_OFFLINE: [u8; 2] = [228, 253];

/// Fixed bytes of the connection announcement.
pub const CONNECTION_SOURCE: u8 = 0x06;
pub const CONNECTION_UUID_LEN: usize = 8;
pub const CONNECTION_PROTOCOL: [u8; 6] = [0x45, 0x00, 0x00, 0x00, 0x00, 0x03];
pub const CONNECTION_LANGUAGE: u8 = 0x00;

/// MyHome envelope delimiter.
pub const ENVELOPE_DELIMITER: u8 = 0x21;
pub const PASSWORD_LEN: usize = 4;

/// Inner MyHome command ids.
pub const MH_ARM: u8 = 0x41;
pub const MH_BYPASS: u8 = 0x42;
pub const MH_DISARM: u8 = 0x44;
pub const MH_PANIC: u8 = 0x45;
pub const MH_PGM: u8 = 0x50;
pub const MH_STATUS: u8 = 0x5A;
pub const MH_MESSAGES: u8 = 0xF1;

/// Inner command byte placed in the envelope for sync requests.
/// The messages id itself travels inside the sync descriptor.
pub const MH_SYNC_ENVELOPE: u8 = 0x00;

/// Arm payloads.
pub const ARM_AWAY_PAYLOAD: u8 = 0x41;
pub const ARM_STAY_PAYLOAD: u8 = 0x50;

/// Panic payloads.
pub const PANIC_AUDIBLE_PAYLOAD: u8 = 0x01;
pub const PANIC_SILENT_PAYLOAD: u8 = 0x00;

/// PGM toggle codes ('L' / 'D' followed by output number '1').
pub const PGM_ENABLE_PAYLOAD: [u8; 2] = [0x4C, 0x31];
pub const PGM_DISABLE_PAYLOAD: [u8; 2] = [0x44, 0x31];

/// Arm reply meaning an enabled, non-bypassed zone is open.
pub const REPLY_OPEN_ZONE: u8 = 0xE4;

/// Sync descriptor marker following the table kind.
pub const SYNC_MARKER: u8 = 0xE0;

/// Zones and users known to the observed panel family.
pub const MAX_ZONES: usize = 24;
pub const MAX_USERS: usize = 30;
pub const ZONE_SYNC_BATCH: usize = 8;
pub const USER_SYNC_BATCH: usize = 10;

/// Longest name stored by the panel.
pub const MAX_NAME_LEN: usize = 14;

/// Offset of the first name character in a sync reply.
pub const SYNC_NAMES_OFFSET: usize = 9;

/// PGM state bit in status byte 37. Older firmware reports it in bit 6.
pub const PGM_STATUS_BIT: u8 = 7;
pub const PGM_STATUS_BIT_LEGACY: u8 = 6;

/// Panel accented-Latin charset: bytes that map to a different code point.
/// Bytes not listed decode as their Latin-1 value.
pub const CHAR_MAP: [(u8, char); 30] = [
    (126, 'â'),
    (127, 'ã'),
    (128, 'á'),
    (129, 'à'),
    (130, 'ê'),
    (131, 'é'),
    (132, 'í'),
    (133, 'ô'),
    (134, 'ó'),
    (135, 'õ'),
    (136, 'ú'),
    (137, 'ü'),
    (138, 'ç'),
    (139, 'Á'),
    (140, 'À'),
    (141, 'Ã'),
    (142, 'Â'),
    (143, 'É'),
    (144, 'Ê'),
    (145, 'Í'),
    (146, 'Ó'),
    (147, 'Ô'),
    (148, 'Õ'),
    (149, 'Ú'),
    (150, 'Ü'),
    (151, 'Ç'),
    (158, '°'),
    (159, '¹'),
    (160, '²'),
    (161, '³'),
];

/// Human-readable name of an outer command byte.
pub fn command_name(command: u8) -> Option<&'static str> {
    match command {
        START_COMMAND => Some("START"),
        MAC_COMMAND => Some("MAC"),
        VERSION_COMMAND => Some("VERSION"),
        UNKNOWN_COMMAND => Some("UNKNOWN"),
        PING => Some("PING"),
        PUSH_COMMAND => Some("PUSH"),
        OK => Some("OK"),
        ISEC => Some("ISEC"),
        MY_HOME => Some("MY_HOME"),
        XOR_COMMAND => Some("XOR"),
        CONNECTION_COMMAND => Some("CONNECTION"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_map_matches_code_points() {
        // Every mapped glyph is a Latin-1 supplement code point.
        for (byte, ch) in CHAR_MAP {
            assert!((0xB0..=0xFF).contains(&(ch as u32)), "byte {} -> {:?}", byte, ch);
        }
        let u_umlaut = CHAR_MAP.iter().find(|(b, _)| *b == 150).map(|(_, c)| *c);
        assert_eq!(u_umlaut, Some('\u{DC}'));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(command_name(MY_HOME), Some("MY_HOME"));
        assert_eq!(command_name(PING), Some("PING"));
        assert_eq!(command_name(0x01), None);
    }
}
