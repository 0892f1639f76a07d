// MIT License - Copyright (c) 2026 Peter Wright
// Name table decoding

//! Name table decoding.
//!
//! Sync replies carry a table kind followed by a stream of names in the
//! panel's 8-bit charset. Names end at a null byte or after 14 characters,
//! whichever comes first.

use std::fmt;

use crate::constants::{CHAR_MAP, MAX_NAME_LEN, MH_MESSAGES, SYNC_MARKER, SYNC_NAMES_OFFSET};
use crate::error::{AmtError, Result};

const SYNC_COMMAND_OFFSET: usize = 1;
const SYNC_KIND_OFFSET: usize = 6;
const SYNC_MARKER_OFFSET: usize = 7;

/// Which name table a sync exchange reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// `0x31`: panel name
    Name,
    /// `0x32`: user names
    User,
    /// `0x33`: zone names
    Zone,
    /// Kind byte not known to this client
    Unknown(u8),
}

impl TableKind {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0x31 => Self::Name,
            0x32 => Self::User,
            0x33 => Self::Zone,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Name => 0x31,
            Self::User => 0x32,
            Self::Zone => 0x33,
            Self::Unknown(v) => *v,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("NAME"),
            Self::User => f.write_str("USER"),
            Self::Zone => f.write_str("ZONE"),
            Self::Unknown(v) => write!(f, "0x{:02x}", v),
        }
    }
}

/// A decoded sync reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTable {
    pub kind: TableKind,
    pub names: Vec<String>,
}

/// Map one byte of the panel charset to a character.
pub fn remap_char(byte: u8) -> char {
    CHAR_MAP
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, ch)| *ch)
        .unwrap_or(char::from(byte))
}

/// Decode a sync reply payload into its table kind and names.
pub fn decode_names(payload: &[u8]) -> Result<NameTable> {
    if payload.len() <= SYNC_MARKER_OFFSET {
        return Err(AmtError::invalid_payload(format!(
            "sync reply too short: {} bytes",
            payload.len()
        )));
    }
    if payload[SYNC_COMMAND_OFFSET] != MH_MESSAGES || payload[SYNC_MARKER_OFFSET] != SYNC_MARKER {
        return Err(AmtError::invalid_payload("not a sync reply"));
    }

    let kind = TableKind::from_u8(payload[SYNC_KIND_OFFSET]);
    let mut names = Vec::new();
    let mut buffer = String::new();
    let mut buffered = 0usize;

    for &byte in payload.iter().skip(SYNC_NAMES_OFFSET) {
        // The byte that closes a name is consumed, whether it is a null or
        // the one following a full-length name.
        if byte == 0x00 || buffered >= MAX_NAME_LEN {
            names.push(buffer.trim().to_string());
            buffer.clear();
            buffered = 0;
        } else {
            buffer.push(remap_char(byte));
            buffered += 1;
        }
    }

    // Unterminated tail: its last byte is the frame terminator, not text.
    if !buffer.is_empty() {
        buffer.pop();
        names.push(buffer.trim().to_string());
    }

    Ok(NameTable { kind, names })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a sync reply with the given name bytes after the header.
    fn reply(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, MH_MESSAGES, 0x00, 0x00, 0x00, 0x00, kind, SYNC_MARKER, 0x00];
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_remap_char() {
        assert_eq!(remap_char(150), 'Ü');
        assert_eq!(remap_char(138), 'ç');
        assert_eq!(remap_char(b'A'), 'A');
        // Unmapped high bytes pass through as Latin-1.
        assert_eq!(remap_char(0xE9), 'é');
        assert_eq!(remap_char(152), '\u{98}');
    }

    #[test]
    fn test_two_names() {
        let mut body = b"  Sala ".to_vec();
        body.push(0x00);
        body.extend_from_slice(b"Cozinha");
        body.push(0x00);

        let table = decode_names(&reply(0x33, &body)).unwrap();
        assert_eq!(table.kind, TableKind::Zone);
        assert_eq!(table.names, vec!["Sala".to_string(), "Cozinha".to_string()]);
    }

    #[test]
    fn test_fourteen_chars_cut_without_null() {
        // 14 characters, then the byte that closes the name, then another name.
        let mut body = b"ABCDEFGHIJKLMN".to_vec();
        body.push(b' ');
        body.extend_from_slice(b"Porta");
        body.push(0x00);

        let table = decode_names(&reply(0x33, &body)).unwrap();
        assert_eq!(table.names, vec!["ABCDEFGHIJKLMN".to_string(), "Porta".to_string()]);
    }

    #[test]
    fn test_trailing_buffer_drops_terminator() {
        let mut body = b"Central".to_vec();
        body.push(0x5C);

        let table = decode_names(&reply(0x31, &body)).unwrap();
        assert_eq!(table.kind, TableKind::Name);
        assert_eq!(table.names, vec!["Central".to_string()]);
    }

    #[test]
    fn test_charset_in_names() {
        let body = [b'P', 134, b'r', b't', b'i', b'c', b'o', 0x00];
        let table = decode_names(&reply(0x33, &body)).unwrap();
        assert_eq!(table.names, vec!["Pórtico".to_string()]);
    }

    #[test]
    fn test_empty_slots_are_kept() {
        let body = [b'A', 0x00, 0x00, b'B', 0x00];
        let table = decode_names(&reply(0x32, &body)).unwrap();
        assert_eq!(table.kind, TableKind::User);
        assert_eq!(table.names, vec!["A".to_string(), String::new(), "B".to_string()]);
    }

    #[test]
    fn test_rejects_non_sync_payload() {
        let mut data = reply(0x33, b"x\0");
        data[1] = 0x5A;
        assert!(matches!(decode_names(&data), Err(AmtError::InvalidPayload { .. })));

        let mut data = reply(0x33, b"x\0");
        data[7] = 0x00;
        assert!(matches!(decode_names(&data), Err(AmtError::InvalidPayload { .. })));

        assert!(matches!(decode_names(&[0xE4]), Err(AmtError::InvalidPayload { .. })));
    }

    #[test]
    fn test_table_kind_roundtrip() {
        for kind in [TableKind::Name, TableKind::User, TableKind::Zone, TableKind::Unknown(0x40)] {
            assert_eq!(TableKind::from_u8(kind.as_u8()), kind);
        }
        assert_eq!(TableKind::Zone.to_string(), "ZONE");
    }
}
