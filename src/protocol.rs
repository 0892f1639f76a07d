// MIT License - Copyright (c) 2026 Peter Wright
// MyHome command encoding

use std::fmt;

use crate::codec::{checksum, hex, MAX_PAYLOAD_LEN};
use crate::config::ArmType;
use crate::constants::*;
use crate::error::{AmtError, Result};
use crate::names::TableKind;

/// Commands carried inside a MyHome envelope.
///
/// # Envelope
///
/// ```text
/// [0x21][password: 4 ASCII digits][inner command][payload...][0x21]
/// ```
///
/// The envelope is the payload of an outer `MY_HOME` (0xE9) frame. Every
/// reply to an envelope also arrives under `MY_HOME`, so replies are
/// correlated by ordering alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MyHomeCommand {
    /// `0x41`: Arm. Payload `0x41` arms away, `0x50` arms stay.
    /// Replies `0xE4` when an enabled, non-bypassed zone is open.
    Arm { arm_type: ArmType },
    /// `0x42`: Bypass exactly the listed zones (1-based). Zones not listed
    /// are un-bypassed.
    Bypass { zones: Vec<u8> },
    /// `0x44`: Disarm.
    Disarm,
    /// `0x45`: Panic. Payload `0x01` audible, `0x00` silent.
    Panic { silent: bool },
    /// `0x5A`: Full status block (see [`crate::status`]).
    Status,
    /// `0xF1`: Fetch entries of a name table.
    Messages { kind: TableKind, indexes: Vec<u8> },
    /// `0x50`: Switch the PGM output.
    Pgm { enable: bool },
}

impl MyHomeCommand {
    /// The command id as documented for the panel.
    pub fn id(&self) -> u8 {
        match self {
            MyHomeCommand::Arm { .. } => MH_ARM,
            MyHomeCommand::Bypass { .. } => MH_BYPASS,
            MyHomeCommand::Disarm => MH_DISARM,
            MyHomeCommand::Panic { .. } => MH_PANIC,
            MyHomeCommand::Status => MH_STATUS,
            MyHomeCommand::Messages { .. } => MH_MESSAGES,
            MyHomeCommand::Pgm { .. } => MH_PGM,
        }
    }

    /// The byte placed in the envelope's command slot.
    ///
    /// Identical to [`id`](Self::id) except for `Messages`, whose id is
    /// carried inside the sync descriptor.
    pub fn envelope_command(&self) -> u8 {
        match self {
            MyHomeCommand::Messages { .. } => MH_SYNC_ENVELOPE,
            other => other.id(),
        }
    }

    /// Build the inner payload.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            MyHomeCommand::Arm { arm_type } => match arm_type {
                ArmType::Away => vec![ARM_AWAY_PAYLOAD],
                ArmType::Stay => vec![ARM_STAY_PAYLOAD],
            },
            MyHomeCommand::Bypass { zones } => zone_mask(zones)?.to_vec(),
            MyHomeCommand::Disarm | MyHomeCommand::Status => Vec::new(),
            MyHomeCommand::Panic { silent } => {
                if *silent {
                    vec![PANIC_SILENT_PAYLOAD]
                } else {
                    vec![PANIC_AUDIBLE_PAYLOAD]
                }
            }
            MyHomeCommand::Messages { kind, indexes } => build_sync_descriptor(*kind, indexes)?,
            MyHomeCommand::Pgm { enable } => {
                if *enable {
                    PGM_ENABLE_PAYLOAD.to_vec()
                } else {
                    PGM_DISABLE_PAYLOAD.to_vec()
                }
            }
        };
        Ok(payload)
    }

    /// Encode the full envelope for this command.
    pub fn to_envelope(&self, password: &Password) -> Result<Vec<u8>> {
        Ok(build_envelope(password, self.envelope_command(), &self.payload()?))
    }
}

/// A panel access code: exactly four ASCII digits.
#[derive(Clone, PartialEq, Eq)]
pub struct Password([u8; PASSWORD_LEN]);

impl Password {
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != PASSWORD_LEN || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(AmtError::InvalidPassword);
        }
        let mut digits = [0u8; PASSWORD_LEN];
        digits.copy_from_slice(bytes);
        Ok(Self(digits))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(****)")
    }
}

/// `[0x21] + password + [inner_command] + inner_payload + [0x21]`
pub fn build_envelope(password: &Password, inner_command: u8, inner_payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(inner_payload.len() + PASSWORD_LEN + 3);
    buf.push(ENVELOPE_DELIMITER);
    buf.extend_from_slice(password.as_bytes());
    buf.push(inner_command);
    buf.extend_from_slice(inner_payload);
    buf.push(ENVELOPE_DELIMITER);
    buf
}

/// Envelope bytes around an inner payload: delimiters, password, command.
const ENVELOPE_OVERHEAD: usize = PASSWORD_LEN + 3;

/// Descriptor bytes around the index list.
const SYNC_DESCRIPTOR_OVERHEAD: usize = 8;

/// Most indexes one sync request can carry inside a single frame.
pub const MAX_SYNC_INDEXES: usize = MAX_PAYLOAD_LEN - ENVELOPE_OVERHEAD - SYNC_DESCRIPTOR_OVERHEAD;

/// `[0x00, 0x00, 0xF1, 0x00, len+2, kind, 0xE0] + indexes + [checksum]`
pub fn build_sync_descriptor(kind: TableKind, indexes: &[u8]) -> Result<Vec<u8>> {
    if indexes.len() > MAX_SYNC_INDEXES {
        return Err(AmtError::invalid_payload(format!(
            "{} sync indexes, at most {} fit in a frame",
            indexes.len(),
            MAX_SYNC_INDEXES
        )));
    }
    let mut buf = Vec::with_capacity(indexes.len() + 8);
    buf.extend_from_slice(&[0x00, 0x00, MH_MESSAGES, 0x00]);
    buf.push(indexes.len() as u8 + 2);
    buf.push(kind.as_u8());
    buf.push(SYNC_MARKER);
    buf.extend_from_slice(indexes);
    buf.push(checksum(&buf));
    Ok(buf)
}

/// Little-endian 24-bit mask with bit `n - 1` set for every zone `n`.
pub fn zone_mask(zones: &[u8]) -> Result<[u8; 3]> {
    let mut mask = 0u32;
    for &zone in zones {
        if zone == 0 || zone as usize > MAX_ZONES {
            return Err(AmtError::InvalidZone { zone });
        }
        mask |= 1 << (zone - 1);
    }
    let bytes = mask.to_le_bytes();
    Ok([bytes[0], bytes[1], bytes[2]])
}

/// Render a MyHome payload for logs. Passwords are masked.
pub fn describe_my_home(data: &[u8]) -> String {
    if data.first() == Some(&OK) {
        return "OK".to_string();
    }
    let is_envelope = data.len() >= PASSWORD_LEN + 3
        && data[0] == ENVELOPE_DELIMITER
        && data[data.len() - 1] == ENVELOPE_DELIMITER;
    if !is_envelope {
        return hex(data);
    }

    let command = data[PASSWORD_LEN + 1];
    let body = &data[PASSWORD_LEN + 2..data.len() - 1];
    let name = match command {
        MH_ARM => "ARM".to_string(),
        MH_BYPASS => "BYPASS".to_string(),
        MH_DISARM => "DISARM".to_string(),
        MH_PANIC if body == [PANIC_AUDIBLE_PAYLOAD] => "PANIC_AUDIBLE".to_string(),
        MH_PANIC if body == [PANIC_SILENT_PAYLOAD] => "PANIC_SILENT".to_string(),
        MH_PGM => "PGM".to_string(),
        MH_STATUS => "STATUS".to_string(),
        MH_SYNC_ENVELOPE if body.len() > 5 && body[2] == MH_MESSAGES => {
            format!("MESSAGES {}", TableKind::from_u8(body[5]))
        }
        other if body.is_empty() => format!("0x{:02x}", other),
        other => format!("0x{:02x}: {}", other, hex(body)),
    };
    format!("CMD = {}, PASSWORD = ****", name)
}
