// MIT License - Copyright (c) 2026 Peter Wright
// AMT frame codec

//! Outer frame codec.
//!
//! ```text
//! +--------+---------+------------------+----------+
//! | length | command | payload[0..n]    | checksum |
//! +--------+---------+------------------+----------+
//! length = n + 1, checksum = XOR(length, command, payload...) ^ 0xFF
//! ```
//!
//! `PING` and `OK` travel as a single byte with no length or checksum.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::{command_name, MY_HOME, OK, PING};
use crate::error::{AmtError, Result};
use crate::protocol::describe_my_home;

/// Largest payload that fits behind a one-byte length.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

/// One decoded unit of the outer protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// A payload-less frame (`PING`, `OK`, key request).
    pub fn bare(command: u8) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.command, &self.payload)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match command_name(self.command) {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "0x{:02x}", self.command)?,
        }
        if self.payload.is_empty() {
            return Ok(());
        }
        if self.command == MY_HOME {
            write!(f, ": {}", describe_my_home(&self.payload))
        } else {
            write!(f, ": {}", hex(&self.payload))
        }
    }
}

/// Colon-separated lowercase hex, e.g. `21:31:32`.
pub(crate) fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// XOR of every byte, inverted.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b) ^ 0xFF
}

/// Encode a command and payload into wire bytes.
pub fn encode(command: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if command == PING || command == OK {
        return Ok(vec![command]);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(AmtError::FrameTooLarge { len: payload.len() });
    }

    let mut buf = Vec::with_capacity(payload.len() + 3);
    buf.push(payload.len() as u8 + 1);
    buf.push(command);
    buf.extend_from_slice(payload);
    buf.push(checksum(&buf));
    Ok(buf)
}

/// Read exactly one frame from the stream.
///
/// A short read or checksum mismatch is returned as an error; there is no
/// resynchronisation, the caller is expected to drop the connection.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let length = reader.read_u8().await?;
    if length == PING || length == OK {
        return Ok(Frame::bare(length));
    }
    if length == 0 {
        return Err(AmtError::MalformedFrame);
    }

    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await?;
    let received = reader.read_u8().await?;

    let expected = body.iter().fold(length, |acc, b| acc ^ b) ^ 0xFF;
    if received != expected {
        return Err(AmtError::Checksum { expected, received });
    }

    let payload = body.split_off(1);
    Ok(Frame {
        command: body[0],
        payload,
    })
}
