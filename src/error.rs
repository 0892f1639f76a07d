// MIT License - Copyright (c) 2026 Peter Wright
// Error types

use std::sync::Arc;

/// All errors that can occur while talking to an AMT panel.
///
/// `Clone` so that the error ending a session can be handed to every
/// request that was waiting on that session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AmtError {
    #[error("Transport error: {0}")]
    Transport(Arc<std::io::Error>),

    #[error("Connection timeout")]
    ConnectTimeout,

    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    Checksum { expected: u8, received: u8 },

    #[error("Malformed frame")]
    MalformedFrame,

    #[error("Panel offline (handshake result {code})")]
    HandshakeOffline { code: u8 },

    #[error("Another device already holds the panel session")]
    HandshakeOccupied,

    #[error("Handshake rejected (result {code})")]
    HandshakeRejected { code: u8 },

    #[error("Request timeout: command 0x{command:02X}")]
    Timeout { command: u8 },

    #[error("Cannot arm: an enabled zone is open")]
    OpenZone,

    #[error("Disconnected")]
    Disconnected,

    #[error("Invalid password: expected 4 ASCII digits")]
    InvalidPassword,

    #[error("Invalid MAC address: {value}")]
    InvalidMac { value: String },

    #[error("Invalid zone number: {zone} (valid: 1-24)")]
    InvalidZone { zone: u8 },

    #[error("Invalid payload: {details}")]
    InvalidPayload { details: String },

    #[error("Frame payload too large: {len} bytes")]
    FrameTooLarge { len: usize },

    #[error("Connection manager already running")]
    AlreadyRunning,
}

impl From<std::io::Error> for AmtError {
    fn from(err: std::io::Error) -> Self {
        AmtError::Transport(Arc::new(err))
    }
}

impl AmtError {
    /// Whether this error ends the current TCP session (and triggers reconnect).
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            AmtError::Transport(_)
                | AmtError::ConnectTimeout
                | AmtError::Checksum { .. }
                | AmtError::MalformedFrame
                | AmtError::HandshakeOffline { .. }
                | AmtError::HandshakeOccupied
                | AmtError::HandshakeRejected { .. }
                | AmtError::Disconnected
        )
    }

    pub(crate) fn invalid_payload(details: impl Into<String>) -> Self {
        AmtError::InvalidPayload {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AmtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_classification() {
        assert!(AmtError::Checksum { expected: 1, received: 2 }.is_session_fatal());
        assert!(AmtError::HandshakeOccupied.is_session_fatal());
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(AmtError::from(reset).is_session_fatal());

        assert!(!AmtError::Timeout { command: 0xE9 }.is_session_fatal());
        assert!(!AmtError::OpenZone.is_session_fatal());
        assert!(!AmtError::InvalidZone { zone: 30 }.is_session_fatal());
    }

    #[test]
    fn test_clone_shares_io_error() {
        let err = AmtError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        let copy = err.clone();
        match (err, copy) {
            (AmtError::Transport(a), AmtError::Transport(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected transport errors"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AmtError::Checksum { expected: 0xAB, received: 0x01 }.to_string(),
            "Checksum mismatch: expected 0xAB, received 0x01"
        );
        assert_eq!(
            AmtError::Timeout { command: 0xE9 }.to_string(),
            "Request timeout: command 0xE9"
        );
    }
}
