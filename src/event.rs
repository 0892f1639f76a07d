// MIT License - Copyright (c) 2026 Peter Wright
// Connection events

use std::fmt;

use crate::codec::Frame;

/// Connection state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Connected => "connected",
        })
    }
}

/// Events published by the client.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<ClientEvent>`. Slow receivers lag and
/// lose events; the connection never waits for them.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The connection manager moved to a new state
    StateChanged(ConnectionState),
    /// Any frame read from the panel, including unsolicited pushes
    Frame(Frame),
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<ClientEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<ClientEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
