// MIT License - Copyright (c) 2026 Peter Wright
// Transport layer

//! Session plumbing: the connection manager that owns the socket and the
//! multiplexer that serializes requests over it.

pub mod connection;
pub(crate) mod mux;

pub use connection::connection_data;
