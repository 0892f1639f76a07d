// MIT License - Copyright (c) 2026 Peter Wright
// Intelbras AMT panel client
//
//! # intelbras-amt
//!
//! Client for Intelbras AMT alarm panels over their binary TCP protocol.
//!
//! One long-lived connection carries every request. [`AmtClient::run`]
//! owns that connection: it performs the session handshake, reconnects
//! after any failure, and fans inbound frames out to waiting requests.
//! Operations (`arm`, `disarm`, `status`, ...) can be issued from any task;
//! they are serialized so that each caller only ever sees its own reply.
//!
//! ## Quick Start
//!
//! ```no_run
//! use intelbras_amt::{AmtClient, ArmType, ClientConfig, MacAddress};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .host("amt.intelbras.com.br")
//!         .mac(MacAddress::parse("00:1a:3f:f1:4c:c6")?)
//!         .password("1234")
//!         .build();
//!
//!     let client = AmtClient::new(config)?;
//!     let runner = client.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     for zone in client.status().await?.open_zones() {
//!         println!("zone {} is open", zone.number);
//!     }
//!     client.arm("1234", ArmType::Away).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.shutdown();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod devices;
pub mod error;
pub mod event;
pub mod names;
pub mod protocol;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use client::AmtClient;
pub use codec::Frame;
pub use config::{ArmType, ClientConfig, ClientConfigBuilder, MacAddress};
pub use error::{AmtError, Result};
pub use event::{ClientEvent, ConnectionState, EventReceiver};
pub use names::{NameTable, TableKind};
pub use protocol::{MyHomeCommand, Password};
pub use status::{AlarmState, Status};
pub use devices::zone::{Zone, ZoneFlags};
pub use devices::system::BatteryFlags;
