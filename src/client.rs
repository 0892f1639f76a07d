// MIT License - Copyright (c) 2026 Peter Wright
// AMT client facade

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::{ArmType, ClientConfig};
use crate::constants::{
    MAX_USERS, MAX_ZONES, MY_HOME, REPLY_OPEN_ZONE, USER_SYNC_BATCH, ZONE_SYNC_BATCH,
};
use crate::error::{AmtError, Result};
use crate::event::{event_channel, ConnectionState, EventReceiver, EventSender};
use crate::names::{decode_names, TableKind};
use crate::protocol::{MyHomeCommand, Password};
use crate::status::{decode_status_with_pgm_bit, Status};
use crate::transport::connection::ConnectionManager;
use crate::transport::mux::{Multiplexer, SubscriberRegistry};

const EVENT_CAPACITY: usize = 256;

/// Client for one AMT panel.
///
/// Cheap to clone; all clones share one connection. Nothing is sent until
/// [`run`](Self::run) is driving the connection, typically from its own task:
///
/// ```no_run
/// use intelbras_amt::{AmtClient, ClientConfig, MacAddress};
///
/// # async fn demo() -> intelbras_amt::Result<()> {
/// let config = ClientConfig::builder()
///     .mac(MacAddress::parse("00:1a:3f:f1:4c:c6")?)
///     .password("1234")
///     .build();
/// let client = AmtClient::new(config)?;
///
/// let runner = client.clone();
/// tokio::spawn(async move { runner.run().await });
///
/// let status = client.status().await?;
/// println!("armed: {}", status.is_armed());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AmtClient {
    inner: Arc<Inner>,
}

struct Inner {
    password: Password,
    pgm_status_bit: u8,
    mux: Multiplexer,
    connection: ConnectionManager,
    subscribers: Arc<SubscriberRegistry>,
    events: EventSender,
}

impl AmtClient {
    /// Build a client. Fails if the configured password is not 4 digits.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let password = Password::new(&config.password)?;
        let subscribers = Arc::new(SubscriberRegistry::new(config.subscriber_capacity));
        let (events, _) = event_channel(EVENT_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let mux = Multiplexer::new(outbound_tx, subscribers.clone(), config.request_timeout());
        let pgm_status_bit = config.pgm_status_bit;
        let connection =
            ConnectionManager::new(config, outbound_rx, subscribers.clone(), events.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                password,
                pgm_status_bit,
                mux,
                connection,
                subscribers,
                events,
            }),
        })
    }

    // --- Connection ---

    /// Drive the connection until [`shutdown`](Self::shutdown).
    ///
    /// Reconnects on every failure. Returns `AlreadyRunning` if another
    /// `run()` on this client is active.
    pub async fn run(&self) -> Result<()> {
        self.inner.connection.run().await
    }

    /// Stop `run()`. Requests still waiting fail with `Disconnected`.
    pub fn shutdown(&self) {
        info!("Shutting down AMT client");
        self.inner.connection.shutdown();
    }

    /// Subscribe to connection state changes and inbound frames.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch_state()
    }

    /// Number of live subscriber queues; zero whenever no request is in flight.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// One raw exchange: send `command` and return the payload of the next
    /// inbound frame with the same command.
    pub async fn request(&self, command: u8, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.inner.mux.request(command, payload).await
    }

    async fn my_home(&self, command: MyHomeCommand, password: &Password) -> Result<Vec<u8>> {
        let envelope = command.to_envelope(password)?;
        self.request(MY_HOME, envelope).await
    }

    // --- Panel operations ---

    /// Arm the panel. An open enabled zone is reported as `OpenZone`.
    pub async fn arm(&self, password: &str, arm_type: ArmType) -> Result<()> {
        let password = Password::new(password)?;
        debug!("Arming ({:?})", arm_type);
        let reply = self.my_home(MyHomeCommand::Arm { arm_type }, &password).await?;
        if reply == [REPLY_OPEN_ZONE] {
            warn!("Arm refused: an enabled zone is open");
            return Err(AmtError::OpenZone);
        }
        Ok(())
    }

    pub async fn disarm(&self, password: &str) -> Result<()> {
        let password = Password::new(password)?;
        self.my_home(MyHomeCommand::Disarm, &password).await?;
        Ok(())
    }

    pub async fn panic(&self, password: &str, silent: bool) -> Result<()> {
        let password = Password::new(password)?;
        self.my_home(MyHomeCommand::Panic { silent }, &password).await?;
        Ok(())
    }

    /// Switch the PGM output.
    pub async fn pgm(&self, enable: bool) -> Result<()> {
        self.my_home(MyHomeCommand::Pgm { enable }, &self.inner.password)
            .await?;
        Ok(())
    }

    /// Bypass exactly `zones` (1-based); every other zone is un-bypassed.
    pub async fn bypass(&self, zones: &[u8]) -> Result<()> {
        let command = MyHomeCommand::Bypass { zones: zones.to_vec() };
        self.my_home(command, &self.inner.password).await?;
        Ok(())
    }

    /// Bypass or restore one zone, keeping the rest of the bypass set.
    pub async fn set_zone_bypass(&self, zone: u8, bypassed: bool) -> Result<()> {
        if zone == 0 || zone as usize > MAX_ZONES {
            return Err(AmtError::InvalidZone { zone });
        }
        let mut zones = self.status().await?.annulled_zones();
        zones.retain(|z| *z != zone);
        if bypassed {
            zones.push(zone);
        }
        self.bypass(&zones).await
    }

    /// Fetch the entries `indexes` of a name table.
    pub async fn sync(&self, kind: TableKind, indexes: &[u8]) -> Result<Vec<String>> {
        let command = MyHomeCommand::Messages {
            kind,
            indexes: indexes.to_vec(),
        };
        let reply = self.my_home(command, &self.inner.password).await?;
        let table = decode_names(&reply)?;
        if table.kind != kind {
            debug!("Asked for {} names, panel answered {}", kind, table.kind);
        }
        Ok(table.names)
    }

    pub async fn status(&self) -> Result<Status> {
        let reply = self.my_home(MyHomeCommand::Status, &self.inner.password).await?;
        decode_status_with_pgm_bit(&reply, self.inner.pgm_status_bit)
    }

    // --- Name helpers ---

    /// The panel's own name.
    pub async fn panel_name(&self) -> Result<String> {
        let names = self.sync(TableKind::Name, &[0]).await?;
        Ok(names.into_iter().next().unwrap_or_default())
    }

    /// All zone names, zone 1 first.
    pub async fn zone_names(&self) -> Result<Vec<String>> {
        self.paged_names(TableKind::Zone, MAX_ZONES, ZONE_SYNC_BATCH).await
    }

    /// All user names, user 1 first.
    pub async fn user_names(&self) -> Result<Vec<String>> {
        self.paged_names(TableKind::User, MAX_USERS, USER_SYNC_BATCH).await
    }

    async fn paged_names(
        &self,
        kind: TableKind,
        total: usize,
        batch: usize,
    ) -> Result<Vec<String>> {
        let indexes: Vec<u8> = (0..total as u8).collect();
        let mut names = Vec::with_capacity(total);
        for round in indexes.chunks(batch) {
            names.extend(self.sync(kind, round).await?);
        }
        debug!("Fetched {} {} names", names.len(), kind);
        Ok(names)
    }
}
