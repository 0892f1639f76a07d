// MIT License - Copyright (c) 2026 Peter Wright
// Panel session and reconnect loop

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{checksum, read_frame, Frame};
use crate::config::{ClientConfig, MacAddress};
use crate::constants::*;
use crate::crypto::{obfuscate_in_place, KeyedReader};
use crate::error::{AmtError, Result};
use crate::event::{ClientEvent, ConnectionState, EventSender};
use crate::transport::mux::{PendingRequest, SubscriberRegistry};

/// Owns the panel socket and drives the reconnect loop.
///
/// One session is: connect, handshake, then a reader task and the writer
/// loop until either fails. Whatever ends a session is handed to every
/// request still waiting on it, then the manager sleeps for the reconnect
/// delay and starts over.
pub(crate) struct ConnectionManager {
    config: ClientConfig,
    outbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingRequest>>,
    subscribers: Arc<SubscriberRegistry>,
    events: EventSender,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        outbound: mpsc::UnboundedReceiver<PendingRequest>,
        subscribers: Arc<SubscriberRegistry>,
        events: EventSender,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            outbound: tokio::sync::Mutex::new(outbound),
            subscribers,
            events,
            state,
            shutdown,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Ask a running `run()` to return. Sticky: later calls to `run()`
    /// return immediately.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run sessions until shutdown.
    pub async fn run(&self) -> Result<()> {
        let mut outbound = self
            .outbound
            .try_lock()
            .map_err(|_| AmtError::AlreadyRunning)?;
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let err = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                err = self.session(&mut outbound) => err,
            };

            self.set_state(ConnectionState::Disconnected);
            self.fail_session(&mut outbound, &err);
            warn!(
                "Session ended: {}. Reconnecting in {:.1}s",
                err,
                self.config.reconnect_delay().as_secs_f64()
            );

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = sleep(self.config.reconnect_delay()) => {}
            }
        }

        info!("Connection manager stopped");
        self.set_state(ConnectionState::Disconnected);
        self.fail_session(&mut outbound, &AmtError::Disconnected);
        Ok(())
    }

    /// One full session. Only returns when the session is over.
    async fn session(&self, outbound: &mut mpsc::UnboundedReceiver<PendingRequest>) -> AmtError {
        let (reader, writer, key) = match self.establish().await {
            Ok(parts) => parts,
            Err(err) => return err,
        };

        self.set_state(ConnectionState::Connected);
        info!("Connected to panel at {}", self.config.address());

        let mut reader_task = ReaderTask(tokio::spawn(read_loop(
            reader,
            self.subscribers.clone(),
            self.events.clone(),
        )));

        tokio::select! {
            err = reader_task.join() => err,
            err = write_loop(writer, key, outbound, &self.subscribers) => err,
        }
    }

    async fn establish(&self) -> Result<(KeyedReader<OwnedReadHalf>, OwnedWriteHalf, Option<u8>)> {
        self.set_state(ConnectionState::Connecting);
        let address = self.config.address();
        info!("Connecting to panel at {}", address);

        let stream = timeout(self.config.connect_timeout(), TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| AmtError::ConnectTimeout)??;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Cannot set TCP_NODELAY: {}", e);
        }
        debug!("TCP socket connected");

        self.set_state(ConnectionState::Handshaking);
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = KeyedReader::new(read_half);
        let key = timeout(
            self.config.handshake_timeout(),
            handshake(&mut reader, &mut write_half, &self.config),
        )
        .await
        .map_err(|_| AmtError::ConnectTimeout)??;

        Ok((reader, write_half, key))
    }

    /// Fail everything that was waiting on the session that just ended.
    fn fail_session(&self, outbound: &mut mpsc::UnboundedReceiver<PendingRequest>, err: &AmtError) {
        let mut failed = 0;
        while let Ok(pending) = outbound.try_recv() {
            pending.fail(err.clone());
            failed += 1;
        }
        if failed > 0 {
            debug!("Failed {} queued request(s): {}", failed, err);
        }
        self.subscribers.fail_all(err);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state: {} -> {}", previous, state);
            let _ = self.events.send(ClientEvent::StateChanged(state));
        }
    }
}

/// Resolves once shutdown is flagged, or the flag's sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Aborts the reader when the session is torn down.
struct ReaderTask(JoinHandle<AmtError>);

impl ReaderTask {
    async fn join(&mut self) -> AmtError {
        match (&mut self.0).await {
            Ok(err) => err,
            Err(join_err) => {
                error!("Reader task failed: {}", join_err);
                AmtError::Disconnected
            }
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Decode frames until the stream fails, fanning each one out.
async fn read_loop<R>(
    mut reader: R,
    subscribers: Arc<SubscriberRegistry>,
    events: EventSender,
) -> AmtError
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                trace!("<< {}", frame);
                subscribers.dispatch(&frame);
                let _ = events.send(ClientEvent::Frame(frame));
            }
            Err(err) => {
                debug!("Reader stopped: {}", err);
                return err;
            }
        }
    }
}

/// Send queued requests in order, acknowledging each one.
///
/// Requests nobody waits for any more are dropped unsent, and so are
/// requests whose reply queue was already failed by an earlier session.
async fn write_loop<W>(
    mut writer: W,
    key: Option<u8>,
    outbound: &mut mpsc::UnboundedReceiver<PendingRequest>,
    subscribers: &SubscriberRegistry,
) -> AmtError
where
    W: AsyncWrite + Unpin,
{
    while let Some(pending) = outbound.recv().await {
        if pending.is_abandoned() {
            debug!("Dropping abandoned request {}", pending.frame);
            continue;
        }
        if pending.generation != subscribers.generation() {
            debug!("Request {} outlived its session, not sending", pending.frame);
            pending.fail(AmtError::Disconnected);
            continue;
        }
        trace!(">> {}", pending.frame);
        let result = write_frame(&mut writer, &pending.frame, key).await;
        let fatal = match &result {
            Err(err) if err.is_session_fatal() => Some(err.clone()),
            _ => None,
        };
        let _ = pending.done.send(result);
        if let Some(err) = fatal {
            return err;
        }
    }
    AmtError::Disconnected
}

async fn write_frame<W>(writer: &mut W, frame: &Frame, key: Option<u8>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = frame.encode()?;
    obfuscate_in_place(&mut bytes, key);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Payload of the connection announcement sent under `CONNECTION_COMMAND`.
///
/// ```text
/// [0x06] ["00000000"] [mac: 6] [checksum of empty token] [45 00 00 00 00 03] [language]
/// ```
pub fn connection_data(mac: MacAddress) -> Vec<u8> {
    let token: &[u8] = &[];
    let mut data = Vec::with_capacity(CONNECTION_UUID_LEN + 17);
    data.push(CONNECTION_SOURCE);
    data.extend(std::iter::repeat(b'0').take(CONNECTION_UUID_LEN));
    data.extend_from_slice(&mac.octets());
    data.push(checksum(token));
    data.extend_from_slice(&CONNECTION_PROTOCOL);
    data.push(CONNECTION_LANGUAGE);
    data.extend_from_slice(token);
    data
}

/// Negotiate the session key and announce the connection.
///
/// Returns the session key, if one was requested. When inbound decryption
/// is configured the key is installed on `reader` before the result byte is
/// read.
pub(crate) async fn handshake<R, W>(
    reader: &mut KeyedReader<R>,
    writer: &mut W,
    config: &ClientConfig,
) -> Result<Option<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let key = if config.negotiate_session_key {
        debug!("Requesting session key");
        write_frame(writer, &Frame::bare(XOR_COMMAND), None).await?;
        let reply = read_frame(reader).await?;
        info!("Session key negotiated: 0x{:02x}", reply.command);
        Some(reply.command)
    } else {
        None
    };
    if config.decrypt_inbound {
        reader.set_key(key);
    }

    debug!("Announcing connection as {}", config.mac);
    let announcement = Frame::new(CONNECTION_COMMAND, connection_data(config.mac));
    write_frame(writer, &announcement, key).await?;

    match reader.read_u8().await? {
        HANDSHAKE_OK => {}
        HANDSHAKE_OCCUPIED => return Err(AmtError::HandshakeOccupied),
        code if HANDSHAKE_OFFLINE.contains(&code) => {
            return Err(AmtError::HandshakeOffline { code });
        }
        code => return Err(AmtError::HandshakeRejected { code }),
    }
    let status = reader.read_u8().await?;
    debug!("Handshake accepted (status byte 0x{:02x})", status);

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use tokio::io::{duplex, split, DuplexStream};

    const MAC: [u8; 6] = [0x00, 0x1A, 0x3F, 0xF1, 0x4C, 0xC6];

    fn config(negotiate: bool, decrypt: bool) -> ClientConfig {
        ClientConfig::builder()
            .mac(MacAddress::new(MAC))
            .negotiate_session_key(negotiate)
            .decrypt_inbound(decrypt)
            .build()
    }

    /// Answer a handshake; returns the announcement as sent on the wire.
    async fn fake_panel(mut panel: DuplexStream, key: Option<u8>, result: Vec<u8>) -> Vec<u8> {
        if let Some(key) = key {
            let request = read_frame(&mut panel).await.unwrap();
            assert_eq!(request, Frame::bare(XOR_COMMAND));
            panel.write_all(&encode(key, &[]).unwrap()).await.unwrap();
        }
        let mut wire = vec![0u8; 26];
        panel.read_exact(&mut wire).await.unwrap();
        panel.write_all(&result).await.unwrap();
        wire
    }

    async fn run_handshake(
        cfg: ClientConfig,
        key: Option<u8>,
        result: Vec<u8>,
    ) -> (Result<Option<u8>>, Vec<u8>) {
        let (client, panel) = duplex(256);
        let panel_task = tokio::spawn(fake_panel(panel, key, result));

        let (read_half, mut write_half) = split(client);
        let mut reader = KeyedReader::new(read_half);
        let outcome = handshake(&mut reader, &mut write_half, &cfg).await;
        (outcome, panel_task.await.unwrap())
    }

    #[test]
    fn test_connection_data_layout() {
        let data = connection_data(MacAddress::new(MAC));
        assert_eq!(data.len(), 23);
        assert_eq!(data[0], 0x06);
        assert_eq!(&data[1..9], b"00000000");
        assert_eq!(data[9..15], MAC);
        assert_eq!(data[15], 0xFF);
        assert_eq!(data[16..22], [0x45, 0, 0, 0, 0, 0x03]);
        assert_eq!(data[22], 0x00);
    }

    #[tokio::test]
    async fn test_handshake_obfuscates_announcement() {
        let (outcome, wire) =
            run_handshake(config(true, false), Some(0x5A), vec![HANDSHAKE_OK, 0x01]).await;
        assert_eq!(outcome.unwrap(), Some(0x5A));

        let mut plain = wire.clone();
        obfuscate_in_place(&mut plain, Some(0x5A));
        let expected = encode(CONNECTION_COMMAND, &connection_data(MacAddress::new(MAC))).unwrap();
        assert_eq!(plain, expected);
        assert_ne!(wire, expected);
    }

    #[tokio::test]
    async fn test_handshake_without_key() {
        let (outcome, wire) =
            run_handshake(config(false, false), None, vec![HANDSHAKE_OK, 0x00]).await;
        assert_eq!(outcome.unwrap(), None);
        let expected = encode(CONNECTION_COMMAND, &connection_data(MacAddress::new(MAC))).unwrap();
        assert_eq!(wire, expected);
    }

    #[tokio::test]
    async fn test_handshake_decrypts_result_when_configured() {
        let result = vec![HANDSHAKE_OK ^ 0x11, 0x11];
        let (outcome, _) = run_handshake(config(true, true), Some(0x11), result).await;
        assert_eq!(outcome.unwrap(), Some(0x11));
    }

    #[tokio::test]
    async fn test_handshake_result_codes() {
        let (outcome, _) =
            run_handshake(config(false, false), None, vec![HANDSHAKE_OCCUPIED]).await;
        assert!(matches!(outcome, Err(AmtError::HandshakeOccupied)));

        for code in HANDSHAKE_OFFLINE {
            let (outcome, _) = run_handshake(config(false, false), None, vec![code]).await;
            assert!(matches!(outcome, Err(AmtError::HandshakeOffline { code: c }) if c == code));
        }

        let (outcome, _) = run_handshake(config(false, false), None, vec![0x01]).await;
        assert!(matches!(outcome, Err(AmtError::HandshakeRejected { code: 0x01 })));
    }

    #[tokio::test]
    async fn test_read_loop_fans_out_and_stops_on_eof() {
        let registry = Arc::new(SubscriberRegistry::new(8));
        let mut sub = registry.subscribe();
        let (events, mut event_rx) = crate::event::event_channel(8);

        let mut wire = encode(PUSH_COMMAND, &[1, 2]).unwrap();
        wire.push(PING);
        let err = read_loop(&wire[..], registry.clone(), events).await;
        assert!(matches!(err, AmtError::Transport(_)));

        assert_eq!(sub.recv().await.unwrap().unwrap(), Frame::new(PUSH_COMMAND, vec![1, 2]));
        assert_eq!(sub.recv().await.unwrap().unwrap(), Frame::bare(PING));
        let event = event_rx.recv().await.unwrap();
        assert!(matches!(event, ClientEvent::Frame(f) if f.command == PUSH_COMMAND));
    }

    #[tokio::test]
    async fn test_write_loop_acknowledges_and_obfuscates() {
        let registry = SubscriberRegistry::new(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pending, sent) = PendingRequest::new(Frame::new(MY_HOME, vec![0x21]), 0);
        tx.send(pending).unwrap();
        drop(tx);

        let mut out = Vec::new();
        let err = write_loop(&mut out, Some(0x0F), &mut rx, &registry).await;
        assert!(matches!(err, AmtError::Disconnected));
        assert!(sent.await.unwrap().is_ok());

        obfuscate_in_place(&mut out, Some(0x0F));
        assert_eq!(out, encode(MY_HOME, &[0x21]).unwrap());
    }

    #[tokio::test]
    async fn test_write_loop_reports_oversized_frame_to_caller_only() {
        let registry = SubscriberRegistry::new(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (big, big_sent) = PendingRequest::new(Frame::new(MY_HOME, vec![0u8; 300]), 0);
        let (small, small_sent) = PendingRequest::new(Frame::new(MY_HOME, vec![1]), 0);
        tx.send(big).unwrap();
        tx.send(small).unwrap();
        drop(tx);

        let mut out = Vec::new();
        let _ = write_loop(&mut out, None, &mut rx, &registry).await;
        assert!(matches!(big_sent.await.unwrap(), Err(AmtError::FrameTooLarge { len: 300 })));
        assert!(small_sent.await.unwrap().is_ok());
        assert_eq!(out, encode(MY_HOME, &[1]).unwrap());
    }

    #[tokio::test]
    async fn test_write_loop_skips_abandoned_requests() {
        let registry = SubscriberRegistry::new(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (arm, arm_sent) = PendingRequest::new(Frame::new(MY_HOME, vec![0x41]), 0);
        let (status, status_sent) = PendingRequest::new(Frame::new(MY_HOME, vec![0x5A]), 0);
        tx.send(arm).unwrap();
        tx.send(status).unwrap();
        drop(tx);
        drop(arm_sent);

        let mut out = Vec::new();
        let _ = write_loop(&mut out, None, &mut rx, &registry).await;
        assert!(status_sent.await.unwrap().is_ok());
        assert_eq!(out, encode(MY_HOME, &[0x5A]).unwrap());
    }

    #[tokio::test]
    async fn test_write_loop_fails_requests_from_a_failed_session() {
        let registry = Arc::new(SubscriberRegistry::new(4));
        let stale_queue = registry.subscribe();
        registry.fail_all(&AmtError::Disconnected);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (stale, stale_sent) =
            PendingRequest::new(Frame::new(MY_HOME, vec![1]), stale_queue.generation());
        let (fresh, fresh_sent) =
            PendingRequest::new(Frame::new(MY_HOME, vec![2]), registry.generation());
        tx.send(stale).unwrap();
        tx.send(fresh).unwrap();
        drop(tx);

        let mut out = Vec::new();
        let _ = write_loop(&mut out, None, &mut rx, &registry).await;
        assert!(matches!(stale_sent.await.unwrap(), Err(AmtError::Disconnected)));
        assert!(fresh_sent.await.unwrap().is_ok());
        assert_eq!(out, encode(MY_HOME, &[2]).unwrap());
    }
}
