// MIT License - Copyright (c) 2026 Peter Wright
// Request multiplexing

//! Request/response multiplexing over the single panel session.
//!
//! The panel has no correlation id beyond the outer command byte, so only
//! one logical exchange may be in flight. A request takes the request lock,
//! registers a subscriber queue, hands its frame to the connection's writer
//! and then reads its queue until a frame with a matching command shows up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::codec::Frame;
use crate::error::{AmtError, Result};

/// Item delivered to a subscriber: a frame, or the error that ended the session.
pub(crate) type Delivery = std::result::Result<Frame, AmtError>;

/// An outbound frame waiting for the writer.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub frame: Frame,
    /// Registry generation the caller's queue was registered under.
    pub generation: u64,
    /// Fulfilled once the frame is written, or with the send error.
    pub done: oneshot::Sender<Result<()>>,
}

impl PendingRequest {
    pub fn new(frame: Frame, generation: u64) -> (Self, oneshot::Receiver<Result<()>>) {
        let (done, rx) = oneshot::channel();
        (Self { frame, generation, done }, rx)
    }

    /// The caller stopped waiting (timeout or cancellation).
    pub fn is_abandoned(&self) -> bool {
        self.done.is_closed()
    }

    pub fn fail(self, err: AmtError) {
        let _ = self.done.send(Err(err));
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    /// Bumped by every `fail_all`.
    generation: u64,
    queues: HashMap<u64, mpsc::Sender<Delivery>>,
}

/// Inbound fan-out: the reader pushes every frame into every live queue.
pub(crate) struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
    capacity: usize,
}

impl SubscriberRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a queue. It is removed when the returned guard drops.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.queues.insert(id, tx);
        Subscription {
            id,
            generation: inner.generation,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Offer a frame to every queue without waiting. Full queues miss it.
    pub fn dispatch(&self, frame: &Frame) {
        let inner = self.lock();
        for (id, queue) in inner.queues.iter() {
            if queue.try_send(Ok(frame.clone())).is_err() {
                trace!("Subscriber {} full, dropping {}", id, frame);
            }
        }
    }

    /// Deliver `err` to every queue and detach them all.
    pub fn fail_all(&self, err: &AmtError) {
        let mut inner = self.lock();
        inner.generation += 1;
        for (_, queue) in inner.queues.drain() {
            // A full queue just loses its sender; its request then sees
            // the channel close and reports a disconnect.
            let _ = queue.try_send(Err(err.clone()));
        }
    }

    /// A queue registered under an older generation has already been failed.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn len(&self) -> usize {
        self.lock().queues.len()
    }

    fn remove(&self, id: u64) {
        self.lock().queues.remove(&id);
    }
}

/// A registered subscriber queue.
pub(crate) struct Subscription {
    id: u64,
    generation: u64,
    rx: mpsc::Receiver<Delivery>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Serializes logical requests onto the connection's outbound queue.
pub(crate) struct Multiplexer {
    lock: tokio::sync::Mutex<()>,
    outbound: mpsc::UnboundedSender<PendingRequest>,
    subscribers: Arc<SubscriberRegistry>,
    timeout: Duration,
}

impl Multiplexer {
    pub fn new(
        outbound: mpsc::UnboundedSender<PendingRequest>,
        subscribers: Arc<SubscriberRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            lock: tokio::sync::Mutex::new(()),
            outbound,
            subscribers,
            timeout,
        }
    }

    /// Send one frame and wait for the next inbound frame with the same command.
    ///
    /// The timeout covers the whole exchange: waiting for a session, the
    /// write and the reply. Dropping the returned future at any point
    /// releases the lock and unregisters the queue.
    pub async fn request(&self, command: u8, payload: Vec<u8>) -> Result<Vec<u8>> {
        let _turn = self.lock.lock().await;
        let mut subscription = self.subscribers.subscribe();

        match timeout(self.timeout, self.exchange(command, payload, &mut subscription)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Request 0x{:02x} timed out after {:?}", command, self.timeout);
                Err(AmtError::Timeout { command })
            }
        }
    }

    async fn exchange(
        &self,
        command: u8,
        payload: Vec<u8>,
        subscription: &mut Subscription,
    ) -> Result<Vec<u8>> {
        let frame = Frame::new(command, payload);
        let (pending, sent) = PendingRequest::new(frame, subscription.generation());
        self.outbound
            .send(pending)
            .map_err(|_| AmtError::Disconnected)?;
        sent.await.map_err(|_| AmtError::Disconnected)??;
        debug!("Request 0x{:02x} sent, waiting for reply", command);

        loop {
            match subscription.recv().await {
                Some(Ok(frame)) if frame.command == command => return Ok(frame.payload),
                Some(Ok(frame)) => {
                    trace!("Ignoring {} while waiting for 0x{:02x}", frame, command)
                }
                Some(Err(err)) => return Err(err),
                None => return Err(AmtError::Disconnected),
            }
        }
    }
}
