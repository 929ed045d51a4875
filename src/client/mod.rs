//! Client facade: composes the callback registry, handler table, and
//! dispatcher with the external conduits to provide the public send/receive
//! surface.
//!
//! # Architecture
//!
//! The client owns two conduits. The announce conduit exists only for the
//! identity handshake: on `connect()` the client sends its connection
//! identity over it, after which the bidirectional data conduit becomes
//! usable. A background receive loop reads frames from the data conduit,
//! decodes them, and hands each decoded packet to the dispatcher.
//!
//! # Concurrency
//!
//! Multiple tasks may send, register handlers, and issue blocking waits
//! simultaneously while the receive loop dispatches inbound packets. The
//! registry and table each serialize behind their own mutex, and neither
//! lock is held while a handler runs. `send_and_wait` suspends only the
//! calling task; the receive loop stays live and resolves the very callback
//! the waiter is blocked on.

mod callbacks;
mod dispatch;
mod handlers;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    ClientConfig,
    CodecPtr,
    ConduitPtr,
    CorrelationId,
    Error,
    Packet,
    PacketTypeId,
    Result,
};

use callbacks::CallbackRegistry;
use dispatch::Dispatcher;
use handlers::HandlerTable;

/// Connection identity announced to the server when the client connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn generate() -> Self {
        Self(rand::random())
    }

    /// Raw identity value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    fn announce_frame(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0.to_le_bytes())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Client connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No conduit established.
    Disconnected,
    /// Announce conduit connecting / identity being sent.
    ConnectingIdentity,
    /// Identity sent; data conduit connecting.
    ConnectingConduit,
    /// Data conduit live; sends are accepted.
    Ready,
}

/// Packet client with request/response correlation.
///
/// Cheap to clone (internally `Arc`-backed). One instance per connection;
/// there is no process-wide singleton.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    config: ClientConfig,
    identity: ConnectionId,
    announce: ConduitPtr,
    data: ConduitPtr,
    codec: CodecPtr,
    callbacks: Arc<CallbackRegistry>,
    handlers: Arc<HandlerTable>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ConnectionState>,

    /// Receive loop handle; aborted on disconnect.
    rx_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    // ---
    /// Create a client over the given conduits and codec.
    ///
    /// The announce conduit carries the one-off identity handshake; the
    /// data conduit carries encoded packets both ways. Nothing is connected
    /// until [`connect`](Self::connect) is called.
    pub fn new(
        announce: ConduitPtr,
        data: ConduitPtr,
        codec: CodecPtr,
        config: ClientConfig,
    ) -> Self {
        // ---
        let callbacks = Arc::new(CallbackRegistry::new(
            config.callback_lifetime,
            config.callback_sweep_interval,
        ));
        let handlers = Arc::new(HandlerTable::new(config.catalog.table_len()));
        let dispatcher = Arc::new(Dispatcher::new(callbacks.clone(), handlers.clone()));

        Self {
            inner: Arc::new(Inner {
                config,
                identity: ConnectionId::generate(),
                announce,
                data,
                codec,
                callbacks,
                handlers,
                dispatcher,
                state: Mutex::new(ConnectionState::Disconnected),
                rx_task: Mutex::new(None),
            }),
        }
    }

    /// This client's announced identity.
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.identity
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// Number of in-flight correlated requests awaiting a response.
    pub fn outstanding_callbacks(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Force an immediate expiry sweep of abandoned callback registrations.
    ///
    /// Normally unnecessary: sweeps piggy-back on registrations. Useful for
    /// clients that go quiet for long stretches and want to release the
    /// handlers held by stale entries.
    pub fn sweep_callbacks(&self) {
        self.inner.callbacks.sweep_at(std::time::Instant::now());
    }

    /// Connect: announce identity, then bring up the data conduit.
    ///
    /// Walks `Disconnected → ConnectingIdentity → ConnectingConduit →
    /// Ready`. On any failure the state falls back to `Disconnected` and
    /// the error is returned.
    pub async fn connect(&self) -> Result<()> {
        // ---
        match self.connect_inner().await {
            Ok(()) => {
                self.set_state(ConnectionState::Ready);
                log_info!(
                    "client {} ready (connection id {})",
                    self.inner.config.client_id,
                    self.inner.identity
                );
                Ok(())
            }
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    async fn connect_inner(&self) -> Result<()> {
        // ---
        self.set_state(ConnectionState::ConnectingIdentity);
        self.inner.announce.connect().await?;
        self.inner
            .announce
            .send(self.inner.identity.announce_frame())
            .await?;

        self.set_state(ConnectionState::ConnectingConduit);
        self.inner.data.connect().await?;
        let mut inbox = self.inner.data.open().await?;

        let dispatcher = self.inner.dispatcher.clone();
        let codec = self.inner.codec.clone();
        let guard = RxLoopGuard {
            inner: Arc::downgrade(&self.inner),
        };

        let task = tokio::spawn(async move {
            // ---
            let _guard = guard;

            while let Some(frame) = inbox.inbox.recv().await {
                match codec.decode(&frame) {
                    Ok((packet, type_id)) => dispatcher.dispatch(packet, type_id),
                    Err(_err) => {
                        // Malformed frames are dropped, never dispatched.
                        log_error!("dropping undecodable inbound frame: {_err}");
                    }
                }
            }
            log_debug!("data conduit closed, receive loop exiting");
        });

        *lock(&self.inner.rx_task) = Some(task);
        Ok(())
    }

    /// Tear down both conduits and return to `Disconnected`.
    pub async fn disconnect(&self) -> Result<()> {
        // ---
        // Leave Ready before aborting the loop so its exit guard stays quiet.
        self.set_state(ConnectionState::Disconnected);

        if let Some(task) = lock(&self.inner.rx_task).take() {
            task.abort();
        }

        self.inner.data.disconnect().await?;
        self.inner.announce.disconnect().await?;
        Ok(())
    }

    /// Fire-and-forget send.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` while the client is not `Ready`;
    /// packets are never silently dropped on the outbound path.
    pub async fn send(&self, packet: Packet) -> Result<()> {
        // ---
        self.ensure_ready()?;
        self.send_encoded(packet).await
    }

    /// Send without blocking, wiring `on_response` according to the
    /// packet's catalog kind.
    ///
    /// For kinds that expect a correlated callback response, a fresh
    /// correlation ID is stamped onto the packet and `on_response` is
    /// registered one-shot in the callback registry. For kinds with a
    /// declared plain response type, `on_response` is registered as a
    /// persistent handler for that type. Kinds with neither behave like
    /// [`send`](Self::send).
    pub async fn send_with_callback<F>(&self, mut packet: Packet, on_response: F) -> Result<()>
    where
        F: Fn(Packet) + Send + Sync + 'static,
    {
        // ---
        self.ensure_ready()?;

        let kind = self
            .inner
            .config
            .catalog
            .kind(packet.type_id)
            .ok_or(Error::UnknownPacketType(packet.type_id))?;

        if kind.expects_callback {
            let cid = self.fresh_correlation_id();
            packet.correlation_id = Some(cid);
            self.inner.callbacks.register(cid, Box::new(on_response));

            if let Err(err) = self.send_encoded(packet).await {
                // The request never left; drop the orphaned registration.
                let _ = self.inner.callbacks.resolve(cid);
                return Err(err);
            }
            return Ok(());
        }

        if let Some(response_type) = kind.response_type {
            self.inner.handlers.register(response_type, Arc::new(on_response));
        }

        self.send_encoded(packet).await
    }

    /// Send a correlated request and wait for its response.
    ///
    /// Registers a one-shot callback *before* sending (so a fast response
    /// cannot race past registration), then suspends the calling task until
    /// the callback fires or `timeout` elapses, whichever comes first. The
    /// default timeout comes from the configuration (30 seconds).
    ///
    /// A timeout is a valid, silent outcome: the call returns `Ok(())`
    /// without having invoked `on_response`, and the stale registration is
    /// reclaimed by a later sweep. Callers treat "`on_response` never ran"
    /// as their timeout signal.
    ///
    /// Only the calling task waits; inbound dispatch stays live throughout.
    pub async fn send_and_wait<F>(
        &self,
        mut packet: Packet,
        on_response: F,
        timeout: Option<Duration>,
    ) -> Result<()>
    where
        F: FnOnce(Packet) + Send + 'static,
    {
        // ---
        self.ensure_ready()?;

        let cid = self.fresh_correlation_id();
        packet.correlation_id = Some(cid);

        let (tx, rx) = oneshot::channel();
        self.inner.callbacks.register(
            cid,
            Box::new(move |response| {
                on_response(response);
                let _ = tx.send(());
            }),
        );

        if let Err(err) = self.send_encoded(packet).await {
            let _ = self.inner.callbacks.resolve(cid);
            return Err(err);
        }

        let wait = timeout.unwrap_or(self.inner.config.default_wait_timeout);

        // First of {completion signal, timeout} wins. A closed channel
        // (entry swept mid-wait) is treated the same as a timeout. Either
        // way the wait ends silently.
        if time::timeout(wait, rx).await.is_err() {
            log_debug!("send_and_wait elapsed without a response (correlation id {cid})");
        }

        Ok(())
    }

    /// Register a persistent handler for a packet type.
    ///
    /// Multiple handlers may be registered per type; all fire, in
    /// registration order. Chainable.
    pub fn register<F>(&self, type_id: PacketTypeId, handler: F) -> &Self
    where
        F: Fn(Packet) + Send + Sync + 'static,
    {
        // ---
        self.inner.handlers.register(type_id, Arc::new(handler));
        self
    }

    /// Remove every persistently registered handler.
    pub fn unregister_all(&self) {
        self.inner.handlers.unregister_all();
    }

    /// Install the general received observer.
    ///
    /// The observer fires for every decoded inbound packet, before and
    /// independent of callback or handler routing. Chainable.
    pub fn on_received<F>(&self, observer: F) -> &Self
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        // ---
        self.inner.dispatcher.set_observer(Arc::new(observer));
        self
    }

    // --- internals ---

    fn ensure_ready(&self) -> Result<()> {
        // ---
        match self.state() {
            ConnectionState::Ready => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.inner.state) = state;
    }

    /// Draw a correlation ID not currently outstanding.
    ///
    /// A collision on a random 64-bit draw is all but impossible, but the
    /// registry makes re-checking cheap, so outstanding IDs are never
    /// reissued.
    fn fresh_correlation_id(&self) -> CorrelationId {
        // ---
        loop {
            let id = CorrelationId::generate();
            if !self.inner.callbacks.contains(id) {
                return id;
            }
        }
    }

    async fn send_encoded(&self, packet: Packet) -> Result<()> {
        // ---
        let frame = self.inner.codec.encode(&packet)?;
        self.inner.data.send(frame).await
    }
}

/// Marks the client disconnected when the receive loop ends while the
/// client still believes it is `Ready`.
///
/// Runs on every way out of the loop: conduit closure, task abort, and a
/// handler panic unwinding through dispatch. Without it a panicking handler
/// would kill dispatch while `send` keeps reporting `Ready`.
///
/// Holds a `Weak` so the loop task never keeps `Inner` (and its own join
/// handle) alive.
struct RxLoopGuard {
    inner: std::sync::Weak<Inner>,
}

impl Drop for RxLoopGuard {
    fn drop(&mut self) {
        // ---
        if let Some(inner) = self.inner.upgrade() {
            let mut state = lock(&inner.state);
            if *state == ConnectionState::Ready {
                *state = ConnectionState::Disconnected;
                log_warn!("receive loop stopped; client marked disconnected");
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
