//! Source connection manager and broadcast fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sink::ClientSink;
use super::transport::{SourceTransport, TransportFactory, WsTransport};
use super::{ConnectionState, ReconnectConfig};
use crate::domain::epoch_millis;
use crate::error::Result;

/// Parses one inbound source message.
///
/// Must be synchronous and non-blocking. A `Some` result is enqueued for
/// broadcast to every client sink, tagged with the source name and the
/// wall-clock receipt time.
pub trait SourceHandler: Send + Sync {
    fn handle(&self, source: &str, message: &Value) -> Option<Value>;
}

impl<F> SourceHandler for F
where
    F: Fn(&str, &Value) -> Option<Value> + Send + Sync,
{
    fn handle(&self, source: &str, message: &Value) -> Option<Value> {
        self(source, message)
    }
}

/// One item on the broadcast queue.
#[derive(Debug, Clone)]
pub struct BroadcastItem {
    pub source: String,
    pub data: Value,
    pub received_at: i64,
}

impl BroadcastItem {
    fn into_message(self) -> Value {
        json!({
            "source": self.source,
            "data": self.data,
            "timestamp": self.received_at,
        })
    }
}

/// Point-in-time status of one source connection.
#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub name: String,
    pub endpoint: String,
    pub state: ConnectionState,
    /// Milliseconds since the last inbound message, if any was received.
    pub last_message_age_ms: Option<i64>,
    pub reconnect_attempts: u32,
    pub error: Option<String>,
    pub subscriptions: Vec<String>,
}

/// State shared between the manager and a source's connection task.
struct SourceShared {
    name: String,
    endpoint: String,
    state: RwLock<ConnectionState>,
    /// Epoch millis of the last inbound message; zero when none yet.
    last_message_at: AtomicI64,
    attempts: AtomicU32,
    error: RwLock<Option<String>>,
    subscriptions: RwLock<HashSet<String>>,
}

impl SourceShared {
    fn new(name: String, endpoint: String) -> Self {
        Self {
            name,
            endpoint,
            state: RwLock::new(ConnectionState::Connecting),
            last_message_at: AtomicI64::new(0),
            attempts: AtomicU32::new(0),
            error: RwLock::new(None),
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_error(&self, message: String) {
        *self.error.write() = Some(message);
    }

    fn clear_error(&self) {
        *self.error.write() = None;
    }
}

struct SourceEntry {
    shared: Arc<SourceShared>,
    shutdown_tx: watch::Sender<bool>,
    outbound_tx: mpsc::UnboundedSender<String>,
    handle: JoinHandle<()>,
}

type SinkMap = Mutex<HashMap<u64, Arc<dyn ClientSink>>>;

/// Connection and broadcast manager.
///
/// Owns one reconnecting outbound connection per registered source and a
/// set of client sinks. Explicitly constructed; call
/// [`start`](Self::start) to run the broadcast worker and
/// [`shutdown`](Self::shutdown) to stop everything.
pub struct FeedManager {
    config: ReconnectConfig,
    sources: Mutex<HashMap<String, SourceEntry>>,
    sinks: Arc<SinkMap>,
    next_sink_id: AtomicU64,
    queue_tx: mpsc::Sender<BroadcastItem>,
    queue_rx: Mutex<Option<mpsc::Receiver<BroadcastItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl FeedManager {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.broadcast_queue_size);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            sources: Mutex::new(HashMap::new()),
            sinks: Arc::new(Mutex::new(HashMap::new())),
            next_sink_id: AtomicU64::new(1),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            worker: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Start the broadcast worker. Idempotent.
    pub fn start(&self) {
        let Some(queue_rx) = self.queue_rx.lock().take() else {
            return;
        };
        let sinks = self.sinks.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *self.worker.lock() = Some(tokio::spawn(broadcast_worker(queue_rx, sinks, shutdown_rx)));
        info!("Feed manager started");
    }

    /// Register a WebSocket source and start its connect-and-receive loop.
    ///
    /// Connection failures are not observable synchronously; they surface
    /// through [`status`](Self::status).
    ///
    /// # Errors
    ///
    /// Fails only on a malformed endpoint URL.
    pub fn register_source(
        &self,
        name: &str,
        endpoint: &str,
        handler: Arc<dyn SourceHandler>,
    ) -> Result<()> {
        let url = url::Url::parse(endpoint)?;
        self.register_source_with(name, endpoint, handler, WsTransport::factory(url));
        Ok(())
    }

    /// Register a source with an explicit transport factory.
    ///
    /// The seam used by tests to drive the loop with scripted transports.
    pub fn register_source_with(
        &self,
        name: &str,
        endpoint: &str,
        handler: Arc<dyn SourceHandler>,
        factory: TransportFactory,
    ) {
        let shared = Arc::new(SourceShared::new(name.to_string(), endpoint.to_string()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run_source(
            shared.clone(),
            factory,
            handler,
            self.config.clone(),
            self.queue_tx.clone(),
            outbound_rx,
            shutdown_rx,
        ));

        let entry = SourceEntry {
            shared,
            shutdown_tx,
            outbound_tx,
            handle,
        };

        // Re-registering a name replaces the old connection.
        if let Some(previous) = self.sources.lock().insert(name.to_string(), entry) {
            let _ = previous.shutdown_tx.send(true);
            previous.handle.abort();
        }
    }

    /// Cancel a source's loop and drop its registration. Idempotent.
    pub fn remove_source(&self, name: &str) {
        if let Some(entry) = self.sources.lock().remove(name) {
            let _ = entry.shutdown_tx.send(true);
            entry.handle.abort();
            info!(source = name, "Source removed");
        }
    }

    /// Record a channel subscription and send the subscribe message.
    ///
    /// The channel is re-subscribed automatically after every reconnect.
    /// Returns false for an unknown source.
    pub fn subscribe(&self, name: &str, channel: &str) -> bool {
        let sources = self.sources.lock();
        let Some(entry) = sources.get(name) else {
            return false;
        };

        entry
            .shared
            .subscriptions
            .write()
            .insert(channel.to_string());

        if entry.shared.state() == ConnectionState::Connected {
            let message = json!({"type": "subscribe", "channel": channel}).to_string();
            let _ = entry.outbound_tx.send(message);
        }
        true
    }

    /// Queue a message for delivery to a connected source.
    ///
    /// Returns false when the source is unknown or not connected.
    pub fn send_to_source(&self, name: &str, message: &Value) -> bool {
        let sources = self.sources.lock();
        let Some(entry) = sources.get(name) else {
            return false;
        };
        if entry.shared.state() != ConnectionState::Connected {
            warn!(source = name, "Cannot send: not connected");
            return false;
        }
        entry.outbound_tx.send(message.to_string()).is_ok()
    }

    /// Add a client sink to the fan-out set; returns its id.
    pub fn add_client(&self, sink: Arc<dyn ClientSink>) -> u64 {
        let id = self.next_sink_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.lock().insert(id, sink);
        debug!(client = id, total = self.client_count(), "Client added");
        id
    }

    /// Remove a client sink. Idempotent.
    pub fn remove_client(&self, id: u64) {
        self.sinks.lock().remove(&id);
    }

    /// Number of registered client sinks.
    pub fn client_count(&self) -> usize {
        self.sinks.lock().len()
    }

    /// Enqueue an item for broadcast to all sinks.
    ///
    /// Non-blocking: returns false and drops the item when the queue is
    /// full, so a slow consumer cannot stall the producer.
    pub fn broadcast(&self, source: &str, data: Value) -> bool {
        let item = BroadcastItem {
            source: source.to_string(),
            data,
            received_at: epoch_millis(),
        };
        match self.queue_tx.try_send(item) {
            Ok(()) => true,
            Err(_) => {
                warn!(source, "Broadcast queue full, dropping item");
                false
            }
        }
    }

    /// Status of every registered source, for health reporting.
    pub fn status(&self) -> Vec<SourceStatus> {
        let now = epoch_millis();
        self.sources
            .lock()
            .values()
            .map(|entry| {
                let shared = &entry.shared;
                let last = shared.last_message_at.load(Ordering::Relaxed);
                SourceStatus {
                    name: shared.name.clone(),
                    endpoint: shared.endpoint.clone(),
                    state: shared.state(),
                    last_message_age_ms: (last > 0).then(|| now - last),
                    reconnect_attempts: shared.attempts.load(Ordering::Relaxed),
                    error: shared.error.read().clone(),
                    subscriptions: shared.subscriptions.read().iter().cloned().collect(),
                }
            })
            .collect()
    }

    /// State of one source, if registered.
    pub fn source_state(&self, name: &str) -> Option<ConnectionState> {
        self.sources.lock().get(name).map(|e| e.shared.state())
    }

    /// Stop the broadcast worker and every source loop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let entries: Vec<SourceEntry> = {
            let mut sources = self.sources.lock();
            sources.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            let _ = entry.shutdown_tx.send(true);
            let _ = entry.handle.await;
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        info!("Feed manager stopped");
    }
}

/// Why the receive loop ended.
enum LoopExit {
    Shutdown,
    TransportFailed(String),
}

/// One step resolved by the receive loop's select.
enum Step {
    Inbound(Option<Result<String>>),
    Outbound(Option<String>),
    Shutdown,
}

/// Connect-and-receive loop for one source.
///
/// Retries transport failures with exponential backoff until the attempt
/// limit is reached, then parks in the terminal `Disconnected` state.
/// Cancellable at any suspension point via the shutdown channel.
async fn run_source(
    shared: Arc<SourceShared>,
    factory: TransportFactory,
    handler: Arc<dyn SourceHandler>,
    config: ReconnectConfig,
    queue_tx: mpsc::Sender<BroadcastItem>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            shared.set_state(ConnectionState::Disconnected);
            return;
        }

        shared.set_state(ConnectionState::Connecting);
        info!(source = %shared.name, endpoint = %shared.endpoint, "Connecting");

        let mut transport = factory();
        let connected = tokio::select! {
            result = transport.connect() => Some(result),
            _ = shutdown_rx.changed() => None,
        };

        match connected {
            None => {
                transport.close().await;
                shared.set_state(ConnectionState::Disconnected);
                return;
            }
            Some(Ok(())) => {
                shared.set_state(ConnectionState::Connected);
                shared.clear_error();
                shared.attempts.store(0, Ordering::Relaxed);
                info!(source = %shared.name, "Connected");

                match drive_connection(
                    transport.as_mut(),
                    &shared,
                    handler.as_ref(),
                    &queue_tx,
                    &mut outbound_rx,
                    &mut shutdown_rx,
                )
                .await
                {
                    LoopExit::Shutdown => {
                        transport.close().await;
                        shared.set_state(ConnectionState::Disconnected);
                        return;
                    }
                    LoopExit::TransportFailed(reason) => {
                        warn!(source = %shared.name, reason, "Connection lost");
                        shared.set_error(reason);
                        transport.close().await;
                    }
                }
            }
            Some(Err(e)) => {
                shared.set_error(e.to_string());
                transport.close().await;
            }
        }

        let attempt = shared.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        shared.set_state(ConnectionState::Error);

        if attempt >= config.max_attempts {
            warn!(
                source = %shared.name,
                attempts = attempt,
                "Max reconnection attempts reached"
            );
            shared.set_state(ConnectionState::Disconnected);
            return;
        }

        let delay = config.backoff_delay_ms(attempt);
        warn!(source = %shared.name, attempt, delay_ms = delay, "Retrying after delay");
        shared.set_state(ConnectionState::Reconnecting);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            _ = shutdown_rx.changed() => {
                shared.set_state(ConnectionState::Disconnected);
                return;
            }
        }
    }
}

/// Service one established connection: re-subscribe, then pump inbound
/// messages to the handler and outbound messages to the transport.
async fn drive_connection(
    transport: &mut dyn SourceTransport,
    shared: &SourceShared,
    handler: &dyn SourceHandler,
    queue_tx: &mpsc::Sender<BroadcastItem>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> LoopExit {
    // Re-issue tracked subscriptions on every (re)connect.
    let channels: Vec<String> = shared.subscriptions.read().iter().cloned().collect();
    for channel in channels {
        let message = json!({"type": "subscribe", "channel": channel}).to_string();
        if let Err(e) = transport.send(message).await {
            return LoopExit::TransportFailed(format!("subscribe failed: {e}"));
        }
    }

    loop {
        let step = tokio::select! {
            _ = shutdown_rx.changed() => Step::Shutdown,
            outgoing = outbound_rx.recv() => Step::Outbound(outgoing),
            inbound = transport.next_message() => Step::Inbound(inbound),
        };

        match step {
            Step::Shutdown => return LoopExit::Shutdown,
            Step::Outbound(Some(text)) => {
                if let Err(e) = transport.send(text).await {
                    return LoopExit::TransportFailed(format!("send failed: {e}"));
                }
            }
            // The manager holds the sender, so this only happens on drop.
            Step::Outbound(None) => return LoopExit::Shutdown,
            Step::Inbound(Some(Ok(text))) => {
                let now = epoch_millis();
                shared.last_message_at.store(now, Ordering::Relaxed);

                match serde_json::from_str::<Value>(&text) {
                    Ok(parsed) => {
                        if let Some(data) = handler.handle(&shared.name, &parsed) {
                            let item = BroadcastItem {
                                source: shared.name.clone(),
                                data,
                                received_at: now,
                            };
                            if queue_tx.try_send(item).is_err() {
                                warn!(source = %shared.name, "Broadcast queue full, dropping item");
                            }
                        }
                    }
                    // A malformed message is skipped, never fatal.
                    Err(e) => {
                        warn!(source = %shared.name, error = %e, "Skipping unparseable message");
                    }
                }
            }
            Step::Inbound(Some(Err(e))) => return LoopExit::TransportFailed(e.to_string()),
            Step::Inbound(None) => return LoopExit::TransportFailed("stream closed".into()),
        }
    }
}

/// Drain the broadcast queue and fan each item out to every sink.
///
/// A sink whose send fails is removed from the set; remaining sinks keep
/// receiving. Delivery preserves enqueue order.
async fn broadcast_worker(
    mut queue_rx: mpsc::Receiver<BroadcastItem>,
    sinks: Arc<SinkMap>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            item = queue_rx.recv() => match item {
                Some(item) => deliver(&sinks, item).await,
                None => break,
            }
        }
    }
}

async fn deliver(sinks: &SinkMap, item: BroadcastItem) {
    let message = item.into_message();

    let targets: Vec<(u64, Arc<dyn ClientSink>)> = sinks
        .lock()
        .iter()
        .map(|(id, sink)| (*id, sink.clone()))
        .collect();

    let mut failed = Vec::new();
    for (id, sink) in targets {
        if sink.send(&message).await.is_err() {
            failed.push(id);
        }
    }

    if !failed.is_empty() {
        let mut sinks = sinks.lock();
        for id in &failed {
            sinks.remove(id);
        }
        debug!(removed = failed.len(), "Dropped failed client sinks");
    }
}
