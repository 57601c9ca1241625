//! WebSocket client transport with correlation, queuing, and reconnection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::backoff::ReconnectPolicy;
use super::queue::OutboundQueue;
use crate::rpc::{Envelope, Notification, Request, RequestId, Response, RpcError};

/// Externally observable liveness of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel and no retry scheduled (initial, or after `disconnect`).
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The channel is open.
    Connected,
    /// The channel dropped; a retry is scheduled.
    Retrying,
    /// The retry budget ran out; no further automatic reconnection.
    Exhausted,
}

/// Tuning knobs for [`WsTransport`].
#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    /// Reconnection backoff schedule.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the outbound queue used while disconnected.
    pub queue_capacity: usize,
}

impl Default for WsTransportConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            queue_capacity: 256,
        }
    }
}

/// Failures surfaced to transport callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel could not be established.
    #[error("connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server answered with an error response.
    #[error("{0}")]
    Rpc(RpcError),

    /// The transport was torn down before a response arrived.
    #[error("transport closed before a response arrived")]
    Closed,

    /// An explicit deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The outbound envelope could not be serialized.
    #[error("frame serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

type PendingSender = oneshot::Sender<Result<Value, RpcError>>;
type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;
type StateCallback = Box<dyn Fn(ConnectionState) + Send + Sync>;

struct TransportInner {
    url: String,
    config: WsTransportConfig,
    /// Monotonic request ids, never reused within this instance's lifetime.
    next_id: AtomicI64,
    pending: Mutex<HashMap<i64, PendingSender>>,
    queue: Mutex<OutboundQueue>,
    subscribers: Mutex<Vec<(u64, NotificationHandler)>>,
    next_subscriber_id: AtomicU64,
    state: Mutex<ConnectionState>,
    state_callback: Mutex<Option<StateCallback>>,
    /// Sender into the live IO task; `None` while disconnected.
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Consecutive failed/dropped connections since the last success.
    attempt: AtomicU32,
    shutdown: AtomicBool,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TransportInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportInner")
            .field("url", &self.url)
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}

impl TransportInner {
    fn current_state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a state transition, firing the callback on every move in or
    /// out of `Connected`.
    fn set_state(&self, next: ConnectionState) {
        let previous = {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        if previous == next {
            return;
        }
        let crossed_connected =
            previous == ConnectionState::Connected || next == ConnectionState::Connected;
        if crossed_connected
            && let Ok(guard) = self.state_callback.lock()
            && let Some(callback) = guard.as_ref()
        {
            callback(next);
        }
    }

    /// Sends a frame on the live channel, or queues it while disconnected.
    ///
    /// Lock order is queue then writer, matching
    /// [`Self::attach_writer`], so the check and the enqueue are one
    /// atomic step: a frame can never land in the queue after a flush
    /// already drained it.
    fn send_or_enqueue(&self, frame: String) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = {
            let guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(writer) => writer.send(frame.clone()).is_ok(),
                None => false,
            }
        };
        if !sent {
            queue.push(frame);
        }
    }

    /// Installs the live writer and flushes every queued frame into it in
    /// enqueue order, all under the queue lock.
    fn attach_writer(&self, writer_tx: mpsc::UnboundedSender<String>) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(writer_tx.clone());
        }
        for frame in queue.drain() {
            if writer_tx.send(frame).is_err() {
                break;
            }
        }
    }

    /// Routes one inbound frame. Malformed frames are logged and dropped;
    /// they never tear the transport down or disturb pending requests.
    fn handle_frame(&self, text: &str) {
        match Envelope::parse(text) {
            Ok(Envelope::Response(response)) => self.resolve_response(response),
            Ok(Envelope::Notification(notification)) => {
                let handlers: Vec<NotificationHandler> = self
                    .subscribers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect();
                for handler in handlers {
                    handler(&notification);
                }
            }
            Ok(Envelope::Request(request)) => {
                tracing::debug!(method = %request.method, "ignoring server-initiated request");
            }
            Err(error) => {
                tracing::warn!(error = %error, "dropping malformed inbound frame");
            }
        }
    }

    /// Completes the pending request matching the response id, if any.
    /// A response matching nothing pending is silently discarded.
    fn resolve_response(&self, response: Response) {
        let Some(RequestId::Number(id)) = response.id else {
            tracing::debug!("discarding response without a numeric id");
            return;
        };
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let Some(sender) = sender else {
            tracing::trace!(id, "discarding response with no pending request");
            return;
        };
        let outcome = match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error),
            // Classification guarantees exactly one arm above.
            _ => Err(RpcError::internal("response carried no outcome")),
        };
        let _ = sender.send(outcome);
    }

    /// Registers a freshly opened channel: resets the retry budget, flushes
    /// the queue, and spawns the IO task.
    fn install(self: &Arc<Self>, stream: WebSocketStream<MaybeTlsStream<TcpStream>>) {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        self.attach_writer(writer_tx);
        self.attempt.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        tokio::spawn(io_loop(Arc::clone(self), stream, writer_rx));
    }

    /// Schedules the next reconnect attempt, or gives up once the retry
    /// budget is exhausted.
    fn schedule_reconnect(self: &Arc<Self>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst);
        let Some(delay) = self.config.reconnect.delay_for(attempt) else {
            tracing::warn!(attempt, "reconnect attempts exhausted, giving up");
            self.set_state(ConnectionState::Exhausted);
            return;
        };
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        self.set_state(ConnectionState::Retrying);

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.shutdown.load(Ordering::SeqCst) {
                return;
            }
            inner.set_state(ConnectionState::Connecting);
            match connect_async(&inner.url).await {
                Ok((stream, _)) => inner.install(stream),
                Err(error) => {
                    tracing::warn!(error = %error, "reconnect attempt failed");
                    inner.schedule_reconnect();
                }
            }
        });
        let mut guard = self
            .retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(handle);
    }
}

/// Owns the socket: pumps outbound frames from the writer channel and
/// routes inbound frames, until the channel closes from either side.
async fn io_loop(
    inner: Arc<TransportInner>,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut writer_rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = writer_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if sink.send(WsMessage::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    // Writer dropped: explicit disconnect, close cleanly.
                    None => {
                        let _ = sink.close().await;
                        return;
                    }
                }
            }
            msg = source.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => inner.handle_frame(text.as_str()),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(error)) => {
                        tracing::debug!(error = %error, "channel error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Unexpected closure: drop the dead writer and start the backoff
    // schedule. Pending requests stay registered so a late response after
    // reconnection can still resolve them.
    {
        let mut guard = inner.writer.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }
    if inner.shutdown.load(Ordering::SeqCst) {
        inner.set_state(ConnectionState::Disconnected);
    } else {
        inner.schedule_reconnect();
    }
}

/// One logical connection to the gateway.
///
/// Presents a correlation-based request/response API plus notification
/// subscriptions, transparently surviving disconnects. Construct one and
/// inject it wherever it is needed; there is deliberately no global
/// instance.
#[derive(Debug, Clone)]
pub struct WsTransport {
    inner: Arc<TransportInner>,
}

impl WsTransport {
    /// Creates a transport for the given `ws://` or `wss://` URL. No
    /// connection is attempted until [`connect`](Self::connect).
    #[must_use]
    pub fn new(url: impl Into<String>, config: WsTransportConfig) -> Self {
        let queue_capacity = config.queue_capacity;
        Self {
            inner: Arc::new(TransportInner {
                url: url.into(),
                config,
                next_id: AtomicI64::new(1),
                pending: Mutex::new(HashMap::new()),
                queue: Mutex::new(OutboundQueue::new(queue_capacity)),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                state: Mutex::new(ConnectionState::Disconnected),
                state_callback: Mutex::new(None),
                writer: Mutex::new(None),
                attempt: AtomicU32::new(0),
                shutdown: AtomicBool::new(false),
                retry_task: Mutex::new(None),
            }),
        }
    }

    /// Opens the channel.
    ///
    /// Resolves once the channel is open. A failure here is returned to the
    /// caller *and* starts the same backoff schedule a later drop would:
    /// every connect attempt is independent. Calling this after
    /// [`disconnect`](Self::disconnect) re-arms automatic reconnection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the channel cannot be
    /// established.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.inner.shutdown.store(false, Ordering::SeqCst);
        self.inner.set_state(ConnectionState::Connecting);
        match connect_async(&self.inner.url).await {
            Ok((stream, _)) => {
                self.inner.install(stream);
                Ok(())
            }
            Err(error) => {
                self.inner.schedule_reconnect();
                Err(error.into())
            }
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// The frame is sent immediately when connected, otherwise queued for
    /// the next successful reconnect. There is no default deadline: if the
    /// connection drops and never comes back, the future stays pending
    /// (ids are never reused, so a late response after reconnection still
    /// resolves it). Use [`request_with_timeout`](Self::request_with_timeout)
    /// when the caller needs a bound.
    ///
    /// # Errors
    ///
    /// [`TransportError::Rpc`] when the server answers with an error,
    /// [`TransportError::Closed`] when the transport is torn down first,
    /// [`TransportError::Encode`] when the envelope cannot be serialized.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, TransportError> {
        let (_, receiver) = self.start_request(method, params)?;
        match receiver.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(TransportError::Rpc(error)),
            Err(_) => Err(TransportError::Closed),
        }
    }

    /// [`request`](Self::request) with an explicit deadline. On timeout the
    /// pending entry is dropped, so a late response is silently discarded.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`TransportError::Timeout`].
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        let (id, receiver) = self.start_request(method, params)?;
        match tokio::time::timeout(deadline, receiver).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(TransportError::Rpc(error)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.inner
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    /// Allocates the next id, registers the pending entry, and sends or
    /// queues the frame.
    fn start_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(i64, oneshot::Receiver<Result<Value, RpcError>>), TransportError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let frame =
            Envelope::Request(Request::new(method, params, RequestId::Number(id))).to_frame()?;
        let (sender, receiver) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        self.inner.send_or_enqueue(frame);
        Ok((id, receiver))
    }

    /// Sends a fire-and-forget notification, with the same queuing
    /// behavior as [`request`](Self::request) but no pending entry.
    ///
    /// # Errors
    ///
    /// [`TransportError::Encode`] when the envelope cannot be serialized.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let frame = Envelope::Notification(Notification::new(method, params)).to_frame()?;
        self.inner.send_or_enqueue(frame);
        Ok(())
    }

    /// Registers a handler invoked for every incoming notification, in
    /// arrival order. All registered handlers see every notification.
    /// Dropping the returned subscription removes only this handler.
    #[must_use]
    pub fn on_notification(
        &self,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> NotificationSubscription {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        NotificationSubscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Installs the callback fired synchronously on every transition in or
    /// out of [`ConnectionState::Connected`].
    pub fn set_state_callback(&self, callback: impl Fn(ConnectionState) + Send + Sync + 'static) {
        let mut guard = self
            .inner
            .state_callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Box::new(callback));
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.current_state()
    }

    /// Tears the transport down: cancels any scheduled reconnect, closes
    /// the channel, and fails pending requests with
    /// [`TransportError::Closed`]. No automatic reconnection follows until
    /// the next explicit [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);

        // Cancel the retry timer before anything else so a stale timer
        // cannot resurrect the connection.
        if let Some(task) = self
            .inner
            .retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }

        // Dropping the writer closes the IO task's channel cleanly.
        {
            let mut guard = self
                .inner
                .writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = None;
        }

        // Teardown is the one place pending requests are dropped.
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.inner.set_state(ConnectionState::Disconnected);
    }
}

/// Handle to one registered notification handler; dropping it removes
/// that handler and no other.
pub struct NotificationSubscription {
    inner: Weak<TransportInner>,
    id: u64,
}

impl std::fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
