#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use backoff::backoff::{Backoff as _, Constant};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, sleep_until, timeout};
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::frame::{EVENT, InboundFrame, OutboundFrame, RESPONSE, RpcRequest, RpcResponse};
use super::pending::PendingRequests;
use super::traits::Resubscribe;
use super::transport::{CloseReason, Signal, Transport};
use crate::Result;
use crate::error::Error;

/// Broadcast channel capacity for connection events.
const BROADCAST_CAPACITY: usize = 1024;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; a reconnect may be scheduled
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Socket is open
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Caller asked to close and the close handshake is in progress
    Closing,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Everything the connection publishes to its listeners.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A socket opened and subscriptions were replayed
    Connect,
    /// A socket (or a connection attempt) closed
    Close,
    /// Server-pushed `event` payload, untouched
    Data(Value),
    /// A connection-level failure: failed attempt, socket error, missed heartbeat
    Error(Arc<Error>),
}

#[derive(Debug)]
enum Command {
    Connect,
    Close,
    Send(OutboundFrame),
}

/// Manages the socket lifecycle, reconnection, and request correlation.
///
/// All socket I/O and timers run on one background task; this handle only
/// talks to it through channels, so it is cheap to clone and share:
/// - `connect`/`close` drive the lifecycle, with a fixed-delay reconnect after
///   any close the caller did not ask for
/// - `request` correlates responses by id and fails after a fixed timeout
/// - `send` is fire-and-forget and is dropped while disconnected
/// - `subscribe` hands out receivers for [`ConnectionEvent`]s
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new("wss://pylon.example.com", Config::default())?;
/// let mut events = connection.subscribe();
/// connection.connect()?;
///
/// while let Ok(event) = events.recv().await {
///     if matches!(event, ConnectionEvent::Connect) {
///         let result = connection.request("simulateTransaction", &tx).await?;
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender channel for commands to the connection task
    command_tx: mpsc::UnboundedSender<Command>,
    /// Broadcast sender for connection events
    events_tx: broadcast::Sender<ConnectionEvent>,
    /// Correlated requests waiting for a response
    pending: Arc<PendingRequests>,
    /// Next request id; 0 is reserved for notifications
    next_id: Arc<AtomicU64>,
    request_timeout: Duration,
}

impl ConnectionManager {
    /// Create a connection manager and start its background task.
    ///
    /// Nothing is dialled until [`connect`](Self::connect) is called.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        Self::spawn(endpoint, config, None)
    }

    /// Like [`new`](Self::new), replaying `source` on every successful open.
    pub fn with_resubscribe(
        endpoint: &str,
        config: Config,
        source: Arc<dyn Resubscribe>,
    ) -> Result<Self> {
        Self::spawn(endpoint, config, Some(source))
    }

    fn spawn(
        endpoint: &str,
        config: Config,
        resubscribe: Option<Arc<dyn Resubscribe>>,
    ) -> Result<Self> {
        validate_endpoint(endpoint)?;

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let pending = Arc::new(PendingRequests::default());
        let request_timeout = config.request_timeout;

        let driver = Driver {
            endpoint: endpoint.to_owned(),
            reconnect_delay: (&config.reconnect).into(),
            config,
            commands,
            state_tx,
            events_tx: events_tx.clone(),
            pending: Arc::clone(&pending),
            resubscribe,
            closed_by_caller: false,
        };

        tokio::spawn(driver.run());

        Ok(Self {
            state_rx,
            command_tx,
            events_tx,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            request_timeout,
        })
    }

    /// Open the socket. A no-op while connecting or connected.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Close the socket and stop reconnecting until the next [`connect`](Self::connect).
    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    /// Send a fire-and-forget request (id 0).
    ///
    /// Dropped with a log if the socket is not open when the connection task
    /// gets to it; it is never queued for a later connection.
    pub fn send<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        let params = serde_json::to_value(params)?;
        self.send_request(RpcRequest::notification(method, params))
    }

    pub(crate) fn send_request(&self, request: RpcRequest) -> Result<()> {
        self.command(Command::Send(OutboundFrame::Request(request)))
    }

    /// Send a correlated request and wait for its response.
    ///
    /// Fails immediately when not connected, with the server's `error` value
    /// as a [`Kind::Rpc`](crate::error::Kind::Rpc) error, with
    /// [`WsError::Timeout`] after the request timeout, or with
    /// [`WsError::ConnectionClosed`] if the socket closes first. Dropping the
    /// returned future removes the request from the pending table.
    pub async fn request<P: Serialize>(&self, method: &str, params: P) -> Result<Value> {
        if !self.state().is_connected() {
            #[cfg(feature = "tracing")]
            tracing::error!(%method, "Not connected when sending request");
            return Err(WsError::NotConnected.into());
        }

        let params = serde_json::to_value(params)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut rx = self.pending.register(id, method);
        let _guard = self.pending.guard(id);

        self.send_request(RpcRequest::new(id, method, params))?;

        match timeout(self.request_timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(WsError::ConnectionClosed.into()),
            Err(_) => {
                if self.pending.cancel(id).is_some() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(id, %method, "Request timed out");
                    Err(WsError::Timeout.into())
                } else {
                    // The response won the race and is already in the channel.
                    rx.try_recv()
                        .unwrap_or_else(|_closed| Err(WsError::Timeout.into()))
                }
            }
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to connection events.
    ///
    /// Each call returns a new independent receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// Number of correlated requests still waiting for a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(Error::validation(format!(
            "endpoint {endpoint} must use ws or wss, not {scheme}"
        ))),
    }
}

/// How a connection attempt ended.
enum Attempt {
    Open(Transport),
    Failed(WsError),
    /// The caller closed before the socket opened
    Aborted,
    Shutdown,
}

/// How an open socket stopped.
enum Ended {
    Closed(CloseReason),
    ByCaller,
    Shutdown,
}

/// The connection task. Owns the socket, the state and the reconnect timer.
struct Driver {
    endpoint: String,
    config: Config,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    pending: Arc<PendingRequests>,
    resubscribe: Option<Arc<dyn Resubscribe>>,
    reconnect_delay: Constant,
    /// Set by `close()`, cleared by `connect()`; suppresses reconnects.
    closed_by_caller: bool,
}

impl Driver {
    async fn run(mut self) {
        let mut reconnect_at: Option<time::Instant> = None;

        loop {
            let command = match reconnect_at {
                Some(deadline) => tokio::select! {
                    () = sleep_until(deadline) => Some(Command::Connect),
                    command = self.commands.recv() => command,
                },
                None => self.commands.recv().await,
            };

            // Every handle is gone
            let Some(command) = command else {
                break;
            };

            match command {
                Command::Connect => {
                    reconnect_at = None;
                    self.closed_by_caller = false;

                    if self.session().await {
                        break;
                    }
                    reconnect_at = self.schedule_reconnect();
                }
                Command::Close => {
                    reconnect_at = None;
                    self.closed_by_caller = true;
                }
                Command::Send(frame) => self.drop_frame(&frame),
            }
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);
        self.pending.fail_all(|| WsError::ConnectionClosed.into());

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "Connection task stopped");
    }

    /// One connect attempt and, if it opens, the life of that socket.
    ///
    /// Returns `true` when the task should shut down.
    async fn session(&mut self) -> bool {
        self.state_tx.send_replace(ConnectionState::Connecting);

        let mut transport = match self.open().await {
            Attempt::Open(transport) => transport,
            Attempt::Failed(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Unable to connect");
                self.emit(ConnectionEvent::Error(Arc::new(e.into())));
                self.finish();
                return false;
            }
            Attempt::Aborted => {
                self.closed_by_caller = true;
                self.finish();
                return false;
            }
            Attempt::Shutdown => return true,
        };

        self.state_tx.send_replace(ConnectionState::Connected {
            since: Instant::now(),
        });

        let ended = match self.replay(&mut transport).await {
            Ok(()) => {
                self.emit(ConnectionEvent::Connect);
                self.pump(&mut transport).await
            }
            Err(e) => Ended::Closed(CloseReason::Error(e)),
        };

        match ended {
            Ended::Shutdown => {
                transport.close().await;
                return true;
            }
            Ended::ByCaller => {
                #[cfg(feature = "tracing")]
                tracing::debug!(endpoint = %self.endpoint, "Disconnected by caller");
            }
            Ended::Closed(CloseReason::Remote) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(endpoint = %self.endpoint, "Socket closed by server");
            }
            Ended::Closed(CloseReason::HeartbeatTimeout) => {
                self.emit(ConnectionEvent::Error(Arc::new(
                    WsError::HeartbeatTimeout.into(),
                )));
            }
            Ended::Closed(CloseReason::Error(e)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Socket error");
                self.emit(ConnectionEvent::Error(Arc::new(e.into())));
            }
        }

        drop(transport);
        self.finish();
        false
    }

    /// Dial the endpoint while still answering commands.
    async fn open(&mut self) -> Attempt {
        let endpoint = self.endpoint.clone();
        let connect = Transport::connect(&endpoint, self.config.heartbeat_window);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(transport) => Attempt::Open(transport),
                        Err(e) => Attempt::Failed(e),
                    };
                }
                command = self.commands.recv() => match command {
                    None => return Attempt::Shutdown,
                    Some(Command::Close) => return Attempt::Aborted,
                    Some(Command::Connect) => {}
                    Some(Command::Send(frame)) => self.drop_frame(&frame),
                },
            }
        }
    }

    /// Resend everything the server forgot when the previous socket dropped.
    async fn replay(&self, transport: &mut Transport) -> std::result::Result<(), WsError> {
        let Some(source) = &self.resubscribe else {
            return Ok(());
        };

        let requests = source.resubscribe_requests();

        #[cfg(feature = "tracing")]
        tracing::debug!(count = requests.len(), "Replaying subscriptions");

        for request in requests {
            transport.send(&OutboundFrame::Request(request)).await?;
        }

        Ok(())
    }

    /// Move frames between the socket and the handles until the socket ends.
    async fn pump(&mut self, transport: &mut Transport) -> Ended {
        loop {
            tokio::select! {
                signal = transport.next() => match signal {
                    Signal::Data(frame) => self.dispatch(frame),
                    Signal::Closed(reason) => return Ended::Closed(reason),
                },

                command = self.commands.recv() => match command {
                    None => return Ended::Shutdown,
                    Some(Command::Close) => {
                        self.closed_by_caller = true;
                        self.state_tx.send_replace(ConnectionState::Closing);
                        transport.close().await;
                        return Ended::ByCaller;
                    }
                    Some(Command::Connect) => {}
                    Some(Command::Send(frame)) => {
                        if let Err(e) = transport.send(&frame).await {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(kind = frame.kind(), error = %e, "Failed to send frame");
                            if let OutboundFrame::Request(request) = &frame
                                && request.expects_response()
                            {
                                self.pending.fail(request.id, e.into());
                            }
                        }
                    }
                },
            }
        }
    }

    /// Route an application frame: responses complete requests, events fan out.
    fn dispatch(&self, frame: InboundFrame) {
        let InboundFrame { kind, payload } = frame;

        match kind.as_str() {
            EVENT => self.emit(ConnectionEvent::Data(payload)),
            RESPONSE => match RpcResponse::parse(payload) {
                Ok(response) => {
                    self.pending.complete(response);
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, "Error parsing response");
                    #[cfg(not(feature = "tracing"))]
                    let _: &WsError = &e;
                }
            },
            _ => {
                #[cfg(feature = "tracing")]
                tracing::error!(%kind, "Received unknown message type from server");
            }
        }
    }

    /// A frame arrived while no socket is open.
    fn drop_frame(&self, frame: &OutboundFrame) {
        #[cfg(feature = "tracing")]
        tracing::warn!(kind = frame.kind(), "Not connected when sending message, dropping it");

        if let OutboundFrame::Request(request) = frame
            && request.expects_response()
        {
            self.pending.fail(request.id, WsError::NotConnected.into());
        }
    }

    /// Common tail of every attempt: state, abandoned requests, `Close`.
    fn finish(&self) {
        self.state_tx.send_replace(ConnectionState::Disconnected);

        let failed = self.pending.fail_all(|| WsError::ConnectionClosed.into());
        #[cfg(feature = "tracing")]
        tracing::debug!(failed_requests = failed, "Socket closed");
        #[cfg(not(feature = "tracing"))]
        let _ = failed;

        self.emit(ConnectionEvent::Close);
    }

    fn schedule_reconnect(&mut self) -> Option<time::Instant> {
        if self.closed_by_caller || !self.config.reconnect.enabled {
            return None;
        }

        let delay = self.reconnect_delay.next_backoff()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            endpoint = %self.endpoint,
            ?delay,
            "Connection closed, will re-attempt connection"
        );

        Some(time::Instant::now() + delay)
    }

    fn emit(&self, event: ConnectionEvent) {
        // No receivers is fine; events are not buffered for late subscribers.
        _ = self.events_tx.send(event);
    }
}
