#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    dead_code,
    reason = "Each integration test binary uses a different subset of the helpers"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use pylon_client::ws::config::Config;
use pylon_client::ws::connection::ConnectionEvent;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(2);

/// A frame written by the client, split into its type tag and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    pub kind: String,
    pub payload: Value,
}

impl ClientFrame {
    fn parse(text: &str) -> Self {
        let value: Value = serde_json::from_str(text).unwrap();
        let elements = value.as_array().unwrap();

        Self {
            kind: elements[0].as_str().unwrap().to_owned(),
            payload: elements.get(1).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn method(&self) -> &str {
        self.payload["method"].as_str().unwrap()
    }

    pub fn id(&self) -> u64 {
        self.payload["id"].as_u64().unwrap()
    }

    pub fn params(&self) -> &Value {
        &self.payload["params"]
    }
}

/// Mock Pylon server.
pub struct MockPylonServer {
    addr: SocketAddr,
    /// Frames for ALL connected clients
    message_tx: broadcast::Sender<String>,
    /// Frames written by clients, in arrival order
    frame_rx: mpsc::UnboundedReceiver<ClientFrame>,
    /// Drops every open socket when signalled
    disconnect_tx: broadcast::Sender<()>,
    /// Sockets accepted so far
    connections: Arc<AtomicUsize>,
}

impl MockPylonServer {
    /// Start a mock server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (disconnect_tx, _) = broadcast::channel::<()>(4);
        let connections = Arc::new(AtomicUsize::new(0));

        let broadcast_tx = message_tx.clone();
        let disconnect = disconnect_tx.clone();
        let accepted = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                accepted.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws_stream.split();
                let frame_tx = frame_tx.clone();
                let mut msg_rx = broadcast_tx.subscribe();
                let mut disconnect_rx = disconnect.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(frame_tx.send(ClientFrame::parse(&text)));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            _ = disconnect_rx.recv() => break,
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            frame_rx,
            disconnect_tx,
            connections,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a raw text frame to all connected clients.
    pub fn send_raw(&self, text: &str) {
        drop(self.message_tx.send(text.to_owned()));
    }

    /// Send `[kind, payload]` to all connected clients.
    pub fn send(&self, kind: &str, payload: &Value) {
        self.send_raw(&json!([kind, payload]).to_string());
    }

    pub fn ping(&self) {
        self.send_raw(r#"["ping"]"#);
    }

    pub fn respond(&self, id: u64, result: &Value) {
        self.send("response", &json!({ "id": id, "result": result }));
    }

    pub fn respond_error(&self, id: u64, error: &Value) {
        self.send("response", &json!({ "id": id, "error": error }));
    }

    pub fn event(&self, payload: &Value) {
        self.send("event", payload);
    }

    /// Drop every open socket without a close handshake.
    pub fn disconnect_all(&self) {
        drop(self.disconnect_tx.send(()));
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next frame from any client.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        timeout(WAIT, self.frame_rx.recv()).await.ok().flatten()
    }

    /// Next `request` frame, skipping heartbeat pongs.
    pub async fn recv_request(&mut self) -> Option<ClientFrame> {
        loop {
            let frame = self.recv().await?;
            if frame.kind == "request" {
                return Some(frame);
            }
        }
    }

    /// Whatever the client writes within `window`, pongs excluded.
    pub async fn requests_within(&mut self, window: Duration) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = timeout(window, self.frame_rx.recv()).await {
            if frame.kind == "request" {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Config with a reconnect delay short enough for tests.
pub fn fast_reconnect() -> Config {
    let mut config = Config::default();
    config.reconnect.delay = Duration::from_millis(100);
    config
}

pub async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}

/// Wait until a `Connect` event arrives, skipping anything else.
pub async fn wait_for_connect(events: &mut broadcast::Receiver<ConnectionEvent>) {
    loop {
        if matches!(next_event(events).await, ConnectionEvent::Connect) {
            return;
        }
    }
}
