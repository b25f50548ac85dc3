use std::pin::Pin;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::time::{Instant, Sleep, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::error::WsError;
use super::frame::{InboundFrame, OutboundFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake when the caller tears the socket down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a socket stopped producing frames.
#[non_exhaustive]
#[derive(Debug)]
pub(crate) enum CloseReason {
    /// The server sent a close frame or the stream ended
    Remote,
    /// No ping arrived within the heartbeat window
    HeartbeatTimeout,
    /// The socket failed
    Error(WsError),
}

/// What the transport hands to its owner.
#[derive(Debug)]
pub(crate) enum Signal {
    Data(InboundFrame),
    Closed(CloseReason),
}

/// Owns exactly one open socket and its heartbeat timer.
///
/// A `Transport` only exists between a successful open and the first
/// [`Signal::Closed`]; reconnecting builds a new one.
pub(crate) struct Transport {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    heartbeat: Pin<Box<Sleep>>,
    heartbeat_window: Duration,
}

impl Transport {
    /// Open the socket, arm the heartbeat and announce liveness with a `pong`.
    pub(crate) async fn connect(endpoint: &str, heartbeat_window: Duration) -> Result<Self, WsError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(%endpoint, "Connecting");

        let (ws_stream, _) = connect_async(endpoint).await.map_err(WsError::Connection)?;
        let (write, read) = ws_stream.split();

        let mut transport = Self {
            write,
            read,
            heartbeat: Box::pin(sleep(heartbeat_window)),
            heartbeat_window,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%endpoint, "Socket opened");

        transport.heartbeat().await?;

        Ok(transport)
    }

    /// Wait for the next application frame or for the socket to close.
    ///
    /// Pings are answered here and never surface. Malformed frames are logged
    /// and skipped.
    pub(crate) async fn next(&mut self) -> Signal {
        loop {
            tokio::select! {
                () = self.heartbeat.as_mut() => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        window = ?self.heartbeat_window,
                        "Timed out waiting for ping from server, closing connection"
                    );
                    return Signal::Closed(CloseReason::HeartbeatTimeout);
                }

                message = self.read.next() => {
                    let bytes = match message {
                        Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                        Some(Ok(Message::Binary(bytes))) => bytes.to_vec(),
                        Some(Ok(Message::Close(_))) | None => {
                            return Signal::Closed(CloseReason::Remote);
                        }
                        Some(Err(e)) => {
                            return Signal::Closed(CloseReason::Error(WsError::Connection(e)));
                        }
                        Some(Ok(_)) => {
                            // Protocol-level ping/pong is answered by tungstenite itself.
                            continue;
                        }
                    };

                    match InboundFrame::decode(&bytes) {
                        Ok(frame) if frame.is_ping() => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!("Received ping from server");

                            if let Err(e) = self.heartbeat().await {
                                return Signal::Closed(CloseReason::Error(e));
                            }
                        }
                        Ok(frame) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(kind = %frame.kind, payload = %frame.payload, "Received frame");
                            return Signal::Data(frame);
                        }
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "Dropping malformed frame");
                            #[cfg(not(feature = "tracing"))]
                            let _: &WsError = &e;
                        }
                    }
                }
            }
        }
    }

    /// Write one frame. Never queues: a failed write is reported to the caller.
    pub(crate) async fn send(&mut self, frame: &OutboundFrame) -> Result<(), WsError> {
        let text = frame.encode()?;

        #[cfg(feature = "tracing")]
        tracing::trace!(kind = frame.kind(), %text, "Sending frame");

        self.write
            .send(Message::Text(text.into()))
            .await
            .map_err(WsError::Connection)
    }

    /// Start the close handshake and give up on it after [`CLOSE_TIMEOUT`].
    pub(crate) async fn close(&mut self) {
        match timeout(CLOSE_TIMEOUT, self.write.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "Socket close failed");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Socket close handshake timed out");
            }
        }
    }

    /// Re-arm the liveness timer and answer with a `pong`.
    async fn heartbeat(&mut self) -> Result<(), WsError> {
        self.heartbeat
            .as_mut()
            .reset(Instant::now() + self.heartbeat_window);

        self.send(&OutboundFrame::Pong).await
    }
}
