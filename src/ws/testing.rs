#![allow(
    clippy::unwrap_used,
    reason = "Do not need additional syntax for setting up tests"
)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Minimal server for exercising timers from inside the crate.
pub(crate) struct MockServer {
    addr: SocketAddr,
    /// Frames for every connected client
    to_client: broadcast::Sender<String>,
    /// Text frames written by clients
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (to_client, _) = broadcast::channel::<String>(100);
        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();
        let outgoing = to_client.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let client_tx = client_tx.clone();
                let mut outgoing = outgoing.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    drop(client_tx.send(text.to_string()));
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            msg = outgoing.recv() => match msg {
                                Ok(text) => {
                                    if write.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            to_client,
            from_client,
        }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub(crate) fn send(&self, frame: &str) {
        drop(self.to_client.send(frame.to_owned()));
    }

    pub(crate) async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .ok()
            .flatten()
    }
}
