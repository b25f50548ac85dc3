use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt as _};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use crate::Result;
use crate::asset_id::AssetId;
use crate::serde_helpers::deserialize_with_warnings;
use crate::subscription::{Delta, SubscriptionCategory, SubscriptionReconciler, SubscriptionRegistry};
use crate::types::request::Transaction;
use crate::types::response::PylonEvent;
use crate::ws::config::Config;
use crate::ws::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::ws::error::WsError;
use crate::ws::traits::Resubscribe;

/// Request method for dry-running a transaction.
pub const SIMULATE_TRANSACTION: &str = "simulateTransaction";

/// Pylon client: one persistent socket, correlated requests and
/// subscriptions that survive reconnects.
///
/// The client is cheap to clone; clones share the socket.
///
/// # Examples
///
/// ```rust, no_run
/// use futures::StreamExt as _;
/// use pylon_client::Client;
/// use pylon_client::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("wss://pylon.frame.sh", Config::default())?;
///     let mut events = Box::pin(client.data());
///
///     client.connect()?;
///     client.subscribe_chains(&[1, 10, 137])?;
///
///     while let Some(event) = events.next().await {
///         println!("{:?}", event?);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Configuration for the connection
    config: Config,
    /// Endpoint the socket dials
    endpoint: String,
    /// Connection manager for the WebSocket
    connection: ConnectionManager,
    /// Subscription sets per category
    reconciler: SubscriptionReconciler,
}

impl Client {
    /// Create a client for `endpoint`. Nothing is dialled until [`connect`](Self::connect).
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let registry = Arc::new(SubscriptionRegistry::default());
        let replay: Arc<dyn Resubscribe> = Arc::<SubscriptionRegistry>::clone(&registry);
        let connection = ConnectionManager::with_resubscribe(endpoint, config.clone(), replay)?;
        let reconciler = SubscriptionReconciler::new(connection.clone(), registry);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                endpoint: endpoint.to_owned(),
                connection,
                reconciler,
            }),
        })
    }

    /// Open the socket. Registered subscriptions are replayed on every open.
    pub fn connect(&self) -> Result<()> {
        self.inner.connection.connect()
    }

    /// Close the socket and stop reconnecting until the next [`connect`](Self::connect).
    ///
    /// Pending requests fail with [`WsError::ConnectionClosed`].
    pub fn close(&self) -> Result<()> {
        self.inner.connection.close()
    }

    /// Subscribe to activity (balances) for exactly these accounts.
    pub fn subscribe_activity(&self, accounts: &[String]) -> Result<Delta> {
        self.inner
            .reconciler
            .reconcile(SubscriptionCategory::Activity, accounts)
    }

    /// Subscribe to collectible inventories for exactly these accounts.
    pub fn subscribe_inventories(&self, accounts: &[String]) -> Result<Delta> {
        self.inner
            .reconciler
            .reconcile(SubscriptionCategory::Inventories, accounts)
    }

    /// Subscribe to price data for exactly these assets.
    pub fn subscribe_rates(&self, assets: &[AssetId]) -> Result<Delta> {
        let ids: Vec<String> = assets.iter().map(ToString::to_string).collect();
        self.inner
            .reconciler
            .reconcile(SubscriptionCategory::Rates, &ids)
    }

    /// Subscribe to chain metadata for exactly these chains.
    pub fn subscribe_chains(&self, chain_ids: &[u64]) -> Result<Delta> {
        let ids: Vec<String> = chain_ids.iter().map(ToString::to_string).collect();
        self.inner
            .reconciler
            .reconcile(SubscriptionCategory::Chains, &ids)
    }

    /// Identifiers currently registered for `category`.
    #[must_use]
    pub fn subscriptions(&self, category: SubscriptionCategory) -> Vec<String> {
        self.inner.reconciler.registry().get(category)
    }

    /// Send a correlated request and wait for the server's `result`.
    ///
    /// The result is returned as-is; a server `error` becomes a
    /// [`Kind::Rpc`](crate::error::Kind::Rpc) error carrying it.
    pub async fn request<P: Serialize>(&self, method: &str, params: P) -> Result<Value> {
        self.inner.connection.request(method, params).await
    }

    /// Dry-run `transaction` on the server.
    pub async fn simulate(&self, transaction: &Transaction) -> Result<Value> {
        self.request(SIMULATE_TRANSACTION, transaction).await
    }

    /// Fire-and-forget request; dropped if the socket is not open.
    pub fn send<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        self.inner.connection.send(method, params)
    }

    /// Stream of connection events: connects, closes, raw pushed payloads and errors.
    ///
    /// Ends with [`WsError::Lagged`] if the consumer falls too far behind.
    pub fn events(&self) -> impl Stream<Item = Result<ConnectionEvent>> + use<> {
        let mut rx = self.inner.connection.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(count)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Event stream lagged, missed {count} events");
                        Err(WsError::Lagged { count })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Stream of typed pushed events. Payloads of unknown shape are logged and skipped.
    pub fn data(&self) -> impl Stream<Item = Result<PylonEvent>> + use<> {
        self.events().filter_map(|event| async move {
            match event {
                Ok(ConnectionEvent::Data(payload)) => {
                    match deserialize_with_warnings::<PylonEvent>(payload) {
                        Ok(event) => Some(Ok(event)),
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "Skipping unrecognized event");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.state().is_connected()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
