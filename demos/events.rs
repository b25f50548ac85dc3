//! Streams typed Pylon events for a few well-known accounts, assets and chains.
//!
//! Run with tracing enabled:
//! ```sh
//! PYLON_ENDPOINT=wss://pylon.frame.sh RUST_LOG=info,pylon_client=debug cargo run --example events --features tracing
//! ```

use std::env;
use std::time::Duration;

use futures::StreamExt as _;
use pylon_client::ws::config::Config;
use pylon_client::ws::connection::ConnectionEvent;
use pylon_client::{AssetId, Client};
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ENDPOINT_VAR: &str = "PYLON_ENDPOINT";
const ACCOUNT: &str = "0xd8da6bf26964af9d7eed9f03e53415d37aa96045";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = env::var(ENDPOINT_VAR).unwrap_or_else(|_| "wss://pylon.frame.sh".to_owned());
    let client = Client::new(&endpoint, Config::default())?;

    let mut lifecycle = Box::pin(client.events());
    tokio::spawn(async move {
        while let Some(event) = lifecycle.next().await {
            match event {
                Ok(ConnectionEvent::Connect) => info!("connected"),
                Ok(ConnectionEvent::Close) => info!("disconnected"),
                Ok(ConnectionEvent::Error(e)) => warn!(error = %e, "connection error"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "event stream ended"),
            }
        }
    });

    let mut data = Box::pin(client.data());
    client.connect()?;

    client.subscribe_activity(&[ACCOUNT.to_owned()])?;
    client.subscribe_inventories(&[ACCOUNT.to_owned()])?;
    client.subscribe_chains(&[1, 10, 137, 42161])?;
    client.subscribe_rates(&[
        AssetId::native(1),
        AssetId::token(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    ])?;

    while let Ok(Some(event)) = timeout(Duration::from_secs(60), data.next()).await {
        match event {
            Ok(event) => info!(?event, "event"),
            Err(e) => {
                warn!(error = %e, "data stream ended");
                break;
            }
        }
    }

    client.close()?;

    Ok(())
}
