//! Dry-runs a plain ETH transfer through `simulateTransaction`.
//!
//! ```sh
//! PYLON_ENDPOINT=wss://pylon.frame.sh RUST_LOG=info cargo run --example simulate --features tracing
//! ```

use std::env;
use std::time::Duration;

use futures::StreamExt as _;
use pylon_client::Client;
use pylon_client::types::Transaction;
use pylon_client::ws::config::Config;
use pylon_client::ws::connection::ConnectionEvent;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoint = env::var("PYLON_ENDPOINT").unwrap_or_else(|_| "wss://pylon.frame.sh".to_owned());
    let client = Client::new(&endpoint, Config::without_reconnect())?;

    let mut events = Box::pin(client.events());
    client.connect()?;

    // Requests fail fast until the socket is open
    while let Ok(Some(event)) = timeout(Duration::from_secs(10), events.next()).await {
        if matches!(event?, ConnectionEvent::Connect) {
            break;
        }
    }
    anyhow::ensure!(client.is_connected(), "could not connect to {endpoint}");

    let tx = Transaction::builder()
        .chain_id(1)
        .from("0xd8da6bf26964af9d7eed9f03e53415d37aa96045".to_owned())
        .to("0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_owned())
        .value("0x2386f26fc10000".to_owned())
        .build();

    match client.simulate(&tx).await {
        Ok(result) => info!(%result, "simulation succeeded"),
        Err(e) => match e.rpc_error() {
            Some(error) => info!(%error, "simulation rejected"),
            None => return Err(e.into()),
        },
    }

    client.close()?;

    Ok(())
}
