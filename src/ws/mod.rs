//! Core WebSocket infrastructure.
//!
//! One persistent socket carries everything: correlated requests, fire-and-forget
//! sends, server pings and pushed events.
//!
//! # Architecture
//!
//! - [`frame`]: the `[type, payload]` wire codec
//! - `transport`: one open socket plus its heartbeat timer
//! - [`ConnectionManager`]: the background task that owns the transport,
//!   reconnects after a fixed delay and correlates requests with responses
//! - [`Resubscribe`]: what to resend on every fresh socket
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new("wss://pylon.example.com", Config::default())?;
//! connection.connect()?;
//! let result = connection.request("simulateTransaction", &tx).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub(crate) mod pending;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;
pub(crate) mod transport;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
