//! Core traits for the connection layer.

use super::frame::RpcRequest;

/// Source of requests that rebuild server-side state on a fresh socket.
///
/// The server forgets everything when a connection drops, so the connection
/// manager asks this source for the full set of requests to send right after
/// every open, before announcing the connection to listeners.
///
/// # Example
///
/// ```ignore
/// struct Always(Vec<String>);
///
/// impl Resubscribe for Always {
///     fn resubscribe_requests(&self) -> Vec<RpcRequest> {
///         vec![RpcRequest::notification("subscribeActivity", json!(self.0))]
///     }
/// }
/// ```
pub trait Resubscribe: Send + Sync + 'static {
    /// Requests to send, in order. Fire-and-forget requests are expected.
    fn resubscribe_requests(&self) -> Vec<RpcRequest>;
}
