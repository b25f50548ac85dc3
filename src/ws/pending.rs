use std::time::Instant;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use super::frame::RpcResponse;
use crate::Result;
use crate::error::Error;

/// A correlated request waiting for its response.
#[cfg_attr(
    not(feature = "tracing"),
    allow(dead_code, reason = "Method and age are only read by log statements")
)]
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) method: String,
    pub(crate) created_at: Instant,
    responder: oneshot::Sender<Result<Value>>,
}

/// In-flight requests keyed by id.
///
/// Each entry is removed exactly once: by its response, by its timeout, or by
/// the connection closing. Whoever removes it decides the outcome.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    requests: DashMap<u64, PendingRequest>,
}

impl PendingRequests {
    pub(crate) fn register(&self, id: u64, method: &str) -> oneshot::Receiver<Result<Value>> {
        let (responder, rx) = oneshot::channel();
        self.requests.insert(
            id,
            PendingRequest {
                method: method.to_owned(),
                created_at: Instant::now(),
                responder,
            },
        );
        rx
    }

    /// Resolve the request matching `response.id`. Unknown ids are ignored.
    pub(crate) fn complete(&self, response: RpcResponse) -> bool {
        let Some((id, pending)) = self.requests.remove(&response.id) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(id = response.id, "Dropping response for unknown request");
            return false;
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            id,
            method = %pending.method,
            elapsed = ?pending.created_at.elapsed(),
            ok = response.outcome.is_ok(),
            "Request completed"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = id;

        let outcome = response.outcome.map_err(Error::rpc);
        // The caller may have stopped waiting; nothing left to do then.
        _ = pending.responder.send(outcome);
        true
    }

    /// Remove a request without resolving it (its caller gave up).
    pub(crate) fn cancel(&self, id: u64) -> Option<PendingRequest> {
        self.requests.remove(&id).map(|(_, pending)| pending)
    }

    /// Fail one request, e.g. because its frame never made it onto a socket.
    pub(crate) fn fail(&self, id: u64, error: Error) -> bool {
        let Some(pending) = self.cancel(id) else {
            return false;
        };

        _ = pending.responder.send(Err(error));
        true
    }

    /// Fail every outstanding request with the error produced by `error`.
    pub(crate) fn fail_all<F: Fn() -> Error>(&self, error: F) -> usize {
        let ids: Vec<u64> = self.requests.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;

        for id in ids {
            if let Some((_, pending)) = self.requests.remove(&id) {
                _ = pending.responder.send(Err(error()));
                failed += 1;
            }
        }

        failed
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    /// Tie the entry for `id` to the lifetime of the returned guard.
    pub(crate) fn guard(&self, id: u64) -> PendingGuard<'_> {
        PendingGuard { requests: self, id }
    }
}

/// Removes its request from the table when dropped.
///
/// A caller that stops polling its request (an outer timeout, a lost
/// `select!`, an aborted task) leaves no entry behind. Dropping after the
/// request resolved is a no-op.
#[derive(Debug)]
pub(crate) struct PendingGuard<'a> {
    requests: &'a PendingRequests,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.requests.cancel(self.id) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                id = self.id,
                method = %pending.method,
                "Request abandoned before its response"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = &pending;
        }
    }
}
