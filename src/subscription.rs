#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

//! Declarative subscriptions.
//!
//! Callers state the full set of identifiers they want per category; the
//! reconciler sends only what changed and remembers the set so it can be
//! replayed on every fresh socket.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use strum_macros::Display;

use crate::Result;
use crate::ws::ConnectionManager;
use crate::ws::frame::RpcRequest;
use crate::ws::traits::Resubscribe;

/// Independent subscription sets kept by the server per connection.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SubscriptionCategory {
    /// Account activity (balances)
    Activity,
    /// Collectible inventories per account
    Inventories,
    /// Price data per asset id
    Rates,
    /// Chain metadata per chain id
    Chains,
}

impl SubscriptionCategory {
    #[must_use]
    pub fn subscribe_method(self) -> String {
        format!("subscribe{self}")
    }

    #[must_use]
    pub fn unsubscribe_method(self) -> String {
        format!("unsubscribe{self}")
    }
}

/// What a reconcile changed, in the order it was sent.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Wanted but not registered, in caller order
    pub added: Vec<String>,
    /// Registered but no longer wanted, in registry order
    pub removed: Vec<String>,
}

impl Delta {
    /// Compute the change from `current` to `desired`.
    #[must_use]
    pub fn between(current: &[String], desired: &[String]) -> Self {
        let registered: HashSet<&str> = current.iter().map(String::as_str).collect();
        let wanted: HashSet<&str> = desired.iter().map(String::as_str).collect();

        let added = unique(desired)
            .into_iter()
            .filter(|id| !registered.contains(id.as_str()))
            .collect();

        let removed = current
            .iter()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();

        Self { added, removed }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// `ids` without repeats, first occurrence wins.
fn unique(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Last desired identifier set per category.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: DashMap<SubscriptionCategory, Vec<String>>,
}

impl SubscriptionRegistry {
    /// Snapshot of the registered identifiers for `category`.
    #[must_use]
    pub fn get(&self, category: SubscriptionCategory) -> Vec<String> {
        self.entries
            .get(&category)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Number of categories with at least one identifier.
    #[must_use]
    pub fn active_categories(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }
}

impl Resubscribe for SubscriptionRegistry {
    fn resubscribe_requests(&self) -> Vec<RpcRequest> {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| {
                RpcRequest::notification(
                    entry.key().subscribe_method(),
                    Value::from(entry.value().clone()),
                )
            })
            .collect()
    }
}

/// Turns desired identifier sets into minimal subscribe/unsubscribe sends.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    connection: ConnectionManager,
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionReconciler {
    #[must_use]
    pub const fn new(connection: ConnectionManager, registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            connection,
            registry,
        }
    }

    /// Make `desired` the subscription set for `category`.
    ///
    /// Records `desired` in the registry, then sends one `subscribe<Category>`
    /// with the additions and one `unsubscribe<Category>` with the removals,
    /// skipping empty ones. The registry is updated even when the socket is
    /// down or the send fails; the next open replays it.
    pub fn reconcile(&self, category: SubscriptionCategory, desired: &[String]) -> Result<Delta> {
        // Hold the entry while sending so concurrent reconciles of one
        // category see each other's result
        let mut entry = self.registry.entries.entry(category).or_default();
        let delta = Delta::between(entry.value(), desired);
        *entry.value_mut() = unique(desired);

        if !delta.added.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%category, added = ?delta.added, "Subscribing");
            self.connection
                .send(&category.subscribe_method(), &delta.added)?;
        }

        if !delta.removed.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%category, removed = ?delta.removed, "Unsubscribing");
            self.connection
                .send(&category.unsubscribe_method(), &delta.removed)?;
        }

        Ok(delta)
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}
