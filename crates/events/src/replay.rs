//! Latest-event cache used to replay to reconnecting clients.

use dashmap::DashMap;
use sse_hub_core::types::{ClientId, SubscriptionId};

/// The last event written to a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub name: String,
    pub data: serde_json::Value,
}

/// Holds one [`ReplayEntry`] per subscription id.
///
/// Only the most recent event per subscription is kept, so a client that
/// misses several events while disconnected gets the last one back, never
/// the full history. Entries outlive the subscription they belong to; that
/// is what lets a new connection pick them up.
#[derive(Default)]
pub struct ReplayCache {
    entries: DashMap<SubscriptionId, ReplayEntry>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `id`.
    pub fn record(&self, id: SubscriptionId, name: impl Into<String>, data: serde_json::Value) {
        self.entries.insert(
            id,
            ReplayEntry {
                name: name.into(),
                data,
            },
        );
    }

    /// Hand every entry of `client_id` newer than `last_seen` to `deliver`,
    /// removing each one as it is delivered. Returns how many were delivered.
    ///
    /// `deliver` returns `false` when the write failed. That entry is put back
    /// and replay stops, leaving the rest cached for a later reconnect.
    ///
    /// When nothing matches, the whole cache is cleared, entries of other
    /// clients included. Clients that reconnect up to date are what keeps
    /// the cache from growing without bound.
    ///
    /// Entries are visited in no particular order.
    pub fn replay_if_newer<F>(
        &self,
        client_id: &ClientId,
        last_seen: &SubscriptionId,
        mut deliver: F,
    ) -> usize
    where
        F: FnMut(SubscriptionId, ReplayEntry) -> bool,
    {
        let matching: Vec<SubscriptionId> = self
            .entries
            .iter()
            .filter(|entry| entry.key().client_id() == client_id && entry.key() > last_seen)
            .map(|entry| entry.key().clone())
            .collect();

        if matching.is_empty() {
            let cleared = self.entries.len();
            self.entries.clear();
            tracing::debug!(
                client_id = %client_id,
                last_seen = %last_seen,
                cleared,
                "No newer cached events, replay cache cleared"
            );
            return 0;
        }

        let mut delivered = 0;
        for id in matching {
            // A concurrent replay may have taken it already.
            let Some((id, entry)) = self.entries.remove(&id) else {
                continue;
            };

            if deliver(id.clone(), entry.clone()) {
                delivered += 1;
            } else {
                // A newer record for the same id wins over the one put back.
                self.entries.entry(id).or_insert(entry);
                break;
            }
        }
        delivered
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<ReplayEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
