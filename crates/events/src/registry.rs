//! Registry of open subscriptions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sse_hub_core::types::{ClientId, SubscriptionId};

use crate::stream::{self, EventStream, StreamHandle};

struct Registered {
    handle: StreamHandle,
    /// Distinguishes two registrations that happen to share an id.
    serial: u64,
}

/// Tracks every currently open stream.
///
/// Subscriptions are stored in a sharded map keyed by id, with a second
/// index from client id to that client's subscription ids. Both maps lock
/// per shard, so unrelated subscriptions never contend on one lock.
///
/// Designed to be shared as `Arc<SubscriptionRegistry>`; the read side of
/// each stream keeps a reference so it can deregister itself on drop.
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriptionId, Registered>,
    by_client: DashMap<ClientId, HashSet<SubscriptionId>>,
    last_disambiguator: AtomicU64,
    next_serial: AtomicU64,
    idle_timeout: Option<Duration>,
}

impl SubscriptionRegistry {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            subscriptions: DashMap::new(),
            by_client: DashMap::new(),
            last_disambiguator: AtomicU64::new(0),
            next_serial: AtomicU64::new(0),
            idle_timeout,
        }
    }

    /// Open a new subscription for `client_id` under a freshly allocated id.
    pub fn register(self: &Arc<Self>, client_id: ClientId) -> EventStream {
        let id = SubscriptionId::new(client_id, self.next_disambiguator());
        self.register_with_id(id)
    }

    /// Open a subscription under an explicit id.
    ///
    /// If the id is already registered the new stream replaces the old one,
    /// whose read side then ends.
    pub fn register_with_id(self: &Arc<Self>, id: SubscriptionId) -> EventStream {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (handle, stream) = stream::open(
            Arc::clone(self),
            id.clone(),
            serial,
            self.idle_timeout,
        );

        self.by_client
            .entry(id.client_id().clone())
            .or_default()
            .insert(id.clone());

        let previous = self
            .subscriptions
            .insert(id.clone(), Registered { handle, serial });

        if previous.is_some() {
            tracing::warn!(
                subscription_id = %id,
                "Duplicate subscription id, replacing previous stream"
            );
        } else {
            tracing::debug!(subscription_id = %id, "Subscription registered");
        }

        stream
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn deregister(&self, id: &SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(id).is_some();
        if removed {
            self.unindex(id);
            tracing::debug!(subscription_id = %id, "Subscription deregistered");
        }
        removed
    }

    /// Remove a subscription only if it is still the registration `serial`.
    pub(crate) fn deregister_registration(&self, id: &SubscriptionId, serial: u64) -> bool {
        let removed = self
            .subscriptions
            .remove_if(id, |_, registered| registered.serial == serial)
            .is_some();
        if removed {
            self.unindex(id);
        }
        removed
    }

    /// Ids of every open subscription belonging to `client_id`.
    pub fn list_by_client(&self, client_id: &ClientId) -> Vec<SubscriptionId> {
        self.by_client
            .get(client_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Write handle of an open subscription.
    pub fn get(&self, id: &SubscriptionId) -> Option<StreamHandle> {
        self.subscriptions
            .get(id)
            .map(|registered| registered.handle.clone())
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.subscriptions.contains_key(id)
    }

    /// Number of open subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of clients with at least one open subscription.
    pub fn client_count(&self) -> usize {
        self.by_client.len()
    }

    /// Drop every subscription so that all read sides end cleanly.
    ///
    /// Used during graceful shutdown.
    pub fn shutdown_all(&self) {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        self.by_client.clear();
        tracing::info!(count, "Closed all event streams");
    }

    /// Next disambiguator: the current time in milliseconds, bumped past the
    /// previous value when two registrations land in the same millisecond.
    fn next_disambiguator(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let previous = self
            .last_disambiguator
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    fn unindex(&self, id: &SubscriptionId) {
        // The shard guard must be released before `remove_if` touches the
        // same shard again.
        {
            if let Some(mut ids) = self.by_client.get_mut(id.client_id()) {
                ids.remove(id);
            }
        }
        self.by_client
            .remove_if(id.client_id(), |_, ids| ids.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
