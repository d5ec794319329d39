//! Local fan-out of events to open subscriptions.

use std::sync::Arc;

use sse_hub_core::types::{ClientId, SubscriptionId};

use crate::config::HubConfig;
use crate::event::{Event, Frame};
use crate::registry::SubscriptionRegistry;
use crate::replay::ReplayCache;
use crate::stream::{EventStream, StreamHandle};

/// Delivers events to every open stream of a client and keeps the
/// [`ReplayCache`] current.
///
/// One dispatcher exists per process and is shared as `Arc<Dispatcher>`
/// between HTTP handlers and the relay consumer.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    cache: ReplayCache,
}

impl Dispatcher {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            registry: Arc::new(SubscriptionRegistry::new(config.idle_timeout)),
            cache: ReplayCache::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn replay_cache(&self) -> &ReplayCache {
        &self.cache
    }

    /// Open a stream for `client_id`.
    ///
    /// With a `last_seen` id, cached events newer than it are written to the
    /// new stream first, each under the id it was originally sent with.
    pub fn connect(&self, client_id: ClientId, last_seen: Option<&SubscriptionId>) -> EventStream {
        let stream = self.registry.register(client_id.clone());

        let Some(last_seen) = last_seen else {
            tracing::info!(subscription_id = %stream.id(), "Client connected");
            return stream;
        };

        let replayed = match self.registry.get(stream.id()) {
            Some(handle) => self
                .cache
                .replay_if_newer(&client_id, last_seen, |id, entry| {
                    let frame = Frame {
                        id,
                        name: entry.name,
                        data: entry.data,
                    };
                    self.write(&handle, frame)
                }),
            None => 0,
        };

        tracing::info!(
            subscription_id = %stream.id(),
            last_seen = %last_seen,
            replayed,
            "Client reconnected"
        );
        stream
    }

    /// Write `name`/`data` to every open stream of `client_id`.
    ///
    /// Returns how many streams accepted the frame. A failed write tears
    /// down that one subscription and delivery to the rest carries on.
    pub fn publish(&self, client_id: &ClientId, name: &str, data: &serde_json::Value) -> usize {
        let mut delivered = 0;

        for id in self.registry.list_by_client(client_id) {
            // Deregistered between listing and now.
            let Some(handle) = self.registry.get(&id) else {
                continue;
            };

            self.cache.record(id.clone(), name, data.clone());

            let frame = Frame {
                id,
                name: name.to_string(),
                data: data.clone(),
            };
            if self.write(&handle, frame) {
                delivered += 1;
            }
        }

        tracing::debug!(
            client_id = %client_id,
            event_name = %name,
            delivered,
            "Event dispatched"
        );
        delivered
    }

    pub fn publish_event(&self, event: &Event) -> usize {
        self.publish(&event.client_id, &event.name, &event.data)
    }

    /// Close every open stream. Used during graceful shutdown.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }

    fn write(&self, handle: &StreamHandle, frame: Frame) -> bool {
        match handle.write(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    subscription_id = %handle.id(),
                    connected_at = %handle.connected_at(),
                    error = %e,
                    "Write to event stream failed, closing subscription"
                );
                self.registry
                    .deregister_registration(handle.id(), handle.serial());
                handle.fail();
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::replay::ReplayEntry;

    fn client(raw: &str) -> ClientId {
        ClientId::new(raw).unwrap()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&HubConfig::default())
    }

    async fn next_frame(stream: &mut EventStream) -> Frame {
        stream
            .recv()
            .await
            .expect("stream should be open")
            .expect("frame should not be an error")
    }

    #[tokio::test]
    async fn publish_without_subscribers_leaves_cache_alone() {
        let dispatcher = dispatcher();
        let other = SubscriptionId::new(client("u2"), 1);
        dispatcher.replay_cache().record(other.clone(), "keep", json!(1));

        let delivered = dispatcher.publish(&client("u1"), "greet", &json!("hi"));

        assert_eq!(delivered, 0);
        assert_eq!(dispatcher.replay_cache().len(), 1);
        assert!(dispatcher.replay_cache().get(&other).is_some());
    }

    #[tokio::test]
    async fn every_stream_of_the_client_receives_the_event() {
        let dispatcher = dispatcher();
        let mut tab1 = dispatcher.connect(client("u1"), None);
        let mut tab2 = dispatcher.connect(client("u1"), None);
        let mut other = dispatcher.connect(client("u10"), None);

        let delivered = dispatcher.publish(&client("u1"), "greet", &json!("hi"));
        assert_eq!(delivered, 2);

        let f1 = next_frame(&mut tab1).await;
        let f2 = next_frame(&mut tab2).await;
        assert_eq!(&f1.id, tab1.id());
        assert_eq!(&f2.id, tab2.id());
        assert_eq!(f1.name, "greet");
        assert_eq!(f2.data, json!("hi"));

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), other.recv()).await;
        assert!(nothing.is_err(), "u10 must not receive events for u1");
    }

    #[tokio::test]
    async fn publish_records_latest_event_per_subscription() {
        let dispatcher = dispatcher();
        let stream = dispatcher.connect(client("u1"), None);

        dispatcher.publish(&client("u1"), "first", &json!(1));
        dispatcher.publish(&client("u1"), "second", &json!(2));

        assert_eq!(
            dispatcher.replay_cache().get(stream.id()),
            Some(ReplayEntry {
                name: "second".into(),
                data: json!(2),
            })
        );
    }

    #[tokio::test]
    async fn connect_without_last_seen_replays_nothing() {
        let dispatcher = dispatcher();
        let old = SubscriptionId::new(client("u1"), 1);
        dispatcher.replay_cache().record(old.clone(), "missed", json!(1));

        let mut stream = dispatcher.connect(client("u1"), None);

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), stream.recv()).await;
        assert!(nothing.is_err());
        assert!(dispatcher.replay_cache().get(&old).is_some());
    }

    #[tokio::test]
    async fn reconnect_replays_newer_cached_event_once() {
        let dispatcher = dispatcher();
        let previous = SubscriptionId::new(client("u1"), 2000);
        dispatcher
            .replay_cache()
            .record(previous.clone(), "missed", json!({"n": 1}));

        let last_seen = SubscriptionId::new(client("u1"), 1000);
        let mut stream = dispatcher.connect(client("u1"), Some(&last_seen));

        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.id, previous);
        assert_eq!(frame.name, "missed");
        assert_eq!(frame.data, json!({"n": 1}));
        assert!(dispatcher.replay_cache().get(&previous).is_none());
    }

    #[tokio::test]
    async fn dropped_reader_is_skipped_by_later_publishes() {
        let dispatcher = dispatcher();
        let gone = dispatcher.connect(client("u1"), None);
        let gone_id = gone.id().clone();
        let mut alive = dispatcher.connect(client("u1"), None);
        let alive_id = alive.id().clone();

        drop(gone);

        let delivered = dispatcher.publish(&client("u1"), "greet", &json!("hi"));
        assert_eq!(delivered, 1);
        assert_eq!(next_frame(&mut alive).await.id, alive_id);
        assert!(!dispatcher.registry().contains(&gone_id));
        assert!(dispatcher.replay_cache().get(&gone_id).is_none());
    }

    #[tokio::test]
    async fn burst_larger_than_any_queue_is_delivered_in_full() {
        let dispatcher = dispatcher();
        let mut stream = dispatcher.connect(client("u1"), None);
        let id = stream.id().clone();

        for n in 0..500 {
            assert_eq!(dispatcher.publish(&client("u1"), "tick", &json!(n)), 1);
        }

        for n in 0..500 {
            let frame = next_frame(&mut stream).await;
            assert_eq!(frame.data, json!(n));
        }
        assert!(dispatcher.registry().contains(&id));
    }

    #[tokio::test]
    async fn failed_write_leaves_a_newer_registration_alone() {
        let dispatcher = dispatcher();
        let id = SubscriptionId::new(client("u1"), 1000);
        let old = dispatcher.registry().register_with_id(id.clone());
        let stale = dispatcher.registry().get(&id).unwrap();

        let mut current = dispatcher.registry().register_with_id(id.clone());
        drop(old);

        let frame = Frame {
            id: id.clone(),
            name: "late".into(),
            data: json!(null),
        };
        assert!(!dispatcher.write(&stale, frame));
        assert!(dispatcher.registry().contains(&id));

        assert_eq!(dispatcher.publish(&client("u1"), "greet", &json!("hi")), 1);
        assert_eq!(next_frame(&mut current).await.name, "greet");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_arrive_whole_and_in_per_task_order() {
        const TASKS: u64 = 8;
        const PER_TASK: u64 = 25;

        let dispatcher = Arc::new(dispatcher());
        let mut stream = dispatcher.connect(client("u1"), None);

        let publishers: Vec<_> = (0..TASKS)
            .map(|task| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    for seq in 0..PER_TASK {
                        let data = json!({"task": task, "seq": seq});
                        dispatcher.publish(&client("u1"), &format!("task-{task}"), &data);
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.await.unwrap();
        }

        let mut next_seq = vec![0u64; TASKS as usize];
        for _ in 0..TASKS * PER_TASK {
            let frame = next_frame(&mut stream).await;
            let task = frame.data["task"].as_u64().unwrap();
            let seq = frame.data["seq"].as_u64().unwrap();
            assert_eq!(frame.name, format!("task-{task}"));
            assert_eq!(seq, next_seq[task as usize]);
            next_seq[task as usize] += 1;
        }
        assert!(next_seq.iter().all(|&n| n == PER_TASK));

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), stream.recv()).await;
        assert!(nothing.is_err(), "no extra frames expected");
    }

    #[tokio::test]
    async fn reconnect_scenario_clears_cache_when_up_to_date() {
        let dispatcher = dispatcher();
        let id = SubscriptionId::new(client("u1"), 1000);
        let mut stream = dispatcher.registry().register_with_id(id.clone());

        dispatcher.publish(&client("u1"), "greet", &json!("hi"));
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.id.to_string(), "u1_1000");
        assert_eq!(frame.name, "greet");
        assert_eq!(frame.data.to_string(), "\"hi\"");

        let unrelated = SubscriptionId::new(client("u2"), 5);
        dispatcher.replay_cache().record(unrelated, "other", json!(null));
        assert_eq!(dispatcher.replay_cache().len(), 2);

        drop(stream);
        let _again = dispatcher.connect(client("u1"), Some(&id));

        assert!(dispatcher.replay_cache().is_empty());
    }
}
