//! Shared broadcast channel between processes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::error::HubError;

/// Default buffer capacity of each in-process topic.
const DEFAULT_CAPACITY: usize = 1024;

/// Topic-based publish/subscribe used by the relay.
///
/// Every subscriber of a topic receives every message published to it,
/// including messages published by its own process. Delivery is best-effort.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Push `payload` to all subscribers of `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), HubError>;

    /// Start listening on `topic`. Messages are buffered in the returned
    /// queue, which closes when the transport goes away.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>, HubError>;
}

/// [`BroadcastTransport`] for processes that share one address space.
///
/// Backed by one `tokio::sync::broadcast` channel per topic. Several relays
/// attached to the same instance behave like separate server processes
/// attached to one pub/sub server.
pub struct InProcessTransport {
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
}

impl InProcessTransport {
    /// Create a transport whose topics buffer up to `capacity` messages.
    ///
    /// When a topic buffer is full, the oldest messages are dropped for
    /// subscribers that have not read them yet.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.topics.read().await.get(topic) {
            return sender.clone();
        }

        self.topics
            .write()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl BroadcastTransport for InProcessTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), HubError> {
        // A send error only means nobody is listening yet.
        let _ = self.sender(topic).await.send(payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>, HubError> {
        let mut receiver = self.sender(topic).await.subscribe();
        let (tx, rx) = mpsc::channel(self.capacity);
        let topic = topic.to_string();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            topic = %topic,
                            skipped = n,
                            "Broadcast subscriber lagged, some messages were dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
