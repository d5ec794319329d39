//! Cross-process distribution of publishes.
//!
//! [`DistributionRelay`] never dispatches locally on publish. It pushes the
//! event onto the shared topic and relies on its own consumer, like every
//! other process's consumer, to hand the event to the local [`Dispatcher`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::HubError;
use crate::event::Event;
use crate::transport::BroadcastTransport;

/// Bridges the local [`Dispatcher`] to a shared [`BroadcastTransport`].
#[derive(Clone)]
pub struct DistributionRelay {
    transport: Arc<dyn BroadcastTransport>,
    topic: String,
}

impl DistributionRelay {
    pub fn new(transport: Arc<dyn BroadcastTransport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hand `event` to the shared channel.
    ///
    /// Success means the transport accepted it, not that any subscriber
    /// received it.
    pub async fn publish(&self, event: &Event) -> Result<(), HubError> {
        let payload = serde_json::to_vec(event)?;
        self.transport.publish(&self.topic, payload).await?;
        tracing::debug!(
            client_id = %event.client_id,
            event_name = %event.name,
            topic = %self.topic,
            "Event relayed"
        );
        Ok(())
    }

    /// Subscribe to the topic and spawn the consumer task feeding
    /// `dispatcher`.
    ///
    /// The task exits when `cancel` fires or the transport closes the queue.
    pub async fn start(
        &self,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, HubError> {
        let receiver = self.transport.subscribe(&self.topic).await?;
        tracing::info!(topic = %self.topic, "Relay listening on shared topic");
        Ok(tokio::spawn(Self::run(receiver, dispatcher, cancel)))
    }

    async fn run(
        mut receiver: mpsc::Receiver<Vec<u8>>,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Relay consumer cancelled");
                    break;
                }
                message = receiver.recv() => match message {
                    Some(raw) => {
                        on_message(&dispatcher, &raw);
                    }
                    None => {
                        tracing::info!("Shared topic closed, relay consumer shutting down");
                        break;
                    }
                },
            }
        }
    }
}

/// Decode one message from the shared topic and dispatch it locally.
///
/// Malformed messages are logged and dropped. Returns the number of local
/// streams reached, or `None` if the message was dropped.
pub fn on_message(dispatcher: &Dispatcher, raw: &[u8]) -> Option<usize> {
    let event = match decode(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                error = %e,
                bytes = raw.len(),
                "Dropping malformed message from shared topic"
            );
            return None;
        }
    };

    Some(dispatcher.publish_event(&event))
}

fn decode(raw: &[u8]) -> Result<Event, HubError> {
    let event: Event = serde_json::from_slice(raw)?;
    event.validate()?;
    Ok(event)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
