//! The two halves of one subscription's stream.
//!
//! [`StreamHandle`] is the write side, owned by the registry and cloned by
//! the dispatcher for each write. [`EventStream`] is the read side, handed
//! to whoever serves the HTTP response. Frames travel over an unbounded
//! single-consumer queue, so writes to one subscription never interleave and
//! never wait on a slow reader.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use sse_hub_core::types::{SubscriptionId, Timestamp};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::HubError;
use crate::event::Frame;
use crate::registry::SubscriptionRegistry;

/// Why a subscription left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away or the server closed the stream cleanly.
    Completed,
    /// No frame arrived within the configured idle timeout.
    TimedOut,
    /// A write to the stream failed.
    Failed,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Completed => "completed",
            CloseReason::TimedOut => "timed_out",
            CloseReason::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Channel sender half for pushing frames to one subscription.
pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Write side of a subscription.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: SubscriptionId,
    /// Registration this handle belongs to, see [`SubscriptionRegistry`].
    serial: u64,
    sender: FrameSender,
    cancel: CancellationToken,
    connected_at: Timestamp,
}

impl StreamHandle {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    /// Enqueue a frame without waiting.
    ///
    /// Fails only once the read side is gone.
    pub fn write(&self, frame: Frame) -> Result<(), HubError> {
        self.sender.send(frame).map_err(|_| HubError::StreamClosed {
            id: self.id.clone(),
        })
    }

    /// Terminate the read side with an error. Frames already queued are
    /// still handed out before the error.
    pub fn fail(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// EventStream
// ---------------------------------------------------------------------------

/// Read side of a subscription.
///
/// Dropping it deregisters the subscription, which is how a client
/// disconnect reaches the registry.
pub struct EventStream {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
    finished: bool,
    _guard: RegistrationGuard,
}

enum Next {
    Frame(Frame),
    Closed(CloseReason),
}

impl EventStream {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once the stream is closed. A stream torn down after a
    /// write failure drains what was queued, then yields one
    /// `Err(HubError::StreamTerminated)`.
    pub async fn recv(&mut self) -> Option<Result<Frame, HubError>> {
        if self.finished {
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => match self.receiver.try_recv() {
                Ok(frame) => Next::Frame(frame),
                Err(_) => Next::Closed(CloseReason::Failed),
            },
            next = next_frame(&mut self.receiver, self.idle_timeout) => next,
        };

        match next {
            Next::Frame(frame) => Some(Ok(frame)),
            Next::Closed(reason) => {
                self.finished = true;
                tracing::debug!(
                    subscription_id = %self.id,
                    reason = reason.as_str(),
                    "Event stream closed"
                );
                match reason {
                    CloseReason::Failed => Some(Err(HubError::StreamTerminated {
                        id: self.id.clone(),
                    })),
                    CloseReason::Completed | CloseReason::TimedOut => None,
                }
            }
        }
    }

    /// Adapt into a [`Stream`] for response bodies.
    pub fn into_stream(self) -> impl Stream<Item = Result<Frame, HubError>> + Send + 'static {
        futures::stream::unfold(self, |mut stream| async move {
            let item = stream.recv().await?;
            Some((item, stream))
        })
    }
}

async fn next_frame(
    receiver: &mut mpsc::UnboundedReceiver<Frame>,
    idle_timeout: Option<Duration>,
) -> Next {
    let received = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.recv()).await {
            Ok(received) => received,
            Err(_) => return Next::Closed(CloseReason::TimedOut),
        },
        None => receiver.recv().await,
    };

    match received {
        Some(frame) => Next::Frame(frame),
        // Every sender is gone: the registry dropped this subscription.
        None => Next::Closed(CloseReason::Completed),
    }
}

/// Removes the registration it was created for when the read side is
/// dropped. A later registration under the same id is left alone.
struct RegistrationGuard {
    registry: Arc<SubscriptionRegistry>,
    id: SubscriptionId,
    serial: u64,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if self.registry.deregister_registration(&self.id, self.serial) {
            tracing::debug!(subscription_id = %self.id, "Subscription released by reader");
        }
    }
}

/// Build both halves of a new subscription.
pub(crate) fn open(
    registry: Arc<SubscriptionRegistry>,
    id: SubscriptionId,
    serial: u64,
    idle_timeout: Option<Duration>,
) -> (StreamHandle, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let handle = StreamHandle {
        id: id.clone(),
        serial,
        sender,
        cancel: cancel.clone(),
        connected_at: chrono::Utc::now(),
    };

    let stream = EventStream {
        id: id.clone(),
        receiver,
        cancel,
        idle_timeout,
        finished: false,
        _guard: RegistrationGuard {
            registry,
            id,
            serial,
        },
    };

    (handle, stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
