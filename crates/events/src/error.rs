use sse_hub_core::error::CoreError;
use sse_hub_core::types::SubscriptionId;

/// Failures inside the hub.
///
/// None of these are fatal to the process: each one is scoped to a single
/// subscription or a single relayed message.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The client side of the stream is gone.
    #[error("Stream {id} is closed")]
    StreamClosed { id: SubscriptionId },

    /// Yielded as the last item of a stream that was torn down after a
    /// write failure.
    #[error("Stream {id} was terminated after a write failure")]
    StreamTerminated { id: SubscriptionId },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Event codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Broadcast transport error: {0}")]
    Transport(String),
}
