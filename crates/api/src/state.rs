use std::sync::Arc;

use sse_hub_events::{Dispatcher, DistributionRelay};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Local fan-out to the streams open on this process.
    pub dispatcher: Arc<Dispatcher>,
    /// Publishes go through the shared topic so every process sees them.
    pub relay: DistributionRelay,
}
