use std::time::Duration;

/// Topic used by every process when none is configured.
pub const DEFAULT_TOPIC: &str = "topic";

/// Default capacity of the relay's inbound queue.
pub const DEFAULT_RELAY_BUFFER: usize = 1024;

/// Tunables shared by the registry, dispatcher and relay.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Shared broadcast topic all processes publish to and listen on.
    pub topic: String,
    /// Messages buffered between the transport and the relay consumer.
    pub relay_buffer: usize,
    /// Close a stream after this long without a frame. `None` keeps streams
    /// open until the client goes away.
    pub idle_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            relay_buffer: DEFAULT_RELAY_BUFFER,
            idle_timeout: None,
        }
    }
}
