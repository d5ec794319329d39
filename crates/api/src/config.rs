use std::time::Duration;

use sse_hub_events::config::{DEFAULT_RELAY_BUFFER, DEFAULT_TOPIC};
use sse_hub_events::HubConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Bounds the time to
    /// produce response headers; open event streams are not affected.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Interval of keep-alive comments on event streams. `None` sends none.
    pub keepalive_interval: Option<Duration>,
    /// Hub tunables (topic, relay buffer, idle timeout).
    pub hub: HubConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `HUB_KEEPALIVE_SECS`    | unset (no keep-alive)      |
    /// | `HUB_TOPIC`             | `topic`                    |
    /// | `HUB_RELAY_BUFFER`      | `1024`                     |
    /// | `HUB_IDLE_TIMEOUT_SECS` | unset (streams never idle out) |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let keepalive_interval = optional_secs("HUB_KEEPALIVE_SECS");

        let hub = HubConfig {
            topic: std::env::var("HUB_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.into()),
            relay_buffer: std::env::var("HUB_RELAY_BUFFER")
                .map(|v| v.parse().expect("HUB_RELAY_BUFFER must be a valid usize"))
                .unwrap_or(DEFAULT_RELAY_BUFFER),
            idle_timeout: optional_secs("HUB_IDLE_TIMEOUT_SECS"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            keepalive_interval,
            hub,
        }
    }
}

/// Read an optional whole-seconds duration. Unset, empty and `0` mean off.
fn optional_secs(var: &str) -> Option<Duration> {
    let raw = std::env::var(var).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let secs: u64 = raw
        .parse()
        .unwrap_or_else(|_| panic!("{var} must be a valid u64"));
    (secs > 0).then(|| Duration::from_secs(secs))
}
