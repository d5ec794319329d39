//! Event broadcast hub.
//!
//! This crate holds everything needed to push named events to long-lived
//! client streams and keep several server processes in step:
//!
//! - [`SubscriptionRegistry`]: every open stream, indexed by client.
//! - [`ReplayCache`]: the latest event written to each subscription, for
//!   replay when a client reconnects.
//! - [`Dispatcher`]: fan-out of one event to all streams of a client.
//! - [`DistributionRelay`]: forwards publishes through a shared
//!   [`BroadcastTransport`] so that every process fans out locally.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod registry;
pub mod relay;
pub mod replay;
pub mod stream;
pub mod transport;

pub use config::HubConfig;
pub use dispatcher::Dispatcher;
pub use error::HubError;
pub use event::{Event, Frame};
pub use registry::SubscriptionRegistry;
pub use relay::DistributionRelay;
pub use replay::{ReplayCache, ReplayEntry};
pub use stream::{CloseReason, EventStream, StreamHandle};
pub use transport::{BroadcastTransport, InProcessTransport};
