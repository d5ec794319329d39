//! Route definitions for the event stream resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Routes mounted at `/events` (and its `/sse` alias).
///
/// ```text
/// GET    /                          -> connect
/// POST   /                          -> publish
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(events::connect).post(events::publish))
}
