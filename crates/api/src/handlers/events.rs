//! Handlers for the event stream resource.
//!
//! Connecting opens a long-lived `text/event-stream` response; publishing
//! hands the event to the relay and returns as soon as it is accepted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use sse_hub_events::{Event, Frame};

use crate::error::{AppError, AppResult};
use crate::middleware::identity::{ClientIdentity, LastEventId};
use crate::state::AppState;

/// GET /api/v1/events
///
/// Open an event stream for the calling client. With a `Last-Event-ID`
/// header, cached events newer than that id are sent first.
pub async fn connect(
    identity: ClientIdentity,
    LastEventId(last_seen): LastEventId,
    State(state): State<AppState>,
) -> Response {
    let stream = state
        .dispatcher
        .connect(identity.client_id, last_seen.as_ref());

    let events = stream
        .into_stream()
        .map(|item| item.map(to_sse_event));

    let sse = Sse::new(events);
    match state.config.keepalive_interval {
        Some(interval) => sse.keep_alive(KeepAlive::new().interval(interval)).into_response(),
        None => sse.into_response(),
    }
}

/// POST /api/v1/events
///
/// Accept `{id, name, data}` for distribution. `202 Accepted` means the
/// broadcast channel took it, not that any client received it.
pub async fn publish(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(event) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    event.validate()?;

    state.relay.publish(&event).await?;

    Ok(StatusCode::ACCEPTED)
}

fn to_sse_event(frame: Frame) -> SseEvent {
    SseEvent::default()
        .id(frame.id.to_string())
        .event(frame.name)
        .data(frame.data.to_string())
}
