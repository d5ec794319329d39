//! Client identity and reconnect extractors for the event stream routes.
//!
//! The hub performs no authentication of its own. An upstream layer is
//! trusted to have either inserted a [`ClientIdentity`] into the request
//! extensions or set the `event-id` header.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sse_hub_core::error::CoreError;
use sse_hub_core::types::{ClientId, SubscriptionId};

use crate::error::AppError;

/// Header carrying the client id.
pub const CLIENT_ID_HEADER: &str = "event-id";

/// Header a reconnecting event source sends with the last id it saw.
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// The client a request acts for.
///
/// ```ignore
/// async fn my_handler(identity: ClientIdentity) -> AppResult<Json<()>> {
///     tracing::info!(client_id = %identity.client_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: ClientId,
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<ClientIdentity>() {
            return Ok(identity.clone());
        }

        let raw = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {CLIENT_ID_HEADER} header"
                )))
            })?
            .to_str()
            .map_err(|_| {
                AppError::Core(CoreError::Validation(format!(
                    "{CLIENT_ID_HEADER} header must be visible ASCII"
                )))
            })?;

        Ok(ClientIdentity {
            client_id: ClientId::new(raw)?,
        })
    }
}

/// The id a reconnecting client last received, if any.
///
/// A missing, empty, or unparseable header all mean "no replay requested".
#[derive(Debug, Clone, Default)]
pub struct LastEventId(pub Option<SubscriptionId>);

impl<S> FromRequestParts<S> for LastEventId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts
            .headers
            .get(LAST_EVENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(LastEventId(None));
        };

        match raw.parse::<SubscriptionId>() {
            Ok(id) => Ok(LastEventId(Some(id))),
            Err(e) => {
                tracing::debug!(last_event_id = %raw, error = %e, "Ignoring unparseable Last-Event-ID");
                Ok(LastEventId(None))
            }
        }
    }
}
