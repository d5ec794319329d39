#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use sse_hub_api::config::ServerConfig;
use sse_hub_api::middleware::identity::{CLIENT_ID_HEADER, LAST_EVENT_ID_HEADER};
use sse_hub_api::routes;
use sse_hub_api::state::AppState;
use sse_hub_events::{
    BroadcastTransport, Dispatcher, DistributionRelay, HubConfig, InProcessTransport,
};

/// A running test application: the router plus handles to its internals.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub relay_cancel: CancellationToken,
    pub relay_handle: JoinHandle<()>,
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        keepalive_interval: None,
        hub: HubConfig::default(),
    }
}

/// Build the full application router with all middleware layers and a
/// running relay consumer on a private in-process transport.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub async fn build_test_app() -> TestApp {
    let transport: Arc<dyn BroadcastTransport> = Arc::new(InProcessTransport::default());
    build_test_app_on(transport).await
}

/// Like [`build_test_app`], but attached to a caller-supplied transport so
/// several apps can share one broadcast channel.
pub async fn build_test_app_on(transport: Arc<dyn BroadcastTransport>) -> TestApp {
    build_test_app_with(test_config(), transport).await
}

/// Like [`build_test_app_on`], with a caller-supplied configuration.
pub async fn build_test_app_with(
    config: ServerConfig,
    transport: Arc<dyn BroadcastTransport>,
) -> TestApp {
    let dispatcher = Arc::new(Dispatcher::new(&config.hub));
    let relay = DistributionRelay::new(transport, config.hub.topic.clone());

    let relay_cancel = CancellationToken::new();
    let relay_handle = relay
        .start(Arc::clone(&dispatcher), relay_cancel.clone())
        .await
        .expect("relay should subscribe");

    let state = AppState {
        config: Arc::new(config),
        dispatcher,
        relay,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(CLIENT_ID_HEADER),
            HeaderName::from_static(LAST_EVENT_ID_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state.clone());

    TestApp {
        router,
        state,
        relay_cancel,
        relay_handle,
    }
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Open an event stream as `client`, optionally resuming from `last_event_id`.
pub async fn connect(app: Router, client: &str, last_event_id: Option<&str>) -> Response {
    let mut request = Request::get("/api/v1/events").header(CLIENT_ID_HEADER, client);
    if let Some(last) = last_event_id {
        request = request.header(LAST_EVENT_ID_HEADER, last);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// POST a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a complete response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read the next chunk of a streaming body as text, failing after one second.
pub async fn next_chunk(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("a frame should arrive in time")
        .expect("the stream should still be open")
        .expect("the frame should not be an error");
    let data = frame.into_data().expect("expected a data frame");
    String::from_utf8(data.to_vec()).unwrap()
}
