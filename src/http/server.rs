//! HTTP router setup.
//!
//! # Responsibilities
//! - Create Axum Router with the lookup handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Run lookups on the blocking pool

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::response::ErrorBody;
use crate::lookup::{LookupRequest, LookupService};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<LookupService>,
}

/// Build the Axum router shared by every listener.
#[allow(deprecated)]
pub fn build_router(lookup: Arc<LookupService>, request_timeout: Duration) -> Router {
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/find", post(find_handler))
        .with_state(AppState { lookup })
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Look up the requested peers on the configured device.
async fn find_handler(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    Json(request): Json<LookupRequest>,
) -> Response {
    tracing::debug!(
        peer_addr = %peer_addr,
        device = %state.lookup.device(),
        keys = request.len(),
        "Find request"
    );

    let lookup = state.lookup.clone();
    match tokio::task::spawn_blocking(move || lookup.find(&request)).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(error)) => {
            tracing::warn!(peer_addr = %peer_addr, %error, "Find failed");
            error.into_response()
        }
        Err(join_error) => {
            tracing::error!(error = %join_error, "Find task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("lookup task failed")),
            )
                .into_response()
        }
    }
}
