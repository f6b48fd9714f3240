//! HTTP routes

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::Application;
use crate::context::RequestContext;

/// Largest request body read into a context.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Application>,
    pub service: String,
}

impl AppState {
    pub fn new(app: Arc<Application>, service: impl Into<String>) -> Self {
        Self { app, service: service.into() }
    }
}

pub fn create_router(app: Arc<Application>) -> Router { create_router_with_name(app, "cope") }

pub fn create_router_with_name(app: Arc<Application>, service: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(handle_request)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(app, service))
}

async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": s.service,
        "scopes": s.app.scopes().to_string(),
        "order": s.app.order().as_str(),
    }))
}

async fn handle_request(State(s): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };
    dispatch(RequestContext::from_request_parts(s.app, &parts, &bytes))
}

/// Answer a request context: the snapshot when a command resolves, 404 JSON
/// otherwise. A redirect or error recorded on the context wins.
pub fn dispatch(ctx: RequestContext) -> Response {
    if let Some(redirect) = ctx.redirect() {
        return redirect.clone().into_response();
    }
    if ctx.command().is_none() {
        tracing::debug!(path = ctx.path(), scope = ?ctx.scope(), action = ?ctx.action(), "no command");
        let body = json!({
            "error": "no command",
            "path": ctx.path(),
            "scope": ctx.scope(),
            "action": ctx.action(),
        });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }

    let status = StatusCode::from_u16(ctx.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        let body = ctx.error_body().unwrap_or_default().to_string();
        return Response::builder()
            .status(status)
            .body(Body::from(body))
            .unwrap_or_else(|_| status.into_response());
    }
    (status, Json(ctx.snapshot())).into_response()
}
