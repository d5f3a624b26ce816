//! Small admin HTTP surface: one-time codes and whole-snapshot
//! export/import. The key-guarded routes exist only when an API key is
//! configured; without one the server answers health checks and nothing
//! else.

use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use keymart_db::models::Snapshot;
use keymart_db::totp;
use serde_json::json;
use tracing::{error, info};

use crate::state::AppState;

pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<()> {
    let mut app = Router::new().route("/health", get(health));
    if state.totp_api_key.is_some() {
        app = app
            .route("/totp", get(totp_handler))
            .route("/data", get(export_data).post(import_data));
    }
    let app = app.with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Admin HTTP listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// The key may arrive as an `X-Api-Key` header or a `key` query parameter.
fn authorized(state: &AppState, headers: &HeaderMap, params: &HashMap<String, String>) -> bool {
    let Some(expected) = state.totp_api_key.as_deref() else {
        return false;
    };
    let header_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    header_key == Some(expected) || params.get("key").map(String::as_str) == Some(expected)
}

async fn totp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers, &params) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    let Some(secret) = params.get("secret") else {
        return (StatusCode::BAD_REQUEST, "missing secret").into_response();
    };
    match totp::generate(secret) {
        Ok(code) => Json(json!({ "code": code })).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, format!("{e:#}")).into_response(),
    }
}

async fn export_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers, &params) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    match state.sync.export().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            error!("snapshot export failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "export failed").into_response()
        }
    }
}

async fn import_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(snapshot): Json<Snapshot>,
) -> Response {
    if !authorized(&state, &headers, &params) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    match state.sync.import(&snapshot).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => {
            error!("snapshot import failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "import failed").into_response()
        }
    }
}
