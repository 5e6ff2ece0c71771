//! Http mode: a thin health-check server. Rendering a web UI over the
//! pipeline's data is a separate out-of-scope front end; this mode exposes
//! just the liveness surface an operator or load balancer needs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use signalbrief_repository::{KeyKind, StateKey, StateStore};

use crate::error::AppError;

async fn health(State(store): State<Arc<dyn StateStore>>) -> impl IntoResponse {
    let probe = StateKey::new(KeyKind::Custom("health".into()), "probe");
    let status = if store.get(&probe).await.is_ok() { "ok" } else { "degraded" };
    (StatusCode::OK, Json(serde_json::json!({ "status": status })))
}

fn router(store: Arc<dyn StateStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(store)
}

pub async fn run(
    cancel: CancellationToken,
    store: Arc<dyn StateStore>,
    host: &str,
    port: u16,
) -> Result<(), AppError> {
    let app = router(store);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "signalbrief http mode listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("signalbrief http mode shut down");
    Ok(())
}
