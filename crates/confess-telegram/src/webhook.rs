//! Webhook endpoint.
//!
//! One route, method-dispatched: GET is a health probe, POST receives
//! updates, OPTIONS answers CORS preflights, anything else is 405. The POST
//! handler always acknowledges with 200 — Telegram redelivers on any other
//! status and none of the handlers are idempotent under retry — so failures
//! are logged instead of surfaced.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use confess_core::router::App;

use crate::inbound_event;

pub fn router(app: Arc<App>) -> Router {
    let path = app.cfg.webhook_path.clone();
    Router::new()
        .route(&path, get(health).post(receive_update).options(preflight))
        .with_state(app)
}

pub async fn serve(app: Arc<App>) -> anyhow::Result<()> {
    let addr = app.cfg.webhook_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, path = %app.cfg.webhook_path, "webhook listening");
    axum::serve(listener, router(app)).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "online",
        "message": "confession bot is running",
    }))
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
}

async fn receive_update(
    State(app): State<Arc<App>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    match serde_json::from_value::<teloxide::types::Update>(body) {
        Ok(update) => {
            let update_id = update.id;
            if let Some(event) = inbound_event(update) {
                // Handled to completion before the response goes out.
                app.handle_event(event).await;
            } else {
                tracing::debug!(update_id, "update kind not consumed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "undecodable update payload"),
    }

    Json(json!({ "ok": true }))
}
