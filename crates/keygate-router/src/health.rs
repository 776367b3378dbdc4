use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/status", get(status))
}

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "pong", "version": "v1" }))
}

async fn status(State(state): State<AppState>) -> Response {
    match state.keys.store().health().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "version": "v1",
            "database": "ok",
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(event = "health_check_failed", error = %err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "version": "v1",
                    "database": "unavailable",
                })),
            )
                .into_response()
        }
    }
}
