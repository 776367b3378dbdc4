use axum::routing::get;
use axum::{Json, Router, middleware};

use keygate_core::{Principal, combined_auth, require_permissions};

use crate::AppState;

/// Permission required by the gated probe.
pub const REPORTS_READ: &str = "reports:read";

pub(crate) fn router(state: &AppState) -> Router<AppState> {
    let gated = Router::new()
        .route("/reports", get(reports))
        .route_layer(middleware::from_fn_with_state(
            state.auth.gate(&[REPORTS_READ]),
            require_permissions,
        ));

    Router::new()
        .route("/", get(whoami))
        .merge(gated)
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            combined_auth,
        ))
}

async fn whoami(principal: Principal) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "authenticated",
        "auth_type": principal.auth_type,
        "user_id": principal.user_id,
    }))
}

async fn reports(principal: Principal) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "user_id": principal.user_id,
        "auth_type": principal.auth_type,
        "key_id": principal.key_id,
        "reports": [],
    }))
}
