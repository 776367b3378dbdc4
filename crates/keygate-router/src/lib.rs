mod apikeys;
mod health;
mod probe;
mod recover;
mod trace;

use axum::Router;
use axum::middleware;

use keygate_core::{ApiKeyService, AuthState};

pub use probe::REPORTS_READ;

#[derive(Clone)]
pub struct AppState {
    pub keys: ApiKeyService,
    pub auth: AuthState,
    /// Include underlying error text in 5xx bodies.
    pub expose_error_details: bool,
}

/// Full HTTP surface, nested under `/v1`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/health", health::router())
        .nest("/apikeys", apikeys::router(&state))
        .nest("/protected", probe::router(&state));

    Router::new()
        .nest("/v1", api)
        .layer(middleware::from_fn(recover::recover_panics))
        .layer(middleware::from_fn(trace::log_requests))
        .with_state(state)
}
