use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use keygate_common::PermissionSet;
use keygate_core::{ApiError, ApiKeyError, ExpiryPolicy, KeyPatch, Principal, jwt_auth};
use keygate_storage::{ApiKeyRow, Pagination};

use crate::AppState;

pub const MAX_NAME_LEN: usize = 100;

const INVALID_PARAMS: &str = "Invalid request parameters";
const INVALID_ID: &str = "Invalid API key ID";
const NOT_FOUND: &str = "API key not found";

pub(crate) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_keys).post(create_key))
        .route("/{id}", get(get_key).put(update_key).delete(revoke_key))
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), jwt_auth))
}

/// Unix seconds or an RFC 3339 string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimestampInput {
    Unix(i64),
    Text(String),
}

impl TimestampInput {
    fn parse(self) -> Option<OffsetDateTime> {
        match self {
            TimestampInput::Unix(secs) => OffsetDateTime::from_unix_timestamp(secs).ok(),
            TimestampInput::Text(raw) => OffsetDateTime::parse(raw.trim(), &Rfc3339).ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateKeyBody {
    name: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    expires_at: Option<TimestampInput>,
    #[serde(default)]
    never_expire: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateKeyBody {
    name: Option<String>,
    permissions: Option<Vec<String>>,
    expires_at: Option<TimestampInput>,
    #[serde(default)]
    never_expire: bool,
}

#[derive(Debug, Serialize)]
struct KeyResponse {
    id: i64,
    name: String,
    prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<String>,
    permissions: Vec<String>,
    created_at: String,
}

impl KeyResponse {
    fn from_row(row: ApiKeyRow, key: Option<String>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            prefix: row.prefix,
            key,
            user_id: row.user_id,
            expires_at: row.expires_at.map(format_time_rfc3339),
            last_used_at: row.last_used_at.map(format_time_rfc3339),
            permissions: row.permissions.into(),
            created_at: format_time_rfc3339(row.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListResponse {
    total: u64,
    page: u64,
    per_page: u64,
    data: Vec<KeyResponse>,
}

async fn create_key(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<CreateKeyBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let expose = state.expose_error_details;
    let Json(body) = body.map_err(|err| bad_params(err.body_text(), expose))?;

    let name = validate_name(body.name.as_deref(), expose)?
        .ok_or_else(|| bad_params("name is required", expose))?;
    let expiry = if body.never_expire {
        ExpiryPolicy::Never
    } else {
        match body.expires_at {
            Some(input) => ExpiryPolicy::At(parse_expiry(input, expose)?),
            None => ExpiryPolicy::Default,
        }
    };
    let permissions: PermissionSet = body.permissions.into_iter().collect();

    let issued = state
        .keys
        .issue(principal.user_id, &name, expiry, permissions)
        .await
        .map_err(|err| key_error(err, "Failed to create API key", expose))?;

    let response = KeyResponse::from_row(issued.record, Some(issued.secret));
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn get_key(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<KeyResponse>, ApiError> {
    let expose = state.expose_error_details;
    let id = parse_id(&id, expose)?;
    let row = state
        .keys
        .get(id)
        .await
        .map_err(|err| key_error(err, "Failed to retrieve API key", expose))?;
    if row.user_id != principal.user_id {
        return Err(ApiError::unauthorized(keygate_core::service::NOT_OWNER));
    }
    Ok(Json(KeyResponse::from_row(row, None)))
}

async fn list_keys(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>, ApiError> {
    let page = Pagination::new(query_int(&query, "page"), query_int(&query, "per_page"));
    let (rows, total) = state
        .keys
        .list(principal.user_id, page)
        .await
        .map_err(|err| {
            key_error(
                err,
                "Failed to retrieve API keys",
                state.expose_error_details,
            )
        })?;
    Ok(Json(ListResponse {
        total,
        page: page.page,
        per_page: page.per_page,
        data: rows
            .into_iter()
            .map(|row| KeyResponse::from_row(row, None))
            .collect(),
    }))
}

async fn update_key(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    body: Result<Json<UpdateKeyBody>, JsonRejection>,
) -> Result<Json<KeyResponse>, ApiError> {
    let expose = state.expose_error_details;
    let id = parse_id(&id, expose)?;
    let Json(body) = body.map_err(|err| bad_params(err.body_text(), expose))?;

    let expires_at = if body.never_expire {
        Some(None)
    } else {
        match body.expires_at {
            Some(input) => Some(Some(parse_expiry(input, expose)?)),
            None => None,
        }
    };
    let patch = KeyPatch {
        name: validate_name(body.name.as_deref(), expose)?,
        permissions: body
            .permissions
            .map(|permissions| permissions.into_iter().collect()),
        expires_at,
    };

    let row = state
        .keys
        .update(id, principal.user_id, patch)
        .await
        .map_err(|err| key_error(err, "Failed to update API key", expose))?;
    Ok(Json(KeyResponse::from_row(row, None)))
}

async fn revoke_key(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let expose = state.expose_error_details;
    let id = parse_id(&id, expose)?;
    state
        .keys
        .revoke(id, principal.user_id)
        .await
        .map_err(|err| key_error(err, "Failed to delete API key", expose))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Blank names are treated as absent; longer than `MAX_NAME_LEN` is rejected.
fn validate_name(name: Option<&str>, expose: bool) -> Result<Option<String>, ApiError> {
    let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
        return Ok(None);
    };
    if name.chars().count() > MAX_NAME_LEN {
        return Err(bad_params(
            format!("name must be at most {MAX_NAME_LEN} characters"),
            expose,
        ));
    }
    Ok(Some(name.to_string()))
}

fn parse_expiry(input: TimestampInput, expose: bool) -> Result<OffsetDateTime, ApiError> {
    input
        .parse()
        .ok_or_else(|| bad_params("expires_at must be RFC 3339 or unix seconds", expose))
}

fn parse_id(raw: &str, expose: bool) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        Ok(_) => Err(ApiError::bad_request(INVALID_ID).with_detail("id must be positive", expose)),
        Err(err) => Err(ApiError::bad_request(INVALID_ID).with_detail(err, expose)),
    }
}

fn query_int(query: &HashMap<String, String>, name: &str) -> i64 {
    query
        .get(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn bad_params(detail: impl ToString, expose: bool) -> ApiError {
    ApiError::bad_request(INVALID_PARAMS).with_detail(detail, expose)
}

fn key_error(err: ApiKeyError, context: &'static str, expose: bool) -> ApiError {
    match err {
        ApiKeyError::Unauthorized(message) => ApiError::unauthorized(message),
        ApiKeyError::NotFound => ApiError::not_found(NOT_FOUND),
        err if err.is_rejection() => ApiError::unauthorized("Invalid API key"),
        err => {
            tracing::error!(event = "api_key_request_failed", context, error = %err);
            ApiError::internal(context).with_detail(err, expose)
        }
    }
}

fn format_time_rfc3339(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}
