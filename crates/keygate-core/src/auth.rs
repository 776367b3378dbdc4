use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use http::{HeaderMap, StatusCode, Uri};
use serde::Serialize;

use keygate_common::PermissionSet;

use crate::error::{ApiError, ApiKeyError};
use crate::permission::PermissionDirectory;
use crate::service::ApiKeyService;
use crate::token::TokenService;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY: &str = "api_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    ApiKey,
    Jwt,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::ApiKey => "api_key",
            AuthType::Jwt => "jwt",
        }
    }
}

/// Identity bound to a request by one of the auth middlewares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: Option<String>,
    pub key_id: Option<i64>,
    /// The key's own grant; `None` for token principals.
    pub permissions: Option<PermissionSet>,
    pub auth_type: AuthType,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::NotAuthenticated)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Authorization header is required")]
    MissingAuthorization,
    #[error("Invalid authorization format")]
    InvalidAuthorizationFormat,
    #[error("Invalid token")]
    InvalidToken,
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("API key does not have required permissions")]
    KeyLacksPermissions,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Failed to authenticate request")]
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::KeyLacksPermissions | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::new(self.status(), self.to_string()).into_response()
    }
}

/// Shared state of the authentication middlewares.
#[derive(Clone)]
pub struct AuthState {
    keys: ApiKeyService,
    tokens: Arc<TokenService>,
    permissions: Arc<dyn PermissionDirectory>,
}

impl AuthState {
    pub fn new(
        keys: ApiKeyService,
        tokens: Arc<TokenService>,
        permissions: Arc<dyn PermissionDirectory>,
    ) -> Self {
        Self {
            keys,
            tokens,
            permissions,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Gate state for `require_permissions`.
    pub fn gate(&self, required: &[&str]) -> PermissionGate {
        PermissionGate::new(self.permissions.clone(), required)
    }

    pub async fn authenticate_api_key(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<Principal, AuthError> {
        let secret = extract_api_key(headers, uri).ok_or(AuthError::MissingApiKey)?;
        self.principal_for_key(&secret).await
    }

    pub fn authenticate_token(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = extract_bearer(headers)?;
        let claims = self.tokens.verify(token).map_err(|err| {
            tracing::debug!(event = "token_rejected", error = %err);
            AuthError::InvalidToken
        })?;
        Ok(Principal {
            user_id: claims.user_id,
            username: Some(claims.username),
            key_id: None,
            permissions: None,
            auth_type: AuthType::Jwt,
        })
    }

    /// API key when one is presented and valid, bearer token otherwise.
    ///
    /// Any API-key failure, internal ones included, is swallowed in favour of
    /// the token scheme.
    pub async fn authenticate_combined(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<Principal, AuthError> {
        if let Some(secret) = extract_api_key(headers, uri)
            && let Ok(principal) = self.principal_for_key(&secret).await
        {
            return Ok(principal);
        }
        self.authenticate_token(headers)
    }

    async fn principal_for_key(&self, secret: &str) -> Result<Principal, AuthError> {
        let row = self.keys.validate(secret).await.map_err(map_key_error)?;
        Ok(Principal {
            user_id: row.user_id,
            username: None,
            key_id: Some(row.id),
            permissions: Some(row.permissions),
            auth_type: AuthType::ApiKey,
        })
    }
}

fn map_key_error(err: ApiKeyError) -> AuthError {
    if err.is_internal() {
        tracing::error!(event = "api_key_validation_failed", error = %err);
        return AuthError::Internal;
    }
    tracing::debug!(event = "api_key_rejected", reason = %err);
    AuthError::InvalidApiKey
}

/// `X-API-Key` header first, then the `api_key` query parameter.
/// Blank values count as absent.
pub fn extract_api_key(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(value) = header_value(headers, API_KEY_HEADER) {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    let query = uri.query()?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    pairs
        .into_iter()
        .find(|(key, _)| key == API_KEY_QUERY)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth = header_value(headers, "authorization")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingAuthorization)?;
    let (scheme, token) = auth
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthorizationFormat)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthorizationFormat);
    }
    Ok(token)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub async fn api_key_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = auth
        .authenticate_api_key(req.headers(), req.uri())
        .await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub async fn jwt_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = auth.authenticate_token(req.headers())?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

pub async fn combined_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = auth
        .authenticate_combined(req.headers(), req.uri())
        .await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct PermissionGate {
    directory: Arc<dyn PermissionDirectory>,
    required: Arc<[String]>,
}

impl PermissionGate {
    pub fn new(directory: Arc<dyn PermissionDirectory>, required: &[&str]) -> Self {
        Self {
            directory,
            required: required.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub async fn check(&self, principal: &Principal) -> Result<(), AuthError> {
        match &principal.permissions {
            Some(granted) => {
                if granted.grants(&self.required[..]) {
                    return Ok(());
                }
                Err(AuthError::KeyLacksPermissions)
            }
            None => {
                let granted = self
                    .directory
                    .effective_permissions(principal.user_id)
                    .await
                    .map_err(|err| {
                        tracing::error!(
                            event = "permission_lookup_failed",
                            user_id = principal.user_id,
                            error = %err
                        );
                        AuthError::Internal
                    })?;
                if granted.grants(&self.required[..]) {
                    return Ok(());
                }
                Err(AuthError::InsufficientPermissions)
            }
        }
    }
}

/// Runs after one of the auth middlewares; rejects principals lacking the gate's set.
pub async fn require_permissions(
    State(gate): State<PermissionGate>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(AuthError::NotAuthenticated)?;
    if let Err(err) = gate.check(&principal).await {
        tracing::info!(
            event = "permission_denied",
            user_id = principal.user_id,
            auth_type = principal.auth_type.as_str(),
            path = %req.uri().path()
        );
        return Err(err);
    }
    Ok(next.run(req).await)
}
