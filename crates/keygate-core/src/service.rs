use std::fmt;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use keygate_common::PermissionSet;
use keygate_storage::{ApiKeyChanges, ApiKeyRow, KeyStore, NewApiKey, Pagination};

use crate::error::ApiKeyError;
use crate::hasher::CredentialHasher;
use crate::secret::{generate_secret, prefix_of};

pub const NOT_OWNER: &str = "You do not have permission to access this API key";

/// Expiry requested at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Same calendar date one year after issuance.
    #[default]
    Default,
    Never,
    At(OffsetDateTime),
}

impl ExpiryPolicy {
    pub fn resolve(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            ExpiryPolicy::Default => Some(one_year_after(now)),
            ExpiryPolicy::Never => None,
            ExpiryPolicy::At(at) => Some(at),
        }
    }
}

fn one_year_after(now: OffsetDateTime) -> OffsetDateTime {
    // Feb 29 has no counterpart next year.
    now.replace_year(now.year() + 1)
        .unwrap_or_else(|_| now + Duration::days(365))
}

/// A freshly issued key. `secret` is the only copy of the plaintext.
pub struct IssuedKey {
    pub secret: String,
    pub record: ApiKeyRow,
}

impl fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKey")
            .field("secret", &"<redacted>")
            .field("record", &self.record)
            .finish()
    }
}

/// Partial update; `None` keeps the stored value.
///
/// `expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPatch {
    pub name: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub expires_at: Option<Option<OffsetDateTime>>,
}

impl KeyPatch {
    fn apply(self, row: &ApiKeyRow) -> ApiKeyChanges {
        ApiKeyChanges {
            name: self.name.unwrap_or_else(|| row.name.clone()),
            permissions: self.permissions.unwrap_or_else(|| row.permissions.clone()),
            expires_at: self.expires_at.unwrap_or(row.expires_at),
        }
    }
}

/// Issuance, validation, update, and revocation of API keys.
#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn KeyStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn KeyStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { store, hasher }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    pub async fn issue(
        &self,
        user_id: i64,
        name: &str,
        expiry: ExpiryPolicy,
        permissions: PermissionSet,
    ) -> Result<IssuedKey, ApiKeyError> {
        let secret = generate_secret()?;
        let prefix = prefix_of(&secret)
            .ok_or(ApiKeyError::InvalidFormat)?
            .to_string();

        let hasher = self.hasher.clone();
        let plaintext = secret.clone();
        let secret_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await??;

        let record = self
            .store
            .insert_api_key(NewApiKey {
                user_id,
                name: name.to_string(),
                secret_hash,
                prefix,
                permissions,
                expires_at: expiry.resolve(OffsetDateTime::now_utc()),
            })
            .await?;

        tracing::info!(
            event = "api_key_issued",
            key_id = record.id,
            user_id,
            prefix = %record.prefix,
            expires_at = ?record.expires_at
        );
        Ok(IssuedKey { secret, record })
    }

    /// Resolves a presented secret to its live key record.
    pub async fn validate(&self, secret: &str) -> Result<ApiKeyRow, ApiKeyError> {
        let prefix = prefix_of(secret).ok_or(ApiKeyError::InvalidFormat)?;

        let candidates = self.store.find_api_keys_by_prefix(prefix).await?;
        if candidates.is_empty() {
            return Err(ApiKeyError::NotFound);
        }

        let now = OffsetDateTime::now_utc();
        let mut live: Vec<ApiKeyRow> = candidates
            .into_iter()
            .filter(|row| !row.is_expired_at(now))
            .collect();
        if live.is_empty() {
            tracing::debug!(event = "api_key_expired", prefix = %prefix);
            return Err(ApiKeyError::Expired);
        }

        let hasher = self.hasher.clone();
        let hashes: Vec<String> = live.iter().map(|row| row.secret_hash.clone()).collect();
        let presented = secret.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            hashes
                .iter()
                .position(|hash| hasher.verify(hash, &presented))
        })
        .await?;
        let Some(index) = matched else {
            tracing::debug!(event = "api_key_mismatch", prefix = %prefix);
            return Err(ApiKeyError::Invalid);
        };

        let mut row = live.swap_remove(index);
        match self.store.touch_api_key_last_used(row.id, now).await {
            Ok(()) => row.last_used_at = Some(now),
            Err(err) => {
                tracing::warn!(
                    event = "api_key_touch_failed",
                    key_id = row.id,
                    error = %err
                );
            }
        }
        Ok(row)
    }

    /// Fetches a live key by id without an ownership check.
    pub async fn get(&self, id: i64) -> Result<ApiKeyRow, ApiKeyError> {
        match self.store.find_api_key(id).await? {
            Some(row) if !row.is_revoked() => Ok(row),
            _ => Err(ApiKeyError::NotFound),
        }
    }

    pub async fn list(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> Result<(Vec<ApiKeyRow>, u64), ApiKeyError> {
        Ok(self.store.find_api_keys_by_owner(user_id, page).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        patch: KeyPatch,
    ) -> Result<ApiKeyRow, ApiKeyError> {
        let current = match self.store.find_api_key(id).await? {
            Some(row) if row.user_id == user_id && !row.is_revoked() => row,
            _ => return Err(ApiKeyError::Unauthorized(NOT_OWNER)),
        };

        let changes = patch.apply(&current);
        let updated = self
            .store
            .update_api_key(id, user_id, changes)
            .await?
            .ok_or(ApiKeyError::Unauthorized(NOT_OWNER))?;

        tracing::info!(event = "api_key_updated", key_id = id, user_id);
        Ok(updated)
    }

    pub async fn revoke(&self, id: i64, user_id: i64) -> Result<(), ApiKeyError> {
        if !self.store.soft_delete_api_key(id, user_id).await? {
            return Err(ApiKeyError::Unauthorized(NOT_OWNER));
        }
        tracing::info!(event = "api_key_revoked", key_id = id, user_id);
        Ok(())
    }
}
