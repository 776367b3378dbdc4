use async_trait::async_trait;
use time::OffsetDateTime;

use crate::rows::{ApiKeyChanges, ApiKeyRow, NewApiKey, Pagination};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Persistence of API key records.
///
/// Soft-deleted rows are invisible to every read except `find_api_key`.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Entity-first schema sync (SeaORM 2.0) plus secondary indexes.
    async fn sync(&self) -> StorageResult<()>;

    /// Cheap round trip used by health checks.
    async fn health(&self) -> StorageResult<()>;

    async fn insert_api_key(&self, key: NewApiKey) -> StorageResult<ApiKeyRow>;

    async fn find_api_key(&self, id: i64) -> StorageResult<Option<ApiKeyRow>>;

    /// Non-revoked candidates sharing `prefix`, oldest first.
    async fn find_api_keys_by_prefix(&self, prefix: &str) -> StorageResult<Vec<ApiKeyRow>>;

    /// One page of the owner's non-revoked keys, newest first, and the total count.
    async fn find_api_keys_by_owner(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> StorageResult<(Vec<ApiKeyRow>, u64)>;

    /// Overwrites the mutable columns when the row exists, is owned by
    /// `user_id`, and is not revoked. Returns the updated row.
    async fn update_api_key(
        &self,
        id: i64,
        user_id: i64,
        changes: ApiKeyChanges,
    ) -> StorageResult<Option<ApiKeyRow>>;

    /// Soft-deletes the row under the same ownership condition as `update_api_key`.
    async fn soft_delete_api_key(&self, id: i64, user_id: i64) -> StorageResult<bool>;

    async fn touch_api_key_last_used(&self, id: i64, at: OffsetDateTime) -> StorageResult<()>;
}
