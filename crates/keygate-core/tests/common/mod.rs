#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use keygate_core::{ApiKeyService, BcryptHasher};
use keygate_storage::testutil::memory_storage;
use keygate_storage::{
    ApiKeyChanges, ApiKeyRow, KeyStore, NewApiKey, Pagination, SeaOrmStorage, StorageResult,
};

/// Delegating store that counts prefix lookups and can fail lookups or last-used writes.
pub struct ObservedStore {
    inner: SeaOrmStorage,
    pub prefix_lookups: AtomicUsize,
    pub fail_lookups: AtomicBool,
    pub fail_touch: AtomicBool,
}

impl ObservedStore {
    pub fn lookups(&self) -> usize {
        self.prefix_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for ObservedStore {
    async fn sync(&self) -> StorageResult<()> {
        self.inner.sync().await
    }

    async fn health(&self) -> StorageResult<()> {
        self.inner.health().await
    }

    async fn insert_api_key(&self, key: NewApiKey) -> StorageResult<ApiKeyRow> {
        self.inner.insert_api_key(key).await
    }

    async fn find_api_key(&self, id: i64) -> StorageResult<Option<ApiKeyRow>> {
        self.inner.find_api_key(id).await
    }

    async fn find_api_keys_by_prefix(&self, prefix: &str) -> StorageResult<Vec<ApiKeyRow>> {
        self.prefix_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(sea_orm_error("lookups disabled"));
        }
        self.inner.find_api_keys_by_prefix(prefix).await
    }

    async fn find_api_keys_by_owner(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> StorageResult<(Vec<ApiKeyRow>, u64)> {
        self.inner.find_api_keys_by_owner(user_id, page).await
    }

    async fn update_api_key(
        &self,
        id: i64,
        user_id: i64,
        changes: ApiKeyChanges,
    ) -> StorageResult<Option<ApiKeyRow>> {
        self.inner.update_api_key(id, user_id, changes).await
    }

    async fn soft_delete_api_key(&self, id: i64, user_id: i64) -> StorageResult<bool> {
        self.inner.soft_delete_api_key(id, user_id).await
    }

    async fn touch_api_key_last_used(&self, id: i64, at: OffsetDateTime) -> StorageResult<()> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(sea_orm_error("touch disabled"));
        }
        self.inner.touch_api_key_last_used(id, at).await
    }
}

fn sea_orm_error(reason: &str) -> keygate_storage::StorageError {
    keygate_storage::StorageError::Db(keygate_storage::DbErr::Custom(reason.to_string()))
}

pub async fn service() -> (ApiKeyService, Arc<ObservedStore>) {
    let store = Arc::new(ObservedStore {
        inner: memory_storage().await.expect("memory storage"),
        prefix_lookups: AtomicUsize::new(0),
        fail_lookups: AtomicBool::new(false),
        fail_touch: AtomicBool::new(false),
    });
    let service = ApiKeyService::new(store.clone(), Arc::new(BcryptHasher::new(4)));
    (service, store)
}
