//! In-memory sqlite storage for tests in dependent crates.

use sea_orm::{ConnectOptions, Database};

use crate::seaorm::SeaOrmStorage;
use crate::storage::{KeyStore, StorageResult};

/// A synced `SeaOrmStorage` backed by a private in-memory sqlite database.
///
/// The pool is pinned to one connection; each sqlite `:memory:` connection
/// is its own database.
pub async fn memory_storage() -> StorageResult<SeaOrmStorage> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    let storage = SeaOrmStorage::from_connection(db).await?;
    storage.sync().await?;
    Ok(storage)
}
