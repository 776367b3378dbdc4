pub mod entities;
pub mod rows;
pub mod seaorm;
pub mod storage;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use rows::{ApiKeyChanges, ApiKeyRow, NewApiKey, Pagination};
pub use seaorm::SeaOrmStorage;
pub use sea_orm::DbErr;
pub use storage::{KeyStore, StorageError, StorageResult};
