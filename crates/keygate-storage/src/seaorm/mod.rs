use sea_orm::sea_query::{Expr, Index};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, Database, DatabaseBackend,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Schema,
};
use time::OffsetDateTime;

use crate::entities;
use crate::rows::{ApiKeyChanges, ApiKeyRow, NewApiKey, Pagination};
use crate::storage::{KeyStore, StorageResult};

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let db = Database::connect(dsn).await?;
        Self::from_connection(db).await
    }

    pub async fn from_connection(db: DatabaseConnection) -> StorageResult<Self> {
        // Concurrent last-used writes would otherwise fail fast with SQLITE_BUSY.
        if db.get_database_backend() == DatabaseBackend::Sqlite {
            db.execute_unprepared("PRAGMA busy_timeout = 5000").await?;
        }
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn ensure_indexes(&self) -> StorageResult<()> {
        use entities::api_keys::Column;

        let statements = vec![
            Index::create()
                .name("idx_api_keys_prefix")
                .table(entities::ApiKeys)
                .col(Column::Prefix)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_api_keys_user_id_created_at")
                .table(entities::ApiKeys)
                .col(Column::UserId)
                .col(Column::CreatedAt)
                .if_not_exists()
                .to_owned(),
        ];

        for statement in statements {
            self.db.execute(&statement).await?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyStore for SeaOrmStorage {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::ApiKeys)
            .sync(&self.db)
            .await?;
        self.ensure_indexes().await?;
        Ok(())
    }

    async fn health(&self) -> StorageResult<()> {
        self.db.ping().await?;
        Ok(())
    }

    async fn insert_api_key(&self, key: NewApiKey) -> StorageResult<ApiKeyRow> {
        use entities::api_keys::ActiveModel as ApiKeyActive;

        let now = OffsetDateTime::now_utc();
        let active = ApiKeyActive {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(key.user_id),
            name: ActiveValue::Set(key.name),
            secret_hash: ActiveValue::Set(key.secret_hash),
            prefix: ActiveValue::Set(key.prefix),
            permissions: ActiveValue::Set(key.permissions.to_csv()),
            expires_at: ActiveValue::Set(key.expires_at),
            last_used_at: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            deleted_at: ActiveValue::Set(None),
        };
        let model = active.insert(&self.db).await?;
        Ok(model.into())
    }

    async fn find_api_key(&self, id: i64) -> StorageResult<Option<ApiKeyRow>> {
        let row = entities::ApiKeys::find_by_id(id).one(&self.db).await?;
        Ok(row.map(Into::into))
    }

    async fn find_api_keys_by_prefix(&self, prefix: &str) -> StorageResult<Vec<ApiKeyRow>> {
        use entities::api_keys::Column;

        let rows = entities::ApiKeys::find()
            .filter(Column::Prefix.eq(prefix))
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_api_keys_by_owner(
        &self,
        user_id: i64,
        page: Pagination,
    ) -> StorageResult<(Vec<ApiKeyRow>, u64)> {
        use entities::api_keys::Column;

        let paginator = entities::ApiKeys::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(&self.db, page.per_page);
        let total = paginator.num_items().await?;
        let num_pages = total.div_ceil(page.per_page);
        let items = if num_pages == 0 || page.page > num_pages {
            Vec::new()
        } else {
            paginator.fetch_page(page.page - 1).await?
        };
        Ok((items.into_iter().map(Into::into).collect(), total))
    }

    async fn update_api_key(
        &self,
        id: i64,
        user_id: i64,
        changes: ApiKeyChanges,
    ) -> StorageResult<Option<ApiKeyRow>> {
        use entities::api_keys::Column;

        let now = OffsetDateTime::now_utc();
        let result = entities::ApiKeys::update_many()
            .col_expr(Column::Name, Expr::value(changes.name))
            .col_expr(Column::Permissions, Expr::value(changes.permissions.to_csv()))
            .col_expr(Column::ExpiresAt, Expr::value(changes.expires_at))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_api_key(id).await
    }

    async fn soft_delete_api_key(&self, id: i64, user_id: i64) -> StorageResult<bool> {
        use entities::api_keys::Column;

        let now = OffsetDateTime::now_utc();
        let result = entities::ApiKeys::update_many()
            .col_expr(Column::DeletedAt, Expr::value(Some(now)))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn touch_api_key_last_used(&self, id: i64, at: OffsetDateTime) -> StorageResult<()> {
        use entities::api_keys::Column;

        entities::ApiKeys::update_many()
            .col_expr(Column::LastUsedAt, Expr::value(Some(at)))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
