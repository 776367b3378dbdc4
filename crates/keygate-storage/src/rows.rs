use std::fmt;

use keygate_common::PermissionSet;
use time::OffsetDateTime;

use crate::entities;

/// A stored API key as the rest of the system sees it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub secret_hash: String,
    pub prefix: String,
    pub permissions: PermissionSet,
    pub expires_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl ApiKeyRow {
    /// A key whose expiry equals `now` is already expired.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_revoked(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// The hash never leaves the process through logs.
impl fmt::Debug for ApiKeyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRow")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("secret_hash", &"<redacted>")
            .field("prefix", &self.prefix)
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .field("last_used_at", &self.last_used_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .finish()
    }
}

impl From<entities::api_keys::Model> for ApiKeyRow {
    fn from(model: entities::api_keys::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            secret_hash: model.secret_hash,
            prefix: model.prefix,
            permissions: PermissionSet::from_csv(&model.permissions),
            expires_at: model.expires_at,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
            deleted_at: model.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct NewApiKey {
    pub user_id: i64,
    pub name: String,
    pub secret_hash: String,
    pub prefix: String,
    pub permissions: PermissionSet,
    pub expires_at: Option<OffsetDateTime>,
}

impl fmt::Debug for NewApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewApiKey")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Full replacement of the owner-mutable columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyChanges {
    pub name: String,
    pub permissions: PermissionSet,
    pub expires_at: Option<OffsetDateTime>,
}

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = if page < 1 { 1 } else { page as u64 };
        let per_page = if per_page < 1 {
            DEFAULT_PER_PAGE
        } else {
            (per_page as u64).min(MAX_PER_PAGE)
        };
        Self { page, per_page }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn row(expires_at: Option<OffsetDateTime>) -> ApiKeyRow {
        let now = OffsetDateTime::now_utc();
        ApiKeyRow {
            id: 1,
            user_id: 7,
            name: "ci".to_string(),
            secret_hash: "$2b$04$abcdefghijklmnopqrstuv".to_string(),
            prefix: "0123abcd".to_string(),
            permissions: PermissionSet::from_csv("read"),
            expires_at,
            last_used_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn pagination_normalizes_out_of_range_values() {
        assert_eq!(Pagination::new(0, 0), Pagination { page: 1, per_page: 10 });
        assert_eq!(Pagination::new(-3, -1), Pagination { page: 1, per_page: 10 });
        assert_eq!(Pagination::new(4, 25), Pagination { page: 4, per_page: 25 });
        assert_eq!(Pagination::new(1, 5000).per_page, MAX_PER_PAGE);
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = OffsetDateTime::now_utc();
        assert!(row(Some(now)).is_expired_at(now));
        assert!(row(Some(now - Duration::seconds(1))).is_expired_at(now));
        assert!(!row(Some(now + Duration::seconds(1))).is_expired_at(now));
        assert!(!row(None).is_expired_at(now));
    }

    #[test]
    fn debug_output_redacts_hash() {
        let rendered = format!("{:?}", row(None));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("$2b$"));
    }
}
