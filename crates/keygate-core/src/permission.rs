use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use keygate_common::PermissionSet;

/// Source of effective permissions for token-authenticated users.
///
/// Roles, organizations and teams live outside this crate; they only need
/// to answer this one question.
#[async_trait]
pub trait PermissionDirectory: Send + Sync {
    async fn effective_permissions(&self, user_id: i64) -> anyhow::Result<PermissionSet>;
}

/// Grants nothing to anyone.
#[derive(Debug, Default)]
pub struct EmptyDirectory;

#[async_trait]
impl PermissionDirectory for EmptyDirectory {
    async fn effective_permissions(&self, _user_id: i64) -> anyhow::Result<PermissionSet> {
        Ok(PermissionSet::new())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionSnapshot {
    pub by_user: HashMap<i64, PermissionSet>,
}

/// Directory served from an atomically swapped in-memory snapshot.
#[derive(Debug)]
pub struct MemoryPermissionDirectory {
    snapshot: ArcSwap<PermissionSnapshot>,
}

impl MemoryPermissionDirectory {
    pub fn new(snapshot: PermissionSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn replace_snapshot(&self, snapshot: PermissionSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

#[async_trait]
impl PermissionDirectory for MemoryPermissionDirectory {
    async fn effective_permissions(&self, user_id: i64) -> anyhow::Result<PermissionSet> {
        let snapshot = self.snapshot.load();
        Ok(snapshot.by_user.get(&user_id).cloned().unwrap_or_default())
    }
}
