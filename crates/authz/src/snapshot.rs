//! Advisory cache of a requester's standing in a workspace.
//!
//! Entries feed the in-process check only. They may be stale or missing at
//! any time; the store re-derives membership on every query.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wsrbac_cache::{membership_cache_key, workspace_cache_prefix, Cache};
use wsrbac_models::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub user_id: Uuid,
    /// Role held by `user_id`, `None` when not a member.
    pub role_id: Option<Uuid>,
    pub owner_id: Uuid,
}

impl MembershipSnapshot {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role_id)
    }
}

#[derive(Clone)]
pub struct SnapshotCache {
    cache: Cache,
}

impl SnapshotCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    pub async fn get(&self, workspace_id: Uuid, user_id: Uuid) -> Option<MembershipSnapshot> {
        let key = membership_cache_key(&workspace_id.to_string(), &user_id.to_string());
        match self.cache.get::<MembershipSnapshot>(&key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Snapshot read failed, using live data");
                None
            }
        }
    }

    pub async fn put(&self, workspace_id: Uuid, snapshot: &MembershipSnapshot) {
        let key = membership_cache_key(&workspace_id.to_string(), &snapshot.user_id.to_string());
        if let Err(e) = self.cache.set(&key, snapshot).await {
            tracing::warn!(key = %key, error = %e, "Snapshot write failed");
        }
    }

    pub async fn invalidate(&self, workspace_id: Uuid, user_id: Uuid) {
        let key = membership_cache_key(&workspace_id.to_string(), &user_id.to_string());
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Snapshot invalidation failed");
        }
    }

    pub async fn invalidate_workspace(&self, workspace_id: Uuid) {
        let prefix = workspace_cache_prefix(&workspace_id.to_string());
        if let Err(e) = self.cache.delete_prefix(&prefix).await {
            tracing::warn!(prefix = %prefix, error = %e, "Snapshot invalidation failed");
        }
    }
}
