//! The authorization gate.
//!
//! Every operation authenticates the requester, runs the in-process check
//! against a (possibly cached) snapshot of the requester's membership, and then
//! dispatches to storage, where the row-level policies decide again on live
//! data. The in-process check only ever saves a round trip; a storage
//! rejection is final whatever the check said.

use crate::error::{AuthzError, Result};
use crate::registry::RoleRegistry;
use crate::requester::Requester;
use crate::snapshot::{MembershipSnapshot, SnapshotCache};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;
use wsrbac_cache::{Cache, CacheConfig};
use wsrbac_database::{DatabaseError, Storage};
use wsrbac_models::{
    evaluate, AssignRole, Capabilities, CreateWorkspace, Membership, Role, UpdateMemberRole,
    UpdateRole, UpdateWorkspace, Workspace, WorkspaceAction,
};

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Run the in-process check before dispatching. With `false` every
    /// request goes straight to storage.
    pub precheck: bool,
    pub snapshot_ttl: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            precheck: true,
            snapshot_ttl: Duration::from_secs(60),
        }
    }
}

impl GateConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            precheck: std::env::var("GATE_PRECHECK")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.precheck),
            snapshot_ttl: std::env::var("GATE_SNAPSHOT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.snapshot_ttl),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationGate {
    storage: Arc<dyn Storage>,
    registry: Arc<RoleRegistry>,
    snapshots: SnapshotCache,
    config: GateConfig,
}

impl AuthorizationGate {
    /// Gate with an in-process snapshot cache.
    pub fn new(storage: Arc<dyn Storage>, registry: Arc<RoleRegistry>, config: GateConfig) -> Self {
        let cache = Cache::local(&CacheConfig {
            ttl: config.snapshot_ttl,
            ..Default::default()
        });
        Self::with_cache(storage, registry, cache, config)
    }

    /// Gate sharing snapshots through `cache` (for example the Redis tier).
    pub fn with_cache(
        storage: Arc<dyn Storage>,
        registry: Arc<RoleRegistry>,
        cache: Cache,
        config: GateConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            snapshots: SnapshotCache::new(cache),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Record an identity the identity provider has verified.
    pub async fn ensure_user(&self, requester: Requester) -> Result<Uuid> {
        let user_id = requester.authenticate()?;
        self.storage.ensure_user(user_id).await?;
        Ok(user_id)
    }

    pub async fn ping(&self) -> Result<()> {
        self.storage.ping().await?;
        Ok(())
    }

    // Roles

    pub fn list_roles(&self) -> Vec<Role> {
        self.registry.list_system_roles()
    }

    pub fn role_by_name(&self, name: &str) -> Option<Role> {
        self.registry.get_role_by_name(name).cloned()
    }

    pub fn role_by_id(&self, id: Uuid) -> Option<Role> {
        self.registry.get_role_by_id(id).cloned()
    }

    /// Operator edit of a role description. The registry keeps the identities
    /// it loaded at startup.
    pub async fn update_role_description(&self, id: Uuid, patch: UpdateRole) -> Result<Role> {
        patch.validate()?;

        if let Some(field) = self
            .registry
            .get_role_by_id(id)
            .and_then(|role| patch.immutable_change(role))
        {
            return Err(DatabaseError::immutable("role", field).into());
        }

        let role = self
            .storage
            .update_role(id, &patch)
            .await
            .map_err(|e| rejected("update_role", e))?;

        tracing::info!(role_id = %role.id, role = %role.name, "Role description updated");
        Ok(role)
    }

    // Workspaces

    /// Create a workspace owned by the requester, who is enrolled as owner in
    /// the same transaction.
    pub async fn create_workspace(
        &self,
        requester: Requester,
        input: CreateWorkspace,
    ) -> Result<(Workspace, Membership)> {
        let user_id = requester.authenticate()?;
        let input = input.normalized();
        input.validate()?;

        if self.config.precheck && input.owner_id != user_id {
            tracing::debug!(requester = %user_id, owner_id = %input.owner_id, "Workspace creation denied in process");
            return Err(AuthzError::PolicyViolation(
                "a workspace can only be created with the requester as owner".to_string(),
            ));
        }

        let (workspace, owner) = self
            .storage
            .create_workspace(&input, user_id)
            .await
            .map_err(|e| rejected("create_workspace", e))?;

        self.snapshots
            .put(
                workspace.id,
                &MembershipSnapshot {
                    user_id,
                    role_id: Some(owner.role_id),
                    owner_id: workspace.owner_id,
                },
            )
            .await;

        tracing::info!(workspace_id = %workspace.id, owner_id = %workspace.owner_id, "Workspace created");
        Ok((workspace, owner))
    }

    /// `None` both when the workspace does not exist and when the requester
    /// may not see it.
    pub async fn get_workspace(&self, requester: Requester, id: Uuid) -> Result<Option<Workspace>> {
        let user_id = requester.authenticate()?;
        Ok(self.storage.find_workspace(id, user_id).await?)
    }

    pub async fn list_workspaces_by_user(
        &self,
        requester: Requester,
        user_id: Uuid,
    ) -> Result<Vec<Workspace>> {
        let requester_id = requester.authenticate()?;
        Ok(self
            .storage
            .list_workspaces_by_user(user_id, requester_id)
            .await?)
    }

    pub async fn update_workspace(
        &self,
        requester: Requester,
        id: Uuid,
        patch: UpdateWorkspace,
    ) -> Result<Workspace> {
        let user_id = requester.authenticate()?;
        let patch = patch.normalized();
        patch.validate()?;

        if let Some(snapshot) = self.precheck_snapshot(id, user_id).await? {
            if matches!(patch.owner_id, Some(owner_id) if owner_id != snapshot.owner_id) {
                return Err(DatabaseError::immutable("workspace", "owner_id").into());
            }
            self.check(&snapshot, id, &WorkspaceAction::Rename).await?;
        }

        let workspace = self
            .storage
            .update_workspace(id, &patch, user_id)
            .await
            .map_err(|e| rejected("update_workspace", e))?;

        tracing::info!(workspace_id = %workspace.id, name = %workspace.name, "Workspace updated");
        Ok(workspace)
    }

    /// Delete a workspace and, by cascade, all of its memberships.
    pub async fn delete_workspace(&self, requester: Requester, id: Uuid) -> Result<()> {
        let user_id = requester.authenticate()?;

        if let Some(snapshot) = self.precheck_snapshot(id, user_id).await? {
            self.check(&snapshot, id, &WorkspaceAction::Delete).await?;
        }

        self.storage
            .delete_workspace(id, user_id)
            .await
            .map_err(|e| rejected("delete_workspace", e))?;
        self.snapshots.invalidate_workspace(id).await;

        tracing::info!(workspace_id = %id, "Workspace deleted");
        Ok(())
    }

    /// UI affordances for the requester in one workspace, from the in-process
    /// layer only. Never authoritative.
    pub async fn capabilities(&self, requester: Requester, workspace_id: Uuid) -> Result<Capabilities> {
        let user_id = requester.authenticate()?;

        Ok(match self.snapshot(workspace_id, user_id).await? {
            Some(snapshot) => Capabilities::for_actor(&snapshot.actor(), snapshot.owner_id),
            None => Capabilities::default(),
        })
    }

    // Memberships

    pub async fn assign_role(&self, requester: Requester, input: AssignRole) -> Result<Membership> {
        let user_id = requester.authenticate()?;

        if let Some(snapshot) = self.precheck_snapshot(input.workspace_id, user_id).await? {
            let action = WorkspaceAction::AddMember {
                user_id: input.user_id,
                role_id: input.role_id,
            };
            self.check(&snapshot, input.workspace_id, &action).await?;
        }

        let membership = self
            .storage
            .assign_role(&input, user_id)
            .await
            .map_err(|e| rejected("assign_role", e))?;
        self.snapshots
            .invalidate(membership.workspace_id, membership.user_id)
            .await;

        tracing::info!(
            workspace_id = %membership.workspace_id,
            user_id = %membership.user_id,
            role_id = %membership.role_id,
            "Member added"
        );
        Ok(membership)
    }

    pub async fn update_user_role(
        &self,
        requester: Requester,
        workspace_id: Uuid,
        user_id: Uuid,
        patch: UpdateMemberRole,
    ) -> Result<Membership> {
        let requester_id = requester.authenticate()?;

        if let Some(snapshot) = self.precheck_snapshot(workspace_id, requester_id).await? {
            if let Some(target) = self
                .storage
                .find_membership(user_id, workspace_id, requester_id)
                .await?
            {
                let action = WorkspaceAction::ChangeRole {
                    user_id,
                    current_role_id: target.role_id,
                    new_role_id: patch.role_id,
                };
                self.check(&snapshot, workspace_id, &action).await?;
            }
        }

        let membership = self
            .storage
            .update_user_role(workspace_id, user_id, &patch, requester_id)
            .await
            .map_err(|e| rejected("update_user_role", e))?;
        self.snapshots.invalidate(workspace_id, user_id).await;

        tracing::info!(
            workspace_id = %workspace_id,
            user_id = %user_id,
            role_id = %membership.role_id,
            "Member role updated"
        );
        Ok(membership)
    }

    /// Remove a member. Anybody but the owner may remove themselves.
    pub async fn remove_user(&self, requester: Requester, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        let requester_id = requester.authenticate()?;

        if let Some(snapshot) = self.precheck_snapshot(workspace_id, requester_id).await? {
            if let Some(target) = self
                .storage
                .find_membership(user_id, workspace_id, requester_id)
                .await?
            {
                let action = WorkspaceAction::RemoveMember {
                    user_id,
                    role_id: target.role_id,
                };
                self.check(&snapshot, workspace_id, &action).await?;
            }
        }

        self.storage
            .remove_user(workspace_id, user_id, requester_id)
            .await
            .map_err(|e| rejected("remove_user", e))?;
        self.snapshots.invalidate(workspace_id, user_id).await;

        tracing::info!(workspace_id = %workspace_id, user_id = %user_id, "Member removed");
        Ok(())
    }

    pub async fn get_membership(
        &self,
        requester: Requester,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Option<Membership>> {
        let requester_id = requester.authenticate()?;
        Ok(self
            .storage
            .find_membership(user_id, workspace_id, requester_id)
            .await?)
    }

    /// All members when the requester is one, otherwise an empty list.
    pub async fn list_members(&self, requester: Requester, workspace_id: Uuid) -> Result<Vec<Membership>> {
        let requester_id = requester.authenticate()?;
        Ok(self.storage.list_members(workspace_id, requester_id).await?)
    }

    // In-process layer

    /// The requester's snapshot, from cache or live reads. `None` when the
    /// workspace is invisible to the requester.
    async fn snapshot(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<MembershipSnapshot>> {
        if let Some(snapshot) = self.snapshots.get(workspace_id, user_id).await {
            return Ok(Some(snapshot));
        }

        let Some(workspace) = self.storage.find_workspace(workspace_id, user_id).await? else {
            return Ok(None);
        };
        let role_id = self
            .storage
            .find_membership(user_id, workspace_id, user_id)
            .await?
            .map(|m| m.role_id);

        let snapshot = MembershipSnapshot {
            user_id,
            role_id,
            owner_id: workspace.owner_id,
        };
        self.snapshots.put(workspace_id, &snapshot).await;
        Ok(Some(snapshot))
    }

    /// Snapshot for the in-process check, or `None` when the check is off or
    /// has nothing to judge by. Storage answers alone in that case.
    async fn precheck_snapshot(&self, workspace_id: Uuid, user_id: Uuid) -> Result<Option<MembershipSnapshot>> {
        if !self.config.precheck {
            return Ok(None);
        }
        self.snapshot(workspace_id, user_id).await
    }

    /// Run the in-process check. The snapshot may be stale, so a denial is
    /// only reported once a live read agrees with it.
    async fn check(
        &self,
        snapshot: &MembershipSnapshot,
        workspace_id: Uuid,
        action: &WorkspaceAction,
    ) -> Result<()> {
        if evaluate(&snapshot.actor(), snapshot.owner_id, action).is_ok() {
            return Ok(());
        }

        self.snapshots.invalidate(workspace_id, snapshot.user_id).await;
        let Some(live) = self.snapshot(workspace_id, snapshot.user_id).await? else {
            return Ok(());
        };

        evaluate(&live.actor(), live.owner_id, action).map_err(|denial| {
            tracing::debug!(
                workspace_id = %workspace_id,
                requester = %live.user_id,
                action = ?action,
                reason = %denial,
                "Denied in process"
            );
            AuthzError::from(denial)
        })
    }
}

fn rejected(operation: &'static str, err: DatabaseError) -> AuthzError {
    if err.is_infrastructure() {
        tracing::error!(operation, error = %err, "Storage unavailable");
    } else {
        tracing::warn!(operation, error = %err, "Rejected by storage");
    }
    err.into()
}
