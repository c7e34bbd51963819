use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;
use wsrbac_models::{
    AssignRole, CreateWorkspace, Membership, Role, UpdateMemberRole, UpdateRole, UpdateWorkspace,
    Workspace,
};

/// Role catalog access. Reads and edits here are operator-level and are not
/// scoped to a requester.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_system_roles(&self) -> Result<Vec<Role>>;

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>>;

    /// Case-insensitive match on the role name.
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Apply a description patch. Changing `name` or `is_system` fails with
    /// `ImmutableField`.
    async fn update_role(&self, id: Uuid, patch: &UpdateRole) -> Result<Role>;
}

/// Workspace rows as seen by `requester`. Rows the requester may not see
/// behave as if they did not exist.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Insert the workspace and the owner's membership atomically.
    async fn create_workspace(
        &self,
        input: &CreateWorkspace,
        requester: Uuid,
    ) -> Result<(Workspace, Membership)>;

    async fn find_workspace(&self, id: Uuid, requester: Uuid) -> Result<Option<Workspace>>;

    async fn list_workspaces_by_user(&self, user_id: Uuid, requester: Uuid)
        -> Result<Vec<Workspace>>;

    async fn update_workspace(
        &self,
        id: Uuid,
        patch: &UpdateWorkspace,
        requester: Uuid,
    ) -> Result<Workspace>;

    async fn delete_workspace(&self, id: Uuid, requester: Uuid) -> Result<()>;
}

/// Membership rows (`workspace_users`) as seen by `requester`.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn assign_role(&self, input: &AssignRole, requester: Uuid) -> Result<Membership>;

    async fn update_user_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        patch: &UpdateMemberRole,
        requester: Uuid,
    ) -> Result<Membership>;

    async fn remove_user(&self, workspace_id: Uuid, user_id: Uuid, requester: Uuid) -> Result<()>;

    async fn find_membership(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        requester: Uuid,
    ) -> Result<Option<Membership>>;

    /// Members ordered by join time. Empty when the requester cannot see the
    /// workspace.
    async fn list_members(&self, workspace_id: Uuid, requester: Uuid) -> Result<Vec<Membership>>;
}

/// Mirror of identities issued by the external identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn ensure_user(&self, user_id: Uuid) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

pub trait Storage: RoleStore + WorkspaceStore + MembershipStore + UserDirectory {}

impl<T> Storage for T where T: RoleStore + WorkspaceStore + MembershipStore + UserDirectory {}
