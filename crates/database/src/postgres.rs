use crate::connection::Database;
use crate::error::Result;
use crate::repositories::{
    roles::RoleRepository, users::UserRepository, workspace_users::WorkspaceUserRepository,
    workspaces::WorkspaceRepository,
};
use crate::store::{MembershipStore, RoleStore, UserDirectory, WorkspaceStore};
use async_trait::async_trait;
use uuid::Uuid;
use wsrbac_models::{
    AssignRole, CreateWorkspace, Membership, Role, UpdateMemberRole, UpdateRole, UpdateWorkspace,
    Workspace,
};

/// Postgres-backed storage. Workspace and membership operations run under the
/// row-level policies as the requester.
#[derive(Clone)]
pub struct PgStorage {
    db: Database,
    roles: RoleRepository,
    users: UserRepository,
    workspaces: WorkspaceRepository,
    members: WorkspaceUserRepository,
}

impl PgStorage {
    pub fn new(db: Database) -> Self {
        let pool = db.pool().clone();
        Self {
            roles: RoleRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            workspaces: WorkspaceRepository::new(pool.clone()),
            members: WorkspaceUserRepository::new(pool),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RoleStore for PgStorage {
    async fn list_system_roles(&self) -> Result<Vec<Role>> {
        self.roles.list_system().await
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        self.roles.find_by_id(id).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.roles.find_by_name(name).await
    }

    async fn update_role(&self, id: Uuid, patch: &UpdateRole) -> Result<Role> {
        self.roles.update(id, patch).await
    }
}

#[async_trait]
impl WorkspaceStore for PgStorage {
    async fn create_workspace(
        &self,
        input: &CreateWorkspace,
        requester: Uuid,
    ) -> Result<(Workspace, Membership)> {
        self.workspaces.create_with_owner(input, requester).await
    }

    async fn find_workspace(&self, id: Uuid, requester: Uuid) -> Result<Option<Workspace>> {
        self.workspaces.find_by_id(id, requester).await
    }

    async fn list_workspaces_by_user(
        &self,
        user_id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<Workspace>> {
        self.workspaces.list_by_user(user_id, requester).await
    }

    async fn update_workspace(
        &self,
        id: Uuid,
        patch: &UpdateWorkspace,
        requester: Uuid,
    ) -> Result<Workspace> {
        self.workspaces.update(id, patch, requester).await
    }

    async fn delete_workspace(&self, id: Uuid, requester: Uuid) -> Result<()> {
        self.workspaces.delete(id, requester).await
    }
}

#[async_trait]
impl MembershipStore for PgStorage {
    async fn assign_role(&self, input: &AssignRole, requester: Uuid) -> Result<Membership> {
        self.members.assign(input, requester).await
    }

    async fn update_user_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        patch: &UpdateMemberRole,
        requester: Uuid,
    ) -> Result<Membership> {
        self.members
            .update_role(workspace_id, user_id, patch, requester)
            .await
    }

    async fn remove_user(&self, workspace_id: Uuid, user_id: Uuid, requester: Uuid) -> Result<()> {
        self.members.remove(workspace_id, user_id, requester).await
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        requester: Uuid,
    ) -> Result<Option<Membership>> {
        self.members.find(user_id, workspace_id, requester).await
    }

    async fn list_members(&self, workspace_id: Uuid, requester: Uuid) -> Result<Vec<Membership>> {
        self.members.list(workspace_id, requester).await
    }
}

#[async_trait]
impl UserDirectory for PgStorage {
    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        self.users.ensure(user_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;
    use crate::error::DatabaseError;
    use wsrbac_models::role::ids;

    async fn storage() -> PgStorage {
        let db = Database::new(DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        PgStorage::new(db)
    }

    async fn user(storage: &PgStorage) -> Uuid {
        let id = Uuid::new_v4();
        storage.ensure_user(id).await.unwrap();
        id
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_seeded_roles() {
        let storage = storage().await;
        let roles = storage.list_system_roles().await.unwrap();
        let role_ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        assert_eq!(role_ids, vec![ids::OWNER, ids::ADMIN, ids::MEMBER]);

        let admin = storage.find_role_by_name("  ADMIN ").await.unwrap().unwrap();
        assert_eq!(admin.id, ids::ADMIN);
        assert!(storage.find_role_by_name("superuser").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_role_name_is_immutable() {
        let storage = storage().await;
        let patch = UpdateRole {
            name: Some("root".to_string()),
            ..Default::default()
        };
        let err = storage.update_role(ids::OWNER, &patch).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ImmutableField(_)));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_row_level_policies_reject_outsiders() {
        let storage = storage().await;
        let (u1, u2, u3, u4) = (
            user(&storage).await,
            user(&storage).await,
            user(&storage).await,
            user(&storage).await,
        );

        let (acme, owner) = storage
            .create_workspace(&CreateWorkspace::new("Acme", u1), u1)
            .await
            .unwrap();
        assert_eq!(owner.role_id, ids::OWNER);

        // Creating on behalf of someone else
        let err = storage
            .create_workspace(&CreateWorkspace::new("Forged", u2), u1)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)));

        let admin = AssignRole {
            workspace_id: acme.id,
            user_id: u2,
            role_id: ids::ADMIN,
            invited_by: Some(u1),
        };
        storage.assign_role(&admin, u1).await.unwrap();

        let err = storage.assign_role(&admin, u1).await.unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyMember(_)));

        let outsider = AssignRole {
            workspace_id: acme.id,
            user_id: u4,
            role_id: ids::MEMBER,
            invited_by: Some(u3),
        };
        let err = storage.assign_role(&outsider, u3).await.unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)));

        let err = storage.remove_user(acme.id, u1, u1).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ProtectedEntity(_)));

        assert!(storage.find_workspace(acme.id, u3).await.unwrap().is_none());
        assert!(storage.list_members(acme.id, u3).await.unwrap().is_empty());

        storage.delete_workspace(acme.id, u1).await.unwrap();
        assert!(storage.find_membership(u2, acme.id, u2).await.unwrap().is_none());
    }

    struct Acme {
        storage: PgStorage,
        id: Uuid,
        owner: Uuid,
        admin: Uuid,
        member: Uuid,
    }

    /// Acme owned by `owner`, with one admin and one plain member.
    async fn acme() -> Acme {
        let storage = storage().await;
        let (owner, admin, member) = (user(&storage).await, user(&storage).await, user(&storage).await);
        let (workspace, _) = storage
            .create_workspace(&CreateWorkspace::new("Acme", owner), owner)
            .await
            .unwrap();
        for (user_id, role_id) in [(admin, ids::ADMIN), (member, ids::MEMBER)] {
            let input = AssignRole {
                workspace_id: workspace.id,
                user_id,
                role_id,
                invited_by: Some(owner),
            };
            storage.assign_role(&input, owner).await.unwrap();
        }

        Acme {
            storage,
            id: workspace.id,
            owner,
            admin,
            member,
        }
    }

    async fn role_of(acme: &Acme, user_id: Uuid) -> Option<Uuid> {
        acme.storage
            .find_membership(user_id, acme.id, acme.owner)
            .await
            .unwrap()
            .map(|m| m.role_id)
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_member_cannot_rename() {
        let acme = acme().await;

        let err = acme
            .storage
            .update_workspace(acme.id, &UpdateWorkspace::rename("Mine now"), acme.member)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");

        let workspace = acme.storage.find_workspace(acme.id, acme.owner).await.unwrap().unwrap();
        assert_eq!(workspace.name, "Acme");
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_admin_cannot_delete() {
        let acme = acme().await;

        let err = acme.storage.delete_workspace(acme.id, acme.admin).await.unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");

        assert!(acme.storage.find_workspace(acme.id, acme.owner).await.unwrap().is_some());
        assert_eq!(role_of(&acme, acme.admin).await, Some(ids::ADMIN));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_member_cannot_change_roles() {
        let acme = acme().await;
        let other = user(&acme.storage).await;
        let input = AssignRole {
            workspace_id: acme.id,
            user_id: other,
            role_id: ids::MEMBER,
            invited_by: Some(acme.owner),
        };
        acme.storage.assign_role(&input, acme.owner).await.unwrap();

        let err = acme
            .storage
            .update_user_role(acme.id, other, &UpdateMemberRole { role_id: ids::ADMIN }, acme.member)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");
        assert_eq!(role_of(&acme, other).await, Some(ids::MEMBER));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_nobody_changes_their_own_role() {
        let acme = acme().await;

        let err = acme
            .storage
            .update_user_role(acme.id, acme.admin, &UpdateMemberRole { role_id: ids::MEMBER }, acme.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");
        assert_eq!(role_of(&acme, acme.admin).await, Some(ids::ADMIN));

        let err = acme
            .storage
            .update_user_role(acme.id, acme.owner, &UpdateMemberRole { role_id: ids::ADMIN }, acme.owner)
            .await
            .unwrap_err();
        assert!(
            matches!(err, DatabaseError::PolicyViolation(_) | DatabaseError::ProtectedEntity(_)),
            "{err:?}"
        );
        assert_eq!(role_of(&acme, acme.owner).await, Some(ids::OWNER));
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_member_cannot_remove_admin() {
        let acme = acme().await;

        let err = acme
            .storage
            .remove_user(acme.id, acme.admin, acme.member)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");
        assert_eq!(role_of(&acme, acme.admin).await, Some(ids::ADMIN));

        acme.storage.remove_user(acme.id, acme.member, acme.member).await.unwrap();
        assert_eq!(role_of(&acme, acme.member).await, None);
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_assign_does_not_reveal_workspace_existence() {
        let acme = acme().await;
        let (outsider, invitee) = (user(&acme.storage).await, user(&acme.storage).await);

        let mut errors = Vec::new();
        for workspace_id in [acme.id, Uuid::new_v4()] {
            let input = AssignRole {
                workspace_id,
                user_id: invitee,
                role_id: ids::MEMBER,
                invited_by: Some(outsider),
            };
            let err = acme.storage.assign_role(&input, outsider).await.unwrap_err();
            assert!(matches!(err, DatabaseError::PolicyViolation(_)), "{err:?}");
            errors.push(err.to_string());
        }
        assert_eq!(errors[0], errors[1]);
        assert_eq!(role_of(&acme, invitee).await, None);
    }
}
