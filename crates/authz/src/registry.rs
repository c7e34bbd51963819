//! Process-wide role catalog: loaded once at startup, never mutated.

use crate::error::{AuthzError, Result};
use uuid::Uuid;
use wsrbac_database::RoleStore;
use wsrbac_models::{Role, SystemRole};

#[derive(Debug, Clone)]
pub struct RoleRegistry {
    owner: Role,
    admin: Role,
    member: Role,
}

impl RoleRegistry {
    /// Load the system roles and check them against the well-known ids.
    pub async fn load(store: &dyn RoleStore) -> Result<Self> {
        let roles = store.list_system_roles().await?;
        let registry = Self::from_roles(roles)?;

        tracing::info!(
            owner = %registry.owner.id,
            admin = %registry.admin.id,
            member = %registry.member.id,
            "Role registry loaded"
        );
        Ok(registry)
    }

    pub fn from_roles(roles: Vec<Role>) -> Result<Self> {
        if roles.len() != SystemRole::ALL.len() {
            return Err(AuthzError::Internal(format!(
                "expected {} system roles, found {}",
                SystemRole::ALL.len(),
                roles.len()
            )));
        }

        let take = |expected: SystemRole| -> Result<Role> {
            let role = roles
                .iter()
                .find(|r| r.id == expected.id())
                .ok_or_else(|| {
                    AuthzError::Internal(format!(
                        "system role {} ({}) is missing",
                        expected,
                        expected.id()
                    ))
                })?;

            if !role.is_system
                || role.workspace_id.is_some()
                || !role.name.eq_ignore_ascii_case(expected.name())
            {
                return Err(AuthzError::Internal(format!(
                    "role {} does not match system role {}",
                    role.id, expected
                )));
            }
            Ok(role.clone())
        };

        Ok(Self {
            owner: take(SystemRole::Owner)?,
            admin: take(SystemRole::Admin)?,
            member: take(SystemRole::Member)?,
        })
    }

    pub fn role(&self, role: SystemRole) -> &Role {
        match role {
            SystemRole::Owner => &self.owner,
            SystemRole::Admin => &self.admin,
            SystemRole::Member => &self.member,
        }
    }

    /// Owner, admin, member.
    pub fn list_system_roles(&self) -> Vec<Role> {
        SystemRole::ALL.iter().map(|r| self.role(*r).clone()).collect()
    }

    pub fn get_role_by_name(&self, name: &str) -> Option<&Role> {
        SystemRole::from_name(name).map(|r| self.role(r))
    }

    pub fn get_role_by_id(&self, id: Uuid) -> Option<&Role> {
        SystemRole::from_id(id).map(|r| self.role(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wsrbac_database::MemoryStorage;

    fn seed() -> Vec<Role> {
        let now = Utc::now();
        SystemRole::ALL.into_iter().map(|r| Role::seed(r, now)).collect()
    }

    #[tokio::test]
    async fn test_load_from_storage() {
        let storage = MemoryStorage::seeded();
        let registry = RoleRegistry::load(&storage).await.unwrap();

        let roles = registry.list_system_roles();
        assert_eq!(roles.len(), 3);
        assert!(roles.iter().all(|r| r.is_system && r.workspace_id.is_none()));
        assert_eq!(roles[0].id, SystemRole::Owner.id());
    }

    #[tokio::test]
    async fn test_load_fails_on_empty_catalog() {
        let storage = MemoryStorage::new();
        let err = RoleRegistry::load(&storage).await.unwrap_err();
        assert!(matches!(err, AuthzError::Internal(_)));
    }

    #[tokio::test]
    async fn test_load_propagates_storage_outage() {
        let storage = MemoryStorage::seeded();
        storage.set_offline(true).await;

        let err = RoleRegistry::load(&storage).await.unwrap_err();
        assert!(matches!(err, AuthzError::Infrastructure(_)));
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let registry = RoleRegistry::from_roles(seed()).unwrap();

        assert_eq!(
            registry.get_role_by_name("Admin").map(|r| r.id),
            Some(SystemRole::Admin.id())
        );
        assert!(registry.get_role_by_name("superuser").is_none());
        assert!(registry.get_role_by_id(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_rejects_wrong_identity() {
        let mut roles = seed();
        roles[1].name = "moderator".to_string();

        assert!(RoleRegistry::from_roles(roles).is_err());
    }
}
