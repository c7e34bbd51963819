//! In-memory storage engine.
//!
//! Enforces the same constraints as the Postgres schema: foreign keys,
//! (workspace, user) uniqueness, the guard triggers and the row-level
//! policies (through `wsrbac_models::policy::evaluate`). Writers are
//! serialized behind one lock, so uniqueness holds under concurrency.

use crate::error::{DatabaseError, Result};
use crate::store::{MembershipStore, RoleStore, UserDirectory, WorkspaceStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use wsrbac_models::role::ids;
use wsrbac_models::{
    evaluate, Actor, AssignRole, CreateWorkspace, Denial, Membership, Role, SystemRole,
    UpdateMemberRole, UpdateRole, UpdateWorkspace, Workspace, WorkspaceAction,
};

const MAX_WORKSPACE_NAME: usize = 100;

/// Row plus insertion sequence, standing in for a serial ordering column.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashSet<Uuid>,
    roles: HashMap<Uuid, Role>,
    workspaces: HashMap<Uuid, Row<Workspace>>,
    memberships: HashMap<(Uuid, Uuid), Row<Membership>>,
    next_seq: u64,
    offline: bool,
}

impl MemoryState {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(DatabaseError::ConnectionFailed(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn role_in(&self, workspace_id: Uuid, user_id: Uuid) -> Option<Uuid> {
        self.memberships
            .get(&(workspace_id, user_id))
            .map(|row| row.value.role_id)
    }

    /// The requester's standing, `None` when the workspace is invisible.
    fn standing(&self, workspace_id: Uuid, requester: Uuid) -> Option<(Actor, Uuid)> {
        let workspace = self.workspaces.get(&workspace_id)?;
        let actor = Actor::new(requester, self.role_in(workspace_id, requester));
        let owner_id = workspace.value.owner_id;

        (actor.role_id.is_some() || owner_id == requester).then_some((actor, owner_id))
    }

    fn membership_visible(&self, workspace_id: Uuid, user_id: Uuid, requester: Uuid) -> bool {
        user_id == requester || self.role_in(workspace_id, requester).is_some()
    }
}

fn check_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > MAX_WORKSPACE_NAME {
        return Err(DatabaseError::InvalidInput(format!(
            "workspace name must be 1 to {} characters and not blank",
            MAX_WORKSPACE_NAME
        )));
    }
    Ok(())
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    /// Empty store with no roles. Most callers want [`MemoryStorage::seeded`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the three system roles, as after the first migration.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let roles = SystemRole::ALL
            .into_iter()
            .map(|role| (role.id(), Role::seed(role, now)))
            .collect();

        Self {
            state: Arc::new(RwLock::new(MemoryState {
                roles,
                ..Default::default()
            })),
        }
    }

    pub async fn register_user(&self, user_id: Uuid) {
        self.state.write().await.users.insert(user_id);
    }

    /// Simulate losing the database: every operation fails with
    /// `ConnectionFailed` until switched back.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Operator write that ignores the row-level policies, like a direct
    /// UPDATE by the table owner.
    pub async fn override_role(&self, workspace_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let row = state
            .memberships
            .get_mut(&(workspace_id, user_id))
            .ok_or_else(|| DatabaseError::not_found("Membership", &format!("{workspace_id}/{user_id}")))?;
        row.value.role_id = role_id;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStorage {
    async fn list_system_roles(&self) -> Result<Vec<Role>> {
        let state = self.state.read().await;
        state.check_online()?;

        let mut roles: Vec<Role> = state.roles.values().filter(|r| r.is_system).cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let state = self.state.read().await;
        state.check_online()?;

        let name = name.trim();
        Ok(state
            .roles
            .values()
            .find(|r| r.is_system && r.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn update_role(&self, id: Uuid, patch: &UpdateRole) -> Result<Role> {
        let mut state = self.state.write().await;
        state.check_online()?;

        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        if let Some(field) = patch.immutable_change(role) {
            return Err(DatabaseError::immutable("role", field));
        }
        if let Some(description) = &patch.description {
            role.description = Some(description.clone());
        }
        role.updated_at = Utc::now();

        Ok(role.clone())
    }
}

#[async_trait]
impl WorkspaceStore for MemoryStorage {
    async fn create_workspace(
        &self,
        input: &CreateWorkspace,
        requester: Uuid,
    ) -> Result<(Workspace, Membership)> {
        let mut state = self.state.write().await;
        state.check_online()?;

        if input.owner_id != requester {
            return Err(DatabaseError::PolicyViolation(
                "a workspace can only be created with the requester as owner".to_string(),
            ));
        }
        check_name(&input.name)?;
        if !state.users.contains(&input.owner_id) {
            return Err(DatabaseError::missing("User", &input.owner_id.to_string()));
        }
        if !state.roles.contains_key(&ids::OWNER) {
            return Err(DatabaseError::missing("Role", &ids::OWNER.to_string()));
        }

        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            owner_id: input.owner_id,
            created_at: now,
            updated_at: now,
        };
        let owner = Membership {
            id: Uuid::new_v4(),
            workspace_id: workspace.id,
            user_id: workspace.owner_id,
            role_id: ids::OWNER,
            joined_at: now,
            invited_by: None,
        };

        let seq = state.seq();
        state.workspaces.insert(
            workspace.id,
            Row {
                seq,
                value: workspace.clone(),
            },
        );
        let seq = state.seq();
        state.memberships.insert(
            (workspace.id, owner.user_id),
            Row {
                seq,
                value: owner.clone(),
            },
        );

        Ok((workspace, owner))
    }

    async fn find_workspace(&self, id: Uuid, requester: Uuid) -> Result<Option<Workspace>> {
        let state = self.state.read().await;
        state.check_online()?;

        Ok(state
            .standing(id, requester)
            .and_then(|_| state.workspaces.get(&id))
            .map(|row| row.value.clone()))
    }

    async fn list_workspaces_by_user(
        &self,
        user_id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<Workspace>> {
        let state = self.state.read().await;
        state.check_online()?;

        let mut rows: Vec<&Row<Workspace>> = state
            .memberships
            .values()
            .filter(|m| m.value.user_id == user_id)
            .filter(|m| state.membership_visible(m.value.workspace_id, user_id, requester))
            .filter(|m| state.standing(m.value.workspace_id, requester).is_some())
            .filter_map(|m| state.workspaces.get(&m.value.workspace_id))
            .collect();
        rows.sort_by_key(|row| row.seq);

        Ok(rows.into_iter().map(|row| row.value.clone()).collect())
    }

    async fn update_workspace(
        &self,
        id: Uuid,
        patch: &UpdateWorkspace,
        requester: Uuid,
    ) -> Result<Workspace> {
        let mut state = self.state.write().await;
        state.check_online()?;

        let (actor, owner_id) = state
            .standing(id, requester)
            .ok_or_else(|| DatabaseError::not_found("Workspace", &id.to_string()))?;
        let row = state
            .workspaces
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("Workspace", &id.to_string()))?;

        if let Some(field) = patch.immutable_change(&row.value) {
            return Err(DatabaseError::immutable("workspace", field));
        }
        evaluate(&actor, owner_id, &WorkspaceAction::Rename)?;

        if let Some(name) = &patch.name {
            check_name(name)?;
            row.value.name = name.clone();
        }
        row.value.updated_at = Utc::now();

        Ok(row.value.clone())
    }

    async fn delete_workspace(&self, id: Uuid, requester: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;

        let (actor, owner_id) = state
            .standing(id, requester)
            .ok_or_else(|| DatabaseError::not_found("Workspace", &id.to_string()))?;
        evaluate(&actor, owner_id, &WorkspaceAction::Delete)?;

        state.workspaces.remove(&id);
        state.memberships.retain(|(workspace_id, _), _| *workspace_id != id);
        state.roles.retain(|_, role| role.workspace_id != Some(id));

        Ok(())
    }
}

#[async_trait]
impl MembershipStore for MemoryStorage {
    async fn assign_role(&self, input: &AssignRole, requester: Uuid) -> Result<Membership> {
        let mut state = self.state.write().await;
        state.check_online()?;

        // Missing and invisible workspaces are refused alike.
        let Some((actor, owner_id)) = state.standing(input.workspace_id, requester) else {
            return Err(Denial::NotMember.into());
        };
        if !state.roles.contains_key(&input.role_id) {
            return Err(DatabaseError::missing("Role", &input.role_id.to_string()));
        }
        if !state.users.contains(&input.user_id) {
            return Err(DatabaseError::missing("User", &input.user_id.to_string()));
        }

        let action = WorkspaceAction::AddMember {
            user_id: input.user_id,
            role_id: input.role_id,
        };
        evaluate(&actor, owner_id, &action)?;

        if let Some(inviter) = input.invited_by {
            if !state.users.contains(&inviter) {
                return Err(DatabaseError::missing("User", &inviter.to_string()));
            }
        }
        let key = (input.workspace_id, input.user_id);
        if state.memberships.contains_key(&key) {
            return Err(DatabaseError::already_member());
        }

        let membership = Membership {
            id: Uuid::new_v4(),
            workspace_id: input.workspace_id,
            user_id: input.user_id,
            role_id: input.role_id,
            joined_at: Utc::now(),
            invited_by: input.invited_by,
        };
        let seq = state.seq();
        state.memberships.insert(
            key,
            Row {
                seq,
                value: membership.clone(),
            },
        );

        Ok(membership)
    }

    async fn update_user_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        patch: &UpdateMemberRole,
        requester: Uuid,
    ) -> Result<Membership> {
        let mut state = self.state.write().await;
        state.check_online()?;

        let not_found = || DatabaseError::not_found("Membership", &format!("{workspace_id}/{user_id}"));
        let current_role_id = match state.role_in(workspace_id, user_id) {
            Some(role_id) if state.membership_visible(workspace_id, user_id, requester) => role_id,
            _ => return Err(not_found()),
        };

        let action = WorkspaceAction::ChangeRole {
            user_id,
            current_role_id,
            new_role_id: patch.role_id,
        };
        match state.standing(workspace_id, requester) {
            Some((actor, owner_id)) => evaluate(&actor, owner_id, &action)?,
            None => return Err(Denial::NotMember.into()),
        }

        if !state.roles.contains_key(&patch.role_id) {
            return Err(DatabaseError::missing("Role", &patch.role_id.to_string()));
        }

        let row = state
            .memberships
            .get_mut(&(workspace_id, user_id))
            .ok_or_else(not_found)?;
        row.value.role_id = patch.role_id;

        Ok(row.value.clone())
    }

    async fn remove_user(&self, workspace_id: Uuid, user_id: Uuid, requester: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;

        let role_id = match state.role_in(workspace_id, user_id) {
            Some(role_id) if state.membership_visible(workspace_id, user_id, requester) => role_id,
            _ => {
                return Err(DatabaseError::not_found(
                    "Membership",
                    &format!("{workspace_id}/{user_id}"),
                ))
            }
        };

        let action = WorkspaceAction::RemoveMember { user_id, role_id };
        match state.standing(workspace_id, requester) {
            Some((actor, owner_id)) => evaluate(&actor, owner_id, &action)?,
            None => return Err(Denial::NotMember.into()),
        }

        state.memberships.remove(&(workspace_id, user_id));
        Ok(())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        requester: Uuid,
    ) -> Result<Option<Membership>> {
        let state = self.state.read().await;
        state.check_online()?;

        if !state.membership_visible(workspace_id, user_id, requester) {
            return Ok(None);
        }
        Ok(state
            .memberships
            .get(&(workspace_id, user_id))
            .map(|row| row.value.clone()))
    }

    async fn list_members(&self, workspace_id: Uuid, requester: Uuid) -> Result<Vec<Membership>> {
        let state = self.state.read().await;
        state.check_online()?;

        if state.role_in(workspace_id, requester).is_none() {
            return Ok(Vec::new());
        }

        let mut rows: Vec<&Row<Membership>> = state
            .memberships
            .values()
            .filter(|row| row.value.workspace_id == workspace_id)
            .collect();
        rows.sort_by_key(|row| row.seq);

        Ok(rows.into_iter().map(|row| row.value.clone()).collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryStorage {
    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_online()?;
        state.users.insert(user_id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.state.read().await.check_online()
    }
}
