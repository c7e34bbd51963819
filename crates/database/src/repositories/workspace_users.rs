use super::explain;
use crate::connection::begin_as;
use crate::error::{DatabaseError, Result};
use sqlx::PgPool;
use uuid::Uuid;
use wsrbac_models::{AssignRole, Membership, UpdateMemberRole, WorkspaceAction};

const MEMBERSHIP_COLUMNS: &str = "id, workspace_id, user_id, role_id, joined_at, invited_by";

/// The membership ledger (`workspace_users`).
#[derive(Clone)]
pub struct WorkspaceUserRepository {
    pool: PgPool,
}

impl WorkspaceUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a user to a workspace with a role
    pub async fn assign(&self, input: &AssignRole, requester: Uuid) -> Result<Membership> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let inserted = sqlx::query_as::<_, Membership>(&format!(
            r#"
            INSERT INTO workspace_users (workspace_id, user_id, role_id, invited_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(input.workspace_id)
        .bind(input.user_id)
        .bind(input.role_id)
        .bind(input.invited_by)
        .fetch_one(&mut *tx)
        .await;

        let membership = match inserted {
            Ok(membership) => membership,
            Err(e) => {
                return Err(match DatabaseError::from(e) {
                    DatabaseError::PolicyViolation(_) => {
                        drop(tx);
                        self.explain_assign(input, requester).await?
                    }
                    other => other,
                });
            }
        };

        tx.commit().await?;
        Ok(membership)
    }

    /// The failed insert aborted its transaction, so look again in a new one.
    async fn explain_assign(&self, input: &AssignRole, requester: Uuid) -> Result<DatabaseError> {
        let mut tx = begin_as(&self.pool, requester).await?;
        let action = WorkspaceAction::AddMember {
            user_id: input.user_id,
            role_id: input.role_id,
        };

        let err = match explain::standing(&mut *tx, input.workspace_id, requester).await? {
            Some(standing) => explain::rejection(&standing, &action),
            None => explain::not_visible(),
        };

        tx.rollback().await?;
        Ok(err)
    }

    /// Change a member's role. Only `role_id` is writable.
    pub async fn update_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        patch: &UpdateMemberRole,
        requester: Uuid,
    ) -> Result<Membership> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let updated = sqlx::query_as::<_, Membership>(&format!(
            r#"
            UPDATE workspace_users
            SET role_id = $3
            WHERE workspace_id = $1 AND user_id = $2
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(workspace_id)
        .bind(user_id)
        .bind(patch.role_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(membership) = updated else {
            let err = match explain::visible_role(&mut *tx, workspace_id, user_id).await? {
                None => DatabaseError::not_found("Membership", &format!("{workspace_id}/{user_id}")),
                Some(current_role_id) => {
                    let action = WorkspaceAction::ChangeRole {
                        user_id,
                        current_role_id,
                        new_role_id: patch.role_id,
                    };
                    match explain::standing(&mut *tx, workspace_id, requester).await? {
                        Some(standing) => explain::rejection(&standing, &action),
                        None => explain::not_visible(),
                    }
                }
            };
            return Err(err);
        };

        tx.commit().await?;
        Ok(membership)
    }

    /// Remove a member. Members may always remove themselves, except the owner.
    pub async fn remove(&self, workspace_id: Uuid, user_id: Uuid, requester: Uuid) -> Result<()> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let result = sqlx::query("DELETE FROM workspace_users WHERE workspace_id = $1 AND user_id = $2")
            .bind(workspace_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let err = match explain::visible_role(&mut *tx, workspace_id, user_id).await? {
                None => DatabaseError::not_found("Membership", &format!("{workspace_id}/{user_id}")),
                Some(role_id) => {
                    let action = WorkspaceAction::RemoveMember { user_id, role_id };
                    match explain::standing(&mut *tx, workspace_id, requester).await? {
                        Some(standing) => explain::rejection(&standing, &action),
                        None => explain::not_visible(),
                    }
                }
            };
            return Err(err);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Find a membership visible to the requester
    pub async fn find(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        requester: Uuid,
    ) -> Result<Option<Membership>> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let membership = sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM workspace_users WHERE workspace_id = $1 AND user_id = $2"
        ))
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    /// List members of a workspace, oldest first. Non-members see nothing.
    pub async fn list(&self, workspace_id: Uuid, requester: Uuid) -> Result<Vec<Membership>> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let members = sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {MEMBERSHIP_COLUMNS}
            FROM workspace_users
            WHERE workspace_id = $1
            ORDER BY joined_at, id
            "#
        ))
        .bind(workspace_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(members)
    }
}
