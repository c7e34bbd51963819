use super::explain;
use crate::connection::begin_as;
use crate::error::{DatabaseError, Result};
use sqlx::PgPool;
use uuid::Uuid;
use wsrbac_models::role::ids;
use wsrbac_models::{CreateWorkspace, Membership, UpdateWorkspace, Workspace, WorkspaceAction};

const WORKSPACE_COLUMNS: &str = "id, name, owner_id, created_at, updated_at";

#[derive(Clone)]
pub struct WorkspaceRepository {
    pool: PgPool,
}

impl WorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a workspace and enroll its owner with the owner role.
    ///
    /// Both rows are written in one transaction; the insert policy requires
    /// `owner_id` to be the requester.
    pub async fn create_with_owner(
        &self,
        input: &CreateWorkspace,
        requester: Uuid,
    ) -> Result<(Workspace, Membership)> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let workspace = sqlx::query_as::<_, Workspace>(&format!(
            r#"
            INSERT INTO workspaces (name, owner_id)
            VALUES ($1, $2)
            RETURNING {WORKSPACE_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(input.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::PolicyViolation(_) => DatabaseError::PolicyViolation(
                "a workspace can only be created with the requester as owner".to_string(),
            ),
            other => other,
        })?;

        let owner = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO workspace_users (workspace_id, user_id, role_id, invited_by)
            VALUES ($1, $2, $3, NULL)
            RETURNING id, workspace_id, user_id, role_id, joined_at, invited_by
            "#,
        )
        .bind(workspace.id)
        .bind(workspace.owner_id)
        .bind(ids::OWNER)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((workspace, owner))
    }

    /// Find a workspace visible to the requester
    pub async fn find_by_id(&self, id: Uuid, requester: Uuid) -> Result<Option<Workspace>> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let workspace = sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(workspace)
    }

    /// Workspaces `user_id` belongs to, limited to those the requester can see
    pub async fn list_by_user(&self, user_id: Uuid, requester: Uuid) -> Result<Vec<Workspace>> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let workspaces = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT w.id, w.name, w.owner_id, w.created_at, w.updated_at
            FROM workspaces w
            JOIN workspace_users wu ON wu.workspace_id = w.id
            WHERE wu.user_id = $1
            ORDER BY w.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(workspaces)
    }

    /// Rename a workspace. `owner_id` in the patch must match the stored
    /// value; the guard trigger enforces the same.
    pub async fn update(
        &self,
        id: Uuid,
        patch: &UpdateWorkspace,
        requester: Uuid,
    ) -> Result<Workspace> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let current = sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Workspace", &id.to_string()))?;

        if let Some(field) = patch.immutable_change(&current) {
            return Err(DatabaseError::immutable("workspace", field));
        }

        let updated = sqlx::query_as::<_, Workspace>(&format!(
            r#"
            UPDATE workspaces
            SET name = COALESCE($2, name),
                owner_id = COALESCE($3, owner_id)
            WHERE id = $1
            RETURNING {WORKSPACE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(patch.owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(workspace) = updated else {
            let err = match explain::standing(&mut *tx, id, requester).await? {
                Some(standing) => explain::rejection(&standing, &WorkspaceAction::Rename),
                None => DatabaseError::not_found("Workspace", &id.to_string()),
            };
            return Err(err);
        };

        tx.commit().await?;
        Ok(workspace)
    }

    /// Delete a workspace; memberships go with it through ON DELETE CASCADE
    pub async fn delete(&self, id: Uuid, requester: Uuid) -> Result<()> {
        let mut tx = begin_as(&self.pool, requester).await?;

        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let err = match explain::standing(&mut *tx, id, requester).await? {
                Some(standing) => explain::rejection(&standing, &WorkspaceAction::Delete),
                None => DatabaseError::not_found("Workspace", &id.to_string()),
            };
            return Err(err);
        }

        tx.commit().await?;
        Ok(())
    }
}
