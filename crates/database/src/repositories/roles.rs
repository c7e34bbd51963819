use crate::error::{DatabaseError, Result};
use sqlx::PgPool;
use uuid::Uuid;
use wsrbac_models::{Role, UpdateRole};

/// The role catalog. Runs as the connecting (operator) role: the catalog is
/// global and the guard trigger protects it regardless of who asks.
#[derive(Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List the system roles, highest privilege first
    pub async fn list_system(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, is_system, workspace_id, created_at, updated_at
            FROM roles
            WHERE is_system
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// Find role by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, is_system, workspace_id, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// Find a system role by name, ignoring case and surrounding whitespace
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, is_system, workspace_id, created_at, updated_at
            FROM roles
            WHERE is_system AND lower(name) = lower(btrim($1))
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    /// Update the role description.
    ///
    /// `name` and `is_system` are written back through COALESCE so that a
    /// change that slips past the model check still reaches the guard trigger.
    pub async fn update(&self, id: Uuid, patch: &UpdateRole) -> Result<Role> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        if let Some(field) = patch.immutable_change(&current) {
            return Err(DatabaseError::immutable("role", field));
        }

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                is_system = COALESCE($3, is_system),
                description = COALESCE($4, description)
            WHERE id = $1
            RETURNING id, name, description, is_system, workspace_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.is_system)
        .bind(&patch.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Role", &id.to_string()))?;

        Ok(role)
    }
}
