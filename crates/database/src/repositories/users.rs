use crate::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Local mirror of identities issued by the identity provider.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a user id if it is not known yet
    pub async fn ensure(&self, user_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO app_users (id)
            VALUES ($1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(user_id = %user_id, "User mirrored");
        }

        Ok(())
    }
}
