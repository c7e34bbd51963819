//! Turning a silent row-level rejection into a typed error.
//!
//! Postgres reports a policy-filtered UPDATE or DELETE as "0 rows affected"
//! and a rejected INSERT as a bare 42501. Both are re-examined inside the
//! requester's own transaction, so the explanation only uses rows the
//! requester is allowed to see.

use crate::error::{DatabaseError, Result};
use sqlx::PgConnection;
use uuid::Uuid;
use wsrbac_models::{evaluate, Actor, Denial, WorkspaceAction};

/// The requester's standing in a visible workspace.
pub(crate) struct Standing {
    pub actor: Actor,
    pub owner_id: Uuid,
}

/// `None` when the workspace is invisible to the requester.
pub(crate) async fn standing(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    requester: Uuid,
) -> Result<Option<Standing>> {
    let owner: Option<(Uuid,)> = sqlx::query_as("SELECT owner_id FROM workspaces WHERE id = $1")
        .bind(workspace_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some((owner_id,)) = owner else {
        return Ok(None);
    };

    let role: Option<(Uuid,)> = sqlx::query_as(
        "SELECT role_id FROM workspace_users WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(requester)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Some(Standing {
        actor: Actor::new(requester, role.map(|(role_id,)| role_id)),
        owner_id,
    }))
}

/// Role currently held by `user_id`, if that membership is visible.
pub(crate) async fn visible_role(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Uuid>> {
    let role: Option<(Uuid,)> = sqlx::query_as(
        "SELECT role_id FROM workspace_users WHERE workspace_id = $1 AND user_id = $2",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(role.map(|(role_id,)| role_id))
}

/// The error to report once the store has refused `action`.
pub(crate) fn rejection(standing: &Standing, action: &WorkspaceAction) -> DatabaseError {
    match evaluate(&standing.actor, standing.owner_id, action) {
        Err(denial) => denial.into(),
        // Store and predicate disagree; the store wins.
        Ok(()) => DatabaseError::PolicyViolation(
            "row-level security policy rejected the operation".to_string(),
        ),
    }
}

pub(crate) fn not_visible() -> DatabaseError {
    Denial::NotMember.into()
}
