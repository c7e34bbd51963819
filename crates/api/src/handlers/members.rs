use crate::error::{authz_error, not_found, ApiResult};
use crate::extract::ApiJson;
use crate::handlers::ErrorResponse;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use wsrbac_models::{AssignRole, Membership, UpdateMemberRole};

/// Add-member body. The role is given either by id or by system role name.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role_id: Option<Uuid>,
    pub role: Option<String>,
}

fn resolve_role(state: &AppState, request: &AddMemberRequest) -> ApiResult<Uuid> {
    match (request.role_id, request.role.as_deref()) {
        (Some(role_id), None) => Ok(role_id),
        (None, Some(name)) => state
            .gate
            .role_by_name(name)
            .map(|role| role.id)
            .ok_or_else(|| {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse::new(
                        "does_not_exist",
                        &format!("Role '{}' does not exist", name),
                    )),
                )
            }),
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "validation_failed",
                "Exactly one of role_id or role is required",
            )),
        )),
    }
}

/// GET /api/workspaces/:id/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Membership>>> {
    state
        .gate
        .list_members(auth_user.requester(), workspace_id)
        .await
        .map(Json)
        .map_err(authz_error)
}

/// POST /api/workspaces/:id/members
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    ApiJson(request): ApiJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    let role_id = resolve_role(&state, &request)?;
    let membership = state
        .gate
        .assign_role(
            auth_user.requester(),
            AssignRole {
                workspace_id,
                user_id: request.user_id,
                role_id,
                invited_by: Some(auth_user.user_id),
            },
        )
        .await
        .map_err(authz_error)?;

    Ok((StatusCode::CREATED, Json(membership)))
}

/// GET /api/workspaces/:id/members/:user_id
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Membership>> {
    state
        .gate
        .get_membership(auth_user.requester(), user_id, workspace_id)
        .await
        .map_err(authz_error)?
        .map(Json)
        .ok_or_else(|| not_found("Membership"))
}

/// PATCH /api/workspaces/:id/members/:user_id
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
    ApiJson(patch): ApiJson<UpdateMemberRole>,
) -> ApiResult<Json<Membership>> {
    state
        .gate
        .update_user_role(auth_user.requester(), workspace_id, user_id, patch)
        .await
        .map(Json)
        .map_err(authz_error)
}

/// DELETE /api/workspaces/:id/members/:user_id
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path((workspace_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .gate
        .remove_user(auth_user.requester(), workspace_id, user_id)
        .await
        .map_err(authz_error)?;

    Ok(StatusCode::NO_CONTENT)
}
