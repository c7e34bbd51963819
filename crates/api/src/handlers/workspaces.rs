use crate::error::{authz_error, not_found, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use wsrbac_models::{Capabilities, CreateWorkspace, Membership, UpdateWorkspace, Workspace};

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWorkspaceResponse {
    pub workspace: Workspace,
    pub membership: Membership,
}

#[derive(Debug, Deserialize)]
pub struct ListWorkspacesQuery {
    /// Defaults to the requester.
    pub user_id: Option<Uuid>,
}

/// Create a workspace owned by the caller
/// POST /api/workspaces
pub async fn create_workspace(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateWorkspaceRequest>,
) -> ApiResult<(StatusCode, Json<CreateWorkspaceResponse>)> {
    let (workspace, membership) = state
        .gate
        .create_workspace(
            auth_user.requester(),
            CreateWorkspace::new(request.name, auth_user.user_id),
        )
        .await
        .map_err(authz_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateWorkspaceResponse {
            workspace,
            membership,
        }),
    ))
}

/// GET /api/workspaces?user_id=
pub async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListWorkspacesQuery>,
) -> ApiResult<Json<Vec<Workspace>>> {
    let user_id = query.user_id.unwrap_or(auth_user.user_id);
    state
        .gate
        .list_workspaces_by_user(auth_user.requester(), user_id)
        .await
        .map(Json)
        .map_err(authz_error)
}

/// GET /api/workspaces/:id
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Workspace>> {
    state
        .gate
        .get_workspace(auth_user.requester(), id)
        .await
        .map_err(authz_error)?
        .map(Json)
        .ok_or_else(|| not_found("Workspace"))
}

/// PATCH /api/workspaces/:id
pub async fn update_workspace(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<UpdateWorkspace>,
) -> ApiResult<Json<Workspace>> {
    state
        .gate
        .update_workspace(auth_user.requester(), id, patch)
        .await
        .map(Json)
        .map_err(authz_error)
}

/// DELETE /api/workspaces/:id
pub async fn delete_workspace(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .gate
        .delete_workspace(auth_user.requester(), id)
        .await
        .map_err(authz_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/workspaces/:id/capabilities
pub async fn get_capabilities(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Capabilities>> {
    state
        .gate
        .capabilities(auth_user.requester(), id)
        .await
        .map(Json)
        .map_err(authz_error)
}
