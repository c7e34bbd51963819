use crate::error::{not_found, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use wsrbac_models::Role;

/// GET /api/roles
pub async fn list_roles(State(state): State<Arc<AppState>>) -> Json<Vec<Role>> {
    Json(state.gate.list_roles())
}

/// GET /api/roles/:name
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Role>> {
    state
        .gate
        .role_by_name(&name)
        .map(Json)
        .ok_or_else(|| not_found("Role"))
}
