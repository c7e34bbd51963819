use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        // Role catalog
        .route("/api/roles", get(handlers::roles::list_roles))
        .route("/api/roles/:name", get(handlers::roles::get_role))
        // Workspaces
        .route(
            "/api/workspaces",
            get(handlers::workspaces::list_workspaces).post(handlers::workspaces::create_workspace),
        )
        .route(
            "/api/workspaces/:id",
            get(handlers::workspaces::get_workspace)
                .patch(handlers::workspaces::update_workspace)
                .delete(handlers::workspaces::delete_workspace),
        )
        .route(
            "/api/workspaces/:id/capabilities",
            get(handlers::workspaces::get_capabilities),
        )
        // Memberships
        .route(
            "/api/workspaces/:id/members",
            get(handlers::members::list_members).post(handlers::members::add_member),
        )
        .route(
            "/api/workspaces/:id/members/:user_id",
            get(handlers::members::get_member)
                .patch(handlers::members::update_member)
                .delete(handlers::members::remove_member),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .merge(protected)
        .with_state(state)
}
