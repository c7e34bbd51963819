pub mod roles;
pub mod users;
pub mod workspace_users;
pub mod workspaces;

mod explain;
