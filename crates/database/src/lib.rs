pub mod connection;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repositories;
pub mod store;

pub use connection::{begin_as, Database, DatabaseConfig, AUTHENTICATED_ROLE};
pub use error::{DatabaseError, Result};
pub use memory::MemoryStorage;
pub use postgres::PgStorage;
pub use repositories::{
    roles::RoleRepository, users::UserRepository, workspace_users::WorkspaceUserRepository,
    workspaces::WorkspaceRepository,
};
pub use store::{MembershipStore, RoleStore, Storage, UserDirectory, WorkspaceStore};
