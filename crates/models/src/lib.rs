// Core modules
pub mod membership;
pub mod policy;
pub mod role;
pub mod workspace;

// Re-export commonly used types
pub use membership::{AssignRole, Membership, UpdateMemberRole};
pub use policy::{evaluate, Actor, Capabilities, Denial, WorkspaceAction};
pub use role::{Role, SystemRole, UpdateRole};
pub use workspace::{CreateWorkspace, UpdateWorkspace, Workspace};
