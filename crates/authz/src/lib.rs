pub mod error;
pub mod gate;
pub mod registry;
pub mod requester;
pub mod snapshot;

pub use error::{AuthzError, Result};
pub use gate::{AuthorizationGate, GateConfig};
pub use registry::RoleRegistry;
pub use requester::Requester;
pub use snapshot::{MembershipSnapshot, SnapshotCache};
