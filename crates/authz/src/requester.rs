use crate::error::{AuthzError, Result};
use uuid::Uuid;

/// Identity attached to a request by the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    User(Uuid),
}

impl Requester {
    /// The verified user id, or `Unauthenticated`.
    pub fn authenticate(&self) -> Result<Uuid> {
        match self {
            Requester::User(id) => Ok(*id),
            Requester::Anonymous => Err(AuthzError::Unauthenticated(
                "a verified identity is required".to_string(),
            )),
        }
    }
}

impl From<Uuid> for Requester {
    fn from(id: Uuid) -> Self {
        Requester::User(id)
    }
}

impl From<Option<Uuid>> for Requester {
    fn from(id: Option<Uuid>) -> Self {
        id.map(Requester::User).unwrap_or(Requester::Anonymous)
    }
}
