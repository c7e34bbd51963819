use thiserror::Error;
use wsrbac_database::DatabaseError;
use wsrbac_models::Denial;

pub type Result<T> = std::result::Result<T, AuthzError>;

/// Caller-facing outcomes. Each storage failure kind keeps its own variant so
/// callers can tell them apart.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Already a member: {0}")]
    AlreadyMember(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Does not exist: {0}")]
    DoesNotExist(String),

    #[error("Immutable field: {0}")]
    ImmutableField(String),

    #[error("Cannot remove or demote owner: {0}")]
    ProtectedOwner(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Storage unavailable: {0}")]
    Infrastructure(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::Unauthenticated(_) => "unauthenticated",
            AuthzError::NotFound(_) => "not_found",
            AuthzError::Validation(_) => "validation_failed",
            AuthzError::AlreadyMember(_) => "already_member",
            AuthzError::Conflict(_) => "conflict",
            AuthzError::DoesNotExist(_) => "does_not_exist",
            AuthzError::ImmutableField(_) => "immutable_field",
            AuthzError::ProtectedOwner(_) => "protected_owner",
            AuthzError::PolicyViolation(_) => "policy_violation",
            AuthzError::Infrastructure(_) => "storage_unavailable",
            AuthzError::Cache(_) => "cache_error",
            AuthzError::Internal(_) => "internal_error",
        }
    }
}

impl From<DatabaseError> for AuthzError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionFailed(msg) => AuthzError::Infrastructure(msg),
            DatabaseError::NotFound(msg) => AuthzError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) => AuthzError::Conflict(msg),
            DatabaseError::AlreadyMember(msg) => AuthzError::AlreadyMember(msg),
            DatabaseError::ForeignKeyViolation(msg) => AuthzError::DoesNotExist(msg),
            DatabaseError::ImmutableField(msg) => AuthzError::ImmutableField(msg),
            DatabaseError::ProtectedEntity(msg) => AuthzError::ProtectedOwner(msg),
            DatabaseError::PolicyViolation(msg) => AuthzError::PolicyViolation(msg),
            DatabaseError::InvalidInput(msg) => AuthzError::Validation(msg),
            DatabaseError::Internal(msg) => AuthzError::Internal(msg),
        }
    }
}

impl From<Denial> for AuthzError {
    fn from(denial: Denial) -> Self {
        if denial.is_protected() {
            AuthzError::ProtectedOwner(denial.message().to_string())
        } else {
            AuthzError::PolicyViolation(denial.message().to_string())
        }
    }
}

impl From<validator::ValidationErrors> for AuthzError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthzError::Validation(err.to_string())
    }
}

impl From<wsrbac_cache::CacheError> for AuthzError {
    fn from(err: wsrbac_cache::CacheError) -> Self {
        AuthzError::Cache(err.to_string())
    }
}
