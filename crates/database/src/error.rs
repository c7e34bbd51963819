use thiserror::Error;
use wsrbac_models::Denial;

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// SQLSTATE raised by guard triggers when an immutable column would change.
pub const IMMUTABLE_FIELD_SQLSTATE: &str = "WSR01";

/// SQLSTATE raised by guard triggers for owner protection.
pub const PROTECTED_ENTITY_SQLSTATE: &str = "WSR02";

/// Unique constraint on `workspace_users (workspace_id, user_id)`.
pub const MEMBERSHIP_UNIQUE_CONSTRAINT: &str = "workspace_users_workspace_user_key";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Already a member: {0}")]
    AlreadyMember(String),

    #[error("Referenced entity does not exist: {0}")]
    ForeignKeyViolation(String),

    #[error("Immutable field: {0}")]
    ImmutableField(String),

    #[error("Protected entity: {0}")]
    ProtectedEntity(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn already_member() -> Self {
        Self::AlreadyMember("user is already a member of this workspace".to_string())
    }

    pub fn missing(entity: &str, id: &str) -> Self {
        Self::ForeignKeyViolation(format!("{} {} does not exist", entity, id))
    }

    pub fn immutable(entity: &str, field: &str) -> Self {
        Self::ImmutableField(format!("{}.{} cannot be changed after creation", entity, field))
    }

    /// A unique violation. Only the membership key means "already a member".
    pub fn unique_violation(constraint: Option<&str>, message: String) -> Self {
        match constraint {
            Some(MEMBERSHIP_UNIQUE_CONSTRAINT) => Self::already_member(),
            _ => Self::DuplicateEntry(message),
        }
    }

    /// Connectivity problems, as opposed to answers from the store.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

impl From<Denial> for DatabaseError {
    fn from(denial: Denial) -> Self {
        if denial.is_protected() {
            Self::ProtectedEntity(denial.message().to_string())
        } else {
            Self::PolicyViolation(denial.message().to_string())
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => Self::unique_violation(db_err.constraint(), message),
                    Some("23503") | Some("23502") => Self::ForeignKeyViolation(message),
                    Some("42501") => Self::PolicyViolation(message),
                    Some("22001") | Some("22023") | Some("23514") => Self::InvalidInput(message),
                    Some(IMMUTABLE_FIELD_SQLSTATE) => Self::ImmutableField(message),
                    Some(PROTECTED_ENTITY_SQLSTATE) => Self::ProtectedEntity(message),
                    _ => Self::Internal(err.to_string()),
                }
            }
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::ConnectionFailed(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Internal(format!("Migration failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denials_map_to_distinct_kinds() {
        assert!(matches!(
            DatabaseError::from(Denial::OwnerProtected),
            DatabaseError::ProtectedEntity(_)
        ));
        assert!(matches!(
            DatabaseError::from(Denial::OwnerRoleReserved),
            DatabaseError::ProtectedEntity(_)
        ));
        assert!(matches!(
            DatabaseError::from(Denial::NotMember),
            DatabaseError::PolicyViolation(_)
        ));
    }

    #[test]
    fn test_only_the_membership_key_is_already_member() {
        assert!(matches!(
            DatabaseError::unique_violation(Some(MEMBERSHIP_UNIQUE_CONSTRAINT), String::new()),
            DatabaseError::AlreadyMember(_)
        ));
        assert!(matches!(
            DatabaseError::unique_violation(Some("roles_system_name_key"), "dup".to_string()),
            DatabaseError::DuplicateEntry(_)
        ));
        assert!(matches!(
            DatabaseError::unique_violation(None, "dup".to_string()),
            DatabaseError::DuplicateEntry(_)
        ));
    }

    #[test]
    fn test_pool_errors_are_infrastructure() {
        assert!(DatabaseError::from(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(!DatabaseError::from(sqlx::Error::RowNotFound).is_infrastructure());
    }
}
