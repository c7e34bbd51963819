use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Workspace (tenant boundary)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid, // immutable after creation
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create workspace request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWorkspace {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    pub owner_id: Uuid,
}

impl CreateWorkspace {
    pub fn new(name: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            name: name.into(),
            owner_id,
        }
    }

    /// Trim the name so that blank names fail the length check.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self
    }
}

/// Update workspace request. `owner_id` is accepted on the wire only so that
/// an attempted ownership change is rejected instead of silently ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateWorkspace {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub owner_id: Option<Uuid>,
}

impl UpdateWorkspace {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner_id: None,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|name| name.trim().to_string());
        self
    }

    pub fn immutable_change(&self, current: &Workspace) -> Option<&'static str> {
        match self.owner_id {
            Some(owner_id) if owner_id != current.owner_id => Some("owner_id"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(owner_id: Uuid) -> Workspace {
        let now = Utc::now();
        Workspace {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_blank_name_fails_validation() {
        let request = CreateWorkspace::new("   ", Uuid::new_v4()).normalized();
        assert!(request.validate().is_err());

        let request = CreateWorkspace::new("  Acme  ", Uuid::new_v4()).normalized();
        assert!(request.validate().is_ok());
        assert_eq!(request.name, "Acme");
    }

    #[test]
    fn test_long_name_fails_validation() {
        let request = UpdateWorkspace::rename("x".repeat(101)).normalized();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_owner_change_is_detected() {
        let owner = Uuid::new_v4();
        let current = workspace(owner);

        let same_owner = UpdateWorkspace {
            name: None,
            owner_id: Some(owner),
        };
        assert_eq!(same_owner.immutable_change(&current), None);

        let takeover = UpdateWorkspace {
            name: Some("Mine".to_string()),
            owner_id: Some(Uuid::new_v4()),
        };
        assert_eq!(takeover.immutable_change(&current), Some("owner_id"));
    }
}
