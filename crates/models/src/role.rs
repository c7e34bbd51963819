use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Identities of the system roles. They are fixed at deployment time and
/// seeded by the first migration, so code can refer to "the owner role"
/// without a lookup.
pub mod ids {
    use uuid::Uuid;

    pub const OWNER: Uuid = Uuid::from_u128(1);
    pub const ADMIN: Uuid = Uuid::from_u128(2);
    pub const MEMBER: Uuid = Uuid::from_u128(3);
}

/// The three platform-defined privilege levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Member,
    Admin,
    Owner,
}

impl SystemRole {
    pub const ALL: [SystemRole; 3] = [SystemRole::Owner, SystemRole::Admin, SystemRole::Member];

    pub const fn id(self) -> Uuid {
        match self {
            SystemRole::Owner => ids::OWNER,
            SystemRole::Admin => ids::ADMIN,
            SystemRole::Member => ids::MEMBER,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SystemRole::Owner => "owner",
            SystemRole::Admin => "admin",
            SystemRole::Member => "member",
        }
    }

    /// Privilege rank used by the authorization predicate (higher wins).
    pub const fn rank(self) -> u8 {
        match self {
            SystemRole::Owner => 3,
            SystemRole::Admin => 2,
            SystemRole::Member => 1,
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            SystemRole::Owner => "Full control of the workspace, including deletion",
            SystemRole::Admin => "Manages workspace settings and members",
            SystemRole::Member => "Works inside the workspace",
        }
    }

    pub fn from_id(id: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    /// Case-insensitive name lookup; surrounding whitespace is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role catalog entry (`roles` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub workspace_id: Option<Uuid>, // NULL for system roles
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Build the seeded row for a system role.
    pub fn seed(role: SystemRole, at: DateTime<Utc>) -> Self {
        Self {
            id: role.id(),
            name: role.name().to_string(),
            description: Some(role.default_description().to_string()),
            is_system: true,
            workspace_id: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Role patch. Only `description` is mutable; `name` and `is_system` exist so
/// that an attempt to change them can be detected and rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateRole {
    pub name: Option<String>,

    pub is_system: Option<bool>,

    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl UpdateRole {
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// First immutable column this patch would change, if any.
    pub fn immutable_change(&self, current: &Role) -> Option<&'static str> {
        if matches!(&self.name, Some(name) if *name != current.name) {
            return Some("name");
        }
        if matches!(self.is_system, Some(flag) if flag != current.is_system) {
            return Some("is_system");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_role_lookup_is_case_insensitive() {
        assert_eq!(SystemRole::from_name("OWNER"), Some(SystemRole::Owner));
        assert_eq!(SystemRole::from_name(" Admin "), Some(SystemRole::Admin));
        assert_eq!(SystemRole::from_name("member"), Some(SystemRole::Member));
        assert_eq!(SystemRole::from_name("viewer"), None);
    }

    #[test]
    fn test_system_role_ids_are_stable() {
        assert_eq!(
            SystemRole::Owner.id().to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
        for role in SystemRole::ALL {
            assert_eq!(SystemRole::from_id(role.id()), Some(role));
        }
        assert_eq!(SystemRole::from_id(Uuid::new_v4()), None);
    }

    #[test]
    fn test_rank_ordering() {
        assert!(SystemRole::Owner.rank() > SystemRole::Admin.rank());
        assert!(SystemRole::Admin.rank() > SystemRole::Member.rank());
        assert!(SystemRole::Owner > SystemRole::Member);
    }

    #[test]
    fn test_update_role_detects_immutable_changes() {
        let role = Role::seed(SystemRole::Admin, Utc::now());

        assert_eq!(UpdateRole::description("Runs things").immutable_change(&role), None);

        let rename = UpdateRole {
            name: Some("superuser".to_string()),
            ..Default::default()
        };
        assert_eq!(rename.immutable_change(&role), Some("name"));

        let flip = UpdateRole {
            is_system: Some(false),
            ..Default::default()
        };
        assert_eq!(flip.immutable_change(&role), Some("is_system"));

        // Restating the current values is not a change
        let same = UpdateRole {
            name: Some("admin".to_string()),
            is_system: Some(true),
            description: None,
        };
        assert_eq!(same.immutable_change(&role), None);
    }
}
