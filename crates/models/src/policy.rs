//! Workspace authorization predicate.
//!
//! `evaluate` is the single definition of who may do what inside a workspace.
//! The in-process gate and the in-memory storage engine both call it; the
//! Postgres row-level policies in `crates/database/migrations` mirror it rule
//! for rule. Keep the three in step.
//!
//! Rules:
//! - any member may view the workspace and list its members
//! - admin or higher may rename the workspace
//! - only the owner may delete it
//! - managing a member requires admin or higher, and neither the member's
//!   current role nor the granted role may outrank the requester
//! - the owner role is reserved for the workspace's `owner_id`
//! - the owner's membership can be neither removed nor changed
//! - nobody changes their own role; anybody but the owner may leave

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::role::{ids, SystemRole};

/// Rank of a requester without a membership.
pub const NON_MEMBER_RANK: u8 = 0;

/// Minimum rank needed to rename a workspace or manage its members.
pub const MANAGE_RANK: u8 = SystemRole::Admin.rank();

/// Privilege rank of a role id. Roles outside the system catalog carry
/// member-level privilege.
pub fn rank_of(role_id: Uuid) -> u8 {
    SystemRole::from_id(role_id)
        .map(SystemRole::rank)
        .unwrap_or(SystemRole::Member.rank())
}

/// The requesting identity as seen from one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    /// Role held in the workspace, `None` when not a member.
    pub role_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role_id: Option<Uuid>) -> Self {
        Self { user_id, role_id }
    }

    pub fn rank(&self) -> u8 {
        self.role_id.map(rank_of).unwrap_or(NON_MEMBER_RANK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    View,
    Rename,
    Delete,
    ListMembers,
    AddMember {
        user_id: Uuid,
        role_id: Uuid,
    },
    ChangeRole {
        user_id: Uuid,
        current_role_id: Uuid,
        new_role_id: Uuid,
    },
    RemoveMember {
        user_id: Uuid,
        role_id: Uuid,
    },
}

/// Why `evaluate` refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotMember,
    InsufficientPrivilege,
    NotOwner,
    OwnerProtected,
    OwnerRoleReserved,
    SelfRoleChange,
}

impl Denial {
    /// Protected-entity denials are reported separately from plain policy
    /// violations so the caller can explain them.
    pub fn is_protected(&self) -> bool {
        matches!(self, Denial::OwnerProtected | Denial::OwnerRoleReserved)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Denial::NotMember => "requester is not a member of this workspace",
            Denial::InsufficientPrivilege => {
                "requester's role does not allow this operation on this member"
            }
            Denial::NotOwner => "only the workspace owner may do this",
            Denial::OwnerProtected => {
                "the workspace owner cannot be removed or have their role changed"
            }
            Denial::OwnerRoleReserved => {
                "the owner role is reserved for the workspace owner"
            }
            Denial::SelfRoleChange => "members cannot change their own role",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Decide whether `actor` may perform `action` in the workspace owned by
/// `owner_id`.
pub fn evaluate(actor: &Actor, owner_id: Uuid, action: &WorkspaceAction) -> Result<(), Denial> {
    let rank = actor.rank();
    let is_owner = actor.user_id == owner_id;

    match *action {
        WorkspaceAction::View | WorkspaceAction::ListMembers => {
            if rank > NON_MEMBER_RANK || is_owner {
                Ok(())
            } else {
                Err(Denial::NotMember)
            }
        }
        WorkspaceAction::Rename => {
            require_member(rank)?;
            if rank >= MANAGE_RANK {
                Ok(())
            } else {
                Err(Denial::InsufficientPrivilege)
            }
        }
        WorkspaceAction::Delete => {
            if is_owner {
                return Ok(());
            }
            require_member(rank)?;
            Err(Denial::NotOwner)
        }
        WorkspaceAction::AddMember { user_id, role_id } => {
            if role_id == ids::OWNER {
                if user_id != owner_id {
                    return Err(Denial::OwnerRoleReserved);
                }
                // Owner enrollment at creation time.
                return if is_owner { Ok(()) } else { Err(Denial::NotOwner) };
            }
            require_member(rank)?;
            if rank < MANAGE_RANK || rank_of(role_id) > rank {
                return Err(Denial::InsufficientPrivilege);
            }
            Ok(())
        }
        WorkspaceAction::ChangeRole {
            user_id,
            current_role_id,
            new_role_id,
        } => {
            if user_id == owner_id {
                return Err(Denial::OwnerProtected);
            }
            if new_role_id == ids::OWNER {
                return Err(Denial::OwnerRoleReserved);
            }
            require_member(rank)?;
            if user_id == actor.user_id {
                return Err(Denial::SelfRoleChange);
            }
            if rank < MANAGE_RANK || rank_of(current_role_id) > rank || rank_of(new_role_id) > rank {
                return Err(Denial::InsufficientPrivilege);
            }
            Ok(())
        }
        WorkspaceAction::RemoveMember { user_id, role_id } => {
            if user_id == owner_id {
                return Err(Denial::OwnerProtected);
            }
            if user_id == actor.user_id {
                return Ok(());
            }
            require_member(rank)?;
            if rank < MANAGE_RANK || rank_of(role_id) > rank {
                return Err(Denial::InsufficientPrivilege);
            }
            Ok(())
        }
    }
}

fn require_member(rank: u8) -> Result<(), Denial> {
    if rank > NON_MEMBER_RANK {
        Ok(())
    } else {
        Err(Denial::NotMember)
    }
}

/// What the UI may offer a requester in one workspace. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_view: bool,
    pub can_rename: bool,
    pub can_delete: bool,
    pub can_manage_members: bool,
    pub can_leave: bool,
}

impl Capabilities {
    pub fn for_actor(actor: &Actor, owner_id: Uuid) -> Self {
        let allowed = |action: WorkspaceAction| evaluate(actor, owner_id, &action).is_ok();
        let rank = actor.rank();

        Self {
            can_view: allowed(WorkspaceAction::View),
            can_rename: allowed(WorkspaceAction::Rename),
            can_delete: allowed(WorkspaceAction::Delete),
            can_manage_members: rank >= MANAGE_RANK,
            can_leave: rank > NON_MEMBER_RANK && actor.user_id != owner_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        owner: Uuid,
        admin: Uuid,
        member: Uuid,
        outsider: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                owner: Uuid::new_v4(),
                admin: Uuid::new_v4(),
                member: Uuid::new_v4(),
                outsider: Uuid::new_v4(),
            }
        }

        fn actor(&self, user_id: Uuid) -> Actor {
            let role = if user_id == self.owner {
                Some(ids::OWNER)
            } else if user_id == self.admin {
                Some(ids::ADMIN)
            } else if user_id == self.member {
                Some(ids::MEMBER)
            } else {
                None
            };
            Actor::new(user_id, role)
        }

        fn check(&self, user_id: Uuid, action: WorkspaceAction) -> Result<(), Denial> {
            evaluate(&self.actor(user_id), self.owner, &action)
        }
    }

    #[test]
    fn test_view_requires_membership() {
        let f = Fixture::new();
        assert!(f.check(f.member, WorkspaceAction::View).is_ok());
        assert!(f.check(f.admin, WorkspaceAction::ListMembers).is_ok());
        assert_eq!(
            f.check(f.outsider, WorkspaceAction::View),
            Err(Denial::NotMember)
        );
    }

    #[test]
    fn test_rename_requires_admin() {
        let f = Fixture::new();
        assert!(f.check(f.owner, WorkspaceAction::Rename).is_ok());
        assert!(f.check(f.admin, WorkspaceAction::Rename).is_ok());
        assert_eq!(
            f.check(f.member, WorkspaceAction::Rename),
            Err(Denial::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_only_owner_deletes() {
        let f = Fixture::new();
        assert!(f.check(f.owner, WorkspaceAction::Delete).is_ok());
        assert_eq!(f.check(f.admin, WorkspaceAction::Delete), Err(Denial::NotOwner));
        assert_eq!(
            f.check(f.outsider, WorkspaceAction::Delete),
            Err(Denial::NotMember)
        );
    }

    #[test]
    fn test_add_member_cannot_escalate() {
        let f = Fixture::new();
        let newcomer = Uuid::new_v4();

        let grant = |role_id| WorkspaceAction::AddMember {
            user_id: newcomer,
            role_id,
        };

        assert!(f.check(f.owner, grant(ids::ADMIN)).is_ok());
        assert!(f.check(f.admin, grant(ids::ADMIN)).is_ok());
        assert!(f.check(f.admin, grant(ids::MEMBER)).is_ok());
        assert_eq!(
            f.check(f.member, grant(ids::MEMBER)),
            Err(Denial::InsufficientPrivilege)
        );
        assert_eq!(
            f.check(f.outsider, grant(ids::MEMBER)),
            Err(Denial::NotMember)
        );
        assert_eq!(
            f.check(f.owner, grant(ids::OWNER)),
            Err(Denial::OwnerRoleReserved)
        );
    }

    #[test]
    fn test_owner_enrollment_is_allowed_for_owner_only() {
        let f = Fixture::new();
        let enroll = WorkspaceAction::AddMember {
            user_id: f.owner,
            role_id: ids::OWNER,
        };

        // At creation time the owner has no membership yet.
        let bootstrapping = Actor::new(f.owner, None);
        assert!(evaluate(&bootstrapping, f.owner, &enroll).is_ok());
        assert_eq!(f.check(f.admin, enroll), Err(Denial::NotOwner));
    }

    #[test]
    fn test_change_role_rules() {
        let f = Fixture::new();
        let change = |user_id, current_role_id, new_role_id| WorkspaceAction::ChangeRole {
            user_id,
            current_role_id,
            new_role_id,
        };

        assert!(f
            .check(f.admin, change(f.member, ids::MEMBER, ids::ADMIN))
            .is_ok());
        assert_eq!(
            f.check(f.admin, change(f.owner, ids::OWNER, ids::MEMBER)),
            Err(Denial::OwnerProtected)
        );
        assert_eq!(
            f.check(f.owner, change(f.owner, ids::OWNER, ids::ADMIN)),
            Err(Denial::OwnerProtected)
        );
        assert_eq!(
            f.check(f.owner, change(f.admin, ids::ADMIN, ids::OWNER)),
            Err(Denial::OwnerRoleReserved)
        );
        assert_eq!(
            f.check(f.admin, change(f.admin, ids::ADMIN, ids::MEMBER)),
            Err(Denial::SelfRoleChange)
        );
        assert_eq!(
            f.check(f.member, change(f.admin, ids::ADMIN, ids::MEMBER)),
            Err(Denial::InsufficientPrivilege)
        );
    }

    #[test]
    fn test_remove_member_rules() {
        let f = Fixture::new();
        let remove = |user_id, role_id| WorkspaceAction::RemoveMember { user_id, role_id };

        assert_eq!(
            f.check(f.owner, remove(f.owner, ids::OWNER)),
            Err(Denial::OwnerProtected)
        );
        assert!(f.check(f.member, remove(f.member, ids::MEMBER)).is_ok());
        assert!(f.check(f.admin, remove(f.member, ids::MEMBER)).is_ok());
        assert_eq!(
            f.check(f.member, remove(f.admin, ids::ADMIN)),
            Err(Denial::InsufficientPrivilege)
        );
        assert_eq!(
            f.check(f.outsider, remove(f.member, ids::MEMBER)),
            Err(Denial::NotMember)
        );
    }

    #[test]
    fn test_custom_roles_rank_as_member() {
        assert_eq!(rank_of(Uuid::new_v4()), SystemRole::Member.rank());
        assert_eq!(rank_of(ids::ADMIN), MANAGE_RANK);
    }

    #[test]
    fn test_capabilities() {
        let f = Fixture::new();

        let owner = Capabilities::for_actor(&f.actor(f.owner), f.owner);
        assert!(owner.can_delete && owner.can_manage_members && !owner.can_leave);

        let member = Capabilities::for_actor(&f.actor(f.member), f.owner);
        assert!(member.can_view && member.can_leave);
        assert!(!member.can_rename && !member.can_manage_members && !member.can_delete);

        let outsider = Capabilities::for_actor(&f.actor(f.outsider), f.owner);
        assert_eq!(outsider, Capabilities::default());
    }
}
