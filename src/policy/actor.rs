//! Tagged actor variant: a closed enum used for plain `match` dispatch over
//! the kinds of principal a policy can grant rights to, rather than
//! branching on interface/trait-object types for `User`/`Group`/….

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, UserId};

/// The kind of actor a roster cell, or a directory-resolved group, carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Everyone,
    User,
    Group,
    RoleGroup,
}

/// A principal a policy grants rights to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Everyone,
    User(UserId),
    Group(GroupId),
    RoleGroup(GroupId),
}

impl Actor {
    pub fn kind(self) -> ActorKind {
        match self {
            Actor::Everyone => ActorKind::Everyone,
            Actor::User(_) => ActorKind::User,
            Actor::Group(_) => ActorKind::Group,
            Actor::RoleGroup(_) => ActorKind::RoleGroup,
        }
    }
}

/// The kind of a directory group, as distinguished by the group/role-group
/// split in `actor.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Group,
    Role,
}
