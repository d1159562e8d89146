//! The group directory collaborator: the seam the policy engine plugs into
//! for resolving a user's group/role memberships and walking group lineage.

use crate::ids::{GroupId, UserId};

use super::actor::GroupKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRef {
    pub id: GroupId,
    pub kind: GroupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    pub kind: GroupKind,
    pub parent_id: Option<GroupId>,
}

/// Membership and lineage lookups used by `PolicyManager::summarized_user_access`
/// and `group_access`. Plain (non-async) trait: group membership is expected
/// to be served from a directory already resident in memory or behind its
/// own cache, not from a blocking I/O round trip, so it never needs to be a
/// suspension point.
pub trait GroupDirectory: Send + Sync {
    /// Every group of kind `Group` or `RoleGroup` the user is a direct
    /// member of.
    fn groups_of_user(&self, user_id: UserId) -> Vec<GroupRef>;

    /// A group's own declared kind and parent, used to walk the group
    /// lineage during `group_access`.
    fn group_info(&self, group_id: GroupId) -> Option<GroupInfo>;
}

/// Minimal in-memory directory used by tests and standalone deployments.
#[derive(Default)]
pub struct InMemoryGroupDirectory {
    memberships: parking_lot::RwLock<std::collections::HashMap<UserId, Vec<GroupRef>>>,
    groups: parking_lot::RwLock<std::collections::HashMap<GroupId, GroupInfo>>,
}

impl InMemoryGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_group(&self, id: GroupId, kind: GroupKind, parent_id: Option<GroupId>) {
        self.groups.write().insert(id, GroupInfo { kind, parent_id });
    }

    pub fn add_membership(&self, user_id: UserId, group: GroupRef) {
        self.memberships.write().entry(user_id).or_default().push(group);
    }
}

impl GroupDirectory for InMemoryGroupDirectory {
    fn groups_of_user(&self, user_id: UserId) -> Vec<GroupRef> {
        self.memberships.read().get(&user_id).cloned().unwrap_or_default()
    }

    fn group_info(&self, group_id: GroupId) -> Option<GroupInfo> {
        self.groups.read().get(&group_id).copied()
    }
}
