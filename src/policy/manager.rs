//! Policy Manager: the central registry. Owns one RW lock protecting
//! its three write-through indexes (`by_id`, `by_key`, and the per-policy
//! rosters); misses fall through to the store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ids::{GroupId, PolicyId, UserId};

use super::actor::{Actor, GroupKind};
use super::collaborators::GroupDirectory;
use super::entity::{Policy, PolicyFlags};
use super::error::PolicyError;
use super::rights::Right;
use super::roster::{Roster, RosterAction};
use super::store::{PolicyStore, RosterRecord};

struct Indexes {
    by_id: HashMap<PolicyId, Policy>,
    by_key: HashMap<String, PolicyId>,
    rosters: HashMap<PolicyId, Arc<Roster>>,
}

pub struct PolicyManager {
    store: Arc<dyn PolicyStore>,
    groups: Option<Arc<dyn GroupDirectory>>,
    indexes: RwLock<Indexes>,
}

impl PolicyManager {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            groups: None,
            indexes: RwLock::new(Indexes {
                by_id: HashMap::new(),
                by_key: HashMap::new(),
                rosters: HashMap::new(),
            }),
        }
    }

    pub fn with_group_directory(mut self, groups: Arc<dyn GroupDirectory>) -> Self {
        self.groups = Some(groups);
        self
    }

    // ---- 4.5.1 create ----

    pub async fn create(
        &self,
        key: Option<String>,
        owner_id: UserId,
        parent_id: PolicyId,
        object: Option<(String, String)>,
        flags: PolicyFlags,
    ) -> Result<Policy, PolicyError> {
        let (object_name, object_id) = match object {
            Some((n, i)) => (Some(n), Some(i)),
            None => (None, None),
        };
        let mut policy = Policy::new(key.clone(), object_name.clone(), object_id.clone(), owner_id, parent_id, flags);
        policy.validate()?;

        if let Some(k) = policy.key() {
            if self.fetch_by_key(k).await.is_ok() {
                return Err(PolicyError::PolicyKeyTaken);
            }
        }
        if let (Some(n), Some(i)) = (&object_name, &object_id) {
            if self.fetch_by_object(n, i).await.is_ok() {
                return Err(PolicyError::PolicyObjectConflict);
            }
        }
        if policy.has_parent() {
            self.get_policy(policy.parent_id).await.map_err(PolicyError::not_found_because)?;
        }

        policy.assign_id(PolicyId::new());
        let (policy, roster) = self.store.create_policy(policy, Roster::new()).await?;

        let mut idx = self.indexes.write();
        idx.by_id.insert(policy.id(), policy.clone());
        if let Some(k) = policy.key() {
            idx.by_key.insert(k.to_string(), policy.id());
        }
        idx.rosters.insert(policy.id(), Arc::new(roster));
        tracing::debug!(target: "policy", policy_id = %policy.id(), "policy created");
        Ok(policy)
    }

    // ---- 4.5.2 update ----

    pub async fn update(&self, policy: Policy) -> Result<(), PolicyError> {
        policy.validate()?;
        let current = self.get_policy(policy.id()).await?;
        if current.key() != policy.key() || current.object() != policy.object() {
            return Err(PolicyError::ForbiddenChange);
        }

        let roster = self.get_roster(policy.id()).await?;
        if let Err(err) = self.store.update_policy(&policy, &roster).await {
            tracing::error!(target: "policy", policy_id = %policy.id(), error = %err, "store update failed");
            return Err(err);
        }
        roster.clear_changes();
        self.indexes.write().by_id.insert(policy.id(), policy);
        Ok(())
    }

    // ---- 4.5.3 grants (Safety-Fuse Protocol) ----

    pub async fn grant_public_access(&self, policy_id: PolicyId, grantor: UserId, rights: Right) -> Result<(), PolicyError> {
        self.grant_access(policy_id, grantor, Actor::Everyone, rights).await
    }

    pub async fn grant_user_access(&self, policy_id: PolicyId, grantor: UserId, grantee: UserId, rights: Right) -> Result<(), PolicyError> {
        self.grant_access(policy_id, grantor, Actor::User(grantee), rights).await
    }

    pub async fn grant_role_access(&self, policy_id: PolicyId, grantor: UserId, grantee: GroupId, rights: Right) -> Result<(), PolicyError> {
        self.grant_access(policy_id, grantor, Actor::RoleGroup(grantee), rights).await
    }

    pub async fn grant_group_access(&self, policy_id: PolicyId, grantor: UserId, grantee: GroupId, rights: Right) -> Result<(), PolicyError> {
        self.grant_access(policy_id, grantor, Actor::Group(grantee), rights).await
    }

    pub async fn grant_access(&self, policy_id: PolicyId, grantor: UserId, grantee: Actor, rights: Right) -> Result<(), PolicyError> {
        let roster = self.get_roster(policy_id).await?;
        let outcome = self.stage_grant(&roster, policy_id, grantor, grantee, rights).await;
        if outcome.is_err() {
            roster.restore_backup();
        }
        outcome
    }

    async fn stage_grant(
        &self,
        roster: &Roster,
        policy_id: PolicyId,
        grantor: UserId,
        grantee: Actor,
        rights: Right,
    ) -> Result<(), PolicyError> {
        if grantor.is_nil() {
            return Err(PolicyError::ZeroGrantorId);
        }
        match grantee {
            Actor::User(uid) if uid.is_nil() => return Err(PolicyError::ZeroAssigneeId),
            Actor::Group(gid) if gid.is_nil() => return Err(PolicyError::ZeroGroupId),
            Actor::RoleGroup(gid) if gid.is_nil() => return Err(PolicyError::ZeroRoleId),
            _ => {}
        }
        if grantee == Actor::User(grantor) {
            return Err(PolicyError::SameActor);
        }

        let policy = self.get_policy(policy_id).await?;
        if !policy.is_owner(grantor) {
            let grantor_summary = self.summarized_user_access(&policy, grantor, roster);
            if !grantor_summary.has(Right::MANAGE_ACCESS | rights) {
                return Err(PolicyError::ExcessOfRights);
            }
        }

        self.check_group_kind(grantee)?;

        roster.change(RosterAction::Set, grantee, rights);
        tracing::debug!(target: "policy", policy_id = %policy_id, ?grantee, "access staged");
        Ok(())
    }

    fn check_group_kind(&self, grantee: Actor) -> Result<(), PolicyError> {
        let Some(groups) = &self.groups else { return Ok(()) };
        let (gid, expected) = match grantee {
            Actor::Group(gid) => (gid, GroupKind::Group),
            Actor::RoleGroup(gid) => (gid, GroupKind::Role),
            _ => return Ok(()),
        };
        match groups.group_info(gid) {
            Some(info) if info.kind == expected => Ok(()),
            _ => Err(PolicyError::AccessDenied),
        }
    }

    // ---- 4.5.4 revoke ----

    pub async fn revoke_access(&self, policy_id: PolicyId, grantor: UserId, grantee: Actor) -> Result<(), PolicyError> {
        let roster = self.get_roster(policy_id).await?;
        let outcome = self.stage_revoke(&roster, policy_id, grantor, grantee).await;
        if outcome.is_err() {
            roster.restore_backup();
        }
        outcome
    }

    async fn stage_revoke(&self, roster: &Roster, policy_id: PolicyId, grantor: UserId, grantee: Actor) -> Result<(), PolicyError> {
        if grantor.is_nil() {
            return Err(PolicyError::ZeroGrantorId);
        }
        match grantee {
            Actor::User(uid) if uid.is_nil() => return Err(PolicyError::ZeroAssigneeId),
            Actor::Group(gid) if gid.is_nil() => return Err(PolicyError::ZeroGroupId),
            Actor::RoleGroup(gid) if gid.is_nil() => return Err(PolicyError::ZeroRoleId),
            _ => {}
        }

        let policy = self.get_policy(policy_id).await?;
        if !policy.is_owner(grantor) {
            let grantor_summary = self.summarized_user_access(&policy, grantor, roster);
            if !grantor_summary.has(Right::MANAGE_ACCESS) {
                return Err(PolicyError::ExcessOfRights);
            }
        }

        match grantee {
            Actor::Everyone => roster.change(RosterAction::Set, Actor::Everyone, Right::NO_ACCESS),
            _ => roster.change(RosterAction::Unset, grantee, Right::NO_ACCESS),
        }
        tracing::debug!(target: "policy", policy_id = %policy_id, ?grantee, "access revoked");
        Ok(())
    }

    // ---- 4.5.5 access resolution ----

    pub async fn user_has_access(&self, policy_id: PolicyId, user_id: UserId, rights: Right) -> Result<bool, PolicyError> {
        if user_id.is_nil() {
            return Ok(false);
        }
        let mut current_id = policy_id;
        loop {
            let policy = self.get_policy(current_id).await?;
            if policy.is_owner(user_id) {
                return Ok(true);
            }
            if policy.has_parent() && policy.is_inherited() {
                current_id = policy.parent_id;
                continue;
            }

            let mut cr = Right::NO_ACCESS;
            if policy.has_parent() && policy.is_extended() {
                cr |= self.summarized_user_access_by_id(policy.parent_id, user_id).await?;
            }
            cr |= self.summarized_user_access_by_id(current_id, user_id).await?;
            return Ok(cr.has(rights));
        }
    }

    async fn summarized_user_access_by_id(&self, policy_id: PolicyId, user_id: UserId) -> Result<Right, PolicyError> {
        let policy = self.get_policy(policy_id).await?;
        let roster = self.get_roster(policy_id).await?;
        Ok(self.summarized_user_access(&policy, user_id, &roster))
    }

    fn summarized_user_access(&self, policy: &Policy, user_id: UserId, roster: &Roster) -> Right {
        let mut access = roster.everyone();
        if let Some(groups) = &self.groups {
            for g in groups.groups_of_user(user_id) {
                access |= self.group_access_in(roster, g.id, g.kind);
            }
        }
        if policy.is_owner(user_id) {
            access = Right::FULL_ACCESS;
        }
        access |= roster.lookup(Actor::User(user_id));
        access
    }

    fn group_access_in(&self, roster: &Roster, group_id: GroupId, kind: GroupKind) -> Right {
        let actor = match kind {
            GroupKind::Group => Actor::Group(group_id),
            GroupKind::Role => Actor::RoleGroup(group_id),
        };
        let direct = roster.lookup(actor);
        if !direct.is_empty() {
            return direct;
        }
        let Some(groups) = &self.groups else { return Right::NO_ACCESS };
        let Some(info) = groups.group_info(group_id) else { return Right::NO_ACCESS };
        match info.parent_id {
            Some(parent_id) => match groups.group_info(parent_id) {
                Some(parent_info) => self.group_access_in(roster, parent_id, parent_info.kind),
                None => Right::NO_ACCESS,
            },
            None => Right::NO_ACCESS,
        }
    }

    pub async fn has_public_rights(&self, policy_id: PolicyId, rights: Right) -> Result<bool, PolicyError> {
        let roster = self.get_roster(policy_id).await?;
        Ok(roster.everyone().has(rights))
    }

    pub async fn has_group_rights(&self, policy_id: PolicyId, group_id: GroupId, rights: Right) -> Result<bool, PolicyError> {
        let roster = self.get_roster(policy_id).await?;
        let kind = self
            .groups
            .as_ref()
            .and_then(|g| g.group_info(group_id))
            .map(|i| i.kind)
            .unwrap_or(GroupKind::Group);
        Ok(self.group_access_in(&roster, group_id, kind).has(rights))
    }

    // ---- 4.5.6 parent reassignment ----

    pub async fn set_parent(&self, policy_id: PolicyId, new_parent_id: Option<PolicyId>) -> Result<(), PolicyError> {
        let mut policy = self.get_policy(policy_id).await?;
        match new_parent_id {
            None => {
                policy.parent_id = PolicyId::NIL;
                policy.flags.inherit = false;
                policy.flags.extend = false;
            }
            Some(pid) => {
                self.get_policy(pid).await.map_err(PolicyError::not_found_because)?;
                policy.parent_id = pid;
            }
        }
        self.update(policy).await?;
        if let Some(roster) = self.indexes.read().rosters.get(&policy_id) {
            roster.invalidate_cache();
        }
        Ok(())
    }

    // ---- lookups (write-through over the store) ----

    pub async fn fetch_by_id(&self, id: PolicyId) -> Result<Policy, PolicyError> {
        self.get_policy(id).await
    }

    pub async fn fetch_by_key(&self, key: &str) -> Result<Policy, PolicyError> {
        if let Some(id) = self.indexes.read().by_key.get(key).copied() {
            return self.get_policy(id).await;
        }
        let policy = self.store.fetch_policy_by_key(key).await?;
        let mut idx = self.indexes.write();
        idx.by_key.insert(key.to_string(), policy.id());
        idx.by_id.insert(policy.id(), policy.clone());
        Ok(policy)
    }

    pub async fn fetch_by_object(&self, object_name: &str, object_id: &str) -> Result<Policy, PolicyError> {
        let policy = self.store.fetch_policy_by_object(object_name, object_id).await?;
        self.indexes.write().by_id.insert(policy.id(), policy.clone());
        Ok(policy)
    }

    async fn get_policy(&self, id: PolicyId) -> Result<Policy, PolicyError> {
        if let Some(p) = self.indexes.read().by_id.get(&id) {
            return Ok(p.clone());
        }
        let policy = self.store.fetch_policy_by_id(id).await?;
        self.indexes.write().by_id.insert(id, policy.clone());
        Ok(policy)
    }

    async fn get_roster(&self, id: PolicyId) -> Result<Arc<Roster>, PolicyError> {
        if let Some(r) = self.indexes.read().rosters.get(&id) {
            return Ok(r.clone());
        }
        let record = self.store.fetch_roster_by_policy_id(id).await?;
        let roster = Arc::new(match record {
            RosterRecord::Empty => Roster::new(),
            RosterRecord::Present(r) => r,
        });
        self.indexes.write().rosters.insert(id, roster.clone());
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::store::InMemoryPolicyStore;

    fn manager() -> PolicyManager {
        PolicyManager::new(Arc::new(InMemoryPolicyStore::new()))
    }

    #[tokio::test]
    async fn update_rejects_a_changed_key() {
        let mgr = manager();
        let owner = UserId::new();
        let p = mgr.create(Some("k1".into()), owner, PolicyId::NIL, None, PolicyFlags::default()).await.unwrap();

        let mut renamed = Policy::new(Some("k2".into()), None, None, owner, PolicyId::NIL, PolicyFlags::default());
        renamed.assign_id(p.id());
        assert_eq!(mgr.update(renamed).await, Err(PolicyError::ForbiddenChange));
    }

    #[tokio::test]
    async fn owner_always_has_full_access() {
        let mgr = manager();
        let owner = UserId::new();
        let p = mgr.create(Some("owned".into()), owner, PolicyId::NIL, None, PolicyFlags::default()).await.unwrap();
        assert!(mgr.user_has_access(p.id(), owner, Right::FULL_ACCESS).await.unwrap());
    }

    #[tokio::test]
    async fn set_parent_invalidates_cached_summaries() {
        let mgr = manager();
        let owner = UserId::new();
        let u = UserId::new();
        let parent = mgr.create(Some("parent".into()), owner, PolicyId::NIL, None, PolicyFlags::default()).await.unwrap();
        mgr.grant_user_access(parent.id(), owner, u, Right::VIEW).await.unwrap();
        mgr.update(parent.clone()).await.unwrap();

        let child = mgr.create(Some("child".into()), owner, PolicyId::NIL, None, PolicyFlags::default()).await.unwrap();
        assert!(!mgr.user_has_access(child.id(), u, Right::VIEW).await.unwrap());

        mgr.set_parent(child.id(), Some(parent.id())).await.unwrap();
        let mut updated = mgr.fetch_by_id(child.id()).await.unwrap();
        updated.flags.extend = true;
        mgr.update(updated).await.unwrap();

        assert!(mgr.user_has_access(child.id(), u, Right::VIEW).await.unwrap());
    }
}
