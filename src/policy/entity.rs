//! Policy object: identity, ownership, parent link, object binding,
//! flags, and the invariants over them.

use serde::{Deserialize, Serialize};

use crate::ids::{PolicyId, UserId};

use super::error::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicyFlags {
    pub inherit: bool,
    pub extend: bool,
    pub sealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    id: PolicyId,
    key: Option<String>,
    object_name: Option<String>,
    object_id: Option<String>,
    pub owner_id: UserId,
    pub parent_id: PolicyId,
    pub flags: PolicyFlags,
}

impl Policy {
    /// Builds a fresh, not-yet-persisted policy (`id` is `PolicyId::NIL`
    /// until the manager assigns one on create).
    pub fn new(
        key: Option<String>,
        object_name: Option<String>,
        object_id: Option<String>,
        owner_id: UserId,
        parent_id: PolicyId,
        flags: PolicyFlags,
    ) -> Self {
        Self {
            id: PolicyId::NIL,
            key: key.map(|k| k.trim().to_lowercase()),
            object_name,
            object_id,
            owner_id,
            parent_id,
            flags,
        }
    }

    pub fn id(&self) -> PolicyId {
        self.id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn object(&self) -> Option<(&str, &str)> {
        match (&self.object_name, &self.object_id) {
            (Some(n), Some(i)) => Some((n, i)),
            _ => None,
        }
    }

    /// Assigns the id on first persistence. Only the policy store/manager
    /// may call this, and only once.
    pub(crate) fn assign_id(&mut self, id: PolicyId) {
        self.id = id;
    }

    /// Fails once `id` is assigned — the key is append-only after that point.
    pub fn set_key(&mut self, key: String) -> Result<(), PolicyError> {
        if !self.id.is_nil() {
            return Err(PolicyError::ForbiddenChange);
        }
        self.key = Some(key.trim().to_lowercase());
        Ok(())
    }

    pub fn set_object_name(&mut self, object_name: String, object_id: String) -> Result<(), PolicyError> {
        if !self.id.is_nil() {
            return Err(PolicyError::ForbiddenChange);
        }
        self.object_name = Some(object_name);
        self.object_id = Some(object_id);
        Ok(())
    }

    pub fn is_inherited(&self) -> bool {
        self.flags.inherit
    }

    pub fn is_extended(&self) -> bool {
        self.flags.extend
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        !self.owner_id.is_nil() && self.owner_id == user_id
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_id.is_nil()
    }

    /// Enforces the structural invariants above. Does **not** check that `parent_id`
    /// actually resolves — that requires the manager's index and is
    /// checked by `PolicyManager::create`/`update`.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let has_key = self.key.as_deref().is_some_and(|k| !k.is_empty());
        let has_object = self.object_name.is_some() || self.object_id.is_some();

        if !has_key && !has_object {
            return Err(PolicyError::EmptyDesignators);
        }
        if let Some(k) = &self.key {
            if k.is_empty() {
                return Err(PolicyError::EmptyKey);
            }
        }
        match (&self.object_name, &self.object_id) {
            (Some(n), Some(_)) if n.is_empty() => return Err(PolicyError::EmptyObjectName),
            (Some(_), None) | (None, Some(_)) => return Err(PolicyError::EmptyObjectName),
            _ => {}
        }
        if self.flags.inherit && self.flags.extend {
            return Err(PolicyError::ForbiddenChange);
        }
        if (self.flags.inherit || self.flags.extend) && !self.has_parent() {
            return Err(PolicyError::NoParent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Policy {
        Policy::new(Some("base".into()), None, None, UserId::NIL, PolicyId::NIL, PolicyFlags::default())
    }

    #[test]
    fn requires_at_least_one_designator() {
        let p = Policy::new(None, None, None, UserId::NIL, PolicyId::NIL, PolicyFlags::default());
        assert_eq!(p.validate(), Err(PolicyError::EmptyDesignators));
    }

    #[test]
    fn object_name_and_id_must_both_be_present() {
        let p = Policy::new(None, Some("doc".into()), None, UserId::NIL, PolicyId::NIL, PolicyFlags::default());
        assert_eq!(p.validate(), Err(PolicyError::EmptyObjectName));
    }

    #[test]
    fn inherit_and_extend_are_mutually_exclusive() {
        let mut p = base();
        p.parent_id = PolicyId::new();
        p.flags = PolicyFlags { inherit: true, extend: true, sealed: false };
        assert_eq!(p.validate(), Err(PolicyError::ForbiddenChange));
    }

    #[test]
    fn inherit_requires_a_parent() {
        let mut p = base();
        p.flags = PolicyFlags { inherit: true, extend: false, sealed: false };
        assert_eq!(p.validate(), Err(PolicyError::NoParent));
    }

    #[test]
    fn key_is_append_only_after_id_assigned() {
        let mut p = base();
        p.assign_id(PolicyId::new());
        assert_eq!(p.set_key("new".into()), Err(PolicyError::ForbiddenChange));
    }

    #[test]
    fn owner_check_is_false_for_nil_owner() {
        let p = base();
        assert!(!p.is_owner(UserId::NIL));
        assert!(!p.is_owner(UserId::new()));
    }
}
