//! Error taxonomy for the access-policy engine: validation, lookup, and
//! grant/revoke failures, plus the separate roster-error taxonomy below.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Carries the lookup failure that produced it when one is known (e.g.
    /// an unresolvable `parent_id` during `create`/`set_parent`), so the
    /// causal chain survives the fold into `PolicyNotFound`.
    #[error("policy not found")]
    PolicyNotFound(#[source] Option<Box<PolicyError>>),
    #[error("policy key already taken")]
    PolicyKeyTaken,
    #[error("policy object designator already bound to another policy")]
    PolicyObjectConflict,
    #[error("policy must have at least one designator (key or object)")]
    EmptyDesignators,
    #[error("key, object_name, or object_id cannot change on a persisted policy")]
    ForbiddenChange,
    #[error("inherit/extend flag requires a resolvable parent")]
    NoParent,
    #[error("key must not be empty once provided")]
    EmptyKey,
    #[error("object_name must not be empty once provided")]
    EmptyObjectName,

    #[error("access denied")]
    AccessDenied,
    #[error("grantor cannot grant rights exceeding their own")]
    ExcessOfRights,
    #[error("grantor id must not be nil")]
    ZeroGrantorId,
    #[error("grantee id must not be nil")]
    ZeroAssigneeId,
    #[error("grantor and grantee must not be the same actor")]
    SameActor,
    #[error("role group id must not be nil")]
    ZeroRoleId,
    #[error("group id must not be nil")]
    ZeroGroupId,
}

impl PolicyError {
    /// A bare not-found with no known cause.
    pub fn not_found() -> Self {
        PolicyError::PolicyNotFound(None)
    }

    /// Folds a lookup failure into `PolicyNotFound`, preserving it as the
    /// causal source.
    pub fn not_found_because(cause: PolicyError) -> Self {
        PolicyError::PolicyNotFound(Some(Box::new(cause)))
    }

    /// Wire-stable identifier.
    pub fn key(&self) -> &'static str {
        match self {
            PolicyError::PolicyNotFound(_) => "PolicyNotFound",
            PolicyError::PolicyKeyTaken => "PolicyKeyTaken",
            PolicyError::PolicyObjectConflict => "PolicyObjectConflict",
            PolicyError::EmptyDesignators => "AccessPolicyEmptyDesignators",
            PolicyError::ForbiddenChange => "ForbiddenChange",
            PolicyError::NoParent => "NoParent",
            PolicyError::EmptyKey => "EmptyKey",
            PolicyError::EmptyObjectName => "EmptyObjectName",
            PolicyError::AccessDenied => "AccessDenied",
            PolicyError::ExcessOfRights => "ExcessOfRights",
            PolicyError::ZeroGrantorId => "ZeroGrantorID",
            PolicyError::ZeroAssigneeId => "ZeroAssigneeID",
            PolicyError::SameActor => "SameActor",
            PolicyError::ZeroRoleId => "ZeroRoleID",
            PolicyError::ZeroGroupId => "ZeroGroupID",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            PolicyError::PolicyNotFound(_) => 404,
            PolicyError::PolicyKeyTaken | PolicyError::PolicyObjectConflict => 409,
            PolicyError::AccessDenied | PolicyError::ExcessOfRights => 403,
            _ => 400,
        }
    }
}

/// Error taxonomy for the per-policy roster.
///
/// `CacheMiss` is an internal sentinel the roster uses between its own
/// methods; it is never returned from a public `Roster` method and so has
/// no wire-stable identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    /// Carries the store-layer cause when the empty result came from a
    /// failed fetch rather than a genuinely row-less roster.
    #[error("roster has no rows")]
    EmptyRoster(#[source] Option<Box<RosterError>>),
    #[error("no backup snapshot to restore")]
    NoBackup,
}

impl RosterError {
    pub fn key(&self) -> &'static str {
        match self {
            RosterError::EmptyRoster(_) => "EmptyRoster",
            RosterError::NoBackup => "NoBackup",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            RosterError::EmptyRoster(_) => 404,
            RosterError::NoBackup => 409,
        }
    }
}
