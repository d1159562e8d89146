//! Unified application error envelope and mapping helpers.
//!
//! Domain logic returns its own `thiserror` enums (`policy::PolicyError`,
//! `policy::RosterError`, `auth::AuthError`); this module only defines the
//! wire envelope those are folded into at the HTTP boundary, plus the
//! `From` impls that do the folding.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::auth::AuthError;
use crate::policy::{PolicyError, RosterError};

/// HTTP-facing error envelope: `{"scope":…, "key":…, "msg":…, "code":…}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub scope: String,
    pub key: String,
    pub msg: String,
    pub code: u16,
}

impl AppError {
    pub fn new(scope: impl Into<String>, key: impl Into<String>, msg: impl Into<String>, code: u16) -> Self {
        Self { scope: scope.into(), key: key.into(), msg: msg.into(), code }
    }

    pub fn http_status(&self) -> u16 {
        self.code
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.scope, self.key, self.msg)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        AppError::new("policy", err.key(), err.to_string(), err.http_status())
    }
}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        AppError::new("roster", err.key(), err.to_string(), err.http_status())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new("auth", err.key(), err.to_string(), err.http_status())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::new("internal", "internal", err.to_string(), 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_maps_to_envelope() {
        let app: AppError = PolicyError::not_found().into();
        assert_eq!(app.scope, "policy");
        assert_eq!(app.key, "PolicyNotFound");
        assert_eq!(app.code, 404);
    }

    #[test]
    fn auth_error_keeps_wire_stable_key() {
        let app: AppError = AuthError::UserSuspended.into();
        assert_eq!(app.key, "user_suspended");
        assert_eq!(app.code, 401);
    }
}
