//! User-directory and password-verifier collaborators. The authenticator
//! never stores credentials itself; directory lookup and password hashing
//! are kept behind traits so the core stays storage-agnostic.

use std::collections::HashMap;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::ids::{GroupId, UserId};
use crate::policy::GroupKind;

use super::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub kind: GroupKind,
}

/// The directory collaborator's view of a user. Only the fields the core touches are named here.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub suspended: bool,
    pub groups: Vec<GroupMembership>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_by_username(&self, username: &str) -> Result<User, AuthError>;
    async fn fetch_by_id(&self, id: UserId) -> Result<User, AuthError>;
}

/// Password verification collaborator. Kept separate from `UserDirectory`
/// so a deployment can swap hashing schemes without touching directory
/// storage.
pub trait PasswordVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;
    fn verify(&self, password: &str, hash: &str) -> Result<(), AuthError>;
}

/// Argon2id-backed verifier, the scheme `password-hash`'s own test suite
/// exercises and the one this crate's dependency table already carries.
#[derive(Default)]
pub struct Argon2PasswordVerifier {
    argon2: Argon2<'static>,
}

impl Argon2PasswordVerifier {
    pub fn new() -> Self {
        Self { argon2: Argon2::default() }
    }
}

impl PasswordVerifier for Argon2PasswordVerifier {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|_| AuthError::EmptyPassword)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<(), AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| AuthError::AuthenticationFailed)?;
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::AuthenticationFailed)
    }
}

/// In-memory directory used by tests and standalone deployments.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    by_id: RwLock<HashMap<UserId, User>>,
    by_username: RwLock<HashMap<String, UserId>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.by_username.write().insert(user.username.clone(), user.id);
        self.by_id.write().insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn fetch_by_username(&self, username: &str) -> Result<User, AuthError> {
        let id = self.by_username.read().get(username).copied().ok_or(AuthError::AuthenticationFailed)?;
        self.fetch_by_id(id).await
    }

    async fn fetch_by_id(&self, id: UserId) -> Result<User, AuthError> {
        self.by_id.read().get(&id).cloned().ok_or(AuthError::AuthenticationFailed)
    }
}
