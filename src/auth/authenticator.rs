//! Authenticator: credential check, token trinity issuance, refresh
//! flow, and session teardown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ids::UserId;
use crate::policy::GroupKind;

use super::directory::{PasswordVerifier, User, UserDirectory};
use super::error::AuthError;
use super::request_meta::RequestMeta;
use super::session::{Session, SessionStore};
use super::token::{generate_opaque_token, AccessClaims, RefreshTokenManager, RefreshTokenPayload, TokenManager};

/// `{session_token, access_token, refresh_token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTrinity {
    pub session_token: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct Authenticator {
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    tokens: TokenManager,
    refresh: Arc<dyn RefreshTokenManager>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    passwords: Arc<dyn PasswordVerifier>,
}

impl Authenticator {
    pub fn new(
        access_token_ttl: Duration,
        refresh_token_ttl: Duration,
        tokens: TokenManager,
        refresh: Arc<dyn RefreshTokenManager>,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        passwords: Arc<dyn PasswordVerifier>,
    ) -> Self {
        Self { access_token_ttl, refresh_token_ttl, tokens, refresh, sessions, users, passwords }
    }

    pub async fn authenticate(&self, username: &str, password: &str, req: &RequestMeta) -> Result<User, AuthError> {
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let user = self.users.fetch_by_username(username).await.map_err(|_| AuthError::AuthenticationFailed)?;
        if user.suspended {
            tracing::warn!(target: "auth", %username, ip = %req.ip, "sign-in rejected: user suspended");
            return Err(AuthError::UserSuspended);
        }
        match self.passwords.verify(password, &user.password_hash) {
            Ok(()) => {
                tracing::info!(target: "auth", %username, ip = %req.ip, "sign-in succeeded");
                Ok(user)
            }
            Err(_) => {
                tracing::warn!(target: "auth", %username, ip = %req.ip, "sign-in rejected: bad credentials");
                Err(AuthError::AuthenticationFailed)
            }
        }
    }

    /// Short-circuits on the first request-binding mismatch: once one check
    /// fails the token is burned and no later check still runs.
    pub async fn authenticate_by_refresh_token(&self, token: &str, req: &RequestMeta) -> Result<User, AuthError> {
        let payload = self.refresh.parse(token).await?;
        let user = self.users.fetch_by_id(payload.uid).await.map_err(|_| AuthError::AuthenticationFailed)?;

        if payload.ip != req.ip {
            self.refresh.delete(token).await;
            tracing::warn!(target: "auth", user_id = %payload.uid, "refresh rejected: wrong ip");
            return Err(AuthError::WrongIP);
        }
        if payload.user_agent != req.user_agent {
            self.refresh.delete(token).await;
            tracing::warn!(target: "auth", user_id = %payload.uid, "refresh rejected: wrong user agent");
            return Err(AuthError::WrongUserAgent);
        }
        if user.suspended {
            self.refresh.delete(token).await;
            tracing::warn!(target: "auth", user_id = %payload.uid, "refresh rejected: user suspended");
            return Err(AuthError::UserSuspended);
        }
        Ok(user)
    }

    /// Mints a signed RS256 JWT. Returns `(jws, jti)`.
    pub fn generate_access_token(&self, user: &User) -> Result<(String, String), AuthError> {
        let mut gs = Vec::new();
        let mut rs = Vec::new();
        for membership in &user.groups {
            match membership.kind {
                GroupKind::Group => gs.push(membership.group_id.to_string()),
                GroupKind::Role => rs.push(membership.group_id.to_string()),
            }
        }

        let now = Utc::now();
        let exp = now + chrono::Duration::from_std(self.access_token_ttl).map_err(|_| AuthError::InvalidExpirationTime)?;
        let jti = Ulid::new().to_string();
        let claims = AccessClaims {
            uid: user.id,
            gs,
            rs,
            iss: "hometown".to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: jti.clone(),
        };
        let jws = self.tokens.sign(&claims)?;
        Ok((jws, jti))
    }

    pub async fn generate_refresh_token(&self, user: &User, req: &RequestMeta) -> Result<String, AuthError> {
        let payload = RefreshTokenPayload { uid: user.id, ip: req.ip, user_agent: req.user_agent.clone() };
        self.refresh.issue(payload, self.refresh_token_ttl).await
    }

    pub async fn create_session(
        &self,
        user: &User,
        req: &RequestMeta,
        access_token_id: String,
        refresh_token: String,
    ) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expire_at = now
            + chrono::Duration::from_std(self.refresh_token_ttl).map_err(|_| AuthError::InvalidExpirationTime)?;
        let session = Session {
            token: generate_opaque_token(24),
            user_id: user.id,
            ip: req.ip,
            user_agent: req.user_agent.clone(),
            access_token_id,
            refresh_token,
            created_at: now,
            expire_at,
        };
        self.sessions.put_session(session.clone()).await?;
        Ok(session)
    }

    pub async fn generate_token_trinity(&self, user: &User, req: &RequestMeta) -> Result<TokenTrinity, AuthError> {
        let (access_token, jti) = self.generate_access_token(user)?;
        let refresh_token = self.generate_refresh_token(user, req).await?;
        let session = self.create_session(user, req, jti, refresh_token.clone()).await?;
        tracing::info!(target: "auth", user_id = %user.id, "token trinity issued");
        Ok(TokenTrinity { session_token: session.token, access_token, refresh_token })
    }

    pub async fn user_from_token(&self, jws: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(jws)?;
        if self.sessions.is_revoked(&claims.jti).await {
            return Err(AuthError::InvalidAccessToken);
        }
        self.users.fetch_by_id(claims.uid).await.map_err(|_| AuthError::InvalidAccessToken)
    }

    pub async fn revoke_access_token(&self, jti: &str, expire_at: chrono::DateTime<Utc>) -> Result<(), AuthError> {
        self.sessions.put_revoked_access_token(jti.to_string(), expire_at).await
    }

    /// Owner match, then agent match, then IP match, in that order.
    pub async fn destroy_session(
        &self,
        destroyed_by: UserId,
        session_token: &str,
        req: &RequestMeta,
    ) -> Result<(), AuthError> {
        let session = self.sessions.get_session(session_token).await.ok_or_else(AuthError::session_not_found)?;

        if session.user_id != destroyed_by {
            tracing::warn!(target: "auth", user_id = %destroyed_by, session_owner = %session.user_id, "session destruction rejected: wrong user");
            return Err(AuthError::WrongUser);
        }
        if session.user_agent != req.user_agent {
            tracing::warn!(target: "auth", user_id = %destroyed_by, "session destruction rejected: wrong user agent");
            return Err(AuthError::WrongUserAgent);
        }
        if session.ip != req.ip {
            tracing::warn!(target: "auth", user_id = %destroyed_by, ip = %req.ip, "session destruction rejected: wrong ip");
            return Err(AuthError::WrongIP);
        }

        self.refresh.delete(&session.refresh_token).await;
        self.revoke_access_token(&session.access_token_id, session.expire_at).await?;
        self.sessions.delete_session(&session).await?;
        tracing::info!(target: "auth", user_id = %destroyed_by, "session destroyed");
        Ok(())
    }

    /// The external refresh flow's observable sequence: the refresh token is
    /// reused, only the session token and access token are reissued.
    pub async fn refresh(&self, refresh_token: &str, req: &RequestMeta) -> Result<TokenTrinity, AuthError> {
        let user = self.authenticate_by_refresh_token(refresh_token, req).await?;
        let (access_token, jti) = self.generate_access_token(&user)?;
        let session = self.create_session(&user, req, jti, refresh_token.to_string()).await?;
        tracing::info!(target: "auth", user_id = %user.id, "session refreshed");
        Ok(TokenTrinity { session_token: session.token, access_token, refresh_token: refresh_token.to_string() })
    }
}
