//! Error taxonomy for the authenticator/session core.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("user is suspended")]
    UserSuspended,
    #[error("access token is invalid")]
    InvalidAccessToken,
    #[error("refresh token is invalid")]
    InvalidRefreshToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("request IP does not match the bound IP")]
    WrongIP,
    #[error("caller is not the session owner")]
    WrongUser,
    #[error("request user agent does not match the bound user agent")]
    WrongUserAgent,
    #[error("signing key is not configured")]
    NilPrivateKey,
    #[error("session is nil")]
    NilSession,
    /// Carries the store-layer cause when known, so the causal chain
    /// survives the fold into this variant.
    #[error("session not found")]
    SessionNotFound(#[source] Option<Box<AuthError>>),
    #[error("token id must not be nil")]
    InvalidTokenID,
    #[error("expiration time must be in the future")]
    InvalidExpirationTime,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must not be empty")]
    EmptyPassword,
}

impl AuthError {
    /// A bare session-not-found with no known cause.
    pub fn session_not_found() -> Self {
        AuthError::SessionNotFound(None)
    }

    /// Wire-stable identifier. Most variants are internal and
    /// keep a PascalCase key; the handful clients are expected to branch on
    /// get a stable snake_case wire string instead.
    pub fn key(&self) -> &'static str {
        match self {
            AuthError::AuthenticationFailed => "auth_failed",
            AuthError::UserSuspended => "user_suspended",
            AuthError::InvalidRefreshToken => "refresh_failed",
            AuthError::InvalidAccessToken => "InvalidAccessToken",
            AuthError::TokenExpired => "TokenExpired",
            AuthError::WrongIP => "WrongIP",
            AuthError::WrongUser => "WrongUser",
            AuthError::WrongUserAgent => "WrongUserAgent",
            AuthError::NilPrivateKey => "NilPrivateKey",
            AuthError::NilSession => "NilSession",
            AuthError::SessionNotFound(_) => "SessionNotFound",
            AuthError::InvalidTokenID => "InvalidTokenID",
            AuthError::InvalidExpirationTime => "InvalidExpirationTime",
            AuthError::EmptyUsername => "EmptyUsername",
            AuthError::EmptyPassword => "EmptyPassword",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::AuthenticationFailed
            | AuthError::UserSuspended
            | AuthError::InvalidAccessToken
            | AuthError::InvalidRefreshToken
            | AuthError::TokenExpired
            | AuthError::WrongIP
            | AuthError::WrongUser
            | AuthError::WrongUserAgent
            | AuthError::SessionNotFound(_) => 401,
            AuthError::NilPrivateKey
            | AuthError::NilSession
            | AuthError::InvalidTokenID
            | AuthError::InvalidExpirationTime => 500,
            AuthError::EmptyUsername | AuthError::EmptyPassword => 400,
        }
    }
}
