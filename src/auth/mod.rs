//! The authenticator/session core: request metadata, the session
//! store and its janitor, JWT/refresh-token issuance, and the authenticator
//! that ties them together.

pub mod authenticator;
pub mod directory;
pub mod error;
pub mod request_meta;
pub mod session;
pub mod token;

pub use authenticator::{Authenticator, TokenTrinity};
pub use directory::{Argon2PasswordVerifier, GroupMembership, InMemoryUserDirectory, PasswordVerifier, User, UserDirectory};
pub use error::AuthError;
pub use request_meta::RequestMeta;
pub use session::{InMemorySessionStore, RevokedRecord, Session, SessionStore};
pub use token::{
    generate_opaque_token, AccessClaims, InMemoryRefreshTokenManager, RefreshTokenManager, RefreshTokenPayload,
    TokenManager,
};
