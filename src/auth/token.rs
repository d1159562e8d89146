//! JWT access-token signing/verification and the opaque refresh-token
//! collaborator.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use argon2::password_hash::rand_core::OsRng;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::UserId;

use super::error::AuthError;

/// `(jws_string, jti)` — `generate_access_token`'s return shape, flattened
/// into the claims plus the string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub uid: UserId,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub gs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rs: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Signs and verifies RS256 access tokens. Holds the keypair and a
/// SHA-256 fingerprint of the public key for safe-to-log identification.
/// Never log key material, only the fingerprint.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    fingerprint: String,
}

impl TokenManager {
    /// Generates a fresh RSA-2048 keypair, used when no key file is configured.
    pub fn generate() -> Result<Self, AuthError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).map_err(|_| AuthError::NilPrivateKey)?;
        Self::from_private_key(private_key)
    }

    /// Loads a PKCS#1 PEM-encoded RSA private key from disk
    /// (`IDENTITY_RSA_PRIVATE_KEY_PATH`).
    pub fn from_pem_file(path: &Path) -> Result<Self, AuthError> {
        let pem = std::fs::read_to_string(path).map_err(|_| AuthError::NilPrivateKey)?;
        let private_key = RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|_| AuthError::NilPrivateKey)?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, AuthError> {
        let public_key = private_key.to_public_key();

        let private_pem = private_key.to_pkcs1_pem(Default::default()).map_err(|_| AuthError::NilPrivateKey)?;
        let public_der = public_key.to_pkcs1_der().map_err(|_| AuthError::NilPrivateKey)?;

        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(|_| AuthError::NilPrivateKey)?;
        let decoding_key =
            DecodingKey::from_rsa_der(public_der.as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(public_der.as_bytes());
        let fingerprint = hex_encode(&hasher.finalize());

        Ok(Self { encoding_key, decoding_key, fingerprint })
    }

    /// SHA-256 fingerprint of the public key, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        let header = Header::new(Algorithm::RS256);
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|_| AuthError::NilPrivateKey)
    }

    /// Verifies signature and expiry, enforcing `alg == RS256`.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["hometown"]);
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidAccessToken)?;
        Ok(data.claims)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generates an opaque CSPRNG token, base64url-encoded with no padding.
/// Session tokens use 24 bytes; refresh tokens reuse the same generator
/// with their own byte count.
pub fn generate_opaque_token(num_bytes: usize) -> String {
    let mut buf = vec![0u8; num_bytes];
    getrandom::getrandom(&mut buf).expect("system RNG unavailable");
    URL_SAFE_NO_PAD.encode(buf)
}

/// `{uid, ip, user_agent}` — the refresh token's decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenPayload {
    pub uid: UserId,
    pub ip: IpAddr,
    pub user_agent: String,
}

/// The refresh-token collaborator: opaque carrier issuance, structural
/// validation, and deletion.
#[async_trait]
pub trait RefreshTokenManager: Send + Sync {
    async fn issue(&self, payload: RefreshTokenPayload, ttl: Duration) -> Result<String, AuthError>;
    async fn parse(&self, token: &str) -> Result<RefreshTokenPayload, AuthError>;
    async fn delete(&self, token: &str);
}

struct Entry {
    payload: RefreshTokenPayload,
    expire_at: DateTime<Utc>,
}

/// In-memory default: random-token-to-payload map, no persistence across
/// restarts.
#[derive(Default)]
pub struct InMemoryRefreshTokenManager {
    tokens: RwLock<HashMap<String, Entry>>,
}

impl InMemoryRefreshTokenManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenManager for InMemoryRefreshTokenManager {
    async fn issue(&self, payload: RefreshTokenPayload, ttl: Duration) -> Result<String, AuthError> {
        let token = generate_opaque_token(32);
        let expire_at = Utc::now() + chrono::Duration::from_std(ttl).map_err(|_| AuthError::InvalidExpirationTime)?;
        self.tokens.write().insert(token.clone(), Entry { payload, expire_at });
        Ok(token)
    }

    async fn parse(&self, token: &str) -> Result<RefreshTokenPayload, AuthError> {
        let tokens = self.tokens.read();
        let entry = tokens.get(token).ok_or(AuthError::InvalidRefreshToken)?;
        if entry.expire_at <= Utc::now() {
            return Err(AuthError::TokenExpired);
        }
        Ok(entry.payload.clone())
    }

    async fn delete(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips_claims() {
        let tm = TokenManager::generate().unwrap();
        let claims = AccessClaims {
            uid: UserId::new(),
            gs: vec!["eng".into()],
            rs: vec!["admin".into()],
            iss: "hometown".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 900,
            jti: "01ARZ3NDEKTSV4RRFFQ69G5FAV".into(),
        };
        let jws = tm.sign(&claims).unwrap();
        let verified = tm.verify(&jws).unwrap();
        assert_eq!(verified.uid, claims.uid);
        assert_eq!(verified.jti, claims.jti);
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let tm = TokenManager::generate().unwrap();
        let claims = AccessClaims {
            uid: UserId::new(),
            gs: vec![],
            rs: vec![],
            iss: "hometown".into(),
            iat: Utc::now().timestamp() - 1000,
            exp: Utc::now().timestamp() - 500,
            jti: "expired".into(),
        };
        let jws = tm.sign(&claims).unwrap();
        assert!(matches!(tm.verify(&jws), Err(AuthError::InvalidAccessToken)));
    }

    #[test]
    fn loads_a_pkcs1_pem_private_key_from_disk() {
        let original = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = original.to_pkcs1_pem(Default::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.pem");
        std::fs::write(&path, pem.as_bytes()).unwrap();

        let tm = TokenManager::from_pem_file(&path).unwrap();
        let claims = AccessClaims {
            uid: UserId::new(),
            gs: vec![],
            rs: vec![],
            iss: "hometown".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
            jti: "01ARZ3NDEKTSV4RRFFQ69G5FAV".into(),
        };
        let jws = tm.sign(&claims).unwrap();
        assert_eq!(tm.verify(&jws).unwrap().uid, claims.uid);
    }

    #[tokio::test]
    async fn refresh_token_parses_back_to_its_payload() {
        let mgr = InMemoryRefreshTokenManager::new();
        let payload = RefreshTokenPayload {
            uid: UserId::new(),
            ip: IpAddr::from([127, 0, 0, 1]),
            user_agent: "ua1".into(),
        };
        let token = mgr.issue(payload.clone(), Duration::from_secs(3600)).await.unwrap();
        assert_eq!(mgr.parse(&token).await.unwrap(), payload);
        mgr.delete(&token).await;
        assert_eq!(mgr.parse(&token).await, Err(AuthError::InvalidRefreshToken));
    }
}
