//! Configuration: env-var driven settings under an `IDENTITY_` prefix.

use std::path::PathBuf;
use std::time::Duration;

/// Authenticator settings; the collaborator references these parameterize
/// are wired up separately in `main.rs`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub rsa_private_key_path: Option<PathBuf>,
    pub session_janitor_interval: Duration,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(env_u64("IDENTITY_ACCESS_TOKEN_TTL_SECS", 900)),
            refresh_token_ttl: Duration::from_secs(env_u64("IDENTITY_REFRESH_TOKEN_TTL_SECS", 86_400)),
            rsa_private_key_path: std::env::var("IDENTITY_RSA_PRIVATE_KEY_PATH").ok().map(PathBuf::from),
            session_janitor_interval: Duration::from_secs(env_u64("IDENTITY_SESSION_JANITOR_INTERVAL_SECS", 60)),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(86_400),
            rsa_private_key_path: None,
            session_janitor_interval: Duration::from_secs(60),
        }
    }
}

/// HTTP bind settings; the policy/auth core doesn't need this, but
/// `main.rs` does to be runnable end to end.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self { http_port: env_u64("IDENTITY_HTTP_PORT", 8080) as u16 }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_match_spec() {
        let cfg = AuthConfig::default();
        assert_eq!(cfg.access_token_ttl, Duration::from_secs(900));
        assert_eq!(cfg.refresh_token_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.session_janitor_interval, Duration::from_secs(60));
    }
}
