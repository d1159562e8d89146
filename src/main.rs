use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use identity_core::auth::{
    Argon2PasswordVerifier, Authenticator, InMemoryRefreshTokenManager, InMemorySessionStore, InMemoryUserDirectory,
    TokenManager,
};
use identity_core::config::{AuthConfig, ServerConfig};
use identity_core::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")).unwrap();
    fmt().with_env_filter(filter).init();

    let auth_config = AuthConfig::from_env();
    let server_config = ServerConfig::from_env();

    let tokens = match &auth_config.rsa_private_key_path {
        Some(path) => TokenManager::from_pem_file(path)?,
        None => TokenManager::generate()?,
    };
    info!(target: "auth", fingerprint = tokens.fingerprint(), "signing key ready");

    let sessions = InMemorySessionStore::new();
    sessions.start_janitor(auth_config.session_janitor_interval);

    let authenticator = Arc::new(Authenticator::new(
        auth_config.access_token_ttl,
        auth_config.refresh_token_ttl,
        tokens,
        Arc::new(InMemoryRefreshTokenManager::new()),
        sessions,
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(Argon2PasswordVerifier::new()),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.http_port));
    info!(target: "auth", %addr, "identity-core starting");
    server::run(addr, AppState { authenticator }).await
}
