use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use identity_core::auth::{
    Argon2PasswordVerifier, AuthError, Authenticator, InMemoryRefreshTokenManager, InMemorySessionStore,
    InMemoryUserDirectory, PasswordVerifier, RequestMeta, TokenManager, User,
};
use identity_core::ids::UserId;

fn build_authenticator(users: Arc<InMemoryUserDirectory>) -> Authenticator {
    Authenticator::new(
        Duration::from_secs(900),
        Duration::from_secs(86_400),
        TokenManager::generate().unwrap(),
        Arc::new(InMemoryRefreshTokenManager::new()),
        InMemorySessionStore::new(),
        users,
        Arc::new(Argon2PasswordVerifier::new()),
    )
}

fn register_user(dir: &InMemoryUserDirectory, verifier: &Argon2PasswordVerifier, username: &str, password: &str) -> UserId {
    let id = UserId::new();
    dir.insert(User {
        id,
        username: username.to_string(),
        password_hash: verifier.hash(password).unwrap(),
        suspended: false,
        groups: vec![],
    });
    id
}

fn meta(ip: [u8; 4], ua: &str) -> RequestMeta {
    RequestMeta::new(IpAddr::from(ip), ua)
}

#[tokio::test]
async fn refresh_success_reuses_the_refresh_token() -> anyhow::Result<()> {
    let verifier = Argon2PasswordVerifier::new();
    let users = Arc::new(InMemoryUserDirectory::new());
    register_user(&users, &verifier, "alice", "hunter2");
    let auth = build_authenticator(users);

    let req = meta([10, 0, 0, 1], "ua1");
    let user = auth.authenticate("alice", "hunter2", &req).await?;
    let t1 = auth.generate_token_trinity(&user, &req).await?;

    let t2 = auth.refresh(&t1.refresh_token, &req).await?;
    assert_eq!(t2.refresh_token, t1.refresh_token);
    assert_ne!(t2.session_token, t1.session_token);
    assert_ne!(t2.access_token, t1.access_token);

    let reloaded = auth.user_from_token(&t2.access_token).await?;
    assert_eq!(reloaded.id, user.id);

    Ok(())
}

#[tokio::test]
async fn refresh_with_ip_mismatch_is_rejected_and_token_is_burned() -> anyhow::Result<()> {
    let verifier = Argon2PasswordVerifier::new();
    let users = Arc::new(InMemoryUserDirectory::new());
    register_user(&users, &verifier, "bob", "s3cret");
    let auth = build_authenticator(users);

    let signin_req = meta([10, 0, 0, 1], "ua1");
    let user = auth.authenticate("bob", "s3cret", &signin_req).await?;
    let t1 = auth.generate_token_trinity(&user, &signin_req).await?;

    let wrong_ip_req = meta([10, 0, 0, 2], "ua1");
    let result = auth.refresh(&t1.refresh_token, &wrong_ip_req).await;
    assert_eq!(result.err(), Some(AuthError::WrongIP));

    let retry = auth.refresh(&t1.refresh_token, &signin_req).await;
    assert_eq!(retry.err(), Some(AuthError::InvalidRefreshToken));

    Ok(())
}

#[tokio::test]
async fn session_destruction_checks_owner_then_agent_then_ip() -> anyhow::Result<()> {
    let verifier = Argon2PasswordVerifier::new();
    let users = Arc::new(InMemoryUserDirectory::new());
    let u1 = register_user(&users, &verifier, "carol", "pw1");
    let u2 = UserId::new();
    let auth = build_authenticator(users);

    let req = meta([10, 0, 0, 5], "ua1");
    let user = auth.authenticate("carol", "pw1", &req).await?;
    let trinity = auth.generate_token_trinity(&user, &req).await?;

    let wrong_user = auth.destroy_session(u2, &trinity.session_token, &req).await;
    assert_eq!(wrong_user.err(), Some(AuthError::WrongUser));

    let wrong_ip = meta([10, 0, 0, 9], "ua1");
    let wrong_ip_result = auth.destroy_session(u1, &trinity.session_token, &wrong_ip).await;
    assert_eq!(wrong_ip_result.err(), Some(AuthError::WrongIP));

    let wrong_agent = meta([10, 0, 0, 5], "other-agent");
    let wrong_agent_result = auth.destroy_session(u1, &trinity.session_token, &wrong_agent).await;
    assert_eq!(wrong_agent_result.err(), Some(AuthError::WrongUserAgent));

    auth.destroy_session(u1, &trinity.session_token, &req).await?;

    let claims_check = auth.user_from_token(&trinity.access_token).await;
    assert_eq!(claims_check.err(), Some(AuthError::InvalidAccessToken));

    Ok(())
}

#[tokio::test]
async fn suspended_user_cannot_sign_in() -> anyhow::Result<()> {
    let verifier = Argon2PasswordVerifier::new();
    let users = Arc::new(InMemoryUserDirectory::new());
    let id = UserId::new();
    users.insert(User {
        id,
        username: "dave".into(),
        password_hash: verifier.hash("whatever").unwrap(),
        suspended: true,
        groups: vec![],
    });
    let auth = build_authenticator(users);

    let req = meta([10, 0, 0, 1], "ua1");
    let result = auth.authenticate("dave", "whatever", &req).await;
    assert_eq!(result.err(), Some(AuthError::UserSuspended));

    Ok(())
}

#[tokio::test]
async fn empty_credentials_are_rejected_before_lookup() -> anyhow::Result<()> {
    let users = Arc::new(InMemoryUserDirectory::new());
    let auth = build_authenticator(users);
    let req = RequestMeta::absent();

    assert_eq!(auth.authenticate("", "x", &req).await.err(), Some(AuthError::EmptyUsername));
    assert_eq!(auth.authenticate("x", "", &req).await.err(), Some(AuthError::EmptyPassword));
    Ok(())
}
