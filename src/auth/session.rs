//! Session/Token Store: multi-indexed session map, revoked-jti
//! blacklist, and the background janitor.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::ids::UserId;

use super::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub ip: IpAddr,
    pub user_agent: String,
    pub access_token_id: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedRecord {
    pub token_id: String,
    pub expire_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_revoked_access_token(&self, id: String, expire_at: DateTime<Utc>) -> Result<(), AuthError>;
    async fn is_revoked(&self, id: &str) -> bool;
    async fn delete_revoked(&self, id: &str);

    async fn put_session(&self, session: Session) -> Result<(), AuthError>;
    async fn get_session(&self, session_token: &str) -> Option<Session>;
    async fn get_session_by_access_token(&self, jti: &str) -> Option<Session>;
    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> Option<Session>;
    async fn delete_session(&self, session: &Session) -> Result<(), AuthError>;
}

#[derive(Default)]
struct Inner {
    revoked: HashMap<String, RevokedRecord>,
    by_session_token: HashMap<String, Session>,
    by_jti: HashMap<String, String>,
    by_refresh_token: HashMap<String, String>,
    /// Authoritative set for expiry GC; the other three
    /// maps are token-indexed views over the same rows and are pruned in
    /// lockstep.
    by_user_id: HashMap<UserId, HashMap<String, Session>>,
}

/// Default in-memory implementation. All four indexes are populated on
/// `put_session`, so revocation lookups by jti never miss a live session.
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
    janitor_started: AtomicBool,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
            janitor_started: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
        })
    }

    /// Spawns the background sweep loop as a cancellable task: a
    /// cooperatively-scheduled loop with cancellable sleeps, not an
    /// unstoppable OS thread. Returns `false` without spawning if a
    /// janitor is already running for this store.
    pub fn start_janitor(self: &Arc<Self>, interval: Duration) -> bool {
        if self.janitor_started.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "auth", "janitor already started for this store");
            return false;
        }
        let (tx, mut rx) = oneshot::channel();
        *self.shutdown_tx.lock() = Some(tx);

        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => store.sweep(),
                    _ = &mut rx => break,
                }
            }
        });
        true
    }

    pub fn stop_janitor(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        self.janitor_started.store(false, Ordering::SeqCst);
    }

    /// One sweep: drop expired revocation records, then drop expired
    /// sessions from the authoritative per-user map and prune the
    /// token-indexed views to match.
    fn sweep(&self) {
        let now = Utc::now();
        let mut inner = self.inner.write();

        let revoked_before = inner.revoked.len();
        inner.revoked.retain(|_, r| r.expire_at > now);
        let revoked_swept = revoked_before - inner.revoked.len();

        let mut expired_tokens = Vec::new();
        for sessions in inner.by_user_id.values_mut() {
            sessions.retain(|token, s| {
                let keep = s.expire_at > now;
                if !keep {
                    expired_tokens.push(token.clone());
                }
                keep
            });
        }
        inner.by_user_id.retain(|_, sessions| !sessions.is_empty());

        let sessions_swept = expired_tokens.len();
        for token in &expired_tokens {
            if let Some(s) = inner.by_session_token.remove(token) {
                inner.by_jti.remove(&s.access_token_id);
                inner.by_refresh_token.remove(&s.refresh_token);
            }
        }

        if revoked_swept > 0 || sessions_swept > 0 {
            tracing::debug!(target: "auth", revoked_swept, sessions_swept, "janitor sweep");
        }
    }
}

impl Drop for InMemorySessionStore {
    fn drop(&mut self) {
        self.stop_janitor();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put_revoked_access_token(&self, id: String, expire_at: DateTime<Utc>) -> Result<(), AuthError> {
        if id.is_empty() {
            return Err(AuthError::InvalidTokenID);
        }
        if expire_at <= Utc::now() {
            return Err(AuthError::InvalidExpirationTime);
        }
        self.inner.write().revoked.insert(id.clone(), RevokedRecord { token_id: id, expire_at });
        Ok(())
    }

    async fn is_revoked(&self, id: &str) -> bool {
        self.inner.read().revoked.contains_key(id)
    }

    async fn delete_revoked(&self, id: &str) {
        self.inner.write().revoked.remove(id);
    }

    async fn put_session(&self, session: Session) -> Result<(), AuthError> {
        let mut inner = self.inner.write();
        inner.by_jti.insert(session.access_token_id.clone(), session.token.clone());
        inner.by_refresh_token.insert(session.refresh_token.clone(), session.token.clone());
        inner
            .by_user_id
            .entry(session.user_id)
            .or_default()
            .insert(session.token.clone(), session.clone());
        inner.by_session_token.insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session(&self, session_token: &str) -> Option<Session> {
        self.inner.read().by_session_token.get(session_token).cloned()
    }

    async fn get_session_by_access_token(&self, jti: &str) -> Option<Session> {
        let inner = self.inner.read();
        let token = inner.by_jti.get(jti)?;
        inner.by_session_token.get(token).cloned()
    }

    async fn get_session_by_refresh_token(&self, refresh_token: &str) -> Option<Session> {
        let inner = self.inner.read();
        let token = inner.by_refresh_token.get(refresh_token)?;
        inner.by_session_token.get(token).cloned()
    }

    async fn delete_session(&self, session: &Session) -> Result<(), AuthError> {
        let mut inner = self.inner.write();
        inner.by_session_token.remove(&session.token);
        inner.by_jti.remove(&session.access_token_id);
        inner.by_refresh_token.remove(&session.refresh_token);
        if let Some(sessions) = inner.by_user_id.get_mut(&session.user_id) {
            sessions.remove(&session.token);
            if sessions.is_empty() {
                inner.by_user_id.remove(&session.user_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample_session() -> Session {
        Session {
            token: "tok1".into(),
            user_id: UserId::new(),
            ip: IpAddr::from([127, 0, 0, 1]),
            user_agent: "ua1".into(),
            access_token_id: "jti1".into(),
            refresh_token: "rt1".into(),
            created_at: Utc::now(),
            expire_at: Utc::now() + ChronoDuration::hours(1),
        }
    }

    #[tokio::test]
    async fn put_session_populates_all_indexes() {
        let store = InMemorySessionStore::new();
        let s = sample_session();
        store.put_session(s.clone()).await.unwrap();

        assert_eq!(store.get_session("tok1").await, Some(s.clone()));
        assert_eq!(store.get_session_by_access_token("jti1").await, Some(s.clone()));
        assert_eq!(store.get_session_by_refresh_token("rt1").await, Some(s));
    }

    #[tokio::test]
    async fn delete_session_removes_all_indexes() {
        let store = InMemorySessionStore::new();
        let s = sample_session();
        store.put_session(s.clone()).await.unwrap();
        store.delete_session(&s).await.unwrap();

        assert_eq!(store.get_session("tok1").await, None);
        assert_eq!(store.get_session_by_access_token("jti1").await, None);
        assert_eq!(store.get_session_by_refresh_token("rt1").await, None);
    }

    #[tokio::test]
    async fn revoked_lookup_round_trips() {
        let store = InMemorySessionStore::new();
        store.put_revoked_access_token("jti1".into(), Utc::now() + ChronoDuration::hours(1)).await.unwrap();
        assert!(store.is_revoked("jti1").await);
        store.delete_revoked("jti1").await;
        assert!(!store.is_revoked("jti1").await);
    }

    #[tokio::test]
    async fn janitor_sweeps_expired_sessions() {
        let store = InMemorySessionStore::new();
        let mut s = sample_session();
        s.expire_at = Utc::now() - ChronoDuration::seconds(1);
        store.put_session(s).await.unwrap();

        store.sweep();
        assert_eq!(store.get_session("tok1").await, None);
        assert_eq!(store.get_session_by_access_token("jti1").await, None);
    }

    #[tokio::test]
    async fn janitor_refuses_to_start_twice() {
        let store = InMemorySessionStore::new();
        assert!(store.start_janitor(Duration::from_secs(3600)));
        assert!(!store.start_janitor(Duration::from_secs(3600)));
        store.stop_janitor();
    }
}
