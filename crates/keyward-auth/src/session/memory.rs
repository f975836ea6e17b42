//! In-process authorization session store.
//!
//! A bounded TTL cache keyed by authorization code. Two expiration clocks
//! run independently: the store TTL set at construction, and the session's
//! own `expires_at`. The domain clock always wins when stricter — every
//! read re-checks it and lazily deletes sessions it finds dead, so a
//! session whose `expires_at` has passed is unreachable even while the
//! store entry is still live.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::debug;

use crate::AuthResult;
use crate::config::SessionStoreConfig;
use crate::error::AuthError;
use crate::session::AuthorizationSession;
use crate::session::store::SessionStore;

/// Bounded in-process session store.
///
/// Suitable for single-node deployments; multi-node deployments should use
/// the Redis-backed store from `keyward-auth-redis`, which shares the same
/// contract.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: Cache<String, AuthorizationSession>,
}

impl InMemorySessionStore {
    /// Creates a store from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the configuration is invalid
    /// (zero TTL or capacity, empty namespace).
    pub fn new(config: &SessionStoreConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let sessions = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.session_ttl)
            .eviction_listener(
                |_code: Arc<String>, session: AuthorizationSession, cause: RemovalCause| {
                    debug!(session_id = %session.session_id, ?cause, "session evicted");
                },
            )
            .build();

        Ok(Self { sessions })
    }

    /// Current number of sessions held, after flushing pending maintenance.
    pub async fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &AuthorizationSession) -> AuthResult<()> {
        self.sessions
            .insert(session.authorization_code.clone(), session.clone())
            .await;

        debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            client_id = %session.client_id,
            "saved authorization session"
        );
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationSession>> {
        let Some(session) = self.sessions.get(code).await else {
            return Ok(None);
        };

        if session.is_expired() {
            debug!(session_id = %session.session_id, "session expired (domain), deleting");
            self.sessions.invalidate(code).await;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn find_by_user(&self, user_id: &str) -> AuthResult<Vec<AuthorizationSession>> {
        let sessions: Vec<AuthorizationSession> = self
            .sessions
            .iter()
            .map(|(_, session)| session)
            .filter(|session| session.user_id == user_id && !session.is_expired())
            .collect();
        Ok(sessions)
    }

    async fn delete_by_code(&self, code: &str) -> AuthResult<()> {
        self.sessions.invalidate(code).await;
        debug!("deleted authorization session");
        Ok(())
    }

    async fn delete_expired(&self) -> AuthResult<u64> {
        self.sessions.run_pending_tasks().await;

        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_expired())
            .map(|(code, _)| code.as_ref().clone())
            .collect();

        let count = expired.len() as u64;
        for code in &expired {
            self.sessions.invalidate(code).await;
        }

        debug!(removed = count, "session cleanup completed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn test_config() -> SessionStoreConfig {
        SessionStoreConfig {
            session_ttl: Duration::from_secs(600),
            max_entries: 100,
            namespace: "test".to_string(),
        }
    }

    fn create_test_store() -> InMemorySessionStore {
        InMemorySessionStore::new(&test_config()).unwrap()
    }

    fn create_test_session(code: &str, user_id: &str) -> AuthorizationSession {
        AuthorizationSession::new(
            code,
            user_id,
            "client-1",
            "https://app.example.com/callback",
            Duration::from_secs(600),
        )
        .with_scope("openid")
    }

    #[tokio::test]
    async fn test_save_and_find_by_code() {
        let store = create_test_store();
        let session = create_test_session("code-1", "user-1");

        store.save(&session).await.unwrap();

        let found = store.find_by_code("code-1").await.unwrap();
        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn test_find_by_code_absent() {
        let store = create_test_store();
        assert_eq!(store.find_by_code("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_domain_expiry_beats_store_ttl() {
        let store = create_test_store();
        // Store TTL is 600s, but the session itself is already expired.
        let mut session = create_test_session("code-1", "user-1");
        session.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);

        store.save(&session).await.unwrap();

        assert_eq!(store.find_by_code("code-1").await.unwrap(), None);
        // The discovering read deleted the entry, not just hid it.
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_by_user_filters_user_and_expiry() {
        let store = create_test_store();
        store
            .save(&create_test_session("code-1", "user-1"))
            .await
            .unwrap();
        store
            .save(&create_test_session("code-2", "user-1"))
            .await
            .unwrap();
        store
            .save(&create_test_session("code-3", "user-2"))
            .await
            .unwrap();

        let mut dead = create_test_session("code-4", "user-1");
        dead.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        store.save(&dead).await.unwrap();

        let sessions = store.find_by_user("user-1").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.user_id == "user-1"));

        let sessions = store.find_by_user("user-3").await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_code() {
        let store = create_test_store();
        let session = create_test_session("code-1", "user-1");

        store.save(&session).await.unwrap();
        store.delete_by_code("code-1").await.unwrap();

        assert_eq!(store.find_by_code("code-1").await.unwrap(), None);
        // Deleting again is a no-op, not an error.
        store.delete_by_code("code-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_expired_counts_domain_expired() {
        let store = create_test_store();
        store
            .save(&create_test_session("code-1", "user-1"))
            .await
            .unwrap();

        let mut dead = create_test_session("code-2", "user-1");
        dead.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        store.save(&dead).await.unwrap();

        let removed = store.delete_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.session_count().await, 1);
        assert!(store.find_by_code("code-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_ttl_expires_sessions() {
        let config = SessionStoreConfig {
            session_ttl: Duration::from_secs(1),
            ..test_config()
        };
        let store = InMemorySessionStore::new(&config).unwrap();
        // Domain expiry far in the future; the 1 second store TTL applies.
        let session = create_test_session("code-1", "user-1");

        store.save(&session).await.unwrap();
        assert!(store.find_by_code("code-1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.find_by_code("code-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let config = SessionStoreConfig {
            max_entries: 2,
            ..test_config()
        };
        let store = InMemorySessionStore::new(&config).unwrap();

        for i in 0..5 {
            let session = create_test_session(&format!("code-{i}"), "user-1");
            store.save(&session).await.unwrap();
        }

        assert!(store.session_count().await <= 2);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = SessionStoreConfig {
            session_ttl: Duration::ZERO,
            ..test_config()
        };
        let err = InMemorySessionStore::new(&config).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
