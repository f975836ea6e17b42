//! Redis-backed authorization session store.
//!
//! Sessions are stored under the configured store TTL and dropped by Redis
//! itself; `delete_expired` is therefore a no-op here. The session's own
//! `expires_at` still wins when stricter: reads re-check it and delete
//! sessions they find dead, exactly like the in-process store.
//!
//! A per-user set of authorization codes backs `find_by_user`. Its TTL is
//! refreshed on every save, so it lives as long as the user's newest
//! session; members whose session is gone are pruned on read.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use keyward_auth::config::SessionStoreConfig;
use keyward_auth::session::{AuthorizationSession, SessionStore};
use keyward_auth::{AuthError, AuthResult};
use redis::AsyncCommands;
use tracing::debug;

use crate::keys::{KeyScheme, Namespace};

/// Redis-backed session store for multi-node deployments.
#[derive(Debug)]
pub struct RedisSessionStore {
    pool: Pool,
    keys: KeyScheme,
    session_ttl: Duration,
}

impl RedisSessionStore {
    /// Creates a store over an existing connection pool.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the configuration is invalid
    /// (zero TTL or capacity, empty namespace).
    pub fn new(pool: Pool, config: &SessionStoreConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        Ok(Self {
            pool,
            keys: KeyScheme::new(Namespace::new(&config.namespace)?),
            session_ttl: config.session_ttl,
        })
    }

    async fn connection(&self) -> AuthResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| AuthError::storage(format!("Redis pool error: {e}")))
    }

    fn encode(session: &AuthorizationSession) -> AuthResult<String> {
        serde_json::to_string(session).map_err(|e| AuthError::serialization(e.to_string()))
    }

    fn decode(payload: &str) -> AuthResult<AuthorizationSession> {
        serde_json::from_str(payload).map_err(|e| AuthError::serialization(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &AuthorizationSession) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        let payload = Self::encode(session)?;
        let ttl_secs = self.session_ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(self.keys.session(&session.authorization_code), payload, ttl_secs)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        let user_key = self.keys.user_sessions(&session.user_id);
        let _: () = conn
            .sadd(&user_key, &session.authorization_code)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        // Refresh on every save so the set lives as long as the newest
        // session in it.
        let _: () = conn
            .expire(&user_key, ttl_secs as i64)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            client_id = %session.client_id,
            ttl_secs,
            "saved authorization session"
        );
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationSession>> {
        let mut conn = self.connection().await?;
        let session_key = self.keys.session(code);

        let payload: Option<String> = conn
            .get(&session_key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let session = Self::decode(&payload)?;
        if session.is_expired() {
            debug!(session_id = %session.session_id, "session expired (domain), deleting");
            let _: () = conn
                .del(&session_key)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            let _: () = conn
                .srem(self.keys.user_sessions(&session.user_id), code)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn find_by_user(&self, user_id: &str) -> AuthResult<Vec<AuthorizationSession>> {
        let mut conn = self.connection().await?;
        let user_key = self.keys.user_sessions(user_id);

        let codes: Vec<String> = conn
            .smembers(&user_key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut stale = Vec::new();
        for code in codes {
            let payload: Option<String> = conn
                .get(self.keys.session(&code))
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            match payload {
                // The session key already expired; only the set member is left.
                None => stale.push(code),
                Some(payload) => {
                    let session = Self::decode(&payload)?;
                    if session.is_expired() {
                        let _: () = conn
                            .del(self.keys.session(&code))
                            .await
                            .map_err(|e| AuthError::storage(e.to_string()))?;
                        stale.push(code);
                    } else if session.user_id == user_id {
                        sessions.push(session);
                    }
                }
            }
        }

        if !stale.is_empty() {
            debug!(user_id = %user_id, pruned = stale.len(), "pruning stale session index entries");
            let _: () = conn
                .srem(&user_key, &stale)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }

        Ok(sessions)
    }

    async fn delete_by_code(&self, code: &str) -> AuthResult<()> {
        let mut conn = self.connection().await?;
        let session_key = self.keys.session(code);

        // Fetch first so the user's index can be cleaned too.
        let payload: Option<String> = conn
            .get(&session_key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        let _: () = conn
            .del(&session_key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        if let Some(payload) = payload {
            let session = Self::decode(&payload)?;
            let _: () = conn
                .srem(self.keys.user_sessions(&session.user_id), code)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }

        debug!("deleted authorization session");
        Ok(())
    }

    async fn delete_expired(&self) -> AuthResult<u64> {
        // Redis drops sessions through key TTLs; there is nothing to scan.
        Ok(0)
    }
}
