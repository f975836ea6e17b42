//! Hybrid Redis + in-process grant record store.
//!
//! Redis is the tier of record: every grant record, token index entry, and
//! principal index lives there, bounded by the record's effective TTL. A
//! set of short-lived in-process caches accelerates reads; their staleness
//! is bounded by `local_ttl`, so cross-node changes converge within that
//! window while a node's own writes are visible to it immediately.
//!
//! Records and index entries are stored under the effective TTL (the
//! store-wide maximum capped by the soonest sub-token expiry), so Redis
//! itself drops dead credentials. The principal index is a sorted set
//! scored by save time, which preserves "most recently saved" ordering
//! across nodes; it expires a full `max_ttl` after the last save, which is
//! always at or after the last of its members.
//!
//! Remote failures are never swallowed: reads and writes alike surface
//! `AuthError::Storage` to the caller. A credential store that silently
//! degrades to "token not found" turns an infrastructure outage into mass
//! token invalidation, and one that degrades to "no error" on writes loses
//! revocations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use keyward_auth::config::GrantStoreConfig;
use keyward_auth::grant::{GrantRecord, GrantStore, GrantStoreStats, TokenKind};
use keyward_auth::{AuthError, AuthResult};
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use redis::AsyncCommands;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::keys::{KeyScheme, Namespace};

/// Expiration policy for locally cached records: the record's effective
/// TTL, capped by the local accelerator TTL.
struct LocalRecordExpiry {
    max_ttl: Duration,
    local_ttl: Duration,
}

impl LocalRecordExpiry {
    fn ttl_for(&self, record: &GrantRecord) -> Duration {
        record.effective_ttl(self.max_ttl).min(self.local_ttl)
    }
}

impl Expiry<String, GrantRecord> for LocalRecordExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &GrantRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl_for(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &GrantRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl_for(value))
    }
}

/// Redis-backed grant store with in-process read accelerators.
///
/// Shares the [`GrantStore`] contract with
/// [`InMemoryGrantStore`](keyward_auth::InMemoryGrantStore); use this one
/// when several server nodes must agree on which tokens are live.
#[derive(Debug)]
pub struct RedisGrantStore {
    pool: Pool,
    keys: KeyScheme,
    max_ttl: Duration,
    /// grant id -> record
    local_records: Cache<String, GrantRecord>,
    /// full token index key -> grant id
    local_tokens: Cache<String, String>,
    /// principal -> live grant ids, oldest first
    local_principals: Cache<String, Vec<String>>,
}

impl RedisGrantStore {
    /// Creates a store over an existing connection pool.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the configuration is invalid
    /// (zero TTL or capacity, empty namespace, local TTL above the maximum).
    pub fn new(pool: Pool, config: &GrantStoreConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let keys = KeyScheme::new(Namespace::new(&config.namespace)?);
        let local_ttl = config.effective_local_ttl();

        let local_records = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(LocalRecordExpiry {
                max_ttl: config.max_ttl,
                local_ttl,
            })
            .eviction_listener(
                |id: Arc<String>, _record: GrantRecord, cause: RemovalCause| {
                    debug!(grant_id = %id, ?cause, "local grant record evicted");
                },
            )
            .build();

        let local_tokens = Cache::builder()
            .max_capacity(config.max_entries.saturating_mul(4))
            .time_to_live(local_ttl)
            .build();

        let local_principals = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(local_ttl)
            .build();

        Ok(Self {
            pool,
            keys,
            max_ttl: config.max_ttl,
            local_records,
            local_tokens,
            local_principals,
        })
    }

    async fn connection(&self) -> AuthResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| AuthError::storage(format!("Redis pool error: {e}")))
    }

    fn encode(record: &GrantRecord) -> AuthResult<String> {
        serde_json::to_string(record).map_err(|e| AuthError::serialization(e.to_string()))
    }

    fn decode(payload: &str) -> AuthResult<GrantRecord> {
        serde_json::from_str(payload).map_err(|e| AuthError::serialization(e.to_string()))
    }

    async fn fetch_record(
        &self,
        conn: &mut Connection,
        grant_id: &str,
    ) -> AuthResult<Option<GrantRecord>> {
        let payload: Option<String> = conn
            .get(self.keys.grant(grant_id))
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        payload.as_deref().map(Self::decode).transpose()
    }

    /// Unindexes token values that the new revision of a record rotated out:
    /// any kind present in both revisions with a changed value.
    async fn remove_stale_indexes(
        &self,
        conn: &mut Connection,
        old: &GrantRecord,
        new: &GrantRecord,
    ) -> AuthResult<()> {
        for kind in TokenKind::ALL {
            let (Some(old_token), Some(new_token)) = (old.token(kind), new.token(kind)) else {
                continue;
            };
            if old_token.value != new_token.value {
                debug!(grant_id = %old.id, kind = %kind, "unindexing rotated token value");
                let index_key = self.keys.token_index(kind, &old_token.value);
                let _: () = conn
                    .del(&index_key)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?;
                self.local_tokens.invalidate(&index_key).await;
            }
        }
        Ok(())
    }

    /// Diagnostic counts for this node's accelerator tier, after flushing
    /// pending cache maintenance. Redis-side counts are not included.
    pub async fn local_stats(&self) -> GrantStoreStats {
        self.local_records.run_pending_tasks().await;
        self.local_tokens.run_pending_tasks().await;
        self.local_principals.run_pending_tasks().await;
        GrantStoreStats {
            records: self.local_records.entry_count(),
            token_indices: self.local_tokens.entry_count(),
            principals: self.local_principals.entry_count(),
        }
    }
}

#[async_trait]
impl GrantStore for RedisGrantStore {
    async fn save(&self, record: &GrantRecord) -> AuthResult<()> {
        let ttl = record.effective_ttl(self.max_ttl);
        if ttl.is_zero() {
            // Every expiring sub-token is already past expiry. Redis rejects
            // a zero expiry, and the record would be dead on arrival anyway;
            // drop whatever an earlier save left behind instead.
            debug!(grant_id = %record.id, "record expired on arrival, removing instead of saving");
            return self.remove(record).await;
        }
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.connection().await?;

        // Rotation cleanup: a re-save with a changed value for the same
        // token kind must stop the old value from resolving.
        let existing = match self.local_records.get(&record.id).await {
            Some(existing) => Some(existing),
            None => self.fetch_record(&mut conn, &record.id).await?,
        };
        if let Some(existing) = existing {
            self.remove_stale_indexes(&mut conn, &existing, record).await?;
        }

        let payload = Self::encode(record)?;
        let _: () = conn
            .set_ex(self.keys.grant(&record.id), payload, ttl_secs)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        self.local_records
            .insert(record.id.clone(), record.clone())
            .await;

        for token in &record.tokens {
            let index_key = self.keys.token_index(token.kind, &token.value);
            let _: () = conn
                .set_ex(&index_key, &record.id, ttl_secs)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            self.local_tokens.insert(index_key, record.id.clone()).await;
        }

        let principal_key = self.keys.principal_index(&record.principal);
        let score = OffsetDateTime::now_utc().unix_timestamp_nanos() as f64;
        let _: () = conn
            .zadd(&principal_key, &record.id, score)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        // The set must outlive every member record; max_ttl from the most
        // recent save always does.
        let _: () = conn
            .expire(&principal_key, self.max_ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        // The snapshot is rebuilt from Redis on the next principal read.
        self.local_principals.invalidate(&record.principal).await;

        debug!(
            grant_id = %record.id,
            principal = %record.principal,
            tokens = record.tokens.len(),
            ttl_secs,
            "saved grant record"
        );
        Ok(())
    }

    async fn remove(&self, record: &GrantRecord) -> AuthResult<()> {
        let mut conn = self.connection().await?;

        let mut doomed = vec![self.keys.grant(&record.id)];
        doomed.extend(
            record
                .tokens
                .iter()
                .map(|t| self.keys.token_index(t.kind, &t.value)),
        );
        let _: () = conn
            .del(&doomed)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        self.local_records.invalidate(&record.id).await;
        for index_key in doomed.iter().skip(1) {
            self.local_tokens.invalidate(index_key).await;
        }

        let principal_key = self.keys.principal_index(&record.principal);
        let _: () = conn
            .zrem(&principal_key, &record.id)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        self.local_principals.invalidate(&record.principal).await;

        debug!(grant_id = %record.id, "removed grant record");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<GrantRecord>> {
        if let Some(record) = self.local_records.get(id).await {
            return Ok(Some(record));
        }

        let mut conn = self.connection().await?;
        let Some(record) = self.fetch_record(&mut conn, id).await? else {
            return Ok(None);
        };
        self.local_records
            .insert(id.to_string(), record.clone())
            .await;
        Ok(Some(record))
    }

    async fn find_by_token(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> AuthResult<Option<GrantRecord>> {
        let index_key = self.keys.token_index(kind, value);

        let mut from_remote = false;
        let grant_id = match self.local_tokens.get(&index_key).await {
            Some(id) => Some(id),
            None => {
                from_remote = true;
                let mut conn = self.connection().await?;
                conn.get(&index_key)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?
            }
        };
        let Some(grant_id) = grant_id else {
            return Ok(None);
        };

        if let Some(record) = self.find_by_id(&grant_id).await? {
            if from_remote {
                self.local_tokens.insert(index_key, grant_id).await;
            }
            return Ok(Some(record));
        }

        // The index entry survived its record. Heal both tiers.
        warn!(grant_id = %grant_id, kind = %kind, "dropping orphaned token index entry");
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(&index_key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        self.local_tokens.invalidate(&index_key).await;
        Ok(None)
    }

    async fn find_by_principal(&self, principal: &str) -> AuthResult<Option<GrantRecord>> {
        let mut records = self.find_all_by_principal(principal).await?;
        Ok(records.pop())
    }

    async fn find_all_by_principal(&self, principal: &str) -> AuthResult<Vec<GrantRecord>> {
        let principal_key = self.keys.principal_index(principal);

        let (ids, from_remote) = match self.local_principals.get(principal).await {
            Some(ids) => (ids, false),
            None => {
                let mut conn = self.connection().await?;
                let ids: Vec<String> = conn
                    .zrange(&principal_key, 0, -1)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?;
                (ids, true)
            }
        };

        let mut records = Vec::with_capacity(ids.len());
        let mut live = Vec::with_capacity(ids.len());
        let mut dead = Vec::new();
        for id in ids {
            match self.find_by_id(&id).await? {
                Some(record) => {
                    records.push(record);
                    live.push(id);
                }
                None => dead.push(id),
            }
        }

        if !dead.is_empty() {
            debug!(principal = %principal, pruned = dead.len(), "pruning dead principal index entries");
            let mut conn = self.connection().await?;
            let _: () = conn
                .zrem(&principal_key, &dead)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }
        // Only a snapshot built from Redis is cached; refreshing a snapshot
        // from itself would extend its life past the staleness bound.
        if from_remote {
            self.local_principals
                .insert(principal.to_string(), live)
                .await;
        }

        Ok(records)
    }

    async fn find_grant_ids_by_principal(&self, principal: &str) -> AuthResult<Vec<String>> {
        let principal_key = self.keys.principal_index(principal);

        let ids: Vec<String> = match self.local_principals.get(principal).await {
            Some(ids) => ids,
            None => {
                let mut conn = self.connection().await?;
                conn.zrange(&principal_key, 0, -1)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?
            }
        };
        if ids.is_empty() {
            return Ok(ids);
        }

        let mut conn = self.connection().await?;
        let mut live = Vec::with_capacity(ids.len());
        let mut dead = Vec::new();
        for id in ids {
            if self.local_records.contains_key(&id) {
                live.push(id);
                continue;
            }
            let exists: bool = conn
                .exists(self.keys.grant(&id))
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            if exists {
                live.push(id);
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let _: () = conn
                .zrem(&principal_key, &dead)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
        }
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    fn test_config() -> GrantStoreConfig {
        GrantStoreConfig {
            max_ttl: Duration::from_secs(3600),
            max_entries: 100,
            local_ttl: Duration::from_secs(300),
            namespace: "test".to_string(),
        }
    }

    fn test_pool() -> Pool {
        RedisConfig::default().create_pool().unwrap()
    }

    #[tokio::test]
    async fn test_new_validates_config() {
        let config = GrantStoreConfig {
            max_ttl: Duration::ZERO,
            ..test_config()
        };
        let err = RedisGrantStore::new(test_pool(), &config).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_new_rejects_empty_namespace() {
        let config = GrantStoreConfig {
            namespace: "  ".to_string(),
            ..test_config()
        };
        assert!(RedisGrantStore::new(test_pool(), &config).is_err());
    }

    #[tokio::test]
    async fn test_new_with_valid_config() {
        // Pool construction is lazy, so no Redis is needed here.
        let store = RedisGrantStore::new(test_pool(), &test_config()).unwrap();
        assert_eq!(store.local_stats().await.records, 0);
    }

    #[test]
    fn test_local_record_expiry_caps_at_local_ttl() {
        let expiry = LocalRecordExpiry {
            max_ttl: Duration::from_secs(3600),
            local_ttl: Duration::from_secs(300),
        };
        // No expiring sub-tokens: effective TTL is max_ttl, capped locally.
        let record = GrantRecord::new(
            "auth-1",
            "user-1",
            "client-1",
            keyward_auth::GrantType::ClientCredentials,
        );
        assert_eq!(expiry.ttl_for(&record), Duration::from_secs(300));
    }

    #[test]
    fn test_local_record_expiry_follows_soonest_token() {
        let expiry = LocalRecordExpiry {
            max_ttl: Duration::from_secs(3600),
            local_ttl: Duration::from_secs(300),
        };
        let now = OffsetDateTime::now_utc();
        let record = GrantRecord::new(
            "auth-1",
            "user-1",
            "client-1",
            keyward_auth::GrantType::AuthorizationCode,
        )
        .with_token(keyward_auth::SubToken::new(
            TokenKind::Access,
            "short-lived",
            now,
            Some(now + time::Duration::seconds(10)),
        ));
        assert!(expiry.ttl_for(&record) <= Duration::from_secs(10));
    }
}
