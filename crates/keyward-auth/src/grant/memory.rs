//! In-process grant record store.
//!
//! A bounded cache keyed by grant id, with per-record expiration computed
//! from the record's own sub-tokens: a record lives until its soonest
//! sub-token expiry or the store-wide maximum TTL, whichever comes first.
//! Token and principal indices are maintained through the two-step save
//! protocol (unindex stale values, write the record, index current values),
//! so a rotated-out token value stops resolving the moment its replacement
//! is saved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::{debug, warn};

use crate::AuthResult;
use crate::config::GrantStoreConfig;
use crate::error::AuthError;
use crate::grant::index::TokenIndex;
use crate::grant::record::{GrantRecord, TokenKind};
use crate::grant::store::{GrantStore, GrantStoreStats};

/// Per-record expiration policy: min(store maximum, soonest sub-token
/// expiry), re-evaluated on every save.
struct GrantExpiry {
    max_ttl: Duration,
}

impl Expiry<String, GrantRecord> for GrantExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &GrantRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.effective_ttl(self.max_ttl))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &GrantRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.effective_ttl(self.max_ttl))
    }
}

/// Bounded in-process grant record store.
///
/// Suitable for single-node deployments; multi-node deployments should use
/// the Redis-backed store from `keyward-auth-redis`, which shares the same
/// contract.
#[derive(Debug)]
pub struct InMemoryGrantStore {
    records: Cache<String, GrantRecord>,
    index: TokenIndex,
}

impl InMemoryGrantStore {
    /// Creates a store from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the configuration is invalid
    /// (zero TTL or capacity, empty namespace).
    pub fn new(config: &GrantStoreConfig) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let records = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(GrantExpiry {
                max_ttl: config.max_ttl,
            })
            .eviction_listener(
                |id: Arc<String>, _record: GrantRecord, cause: RemovalCause| {
                    debug!(grant_id = %id, ?cause, "grant record evicted");
                },
            )
            .build();

        Ok(Self {
            records,
            index: TokenIndex::new(config.max_entries, config.max_ttl),
        })
    }

    /// Unindexes token values that the new revision of a record rotated out:
    /// any kind present in both revisions with a changed value.
    async fn remove_stale_indexes(&self, old: &GrantRecord, new: &GrantRecord) {
        for kind in TokenKind::ALL {
            let (Some(old_token), Some(new_token)) = (old.token(kind), new.token(kind)) else {
                continue;
            };
            if old_token.value != new_token.value {
                debug!(grant_id = %old.id, kind = %kind, "unindexing rotated token value");
                self.index.remove(kind, &old_token.value).await;
            }
        }
    }

    /// Diagnostic counts after flushing pending cache maintenance.
    pub async fn stats(&self) -> GrantStoreStats {
        self.records.run_pending_tasks().await;
        self.index.run_pending_tasks().await;
        GrantStoreStats {
            records: self.records.entry_count(),
            token_indices: self.index.token_entry_count(),
            principals: self.index.principal_count(),
        }
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn save(&self, record: &GrantRecord) -> AuthResult<()> {
        if let Some(existing) = self.records.get(&record.id).await {
            self.remove_stale_indexes(&existing, record).await;
        }

        self.records
            .insert(record.id.clone(), record.clone())
            .await;

        for token in &record.tokens {
            self.index.put(token.kind, &token.value, &record.id).await;
        }
        self.index.put_principal(&record.principal, &record.id);

        debug!(
            grant_id = %record.id,
            principal = %record.principal,
            tokens = record.tokens.len(),
            "saved grant record"
        );
        Ok(())
    }

    async fn remove(&self, record: &GrantRecord) -> AuthResult<()> {
        self.records.invalidate(&record.id).await;
        for token in &record.tokens {
            self.index.remove(token.kind, &token.value).await;
        }
        self.index.remove_principal(&record.principal, &record.id);

        debug!(grant_id = %record.id, "removed grant record");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<GrantRecord>> {
        Ok(self.records.get(id).await)
    }

    async fn find_by_token(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> AuthResult<Option<GrantRecord>> {
        let Some(grant_id) = self.index.get(kind, value).await else {
            return Ok(None);
        };

        match self.records.get(&grant_id).await {
            Some(record) => Ok(Some(record)),
            None => {
                // The record expired before its index entry did.
                warn!(grant_id = %grant_id, kind = %kind, "dropping orphaned token index entry");
                self.index.remove(kind, value).await;
                Ok(None)
            }
        }
    }

    async fn find_by_principal(&self, principal: &str) -> AuthResult<Option<GrantRecord>> {
        for grant_id in self.index.principal_grants(principal).into_iter().rev() {
            match self.records.get(&grant_id).await {
                Some(record) => return Ok(Some(record)),
                None => self.index.remove_principal(principal, &grant_id),
            }
        }
        Ok(None)
    }

    async fn find_all_by_principal(&self, principal: &str) -> AuthResult<Vec<GrantRecord>> {
        let mut records = Vec::new();
        for grant_id in self.index.principal_grants(principal) {
            match self.records.get(&grant_id).await {
                Some(record) => records.push(record),
                None => self.index.remove_principal(principal, &grant_id),
            }
        }
        Ok(records)
    }

    async fn find_grant_ids_by_principal(&self, principal: &str) -> AuthResult<Vec<String>> {
        let mut ids = Vec::new();
        for grant_id in self.index.principal_grants(principal) {
            if self.records.contains_key(&grant_id) {
                ids.push(grant_id);
            } else {
                self.index.remove_principal(principal, &grant_id);
            }
        }
        Ok(ids)
    }
}
