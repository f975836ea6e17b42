//! In-process token and principal indices.
//!
//! [`TokenIndex`] is the keyed-map half of the grant store: it resolves
//! (token kind, token value) pairs and principals to grant ids, nothing
//! more. Uniqueness beyond last-write-wins is the caller's job — rotation
//! removes the old value's entry before indexing the new one.

use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;

use crate::grant::record::TokenKind;

/// One record carries several sub-tokens, so the token map is sized at a
/// multiple of the record capacity.
const TOKEN_CAPACITY_FACTOR: u64 = 4;

/// Maps token values and principals to grant ids.
///
/// The token side is a bounded TTL cache (entries die with the store-wide
/// maximum TTL even if never cleaned up explicitly). The principal side is
/// multi-valued and insertion-ordered: one principal may hold several
/// concurrent grants, and the most recently saved one is last.
#[derive(Debug)]
pub struct TokenIndex {
    tokens: Cache<String, String>,
    principals: DashMap<String, Vec<String>>,
}

impl TokenIndex {
    /// Creates an index sized for `max_records` grant records whose token
    /// entries expire after `max_ttl`.
    #[must_use]
    pub fn new(max_records: u64, max_ttl: Duration) -> Self {
        Self {
            tokens: Cache::builder()
                .max_capacity(max_records.saturating_mul(TOKEN_CAPACITY_FACTOR))
                .time_to_live(max_ttl)
                .build(),
            principals: DashMap::new(),
        }
    }

    fn key(kind: TokenKind, value: &str) -> String {
        format!("{}:{}", kind.as_str(), value)
    }

    /// Indexes a token value under its kind. Last write wins.
    pub async fn put(&self, kind: TokenKind, value: &str, grant_id: &str) {
        self.tokens
            .insert(Self::key(kind, value), grant_id.to_string())
            .await;
    }

    /// Resolves a (kind, value) pair to a grant id.
    pub async fn get(&self, kind: TokenKind, value: &str) -> Option<String> {
        self.tokens.get(&Self::key(kind, value)).await
    }

    /// Drops the entry for a (kind, value) pair, if present.
    pub async fn remove(&self, kind: TokenKind, value: &str) {
        self.tokens.invalidate(&Self::key(kind, value)).await;
    }

    /// Adds a grant id to a principal's set, moving it to the most-recent
    /// position if it was already a member.
    pub fn put_principal(&self, principal: &str, grant_id: &str) {
        let mut entry = self.principals.entry(principal.to_string()).or_default();
        entry.retain(|id| id != grant_id);
        entry.push(grant_id.to_string());
    }

    /// Returns the most recently saved grant id for a principal.
    #[must_use]
    pub fn get_principal(&self, principal: &str) -> Option<String> {
        self.principals
            .get(principal)
            .and_then(|ids| ids.last().cloned())
    }

    /// Returns all grant ids for a principal, most recent last.
    #[must_use]
    pub fn principal_grants(&self, principal: &str) -> Vec<String> {
        self.principals
            .get(principal)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Removes one grant id from a principal's set, dropping the set when it
    /// empties.
    pub fn remove_principal(&self, principal: &str, grant_id: &str) {
        if let Some(mut entry) = self.principals.get_mut(principal) {
            entry.retain(|id| id != grant_id);
            let emptied = entry.is_empty();
            drop(entry);
            if emptied {
                self.principals.remove_if(principal, |_, ids| ids.is_empty());
            }
        }
    }

    /// Number of live token index entries.
    #[must_use]
    pub fn token_entry_count(&self) -> u64 {
        self.tokens.entry_count()
    }

    /// Number of principals with at least one grant.
    #[must_use]
    pub fn principal_count(&self) -> u64 {
        self.principals.len() as u64
    }

    /// Flushes pending cache maintenance so entry counts are accurate.
    pub async fn run_pending_tasks(&self) {
        self.tokens.run_pending_tasks().await;
    }
}
