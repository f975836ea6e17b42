//! Grant record storage trait.
//!
//! This module defines the storage interface for issued OAuth2 grants. The
//! protocol engine saves a record after token issuance, resolves tokens back
//! to their grant on every authenticated request, and removes records on
//! revocation or logout.
//!
//! # Implementation Notes
//!
//! Implementations must:
//!
//! - Keep at most one record per grant id
//! - Keep at most one live index entry per (token kind, token value) pair
//! - Unindex a rotated token value before indexing its replacement
//! - Bound every record's lifetime by the configured maximum TTL and by the
//!   soonest sub-token expiry, whichever is stricter
//! - Treat absence, expiry, and eviction identically: lookups return `None`
//!
//! # Security Considerations
//!
//! - Never log token values; log grant ids and token kinds only
//! - Removal must clear every index entry so revoked values stop resolving

use async_trait::async_trait;

use crate::AuthResult;
use crate::grant::record::{GrantRecord, TokenKind};

/// Storage trait for issued grant records.
///
/// # Implementations
///
/// - [`InMemoryGrantStore`](crate::grant::InMemoryGrantStore) — bounded
///   in-process cache, suitable for single-node deployments
/// - `RedisGrantStore` (in the `keyward-auth-redis` crate) — Redis tier of
///   record with an in-process accelerator, for multi-node deployments
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Saves a grant record, replacing any record stored under the same id.
    ///
    /// Re-saving an existing id is the rotation path: index entries for
    /// token values that changed kind-for-kind are removed before the new
    /// values are indexed, so a rotated-out value stops resolving.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store write fails. Write failures are
    /// never swallowed; a lost grant write breaks token validation.
    async fn save(&self, record: &GrantRecord) -> AuthResult<()>;

    /// Removes a grant record, every token index entry it holds, and its
    /// membership in the principal index.
    ///
    /// Removing a record that is no longer present is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store write fails.
    async fn remove(&self, record: &GrantRecord) -> AuthResult<()>;

    /// Finds a record by grant id.
    ///
    /// # Returns
    ///
    /// `None` for unknown, expired, or evicted ids alike.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<GrantRecord>>;

    /// Finds the record holding a token of the given kind and value.
    ///
    /// An index entry pointing at a record that no longer exists is treated
    /// as an orphan: implementations delete it and return `None` rather than
    /// resolving through it.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_by_token(
        &self,
        kind: TokenKind,
        value: &str,
    ) -> AuthResult<Option<GrantRecord>>;

    /// Finds the most recently saved live grant for a principal.
    ///
    /// A principal can hold several concurrent grants (one per client
    /// session); this returns the newest. Use
    /// [`find_all_by_principal`](GrantStore::find_all_by_principal) when all
    /// of them matter.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_by_principal(&self, principal: &str) -> AuthResult<Option<GrantRecord>>;

    /// Finds every live grant for a principal.
    ///
    /// Index members whose record has expired are pruned as a side effect of
    /// the read.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_all_by_principal(&self, principal: &str) -> AuthResult<Vec<GrantRecord>>;

    /// Lists the live grant ids for a principal without loading full records.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_grant_ids_by_principal(&self, principal: &str) -> AuthResult<Vec<String>>;
}

/// Diagnostic counts for a grant store tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrantStoreStats {
    /// Live grant records.
    pub records: u64,
    /// Live (kind, value) index entries.
    pub token_indices: u64,
    /// Principals with at least one live grant.
    pub principals: u64,
}
