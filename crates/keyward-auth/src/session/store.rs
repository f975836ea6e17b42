//! Authorization session storage trait.
//!
//! This module defines the storage interface for pre-token authorization
//! sessions. A session is written once when an authorization request is
//! approved, read once during code-to-token exchange, and deleted after a
//! successful exchange.
//!
//! # Implementation Notes
//!
//! Implementations must:
//!
//! - Keep at most one session per authorization code
//! - Apply the domain `expires_at` check on every read, deleting entries
//!   discovered expired (the store's own TTL is a backstop, never the
//!   authority)
//! - Support lookup of all live sessions for one user
//!
//! # Security Considerations
//!
//! - Never log authorization codes or PKCE challenges
//! - Codes are single-use; callers delete the session after exchange

use async_trait::async_trait;

use crate::AuthResult;
use crate::session::AuthorizationSession;

/// Storage trait for pre-token authorization sessions.
///
/// # Implementations
///
/// - [`InMemorySessionStore`](crate::session::InMemorySessionStore) —
///   bounded TTL cache, suitable for single-node deployments
/// - `RedisSessionStore` (in the `keyward-auth-redis` crate) — shared store
///   with a per-user secondary index, for multi-node deployments
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Saves a session under its authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store write fails. Write failures are
    /// never swallowed; a lost session write breaks the code exchange.
    async fn save(&self, session: &AuthorizationSession) -> AuthResult<()>;

    /// Finds a session by authorization code.
    ///
    /// The domain `expires_at` is checked even when the store entry is still
    /// live; a domain-expired session is deleted and reported absent.
    ///
    /// # Returns
    ///
    /// `None` for unknown, expired, or evicted codes alike.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationSession>>;

    /// Finds every live session belonging to a user.
    ///
    /// Stale index members (sessions already gone or domain-expired) are
    /// pruned as a side effect of the read.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store read fails.
    async fn find_by_user(&self, user_id: &str) -> AuthResult<Vec<AuthorizationSession>>;

    /// Deletes a session by authorization code.
    ///
    /// Deleting an absent code is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a backing store write fails.
    async fn delete_by_code(&self, code: &str) -> AuthResult<()>;

    /// Removes sessions whose domain expiry has passed.
    ///
    /// A maintenance hook callers may invoke periodically; correctness never
    /// depends on it because every read applies the domain check lazily.
    ///
    /// # Returns
    ///
    /// The number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn delete_expired(&self) -> AuthResult<u64>;
}
