//! # keyward-auth
//!
//! Credential lifecycle storage for the Keyward authorization server.
//!
//! This crate provides:
//! - Grant record storage with token-value and principal indices
//! - TTL-bounded in-process caches with token-rotation-safe re-save
//! - Pre-token authorization session storage
//! - PKCE code verifier/challenge handling (RFC 7636)
//! - Administrative grant revocation
//!
//! ## Overview
//!
//! An OAuth2/OIDC authorization server issues grants: a principal authorizes
//! a client, and the server mints an authorization code, access token,
//! refresh token, and ID token under that grant. Everything here revolves
//! around storing those grants so that any issued token value resolves back
//! to its grant in one lookup, rotation atomically unindexes replaced
//! values, and expiry is bounded both by a store-wide maximum TTL and by
//! the soonest sub-token expiry.
//!
//! The traits in this crate have two families of implementations: the
//! bounded in-process stores defined here, and Redis-backed stores in the
//! companion `keyward-auth-redis` crate for multi-node deployments.
//!
//! ## Modules
//!
//! - [`config`] - Storage configuration (TTLs, capacities, namespaces)
//! - [`error`] - Error types shared by all stores
//! - [`grant`] - Grant records, storage trait, and the in-process store
//! - [`pkce`] - PKCE verifier/challenge types and verification
//! - [`revocation`] - Administrative revocation over any grant store
//! - [`session`] - Pre-token authorization sessions and their storage

pub mod config;
pub mod error;
pub mod grant;
pub mod pkce;
pub mod revocation;
pub mod session;

pub use config::{ConfigError, GrantStoreConfig, SessionStoreConfig, StorageConfig};
pub use error::{AuthError, ErrorCategory};
pub use grant::{
    GrantRecord, GrantStore, GrantStoreStats, GrantType, InMemoryGrantStore, SubToken, TokenKind,
};
pub use pkce::{CodeChallenge, CodeChallengeMethod, CodeVerifier, PkceError, verify_challenge};
pub use revocation::RevocationService;
pub use session::{AuthorizationSession, InMemorySessionStore, SessionStore};

/// Type alias for credential storage results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use keyward_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{ConfigError, GrantStoreConfig, SessionStoreConfig, StorageConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::grant::{
        GrantRecord, GrantStore, GrantStoreStats, GrantType, InMemoryGrantStore, SubToken,
        TokenKind,
    };
    pub use crate::pkce::{
        CodeChallenge, CodeChallengeMethod, CodeVerifier, PkceError, verify_challenge,
    };
    pub use crate::revocation::RevocationService;
    pub use crate::session::{AuthorizationSession, InMemorySessionStore, SessionStore};
}
