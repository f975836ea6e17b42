//! Redis storage backend for keyward-auth
//!
//! Provides multi-node storage for:
//!
//! - Grant records, with token-value and principal indices
//! - Pre-token authorization sessions, with a per-user index
//!
//! Redis is the tier of record; the grant store additionally keeps
//! short-lived in-process caches in front of it, so hot token lookups stay
//! off the network while cross-node changes converge within the configured
//! local TTL. All keys carry TTLs, so Redis itself reclaims expired
//! credentials.
//!
//! # Example
//!
//! ```ignore
//! use keyward_auth::StorageConfig;
//! use keyward_auth_redis::{RedisConfig, RedisGrantStore, RedisSessionStore};
//!
//! let storage = StorageConfig::default();
//! let pool = RedisConfig::default().create_pool()?;
//!
//! let grants = RedisGrantStore::new(pool.clone(), &storage.grants)?;
//! let sessions = RedisSessionStore::new(pool, &storage.sessions)?;
//! ```

pub mod config;
pub mod grant;
pub mod keys;
pub mod session;

/// Redis connection pool type alias.
pub type RedisPool = deadpool_redis::Pool;

pub use config::RedisConfig;
pub use grant::RedisGrantStore;
pub use keys::{KeyScheme, Namespace};
pub use session::RedisSessionStore;
