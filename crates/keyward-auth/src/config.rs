//! Storage configuration for grant and session caches.
//!
//! All duration values accept humantime strings ("30d", "5m", "600s") when
//! deserialized from a config file. Store constructors call `validate()` and
//! refuse to start on invalid values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the credential cache subsystem.
///
/// # Example (TOML)
///
/// ```toml
/// [storage.grants]
/// max_ttl = "30d"
/// max_entries = 50000
/// local_ttl = "5m"
/// namespace = "keyward"
///
/// [storage.sessions]
/// session_ttl = "10m"
/// max_entries = 10000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Grant record store configuration.
    pub grants: GrantStoreConfig,

    /// Authorization session store configuration.
    pub sessions: SessionStoreConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            grants: GrantStoreConfig::default(),
            sessions: SessionStoreConfig::default(),
        }
    }
}

/// Grant record store configuration.
///
/// Applies to both the in-process store and the Redis-backed hybrid store;
/// `local_ttl` only matters for the hybrid, where it bounds the staleness of
/// the in-process accelerator tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrantStoreConfig {
    /// Upper bound on any grant record's lifetime. A record whose sub-tokens
    /// all outlive this value is still dropped when it elapses.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// Maximum number of grant records held by a store tier.
    pub max_entries: u64,

    /// Lifetime of local accelerator entries in the hybrid store. Must not
    /// exceed `max_ttl`; the effective value is the minimum of the two.
    #[serde(with = "humantime_serde")]
    pub local_ttl: Duration,

    /// Key prefix for the remote tier. Scope it per tenant when several
    /// tenants share one Redis deployment.
    pub namespace: String,
}

impl Default for GrantStoreConfig {
    fn default() -> Self {
        Self {
            max_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            max_entries: 50_000,
            local_ttl: Duration::from_secs(300), // 5 minutes
            namespace: "keyward".to_string(),
        }
    }
}

/// Authorization session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionStoreConfig {
    /// Store-level lifetime for pre-token authorization sessions. The
    /// session's own `expires_at` may end it earlier; this TTL is the
    /// backstop.
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Maximum number of sessions held by the in-process backend.
    pub max_entries: u64,

    /// Key prefix for the remote tier.
    pub namespace: String,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(600), // 10 minutes
            max_entries: 10_000,
            namespace: "keyward".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl StorageConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violation found in either subsection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grants.validate()?;
        self.sessions.validate()
    }
}

impl GrantStoreConfig {
    /// Validates the grant store configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `max_ttl` or `local_ttl` is zero
    /// - `local_ttl` exceeds `max_ttl`
    /// - `max_entries` is zero
    /// - `namespace` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "grants.max_ttl must be > 0".to_string(),
            ));
        }

        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "grants.max_entries must be > 0".to_string(),
            ));
        }

        if self.local_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "grants.local_ttl must be > 0".to_string(),
            ));
        }

        if self.local_ttl > self.max_ttl {
            return Err(ConfigError::InvalidValue(format!(
                "grants.local_ttl ({:?}) must not exceed grants.max_ttl ({:?})",
                self.local_ttl, self.max_ttl
            )));
        }

        if self.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "grants.namespace cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// TTL for local accelerator entries: `local_ttl` capped by `max_ttl`.
    #[must_use]
    pub fn effective_local_ttl(&self) -> Duration {
        self.local_ttl.min(self.max_ttl)
    }
}

impl SessionStoreConfig {
    /// Validates the session store configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `session_ttl` is zero
    /// - `max_entries` is zero
    /// - `namespace` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "sessions.session_ttl must be > 0".to_string(),
            ));
        }

        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "sessions.max_entries must be > 0".to_string(),
            ));
        }

        if self.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "sessions.namespace cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
