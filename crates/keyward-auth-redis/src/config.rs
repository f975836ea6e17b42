//! Redis connection configuration.

use std::time::Duration;

use deadpool_redis::{Pool, PoolConfig, Runtime};
use keyward_auth::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};

/// Redis connection settings for the grant and session stores.
///
/// Pool creation is lazy: [`create_pool`](RedisConfig::create_pool) only
/// validates the URL and sizes the pool, connections are opened on first
/// checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://:password@host:6379/0").
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Timeout in milliseconds for checking out, creating, and recycling
    /// pooled connections.
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    16
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    /// Creates a connection pool from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the URL does not parse or the
    /// pool cannot be built. Connection failures surface later, as
    /// `AuthError::Storage` from the operation that first needs a connection.
    pub fn create_pool(&self) -> AuthResult<Pool> {
        let mut config = deadpool_redis::Config::from_url(&self.url);

        let timeout = Duration::from_millis(self.timeout_ms);
        let mut pool_config = PoolConfig::new(self.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        config.pool = Some(pool_config);

        config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AuthError::configuration(format!("failed to create Redis pool: {e}")))
    }
}
