//! Storage configuration from environment variables.

use anyhow::{Context, Result};
use std::time::Duration;

/// Connection pool and bootstrap configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Postgres connection URL
    pub database_url: String,
    /// Fixed pool size; acquisition fails rather than growing past this
    pub max_connections: u32,
    /// How long `acquire` waits before failing with pool exhaustion
    pub acquire_timeout: Duration,
    /// When false the schema is externally managed and bootstrap is skipped
    /// entirely (cold-start optimization for short-lived environments)
    pub init_schema: bool,
}

impl StorageConfig {
    /// Load configuration from the environment.
    ///
    /// `DATABASE_URL` is required; `MAILGUARD_POOL_SIZE` (default 5),
    /// `MAILGUARD_ACQUIRE_TIMEOUT_SECS` (default 5) and
    /// `MAILGUARD_INIT_SCHEMA` (default true) are optional.
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;

        let max_connections = std::env::var("MAILGUARD_POOL_SIZE")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .context("MAILGUARD_POOL_SIZE must be an integer")?
            .unwrap_or(5);

        let acquire_timeout_secs = std::env::var("MAILGUARD_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .context("MAILGUARD_ACQUIRE_TIMEOUT_SECS must be an integer")?
            .unwrap_or(5);

        let init_schema = std::env::var("MAILGUARD_INIT_SCHEMA")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            init_schema,
        })
    }
}
