//! Connection pool construction.
//!
//! One pool for the one configured database. The pool handle is built
//! once by the orchestrator and passed into each startup phase; the
//! database process owns all durable state.

use crate::config::Config;
use crate::error::{BootstrapError, Result};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;

pub fn build_pool(config: &Config) -> Result<Pool> {
    create_pool(&config.database_url, config.pool_max_size)
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| BootstrapError::Internal(format!("Failed to create pool: {}", e)))
}
