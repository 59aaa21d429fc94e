//! Readiness prober.
//!
//! Container orchestration starts the application and the database
//! concurrently with no ordering guarantee. Before any DDL runs, this
//! prober blocks until a trivial round-trip query succeeds, retrying on
//! a fixed interval up to a bounded attempt count. Exhausting the bound
//! aborts startup with `ConnectionUnavailable` so operators can tell
//! "database never came up" apart from a schema failure.

use crate::error::{BootstrapError, Result};
use deadpool_postgres::Pool;
use std::time::Duration;
use tracing::{info, warn};

pub struct ReadinessProber {
    max_attempts: u32,
    retry_interval: Duration,
}

impl ReadinessProber {
    pub fn new(max_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_interval,
        }
    }

    /// Block until the database accepts a `SELECT 1` round trip, or the
    /// attempt budget runs out.
    pub async fn wait_until_ready(&self, pool: &Pool) -> Result<()> {
        let mut last_cause = String::new();

        for attempt in 1..=self.max_attempts {
            match self.ping(pool).await {
                Ok(()) => {
                    info!("Database ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(cause) => {
                    warn!(
                        "Database not ready (attempt {}/{}): {}",
                        attempt, self.max_attempts, cause
                    );
                    last_cause = cause;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        Err(BootstrapError::ConnectionUnavailable {
            attempts: self.max_attempts,
            cause: last_cause,
        })
    }

    async fn ping(&self, pool: &Pool) -> std::result::Result<(), String> {
        let client = pool.get().await.map_err(|e| e.to_string())?;
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| format!("Ping failed: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget_never_zero() {
        let prober = ReadinessProber::new(0, Duration::from_secs(1));
        assert_eq!(prober.max_attempts, 1);

        let prober = ReadinessProber::new(300, Duration::from_secs(1));
        assert_eq!(prober.max_attempts, 300);
    }

    #[tokio::test]
    async fn test_exhaustion_is_connection_unavailable() {
        // Nothing listens on this port; every attempt fails fast on
        // pool create timeout.
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some("postgres://u:p@127.0.0.1:1/nope".to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: 1,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_millis(50)),
                create: Some(Duration::from_millis(50)),
                recycle: Some(Duration::from_millis(50)),
            },
            ..Default::default()
        });
        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .unwrap();

        let prober = ReadinessProber::new(2, Duration::from_millis(10));
        let err = prober.wait_until_ready(&pool).await.unwrap_err();
        match err {
            BootstrapError::ConnectionUnavailable { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected ConnectionUnavailable, got {:?}", other),
        }
    }
}
