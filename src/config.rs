use crate::error::{BootstrapError, Result};
use std::env;
use std::time::Duration;

/// Which schema initialization strategy is authoritative for this
/// deployment. The two are mutually exclusive per process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStrategy {
    /// Create every registry table absent from the database.
    DirectCreate,
    /// Apply ordered migration steps recorded in the ledger.
    MigrationLedger,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub strategy: SchemaStrategy,
    pub first_superuser: String,
    pub first_superuser_password: String,
    pub probe_max_attempts: u32,
    pub probe_retry_interval: Duration,
    pub pool_max_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = if let Ok(url) = env::var("DATABASE_URL") {
            url
        } else {
            let db_host = env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".to_string());
            let db_port = env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
            let db_name = env::var("POSTGRES_DB").unwrap_or_else(|_| "ideahub".to_string());
            let db_user = env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
            let db_password = env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "".to_string());

            // URL-encode password to handle special characters
            let encoded_password = urlencoding::encode(&db_password);

            format!(
                "postgres://{}:{}@{}:{}/{}",
                db_user, encoded_password, db_host, db_port, db_name
            )
        };

        let strategy = match env::var("SCHEMA_STRATEGY")
            .unwrap_or_else(|_| "create".to_string())
            .to_lowercase()
            .as_str()
        {
            "create" => SchemaStrategy::DirectCreate,
            "migrate" => SchemaStrategy::MigrationLedger,
            other => {
                return Err(BootstrapError::InvalidConfig {
                    message: format!(
                        "SCHEMA_STRATEGY must be 'create' or 'migrate', got '{}'",
                        other
                    ),
                })
            }
        };

        let first_superuser =
            env::var("FIRST_SUPERUSER").unwrap_or_else(|_| "admin@example.com".to_string());

        let first_superuser_password =
            env::var("FIRST_SUPERUSER_PASSWORD").map_err(|_| BootstrapError::InvalidConfig {
                message: "FIRST_SUPERUSER_PASSWORD must be set".to_string(),
            })?;

        let probe_max_attempts = env::var("DB_CONNECT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let probe_retry_interval_secs: u64 = env::var("DB_CONNECT_RETRY_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);

        let pool_max_size = env::var("POOL_MAX_SIZE")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .unwrap_or(4);

        Ok(Config {
            database_url,
            strategy,
            first_superuser,
            first_superuser_password,
            probe_max_attempts,
            probe_retry_interval: Duration::from_secs(probe_retry_interval_secs),
            pool_max_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so they
    // cannot race each other under the parallel test runner.
    #[test]
    fn test_from_env() {
        env::set_var("DATABASE_URL", "postgres://u:p@db:5432/ideahub");
        env::set_var("FIRST_SUPERUSER_PASSWORD", "changethis");
        env::remove_var("SCHEMA_STRATEGY");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://u:p@db:5432/ideahub");
        assert_eq!(config.strategy, SchemaStrategy::DirectCreate);
        assert_eq!(config.first_superuser, "admin@example.com");
        assert_eq!(config.probe_max_attempts, 300);
        assert_eq!(config.probe_retry_interval, Duration::from_secs(1));

        env::set_var("SCHEMA_STRATEGY", "migrate");
        let config = Config::from_env().unwrap();
        assert_eq!(config.strategy, SchemaStrategy::MigrationLedger);

        env::set_var("SCHEMA_STRATEGY", "both");
        assert!(Config::from_env().is_err());

        env::remove_var("SCHEMA_STRATEGY");
        env::remove_var("FIRST_SUPERUSER_PASSWORD");
        assert!(Config::from_env().is_err());

        env::remove_var("DATABASE_URL");
    }
}
