//! Manual rollback entrypoint.
//!
//! Undoes applied migration steps, newest first, down to (but not
//! including) the target identifier given as the only argument. Never
//! run as part of startup.

use ideahub_bootstrap::config::Config;
use ideahub_bootstrap::pool::build_pool;
use ideahub_bootstrap::registry::SchemaRegistry;
use ideahub_bootstrap::schema::{migration_steps, MigrationRunner};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ideahub_bootstrap=debug")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file found or error loading it: {}", e);
    }

    let target = match std::env::args().nth(1) {
        Some(target) => target,
        None => {
            eprintln!("Usage: ideahub-rollback <target-step-id>");
            eprintln!("Example: ideahub-rollback 0003_ideas");
            std::process::exit(2);
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let pool = match build_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let registry = SchemaRegistry::ideahub();
    let steps = match migration_steps(&registry) {
        Ok(steps) => steps,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    match MigrationRunner::new().rollback_to(&pool, &steps, &target).await {
        Ok(undone) => {
            info!("Rolled back {} step(s) to {}", undone, target);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
