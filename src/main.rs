use ideahub_bootstrap::config::Config;
use ideahub_bootstrap::startup::Orchestrator;

use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup log directory
    let log_dir =
        std::env::var("LOG_DIR").unwrap_or_else(|_| "/var/log/ideahub-bootstrap".to_string());

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&log_dir).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create log directory {}: {}", log_dir, e);
    });

    // Create file appender with daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "ideahub-bootstrap.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ideahub_bootstrap=debug")),
        )
        // Console output
        .with(fmt::layer().with_target(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", log_dir);

    // Load environment from .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file found or error loading it: {}", e);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Starting database bootstrap ({:?})", config.strategy);

    let mut orchestrator = Orchestrator::new(config);

    // Exit code 0 signals READY; nonzero signals FAILED so the
    // supervisor restarts the whole sequence from scratch.
    if let Err(e) = orchestrator.run().await {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Database ready, handing off to the application server");

    Ok(())
}
