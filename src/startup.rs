//! Startup orchestrator.
//!
//! A strict state machine: `Unstarted → Probing → Initializing →
//! Seeding → Ready`, with terminal `Failed` reachable from any phase.
//! Each phase must fully complete before the next begins. No phase is
//! retried after a failure; the process exits nonzero and the
//! supervisor restarts it from `Unstarted`. Every phase is idempotent,
//! so the full re-run is always safe.

use crate::config::{Config, SchemaStrategy};
use crate::error::BootstrapError;
use crate::pool::build_pool;
use crate::probe::ReadinessProber;
use crate::registry::SchemaRegistry;
use crate::schema::{migration_steps, DirectCreator, MigrationRunner};
use crate::seed::{SeedOutcome, Seeder};
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    Probing,
    Initializing,
    Seeding,
    Ready,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unstarted => write!(f, "unstarted"),
            Phase::Probing => write!(f, "probing"),
            Phase::Initializing => write!(f, "initializing"),
            Phase::Seeding => write!(f, "seeding"),
            Phase::Ready => write!(f, "ready"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// A fatal startup failure, tagged with the phase it happened in so
/// operators can tell "database never came up" apart from "schema
/// application failed" apart from "seed failed".
#[derive(Debug, Error)]
#[error("Startup failed during {phase}: {source}")]
pub struct StartupError {
    pub phase: Phase,
    #[source]
    pub source: BootstrapError,
}

pub struct Orchestrator {
    config: Config,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Unstarted,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the full startup sequence once, to completion or first
    /// failure.
    pub async fn run(&mut self) -> Result<(), StartupError> {
        let strategy = self.config.strategy;
        let email = self.config.first_superuser.clone();
        let password = self.config.first_superuser_password.clone();

        // Probing
        self.phase = Phase::Probing;
        info!("Startup phase: {}", self.phase);

        let pool = build_pool(&self.config).map_err(|e| self.fail(Phase::Probing, e))?;

        let prober = ReadinessProber::new(
            self.config.probe_max_attempts,
            self.config.probe_retry_interval,
        );
        prober
            .wait_until_ready(&pool)
            .await
            .map_err(|e| self.fail(Phase::Probing, e))?;

        // Initializing
        self.phase = Phase::Initializing;
        info!("Startup phase: {} ({:?})", self.phase, strategy);

        let registry = SchemaRegistry::ideahub();

        let init_summary = match strategy {
            SchemaStrategy::DirectCreate => {
                let report = DirectCreator::new()
                    .deploy(&pool, &registry)
                    .await
                    .map_err(|e| self.fail(Phase::Initializing, e))?;
                serde_json::json!({
                    "strategy": "create",
                    "tables_created": report.tables_created,
                    "tables_skipped": report.tables_skipped,
                })
            }
            SchemaStrategy::MigrationLedger => {
                let steps = migration_steps(&registry)
                    .map_err(|e| self.fail(Phase::Initializing, e))?;
                let applied = MigrationRunner::new()
                    .apply_pending(&pool, &steps)
                    .await
                    .map_err(|e| self.fail(Phase::Initializing, e))?;
                serde_json::json!({
                    "strategy": "migrate",
                    "steps_applied": applied,
                })
            }
        };

        // Seeding
        self.phase = Phase::Seeding;
        info!("Startup phase: {}", self.phase);

        let outcome = Seeder::new()
            .ensure_first_superuser(&pool, &email, &password)
            .await
            .map_err(|e| self.fail(Phase::Seeding, e))?;

        // Ready
        self.phase = Phase::Ready;
        info!(
            "Startup complete: {}",
            serde_json::json!({
                "phase": self.phase.to_string(),
                "init": init_summary,
                "seed": match outcome {
                    SeedOutcome::Created(id) => format!("created {}", id),
                    SeedOutcome::AlreadyPresent => "already present".to_string(),
                },
            })
        );

        Ok(())
    }

    fn fail(&mut self, phase: Phase, source: BootstrapError) -> StartupError {
        self.phase = Phase::Failed;
        error!("Startup failed during {}: {}", phase, source);
        StartupError { phase, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> Config {
        Config {
            database_url: "postgres://u:p@127.0.0.1:1/nope".to_string(),
            strategy: SchemaStrategy::DirectCreate,
            first_superuser: "admin@example.com".to_string(),
            first_superuser_password: "changethis".to_string(),
            probe_max_attempts: 1,
            probe_retry_interval: Duration::from_millis(10),
            pool_max_size: 1,
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Probing.to_string(), "probing");
        assert_eq!(Phase::Ready.to_string(), "ready");
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_in_probing() {
        let mut orchestrator = Orchestrator::new(unreachable_config());
        assert_eq!(orchestrator.phase(), Phase::Unstarted);

        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.phase, Phase::Probing);
        assert!(matches!(
            err.source,
            BootstrapError::ConnectionUnavailable { .. }
        ));
        assert_eq!(orchestrator.phase(), Phase::Failed);
    }

    #[test]
    fn test_startup_error_names_the_phase() {
        let err = StartupError {
            phase: Phase::Initializing,
            source: BootstrapError::SchemaConflict {
                object: "idea".to_string(),
                cause: "boom".to_string(),
            },
        };
        assert!(err.to_string().contains("initializing"));
        assert!(err.to_string().contains("idea"));
    }
}
