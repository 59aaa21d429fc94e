//! Migration-ledger schema initializer
//!
//! The evolutionary strategy: an ordered sequence of steps, each with a
//! unique identifier and a declared predecessor. Applied identifiers
//! are recorded in a ledger table; on startup every step after the last
//! ledger entry is applied, in order, one transaction per step so the
//! DDL and its ledger row commit or roll back together.
//!
//! Concurrent appliers (several replicas starting at once) are
//! serialized with a session-level advisory lock held around the whole
//! read-ledger, apply, record sequence, so no step is ever applied
//! twice or out of order.

use crate::error::{BootstrapError, Result};
use crate::schema::changelog::ChangelogManager;
use deadpool_postgres::Pool;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub const LEDGER_TABLE: &str = "_ideahub_bootstrap_migrations";

/// Cluster-wide advisory lock key. Replicas of this binary are the
/// only contenders for it.
const MIGRATION_LOCK_KEY: i64 = 0x1dea_4b00;

/// A single named, ordered schema change.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub id: &'static str,
    pub predecessor: Option<&'static str>,
    pub up: Vec<String>,
    /// Declared inverse; `None` marks the step irreversible.
    pub down: Option<Vec<String>>,
}

impl MigrationStep {
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for stmt in &self.up {
            hasher.update(stmt.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Check that the step sequence forms a single well-linked chain:
/// unique identifiers, no predecessor on the first step, and each later
/// step declaring the previous step's identifier.
pub fn validate_chain(steps: &[MigrationStep]) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        if steps.iter().filter(|s| s.id == step.id).count() > 1 {
            return Err(BootstrapError::Internal(format!(
                "Duplicate migration identifier: {}",
                step.id
            )));
        }

        let expected = if i == 0 { None } else { Some(steps[i - 1].id) };
        if step.predecessor != expected {
            return Err(BootstrapError::StepOrderingViolation {
                step: step.id.to_string(),
                missing: step.predecessor.unwrap_or("<none>").to_string(),
            });
        }
    }
    Ok(())
}

/// Select the steps still to apply, verifying the predecessor chain
/// against the ledger. A step whose predecessor is neither applied nor
/// scheduled ahead of it signals a corrupted or out-of-order
/// deployment.
pub fn plan_apply<'a>(
    steps: &'a [MigrationStep],
    applied: &[String],
) -> Result<Vec<&'a MigrationStep>> {
    let is_applied = |id: &str| applied.iter().any(|a| a == id);

    let mut pending: Vec<&MigrationStep> = Vec::new();

    for step in steps {
        if let Some(pred) = step.predecessor {
            let pred_satisfied = is_applied(pred) || pending.iter().any(|p| p.id == pred);
            if !pred_satisfied {
                return Err(BootstrapError::StepOrderingViolation {
                    step: step.id.to_string(),
                    missing: pred.to_string(),
                });
            }
            // An applied step whose predecessor never made the ledger
            // means the ledger itself is out of order.
            if is_applied(step.id) && !is_applied(pred) {
                return Err(BootstrapError::StepOrderingViolation {
                    step: step.id.to_string(),
                    missing: pred.to_string(),
                });
            }
        }

        if !is_applied(step.id) {
            pending.push(step);
        }
    }

    Ok(pending)
}

/// Select the applied steps to undo, newest first, down to (but not
/// including) `target`. Refuses to cross a step with no declared
/// inverse.
pub fn plan_rollback<'a>(
    steps: &'a [MigrationStep],
    applied: &[String],
    target: &str,
) -> Result<Vec<&'a MigrationStep>> {
    if !applied.iter().any(|a| a == target) {
        return Err(BootstrapError::Internal(format!(
            "Rollback target {} is not in the ledger",
            target
        )));
    }

    let mut to_undo: Vec<&MigrationStep> = Vec::new();

    for step in steps.iter().rev() {
        if step.id == target {
            break;
        }
        if !applied.iter().any(|a| a == step.id) {
            continue;
        }
        if step.down.is_none() {
            return Err(BootstrapError::IrreversibleStep {
                step: step.id.to_string(),
            });
        }
        to_undo.push(step);
    }

    Ok(to_undo)
}

pub struct MigrationRunner {
    changelog: ChangelogManager,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            changelog: ChangelogManager::new(),
        }
    }

    pub async fn ensure_ledger_table(&self, pool: &Pool) -> Result<()> {
        let client = pool.get().await?;

        client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS _ideahub_bootstrap_migrations (
                    id SERIAL PRIMARY KEY,
                    step_id TEXT NOT NULL UNIQUE,
                    checksum TEXT NOT NULL,
                    applied_at TIMESTAMPTZ DEFAULT NOW()
                )
                "#,
                &[],
            )
            .await
            .map_err(|e| BootstrapError::SchemaConflict {
                object: LEDGER_TABLE.to_string(),
                cause: e.to_string(),
            })?;

        Ok(())
    }

    pub async fn get_applied(&self, pool: &Pool) -> Result<Vec<String>> {
        let client = pool.get().await?;
        Self::read_applied(&client).await
    }

    async fn read_applied(client: &deadpool_postgres::Object) -> Result<Vec<String>> {
        let rows = client
            .query(
                "SELECT step_id FROM _ideahub_bootstrap_migrations ORDER BY id",
                &[],
            )
            .await?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Apply every step after the last ledger entry. Returns the number
    /// of steps applied.
    pub async fn apply_pending(&self, pool: &Pool, steps: &[MigrationStep]) -> Result<usize> {
        validate_chain(steps)?;
        self.ensure_ledger_table(pool).await?;
        self.changelog.ensure_changelog_table(pool).await?;

        let mut client = pool.get().await?;

        client
            .execute("SELECT pg_advisory_lock($1)", &[&MIGRATION_LOCK_KEY])
            .await?;

        let result = self.apply_locked(&mut client, steps).await;

        // Release even when a step failed; the supervisor restart would
        // otherwise wait on a dead session's lock.
        let _ = client
            .execute("SELECT pg_advisory_unlock($1)", &[&MIGRATION_LOCK_KEY])
            .await;
        drop(client);

        let applied = result?;
        for (step_id, checksum) in &applied {
            self.changelog
                .record_migration_applied(pool, step_id, checksum)
                .await;
        }

        Ok(applied.len())
    }

    async fn apply_locked(
        &self,
        client: &mut deadpool_postgres::Object,
        steps: &[MigrationStep],
    ) -> Result<Vec<(&'static str, String)>> {
        // Re-read under the lock: another replica may have advanced the
        // ledger while we waited.
        let applied = Self::read_applied(client).await?;
        debug!("Ledger has {} applied steps", applied.len());

        self.verify_checksums(client, steps, &applied).await;

        let pending = plan_apply(steps, &applied)?;

        if pending.is_empty() {
            info!("Migration ledger up to date, nothing to apply");
            return Ok(Vec::new());
        }

        let mut done = Vec::new();

        for step in pending {
            info!("Applying migration step {}", step.id);

            let checksum = step.checksum();
            let tx = client.transaction().await?;

            for stmt in &step.up {
                tx.batch_execute(stmt)
                    .await
                    .map_err(|e| BootstrapError::SchemaConflict {
                        object: step.id.to_string(),
                        cause: e.to_string(),
                    })?;
            }

            tx.execute(
                "INSERT INTO _ideahub_bootstrap_migrations (step_id, checksum) VALUES ($1, $2)",
                &[&step.id, &checksum],
            )
            .await
            .map_err(|e| BootstrapError::SchemaConflict {
                object: step.id.to_string(),
                cause: format!("Failed to record in ledger: {}", e),
            })?;

            tx.commit().await?;

            info!("Applied migration step {} (checksum: {})", step.id, checksum);
            done.push((step.id, checksum));
        }

        Ok(done)
    }

    /// Undo applied steps, newest first, down to (but not including)
    /// `target`. Manual operation; never part of startup.
    pub async fn rollback_to(
        &self,
        pool: &Pool,
        steps: &[MigrationStep],
        target: &str,
    ) -> Result<usize> {
        validate_chain(steps)?;
        self.ensure_ledger_table(pool).await?;

        let mut client = pool.get().await?;

        client
            .execute("SELECT pg_advisory_lock($1)", &[&MIGRATION_LOCK_KEY])
            .await?;

        let result = self.rollback_locked(&mut client, steps, target).await;

        let _ = client
            .execute("SELECT pg_advisory_unlock($1)", &[&MIGRATION_LOCK_KEY])
            .await;
        drop(client);

        let undone = result?;
        for step_id in &undone {
            self.changelog.record_migration_rolled_back(pool, step_id).await;
        }

        Ok(undone.len())
    }

    async fn rollback_locked(
        &self,
        client: &mut deadpool_postgres::Object,
        steps: &[MigrationStep],
        target: &str,
    ) -> Result<Vec<&'static str>> {
        let applied = Self::read_applied(client).await?;
        let to_undo = plan_rollback(steps, &applied, target)?;

        let mut undone = Vec::new();

        for step in to_undo {
            info!("Rolling back migration step {}", step.id);

            let down = step.down.as_ref().ok_or_else(|| BootstrapError::IrreversibleStep {
                step: step.id.to_string(),
            })?;

            let tx = client.transaction().await?;

            for stmt in down {
                tx.batch_execute(stmt)
                    .await
                    .map_err(|e| BootstrapError::SchemaConflict {
                        object: step.id.to_string(),
                        cause: e.to_string(),
                    })?;
            }

            tx.execute(
                "DELETE FROM _ideahub_bootstrap_migrations WHERE step_id = $1",
                &[&step.id],
            )
            .await?;

            tx.commit().await?;

            info!("Rolled back migration step {}", step.id);
            undone.push(step.id);
        }

        Ok(undone)
    }

    /// Warn when an applied step's recorded checksum no longer matches
    /// its current definition. Advisory only; drift here means the step
    /// source changed after it was applied.
    async fn verify_checksums(
        &self,
        client: &deadpool_postgres::Object,
        steps: &[MigrationStep],
        applied: &[String],
    ) {
        let rows = match client
            .query(
                "SELECT step_id, checksum FROM _ideahub_bootstrap_migrations",
                &[],
            )
            .await
        {
            Ok(rows) => rows,
            Err(_) => return,
        };

        for row in rows {
            let step_id: String = row.get(0);
            let recorded: String = row.get(1);

            if !applied.contains(&step_id) {
                continue;
            }

            if let Some(step) = steps.iter().find(|s| s.id == step_id) {
                let current = step.checksum();
                if current != recorded {
                    warn!(
                        "Checksum mismatch for applied step {}: ledger={}, current={}",
                        step_id, recorded, current
                    );
                }
            }
        }
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(
        id: &'static str,
        predecessor: Option<&'static str>,
        reversible: bool,
    ) -> MigrationStep {
        MigrationStep {
            id,
            predecessor,
            up: vec![format!("CREATE TABLE \"{}\" (id INT)", id)],
            down: reversible.then(|| vec![format!("DROP TABLE IF EXISTS \"{}\"", id)]),
        }
    }

    fn chain() -> Vec<MigrationStep> {
        vec![
            step("0001_a", None, true),
            step("0002_b", Some("0001_a"), true),
            step("0003_c", Some("0002_b"), true),
        ]
    }

    #[test]
    fn test_validate_chain_accepts_linked_sequence() {
        validate_chain(&chain()).unwrap();
    }

    #[test]
    fn test_validate_chain_rejects_broken_link() {
        let steps = vec![
            step("0001_a", None, true),
            step("0003_c", Some("0002_b"), true),
        ];
        assert!(matches!(
            validate_chain(&steps),
            Err(BootstrapError::StepOrderingViolation { .. })
        ));
    }

    #[test]
    fn test_plan_apply_empty_ledger_applies_everything() {
        let steps = chain();
        let pending = plan_apply(&steps, &[]).unwrap();
        let ids: Vec<&str> = pending.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["0001_a", "0002_b", "0003_c"]);
    }

    #[test]
    fn test_plan_apply_skips_applied_prefix() {
        let steps = chain();
        let applied = vec!["0001_a".to_string(), "0002_b".to_string()];
        let pending = plan_apply(&steps, &applied).unwrap();
        let ids: Vec<&str> = pending.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["0003_c"]);
    }

    #[test]
    fn test_plan_apply_fully_applied_is_empty() {
        let steps = chain();
        let applied = vec![
            "0001_a".to_string(),
            "0002_b".to_string(),
            "0003_c".to_string(),
        ];
        assert!(plan_apply(&steps, &applied).unwrap().is_empty());
    }

    #[test]
    fn test_plan_apply_detects_missing_predecessor() {
        // Deployment shipped step C without step B.
        let steps = vec![
            step("0001_a", None, true),
            step("0003_c", Some("0002_b"), true),
        ];
        let applied = vec!["0001_a".to_string()];

        let err = plan_apply(&steps, &applied).unwrap_err();
        match err {
            BootstrapError::StepOrderingViolation { step, missing } => {
                assert_eq!(step, "0003_c");
                assert_eq!(missing, "0002_b");
            }
            other => panic!("expected StepOrderingViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_apply_detects_out_of_order_ledger() {
        // Ledger claims C is applied but B is not.
        let steps = chain();
        let applied = vec!["0001_a".to_string(), "0003_c".to_string()];

        let err = plan_apply(&steps, &applied).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::StepOrderingViolation { .. }
        ));
    }

    #[test]
    fn test_plan_rollback_reverse_order() {
        let steps = chain();
        let applied = vec![
            "0001_a".to_string(),
            "0002_b".to_string(),
            "0003_c".to_string(),
        ];

        let to_undo = plan_rollback(&steps, &applied, "0001_a").unwrap();
        let ids: Vec<&str> = to_undo.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["0003_c", "0002_b"]);
    }

    #[test]
    fn test_plan_rollback_refuses_irreversible_step() {
        let steps = vec![
            step("0001_a", None, true),
            step("0002_b", Some("0001_a"), false),
            step("0003_c", Some("0002_b"), true),
        ];
        let applied = vec![
            "0001_a".to_string(),
            "0002_b".to_string(),
            "0003_c".to_string(),
        ];

        let err = plan_rollback(&steps, &applied, "0001_a").unwrap_err();
        match err {
            BootstrapError::IrreversibleStep { step } => assert_eq!(step, "0002_b"),
            other => panic!("expected IrreversibleStep, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_rollback_requires_applied_target() {
        let steps = chain();
        let applied = vec!["0001_a".to_string()];
        assert!(plan_rollback(&steps, &applied, "0003_c").is_err());
    }

    #[test]
    fn test_step_checksum_stable_and_sensitive() {
        let a = step("0001_a", None, true);
        let b = step("0001_a", None, true);
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);

        let c = step("0002_b", Some("0001_a"), true);
        assert_ne!(a.checksum(), c.checksum());
    }
}
