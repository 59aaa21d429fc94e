//! Changelog tracking for initialization events
//!
//! Every effectful startup operation (table created, migration applied
//! or rolled back, privileged account seeded) is appended to a
//! changelog table for audit and debugging. Changelog writes are
//! best-effort: losing an audit row never fails the phase that
//! triggered it.

use crate::error::{BootstrapError, Result};
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

pub const CHANGELOG_TABLE: &str = "_ideahub_bootstrap_changelog";

/// Types of initialization events that are tracked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    TableCreated,
    TableSkipped,
    MigrationApplied,
    MigrationRolledBack,
    SeedCreated,
    SeedSkipped,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::TableCreated => write!(f, "table_created"),
            ChangeType::TableSkipped => write!(f, "table_skipped"),
            ChangeType::MigrationApplied => write!(f, "migration_applied"),
            ChangeType::MigrationRolledBack => write!(f, "migration_rolled_back"),
            ChangeType::SeedCreated => write!(f, "seed_created"),
            ChangeType::SeedSkipped => write!(f, "seed_skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub change_type: ChangeType,
    pub object_name: String,
    pub details: Option<JsonValue>,
}

pub struct ChangelogManager;

impl ChangelogManager {
    pub fn new() -> Self {
        Self
    }

    /// Ensure the changelog table exists
    pub async fn ensure_changelog_table(&self, pool: &Pool) -> Result<()> {
        let client = pool.get().await?;

        client
            .execute(
                r#"
                CREATE TABLE IF NOT EXISTS _ideahub_bootstrap_changelog (
                    id SERIAL PRIMARY KEY,
                    change_type TEXT NOT NULL,
                    object_name TEXT NOT NULL,
                    change_detail JSONB,
                    executed_at TIMESTAMPTZ DEFAULT NOW()
                )
                "#,
                &[],
            )
            .await
            .map_err(|e| BootstrapError::SchemaConflict {
                object: CHANGELOG_TABLE.to_string(),
                cause: e.to_string(),
            })?;

        client
            .execute(
                r#"
                CREATE INDEX IF NOT EXISTS idx_changelog_executed_at
                ON _ideahub_bootstrap_changelog (executed_at DESC)
                "#,
                &[],
            )
            .await
            .ok(); // Ignore if exists

        debug!("Changelog table ensured");
        Ok(())
    }

    /// Append one entry; failures are logged and swallowed.
    pub async fn record(&self, pool: &Pool, entry: ChangelogEntry) {
        if let Err(e) = self.log_change(pool, &entry).await {
            warn!(
                "Changelog write failed for {} {}: {}",
                entry.change_type, entry.object_name, e
            );
        }
    }

    async fn log_change(&self, pool: &Pool, entry: &ChangelogEntry) -> Result<()> {
        let client = pool.get().await?;

        let change_type = entry.change_type.to_string();
        let detail_json = entry.details.as_ref().map(|d| d.to_string());

        client
            .execute(
                r#"
                INSERT INTO _ideahub_bootstrap_changelog
                    (change_type, object_name, change_detail)
                VALUES ($1, $2, $3::jsonb)
                "#,
                &[&change_type, &entry.object_name, &detail_json],
            )
            .await?;

        debug!("Logged changelog: {} - {}", change_type, entry.object_name);
        Ok(())
    }

    pub async fn record_table_created(&self, pool: &Pool, table: &str, checksum: &str) {
        self.record(
            pool,
            ChangelogEntry {
                change_type: ChangeType::TableCreated,
                object_name: table.to_string(),
                details: Some(serde_json::json!({ "checksum": checksum })),
            },
        )
        .await
    }

    pub async fn record_migration_applied(&self, pool: &Pool, step: &str, checksum: &str) {
        self.record(
            pool,
            ChangelogEntry {
                change_type: ChangeType::MigrationApplied,
                object_name: step.to_string(),
                details: Some(serde_json::json!({ "checksum": checksum })),
            },
        )
        .await
    }

    pub async fn record_migration_rolled_back(&self, pool: &Pool, step: &str) {
        self.record(
            pool,
            ChangelogEntry {
                change_type: ChangeType::MigrationRolledBack,
                object_name: step.to_string(),
                details: None,
            },
        )
        .await
    }

    pub async fn record_seed_created(&self, pool: &Pool, email: &str) {
        self.record(
            pool,
            ChangelogEntry {
                change_type: ChangeType::SeedCreated,
                object_name: email.to_string(),
                details: None,
            },
        )
        .await
    }

    pub async fn record_seed_skipped(&self, pool: &Pool, email: &str, reason: &str) {
        self.record(
            pool,
            ChangelogEntry {
                change_type: ChangeType::SeedSkipped,
                object_name: email.to_string(),
                details: Some(serde_json::json!({ "reason": reason })),
            },
        )
        .await
    }

    /// Get recent changelog entries
    pub async fn get_recent_entries(&self, pool: &Pool, limit: i64) -> Result<Vec<ChangelogRecord>> {
        let client = pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT id, change_type, object_name, change_detail, executed_at
                FROM _ideahub_bootstrap_changelog
                ORDER BY executed_at DESC
                LIMIT $1
                "#,
                &[&limit],
            )
            .await?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(ChangelogRecord {
                id: row.get(0),
                change_type: row.get(1),
                object_name: row.get(2),
                change_detail: row.get(3),
                executed_at: row.get(4),
            });
        }

        Ok(entries)
    }
}

impl Default for ChangelogManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A record from the changelog table
#[derive(Debug, Clone, Serialize)]
pub struct ChangelogRecord {
    pub id: i32,
    pub change_type: String,
    pub object_name: String,
    pub change_detail: Option<JsonValue>,
    pub executed_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::TableCreated.to_string(), "table_created");
        assert_eq!(ChangeType::MigrationApplied.to_string(), "migration_applied");
        assert_eq!(ChangeType::SeedSkipped.to_string(), "seed_skipped");
    }

    #[test]
    fn test_changelog_entry_serialization() {
        let entry = ChangelogEntry {
            change_type: ChangeType::MigrationApplied,
            object_name: "0002_teams".to_string(),
            details: Some(serde_json::json!({"checksum": "abc123"})),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("migration_applied"));
        assert!(json.contains("0002_teams"));
    }
}
