//! Direct-create schema initializer
//!
//! The declarative strategy: every registry table absent from the
//! database is created, in foreign-key dependency order, with its
//! primary key, foreign keys, and indexes. Tables already present are
//! left untouched.
//!
//! Column-level drift is deliberately NOT detected: a column added to
//! or removed from the registry after a table exists is not reflected.
//! That matches the source system's create-all semantics; schema
//! evolution belongs to the migration ledger.
//!
//! Replica safety: application replicas may initialize the same fresh
//! database at once. A `duplicate_table` error from a concurrent
//! creator means the table exists, which is the goal state, so it
//! counts as a skip rather than a failure.

use crate::error::{BootstrapError, Result};
use crate::registry::SchemaRegistry;
use crate::schema::changelog::{ChangeType, ChangelogEntry, ChangelogManager};
use deadpool_postgres::Pool;
use serde::Serialize;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};

/// Result of a direct-create deployment
#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub tables_created: Vec<String>,
    pub tables_skipped: usize,
}

pub struct DirectCreator {
    changelog: ChangelogManager,
}

impl DirectCreator {
    pub fn new() -> Self {
        Self {
            changelog: ChangelogManager::new(),
        }
    }

    /// Create every registry table absent from the database.
    /// Safe to run on every startup.
    pub async fn deploy(&self, pool: &Pool, registry: &SchemaRegistry) -> Result<CreateReport> {
        registry.validate()?;
        let ordered = registry.in_creation_order()?;

        self.changelog.ensure_changelog_table(pool).await?;

        let client = pool.get().await?;

        let mut created: Vec<(&str, String)> = Vec::new();
        let mut lost_races: Vec<&str> = Vec::new();
        let mut skipped = 0;

        for table in ordered {
            if self.table_exists(&client, table.name).await? {
                debug!("Table {} already present, leaving untouched", table.name);
                skipped += 1;
                continue;
            }

            debug!("Creating table {}", table.name);

            match client.batch_execute(&table.create_ddl()).await {
                Ok(_) => {
                    info!("Created table {}", table.name);
                }
                Err(e) if e.code() == Some(&SqlState::DUPLICATE_TABLE) => {
                    // A concurrent replica created it first; that is
                    // the goal state.
                    info!("Table {} created concurrently elsewhere, skipping", table.name);
                    lost_races.push(table.name);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    return Err(BootstrapError::SchemaConflict {
                        object: table.name.to_string(),
                        cause: e.to_string(),
                    });
                }
            }

            for index_sql in table.index_ddl() {
                client
                    .batch_execute(&index_sql)
                    .await
                    .map_err(|e| BootstrapError::SchemaConflict {
                        object: table.name.to_string(),
                        cause: format!("Index creation failed: {}", e),
                    })?;
            }

            created.push((table.name, table.checksum()));
        }

        // Release the working connection before the audit writes take
        // their own.
        drop(client);

        for (name, checksum) in &created {
            self.changelog.record_table_created(pool, name, checksum).await;
        }
        for name in lost_races {
            self.changelog
                .record(
                    pool,
                    ChangelogEntry {
                        change_type: ChangeType::TableSkipped,
                        object_name: name.to_string(),
                        details: Some(serde_json::json!({
                            "reason": "created by concurrent initializer"
                        })),
                    },
                )
                .await;
        }

        let created: Vec<String> = created.into_iter().map(|(name, _)| name.to_string()).collect();

        info!(
            "Direct create complete: {} created, {} skipped",
            created.len(),
            skipped
        );

        Ok(CreateReport {
            tables_created: created,
            tables_skipped: skipped,
        })
    }

    async fn table_exists(
        &self,
        client: &deadpool_postgres::Object,
        table_name: &str,
    ) -> Result<bool> {
        let row = client
            .query_opt(
                r#"
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1
                "#,
                &[&table_name],
            )
            .await
            .map_err(|e| BootstrapError::SchemaConflict {
                object: table_name.to_string(),
                cause: format!("Existence check failed: {}", e),
            })?;

        Ok(row.is_some())
    }

    /// List application tables in the public schema, bookkeeping
    /// tables excluded.
    pub async fn list_tables(&self, pool: &Pool) -> Result<Vec<String>> {
        let client = pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT table_name
                FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_type = 'BASE TABLE'
                AND table_name NOT LIKE '\_ideahub\_bootstrap\_%'
                ORDER BY table_name
                "#,
                &[],
            )
            .await?;

        let tables: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        Ok(tables)
    }
}

impl Default for DirectCreator {
    fn default() -> Self {
        Self::new()
    }
}
