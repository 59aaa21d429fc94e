//! The IdeaHub migration step chain.
//!
//! Steps group related tables and render their DDL from the schema
//! registry, so the ledger strategy and the direct-create strategy can
//! never describe different schemas. Within a step, tables are listed
//! in foreign-key order; the declared inverse drops them in reverse.

use crate::error::{BootstrapError, Result};
use crate::registry::SchemaRegistry;
use crate::schema::migration::MigrationStep;

const STEP_TABLES: &[(&str, &[&str])] = &[
    (
        "0001_accounts",
        &["user", "item", "userprofile", "userresume", "repo"],
    ),
    ("0002_teams", &["team", "team_member"]),
    ("0003_ideas", &["idea", "shortlist", "shortlist_idea"]),
    (
        "0004_idea_analyses",
        &[
            "deepdiveversion",
            "casestudy",
            "marketsnapshot",
            "lensinsight",
            "vcthesiscomparison",
            "investordeck",
        ],
    ),
    (
        "0005_collaboration",
        &[
            "ideacollaborator",
            "ideachangeproposal",
            "comment",
            "invite",
            "ideaversionqna",
        ],
    ),
    (
        "0006_activity",
        &[
            "auditlog",
            "profileqna",
            "notification",
            "exportrecord",
            "iteration",
            "suggested",
            "iterating",
        ],
    ),
    ("0007_llm_logs", &["llminputlog", "llmprocessinglog"]),
];

/// Build the full step chain from the registry.
pub fn migration_steps(registry: &SchemaRegistry) -> Result<Vec<MigrationStep>> {
    let mut steps = Vec::new();
    let mut predecessor: Option<&'static str> = None;

    for &(id, table_names) in STEP_TABLES {
        let mut up = Vec::new();
        let mut down = Vec::new();

        for name in table_names {
            let table =
                registry
                    .table(name)
                    .ok_or_else(|| BootstrapError::SchemaConflict {
                        object: id.to_string(),
                        cause: format!("Step references undeclared table {}", name),
                    })?;
            up.push(table.create_ddl());
            up.extend(table.index_ddl());
        }

        for name in table_names.iter().rev() {
            if let Some(table) = registry.table(name) {
                down.push(table.drop_ddl());
            }
        }

        steps.push(MigrationStep {
            id,
            predecessor,
            up,
            down: Some(down),
        });
        predecessor = Some(id);
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::migration::{plan_apply, validate_chain};

    #[test]
    fn test_chain_is_well_linked() {
        let registry = SchemaRegistry::ideahub();
        let steps = migration_steps(&registry).unwrap();
        assert_eq!(steps.len(), 7);
        validate_chain(&steps).unwrap();
        assert_eq!(steps[0].predecessor, None);
        assert_eq!(steps[1].id, "0002_teams");
        assert_eq!(steps[1].predecessor, Some("0001_accounts"));
    }

    #[test]
    fn test_every_table_in_exactly_one_step() {
        let registry = SchemaRegistry::ideahub();

        let mut step_tables: Vec<&str> = STEP_TABLES
            .iter()
            .flat_map(|(_, tables)| tables.iter().copied())
            .collect();
        assert_eq!(step_tables.len(), registry.len());

        step_tables.sort_unstable();
        step_tables.dedup();
        assert_eq!(step_tables.len(), registry.len());

        for table in registry.tables() {
            assert!(
                step_tables.binary_search(&table.name).is_ok(),
                "table {} missing from step chain",
                table.name
            );
        }
    }

    #[test]
    fn test_teams_step_creates_team_then_membership() {
        let registry = SchemaRegistry::ideahub();
        let steps = migration_steps(&registry).unwrap();
        let teams = steps.iter().find(|s| s.id == "0002_teams").unwrap();

        assert!(teams.up[0].starts_with("CREATE TABLE \"team\""));
        assert!(teams.up[1].starts_with("CREATE TABLE \"team_member\""));

        let down = teams.down.as_ref().unwrap();
        assert_eq!(down[0], "DROP TABLE IF EXISTS \"team_member\"");
        assert_eq!(down[1], "DROP TABLE IF EXISTS \"team\"");
    }

    #[test]
    fn test_full_chain_pending_on_empty_ledger() {
        let registry = SchemaRegistry::ideahub();
        let steps = migration_steps(&registry).unwrap();
        let pending = plan_apply(&steps, &[]).unwrap();
        assert_eq!(pending.len(), steps.len());
    }

    #[test]
    fn test_all_steps_reversible() {
        let registry = SchemaRegistry::ideahub();
        let steps = migration_steps(&registry).unwrap();
        assert!(steps.iter().all(|s| s.down.is_some()));
    }
}
