//! The IdeaHub schema registry.
//!
//! Every table of the platform, declared as an explicit [`TableSpec`].
//! The registry validates itself (identifiers, foreign-key targets) and
//! computes a creation order from the foreign-key graph so the
//! initializer never has to guess.
//!
//! Naming note: entity tables keep the names the production database
//! actually uses (`userprofile`, `llminputlog`, ...); the two join
//! tables were named explicitly (`team_member`, `shortlist_idea`).

use crate::error::{BootstrapError, Result};
use crate::registry::types::{col, fk, CascadePolicy, ColumnSpec, IndexSpec, SqlType, TableSpec};
use tracing::info;

pub struct SchemaRegistry {
    tables: Vec<TableSpec>,
}

fn uuid_pk() -> ColumnSpec {
    col("id", SqlType::Uuid)
}

fn timestamps() -> [ColumnSpec; 2] {
    [
        col("created_at", SqlType::TimestampTz),
        col("updated_at", SqlType::TimestampTz),
    ]
}

impl SchemaRegistry {
    /// The full IdeaHub platform schema.
    pub fn ideahub() -> Self {
        let mut tables = Vec::new();

        // Identity
        tables.push(TableSpec {
            name: "user",
            columns: vec![
                uuid_pk(),
                col("email", SqlType::Varchar(255)),
                col("hashed_password", SqlType::Varchar(255)),
                col("is_active", SqlType::Boolean).default_sql("TRUE"),
                col("is_superuser", SqlType::Boolean).default_sql("FALSE"),
                col("full_name", SqlType::Varchar(255)).nullable(),
            ],
            primary_key: &["id"],
            foreign_keys: vec![],
            indexes: vec![IndexSpec {
                name: "ix_user_email",
                columns: &["email"],
                unique: true,
            }],
        });

        tables.push(TableSpec {
            name: "item",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("description", SqlType::Varchar(255)).nullable(),
                col("owner_id", SqlType::Uuid),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("owner_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "userprofile",
            columns: vec![
                uuid_pk(),
                col("bio", SqlType::Varchar(1000)).nullable(),
                col("location", SqlType::Varchar(255)).nullable(),
                col("website", SqlType::Varchar(255)).nullable(),
                col("linkedin_url", SqlType::Varchar(255)).nullable(),
                col("twitter_url", SqlType::Varchar(255)).nullable(),
                col("github_url", SqlType::Varchar(255)).nullable(),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "userresume",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("is_public", SqlType::Boolean).default_sql("FALSE"),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "repo",
            columns: vec![
                uuid_pk(),
                col("name", SqlType::Varchar(255)),
                col("description", SqlType::Varchar(1000)).nullable(),
                col("url", SqlType::Varchar(500)),
                col("is_private", SqlType::Boolean).default_sql("FALSE"),
                col("language", SqlType::Varchar(100)).nullable(),
                col("stars", SqlType::Integer).default_sql("0"),
                col("forks", SqlType::Integer).default_sql("0"),
                col("owner_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("owner_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        // Teams
        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "team",
            columns: vec![
                uuid_pk(),
                col("name", SqlType::Varchar(255)),
                col("description", SqlType::Varchar(1000)).nullable(),
                col("is_public", SqlType::Boolean).default_sql("TRUE"),
                col("owner_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("owner_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        tables.push(TableSpec {
            name: "team_member",
            columns: vec![col("team_id", SqlType::Uuid), col("user_id", SqlType::Uuid)],
            primary_key: &["team_id", "user_id"],
            foreign_keys: vec![
                fk("team_id", "team", CascadePolicy::Cascade),
                fk("user_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        // Ideas
        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "idea",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("description", SqlType::Text),
                col("status", SqlType::Varchar(50)).default_sql("'draft'"),
                col("is_public", SqlType::Boolean).default_sql("FALSE"),
                col("tags", SqlType::Varchar(500)).nullable(),
                col("creator_id", SqlType::Uuid),
                col("team_id", SqlType::Uuid).nullable(),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("creator_id", "user", CascadePolicy::Cascade),
                fk("team_id", "team", CascadePolicy::SetNull),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "shortlist",
            columns: vec![
                uuid_pk(),
                col("name", SqlType::Varchar(255)),
                col("description", SqlType::Varchar(1000)).nullable(),
                col("is_public", SqlType::Boolean).default_sql("FALSE"),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        tables.push(TableSpec {
            name: "shortlist_idea",
            columns: vec![
                col("shortlist_id", SqlType::Uuid),
                col("idea_id", SqlType::Uuid),
            ],
            primary_key: &["shortlist_id", "idea_id"],
            foreign_keys: vec![
                fk("shortlist_id", "shortlist", CascadePolicy::Cascade),
                fk("idea_id", "idea", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        // Idea analyses
        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "deepdiveversion",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("version", SqlType::Integer).default_sql("1"),
                col("status", SqlType::Varchar(50)).default_sql("'draft'"),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "casestudy",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("company_name", SqlType::Varchar(255)).nullable(),
                col("industry", SqlType::Varchar(100)).nullable(),
                col("funding_stage", SqlType::Varchar(100)).nullable(),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "marketsnapshot",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("market_size", SqlType::Varchar(255)).nullable(),
                col("growth_rate", SqlType::Varchar(100)).nullable(),
                col("key_players", SqlType::Varchar(1000)).nullable(),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "lensinsight",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("lens_type", SqlType::Varchar(100)),
                col("insights", SqlType::Text).nullable(),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "vcthesiscomparison",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("vc_firm", SqlType::Varchar(255)).nullable(),
                col("thesis_alignment_score", SqlType::DoublePrecision).nullable(),
                col("notes", SqlType::Text).nullable(),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "investordeck",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("content", SqlType::Text),
                col("deck_type", SqlType::Varchar(100)),
                col("version", SqlType::Integer).default_sql("1"),
                col("is_finalized", SqlType::Boolean).default_sql("FALSE"),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        // Collaboration
        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "ideacollaborator",
            columns: vec![
                uuid_pk(),
                col("role", SqlType::Varchar(100)),
                col("permissions", SqlType::Varchar(500)).nullable(),
                col("idea_id", SqlType::Uuid),
                col("user_id", SqlType::Uuid),
                col("invited_by", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("user_id", "user", CascadePolicy::Cascade),
                fk("invited_by", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "ideachangeproposal",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("description", SqlType::Text),
                col("proposed_changes", SqlType::Text),
                col("status", SqlType::Varchar(50)).default_sql("'pending'"),
                col("reason", SqlType::Text).nullable(),
                col("idea_id", SqlType::Uuid),
                col("proposer_id", SqlType::Uuid),
                col("reviewer_id", SqlType::Uuid).nullable(),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("proposer_id", "user", CascadePolicy::Cascade),
                fk("reviewer_id", "user", CascadePolicy::SetNull),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "comment",
            columns: vec![
                uuid_pk(),
                col("content", SqlType::Text),
                col("is_edited", SqlType::Boolean).default_sql("FALSE"),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                col("parent_id", SqlType::Uuid).nullable(),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
                fk("parent_id", "comment", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "invite",
            columns: vec![
                uuid_pk(),
                col("email", SqlType::Varchar(255)),
                col("invite_type", SqlType::Varchar(50)),
                col("status", SqlType::Varchar(50)).default_sql("'pending'"),
                col("message", SqlType::Varchar(1000)).nullable(),
                col("inviter_id", SqlType::Uuid),
                col("team_id", SqlType::Uuid).nullable(),
                col("idea_id", SqlType::Uuid).nullable(),
                col("token", SqlType::Varchar(255)).unique(),
                col("expires_at", SqlType::TimestampTz),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("inviter_id", "user", CascadePolicy::Cascade),
                fk("team_id", "team", CascadePolicy::Cascade),
                fk("idea_id", "idea", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "ideaversionqna",
            columns: vec![
                uuid_pk(),
                col("question", SqlType::Text),
                col("answer", SqlType::Text).nullable(),
                col("question_type", SqlType::Varchar(100)),
                col("priority", SqlType::Integer).default_sql("1"),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        // Activity and ops
        tables.push(TableSpec {
            name: "auditlog",
            columns: vec![
                uuid_pk(),
                col("action", SqlType::Varchar(255)),
                col("entity_type", SqlType::Varchar(100)),
                col("entity_id", SqlType::Uuid),
                col("old_values", SqlType::Text).nullable(),
                col("new_values", SqlType::Text).nullable(),
                col("ip_address", SqlType::Varchar(45)).nullable(),
                col("user_agent", SqlType::Varchar(500)).nullable(),
                col("user_id", SqlType::Uuid).nullable(),
                col("created_at", SqlType::TimestampTz),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::SetNull)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "profileqna",
            columns: vec![
                uuid_pk(),
                col("question", SqlType::Text),
                col("answer", SqlType::Text).nullable(),
                col("category", SqlType::Varchar(100)),
                col("is_public", SqlType::Boolean).default_sql("TRUE"),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "notification",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("message", SqlType::Text),
                col("notification_type", SqlType::Varchar(100)),
                col("is_read", SqlType::Boolean).default_sql("FALSE"),
                col("extra_data", SqlType::Text).nullable(),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "exportrecord",
            columns: vec![
                uuid_pk(),
                col("export_type", SqlType::Varchar(100)),
                col("entity_type", SqlType::Varchar(100)),
                col("entity_id", SqlType::Uuid),
                col("file_name", SqlType::Varchar(255)),
                col("file_size", SqlType::BigInt).nullable(),
                col("status", SqlType::Varchar(50)).default_sql("'processing'"),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "iteration",
            columns: vec![
                uuid_pk(),
                col("title", SqlType::Varchar(255)),
                col("description", SqlType::Text),
                col("version", SqlType::Integer).default_sql("1"),
                col("status", SqlType::Varchar(50)).default_sql("'draft'"),
                col("goals", SqlType::Text).nullable(),
                col("outcomes", SqlType::Text).nullable(),
                col("idea_id", SqlType::Uuid),
                col("author_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("author_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        tables.push(TableSpec {
            name: "suggested",
            columns: vec![
                uuid_pk(),
                col("entity_type", SqlType::Varchar(100)),
                col("entity_id", SqlType::Uuid),
                col("suggestion_type", SqlType::Varchar(100)),
                col("score", SqlType::DoublePrecision).default_sql("0"),
                col("reason", SqlType::Text).nullable(),
                col("extra_data", SqlType::Text).nullable(),
                col("user_id", SqlType::Uuid),
                col("created_at", SqlType::TimestampTz),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "iterating",
            columns: vec![
                uuid_pk(),
                col("current_stage", SqlType::Varchar(100)),
                col("progress_percentage", SqlType::DoublePrecision).default_sql("0"),
                col("notes", SqlType::Text).nullable(),
                col("next_steps", SqlType::Text).nullable(),
                col("blockers", SqlType::Text).nullable(),
                col("idea_id", SqlType::Uuid),
                col("user_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("user_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        });

        // LLM request logging
        tables.push(TableSpec {
            name: "llminputlog",
            columns: vec![
                uuid_pk(),
                col("input_text", SqlType::Text),
                col("input_type", SqlType::Varchar(100)),
                col("model_name", SqlType::Varchar(100)).nullable(),
                col("parameters", SqlType::Text).nullable(),
                col("context", SqlType::Text).nullable(),
                col("user_id", SqlType::Uuid).nullable(),
                col("session_id", SqlType::Varchar(255)).nullable(),
                col("created_at", SqlType::TimestampTz),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("user_id", "user", CascadePolicy::SetNull)],
            indexes: vec![],
        });

        let [created_at, updated_at] = timestamps();
        tables.push(TableSpec {
            name: "llmprocessinglog",
            columns: vec![
                uuid_pk(),
                col("output_text", SqlType::Text).nullable(),
                col("status", SqlType::Varchar(50)).default_sql("'processing'"),
                col("error_message", SqlType::Text).nullable(),
                col("processing_time_ms", SqlType::Integer).nullable(),
                col("tokens_used", SqlType::Integer).nullable(),
                col("cost", SqlType::DoublePrecision).nullable(),
                col("input_log_id", SqlType::Uuid),
                created_at,
                updated_at,
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("input_log_id", "llminputlog", CascadePolicy::Cascade)],
            indexes: vec![],
        });

        Self { tables }
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Check the registry as a whole: each table descriptor is valid, table
    /// names are unique, and every foreign key points at a declared
    /// table.
    pub fn validate(&self) -> Result<()> {
        for table in &self.tables {
            table.validate()?;

            if self.tables.iter().filter(|t| t.name == table.name).count() > 1 {
                return Err(BootstrapError::SchemaConflict {
                    object: table.name.to_string(),
                    cause: "Duplicate table declaration".to_string(),
                });
            }

            for target in table.depends_on() {
                if self.table(target).is_none() {
                    return Err(BootstrapError::SchemaConflict {
                        object: table.name.to_string(),
                        cause: format!("Foreign key references undeclared table {}", target),
                    });
                }
            }
        }

        Ok(())
    }

    /// Order tables so every foreign-key target precedes its referrers
    /// (topological sort, deterministic name tie-breaking).
    pub fn in_creation_order(&self) -> Result<Vec<&TableSpec>> {
        if self.tables.is_empty() {
            return Ok(Vec::new());
        }

        let name_to_idx: std::collections::HashMap<&str, usize> = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name, i))
            .collect();

        let mut in_degree: Vec<usize> = vec![0; self.tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.tables.len()];

        for (idx, table) in self.tables.iter().enumerate() {
            for dep_name in table.depends_on() {
                if let Some(&dep_idx) = name_to_idx.get(dep_name) {
                    if dep_idx != idx {
                        dependents[dep_idx].push(idx);
                        in_degree[idx] += 1;
                    }
                }
            }
        }

        // Kahn's algorithm with the queue kept name-sorted
        let mut queue: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| i)
            .collect();
        queue.sort_by(|a, b| self.tables[*a].name.cmp(self.tables[*b].name));

        let mut ordered_indices = Vec::new();

        while let Some(idx) = queue.pop() {
            ordered_indices.push(idx);

            for &dependent_idx in &dependents[idx] {
                in_degree[dependent_idx] -= 1;
                if in_degree[dependent_idx] == 0 {
                    queue.push(dependent_idx);
                    queue.sort_by(|a, b| self.tables[*a].name.cmp(self.tables[*b].name));
                }
            }
        }

        if ordered_indices.len() != self.tables.len() {
            let remaining: Vec<&str> = self
                .tables
                .iter()
                .enumerate()
                .filter(|(i, _)| !ordered_indices.contains(i))
                .map(|(_, t)| t.name)
                .collect();

            return Err(BootstrapError::SchemaConflict {
                object: "registry".to_string(),
                cause: format!(
                    "Circular dependency between tables: {}",
                    remaining.join(", ")
                ),
            });
        }

        let ordered: Vec<&TableSpec> = ordered_indices
            .into_iter()
            .map(|i| &self.tables[i])
            .collect();

        info!("Creation order computed for {} tables", ordered.len());

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_valid() {
        let registry = SchemaRegistry::ideahub();
        registry.validate().unwrap();
        assert_eq!(registry.len(), 30);
    }

    #[test]
    fn test_known_tables_present() {
        let registry = SchemaRegistry::ideahub();
        for name in [
            "user",
            "team",
            "team_member",
            "idea",
            "shortlist_idea",
            "comment",
            "llmprocessinglog",
        ] {
            assert!(registry.table(name).is_some(), "missing table {}", name);
        }
    }

    #[test]
    fn test_creation_order_respects_foreign_keys() {
        let registry = SchemaRegistry::ideahub();
        let ordered = registry.in_creation_order().unwrap();
        assert_eq!(ordered.len(), registry.len());

        let position = |name: &str| ordered.iter().position(|t| t.name == name).unwrap();

        assert!(position("user") < position("item"));
        assert!(position("user") < position("team"));
        assert!(position("team") < position("team_member"));
        assert!(position("team") < position("idea"));
        assert!(position("idea") < position("shortlist_idea"));
        assert!(position("shortlist") < position("shortlist_idea"));
        assert!(position("llminputlog") < position("llmprocessinglog"));
    }

    #[test]
    fn test_creation_order_is_deterministic() {
        let a: Vec<&str> = SchemaRegistry::ideahub()
            .in_creation_order()
            .unwrap()
            .iter()
            .map(|t| t.name)
            .collect();
        let b: Vec<&str> = SchemaRegistry::ideahub()
            .in_creation_order()
            .unwrap()
            .iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cascade_policies_match_ownership() {
        let registry = SchemaRegistry::ideahub();

        // Content is deleted with its owning aggregate
        let comment = registry.table("comment").unwrap();
        assert!(comment
            .foreign_keys
            .iter()
            .all(|fk| fk.on_delete == crate::registry::types::CascadePolicy::Cascade));

        // Audit trail survives account deletion
        let auditlog = registry.table("auditlog").unwrap();
        assert_eq!(
            auditlog.foreign_keys[0].on_delete,
            crate::registry::types::CascadePolicy::SetNull
        );

        // An idea is decoupled, not deleted, when its team goes away
        let idea = registry.table("idea").unwrap();
        let team_fk = idea
            .foreign_keys
            .iter()
            .find(|fk| fk.references_table == "team")
            .unwrap();
        assert_eq!(
            team_fk.on_delete,
            crate::registry::types::CascadePolicy::SetNull
        );
    }

    #[test]
    fn test_email_uniqueness_enforced_by_index() {
        let registry = SchemaRegistry::ideahub();
        let user = registry.table("user").unwrap();
        let ix = &user.indexes[0];
        assert_eq!(ix.name, "ix_user_email");
        assert!(ix.unique);
    }

    #[test]
    fn test_circular_dependency_detection() {
        use crate::registry::types::{col, fk, CascadePolicy, SqlType, TableSpec};

        let registry = SchemaRegistry {
            tables: vec![
                TableSpec {
                    name: "a",
                    columns: vec![col("id", SqlType::Uuid), col("b_id", SqlType::Uuid)],
                    primary_key: &["id"],
                    foreign_keys: vec![fk("b_id", "b", CascadePolicy::Cascade)],
                    indexes: vec![],
                },
                TableSpec {
                    name: "b",
                    columns: vec![col("id", SqlType::Uuid), col("a_id", SqlType::Uuid)],
                    primary_key: &["id"],
                    foreign_keys: vec![fk("a_id", "a", CascadePolicy::Cascade)],
                    indexes: vec![],
                },
            ],
        };

        let result = registry.in_creation_order();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Circular dependency"));
    }
}
