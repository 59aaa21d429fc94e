//! Schema descriptor types.
//!
//! The registry is an explicit, enumerable description of the schema:
//! every table, column, constraint, and relationship is a plain value
//! built at initialization time. Relationships carry an explicit
//! cascade policy resolved when the DDL is rendered, not at runtime.
//!
//! Rendering is deterministic so that a table definition can be
//! checksummed and compared across runs.

use crate::error::{BootstrapError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Column types used by the IdeaHub schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Uuid,
    Varchar(u32),
    Text,
    Boolean,
    Integer,
    BigInt,
    DoublePrecision,
    TimestampTz,
}

impl SqlType {
    pub fn as_sql(&self) -> String {
        match self {
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            SqlType::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }
}

/// What happens to a child row when its parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    Cascade,
    SetNull,
    Restrict,
}

impl CascadePolicy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CascadePolicy::Cascade => "CASCADE",
            CascadePolicy::SetNull => "SET NULL",
            CascadePolicy::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: SqlType,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<&'static str>,
}

/// Shorthand constructor: NOT NULL, no default, no unique constraint.
pub fn col(name: &'static str, ty: SqlType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: false,
        unique: false,
        default: None,
    }
}

impl ColumnSpec {
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_sql(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKeySpec {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
    pub on_delete: CascadePolicy,
}

/// Foreign key to another table's `id` column.
pub fn fk(
    column: &'static str,
    references_table: &'static str,
    on_delete: CascadePolicy,
) -> ForeignKeySpec {
    ForeignKeySpec {
        column,
        references_table,
        references_column: "id",
        on_delete,
    }
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: &'static [&'static str],
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    /// Tables this one references through foreign keys. A
    /// self-reference (e.g. threaded comments) is not a dependency.
    pub fn depends_on(&self) -> Vec<&'static str> {
        let mut deps: Vec<&'static str> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.references_table)
            .filter(|t| *t != self.name)
            .collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    /// Check every identifier in the descriptor before any of it reaches DDL.
    pub fn validate(&self) -> Result<()> {
        let mut idents: Vec<&str> = vec![self.name];
        idents.extend(self.columns.iter().map(|c| c.name));
        idents.extend(self.primary_key.iter().copied());
        for fk in &self.foreign_keys {
            idents.push(fk.column);
            idents.push(fk.references_table);
            idents.push(fk.references_column);
        }
        for idx in &self.indexes {
            idents.push(idx.name);
            idents.extend(idx.columns.iter().copied());
        }

        for ident in idents {
            if !is_valid_identifier(ident) {
                return Err(BootstrapError::SchemaConflict {
                    object: self.name.to_string(),
                    cause: format!("Invalid identifier: {}", ident),
                });
            }
        }

        if self.primary_key.is_empty() {
            return Err(BootstrapError::SchemaConflict {
                object: self.name.to_string(),
                cause: "Table has no primary key".to_string(),
            });
        }

        for pk_col in self.primary_key {
            if !self.columns.iter().any(|c| c.name == *pk_col) {
                return Err(BootstrapError::SchemaConflict {
                    object: self.name.to_string(),
                    cause: format!("Primary key column {} is not declared", pk_col),
                });
            }
        }

        for fk in &self.foreign_keys {
            if !self.columns.iter().any(|c| c.name == fk.column) {
                return Err(BootstrapError::SchemaConflict {
                    object: self.name.to_string(),
                    cause: format!("Foreign key column {} is not declared", fk.column),
                });
            }
        }

        Ok(())
    }

    /// Render the full `CREATE TABLE` statement.
    pub fn create_ddl(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        for column in &self.columns {
            let mut line = format!("    \"{}\" {}", column.name, column.ty.as_sql());
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = column.default {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            if column.unique {
                line.push_str(" UNIQUE");
            }
            lines.push(line);
        }

        let pk_cols: Vec<String> = self
            .primary_key
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect();
        lines.push(format!("    PRIMARY KEY ({})", pk_cols.join(", ")));

        for fk in &self.foreign_keys {
            lines.push(format!(
                "    FOREIGN KEY (\"{}\") REFERENCES \"{}\" (\"{}\") ON DELETE {}",
                fk.column,
                fk.references_table,
                fk.references_column,
                fk.on_delete.as_sql()
            ));
        }

        format!(
            "CREATE TABLE \"{}\" (\n{}\n)",
            self.name,
            lines.join(",\n")
        )
    }

    /// Render secondary index statements, executed after the table.
    pub fn index_ddl(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|idx| {
                let cols: Vec<String> = idx.columns.iter().map(|c| format!("\"{}\"", c)).collect();
                let unique = if idx.unique { "UNIQUE " } else { "" };
                format!(
                    "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{}\" ({})",
                    unique,
                    idx.name,
                    self.name,
                    cols.join(", ")
                )
            })
            .collect()
    }

    pub fn drop_ddl(&self) -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", self.name)
    }

    /// Stable fingerprint of the rendered definition.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.create_ddl().as_bytes());
        for index in self.index_ddl() {
            hasher.update(index.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let first_char = name.chars().next().unwrap();
    if !first_char.is_ascii_lowercase() && first_char != '_' {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TableSpec {
        TableSpec {
            name: "item",
            columns: vec![
                col("id", SqlType::Uuid),
                col("title", SqlType::Varchar(255)),
                col("description", SqlType::Varchar(255)).nullable(),
                col("owner_id", SqlType::Uuid),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("owner_id", "user", CascadePolicy::Cascade)],
            indexes: vec![],
        }
    }

    #[test]
    fn test_create_ddl_rendering() {
        let ddl = sample_table().create_ddl();
        assert!(ddl.starts_with("CREATE TABLE \"item\" ("));
        assert!(ddl.contains("\"id\" UUID NOT NULL"));
        assert!(ddl.contains("\"description\" VARCHAR(255),"));
        assert!(ddl.contains("PRIMARY KEY (\"id\")"));
        assert!(ddl.contains(
            "FOREIGN KEY (\"owner_id\") REFERENCES \"user\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_composite_primary_key() {
        let table = TableSpec {
            name: "team_member",
            columns: vec![col("team_id", SqlType::Uuid), col("user_id", SqlType::Uuid)],
            primary_key: &["team_id", "user_id"],
            foreign_keys: vec![
                fk("team_id", "team", CascadePolicy::Cascade),
                fk("user_id", "user", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        };

        let ddl = table.create_ddl();
        assert!(ddl.contains("PRIMARY KEY (\"team_id\", \"user_id\")"));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_set_null_and_default_rendering() {
        let table = TableSpec {
            name: "idea",
            columns: vec![
                col("id", SqlType::Uuid),
                col("status", SqlType::Varchar(50)).default_sql("'draft'"),
                col("team_id", SqlType::Uuid).nullable(),
            ],
            primary_key: &["id"],
            foreign_keys: vec![fk("team_id", "team", CascadePolicy::SetNull)],
            indexes: vec![],
        };

        let ddl = table.create_ddl();
        assert!(ddl.contains("\"status\" VARCHAR(50) NOT NULL DEFAULT 'draft'"));
        assert!(ddl.contains("ON DELETE SET NULL"));
    }

    #[test]
    fn test_index_ddl() {
        let table = TableSpec {
            name: "user",
            columns: vec![col("id", SqlType::Uuid), col("email", SqlType::Varchar(255))],
            primary_key: &["id"],
            foreign_keys: vec![],
            indexes: vec![IndexSpec {
                name: "ix_user_email",
                columns: &["email"],
                unique: true,
            }],
        };

        let stmts = table.index_ddl();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0],
            "CREATE UNIQUE INDEX IF NOT EXISTS \"ix_user_email\" ON \"user\" (\"email\")"
        );
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let table = TableSpec {
            name: "comment",
            columns: vec![
                col("id", SqlType::Uuid),
                col("idea_id", SqlType::Uuid),
                col("parent_id", SqlType::Uuid).nullable(),
            ],
            primary_key: &["id"],
            foreign_keys: vec![
                fk("idea_id", "idea", CascadePolicy::Cascade),
                fk("parent_id", "comment", CascadePolicy::Cascade),
            ],
            indexes: vec![],
        };

        assert_eq!(table.depends_on(), vec!["idea"]);
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let mut table = sample_table();
        table.columns.push(col("id; DROP TABLE", SqlType::Text));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_undeclared_pk_column() {
        let table = TableSpec {
            name: "orphan",
            columns: vec![col("a", SqlType::Text)],
            primary_key: &["id"],
            foreign_keys: vec![],
            indexes: vec![],
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_checksum_is_stable_and_sensitive() {
        let a = sample_table();
        let b = sample_table();
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);

        let mut c = sample_table();
        c.columns.push(col("extra", SqlType::Text).nullable());
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_valid_identifier() {
        assert!(is_valid_identifier("user"));
        assert!(is_valid_identifier("team_member"));
        assert!(is_valid_identifier("_ideahub_bootstrap_migrations"));

        assert!(!is_valid_identifier("")); // Empty
        assert!(!is_valid_identifier("DROP TABLE")); // SQL injection attempt
        assert!(!is_valid_identifier("1_test")); // Starts with number
        assert!(!is_valid_identifier("Test_DB")); // Contains uppercase
    }
}
