//! Schema Registry
//!
//! The authoritative, in-process description of the IdeaHub schema:
//! tables, columns, constraints, and relationships, declared as plain
//! values and validated before any DDL touches the database.
//!
//! Both initialization strategies consume this registry. Direct create
//! renders and executes each table's DDL in dependency order; the
//! migration ledger renders its step DDL from the same descriptors so
//! the two strategies cannot drift apart.

mod tables;
mod types;

pub use tables::SchemaRegistry;
pub use types::{
    col, fk, CascadePolicy, ColumnSpec, ForeignKeySpec, IndexSpec, SqlType, TableSpec,
};
