mod changelog;
mod create;
mod migration;
mod steps;

pub use changelog::{ChangeType, ChangelogEntry, ChangelogManager, ChangelogRecord};
pub use create::{CreateReport, DirectCreator};
pub use migration::{
    plan_apply, plan_rollback, validate_chain, MigrationRunner, MigrationStep, LEDGER_TABLE,
};
pub use steps::migration_steps;
