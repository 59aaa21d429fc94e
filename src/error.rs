use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Database unreachable after {attempts} attempts: {cause}")]
    ConnectionUnavailable { attempts: u32, cause: String },

    #[error("Schema conflict on {object}: {cause}")]
    SchemaConflict { object: String, cause: String },

    #[error("Migration step {step} cannot be applied: predecessor {missing} is not in the ledger")]
    StepOrderingViolation { step: String, missing: String },

    #[error("Migration step {step} has no declared inverse and cannot be rolled back")]
    IrreversibleStep { step: String },

    #[error("Seeding privileged account {email} failed: {cause}")]
    SeedFailed { email: String, cause: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio_postgres::Error> for BootstrapError {
    fn from(err: tokio_postgres::Error) -> Self {
        BootstrapError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for BootstrapError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        BootstrapError::Internal(format!("Pool error: {}", err))
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        BootstrapError::Internal(format!("IO error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_failure() {
        let err = BootstrapError::ConnectionUnavailable {
            attempts: 300,
            cause: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("300 attempts"));

        let err = BootstrapError::StepOrderingViolation {
            step: "0003_ideas".to_string(),
            missing: "0002_teams".to_string(),
        };
        assert!(err.to_string().contains("0003_ideas"));
        assert!(err.to_string().contains("0002_teams"));
    }
}
