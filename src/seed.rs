//! Seed/bootstrap step.
//!
//! Ensures exactly one privileged account exists after schema
//! initialization, so the platform is usable immediately after first
//! deploy. The configured identity is looked up by its unique email;
//! when absent it is created with an Argon2 credential hash and the
//! superuser flag set. An existing account is never touched, and a
//! unique-constraint violation from a concurrently seeding replica is
//! a benign no-op.

use crate::error::{BootstrapError, Result};
use crate::schema::ChangelogManager;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The privileged account was created by this run.
    Created(Uuid),
    /// An account with the configured email already existed; its
    /// credential hash was left unchanged.
    AlreadyPresent,
}

pub struct Seeder {
    changelog: ChangelogManager,
}

impl Seeder {
    pub fn new() -> Self {
        Self {
            changelog: ChangelogManager::new(),
        }
    }

    /// Runs strictly after schema initialization; depends on the
    /// account table existing.
    pub async fn ensure_first_superuser(
        &self,
        pool: &Pool,
        email: &str,
        password: &str,
    ) -> Result<SeedOutcome> {
        let client = pool.get().await?;

        let existing = client
            .query_opt("SELECT id FROM \"user\" WHERE email = $1", &[&email])
            .await
            .map_err(|e| BootstrapError::SeedFailed {
                email: email.to_string(),
                cause: format!("Lookup failed: {}", e),
            })?;

        if existing.is_some() {
            info!("Privileged account {} already present, leaving untouched", email);
            drop(client);
            self.changelog
                .record_seed_skipped(pool, email, "already present")
                .await;
            return Ok(SeedOutcome::AlreadyPresent);
        }

        let hashed = hash_password(password)?;
        let id = Uuid::new_v4();

        debug!("Creating privileged account {}", email);

        let insert = client
            .execute(
                r#"
                INSERT INTO "user" (id, email, hashed_password, is_active, is_superuser)
                VALUES ($1, $2, $3, TRUE, TRUE)
                "#,
                &[&id, &email, &hashed],
            )
            .await;

        drop(client);

        match insert {
            Ok(_) => {
                info!("Created privileged account {}", email);
                self.changelog.record_seed_created(pool, email).await;
                Ok(SeedOutcome::Created(id))
            }
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                // A concurrently starting replica seeded first.
                info!("Privileged account {} seeded concurrently elsewhere", email);
                self.changelog
                    .record_seed_skipped(pool, email, "concurrent seed")
                    .await;
                Ok(SeedOutcome::AlreadyPresent)
            }
            Err(e) => Err(BootstrapError::SeedFailed {
                email: email.to_string(),
                cause: e.to_string(),
            }),
        }
    }
}

impl Default for Seeder {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BootstrapError::Internal(format!("Password hashing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[test]
    fn test_hash_password_round_trip() {
        let hashed = hash_password("changethis").unwrap();
        let parsed = PasswordHash::new(&hashed).unwrap();
        assert!(Argon2::default()
            .verify_password(b"changethis", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("changethis").unwrap();
        let b = hash_password("changethis").unwrap();
        assert_ne!(a, b);
    }
}
