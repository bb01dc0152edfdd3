//! Database migration commands.
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! build time.

use sqlx::migrate::Migrator;

use super::{CommandError, connect};

static MIGRATOR: Migrator = sqlx::migrate!("../server/migrations");

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}

/// Drop every table and type, then re-run all migrations.
///
/// # Errors
///
/// Returns `CommandError::Invalid` unless `confirmed` is set, or an error if
/// the database operations fail.
pub async fn reset(confirmed: bool) -> Result<(), CommandError> {
    if !confirmed {
        return Err(CommandError::Invalid(
            "reset-db destroys all data; pass --yes to confirm".to_string(),
        ));
    }

    let pool = connect().await?;

    tracing::warn!("Dropping schema public...");
    sqlx::query("DROP SCHEMA public CASCADE")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE SCHEMA public").execute(&pool).await?;

    tracing::info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Database reset complete!");
    Ok(())
}
