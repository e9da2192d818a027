//! Database migration commands.
//!
//! Migrations live in `crates/gallery/migrations/` and are embedded into the
//! binary at compile time. Each file is applied once and recorded in
//! `_sqlx_migrations`.
//!
//! # Environment Variables
//!
//! - `GALLERY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use bid_gallery_server::db::create_pool;
use thiserror::Error;

use super::database_url;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending gallery migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let url = database_url().ok_or(MigrationError::MissingEnvVar("GALLERY_DATABASE_URL"))?;

    tracing::info!("Connecting to gallery database...");
    let pool = create_pool(&url).await?;

    let migrator = sqlx::migrate!("../gallery/migrations");
    tracing::info!(count = migrator.iter().count(), "Running gallery migrations");
    migrator.run(&pool).await?;

    tracing::info!("Gallery migrations complete");
    Ok(())
}
