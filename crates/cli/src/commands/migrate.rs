//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! garage-cli migrate
//! ```
//!
//! Applies the embedded schema migrations and creates the session table.
//! The web server does the same at start-up; this command exists for
//! deployments that migrate before rolling out a new binary.

use super::CommandError;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let (_, pool) = super::connect().await?;

    tracing::info!(
        migrations = garage_web::db::MIGRATOR.iter().count(),
        "Migrations complete!"
    );
    pool.close().await;
    Ok(())
}
