//! CLI subcommands.

pub mod migrate;
pub mod user;

use garage_web::config::{AppConfig, ConfigError};
use garage_web::db::{self, MigrateError, RepositoryError};
use garage_web::services::auth::AuthError;
use garage_web::services::storage::StorageError;
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] garage_core::UsernameError),

    #[error("No user named {0}")]
    UserNotFound(String),
}

/// Load configuration and open a migrated pool.
async fn connect() -> Result<(AppConfig, SqlitePool), CommandError> {
    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::migrate(&pool).await?;

    Ok((config, pool))
}
