//! User management commands.
//!
//! There is no admin UI; administrators are created and managed here.

use garage_core::{UserId, Username};
use garage_web::db::{BoxRepository, UserRepository};
use garage_web::services::auth::AuthService;
use garage_web::services::storage::{self, StorageBackend};
use sqlx::SqlitePool;

use super::CommandError;

/// Create a new user.
///
/// # Errors
///
/// Returns an error for invalid input, a duplicate username or email, or a
/// database failure.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> Result<UserId, CommandError> {
    let (_, pool) = super::connect().await?;

    let user = AuthService::new(&pool)
        .create_user(username, email, password, is_admin)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Admin: {}",
        user.id,
        user.username,
        user.is_admin
    );
    Ok(user.id)
}

/// Grant administrator rights.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no such user exists.
pub async fn promote(username: &str) -> Result<(), CommandError> {
    let (_, pool) = super::connect().await?;
    let user_id = find_user(&pool, username).await?;

    UserRepository::new(&pool).set_admin(user_id, true).await?;

    tracing::info!("{} is now an administrator", username);
    Ok(())
}

/// Delete a user, releasing their box photos from storage first.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no such user exists, or a
/// storage error if a photo cannot be removed.
pub async fn delete(username: &str) -> Result<(), CommandError> {
    let (config, pool) = super::connect().await?;
    let backend = storage::from_config(&config.storage).await?;

    let removed = delete_user(&pool, backend.as_ref(), username).await?;

    tracing::info!(
        "Deleted {} with {} boxes ({} photos released)",
        username,
        removed.boxes,
        removed.photos
    );
    Ok(())
}

/// What [`delete_user`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    pub boxes: u64,
    pub photos: usize,
}

/// Release every box photo of `username`, then delete the user row.
///
/// Boxes and items go with the user through `ON DELETE CASCADE`. If a photo
/// cannot be released the database is left untouched; photos released
/// before the failure stay released.
///
/// # Errors
///
/// Returns `CommandError::UserNotFound` if no such user exists,
/// `CommandError::Storage` if a photo cannot be removed, or a database error.
pub async fn delete_user(
    pool: &SqlitePool,
    backend: &dyn StorageBackend,
    username: &str,
) -> Result<Removed, CommandError> {
    let user_id = find_user(pool, username).await?;

    let boxes = BoxRepository::new(pool).list_for_user(user_id).await?;
    let mut photos = 0_usize;
    for reference in boxes.iter().filter_map(|b| b.image_ref.as_deref()) {
        backend.delete(reference).await?;
        photos += 1;
    }

    let boxes = UserRepository::new(pool).delete(user_id).await?;
    Ok(Removed { boxes, photos })
}

async fn find_user(pool: &SqlitePool, username: &str) -> Result<UserId, CommandError> {
    let parsed = Username::parse(username)?;
    UserRepository::new(pool)
        .get_by_username(&parsed)
        .await?
        .map(|user| user.id)
        .ok_or_else(|| CommandError::UserNotFound(username.to_owned()))
}
