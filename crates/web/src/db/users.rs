//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use garage_core::{Email, UserId, Username};

use super::RepositoryError;
use crate::models::User;

/// Raw `users` row.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            email,
            is_admin: row.is_admin,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, is_admin, created_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
                .bind(username.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    /// Whether the username is already registered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_exists(&self, username: &Username) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                .bind(username.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Whether the email address is already registered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Create a new user with a pre-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("username")` or
    /// `RepositoryError::Conflict("email")` if either is already taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Username,
        email: &Email,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (username, email, password_hash, is_admin, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username.as_str())
        .bind(email.as_str())
        .bind(password_hash)
        .bind(is_admin)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                let field = if db_err.message().contains("users.email") {
                    "email"
                } else {
                    "username"
                };
                return RepositoryError::Conflict(field.to_owned());
            }
            RepositoryError::Database(e)
        })?;

        User::try_from(row)
    }

    /// Get a user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let hash: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE username = ?")
                .bind(username.as_str())
                .fetch_optional(self.pool)
                .await?;

        let Some((hash,)) = hash else {
            return Ok(None);
        };

        Ok(self.get_by_username(username).await?.map(|user| (user, hash)))
    }

    /// Grant or revoke administrator rights.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a user together with their boxes and items.
    ///
    /// Stored box images are not touched; release them first. Returns the
    /// number of boxes removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&self, id: UserId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let boxes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM boxes WHERE user_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        // Boxes and items go with the user through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(u64::try_from(boxes).unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let user = repo
            .create(&name("alice"), &email("alice@example.com"), "hash", false)
            .await
            .unwrap();
        assert!(user.id.is_valid());
        assert!(!user.is_admin);

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username.as_str(), "alice");

        let (_, hash) = repo.get_password_hash(&name("alice")).await.unwrap().unwrap();
        assert_eq!(hash, "hash");

        assert!(repo.username_exists(&name("alice")).await.unwrap());
        assert!(!repo.username_exists(&name("bob")).await.unwrap());
        assert!(repo.email_exists(&email("alice@example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        repo.create(&name("alice"), &email("a@example.com"), "h", false)
            .await
            .unwrap();

        let err = repo
            .create(&name("alice"), &email("b@example.com"), "h", false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "username"));

        let err = repo
            .create(&name("bob"), &email("a@example.com"), "h", false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn test_set_admin() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let user = repo
            .create(&name("alice"), &email("a@example.com"), "h", false)
            .await
            .unwrap();

        repo.set_admin(user.id, true).await.unwrap();
        assert!(repo.get_by_id(user.id).await.unwrap().unwrap().is_admin);

        let err = repo.set_admin(UserId::new(999), true).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_boxes() {
        use crate::db::{BoxRepository, boxes::BoxFields};

        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let user = repo
            .create(&name("alice"), &email("a@example.com"), "h", false)
            .await
            .unwrap();
        let storage_box = BoxRepository::new(&pool)
            .create(
                user.id,
                &BoxFields {
                    name: "Tools".to_owned(),
                    ..BoxFields::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(repo.delete(user.id).await.unwrap(), 1);
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
        assert!(
            BoxRepository::new(&pool)
                .get(storage_box.id)
                .await
                .unwrap()
                .is_none()
        );

        let err = repo.delete(user.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
