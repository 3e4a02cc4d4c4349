//! Box repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use garage_core::{BoxId, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::{BoxSummary, StorageBox};

/// Raw `boxes` row.
#[derive(sqlx::FromRow)]
struct BoxRow {
    id: BoxId,
    user_id: UserId,
    name: String,
    location: Option<String>,
    description: Option<String>,
    image_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BoxRow> for StorageBox {
    fn from(row: BoxRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            location: row.location,
            description: row.description,
            image_ref: row.image_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A `boxes` row joined with its item aggregates.
#[derive(sqlx::FromRow)]
struct BoxSummaryRow {
    #[sqlx(flatten)]
    storage_box: BoxRow,
    item_count: i64,
    total_units: i64,
}

impl From<BoxSummaryRow> for BoxSummary {
    fn from(row: BoxSummaryRow) -> Self {
        Self {
            storage_box: row.storage_box.into(),
            item_count: row.item_count,
            total_units: row.total_units,
        }
    }
}

/// Editable box fields.
#[derive(Debug, Clone, Default)]
pub struct BoxFields {
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

const BOX_COLUMNS: &str =
    "id, user_id, name, location, description, image_ref, created_at, updated_at";

/// Repository for box database operations.
pub struct BoxRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BoxRepository<'a> {
    /// Create a new box repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a box by ID, regardless of owner.
    ///
    /// Callers serving a user must go through `services::guard` instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BoxId) -> Result<Option<StorageBox>, RepositoryError> {
        let row: Option<BoxRow> =
            sqlx::query_as(&format!("SELECT {BOX_COLUMNS} FROM boxes WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(StorageBox::from))
    }

    /// All boxes owned by `user_id`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<StorageBox>, RepositoryError> {
        let rows: Vec<BoxRow> = sqlx::query_as(&format!(
            "SELECT {BOX_COLUMNS} FROM boxes WHERE user_id = ? ORDER BY name COLLATE NOCASE, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(StorageBox::from).collect())
    }

    /// Boxes owned by `user_id` with item counts, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_summaries(&self, user_id: UserId) -> Result<Vec<BoxSummary>, RepositoryError> {
        let rows: Vec<BoxSummaryRow> = sqlx::query_as(
            r"
            SELECT b.id, b.user_id, b.name, b.location, b.description, b.image_ref,
                   b.created_at, b.updated_at,
                   COUNT(i.id) AS item_count,
                   COALESCE(SUM(i.quantity), 0) AS total_units
            FROM boxes b
            LEFT JOIN items i ON i.box_id = b.id
            WHERE b.user_id = ?
            GROUP BY b.id
            ORDER BY b.name COLLATE NOCASE, b.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(BoxSummary::from).collect())
    }

    /// Create a box for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        fields: &BoxFields,
        image_ref: Option<&str>,
    ) -> Result<StorageBox, RepositoryError> {
        let now = Utc::now();
        let row: BoxRow = sqlx::query_as(&format!(
            "INSERT INTO boxes (user_id, name, location, description, image_ref, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {BOX_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&fields.name)
        .bind(fields.location.as_deref())
        .bind(fields.description.as_deref())
        .bind(image_ref)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Update the editable fields and the image reference of a box.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the box does not exist.
    pub async fn update(
        &self,
        id: BoxId,
        fields: &BoxFields,
        image_ref: Option<&str>,
    ) -> Result<StorageBox, RepositoryError> {
        let row: Option<BoxRow> = sqlx::query_as(&format!(
            "UPDATE boxes \
             SET name = ?, location = ?, description = ?, image_ref = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING {BOX_COLUMNS}"
        ))
        .bind(&fields.name)
        .bind(fields.location.as_deref())
        .bind(fields.description.as_deref())
        .bind(image_ref)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(StorageBox::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a box and its items in one transaction.
    ///
    /// Returns the number of items removed with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the box does not exist.
    pub async fn delete(&self, id: BoxId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query("DELETE FROM items WHERE box_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let result = sqlx::query("DELETE FROM boxes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(items)
    }

    /// Boxes owned by `user_id` whose name, location or description
    /// contains `term`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        user_id: UserId,
        term: &str,
    ) -> Result<Vec<StorageBox>, RepositoryError> {
        let pattern = like_pattern(term);
        let rows: Vec<BoxRow> = sqlx::query_as(&format!(
            "SELECT {BOX_COLUMNS} FROM boxes \
             WHERE user_id = ? \
               AND (name LIKE ? ESCAPE '\\' \
                    OR location LIKE ? ESCAPE '\\' \
                    OR description LIKE ? ESCAPE '\\') \
             ORDER BY name COLLATE NOCASE, id"
        ))
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(StorageBox::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use garage_core::{Email, Username};

    use super::*;
    use crate::db::tests::test_pool;
    use crate::db::{ItemRepository, UserRepository, items::ItemFields};

    async fn user(pool: &SqlitePool, name: &str) -> UserId {
        UserRepository::new(pool)
            .create(
                &Username::parse(name).unwrap(),
                &Email::parse(&format!("{name}@example.com")).unwrap(),
                "hash",
                false,
            )
            .await
            .unwrap()
            .id
    }

    fn fields(name: &str, location: Option<&str>) -> BoxFields {
        BoxFields {
            name: name.to_owned(),
            location: location.map(str::to_owned),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_update_get() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let repo = BoxRepository::new(&pool);

        let created = repo
            .create(owner, &fields("Tools", Some("Shelf A")), Some("images/a.png"))
            .await
            .unwrap();
        assert_eq!(created.user_id, owner);
        assert_eq!(created.image_ref.as_deref(), Some("images/a.png"));

        let updated = repo
            .update(created.id, &fields("Power tools", None), None)
            .await
            .unwrap();
        assert_eq!(updated.name, "Power tools");
        assert_eq!(updated.location, None);
        assert_eq!(updated.image_ref, None);

        assert_eq!(repo.get(created.id).await.unwrap().unwrap(), updated);
        assert!(repo.get(BoxId::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_per_user_and_sorted() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        let bob = user(&pool, "bob").await;
        let repo = BoxRepository::new(&pool);

        repo.create(alice, &fields("zebra", None), None).await.unwrap();
        repo.create(alice, &fields("Apple", None), None).await.unwrap();
        repo.create(bob, &fields("Bob's", None), None).await.unwrap();

        let names: Vec<String> = repo
            .list_for_user(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["Apple", "zebra"]);
    }

    #[tokio::test]
    async fn test_summaries_count_items() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        let repo = BoxRepository::new(&pool);
        let full = repo.create(alice, &fields("Full", None), None).await.unwrap();
        repo.create(alice, &fields("Empty", None), None).await.unwrap();

        let items = ItemRepository::new(&pool);
        for (name, qty) in [("Screws", 100), ("Drill", 1)] {
            items
                .create(
                    full.id,
                    &ItemFields {
                        name: name.to_owned(),
                        quantity: garage_core::Quantity::new(qty).unwrap(),
                        ..ItemFields::default()
                    },
                )
                .await
                .unwrap();
        }

        let summaries = repo.list_summaries(alice).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].storage_box.name, "Empty");
        assert_eq!(summaries[0].item_count, 0);
        assert_eq!(summaries[0].total_units, 0);
        assert_eq!(summaries[1].item_count, 2);
        assert_eq!(summaries[1].total_units, 101);
    }

    #[tokio::test]
    async fn test_delete_cascades_items() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        let repo = BoxRepository::new(&pool);
        let b = repo.create(alice, &fields("Tools", None), None).await.unwrap();
        ItemRepository::new(&pool)
            .create(
                b.id,
                &ItemFields {
                    name: "Hammer".to_owned(),
                    ..ItemFields::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(repo.delete(b.id).await.unwrap(), 1);
        assert!(repo.get(b.id).await.unwrap().is_none());
        assert!(ItemRepository::new(&pool).list_for_box(b.id).await.unwrap().is_empty());
        assert!(matches!(repo.delete(b.id).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_scoped() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        let bob = user(&pool, "bob").await;
        let repo = BoxRepository::new(&pool);
        repo.create(alice, &fields("Christmas lights", Some("Loft")), None)
            .await
            .unwrap();
        repo.create(alice, &fields("Camping", Some("Garage loft")), None)
            .await
            .unwrap();
        repo.create(bob, &fields("Loft junk", None), None).await.unwrap();

        let found = repo.search(alice, "LOFT").await.unwrap();
        let names: Vec<&str> = found.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Camping", "Christmas lights"]);

        assert!(repo.search(alice, "%").await.unwrap().is_empty());
    }
}
