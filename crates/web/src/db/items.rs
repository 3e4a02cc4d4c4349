//! Item repository for database operations.
//!
//! Items carry no owner column; ownership is inherited from the box, so
//! every user-scoped query joins through `boxes.user_id`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use garage_core::{BoxId, ItemId, Money, Quantity, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::Item;

/// Raw `items` row.
#[derive(sqlx::FromRow)]
struct ItemRow {
    id: ItemId,
    box_id: BoxId,
    name: String,
    quantity: i64,
    category: Option<String>,
    value_cents: Option<i64>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quantity for item {}: {e}", row.id))
        })?;
        let value = row
            .value_cents
            .map(Money::from_cents)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid value for item {}: {e}", row.id))
            })?;

        Ok(Self {
            id: row.id,
            box_id: row.box_id,
            name: row.name,
            quantity,
            category: row.category,
            value,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// An item search hit together with the name of its box.
#[derive(Debug, Clone)]
pub struct ItemWithBox {
    pub item: Item,
    pub box_name: String,
}

#[derive(sqlx::FromRow)]
struct ItemWithBoxRow {
    #[sqlx(flatten)]
    item: ItemRow,
    box_name: String,
}

/// Editable item fields.
#[derive(Debug, Clone, Default)]
pub struct ItemFields {
    pub name: String,
    pub quantity: Quantity,
    pub category: Option<String>,
    pub value: Option<Money>,
    pub notes: Option<String>,
}

impl ItemFields {
    fn value_cents(&self) -> Result<Option<i64>, RepositoryError> {
        self.value
            .map(Money::to_cents)
            .transpose()
            .map_err(|e| RepositoryError::Conflict(format!("value: {e}")))
    }
}

const ITEM_COLUMNS: &str =
    "id, box_id, name, quantity, category, value_cents, notes, created_at, updated_at";

/// Repository for item database operations.
pub struct ItemRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an item by ID, regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(Item::try_from).transpose()
    }

    /// Items in a box, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_box(&self, box_id: BoxId) -> Result<Vec<Item>, RepositoryError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE box_id = ? ORDER BY name COLLATE NOCASE, id"
        ))
        .bind(box_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Item::try_from).collect()
    }

    /// Add an item to a box.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, including a
    /// CHECK constraint violation.
    pub async fn create(&self, box_id: BoxId, fields: &ItemFields) -> Result<Item, RepositoryError> {
        let now = Utc::now();
        let row: ItemRow = sqlx::query_as(&format!(
            "INSERT INTO items (box_id, name, quantity, category, value_cents, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(box_id)
        .bind(&fields.name)
        .bind(fields.quantity.as_i64())
        .bind(fields.category.as_deref())
        .bind(fields.value_cents()?)
        .bind(fields.notes.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Item::try_from(row)
    }

    /// Replace the editable fields of an item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn update(&self, id: ItemId, fields: &ItemFields) -> Result<Item, RepositoryError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "UPDATE items \
             SET name = ?, quantity = ?, category = ?, value_cents = ?, notes = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&fields.name)
        .bind(fields.quantity.as_i64())
        .bind(fields.category.as_deref())
        .bind(fields.value_cents()?)
        .bind(fields.notes.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete an item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete(&self, id: ItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Move an item into another box.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn move_to(&self, id: ItemId, box_id: BoxId) -> Result<Item, RepositoryError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "UPDATE items SET box_id = ?, updated_at = ? WHERE id = ? RETURNING {ITEM_COLUMNS}"
        ))
        .bind(box_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Copy an item into the same box, suffixing its name with ` (copy)`.
    ///
    /// The copy is truncated to the 100 character name limit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn duplicate(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let now = Utc::now();
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "INSERT INTO items (box_id, name, quantity, category, value_cents, notes, created_at, updated_at) \
             SELECT box_id, substr(name || ' (copy)', 1, 100), quantity, category, value_cents, notes, ?, ? \
             FROM items WHERE id = ? \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Items in boxes owned by `user_id` whose name, category or notes
    /// contain `term`, optionally limited to one exact category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        user_id: UserId,
        term: &str,
        category: Option<&str>,
    ) -> Result<Vec<ItemWithBox>, RepositoryError> {
        let pattern = like_pattern(term);
        let rows: Vec<ItemWithBoxRow> = sqlx::query_as(
            r"
            SELECT i.id, i.box_id, i.name, i.quantity, i.category, i.value_cents, i.notes,
                   i.created_at, i.updated_at, b.name AS box_name
            FROM items i
            JOIN boxes b ON b.id = i.box_id
            WHERE b.user_id = ?
              AND (i.name LIKE ? ESCAPE '\' OR i.category LIKE ? ESCAPE '\' OR i.notes LIKE ? ESCAPE '\')
              AND (? IS NULL OR i.category = ?)
            ORDER BY i.name COLLATE NOCASE, i.id
            ",
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(category)
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ItemWithBox {
                    item: Item::try_from(row.item)?,
                    box_name: row.box_name,
                })
            })
            .collect()
    }

    /// Distinct non-empty categories used in `user_id`'s boxes, sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories_for_user(&self, user_id: UserId) -> Result<Vec<String>, RepositoryError> {
        let categories: Vec<String> = sqlx::query_scalar(
            r"
            SELECT DISTINCT i.category
            FROM items i
            JOIN boxes b ON b.id = i.box_id
            WHERE b.user_id = ? AND i.category IS NOT NULL AND i.category != ''
            ORDER BY i.category
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }
}
