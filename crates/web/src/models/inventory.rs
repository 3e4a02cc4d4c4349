//! Box and item domain models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garage_core::{BoxId, ItemId, Money, MoneyError, Quantity, UserId};

/// A physical storage container.
///
/// Named `StorageBox` to stay clear of `std::boxed::Box`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBox {
    pub id: BoxId,
    /// The owning user.
    pub user_id: UserId,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Opaque storage backend reference for the box photo.
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tracked object inside a box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub box_id: BoxId,
    pub name: String,
    pub quantity: Quantity,
    pub category: Option<String>,
    /// Value of a single unit.
    pub value: Option<Money>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Unit value times quantity, if a value was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is too large.
    pub fn total_value(&self) -> Result<Option<Money>, MoneyError> {
        self.value.map(|v| v.checked_times(self.quantity)).transpose()
    }
}

/// A box with aggregate figures for list views.
#[derive(Debug, Clone)]
pub struct BoxSummary {
    pub storage_box: StorageBox,
    /// Number of item rows.
    pub item_count: i64,
    /// Sum of item quantities.
    pub total_units: i64,
}

/// Figures derived from the items of one box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxStats {
    pub item_count: usize,
    pub total_units: u64,
    /// `Err(MoneyError::Overflow)` when the sum is too large to represent.
    pub total_value: Result<Money, MoneyError>,
    /// Distinct non-empty categories in alphabetical order.
    pub categories: Vec<String>,
}

impl BoxStats {
    #[must_use]
    pub fn from_items(items: &[Item]) -> Self {
        let categories: BTreeSet<&str> = items
            .iter()
            .filter_map(|item| item.category.as_deref())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            item_count: items.len(),
            total_units: items.iter().map(|i| u64::from(i.quantity.get())).sum(),
            total_value: items.iter().try_fold(Money::ZERO, |total, item| {
                match item.total_value()? {
                    Some(value) => total.checked_add(value),
                    None => Ok(total),
                }
            }),
            categories: categories.into_iter().map(str::to_owned).collect(),
        }
    }
}
