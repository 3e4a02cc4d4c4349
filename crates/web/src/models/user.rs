//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garage_core::{Email, UserId, Username};

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    /// Administrators may read and change every user's boxes.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
