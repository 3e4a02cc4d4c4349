//! Domain models for the inventory application.

pub mod inventory;
pub mod session;
pub mod user;

pub use inventory::{BoxStats, BoxSummary, Item, StorageBox};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
