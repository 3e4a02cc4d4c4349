//! Ownership checks for boxes and items.
//!
//! Every handler that shows or changes a box or item calls one of these
//! functions first. A missing record and someone else's record produce the
//! same [`GuardError::NotAuthorized`], so responses never reveal whether
//! another user's box exists.

use sqlx::SqlitePool;
use thiserror::Error;

use garage_core::{BoxId, ItemId, UserId};

use crate::db::{BoxRepository, ItemRepository, RepositoryError};
use crate::models::{CurrentUser, Item, StorageBox};

/// Authorization failure.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Missing, or owned by someone else.
    #[error("not authorized")]
    NotAuthorized,

    /// The lookup itself failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Whether `actor` may read and change records owned by `owner`.
#[must_use]
pub fn can_access(actor: &CurrentUser, owner: UserId) -> bool {
    actor.is_admin || actor.id == owner
}

/// Fetch a box the actor is allowed to use.
///
/// # Errors
///
/// Returns `GuardError::NotAuthorized` if the box does not exist or belongs
/// to another user and the actor is not an administrator.
pub async fn authorize_box(
    pool: &SqlitePool,
    actor: &CurrentUser,
    box_id: BoxId,
) -> Result<StorageBox, GuardError> {
    if !box_id.is_valid() {
        return Err(GuardError::NotAuthorized);
    }

    let Some(storage_box) = BoxRepository::new(pool).get(box_id).await? else {
        tracing::warn!(user_id = %actor.id, box_id = %box_id, "Box not found");
        return Err(GuardError::NotAuthorized);
    };

    if !can_access(actor, storage_box.user_id) {
        tracing::warn!(
            user_id = %actor.id,
            box_id = %box_id,
            owner_id = %storage_box.user_id,
            "Denied access to box"
        );
        return Err(GuardError::NotAuthorized);
    }

    Ok(storage_box)
}

/// Fetch an item, and the box holding it, that the actor is allowed to use.
///
/// # Errors
///
/// Returns `GuardError::NotAuthorized` if the item does not exist or its box
/// belongs to another user and the actor is not an administrator.
pub async fn authorize_item(
    pool: &SqlitePool,
    actor: &CurrentUser,
    item_id: ItemId,
) -> Result<(Item, StorageBox), GuardError> {
    if !item_id.is_valid() {
        return Err(GuardError::NotAuthorized);
    }

    let Some(item) = ItemRepository::new(pool).get(item_id).await? else {
        tracing::warn!(user_id = %actor.id, item_id = %item_id, "Item not found");
        return Err(GuardError::NotAuthorized);
    };

    let Some(storage_box) = BoxRepository::new(pool).get(item.box_id).await? else {
        return Err(GuardError::NotAuthorized);
    };

    if !can_access(actor, storage_box.user_id) {
        tracing::warn!(
            user_id = %actor.id,
            item_id = %item_id,
            box_id = %storage_box.id,
            owner_id = %storage_box.user_id,
            "Denied access to item"
        );
        return Err(GuardError::NotAuthorized);
    }

    Ok((item, storage_box))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use garage_core::{Email, Username};

    use super::*;
    use crate::db::boxes::BoxFields;
    use crate::db::items::ItemFields;
    use crate::db::tests::test_pool;
    use crate::db::UserRepository;

    async fn actor(pool: &SqlitePool, name: &str, is_admin: bool) -> CurrentUser {
        let user = UserRepository::new(pool)
            .create(
                &Username::parse(name).unwrap(),
                &Email::parse(&format!("{name}@example.com")).unwrap(),
                "hash",
                is_admin,
            )
            .await
            .unwrap();
        CurrentUser::from(&user)
    }

    async fn boxed_item(pool: &SqlitePool, owner: &CurrentUser) -> (BoxId, ItemId) {
        let b = BoxRepository::new(pool)
            .create(
                owner.id,
                &BoxFields {
                    name: "Tools".to_owned(),
                    ..BoxFields::default()
                },
                None,
            )
            .await
            .unwrap();
        let item = ItemRepository::new(pool)
            .create(
                b.id,
                &ItemFields {
                    name: "Hammer".to_owned(),
                    ..ItemFields::default()
                },
            )
            .await
            .unwrap();
        (b.id, item.id)
    }

    #[tokio::test]
    async fn test_owner_is_allowed() {
        let pool = test_pool().await;
        let alice = actor(&pool, "alice", false).await;
        let (box_id, item_id) = boxed_item(&pool, &alice).await;

        assert_eq!(authorize_box(&pool, &alice, box_id).await.unwrap().id, box_id);
        let (item, b) = authorize_item(&pool, &alice, item_id).await.unwrap();
        assert_eq!(item.id, item_id);
        assert_eq!(b.id, box_id);
    }

    #[tokio::test]
    async fn test_other_user_is_denied() {
        let pool = test_pool().await;
        let alice = actor(&pool, "alice", false).await;
        let mallory = actor(&pool, "mallory", false).await;
        let (box_id, item_id) = boxed_item(&pool, &alice).await;

        assert!(matches!(
            authorize_box(&pool, &mallory, box_id).await,
            Err(GuardError::NotAuthorized)
        ));
        assert!(matches!(
            authorize_item(&pool, &mallory, item_id).await,
            Err(GuardError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_admin_is_allowed() {
        let pool = test_pool().await;
        let alice = actor(&pool, "alice", false).await;
        let admin = actor(&pool, "root", true).await;
        let (box_id, item_id) = boxed_item(&pool, &alice).await;

        assert!(authorize_box(&pool, &admin, box_id).await.is_ok());
        assert!(authorize_item(&pool, &admin, item_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids_look_the_same() {
        let pool = test_pool().await;
        let alice = actor(&pool, "alice", false).await;

        for id in [0, -1, 999] {
            assert!(matches!(
                authorize_box(&pool, &alice, BoxId::new(id)).await,
                Err(GuardError::NotAuthorized)
            ));
            assert!(matches!(
                authorize_item(&pool, &alice, ItemId::new(id)).await,
                Err(GuardError::NotAuthorized)
            ));
        }
    }
}
