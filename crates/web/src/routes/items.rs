//! Item route handlers.
//!
//! Items are reached through their box, so authorization always checks the
//! owner of the containing box.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use garage_core::{BoxId, ItemId};

use crate::db::ItemRepository;
use crate::error::{AppError, Result};
use crate::forms::{FormErrors, ItemForm, MoveItemForm};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::guard;
use crate::state::AppState;

/// Create/edit item form template.
#[derive(Template, WebTemplate)]
#[template(path = "items/form.html")]
pub struct ItemFormTemplate {
    pub current_user: Option<CurrentUser>,
    pub title: String,
    pub action: String,
    pub box_id: BoxId,
    pub box_name: String,
    pub form: ItemForm,
    pub errors: FormErrors,
}

// =============================================================================
// Create
// =============================================================================

/// Display the new item form for a box.
pub async fn create_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<ItemFormTemplate> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    Ok(ItemFormTemplate {
        current_user: Some(user),
        title: format!("Add Item to {}", storage_box.name),
        action: format!("/box/{}/item/create", storage_box.id),
        box_id: storage_box.id,
        box_name: storage_box.name,
        form: ItemForm::default(),
        errors: FormErrors::new(),
    })
}

/// Handle the new item form.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
    Form(mut form): Form<ItemForm>,
) -> Result<Response> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    let fields = match form.validated() {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(invalid(ItemFormTemplate {
                current_user: Some(user),
                title: format!("Add Item to {}", storage_box.name),
                action: format!("/box/{}/item/create", storage_box.id),
                box_id: storage_box.id,
                box_name: storage_box.name,
                form,
                errors,
            }));
        }
    };

    let item = ItemRepository::new(state.pool())
        .create(storage_box.id, &fields)
        .await?;

    tracing::info!(
        box_id = %storage_box.id,
        item_id = %item.id,
        item_name = %item.name,
        quantity = %item.quantity,
        "Item created"
    );
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)).into_response())
}

// =============================================================================
// Edit
// =============================================================================

/// Display the edit form for an item.
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<i64>,
) -> Result<ItemFormTemplate> {
    let (item, storage_box) =
        guard::authorize_item(state.pool(), &user, ItemId::new(item_id)).await?;

    Ok(ItemFormTemplate {
        current_user: Some(user),
        title: "Edit Item".to_owned(),
        action: format!("/item/{}/edit", item.id),
        box_id: storage_box.id,
        box_name: storage_box.name,
        form: ItemForm::from_item(&item),
        errors: FormErrors::new(),
    })
}

/// Handle the edit form for an item.
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<i64>,
    Form(mut form): Form<ItemForm>,
) -> Result<Response> {
    let (item, storage_box) =
        guard::authorize_item(state.pool(), &user, ItemId::new(item_id)).await?;

    let fields = match form.validated() {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(invalid(ItemFormTemplate {
                current_user: Some(user),
                title: "Edit Item".to_owned(),
                action: format!("/item/{}/edit", item.id),
                box_id: storage_box.id,
                box_name: storage_box.name,
                form,
                errors,
            }));
        }
    };

    let updated = ItemRepository::new(state.pool())
        .update(item.id, &fields)
        .await?;

    tracing::info!(item_id = %updated.id, item_name = %updated.name, "Item updated");
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)).into_response())
}

// =============================================================================
// Delete / Move / Duplicate
// =============================================================================

/// Delete an item.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<i64>,
) -> Result<Redirect> {
    let (item, storage_box) =
        guard::authorize_item(state.pool(), &user, ItemId::new(item_id)).await?;

    ItemRepository::new(state.pool()).delete(item.id).await?;

    tracing::info!(item_id = %item.id, item_name = %item.name, "Item deleted");
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)))
}

/// Move an item into another box.
///
/// The destination must be accessible to the actor too; otherwise the
/// response is the same 404 as for a missing box.
pub async fn move_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<i64>,
    Form(form): Form<MoveItemForm>,
) -> Result<Redirect> {
    let (item, source) = guard::authorize_item(state.pool(), &user, ItemId::new(item_id)).await?;

    let target_id: i64 = form
        .new_box_id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid target box".to_owned()))?;
    let target = guard::authorize_box(state.pool(), &user, BoxId::new(target_id)).await?;

    if target.id == source.id {
        return Ok(Redirect::to(&format!("/box/{}", source.id)));
    }

    ItemRepository::new(state.pool())
        .move_to(item.id, target.id)
        .await?;

    tracing::info!(
        item_id = %item.id,
        item_name = %item.name,
        from_box_id = %source.id,
        to_box_id = %target.id,
        "Item moved"
    );
    Ok(Redirect::to(&format!("/box/{}", target.id)))
}

/// Copy an item within its box.
pub async fn duplicate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<i64>,
) -> Result<Redirect> {
    let (item, storage_box) =
        guard::authorize_item(state.pool(), &user, ItemId::new(item_id)).await?;

    let copy = ItemRepository::new(state.pool()).duplicate(item.id).await?;

    tracing::info!(item_id = %item.id, copy_id = %copy.id, "Item duplicated");
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)))
}

fn invalid(template: ItemFormTemplate) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, template).into_response()
}
