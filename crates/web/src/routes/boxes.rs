//! Box route handlers.
//!
//! Every handler taking a box ID runs it through
//! [`guard::authorize_box`] before doing anything else.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;

use garage_core::BoxId;

use crate::db::{BoxRepository, ItemRepository};
use crate::error::{AppError, Result};
use crate::forms::{BoxForm, FormErrors, capitalize};
use crate::middleware::RequireAuth;
use crate::models::{BoxStats, CurrentUser, Item, StorageBox};
use crate::services::guard;
use crate::services::qr::QrEncoder;
use crate::services::storage::{self, StorageBackend};
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// Box card on the dashboard.
pub struct BoxCard {
    pub id: BoxId,
    pub name: String,
    pub location: String,
    pub item_count: i64,
    pub total_units: i64,
    pub image_url: Option<String>,
}

/// Shown in place of a value whose total cannot be represented.
const TOO_LARGE: &str = "too large";

/// Item row on the box page.
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub quantity: String,
    pub category: String,
    pub value: String,
    pub total_value: String,
    pub notes: String,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            quantity: item.quantity.to_string(),
            category: item.category.clone().unwrap_or_default(),
            value: item.value.map(|v| v.to_string()).unwrap_or_default(),
            total_value: match item.total_value() {
                Ok(value) => value.map(|v| v.to_string()).unwrap_or_default(),
                Err(_) => TOO_LARGE.to_owned(),
            },
            notes: item.notes.clone().unwrap_or_default(),
        }
    }
}

/// Destination option in the move-item menu.
pub struct BoxOption {
    pub id: BoxId,
    pub name: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub current_user: Option<CurrentUser>,
    pub boxes: Vec<BoxCard>,
}

/// Box detail template.
#[derive(Template, WebTemplate)]
#[template(path = "boxes/detail.html")]
pub struct BoxDetailTemplate {
    pub current_user: Option<CurrentUser>,
    pub id: BoxId,
    pub name: String,
    pub location: String,
    pub description: String,
    pub created_at: String,
    pub image_url: Option<String>,
    pub qr_target: String,
    pub items: Vec<ItemView>,
    pub total_units: u64,
    pub total_value: String,
    pub categories: Vec<String>,
    pub move_targets: Vec<BoxOption>,
}

/// Create/edit box form template.
#[derive(Template, WebTemplate)]
#[template(path = "boxes/form.html")]
pub struct BoxFormTemplate {
    pub current_user: Option<CurrentUser>,
    pub title: String,
    pub action: String,
    pub form: BoxForm,
    pub errors: FormErrors,
    pub image_url: Option<String>,
}

// =============================================================================
// Dashboard
// =============================================================================

/// List the current user's boxes.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<DashboardTemplate> {
    let summaries = BoxRepository::new(state.pool())
        .list_summaries(user.id)
        .await?;

    let boxes = summaries
        .into_iter()
        .map(|s| {
            Ok(BoxCard {
                id: s.storage_box.id,
                image_url: image_url(state.storage(), &s.storage_box)?,
                name: s.storage_box.name,
                location: s.storage_box.location.unwrap_or_default(),
                item_count: s.item_count,
                total_units: s.total_units,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(user_id = %user.id, box_count = boxes.len(), "Dashboard loaded");
    Ok(DashboardTemplate {
        current_user: Some(user),
        boxes,
    })
}

// =============================================================================
// Create
// =============================================================================

/// Display the new box form.
pub async fn create_page(RequireAuth(user): RequireAuth) -> BoxFormTemplate {
    BoxFormTemplate {
        current_user: Some(user),
        title: "Create New Box".to_owned(),
        action: "/box/create".to_owned(),
        form: BoxForm::default(),
        errors: FormErrors::new(),
        image_url: None,
    }
}

/// Handle the new box form.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response> {
    let (mut form, upload) = read_box_form(multipart).await?;

    let render = |form: BoxForm, errors: FormErrors, user: CurrentUser| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            BoxFormTemplate {
                current_user: Some(user),
                title: "Create New Box".to_owned(),
                action: "/box/create".to_owned(),
                form,
                errors,
                image_url: None,
            },
        )
            .into_response()
    };

    let fields = match form.validated() {
        Ok(fields) => fields,
        Err(errors) => return Ok(render(form, errors, user)),
    };

    let image_ref = match upload {
        Some(upload) => match store_upload(state.storage(), upload).await? {
            Ok(reference) => Some(reference),
            Err(errors) => return Ok(render(form, errors, user)),
        },
        None => None,
    };

    let storage_box = BoxRepository::new(state.pool())
        .create(user.id, &fields, image_ref.as_deref())
        .await?;

    tracing::info!(
        user_id = %user.id,
        box_id = %storage_box.id,
        box_name = %storage_box.name,
        "Box created"
    );
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)).into_response())
}

// =============================================================================
// Detail
// =============================================================================

/// Show a box and its items.
pub async fn detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<BoxDetailTemplate> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    let items = ItemRepository::new(state.pool())
        .list_for_box(storage_box.id)
        .await?;
    let stats = BoxStats::from_items(&items);

    let move_targets = BoxRepository::new(state.pool())
        .list_for_user(storage_box.user_id)
        .await?
        .into_iter()
        .filter(|b| b.id != storage_box.id)
        .map(|b| BoxOption {
            id: b.id,
            name: b.name,
        })
        .collect();

    tracing::debug!(box_id = %storage_box.id, "Viewing box");
    Ok(BoxDetailTemplate {
        current_user: Some(user),
        id: storage_box.id,
        image_url: image_url(state.storage(), &storage_box)?,
        qr_target: QrEncoder::new(&state.config().base_url).url_for(storage_box.id),
        name: storage_box.name,
        location: storage_box.location.unwrap_or_default(),
        description: storage_box.description.unwrap_or_default(),
        created_at: storage_box.created_at.format("%Y-%m-%d").to_string(),
        items: items.iter().map(ItemView::from).collect(),
        total_units: stats.total_units,
        total_value: stats
            .total_value
            .map_or_else(|_| TOO_LARGE.to_owned(), |v| v.to_string()),
        categories: stats.categories,
        move_targets,
    })
}

/// Serve the QR label for a box as PNG.
pub async fn qr_code(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<Response> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;
    let png = QrEncoder::new(&state.config().base_url).encode(storage_box.id)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "private, max-age=86400")
        .body(Body::from(png))
        .map_err(|e| AppError::Internal(e.to_string()))
}

// =============================================================================
// Edit
// =============================================================================

/// Display the edit form for a box.
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<BoxFormTemplate> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    Ok(BoxFormTemplate {
        current_user: Some(user),
        title: "Edit Box".to_owned(),
        action: format!("/box/{}/edit", storage_box.id),
        form: BoxForm::from_box(&storage_box),
        errors: FormErrors::new(),
        image_url: image_url(state.storage(), &storage_box)?,
    })
}

/// Handle the edit form for a box.
///
/// A new photo replaces the old one. The old photo is released only after
/// the row has been updated.
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;
    let (mut form, upload) = read_box_form(multipart).await?;

    let current_image = image_url(state.storage(), &storage_box)?;
    let render = |form: BoxForm, errors: FormErrors, user: CurrentUser| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            BoxFormTemplate {
                current_user: Some(user),
                title: "Edit Box".to_owned(),
                action: format!("/box/{}/edit", storage_box.id),
                form,
                errors,
                image_url: current_image.clone(),
            },
        )
            .into_response()
    };

    let fields = match form.validated() {
        Ok(fields) => fields,
        Err(errors) => return Ok(render(form, errors, user)),
    };

    let storage = state.storage();
    let (image_ref, stale, uploaded) = if form.delete_image {
        (None, storage_box.image_ref.as_deref(), false)
    } else if let Some(upload) = upload {
        match store_upload(storage, upload).await? {
            Ok(reference) => (Some(reference), storage_box.image_ref.as_deref(), true),
            Err(errors) => return Ok(render(form, errors, user)),
        }
    } else {
        (storage_box.image_ref.clone(), None, false)
    };

    let updated = match BoxRepository::new(state.pool())
        .update(storage_box.id, &fields, image_ref.as_deref())
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            // The row still points at the old photo; drop the unused upload
            if let (true, Some(fresh)) = (uploaded, image_ref.as_deref()) {
                if let Err(cleanup) = storage.delete(fresh).await {
                    tracing::warn!(reference = %fresh, error = %cleanup, "Failed to release unused upload");
                }
            }
            return Err(e.into());
        }
    };

    if let Some(old) = stale {
        if let Err(e) = storage.delete(old).await {
            tracing::warn!(box_id = %updated.id, reference = %old, error = %e, "Failed to release replaced image");
        } else {
            tracing::info!(box_id = %updated.id, "Box image released");
        }
    }

    tracing::info!(box_id = %updated.id, box_name = %updated.name, "Box updated");
    Ok(Redirect::to(&format!("/box/{}", updated.id)).into_response())
}

// =============================================================================
// Delete
// =============================================================================

/// Delete a box, its items and its photo.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<Redirect> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    if let Some(reference) = &storage_box.image_ref {
        state.storage().delete(reference).await?;
    }

    let items = BoxRepository::new(state.pool())
        .delete(storage_box.id)
        .await?;

    tracing::info!(
        user_id = %user.id,
        box_id = %storage_box.id,
        box_name = %storage_box.name,
        items_deleted = items,
        "Box deleted"
    );
    Ok(Redirect::to("/dashboard"))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// An uploaded photo.
pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Collect the box form fields and optional photo from a multipart body.
///
/// An empty file input is treated as "no photo".
async fn read_box_form(mut multipart: Multipart) -> Result<(BoxForm, Option<Upload>)> {
    let mut form = BoxForm::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "image" {
            let filename = field.file_name().unwrap_or_default().to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if !filename.is_empty() || !bytes.is_empty() {
                upload = Some(Upload { filename, bytes });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match name.as_str() {
            "name" => form.name = value,
            "location" => form.location = value,
            "description" => form.description = value,
            "delete_image" => form.delete_image = matches!(value.as_str(), "on" | "true" | "1"),
            _ => {}
        }
    }

    Ok((form, upload))
}

/// Store an upload, turning problems with the file itself into a form
/// error on the `image` field.
async fn store_upload(
    storage: &dyn StorageBackend,
    upload: Upload,
) -> Result<std::result::Result<String, FormErrors>> {
    let mut errors = FormErrors::new();
    if storage::image_extension(&upload.filename).is_err() {
        errors.add(
            "image",
            format!(
                "Unsupported file type. Allowed: {}",
                storage::ALLOWED_EXTENSIONS.join(", ")
            ),
        );
        return Ok(Err(errors));
    }

    match storage.store(upload.bytes, &upload.filename).await {
        Ok(reference) => Ok(Ok(reference)),
        Err(e) if e.is_client_error() => {
            errors.add("image", capitalize(&e.to_string()));
            Ok(Err(errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// Browser URL of a box photo.
fn image_url(storage: &dyn StorageBackend, storage_box: &StorageBox) -> Result<Option<String>> {
    storage_box
        .image_ref
        .as_deref()
        .map(|reference| storage.retrieve_url(reference))
        .transpose()
        .map_err(AppError::from)
}
