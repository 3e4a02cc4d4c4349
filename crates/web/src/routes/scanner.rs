//! QR scanning and search handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;

use garage_core::BoxId;

use crate::db::{BoxRepository, ItemRepository};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::guard;
use crate::state::AppState;

/// Scanner page template.
#[derive(Template, WebTemplate)]
#[template(path = "scan.html")]
pub struct ScanTemplate {
    pub current_user: Option<CurrentUser>,
}

/// Open the camera scanner.
pub async fn scan_page(RequireAuth(user): RequireAuth) -> ScanTemplate {
    ScanTemplate {
        current_user: Some(user),
    }
}

/// Landing URL for scanned labels.
///
/// Goes through the same guard as the box page, so a label for somebody
/// else's box ends at the generic 404.
pub async fn qr_redirect(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(box_id): Path<i64>,
) -> Result<Redirect> {
    let storage_box = guard::authorize_box(state.pool(), &user, BoxId::new(box_id)).await?;

    tracing::info!(user_id = %user.id, box_id = %storage_box.id, "QR code scanned");
    Ok(Redirect::to(&format!("/box/{}", storage_box.id)))
}

// =============================================================================
// Search
// =============================================================================

/// What the search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Boxes,
    Items,
    /// Any other `type` value. Matches nothing.
    #[serde(other)]
    Unknown,
}

impl SearchScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Boxes => "boxes",
            Self::Items => "items",
            Self::Unknown => "unknown",
        }
    }

    const fn boxes(self) -> bool {
        matches!(self, Self::All | Self::Boxes)
    }

    const fn items(self) -> bool {
        matches!(self, Self::All | Self::Items)
    }
}

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default, rename = "type")]
    pub scope: SearchScope,
    #[serde(default)]
    pub category: String,
}

/// Box hit.
pub struct BoxHit {
    pub id: BoxId,
    pub name: String,
    pub location: String,
}

/// Item hit, shown with its box.
pub struct ItemHit {
    pub box_id: BoxId,
    pub box_name: String,
    pub name: String,
    pub quantity: String,
    pub category: String,
}

/// Search page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub current_user: Option<CurrentUser>,
    pub query: String,
    pub scope: &'static str,
    pub category: String,
    pub categories: Vec<String>,
    pub boxes: Vec<BoxHit>,
    pub items: Vec<ItemHit>,
    pub searched: bool,
}

/// Search the current user's boxes and items.
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<SearchQuery>,
) -> Result<SearchTemplate> {
    let term = query.q.trim();
    let category = Some(query.category.trim()).filter(|c| !c.is_empty());
    let items_repo = ItemRepository::new(state.pool());

    let mut boxes = Vec::new();
    let mut items = Vec::new();
    if !term.is_empty() {
        if query.scope.boxes() {
            boxes = BoxRepository::new(state.pool())
                .search(user.id, term)
                .await?
                .into_iter()
                .map(|b| BoxHit {
                    id: b.id,
                    name: b.name,
                    location: b.location.unwrap_or_default(),
                })
                .collect();
        }
        if query.scope.items() {
            items = items_repo
                .search(user.id, term, category)
                .await?
                .into_iter()
                .map(|hit| ItemHit {
                    box_id: hit.item.box_id,
                    box_name: hit.box_name,
                    name: hit.item.name,
                    quantity: hit.item.quantity.to_string(),
                    category: hit.item.category.unwrap_or_default(),
                })
                .collect();
        }

        tracing::debug!(
            user_id = %user.id,
            scope = query.scope.as_str(),
            box_hits = boxes.len(),
            item_hits = items.len(),
            "Search"
        );
    }

    let categories = items_repo.categories_for_user(user.id).await?;

    Ok(SearchTemplate {
        current_user: Some(user),
        query: term.to_owned(),
        scope: query.scope.as_str(),
        category: category.unwrap_or_default().to_owned(),
        categories,
        boxes,
        items,
        searched: !term.is_empty(),
    })
}
