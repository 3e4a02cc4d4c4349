//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Landing page
//! GET  /health                    - Health check
//!
//! # Auth
//! GET  /register                  - Register page
//! POST /register                  - Register action
//! GET  /login                     - Login page
//! POST /login                     - Login action
//! GET  /logout                    - Logout (POST also accepted)
//!
//! # Boxes (requires auth)
//! GET  /dashboard                 - Box listing
//! GET  /box/create                - New box form
//! POST /box/create                - Create box (multipart)
//! GET  /box/{id}                  - Box detail with items
//! GET  /box/{id}/edit             - Edit box form
//! POST /box/{id}/edit             - Update box (multipart)
//! POST /box/{id}/delete           - Delete box, items and photo
//! GET  /box/{id}/qr.png           - QR label
//!
//! # Items (requires auth)
//! GET  /box/{id}/item/create      - New item form
//! POST /box/{id}/item/create      - Create item
//! GET  /item/{id}/edit            - Edit item form
//! POST /item/{id}/edit            - Update item
//! POST /item/{id}/delete          - Delete item
//! POST /item/{id}/move            - Move item to another box
//! POST /item/{id}/duplicate       - Copy item
//!
//! # Scanning and search (requires auth)
//! GET  /scan                      - Camera scanner
//! GET  /qr/{id}                   - Scanned label landing, redirects to box
//! GET  /search                    - Search boxes and items
//! ```

pub mod auth;
pub mod boxes;
pub mod home;
pub mod items;
pub mod scanner;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .route("/health", get(home::health))
        .merge(auth_routes())
        .merge(box_routes())
        .merge(item_routes())
        .route("/scan", get(scanner::scan_page))
        .route("/qr/{id}", get(scanner::qr_redirect))
        .route("/search", get(scanner::search))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
}

fn box_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(boxes::dashboard))
        .route("/box/create", get(boxes::create_page).post(boxes::create))
        .route("/box/{id}", get(boxes::detail))
        .route("/box/{id}/edit", get(boxes::edit_page).post(boxes::edit))
        .route("/box/{id}/delete", post(boxes::delete))
        .route("/box/{id}/qr.png", get(boxes::qr_code))
}

fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/box/{id}/item/create",
            get(items::create_page).post(items::create),
        )
        .route("/item/{id}/edit", get(items::edit_page).post(items::edit))
        .route("/item/{id}/delete", post(items::delete))
        .route("/item/{id}/move", post(items::move_item))
        .route("/item/{id}/duplicate", post(items::duplicate))
}
