//! Garage Inventory web application library.
//!
//! Users catalogue storage boxes and their items, attach a photo to each
//! box and print QR labels that lead back to the box page. This crate is
//! the whole HTTP application; the binary in `main.rs` only wires
//! configuration, logging and the listener around [`build_router`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, extract::DefaultBodyLimit, http::Request};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

use config::StorageConfig;
use services::storage::UPLOADS_URL_PREFIX;
use state::AppState;

/// Largest accepted request body (box photos).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Build the application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    let mut app = routes::routes();
    if let StorageConfig::Local { root } = &state.config().storage {
        app = app.nest_service(UPLOADS_URL_PREFIX, ServeDir::new(root));
    }

    app.layer(session_layer)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
