//! Landing page and health check.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub current_user: Option<CurrentUser>,
}

/// Landing page; signed-in users go straight to their dashboard.
pub async fn index(OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    IndexTemplate { current_user: None }.into_response()
}

/// Health check endpoint.
///
/// Verifies database connectivity. Returns 503 Service Unavailable if the
/// database is not reachable.
pub async fn health(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "checks": {"database": "ok"}})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "checks": {"database": "error"}})),
            )
                .into_response()
        }
    }
}
