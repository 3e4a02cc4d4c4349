//! Authentication route handlers.
//!
//! Handles registration, login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::forms::{FormErrors, LoginForm, RegisterForm, safe_next};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    /// Set after a successful registration.
    pub registered: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub current_user: Option<CurrentUser>,
    pub form: LoginForm,
    pub errors: FormErrors,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub current_user: Option<CurrentUser>,
    pub form: RegisterForm,
    pub errors: FormErrors,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    LoginTemplate {
        current_user: None,
        form: LoginForm {
            next: query.next,
            ..LoginForm::default()
        },
        errors: FormErrors::new(),
        error: None,
        success: query
            .registered
            .map(|_| "Account created. Please log in.".to_owned()),
    }
    .into_response()
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(mut form): Form<LoginForm>,
) -> Result<Response> {
    if let Err(errors) = form.validated() {
        return Ok(render_login(form, errors, None, StatusCode::UNPROCESSABLE_ENTITY));
    }

    let user = match AuthService::new(state.pool())
        .login(&form.username, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!(username = %form.username, "Login failed");
            return Ok(render_login(
                form,
                FormErrors::new(),
                Some("Invalid username or password".to_owned()),
                StatusCode::UNAUTHORIZED,
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let current_user = CurrentUser::from(&user);
    set_current_user(&session, &current_user).await?;
    set_sentry_user(&current_user);
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Redirect::to(safe_next(form.next.as_deref())).into_response())
}

fn render_login(
    mut form: LoginForm,
    errors: FormErrors,
    error: Option<String>,
    status: StatusCode,
) -> Response {
    // Never echo the password back
    form.password.clear();
    (
        status,
        LoginTemplate {
            current_user: None,
            form,
            errors,
            error,
            success: None,
        },
    )
        .into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    RegisterTemplate {
        current_user: None,
        form: RegisterForm::default(),
        errors: FormErrors::new(),
    }
    .into_response()
}

/// Handle registration form submission.
pub async fn register(
    State(state): State<AppState>,
    Form(mut form): Form<RegisterForm>,
) -> Result<Response> {
    if let Err(errors) = form.validated() {
        return Ok(render_register(form, errors));
    }

    let result = AuthService::new(state.pool())
        .register(&form.username, &form.email, &form.password)
        .await;

    let mut errors = FormErrors::new();
    match result {
        Ok(_) => return Ok(Redirect::to("/login?registered=1").into_response()),
        Err(AuthError::UsernameTaken) => errors.add("username", "Username already taken"),
        Err(AuthError::EmailTaken) => errors.add("email", "Email already registered"),
        Err(AuthError::InvalidUsername(e)) => errors.add("username", e.to_string()),
        Err(AuthError::InvalidEmail(e)) => errors.add("email", e.to_string()),
        Err(AuthError::WeakPassword(msg)) => errors.add("password", msg),
        Err(e) => return Err(e.into()),
    }

    Ok(render_register(form, errors))
}

fn render_register(mut form: RegisterForm, errors: FormErrors) -> Response {
    form.password.clear();
    form.password_confirm.clear();
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        RegisterTemplate {
            current_user: None,
            form,
            errors,
        },
    )
        .into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Log out and return to the landing page.
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}
