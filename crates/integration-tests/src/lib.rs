//! Integration tests for Garage Inventory.
//!
//! The full router is driven in-process with `tower::ServiceExt::oneshot`
//! against a temporary `SQLite` database and a temporary upload directory,
//! so the tests need no running server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p garage-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use bytes::Bytes;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use garage_core::BoxId;
use garage_web::config::AppConfig;
use garage_web::db;
use garage_web::services::storage::{self, StorageBackend, StorageError};
use garage_web::state::AppState;

/// Base URL the test configuration encodes into QR labels.
pub const BASE_URL: &str = "http://garage.test";

/// Password used by [`TestApp::signed_in`].
pub const PASSWORD: &str = "correct-horse-battery";

const BOUNDARY: &str = "garage-test-boundary";

// =============================================================================
// Test App
// =============================================================================

/// An application instance backed by temporary storage.
pub struct TestApp {
    router: Router,
    pub pool: SqlitePool,
    pub storage: Arc<dyn StorageBackend>,
    upload_root: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// App using the local filesystem backend.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// App using the given storage backend instead of the configured one.
    pub async fn with_storage(storage: Arc<dyn StorageBackend>) -> Self {
        Self::build(Some(storage)).await
    }

    async fn build(storage: Option<Arc<dyn StorageBackend>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let upload_root = dir.path().join("uploads");
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("garage.db").display());

        let vars = HashMap::from([
            ("GARAGE_ENV", "testing".to_owned()),
            ("DATABASE_URL", database_url),
            ("GARAGE_BASE_URL", BASE_URL.to_owned()),
            ("STORAGE_BACKEND", "local".to_owned()),
            ("STORAGE_PATH", upload_root.display().to_string()),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let pool = db::create_pool(&config.database_url).await.unwrap();
        db::migrate(&pool).await.unwrap();

        let storage = match storage {
            Some(storage) => storage,
            None => storage::from_config(&config.storage).await.unwrap(),
        };

        let state = AppState::new(config, pool.clone(), Arc::clone(&storage));
        Self {
            router: garage_web::build_router(state),
            pool,
            storage,
            upload_root,
            _dir: dir,
        }
    }

    /// Root directory of the local backend.
    #[must_use]
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// A client without a session.
    #[must_use]
    pub fn client(&self) -> Client<'_> {
        Client {
            app: self,
            cookie: Mutex::new(None),
        }
    }

    /// Register `username` and return a logged-in client.
    pub async fn signed_in(&self, username: &str) -> Client<'_> {
        let client = self.client();
        let response = client.register(username, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "register {username}");
        let response = client.login(username, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "login {username}");
        client
    }

    /// Register `username` as an administrator and return a logged-in client.
    pub async fn signed_in_admin(&self, username: &str) -> Client<'_> {
        let client = self.client();
        client.register(username, PASSWORD).await;

        let parsed = garage_core::Username::parse(username).unwrap();
        let repo = db::UserRepository::new(&self.pool);
        let user = repo.get_by_username(&parsed).await.unwrap().unwrap();
        repo.set_admin(user.id, true).await.unwrap();

        let response = client.login(username, PASSWORD).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        client
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Issues requests against a [`TestApp`], carrying the session cookie.
pub struct Client<'a> {
    app: &'a TestApp,
    cookie: Mutex<Option<String>>,
}

impl Client<'_> {
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path), Body::empty()).await
    }

    /// POST an urlencoded form.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Request::post(path).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    /// POST a multipart form, optionally with an `image` file part.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::post(path).header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ),
            Body::from(body),
        )
        .await
    }

    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        let email = format!("{username}@example.com");
        self.post_form(
            "/register",
            &[
                ("username", username),
                ("email", email.as_str()),
                ("password", password),
                ("password_confirm", password),
            ],
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_form("/login", &[("username", username), ("password", password)])
            .await
    }

    /// Create a box without a photo and return its ID.
    pub async fn create_box(&self, name: &str) -> BoxId {
        self.create_box_with_image(name, None).await
    }

    /// Create a box, optionally uploading a photo, and return its ID.
    pub async fn create_box_with_image(&self, name: &str, image: Option<(&str, &[u8])>) -> BoxId {
        let response = self
            .post_multipart("/box/create", &[("name", name)], image)
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "{}", response.text());
        response.redirect_id("/box/")
    }

    /// Add an item to a box.
    pub async fn create_item(&self, box_id: BoxId, name: &str, quantity: &str) -> TestResponse {
        self.post_form(
            &format!("/box/{box_id}/item/create"),
            &[("name", name), ("quantity", quantity)],
        )
        .await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let cookie = self.cookie.lock().unwrap().clone();
        let builder = match cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self.app.send(builder.body(body).unwrap()).await;

        if let Some(set_cookie) = response.headers.get(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap_or_default().to_owned();
            let removed = set_cookie.to_ascii_lowercase().contains("max-age=0");
            *self.cookie.lock().unwrap() = (!removed).then_some(pair);
        }
        response
    }
}

// =============================================================================
// Response
// =============================================================================

/// A fully buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The `Location` header, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Parse the ID from a redirect such as `/box/7`.
    #[must_use]
    pub fn redirect_id(&self, prefix: &str) -> BoxId {
        let location = self.location().unwrap();
        BoxId::new(location.strip_prefix(prefix).unwrap().parse().unwrap())
    }
}

// =============================================================================
// Storage Fakes
// =============================================================================

/// Storage backend that keeps files in memory.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn store(&self, bytes: Bytes, filename_hint: &str) -> Result<String, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        let ext = storage::image_extension(filename_hint)?;
        let reference = storage::generate_name(&ext);
        self.files
            .lock()
            .unwrap()
            .insert(reference.clone(), bytes);
        Ok(reference)
    }

    fn retrieve_url(&self, reference: &str) -> Result<String, StorageError> {
        Ok(format!("/memory/{reference}"))
    }

    async fn delete(&self, reference: &str) -> Result<(), StorageError> {
        self.files.lock().unwrap().remove(reference);
        Ok(())
    }

    async fn exists(&self, reference: &str) -> Result<bool, StorageError> {
        Ok(self.files.lock().unwrap().contains_key(reference))
    }
}

/// Bytes starting with the PNG signature.
#[must_use]
pub fn png_bytes() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d, b'I', b'H', b'D', b'R', 0,
        0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0, 0x3a, 0x7e, 0x9b, 0x55,
    ]
}
