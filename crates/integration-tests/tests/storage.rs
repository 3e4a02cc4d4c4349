//! Swapping the storage backend does not change what users see.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use garage_integration_tests::{MemoryStorage, TestApp, png_bytes};
use garage_web::services::storage::StorageBackend;

#[tokio::test]
async fn test_memory_backend_behaves_like_local() {
    let memory = Arc::new(MemoryStorage::default());
    let app = TestApp::with_storage(Arc::clone(&memory) as Arc<dyn StorageBackend>).await;
    let alice = app.signed_in("alice").await;

    let png = png_bytes();
    let box_id = alice
        .create_box_with_image("Holiday", Some(("beach.png", png.as_slice())))
        .await;
    assert_eq!(memory.len(), 1);

    let image_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(app.storage.exists(&image_ref).await.unwrap());

    let page = alice.get(&format!("/box/{box_id}")).await.text();
    assert!(page.contains(&format!("/memory/{image_ref}")));

    let response = alice
        .post_multipart("/box/create", &[("name", "Bad")], Some(("notes.txt", &b"hi"[..])))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(memory.len(), 1);

    let response = alice.post_form(&format!("/box/{box_id}/delete"), &[]).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(memory.is_empty());
}

#[tokio::test]
async fn test_local_backend_writes_under_root() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let png = png_bytes();
    let box_id = alice
        .create_box_with_image("Holiday", Some(("beach.PNG", png.as_slice())))
        .await;
    let image_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();

    assert!(image_ref.starts_with("images/"));
    assert!(image_ref.ends_with(".png"));
    assert_eq!(std::fs::read(app.upload_root().join(&image_ref)).unwrap(), png);
}
