//! Box and item lifecycle through the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use garage_core::{Money, Quantity};
use garage_integration_tests::{TestApp, png_bytes};
use garage_web::db::ItemRepository;
use garage_web::db::items::ItemFields;

async fn item_count(app: &TestApp, box_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE box_id = ?")
        .bind(box_id)
        .fetch_one(&app.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_box_with_items_and_stats() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;
    let box_id = alice.create_box("Workshop").await;

    let response = alice
        .post_form(
            &format!("/box/{box_id}/item/create"),
            &[
                ("name", "Screws"),
                ("quantity", "100"),
                ("category", "Hardware"),
                ("value", "0.10"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    alice.create_item(box_id, "Saw", "").await;

    let page = alice.get(&format!("/box/{box_id}")).await.text();
    assert!(page.contains("Screws"));
    assert!(page.contains("Saw"));
    assert!(page.contains("101 units"));
    assert!(page.contains("10.00"));
    assert!(page.contains("Hardware"));

    let dashboard = alice.get("/dashboard").await.text();
    assert!(dashboard.contains("Workshop"));
    assert!(dashboard.contains("2 items, 101 units"));
}

#[tokio::test]
async fn test_box_page_survives_unrepresentable_total() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;
    let box_id = alice.create_box("Vault").await;

    // Each row is individually valid; only their sum overflows
    let fields = ItemFields {
        name: "Gold".to_owned(),
        quantity: Quantity::new(i64::from(u32::MAX)).unwrap(),
        value: Some(Money::parse("92233720368547758.07").unwrap()),
        ..ItemFields::default()
    };
    let items = ItemRepository::new(&app.pool);
    for _ in 0..300 {
        items.create(box_id, &fields).await.unwrap();
    }

    let response = alice.get(&format!("/box/{box_id}")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("total value too large"));
}

#[tokio::test]
async fn test_negative_quantity_is_form_error() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;
    let box_id = alice.create_box("Workshop").await;

    let response = alice.create_item(box_id, "Nails", "-5").await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text();
    assert!(page.contains("Quantity must be 0 or greater"));
    // Submitted values are echoed back
    assert!(page.contains("value=\"Nails\""));

    assert_eq!(item_count(&app, box_id.as_i64()).await, 0);
}

#[tokio::test]
async fn test_missing_name_is_form_error() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let response = alice
        .post_multipart("/box/create", &[("name", "   "), ("location", "Loft")], None)
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("Name is required"));
}

#[tokio::test]
async fn test_bad_image_extension_is_form_error() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let response = alice
        .post_multipart(
            "/box/create",
            &[("name", "Photos")],
            Some(("virus.exe", &b"MZ\x90\x00"[..])),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("Unsupported file type"));

    let boxes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM boxes")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(boxes, 0);
}

#[tokio::test]
async fn test_delete_box_removes_items_and_image() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let png = png_bytes();
    let box_id = alice
        .create_box_with_image("Camping", Some(("tent.png", png.as_slice())))
        .await;
    alice.create_item(box_id, "Tent", "1").await;
    alice.create_item(box_id, "Stove", "1").await;

    let image_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    let image_path = app.upload_root().join(&image_ref);
    assert!(image_path.exists());

    // The photo is served from the upload directory
    let response = alice.get(&format!("/uploads/{image_ref}")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), png.as_slice());

    let response = alice.post_form(&format!("/box/{box_id}/delete"), &[]).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/dashboard"));

    assert_eq!(item_count(&app, box_id.as_i64()).await, 0);
    assert!(!image_path.exists());
    assert_eq!(
        alice.get(&format!("/box/{box_id}")).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_replacing_image_releases_old_one() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let png = png_bytes();
    let box_id = alice
        .create_box_with_image("Camping", Some(("old.png", png.as_slice())))
        .await;
    let old_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let response = alice
        .post_multipart(
            &format!("/box/{box_id}/edit"),
            &[("name", "Camping")],
            Some(("new.jpg", png.as_slice())),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let new_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_ne!(old_ref, new_ref);
    assert!(new_ref.ends_with(".jpg"));
    assert!(!app.upload_root().join(&old_ref).exists());
    assert!(app.upload_root().join(&new_ref).exists());

    let response = alice
        .post_multipart(
            &format!("/box/{box_id}/edit"),
            &[("name", "Camping"), ("delete_image", "on")],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(!app.upload_root().join(&new_ref).exists());
}

#[tokio::test]
async fn test_failed_box_update_keeps_photo() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;

    let png = png_bytes();
    let box_id = alice
        .create_box_with_image("Camping", Some(("tent.png", png.as_slice())))
        .await;
    let old_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TRIGGER reject_box_updates BEFORE UPDATE ON boxes \
         BEGIN SELECT RAISE(ABORT, 'read only'); END",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    for (fields, upload) in [
        (vec![("name", "Camping"), ("delete_image", "on")], None),
        (vec![("name", "Camping")], Some(("new.jpg", png.as_slice()))),
    ] {
        let response = alice
            .post_multipart(&format!("/box/{box_id}/edit"), &fields, upload)
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    let image_ref: String = sqlx::query_scalar("SELECT image_ref FROM boxes WHERE id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(image_ref, old_ref);
    assert!(app.upload_root().join(&old_ref).exists());

    // The rejected replacement upload was released again
    let stored = std::fs::read_dir(app.upload_root().join("images")).unwrap().count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn test_edit_and_duplicate_item() {
    let app = TestApp::new().await;
    let alice = app.signed_in("alice").await;
    let box_id = alice.create_box("Kitchen").await;
    alice.create_item(box_id, "Mug", "2").await;
    let item_id: i64 = sqlx::query_scalar("SELECT id FROM items WHERE box_id = ?")
        .bind(box_id.as_i64())
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let response = alice
        .post_form(
            &format!("/item/{item_id}/edit"),
            &[("name", "Coffee mug"), ("quantity", "6"), ("notes", "Chipped")],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let response = alice
        .post_form(&format!("/item/{item_id}/duplicate"), &[])
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let page = alice.get(&format!("/box/{box_id}")).await.text();
    assert!(page.contains("Coffee mug (copy)"));
    assert!(page.contains("12 units"));

    let response = alice.post_form(&format!("/item/{item_id}/delete"), &[]).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(item_count(&app, box_id.as_i64()).await, 1);
}
