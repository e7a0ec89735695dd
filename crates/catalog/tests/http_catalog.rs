//! HttpCatalog against an in-process axum server.

use std::time::Duration;

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use catalog::{Catalog, CatalogError, HttpCatalog, resolve_shelf_books};
use serde_json::json;
use shelfview_core::Price;

async fn shelves(Path(user_id): Path<String>) -> Response {
    if user_id != "u1" {
        return StatusCode::NOT_FOUND.into_response();
    }
    axum::Json(json!([
        { "id": "s1", "title": "Favourites", "slug": "favourites" },
        { "id": "s2", "title": "To read", "slug": "to-read" }
    ]))
    .into_response()
}

async fn forms(Path(shelf_id): Path<String>) -> Response {
    match shelf_id.as_str() {
        "s1" => axum::Json(json!(["f1", "f2", "f3"])).into_response(),
        "object" => axum::Json(json!({ "forms": ["f1"] })).into_response(),
        "mixed" => axum::Json(json!(["f1", 42])).into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn form(Path(form_id): Path<String>) -> Response {
    match form_id.as_str() {
        "f1" => axum::Json(json!({
            "id": "f1",
            "title": "The Hobbit",
            "image": "https://img.test/f1.jpg",
            "authors": [{ "name": "J.R.R. Tolkien" }],
            "price": { "amount": 8.99, "currency": "EUR", "includes_taxes": true },
            "rating": 4.6,
            "extra": "ignored"
        }))
        .into_response(),
        "f3" => axum::Json(json!({
            "id": "f3",
            "title": "Dune",
            "image": "https://img.test/f3.jpg",
            "authors": [],
            "price": "Free"
        }))
        .into_response(),
        "garbled" => "not json at all".into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Bind to port 0 and return the base url of the running server.
async fn start_server() -> String {
    let app = Router::new()
        .route("/users/:user_id/shelves", get(shelves))
        .route("/shelves/:shelf_id/forms", get(forms))
        .route("/forms/:form_id", get(form));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn lists_shelves_for_user() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let shelves = catalog.list_shelves().await.unwrap();
    let ids: Vec<_> = shelves.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);
    assert_eq!(shelves[1].slug, "to-read");
}

#[tokio::test]
async fn unknown_user_is_a_transport_error() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "nobody");

    let err = catalog.list_shelves().await.unwrap_err();
    match err {
        CatalogError::Transport { message, .. } => assert!(message.contains("404")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn object_membership_is_a_shape_error() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let err = catalog.list_shelf_book_ids("object").await.unwrap_err();
    assert_eq!(
        err,
        CatalogError::Shape {
            shelf_id: "object".to_string(),
            found: "an object",
        }
    );

    let err = resolve_shelf_books(&catalog, "object").await.unwrap_err();
    assert!(matches!(err, CatalogError::Shape { .. }));
}

#[tokio::test]
async fn non_string_member_is_a_decode_error() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let err = catalog.list_shelf_book_ids("mixed").await.unwrap_err();
    assert!(matches!(err, CatalogError::Decode { .. }));
}

#[tokio::test]
async fn malformed_book_body_is_a_decode_error() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let err = catalog.get_book("garbled").await.unwrap_err();
    assert!(matches!(err, CatalogError::Decode { .. }));
}

#[tokio::test]
async fn resolves_shelf_and_drops_failed_book() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let books = resolve_shelf_books(&catalog, "s1").await.unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f3"]);

    assert_eq!(books[0].author_line(), "J.R.R. Tolkien");
    assert!(matches!(books[0].price, Some(Price::Structured(_))));
    assert_eq!(books[1].price, Some(Price::Text("Free".to_string())));
    assert_eq!(books[1].rating, None);
}

#[tokio::test]
async fn failing_membership_call_fails_resolution() {
    let base = start_server().await;
    let catalog = HttpCatalog::new(base, "u1");

    let err = resolve_shelf_books(&catalog, "broken").await.unwrap_err();
    assert!(matches!(err, CatalogError::Transport { .. }));
}

#[tokio::test]
async fn supplied_client_timeout_is_a_transport_error() {
    let base = start_server().await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let catalog = HttpCatalog::new(base, "u1").with_client(client);

    let err = catalog.get_book("slow").await.unwrap_err();
    assert!(matches!(err, CatalogError::Transport { url, .. } if url.ends_with("/forms/slow")));
}
