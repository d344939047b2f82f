//! API integration tests driving the router in-process

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_circulation::api::create_router;

use crate::common::Fixture;

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn setup() -> (Fixture, Router) {
    let fx = Fixture::new();
    let app = create_router(fx.state());
    (fx, app)
}

async fn create_book(app: &Router, isbn: &str, copies: i32) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/books",
        Some(json!({
            "isbn": isbn,
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "total_copies": copies
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn create_member(app: &Router, email: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/members",
        Some(json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": email
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_health_check() {
    let (_fx, app) = setup().await;

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_book_crud() {
    let (_fx, app) = setup().await;
    let book = create_book(&app, "9780441478125", 2).await;
    let id = book["id"].as_i64().unwrap();
    assert_eq!(book["available_copies"], 2);
    assert_eq!(book["status"], "AVAILABLE");
    assert_eq!(book["version"], 1);

    let (status, body) = call(&app, Method::GET, "/books/isbn/9780441478125", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = call(&app, Method::GET, "/books?title=left%20hand", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/books/{}", id),
        Some(json!({ "publisher": "Ace" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publisher"], "Ace");
    assert_eq!(body["version"], 2);

    let (status, _) = call(&app, Method::DELETE, &format!("/books/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, Method::GET, &format!("/books/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_invalid_book_is_rejected() {
    let (_fx, app) = setup().await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/books",
        Some(json!({
            "isbn": "123",
            "title": "",
            "author": "Nobody",
            "total_copies": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert_eq!(body["details"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_blank_title_is_rejected() {
    let (_fx, app) = setup().await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/books",
        Some(json!({
            "isbn": "9780441478125",
            "title": "   ",
            "author": "Ursula K. Le Guin",
            "total_copies": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0], "title: Title is required");
}

#[tokio::test]
async fn test_duplicate_isbn_conflicts() {
    let (_fx, app) = setup().await;
    create_book(&app, "9780441478125", 1).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/books",
        Some(json!({
            "isbn": "9780441478125",
            "title": "Again",
            "author": "Someone",
            "total_copies": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
async fn test_circulation_over_http() {
    let (_fx, app) = setup().await;
    let book = create_book(&app, "9780441478125", 1).await;
    let grace = create_member(&app, "grace@example.org").await;
    let alan = create_member(&app, "alan@example.org").await;
    let book_id = book["id"].as_i64().unwrap();

    let (status, loan) = call(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book_id, "member_id": grace["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "ACTIVE");
    assert_eq!(loan["book_title"], "The Left Hand of Darkness");
    assert_eq!(loan["member_name"], "Grace Hopper");
    assert_eq!(loan["due_date"], "2024-03-15");
    let loan_id = loan["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book_id, "member_id": grace["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateActiveLoan");

    let (status, body) = call(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book_id, "member_id": alan["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BookNotAvailable");

    let (status, body) = call(&app, Method::POST, &format!("/loans/{}/renew", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["renewal_count"], 1);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/members/{}/loans?active=true", grace["id"]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::POST, &format!("/loans/{}/return", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RETURNED");
    assert_eq!(body["return_date"], "2024-03-01");

    let (status, body) = call(&app, Method::POST, &format!("/loans/{}/return", loan_id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "LoanAlreadyReturned");

    let (_, body) = call(&app, Method::GET, &format!("/books/{}", book_id), None).await;
    assert_eq!(body["available_copies"], 1);
}

#[tokio::test]
async fn test_sweep_and_overdue_listing() {
    let (fx, app) = setup().await;
    let book = create_book(&app, "9780441478125", 2).await;
    let member = create_member(&app, "grace@example.org").await;

    let (_, loan) = call(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book["id"], "member_id": member["id"] })),
    )
    .await;

    fx.clock.advance(16);

    let (status, body) = call(&app, Method::GET, "/loans/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], loan["id"]);
    assert_eq!(body[0]["days_overdue"], 2);
    assert_eq!(body[0]["status"], "ACTIVE");

    let (status, body) = call(&app, Method::POST, "/loans/sweep-overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flagged"], 1);

    let (_, body) = call(&app, Method::GET, "/loans?status=OVERDUE", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = call(&app, Method::GET, "/loans/due-before/2024-03-10", None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/loans/{}/renew", loan["id"]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "LoanCannotBeRenewed");
}

#[tokio::test]
async fn test_copy_count_and_loss() {
    let (_fx, app) = setup().await;
    let book = create_book(&app, "9780441478125", 3).await;
    let member = create_member(&app, "grace@example.org").await;
    let book_id = book["id"].as_i64().unwrap();

    let (_, loan) = call(
        &app,
        Method::POST,
        "/loans",
        Some(json!({ "book_id": book_id, "member_id": member["id"] })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/books/{}/copies", book_id),
        Some(json!({ "total_copies": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/books/{}/copies", book_id),
        Some(json!({ "total_copies": -3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::POST, &format!("/loans/{}/lost", loan["id"]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LOST");

    let (_, body) = call(&app, Method::GET, &format!("/books/{}", book_id), None).await;
    assert_eq!(body["total_copies"], 2);
    assert_eq!(body["available_copies"], 2);

    let (_, body) = call(&app, Method::GET, &format!("/members/{}", member["id"]), None).await;
    assert_eq!(body["active_loans"], 0);
}

#[tokio::test]
async fn test_member_lifecycle() {
    let (_fx, app) = setup().await;
    let member = create_member(&app, "grace@example.org").await;
    let id = member["id"].as_i64().unwrap();
    assert!(member["membership_number"].as_str().unwrap().starts_with("MEM-"));
    assert_eq!(member["expiration_date"], "2025-03-01");

    let (status, body) = call(
        &app,
        Method::POST,
        "/members",
        Some(json!({ "first_name": "G", "last_name": "H", "email": "GRACE@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");

    let (status, body) = call(&app, Method::POST, &format!("/members/{}/suspend", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUSPENDED");

    let (_, body) = call(&app, Method::GET, "/members?status=SUSPENDED", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/members/{}/renew", id),
        Some(json!({ "years": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiration_date"], "2027-03-01");
    assert_eq!(body["status"], "SUSPENDED");

    let (status, body) = call(&app, Method::POST, &format!("/members/{}/activate", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");

    let (status, _) = call(&app, Method::DELETE, &format!("/members/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_categories() {
    let (_fx, app) = setup().await;
    let (status, category) = call(
        &app,
        Method::POST,
        "/categories",
        Some(json!({ "name": "Science Fiction" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/books",
        Some(json!({
            "isbn": "9780441478125",
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "category_id": category["id"],
            "total_copies": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/books?category_id={}", category["id"]),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::DELETE, &format!("/categories/{}", category["id"]), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "CategoryHasBooks");
}
