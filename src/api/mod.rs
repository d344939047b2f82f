//! REST API handlers and router

pub mod books;
pub mod categories;
pub mod health;
pub mod loans;
pub mod members;
pub mod openapi;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/isbn/:isbn", get(books::get_book_by_isbn))
        .route("/books/:id/copies", put(books::update_copies))
        .route("/books/:id/loans", get(books::get_book_loans))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route("/members/number/:number", get(members::get_member_by_number))
        .route("/members/:id/suspend", post(members::suspend_member))
        .route("/members/:id/activate", post(members::activate_member))
        .route("/members/:id/renew", post(members::renew_membership))
        .route("/members/:id/loans", get(members::get_member_loans))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::borrow))
        .route("/loans/overdue", get(loans::list_overdue))
        .route("/loans/due-before/:date", get(loans::list_due_before))
        .route("/loans/sweep-overdue", post(loans::sweep_overdue))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        .route("/loans/:id/lost", post(loans::mark_lost))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
