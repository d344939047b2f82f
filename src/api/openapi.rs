//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, categories, health, loans, members};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Circulation API",
        version = "1.0.0",
        description = "Book inventory, member accounts and loan circulation",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::get_book_by_isbn,
        books::create_book,
        books::update_book,
        books::update_copies,
        books::delete_book,
        books::get_book_loans,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Members
        members::list_members,
        members::get_member,
        members::get_member_by_number,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::suspend_member,
        members::activate_member,
        members::renew_membership,
        members::get_member_loans,
        // Loans
        loans::list_loans,
        loans::list_overdue,
        loans::list_due_before,
        loans::get_loan,
        loans::borrow,
        loans::return_loan,
        loans::renew_loan,
        loans::mark_lost,
        loans::sweep_overdue,
    ),
    components(
        schemas(
            // Books
            crate::models::Book,
            crate::models::BookStatus,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::UpdateCopies,
            // Categories
            crate::models::Category,
            crate::models::category::CategoryRequest,
            // Members
            crate::models::Member,
            crate::models::MemberStatus,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::models::member::RenewMembership,
            // Loans
            crate::models::Loan,
            crate::models::LoanStatus,
            crate::models::LoanDetails,
            crate::models::loan::BorrowRequest,
            loans::SweepResponse,
            // Common
            crate::models::EntityMeta,
            health::HealthResponse,
            crate::error::ErrorCode,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book inventory"),
        (name = "categories", description = "Book categories"),
        (name = "members", description = "Member accounts"),
        (name = "loans", description = "Loan circulation")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_circulation_path_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/loans", "/loans/{id}/return", "/loans/{id}/lost", "/books/{id}/copies", "/members/{id}/loans"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
