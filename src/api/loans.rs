//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{BorrowRequest, LoanQuery},
        LoanDetails, LoanStatus,
    },
    AppState,
};

/// Outcome of an overdue sweep
#[derive(Serialize, ToSchema)]
pub struct SweepResponse {
    /// Loans moved from ACTIVE to OVERDUE
    pub flagged: usize,
}

/// List loans by status (ACTIVE when omitted)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans ordered by due date", body = Vec<LoanDetails>),
        (status = 400, description = "Unknown status", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let status = query.status.unwrap_or(LoanStatus::Active);
    let loans = state.services.circulation.loans_by_status(status).await?;
    Ok(Json(loans))
}

/// Open loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_overdue(State(state): State<AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.overdue_loans().await?;
    Ok(Json(loans))
}

/// Open loans due before a date
#[utoipa::path(
    get,
    path = "/loans/due-before/{date}",
    tag = "loans",
    params(
        ("date" = String, Path, description = "ISO date (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Open loans due strictly before the date", body = Vec<LoanDetails>),
        (status = 400, description = "Invalid date")
    )
)]
pub async fn list_due_before(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.loans_due_before(date).await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.get_loan(id).await?;
    Ok(Json(loan))
}

/// Create a new loan (borrow a book)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 404, description = "Book or member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Member already holds this book", body = crate::error::ErrorResponse),
        (status = 422, description = "Book unavailable or member cannot borrow", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    request.validate()?;
    let loan = state
        .services
        .circulation
        .borrow(request.book_id, request.member_id, request.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Already returned or lost", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.return_book(id).await?;
    Ok(Json(loan))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan renewed", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Loan cannot be renewed", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_loan(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.renew(id).await?;
    Ok(Json(loan))
}

/// Declare the borrowed copy lost
#[utoipa::path(
    post,
    path = "/loans/{id}/lost",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan marked lost", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Loan already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_lost(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.mark_as_lost(id).await?;
    Ok(Json(loan))
}

/// Flag every ACTIVE loan past due as OVERDUE
#[utoipa::path(
    post,
    path = "/loans/sweep-overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse)
    )
)]
pub async fn sweep_overdue(State(state): State<AppState>) -> AppResult<Json<SweepResponse>> {
    let flagged = state.services.circulation.sweep_overdue().await?;
    Ok(Json(SweepResponse { flagged }))
}
