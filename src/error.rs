//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error kinds surfaced to callers alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 2,
    NotFound = 3,
    Duplicate = 4,
    DuplicateActiveLoan = 5,
    BadValue = 6,
    NoCopiesAvailable = 7,
    AllCopiesAlreadyAvailable = 8,
    BookNotAvailable = 9,
    MemberCannotBorrow = 10,
    NoActiveLoansToDecrement = 11,
    MembershipExpired = 12,
    LoanCannotBeRenewed = 13,
    LoanAlreadyReturned = 14,
    LoanLost = 15,
    BelowLoanedCopies = 16,
    BookHasLoanedCopies = 17,
    MemberHasActiveLoans = 18,
    CategoryHasBooks = 19,
    ConcurrentModification = 20,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {1}")]
    Conflict(ErrorCode, String),

    #[error("Business rule violation: {1}")]
    BusinessRule(ErrorCode, String),

    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn rule(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::BusinessRule(code, message.into())
    }

    pub fn duplicate(entity: &str, field: &str, value: &str) -> Self {
        AppError::Conflict(
            ErrorCode::Duplicate,
            format!("{} with {} '{}' already exists", entity, field, value),
        )
    }

    /// Stable kind of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(code, _) | AppError::BusinessRule(code, _) => *code,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::BusinessRule(..) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: invalid value ({})", field, e.code),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ("Database error".to_string(), Vec::new())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), Vec::new())
            }
            AppError::Validation(fields) => ("Validation failed".to_string(), fields),
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(_, msg)
            | AppError::BusinessRule(_, msg) => (msg, Vec::new()),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
