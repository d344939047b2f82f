//! Book (catalog title) model and copy bookkeeping

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::{entity::EntityMeta, enums::BookStatus};
use crate::error::{AppError, AppResult, ErrorCode};

/// A catalog title with its circulating copy counters.
///
/// `0 <= available_copies <= total_copies` holds after every method below.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub category_id: Option<i64>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: BookStatus,
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
    }
}

impl Book {
    /// New, unsaved title with every copy on the shelf
    pub fn new(isbn: impl Into<String>, title: impl Into<String>, author: impl Into<String>, copies: i32) -> Self {
        Self {
            meta: EntityMeta::unsaved(),
            isbn: isbn.into(),
            title: title.into(),
            author: author.into(),
            publisher: None,
            publication_date: None,
            category_id: None,
            total_copies: copies,
            available_copies: copies,
            status: BookStatus::Available,
        }
    }

    pub fn id(&self) -> i64 {
        self.meta.id
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0 && self.status == BookStatus::Available
    }

    /// Copies currently out on loan
    pub fn loaned_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Take one copy off the shelf for a new loan
    pub fn borrow_copy(&mut self) -> AppResult<()> {
        if !self.is_available() {
            return Err(AppError::rule(
                ErrorCode::NoCopiesAvailable,
                format!("No copies of '{}' are available", self.title),
            ));
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put a returned copy back on the shelf
    pub fn return_copy(&mut self) -> AppResult<()> {
        if self.available_copies >= self.total_copies {
            return Err(AppError::rule(
                ErrorCode::AllCopiesAlreadyAvailable,
                format!("All copies of '{}' are already available", self.title),
            ));
        }
        self.available_copies += 1;
        Ok(())
    }

    /// Remove a lost copy from the collection.
    ///
    /// The copy was already off the shelf while on loan, so only the total
    /// shrinks. Fails when no copy is out to be written off.
    pub fn write_off_copy(&mut self) -> AppResult<()> {
        if self.loaned_copies() <= 0 {
            return Err(AppError::rule(
                ErrorCode::AllCopiesAlreadyAvailable,
                format!("No loaned copy of '{}' to write off", self.title),
            ));
        }
        self.total_copies -= 1;
        Ok(())
    }

    /// Resize the collection, shifting the shelf count by the same delta.
    /// A title keeps at least one copy.
    pub fn set_total_copies(&mut self, new_total: i32) -> AppResult<()> {
        if new_total < 1 {
            return Err(AppError::Validation(vec![format!(
                "total_copies: must be at least 1 (got {})",
                new_total
            )]));
        }
        let loaned = self.loaned_copies();
        if new_total < loaned {
            return Err(AppError::rule(
                ErrorCode::BelowLoanedCopies,
                format!(
                    "Cannot set total copies of '{}' to {}: {} copies are on loan",
                    self.title, new_total, loaned
                ),
            ));
        }
        let delta = new_total - self.total_copies;
        self.total_copies = new_total;
        self.available_copies += delta;
        Ok(())
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 10, max = 17, message = "ISBN must be between 10 and 17 characters"))]
    pub isbn: String,
    #[validate(
        length(max = 255, message = "Title must be at most 255 characters"),
        custom(function = "not_blank", message = "Title is required")
    )]
    pub title: String,
    #[validate(
        length(max = 255, message = "Author must be at most 255 characters"),
        custom(function = "not_blank", message = "Author is required")
    )]
    pub author: String,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub category_id: Option<i64>,
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
    pub status: Option<BookStatus>,
}

/// Update book request (bibliographic fields and status; copies go through
/// the copy-count endpoint)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 10, max = 17, message = "ISBN must be between 10 and 17 characters"))]
    pub isbn: Option<String>,
    #[validate(
        length(max = 255, message = "Title must be at most 255 characters"),
        custom(function = "not_blank", message = "Title must not be blank")
    )]
    pub title: Option<String>,
    #[validate(
        length(max = 255, message = "Author must be at most 255 characters"),
        custom(function = "not_blank", message = "Author must not be blank")
    )]
    pub author: Option<String>,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub category_id: Option<i64>,
    pub status: Option<BookStatus>,
}

impl UpdateBook {
    pub fn apply(self, book: &mut Book) {
        if let Some(isbn) = self.isbn {
            book.isbn = isbn;
        }
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if self.publisher.is_some() {
            book.publisher = self.publisher;
        }
        if self.publication_date.is_some() {
            book.publication_date = self.publication_date;
        }
        if self.category_id.is_some() {
            book.category_id = self.category_id;
        }
        if let Some(status) = self.status {
            book.status = status;
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Copy count change request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCopies {
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
}

/// Book search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    pub category_id: Option<i64>,
    /// Only titles with a copy on the shelf
    pub available: Option<bool>,
}

impl BookQuery {
    pub fn matches(&self, book: &Book) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
                .unwrap_or(true)
        }

        contains(&book.title, &self.title)
            && contains(&book.author, &self.author)
            && self.category_id.map(|c| book.category_id == Some(c)).unwrap_or(true)
            && self.available.map(|a| book.is_available() == a).unwrap_or(true)
    }
}
