//! Loan model: the lifecycle binding one book copy to one member

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{book::Book, entity::EntityMeta, enums::LoanStatus, member::Member};
use crate::error::{AppError, AppResult, ErrorCode};

/// Loan durations and renewal cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    pub loan_period_days: i64,
    pub renewal_days: i64,
    pub max_renewals: i32,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            renewal_days: 14,
            max_renewals: 2,
        }
    }
}

/// A borrowing of one copy of a book by one member.
///
/// `book_id` and `member_id` never change after creation. RETURNED and LOST
/// are terminal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub book_id: i64,
    pub member_id: i64,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub notes: Option<String>,
}

impl PartialEq for Loan {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
    }
}

impl Loan {
    /// Open a new, unsaved loan starting `today`
    pub fn create(
        book_id: i64,
        member_id: i64,
        notes: Option<String>,
        loan_period_days: i64,
        today: NaiveDate,
    ) -> Self {
        Self {
            meta: EntityMeta::unsaved(),
            book_id,
            member_id,
            loan_date: today,
            due_date: today + Duration::days(loan_period_days),
            return_date: None,
            status: LoanStatus::Active,
            renewal_count: 0,
            notes: notes.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn id(&self) -> i64 {
        self.meta.id
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.return_date.is_none() && today > self.due_date
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if !self.is_overdue(today) {
            return 0;
        }
        (today - self.due_date).num_days()
    }

    /// Negative once the due date has passed; 0 after return
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        if self.return_date.is_some() {
            return 0;
        }
        (self.due_date - today).num_days()
    }

    pub fn can_renew(&self, today: NaiveDate, max_renewals: i32) -> bool {
        self.status == LoanStatus::Active
            && self.renewal_count < max_renewals
            && !self.is_overdue(today)
    }

    /// Push the due date to `today + additional_days`. Status is unchanged.
    pub fn renew(&mut self, additional_days: i64, max_renewals: i32, today: NaiveDate) -> AppResult<()> {
        if !self.can_renew(today, max_renewals) {
            return Err(AppError::rule(
                ErrorCode::LoanCannotBeRenewed,
                format!(
                    "Loan {} cannot be renewed (status {}, {}/{} renewals, due {})",
                    self.id(),
                    self.status,
                    self.renewal_count,
                    max_renewals,
                    self.due_date
                ),
            ));
        }
        self.due_date = today + Duration::days(additional_days);
        self.renewal_count += 1;
        Ok(())
    }

    pub fn return_book(&mut self, today: NaiveDate) -> AppResult<()> {
        match self.status {
            LoanStatus::Returned => Err(AppError::rule(
                ErrorCode::LoanAlreadyReturned,
                format!("Loan {} has already been returned", self.id()),
            )),
            LoanStatus::Lost => Err(AppError::rule(
                ErrorCode::LoanLost,
                format!("Loan {} was declared lost and cannot be returned", self.id()),
            )),
            LoanStatus::Active | LoanStatus::Overdue => {
                self.return_date = Some(today);
                self.status = LoanStatus::Returned;
                Ok(())
            }
        }
    }

    /// Declare the copy lost. Callers reject terminal loans first.
    pub fn mark_lost(&mut self) {
        self.status = LoanStatus::Lost;
    }

    /// ACTIVE loans past their due date move to OVERDUE; returns whether
    /// the status changed
    pub fn flag_overdue(&mut self, today: NaiveDate) -> bool {
        if self.status == LoanStatus::Active && self.is_overdue(today) {
            self.status = LoanStatus::Overdue;
            return true;
        }
        false
    }
}

/// Loan with book/member context and derived due-date values
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i64,
    pub book_id: i64,
    pub book_title: String,
    pub book_isbn: String,
    pub member_id: i64,
    pub member_name: String,
    pub membership_number: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub notes: Option<String>,
    pub is_overdue: bool,
    pub days_overdue: i64,
    pub days_until_due: i64,
    pub can_renew: bool,
}

impl LoanDetails {
    pub fn new(loan: &Loan, book: &Book, member: &Member, today: NaiveDate, max_renewals: i32) -> Self {
        Self {
            id: loan.id(),
            book_id: loan.book_id,
            book_title: book.title.clone(),
            book_isbn: book.isbn.clone(),
            member_id: loan.member_id,
            member_name: member.full_name(),
            membership_number: member.membership_number.clone(),
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.status,
            renewal_count: loan.renewal_count,
            notes: loan.notes.clone(),
            is_overdue: loan.is_overdue(today),
            days_overdue: loan.days_overdue(today),
            days_until_due: loan.days_until_due(today),
            can_renew: loan.can_renew(today, max_renewals),
        }
    }
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i64,
    pub member_id: i64,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Loan list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
}

/// Member loan list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MemberLoansQuery {
    /// Only ACTIVE and OVERDUE loans
    pub active: Option<bool>,
}
