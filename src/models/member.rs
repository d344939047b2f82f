//! Member account model and borrowing quota

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{entity::EntityMeta, enums::MemberStatus};
use crate::error::{AppError, AppResult, ErrorCode};

/// Default ceiling on simultaneous active loans
pub const DEFAULT_MAX_LOANS: i32 = 5;

/// A registered borrower.
///
/// `active_loans` mirrors the number of this member's loans in ACTIVE or
/// OVERDUE state; only circulation operations move it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub meta: EntityMeta,
    pub membership_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub registration_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub status: MemberStatus,
    pub active_loans: i32,
    pub max_loans: i32,
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
    }
}

impl Member {
    /// New, unsaved member registered `today` for `years`
    pub fn new(
        membership_number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        today: NaiveDate,
        years: u32,
    ) -> Self {
        Self {
            meta: EntityMeta::unsaved(),
            membership_number: membership_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: None,
            address: None,
            registration_date: today,
            expiration_date: add_years(today, years),
            status: MemberStatus::Active,
            active_loans: 0,
            max_loans: DEFAULT_MAX_LOANS,
        }
    }

    pub fn id(&self) -> i64 {
        self.meta.id
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }

    pub fn can_borrow(&self, today: NaiveDate) -> bool {
        self.status == MemberStatus::Active
            && self.active_loans < self.max_loans
            && !self.is_expired(today)
    }

    pub fn increment_active_loans(&mut self, today: NaiveDate) -> AppResult<()> {
        if !self.can_borrow(today) {
            return Err(AppError::rule(
                ErrorCode::MemberCannotBorrow,
                format!("Member '{}' cannot borrow books", self.full_name()),
            ));
        }
        self.active_loans += 1;
        Ok(())
    }

    pub fn decrement_active_loans(&mut self) -> AppResult<()> {
        if self.active_loans == 0 {
            return Err(AppError::rule(
                ErrorCode::NoActiveLoansToDecrement,
                format!("Member '{}' has no active loans", self.full_name()),
            ));
        }
        self.active_loans -= 1;
        Ok(())
    }

    /// Extend from whichever is later, today or the current expiration
    pub fn renew_membership(&mut self, years: u32, today: NaiveDate) {
        let base = self.expiration_date.max(today);
        self.expiration_date = add_years(base, years);
        if self.status == MemberStatus::Expired {
            self.status = MemberStatus::Active;
        }
    }

    pub fn suspend(&mut self) {
        self.status = MemberStatus::Suspended;
    }

    pub fn activate(&mut self, today: NaiveDate) -> AppResult<()> {
        if self.is_expired(today) {
            return Err(AppError::rule(
                ErrorCode::MembershipExpired,
                format!(
                    "Membership of '{}' expired on {}. Renew first.",
                    self.full_name(),
                    self.expiration_date
                ),
            ));
        }
        self.status = MemberStatus::Active;
        Ok(())
    }
}

/// Calendar-year addition; Feb 29 falls back to Feb 28
fn add_years(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_add_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MAX)
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    /// Generated when omitted
    #[validate(length(min = 1, max = 20, message = "Membership number must be 1 to 20 characters"))]
    pub membership_number: Option<String>,
    #[validate(length(min = 1, max = 100, message = "First name is required (max 100 characters)"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required (max 100 characters)"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,
    #[validate(range(min = 1, message = "Loan quota must be at least 1"))]
    pub max_loans: Option<i32>,
}

/// Update member request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1 to 100 characters"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,
    #[validate(range(min = 1, message = "Loan quota must be at least 1"))]
    pub max_loans: Option<i32>,
}

impl UpdateMember {
    pub fn apply(self, member: &mut Member) {
        if let Some(first_name) = self.first_name {
            member.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            member.last_name = last_name;
        }
        if let Some(email) = self.email {
            member.email = email;
        }
        if self.phone.is_some() {
            member.phone = self.phone;
        }
        if self.address.is_some() {
            member.address = self.address;
        }
        if let Some(max_loans) = self.max_loans {
            member.max_loans = max_loans;
        }
    }
}

/// Membership renewal request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenewMembership {
    pub years: Option<u32>,
}

/// Member search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    /// Case-insensitive substring of first or last name
    pub name: Option<String>,
    pub status: Option<MemberStatus>,
}

impl MemberQuery {
    pub fn matches(&self, member: &Member) -> bool {
        let name_ok = self
            .name
            .as_ref()
            .map(|n| member.full_name().to_lowercase().contains(&n.to_lowercase()))
            .unwrap_or(true);
        name_ok && self.status.map(|s| member.status == s).unwrap_or(true)
    }
}
