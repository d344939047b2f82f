//! Loans store on PostgreSQL

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    postgres::{PgUnitOfWork, UNIQUE_VIOLATION},
    stale,
    LoanStore,
};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{Loan, LoanStatus},
};

const OPEN_STATUSES: &str = "status IN ('ACTIVE', 'OVERDUE')";

#[async_trait]
impl LoanStore for PgUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn find_active_by_book_and_member(&mut self, book_id: i64, member_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT * FROM loans WHERE book_id = $1 AND member_id = $2 AND {} LIMIT 1",
            OPEN_STATUSES
        ))
        .bind(book_id)
        .bind(member_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn find_by_status(&mut self, status: LoanStatus) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE status = $1 ORDER BY due_date, id")
            .bind(status)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(loans)
    }

    async fn find_by_member(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>> {
        let sql = if active_only {
            format!(
                "SELECT * FROM loans WHERE member_id = $1 AND {} ORDER BY loan_date DESC, id DESC",
                OPEN_STATUSES
            )
        } else {
            "SELECT * FROM loans WHERE member_id = $1 ORDER BY loan_date DESC, id DESC".to_string()
        };
        let loans = sqlx::query_as::<_, Loan>(&sql)
            .bind(member_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(loans)
    }

    async fn find_by_book(&mut self, book_id: i64) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE book_id = $1 ORDER BY loan_date DESC, id DESC",
        )
        .bind(book_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }

    async fn find_open_due_before(&mut self, date: NaiveDate) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT * FROM loans WHERE due_date < $1 AND {} ORDER BY due_date, id",
            OPEN_STATUSES
        ))
        .bind(date)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(loans)
    }

    async fn save(&mut self, loan: Loan) -> AppResult<Loan> {
        let result = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                book_id, member_id, loan_date, due_date, return_date,
                status, renewal_count, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.return_date)
        .bind(loan.status)
        .bind(loan.renewal_count)
        .bind(&loan.notes)
        .fetch_one(&mut *self.tx)
        .await;

        // The partial unique index loans_one_open_per_pair rejects a second open loan for the pair
        match result {
            Ok(saved) => Ok(saved),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => Err(AppError::Conflict(
                ErrorCode::DuplicateActiveLoan,
                format!(
                    "Member {} already has an active loan for book {}",
                    loan.member_id, loan.book_id
                ),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&mut self, loan: Loan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET
                due_date = $3, return_date = $4, status = $5,
                renewal_count = $6, notes = $7,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(loan.meta.id)
        .bind(loan.meta.version)
        .bind(loan.due_date)
        .bind(loan.return_date)
        .bind(loan.status)
        .bind(loan.renewal_count)
        .bind(&loan.notes)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| stale("Loan", loan.meta.id, loan.meta.version))
    }
}
