//! Circulation service: borrow, return, renew, loss and the overdue sweep.
//!
//! Each command runs in a single unit of work: the rows it mutates are
//! locked, the rules are checked against that locked state, and the book,
//! member and loan writes commit together. Any failure drops the unit and
//! nothing is applied. Locks are always taken loan, then book, then member.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    clock::Clock,
    error::{AppError, AppResult, ErrorCode},
    models::{Book, Loan, LoanDetails, LoanPolicy, LoanStatus, Member},
    repository::{Repository, UnitOfWork},
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
}

impl CirculationService {
    pub fn new(repository: Arc<dyn Repository>, clock: Arc<dyn Clock>, policy: LoanPolicy) -> Self {
        Self {
            repository,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> LoanPolicy {
        self.policy
    }

    /// Lend one copy of a book to a member
    pub async fn borrow(&self, book_id: i64, member_id: i64, notes: Option<String>) -> AppResult<LoanDetails> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;

        let mut book = lock_book(uow.as_mut(), book_id).await?;
        let mut member = lock_member(uow.as_mut(), member_id).await?;

        if uow
            .loans()
            .find_active_by_book_and_member(book_id, member_id)
            .await?
            .is_some()
        {
            tracing::warn!("Borrow rejected: member {} already holds book {}", member_id, book_id);
            return Err(AppError::Conflict(
                ErrorCode::DuplicateActiveLoan,
                format!(
                    "Member '{}' already has an active loan for '{}'",
                    member.full_name(),
                    book.title
                ),
            ));
        }

        if !book.is_available() {
            tracing::warn!("Borrow rejected: book {} is not available", book_id);
            return Err(AppError::rule(
                ErrorCode::BookNotAvailable,
                format!("Book '{}' is not available for borrowing", book.title),
            ));
        }

        if !member.can_borrow(today) {
            tracing::warn!("Borrow rejected: member {} cannot borrow", member_id);
            return Err(AppError::rule(
                ErrorCode::MemberCannotBorrow,
                format!("Member '{}' cannot borrow books", member.full_name()),
            ));
        }

        book.borrow_copy()?;
        member.increment_active_loans(today)?;
        let loan = Loan::create(book_id, member_id, notes, self.policy.loan_period_days, today);

        let book = uow.books().update(book).await?;
        let member = uow.members().update(member).await?;
        let loan = uow.loans().save(loan).await?;
        uow.commit().await?;

        tracing::info!(
            "Loan {} created: book {} to member {}, due {}",
            loan.id(),
            book_id,
            member_id,
            loan.due_date
        );
        Ok(self.details(&loan, &book, &member, today))
    }

    /// Close a loan and put the copy back on the shelf
    pub async fn return_book(&self, loan_id: i64) -> AppResult<LoanDetails> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;

        let mut loan = lock_loan(uow.as_mut(), loan_id).await?;
        if loan.status == LoanStatus::Returned {
            return Err(AppError::rule(
                ErrorCode::LoanAlreadyReturned,
                format!("Loan {} has already been returned", loan_id),
            ));
        }
        let mut book = lock_book(uow.as_mut(), loan.book_id).await?;
        let mut member = lock_member(uow.as_mut(), loan.member_id).await?;

        loan.return_book(today)?;
        book.return_copy()?;
        member.decrement_active_loans()?;

        let loan = uow.loans().update(loan).await?;
        let book = uow.books().update(book).await?;
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::info!("Loan {} returned (book {}, member {})", loan_id, book.id(), member.id());
        Ok(self.details(&loan, &book, &member, today))
    }

    /// Extend the due date of an active loan
    pub async fn renew(&self, loan_id: i64) -> AppResult<LoanDetails> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;

        let mut loan = lock_loan(uow.as_mut(), loan_id).await?;
        if let Err(e) = loan.renew(self.policy.renewal_days, self.policy.max_renewals, today) {
            tracing::warn!("Renewal of loan {} rejected: {}", loan_id, e);
            return Err(e);
        }
        let loan = uow.loans().update(loan).await?;

        let (book, member) = load_parties(uow.as_mut(), &loan).await?;
        uow.commit().await?;

        tracing::info!(
            "Loan {} renewed ({}/{}), now due {}",
            loan_id,
            loan.renewal_count,
            self.policy.max_renewals,
            loan.due_date
        );
        Ok(self.details(&loan, &book, &member, today))
    }

    /// Declare the borrowed copy lost and write it off the collection
    pub async fn mark_as_lost(&self, loan_id: i64) -> AppResult<LoanDetails> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;

        let mut loan = lock_loan(uow.as_mut(), loan_id).await?;
        match loan.status {
            LoanStatus::Returned => {
                return Err(AppError::rule(
                    ErrorCode::LoanAlreadyReturned,
                    format!("Loan {} was returned and cannot be marked as lost", loan_id),
                ));
            }
            LoanStatus::Lost => {
                return Err(AppError::rule(
                    ErrorCode::LoanLost,
                    format!("Loan {} is already marked as lost", loan_id),
                ));
            }
            LoanStatus::Active | LoanStatus::Overdue => {}
        }
        let mut book = lock_book(uow.as_mut(), loan.book_id).await?;
        let mut member = lock_member(uow.as_mut(), loan.member_id).await?;

        loan.mark_lost();
        member.decrement_active_loans()?;
        book.write_off_copy()?;

        let loan = uow.loans().update(loan).await?;
        let book = uow.books().update(book).await?;
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::info!(
            "Loan {} marked lost; book {} now has {} copies",
            loan_id,
            book.id(),
            book.total_copies
        );
        Ok(self.details(&loan, &book, &member, today))
    }

    /// Flag every ACTIVE loan past its due date as OVERDUE.
    ///
    /// Each loan is re-read under lock right before its write, so a loan
    /// returned or lost in the meantime is skipped. Returns how many loans
    /// changed state.
    pub async fn sweep_overdue(&self) -> AppResult<usize> {
        let today = self.clock.today();

        let candidates: Vec<i64> = {
            let mut uow = self.repository.begin().await?;
            uow.loans()
                .find_by_status(LoanStatus::Active)
                .await?
                .into_iter()
                .filter(|l| l.is_overdue(today))
                .map(|l| l.id())
                .collect()
        };

        let mut flagged = 0;
        for loan_id in candidates {
            let mut uow = self.repository.begin().await?;
            let Some(mut loan) = uow.loans().lock(loan_id).await? else {
                continue;
            };
            if !loan.flag_overdue(today) {
                tracing::debug!("Sweep skipped loan {} ({})", loan_id, loan.status);
                continue;
            }
            uow.loans().update(loan).await?;
            uow.commit().await?;
            flagged += 1;
        }

        tracing::info!("Overdue sweep flagged {} loan(s)", flagged);
        Ok(flagged)
    }

    /// Resize a title's collection without going below the copies on loan
    pub async fn update_copy_count(&self, book_id: i64, new_total: i32) -> AppResult<Book> {
        let mut uow = self.repository.begin().await?;

        let mut book = lock_book(uow.as_mut(), book_id).await?;
        let previous = book.total_copies;
        book.set_total_copies(new_total)?;
        let book = uow.books().update(book).await?;
        uow.commit().await?;

        tracing::info!(
            "Book {} copies changed {} -> {} ({} available)",
            book_id,
            previous,
            book.total_copies,
            book.available_copies
        );
        Ok(book)
    }

    // --- Queries ---

    pub async fn get_loan(&self, loan_id: i64) -> AppResult<LoanDetails> {
        let mut uow = self.repository.begin().await?;
        let loan = uow
            .loans()
            .get(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found("Loan", loan_id))?;
        let mut details = self.describe(uow.as_mut(), vec![loan]).await?;
        details.pop().ok_or_else(|| AppError::not_found("Loan", loan_id))
    }

    pub async fn loans_for_member(&self, member_id: i64, active_only: bool) -> AppResult<Vec<LoanDetails>> {
        let mut uow = self.repository.begin().await?;
        if uow.members().get(member_id).await?.is_none() {
            return Err(AppError::not_found("Member", member_id));
        }
        let loans = uow.loans().find_by_member(member_id, active_only).await?;
        self.describe(uow.as_mut(), loans).await
    }

    pub async fn loans_for_book(&self, book_id: i64) -> AppResult<Vec<LoanDetails>> {
        let mut uow = self.repository.begin().await?;
        if uow.books().get(book_id).await?.is_none() {
            return Err(AppError::not_found("Book", book_id));
        }
        let loans = uow.loans().find_by_book(book_id).await?;
        self.describe(uow.as_mut(), loans).await
    }

    pub async fn loans_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanDetails>> {
        let mut uow = self.repository.begin().await?;
        let loans = uow.loans().find_by_status(status).await?;
        self.describe(uow.as_mut(), loans).await
    }

    /// Open loans past their due date, whether or not the sweep ran yet
    pub async fn overdue_loans(&self) -> AppResult<Vec<LoanDetails>> {
        self.loans_due_before(self.clock.today()).await
    }

    pub async fn loans_due_before(&self, date: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let mut uow = self.repository.begin().await?;
        let loans = uow.loans().find_open_due_before(date).await?;
        self.describe(uow.as_mut(), loans).await
    }

    fn details(&self, loan: &Loan, book: &Book, member: &Member, today: NaiveDate) -> LoanDetails {
        LoanDetails::new(loan, book, member, today, self.policy.max_renewals)
    }

    async fn describe(&self, uow: &mut dyn UnitOfWork, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        let today = self.clock.today();
        let mut books: HashMap<i64, Book> = HashMap::new();
        let mut members: HashMap<i64, Member> = HashMap::new();
        let mut result = Vec::with_capacity(loans.len());

        for loan in loans {
            if !books.contains_key(&loan.book_id) {
                let book = uow
                    .books()
                    .get(loan.book_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Book", loan.book_id))?;
                books.insert(loan.book_id, book);
            }
            if !members.contains_key(&loan.member_id) {
                let member = uow
                    .members()
                    .get(loan.member_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Member", loan.member_id))?;
                members.insert(loan.member_id, member);
            }
            result.push(self.details(&loan, &books[&loan.book_id], &members[&loan.member_id], today));
        }

        Ok(result)
    }
}

async fn lock_book(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Book> {
    uow.books()
        .lock(id)
        .await?
        .ok_or_else(|| AppError::not_found("Book", id))
}

async fn lock_member(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Member> {
    uow.members()
        .lock(id)
        .await?
        .ok_or_else(|| AppError::not_found("Member", id))
}

async fn lock_loan(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Loan> {
    uow.loans()
        .lock(id)
        .await?
        .ok_or_else(|| AppError::not_found("Loan", id))
}

async fn load_parties(uow: &mut dyn UnitOfWork, loan: &Loan) -> AppResult<(Book, Member)> {
    let book = uow
        .books()
        .get(loan.book_id)
        .await?
        .ok_or_else(|| AppError::not_found("Book", loan.book_id))?;
    let member = uow
        .members()
        .get(loan.member_id)
        .await?
        .ok_or_else(|| AppError::not_found("Member", loan.member_id))?;
    Ok((book, member))
}
