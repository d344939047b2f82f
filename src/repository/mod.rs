//! Persistence layer.
//!
//! Every service operation runs inside one [`UnitOfWork`]: it reads, checks
//! and writes through the store handles of that unit and then commits.
//! Dropping a unit without committing discards all of its writes. `lock`
//! reads hold the row until the unit ends so concurrent circulation
//! commands on the same book, member or loan are serialized.

pub mod books;
pub mod categories;
pub mod loans;
pub mod members;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{Book, BookQuery, Category, Loan, LoanStatus, Member, MemberQuery},
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

#[async_trait]
pub trait BookStore: Send {
    async fn get(&mut self, id: i64) -> AppResult<Option<Book>>;
    /// Read and lock the row for the rest of the unit of work
    async fn lock(&mut self, id: i64) -> AppResult<Option<Book>>;
    async fn get_by_isbn(&mut self, isbn: &str) -> AppResult<Option<Book>>;
    async fn exists_by_isbn(&mut self, isbn: &str) -> AppResult<bool>;
    async fn search(&mut self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn count_by_category(&mut self, category_id: i64) -> AppResult<i64>;
    /// Insert an unsaved book, returning it with its identity assigned
    async fn save(&mut self, book: Book) -> AppResult<Book>;
    /// Write back a loaded book; fails if the stored version moved
    async fn update(&mut self, book: Book) -> AppResult<Book>;
    async fn delete(&mut self, book: &Book) -> AppResult<()>;
}

#[async_trait]
pub trait MemberStore: Send {
    async fn get(&mut self, id: i64) -> AppResult<Option<Member>>;
    async fn lock(&mut self, id: i64) -> AppResult<Option<Member>>;
    async fn get_by_email(&mut self, email: &str) -> AppResult<Option<Member>>;
    async fn get_by_membership_number(&mut self, number: &str) -> AppResult<Option<Member>>;
    async fn exists_by_email(&mut self, email: &str) -> AppResult<bool>;
    async fn exists_by_membership_number(&mut self, number: &str) -> AppResult<bool>;
    async fn search(&mut self, query: &MemberQuery) -> AppResult<Vec<Member>>;
    async fn save(&mut self, member: Member) -> AppResult<Member>;
    async fn update(&mut self, member: Member) -> AppResult<Member>;
    async fn delete(&mut self, member: &Member) -> AppResult<()>;
}

#[async_trait]
pub trait LoanStore: Send {
    async fn get(&mut self, id: i64) -> AppResult<Option<Loan>>;
    async fn lock(&mut self, id: i64) -> AppResult<Option<Loan>>;
    /// The ACTIVE or OVERDUE loan for this pair, if any
    async fn find_active_by_book_and_member(&mut self, book_id: i64, member_id: i64) -> AppResult<Option<Loan>>;
    /// Ordered by due date
    async fn find_by_status(&mut self, status: LoanStatus) -> AppResult<Vec<Loan>>;
    /// Newest first
    async fn find_by_member(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>>;
    /// Newest first
    async fn find_by_book(&mut self, book_id: i64) -> AppResult<Vec<Loan>>;
    /// ACTIVE or OVERDUE loans due strictly before `date`, ordered by due date
    async fn find_open_due_before(&mut self, date: NaiveDate) -> AppResult<Vec<Loan>>;
    async fn save(&mut self, loan: Loan) -> AppResult<Loan>;
    async fn update(&mut self, loan: Loan) -> AppResult<Loan>;
}

#[async_trait]
pub trait CategoryStore: Send {
    async fn get(&mut self, id: i64) -> AppResult<Option<Category>>;
    async fn get_by_name(&mut self, name: &str) -> AppResult<Option<Category>>;
    async fn list(&mut self) -> AppResult<Vec<Category>>;
    async fn save(&mut self, category: Category) -> AppResult<Category>;
    async fn update(&mut self, category: Category) -> AppResult<Category>;
    async fn delete(&mut self, category: &Category) -> AppResult<()>;
}

/// One atomic unit: all store writes become visible together on `commit`
#[async_trait]
pub trait UnitOfWork: Send {
    fn books(&mut self) -> &mut dyn BookStore;
    fn members(&mut self) -> &mut dyn MemberStore;
    fn loans(&mut self) -> &mut dyn LoanStore;
    fn categories(&mut self) -> &mut dyn CategoryStore;
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Entry point handed to the services at startup
#[async_trait]
pub trait Repository: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

/// The row vanished or its version moved since it was read
pub(crate) fn stale(entity: &str, id: i64, version: i64) -> AppError {
    AppError::Conflict(
        ErrorCode::ConcurrentModification,
        format!("{} {} was modified concurrently (expected version {})", entity, id, version),
    )
}
