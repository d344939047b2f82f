//! In-process repository.
//!
//! A unit of work holds the state mutex for its whole lifetime, so units are
//! fully serialized. Writes go to a working copy that replaces the shared
//! state only on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{stale, BookStore, CategoryStore, LoanStore, MemberStore, Repository, UnitOfWork};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{Book, BookQuery, Category, EntityMeta, Loan, LoanStatus, Member, MemberQuery},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    books: BTreeMap<i64, Book>,
    members: BTreeMap<i64, Member>,
    loans: BTreeMap<i64, Loan>,
    categories: BTreeMap<i64, Category>,
}

/// Repository keeping everything in memory
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn books(&mut self) -> &mut dyn BookStore {
        self
    }

    fn members(&mut self) -> &mut dyn MemberStore {
        self
    }

    fn loans(&mut self) -> &mut dyn LoanStore {
        self
    }

    fn categories(&mut self) -> &mut dyn CategoryStore {
        self
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

trait Stored: Clone {
    const ENTITY: &'static str;
    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
}

macro_rules! stored {
    ($ty:ty, $name:literal) => {
        impl Stored for $ty {
            const ENTITY: &'static str = $name;
            fn meta(&self) -> &EntityMeta {
                &self.meta
            }
            fn meta_mut(&mut self) -> &mut EntityMeta {
                &mut self.meta
            }
        }
    };
}

stored!(Book, "Book");
stored!(Member, "Member");
stored!(Loan, "Loan");
stored!(Category, "Category");

fn insert<T: Stored>(last_id: &mut i64, map: &mut BTreeMap<i64, T>, mut entity: T) -> T {
    *last_id += 1;
    entity.meta_mut().assign(*last_id);
    map.insert(*last_id, entity.clone());
    entity
}

fn replace<T: Stored>(map: &mut BTreeMap<i64, T>, mut entity: T) -> AppResult<T> {
    let (id, version) = (entity.meta().id, entity.meta().version);
    match map.get(&id) {
        Some(current) if current.meta().version == version => {}
        _ => return Err(stale(T::ENTITY, id, version)),
    }
    entity.meta_mut().touch();
    map.insert(id, entity.clone());
    Ok(entity)
}

impl MemoryUnitOfWork {
    fn isbn_taken(&self, isbn: &str, except: i64) -> bool {
        self.working
            .books
            .values()
            .any(|b| b.isbn == isbn && b.meta.id != except)
    }

    fn check_member_unique(&self, member: &Member) -> AppResult<()> {
        for other in self.working.members.values() {
            if other.meta.id == member.meta.id {
                continue;
            }
            if other.email.eq_ignore_ascii_case(&member.email) {
                return Err(AppError::duplicate("Member", "email", &member.email));
            }
            if other.membership_number == member.membership_number {
                return Err(AppError::duplicate(
                    "Member",
                    "membership number",
                    &member.membership_number,
                ));
            }
        }
        Ok(())
    }

    fn category_name_taken(&self, name: &str, except: i64) -> bool {
        self.working
            .categories
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(name) && c.meta.id != except)
    }

    fn open_loan_for(&self, book_id: i64, member_id: i64) -> Option<&Loan> {
        self.working
            .loans
            .values()
            .find(|l| l.book_id == book_id && l.member_id == member_id && l.status.is_open())
    }

    fn loans_where(&self, mut keep: impl FnMut(&Loan) -> bool) -> Vec<Loan> {
        self.working.loans.values().filter(|&l| keep(l)).cloned().collect()
    }
}

fn newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| (b.loan_date, b.meta.id).cmp(&(a.loan_date, a.meta.id)));
}

fn by_due_date(loans: &mut [Loan]) {
    loans.sort_by_key(|l| (l.due_date, l.meta.id));
}

#[async_trait]
impl BookStore for MemoryUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn get_by_isbn(&mut self, isbn: &str) -> AppResult<Option<Book>> {
        Ok(self.working.books.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn exists_by_isbn(&mut self, isbn: &str) -> AppResult<bool> {
        Ok(self.isbn_taken(isbn, 0))
    }

    async fn search(&mut self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .working
            .books
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        books.sort_by(|a, b| (&a.title, a.meta.id).cmp(&(&b.title, b.meta.id)));
        Ok(books)
    }

    async fn count_by_category(&mut self, category_id: i64) -> AppResult<i64> {
        let count = self
            .working
            .books
            .values()
            .filter(|b| b.category_id == Some(category_id))
            .count();
        Ok(count as i64)
    }

    async fn save(&mut self, book: Book) -> AppResult<Book> {
        if self.isbn_taken(&book.isbn, 0) {
            return Err(AppError::duplicate("Book", "ISBN", &book.isbn));
        }
        let state = &mut self.working;
        Ok(insert(&mut state.last_id, &mut state.books, book))
    }

    async fn update(&mut self, book: Book) -> AppResult<Book> {
        if self.isbn_taken(&book.isbn, book.meta.id) {
            return Err(AppError::duplicate("Book", "ISBN", &book.isbn));
        }
        replace(&mut self.working.books, book)
    }

    async fn delete(&mut self, book: &Book) -> AppResult<()> {
        let id = book.meta.id;
        self.working.books.remove(&id);
        self.working.loans.retain(|_, l| l.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl MemberStore for MemoryUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Member>> {
        Ok(self.working.members.get(&id).cloned())
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Member>> {
        Ok(self.working.members.get(&id).cloned())
    }

    async fn get_by_email(&mut self, email: &str) -> AppResult<Option<Member>> {
        Ok(self
            .working
            .members
            .values()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_membership_number(&mut self, number: &str) -> AppResult<Option<Member>> {
        Ok(self
            .working
            .members
            .values()
            .find(|m| m.membership_number == number)
            .cloned())
    }

    async fn exists_by_email(&mut self, email: &str) -> AppResult<bool> {
        Ok(MemberStore::get_by_email(self, email).await?.is_some())
    }

    async fn exists_by_membership_number(&mut self, number: &str) -> AppResult<bool> {
        Ok(MemberStore::get_by_membership_number(self, number).await?.is_some())
    }

    async fn search(&mut self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .working
            .members
            .values()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.meta.id).cmp(&(&b.last_name, &b.first_name, b.meta.id))
        });
        Ok(members)
    }

    async fn save(&mut self, member: Member) -> AppResult<Member> {
        self.check_member_unique(&member)?;
        let state = &mut self.working;
        Ok(insert(&mut state.last_id, &mut state.members, member))
    }

    async fn update(&mut self, member: Member) -> AppResult<Member> {
        self.check_member_unique(&member)?;
        replace(&mut self.working.members, member)
    }

    async fn delete(&mut self, member: &Member) -> AppResult<()> {
        let id = member.meta.id;
        self.working.members.remove(&id);
        self.working.loans.retain(|_, l| l.member_id != id);
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&id).cloned())
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&id).cloned())
    }

    async fn find_active_by_book_and_member(&mut self, book_id: i64, member_id: i64) -> AppResult<Option<Loan>> {
        Ok(self.open_loan_for(book_id, member_id).cloned())
    }

    async fn find_by_status(&mut self, status: LoanStatus) -> AppResult<Vec<Loan>> {
        let mut loans = self.loans_where(|l| l.status == status);
        by_due_date(&mut loans);
        Ok(loans)
    }

    async fn find_by_member(&mut self, member_id: i64, active_only: bool) -> AppResult<Vec<Loan>> {
        let mut loans = self.loans_where(|l| l.member_id == member_id && (!active_only || l.status.is_open()));
        newest_first(&mut loans);
        Ok(loans)
    }

    async fn find_by_book(&mut self, book_id: i64) -> AppResult<Vec<Loan>> {
        let mut loans = self.loans_where(|l| l.book_id == book_id);
        newest_first(&mut loans);
        Ok(loans)
    }

    async fn find_open_due_before(&mut self, date: NaiveDate) -> AppResult<Vec<Loan>> {
        let mut loans = self.loans_where(|l| l.due_date < date && l.status.is_open());
        by_due_date(&mut loans);
        Ok(loans)
    }

    async fn save(&mut self, loan: Loan) -> AppResult<Loan> {
        if loan.status.is_open() && self.open_loan_for(loan.book_id, loan.member_id).is_some() {
            return Err(AppError::Conflict(
                ErrorCode::DuplicateActiveLoan,
                format!(
                    "Member {} already has an active loan for book {}",
                    loan.member_id, loan.book_id
                ),
            ));
        }
        let state = &mut self.working;
        Ok(insert(&mut state.last_id, &mut state.loans, loan))
    }

    async fn update(&mut self, loan: Loan) -> AppResult<Loan> {
        replace(&mut self.working.loans, loan)
    }
}

#[async_trait]
impl CategoryStore for MemoryUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn get_by_name(&mut self, name: &str) -> AppResult<Option<Category>> {
        Ok(self
            .working
            .categories
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list(&mut self) -> AppResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.working.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn save(&mut self, category: Category) -> AppResult<Category> {
        if self.category_name_taken(&category.name, 0) {
            return Err(AppError::duplicate("Category", "name", &category.name));
        }
        let state = &mut self.working;
        Ok(insert(&mut state.last_id, &mut state.categories, category))
    }

    async fn update(&mut self, category: Category) -> AppResult<Category> {
        if self.category_name_taken(&category.name, category.meta.id) {
            return Err(AppError::duplicate("Category", "name", &category.name));
        }
        replace(&mut self.working.categories, category)
    }

    async fn delete(&mut self, category: &Category) -> AppResult<()> {
        self.working.categories.remove(&category.meta.id);
        Ok(())
    }
}
