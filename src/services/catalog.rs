//! Catalog management service (books and categories)

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    clock::Clock,
    error::{AppError, AppResult, ErrorCode},
    models::{
        book::{CreateBook, UpdateBook},
        category::CategoryRequest,
        Book, BookQuery, Category,
    },
    repository::{Repository, UnitOfWork},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut uow = self.repository.begin().await?;
        uow.books().search(query).await
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        let mut uow = self.repository.begin().await?;
        uow.books()
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Book", id))
    }

    pub async fn get_book_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        let mut uow = self.repository.begin().await?;
        uow.books()
            .get_by_isbn(isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ISBN {} not found", isbn)))
    }

    /// Add a new title with all of its copies on the shelf
    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        self.check_publication_date(data.publication_date)?;

        let mut uow = self.repository.begin().await?;
        if uow.books().exists_by_isbn(&data.isbn).await? {
            return Err(AppError::duplicate("Book", "ISBN", &data.isbn));
        }
        if let Some(category_id) = data.category_id {
            ensure_category(uow.as_mut(), category_id).await?;
        }

        let mut book = Book::new(data.isbn, data.title, data.author, data.total_copies);
        book.publisher = data.publisher;
        book.publication_date = data.publication_date;
        book.category_id = data.category_id;
        if let Some(status) = data.status {
            book.status = status;
        }

        let book = uow.books().save(book).await?;
        uow.commit().await?;

        tracing::info!("Book {} created: '{}' ({} copies)", book.id(), book.title, book.total_copies);
        Ok(book)
    }

    /// Update bibliographic fields and status
    pub async fn update_book(&self, id: i64, data: UpdateBook) -> AppResult<Book> {
        self.check_publication_date(data.publication_date)?;

        let mut uow = self.repository.begin().await?;
        let mut book = uow
            .books()
            .lock(id)
            .await?
            .ok_or_else(|| AppError::not_found("Book", id))?;

        if let Some(ref isbn) = data.isbn {
            if *isbn != book.isbn && uow.books().exists_by_isbn(isbn).await? {
                return Err(AppError::duplicate("Book", "ISBN", isbn));
            }
        }
        if let Some(category_id) = data.category_id {
            ensure_category(uow.as_mut(), category_id).await?;
        }

        data.apply(&mut book);
        let book = uow.books().update(book).await?;
        uow.commit().await?;

        tracing::info!("Book {} updated", id);
        Ok(book)
    }

    /// Delete a title; refused while any copy is out on loan
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let mut uow = self.repository.begin().await?;
        let book = uow
            .books()
            .lock(id)
            .await?
            .ok_or_else(|| AppError::not_found("Book", id))?;

        if book.loaned_copies() > 0 {
            return Err(AppError::rule(
                ErrorCode::BookHasLoanedCopies,
                format!(
                    "Cannot delete '{}': {} copies are on loan",
                    book.title,
                    book.loaned_copies()
                ),
            ));
        }

        uow.books().delete(&book).await?;
        uow.commit().await?;

        tracing::info!("Book {} deleted", id);
        Ok(())
    }

    // --- Categories ---

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut uow = self.repository.begin().await?;
        uow.categories().list().await
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        let mut uow = self.repository.begin().await?;
        ensure_category(uow.as_mut(), id).await
    }

    pub async fn create_category(&self, data: CategoryRequest) -> AppResult<Category> {
        let mut uow = self.repository.begin().await?;
        if uow.categories().get_by_name(&data.name).await?.is_some() {
            return Err(AppError::duplicate("Category", "name", &data.name));
        }

        let category = uow
            .categories()
            .save(Category::new(data.name, data.description))
            .await?;
        uow.commit().await?;

        tracing::info!("Category {} created: '{}'", category.id(), category.name);
        Ok(category)
    }

    pub async fn update_category(&self, id: i64, data: CategoryRequest) -> AppResult<Category> {
        let mut uow = self.repository.begin().await?;
        let mut category = ensure_category(uow.as_mut(), id).await?;

        if let Some(other) = uow.categories().get_by_name(&data.name).await? {
            if other.id() != id {
                return Err(AppError::duplicate("Category", "name", &data.name));
            }
        }

        category.name = data.name;
        category.description = data.description;
        let category = uow.categories().update(category).await?;
        uow.commit().await?;
        Ok(category)
    }

    /// Delete a category that no book references
    pub async fn delete_category(&self, id: i64) -> AppResult<()> {
        let mut uow = self.repository.begin().await?;
        let category = ensure_category(uow.as_mut(), id).await?;

        let books = uow.books().count_by_category(id).await?;
        if books > 0 {
            return Err(AppError::rule(
                ErrorCode::CategoryHasBooks,
                format!("Category '{}' still has {} books", category.name, books),
            ));
        }

        uow.categories().delete(&category).await?;
        uow.commit().await?;

        tracing::info!("Category {} deleted", id);
        Ok(())
    }

    fn check_publication_date(&self, date: Option<NaiveDate>) -> AppResult<()> {
        match date {
            Some(d) if d > self.clock.today() => Err(AppError::Validation(vec![format!(
                "publication_date: {} is in the future",
                d
            )])),
            _ => Ok(()),
        }
    }
}

async fn ensure_category(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Category> {
    uow.categories()
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category", id))
}
