//! Books store on PostgreSQL

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::{
    postgres::{map_unique, PgUnitOfWork},
    stale,
    BookStore,
};
use crate::{
    error::AppResult,
    models::{Book, BookQuery},
};

#[async_trait]
impl BookStore for PgUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn get_by_isbn(&mut self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn exists_by_isbn(&mut self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn search(&mut self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM books WHERE TRUE");

        if let Some(ref title) = query.title {
            builder.push(" AND title ILIKE ").push_bind(format!("%{}%", title));
        }
        if let Some(ref author) = query.author {
            builder.push(" AND author ILIKE ").push_bind(format!("%{}%", author));
        }
        if let Some(category_id) = query.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }
        match query.available {
            Some(true) => {
                builder.push(" AND available_copies > 0 AND status = 'AVAILABLE'");
            }
            Some(false) => {
                builder.push(" AND NOT (available_copies > 0 AND status = 'AVAILABLE')");
            }
            None => {}
        }
        builder.push(" ORDER BY title, id");

        let books = builder
            .build_query_as::<Book>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(books)
    }

    async fn count_by_category(&mut self, category_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn save(&mut self, book: Book) -> AppResult<Book> {
        tracing::debug!("Inserting book isbn={}", book.isbn);
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                isbn, title, author, publisher, publication_date, category_id,
                total_copies, available_copies, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.category_id)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.status)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "Book", "ISBN", &book.isbn))
    }

    async fn update(&mut self, book: Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                isbn = $3, title = $4, author = $5, publisher = $6,
                publication_date = $7, category_id = $8,
                total_copies = $9, available_copies = $10, status = $11,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(book.meta.id)
        .bind(book.meta.version)
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.category_id)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.status)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "Book", "ISBN", &book.isbn))?
        .ok_or_else(|| stale("Book", book.meta.id, book.meta.version))
    }

    async fn delete(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book.meta.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
