//! PostgreSQL-backed unit of work

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use super::{BookStore, CategoryStore, LoanStore, MemberStore, Repository, UnitOfWork};
use crate::error::{AppError, AppResult};

pub(super) const UNIQUE_VIOLATION: &str = "23505";

/// Repository holding the database connection pool
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgUnitOfWork {
    pub(super) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
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
        self.tx.commit().await?;
        Ok(())
    }
}

/// Turn a unique-constraint failure into a duplicate conflict
pub(super) fn map_unique(err: sqlx::Error, entity: &str, field: &str, value: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::duplicate(entity, field, value)
        }
        _ => AppError::Database(err),
    }
}
