//! Categories store on PostgreSQL

use async_trait::async_trait;

use super::{
    postgres::{map_unique, PgUnitOfWork},
    stale,
    CategoryStore,
};
use crate::{error::AppResult, models::Category};

#[async_trait]
impl CategoryStore for PgUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(category)
    }

    async fn get_by_name(&mut self, name: &str) -> AppResult<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE LOWER(name) = LOWER($1)")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(category)
    }

    async fn list(&mut self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(categories)
    }

    async fn save(&mut self, category: Category) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "Category", "name", &category.name))
    }

    async fn update(&mut self, category: Category) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET
                name = $3, description = $4,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(category.meta.id)
        .bind(category.meta.version)
        .bind(&category.name)
        .bind(&category.description)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, "Category", "name", &category.name))?
        .ok_or_else(|| stale("Category", category.meta.id, category.meta.version))
    }

    async fn delete(&mut self, category: &Category) -> AppResult<()> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category.meta.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
