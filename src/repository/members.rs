//! Members store on PostgreSQL

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::{
    postgres::{map_unique, PgUnitOfWork},
    stale,
    MemberStore,
};
use crate::{
    error::{AppError, AppResult},
    models::{Member, MemberQuery},
};

/// Name the unique field a failed write collided on
fn member_conflict(err: sqlx::Error, member: &Member) -> AppError {
    let on_email = matches!(
        &err,
        sqlx::Error::Database(db) if db.constraint().map(|c| c.contains("email")).unwrap_or(false)
    );
    if on_email {
        map_unique(err, "Member", "email", &member.email)
    } else {
        map_unique(err, "Member", "membership number", &member.membership_number)
    }
}

#[async_trait]
impl MemberStore for PgUnitOfWork {
    async fn get(&mut self, id: i64) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn lock(&mut self, id: i64) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn get_by_email(&mut self, email: &str) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn get_by_membership_number(&mut self, number: &str) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE membership_number = $1")
            .bind(number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn exists_by_email(&mut self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn exists_by_membership_number(&mut self, number: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE membership_number = $1)")
                .bind(number)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn search(&mut self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM members WHERE TRUE");

        if let Some(ref name) = query.name {
            builder
                .push(" AND (first_name || ' ' || last_name) ILIKE ")
                .push_bind(format!("%{}%", name));
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder.push(" ORDER BY last_name, first_name, id");

        let members = builder
            .build_query_as::<Member>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(members)
    }

    async fn save(&mut self, member: Member) -> AppResult<Member> {
        tracing::debug!("Inserting member {}", member.membership_number);
        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (
                membership_number, first_name, last_name, email, phone, address,
                registration_date, expiration_date, status, active_loans, max_loans
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&member.membership_number)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(member.registration_date)
        .bind(member.expiration_date)
        .bind(member.status)
        .bind(member.active_loans)
        .bind(member.max_loans)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| member_conflict(e, &member))
    }

    async fn update(&mut self, member: Member) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members SET
                first_name = $3, last_name = $4, email = $5, phone = $6, address = $7,
                expiration_date = $8, status = $9, active_loans = $10, max_loans = $11,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(member.meta.id)
        .bind(member.meta.version)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(member.expiration_date)
        .bind(member.status)
        .bind(member.active_loans)
        .bind(member.max_loans)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| member_conflict(e, &member))?
        .ok_or_else(|| stale("Member", member.meta.id, member.meta.version))
    }

    async fn delete(&mut self, member: &Member) -> AppResult<()> {
        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(member.meta.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
