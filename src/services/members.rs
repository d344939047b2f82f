//! Member account service

use std::sync::Arc;

use chrono::Utc;

use crate::{
    clock::Clock,
    config::CirculationConfig,
    error::{AppError, AppResult, ErrorCode},
    models::{
        member::{CreateMember, UpdateMember},
        Member, MemberQuery,
    },
    repository::{Repository, UnitOfWork},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    default_max_loans: i32,
    membership_years: u32,
}

impl MembersService {
    pub fn new(repository: Arc<dyn Repository>, clock: Arc<dyn Clock>, circulation: &CirculationConfig) -> Self {
        Self {
            repository,
            clock,
            default_max_loans: circulation.default_max_loans,
            membership_years: circulation.membership_years,
        }
    }

    pub async fn search_members(&self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        let mut uow = self.repository.begin().await?;
        uow.members().search(query).await
    }

    pub async fn get_member(&self, id: i64) -> AppResult<Member> {
        let mut uow = self.repository.begin().await?;
        uow.members()
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Member", id))
    }

    pub async fn get_by_membership_number(&self, number: &str) -> AppResult<Member> {
        let mut uow = self.repository.begin().await?;
        uow.members()
            .get_by_membership_number(number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with number {} not found", number)))
    }

    /// Register a new member, generating a membership number if none is given
    pub async fn create_member(&self, data: CreateMember) -> AppResult<Member> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;

        if uow.members().exists_by_email(&data.email).await? {
            return Err(AppError::duplicate("Member", "email", &data.email));
        }
        let number = match data.membership_number {
            Some(number) => {
                if uow.members().exists_by_membership_number(&number).await? {
                    return Err(AppError::duplicate("Member", "membership number", &number));
                }
                number
            }
            None => generate_membership_number(uow.as_mut()).await?,
        };

        let mut member = Member::new(
            number,
            data.first_name,
            data.last_name,
            data.email,
            today,
            self.membership_years,
        );
        member.phone = data.phone;
        member.address = data.address;
        member.max_loans = data.max_loans.unwrap_or(self.default_max_loans);

        let member = uow.members().save(member).await?;
        uow.commit().await?;

        tracing::info!(
            "Member {} registered as {} until {}",
            member.id(),
            member.membership_number,
            member.expiration_date
        );
        Ok(member)
    }

    pub async fn update_member(&self, id: i64, data: UpdateMember) -> AppResult<Member> {
        let mut uow = self.repository.begin().await?;
        let mut member = lock_member(uow.as_mut(), id).await?;

        if let Some(ref email) = data.email {
            if !email.eq_ignore_ascii_case(&member.email) && uow.members().exists_by_email(email).await? {
                return Err(AppError::duplicate("Member", "email", email));
            }
        }
        if let Some(max_loans) = data.max_loans {
            if max_loans < member.active_loans {
                return Err(AppError::Validation(vec![format!(
                    "max_loans: cannot be lower than the {} active loans",
                    member.active_loans
                )]));
            }
        }

        data.apply(&mut member);
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::info!("Member {} updated", id);
        Ok(member)
    }

    /// Remove a member without open loans; their loan history goes with them
    pub async fn delete_member(&self, id: i64) -> AppResult<()> {
        let mut uow = self.repository.begin().await?;
        let member = lock_member(uow.as_mut(), id).await?;

        if member.active_loans > 0 {
            return Err(AppError::rule(
                ErrorCode::MemberHasActiveLoans,
                format!(
                    "Cannot delete '{}': {} loans are still open",
                    member.full_name(),
                    member.active_loans
                ),
            ));
        }

        uow.members().delete(&member).await?;
        uow.commit().await?;

        tracing::info!("Member {} deleted", id);
        Ok(())
    }

    pub async fn suspend(&self, id: i64) -> AppResult<Member> {
        let mut uow = self.repository.begin().await?;
        let mut member = lock_member(uow.as_mut(), id).await?;
        member.suspend();
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::warn!("Member {} suspended", id);
        Ok(member)
    }

    pub async fn activate(&self, id: i64) -> AppResult<Member> {
        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;
        let mut member = lock_member(uow.as_mut(), id).await?;
        member.activate(today)?;
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::info!("Member {} activated", id);
        Ok(member)
    }

    /// Extend the membership by `years`, or the configured default
    pub async fn renew_membership(&self, id: i64, years: Option<u32>) -> AppResult<Member> {
        let years = years.unwrap_or(self.membership_years);
        if years == 0 {
            return Err(AppError::Validation(vec![
                "years: must be at least 1".to_string(),
            ]));
        }

        let today = self.clock.today();
        let mut uow = self.repository.begin().await?;
        let mut member = lock_member(uow.as_mut(), id).await?;
        member.renew_membership(years, today);
        let member = uow.members().update(member).await?;
        uow.commit().await?;

        tracing::info!("Member {} renewed until {}", id, member.expiration_date);
        Ok(member)
    }
}

async fn lock_member(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Member> {
    uow.members()
        .lock(id)
        .await?
        .ok_or_else(|| AppError::not_found("Member", id))
}

async fn generate_membership_number(uow: &mut dyn UnitOfWork) -> AppResult<String> {
    let mut stamp = Utc::now().timestamp_millis();
    loop {
        let number = format!("MEM-{}", stamp);
        if !uow.members().exists_by_membership_number(&number).await? {
            return Ok(number);
        }
        stamp += 1;
    }
}
