//! Member account endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::MemberLoansQuery,
        member::{CreateMember, RenewMembership, UpdateMember},
        LoanDetails, Member, MemberQuery,
    },
    AppState,
};

/// List members matching the filters
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Matching members", body = Vec<Member>)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.search_members(&query).await?;
    Ok(Json(members))
}

/// Get member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Get member by membership number
#[utoipa::path(
    get,
    path = "/members/number/{number}",
    tag = "members",
    params(
        ("number" = String, Path, description = "Membership number")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_by_membership_number(&number).await?;
    Ok(Json(member))
}

/// Register a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member registered", body = Member),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or number already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    request.validate()?;
    let created = state.services.members.create_member(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    request.validate()?;
    let updated = state.services.members.update_member(id, request).await?;
    Ok(Json(updated))
}

/// Delete a member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Member has open loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    state.services.members.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Suspend borrowing privileges
#[utoipa::path(
    post,
    path = "/members/{id}/suspend",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member suspended", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn suspend_member(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Member>> {
    let member = state.services.members.suspend(id).await?;
    Ok(Json(member))
}

/// Restore borrowing privileges
#[utoipa::path(
    post,
    path = "/members/{id}/activate",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member active", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Membership expired", body = crate::error::ErrorResponse)
    )
)]
pub async fn activate_member(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Member>> {
    let member = state.services.members.activate(id).await?;
    Ok(Json(member))
}

/// Extend the membership
#[utoipa::path(
    post,
    path = "/members/{id}/renew",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID")
    ),
    request_body = RenewMembership,
    responses(
        (status = 200, description = "Membership extended", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_membership(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RenewMembership>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.renew_membership(id, request.years).await?;
    Ok(Json(member))
}

/// Loans of a member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "members",
    params(
        ("id" = i64, Path, description = "Member ID"),
        MemberLoansQuery
    ),
    responses(
        (status = 200, description = "Member's loans, newest first", body = Vec<LoanDetails>),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member_loans(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<MemberLoansQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state
        .services
        .circulation
        .loans_for_member(id, query.active.unwrap_or(false))
        .await?;
    Ok(Json(loans))
}
