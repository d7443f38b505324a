//! User account handlers
//!
//! Reads go straight to the repository; every write goes through the
//! provisioning service so the identity provider stays in step.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::AppState;
use trackera_common::{
    auth::AdminUser,
    dto::{
        CreateUserRequest, ResetPasswordRequest, ResetPasswordResponse, UpdateUserRequest,
        UserListQuery, UserResponse,
    },
    errors::{AppError, Result},
    extract::{ValidatedJson, ValidatedQuery},
};

/// List users, optionally by tenant and status
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>> {
    let users = state.repo.list_users(&query.into()).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a user by ID
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    let user = state
        .repo
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;

    Ok(Json(user.into()))
}

/// Provision a user account for an employee
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let provisioned = state.provisioning.create_user(request.into()).await?;

    tracing::info!(
        user_id = %provisioned.user.user.id,
        admin_id = %admin.user_id,
        "User created by admin"
    );

    Ok((StatusCode::CREATED, Json(provisioned.into())))
}

/// Update email, role, status or linked employee
pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let user = state
        .provisioning
        .update_user(user_id, request.into())
        .await?;

    tracing::info!(user_id = %user_id, admin_id = %admin.user_id, "User updated by admin");

    Ok(Json(user.into()))
}

/// Delete a user account
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.provisioning.delete_user(user_id).await?;

    tracing::info!(user_id = %user_id, admin_id = %admin.user_id, "User deleted by admin");

    Ok(StatusCode::NO_CONTENT)
}

/// Set a new password, generating one when none is given
pub async fn reset_password(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>> {
    let temporary_password = state
        .provisioning
        .reset_password(user_id, request.password)
        .await?;

    tracing::info!(user_id = %user_id, admin_id = %admin.user_id, "Password reset by admin");

    Ok(Json(ResetPasswordResponse {
        user_id,
        temporary_password,
    }))
}
