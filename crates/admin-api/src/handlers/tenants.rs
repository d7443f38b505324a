//! Tenant management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::AppState;
use trackera_common::{
    auth::AdminUser,
    dto::{CreateTenantRequest, TenantResponse},
    errors::{AppError, Result},
    extract::ValidatedJson,
};

/// List all tenants
pub async fn list_tenants(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TenantResponse>>> {
    let tenants = state.repo.list_tenants().await?;
    Ok(Json(tenants.into_iter().map(TenantResponse::from).collect()))
}

/// Get a tenant by ID
pub async fn get_tenant(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantResponse>> {
    let tenant = state
        .repo
        .find_tenant_by_id(tenant_id)
        .await?
        .ok_or_else(|| AppError::not_found("tenant", tenant_id))?;

    Ok(Json(tenant.into()))
}

/// Create a tenant and its schema
pub async fn create_tenant(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>)> {
    if state.repo.find_tenant_by_slug(&request.slug).await?.is_some() {
        return Err(AppError::Duplicate {
            message: format!("tenant slug {} is taken", request.slug),
        });
    }

    let tenant = state
        .repo
        .create_tenant(request.name.trim().to_string(), request.slug)
        .await?;

    tracing::info!(
        tenant_id = %tenant.id,
        slug = %tenant.slug,
        admin_id = %admin.user_id,
        "Tenant created"
    );

    Ok((StatusCode::CREATED, Json(tenant.into())))
}
