//! Employee handlers, scoped to one tenant schema

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::AppState;
use trackera_common::{
    auth::AdminUser,
    dto::{CreateEmployeeRequest, EmployeeResponse},
    errors::Result,
    extract::ValidatedJson,
};

/// List a tenant's employees
pub async fn list_employees(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<EmployeeResponse>>> {
    let (_, schema) = state.repo.tenant_schema(tenant_id).await?;
    let employees = state.repo.list_employees(&schema).await?;

    Ok(Json(employees.into_iter().map(EmployeeResponse::from).collect()))
}

/// Add an employee to a tenant
pub async fn create_employee(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<EmployeeResponse>)> {
    let (_, schema) = state.repo.tenant_schema(tenant_id).await?;
    let employee = state.repo.create_employee(&schema, request.into()).await?;

    tracing::info!(
        employee_id = %employee.id,
        tenant_id = %tenant_id,
        admin_id = %admin.user_id,
        "Employee created"
    );

    Ok((StatusCode::CREATED, Json(employee.into())))
}
