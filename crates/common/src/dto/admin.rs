//! Admin API bodies: tenants, employees and user accounts

use super::validate_slug;
use crate::db::models::{Employee, Role, Tenant, UserStatus};
use crate::db::{NewEmployee, UserChanges, UserFilter, UserRecord};
use crate::provisioning::{CreateUser, ProvisionedUser};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// Tenants
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 2, max = 63), custom(function = "validate_slug"))]
    pub slug: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub is_active: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<Tenant> for TenantResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            slug: tenant.slug,
            schema_name: tenant.schema_name,
            is_active: tenant.is_active,
            created_at: tenant.created_at,
            updated_at: tenant.updated_at,
        }
    }
}

// ============================================================================
// Employees
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 200))]
    pub job_title: Option<String>,
}

impl From<CreateEmployeeRequest> for NewEmployee {
    fn from(request: CreateEmployeeRequest) -> Self {
        Self {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            job_title: request.job_title,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub status: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            full_name: employee.full_name(),
            id: employee.id,
            user_id: employee.user_id,
            first_name: employee.first_name,
            last_name: employee.last_name,
            email: employee.email,
            job_title: employee.job_title,
            status: employee.status,
            created_at: employee.created_at,
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub tenant_id: Uuid,

    pub employee_id: Uuid,

    #[validate(email)]
    pub email: String,

    /// Omit to generate a temporary password
    #[validate(length(max = 128))]
    pub password: Option<String>,

    pub role: Option<Role>,

    pub status: Option<UserStatus>,
}

impl From<CreateUserRequest> for CreateUser {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            tenant_id: request.tenant_id,
            employee_id: request.employee_id,
            email: request.email,
            password: request.password,
            role: request.role.unwrap_or_default(),
            status: request.status.unwrap_or(UserStatus::Active),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,

    pub role: Option<Role>,

    pub status: Option<UserStatus>,

    pub employee_id: Option<Uuid>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            email: request.email,
            status: request.status,
            role: request.role,
            employee_id: request.employee_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// Omit to generate a temporary password
    #[validate(length(max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordResponse {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub tenant_id: Option<Uuid>,
    pub status: Option<UserStatus>,
}

impl From<UserListQuery> for UserFilter {
    fn from(query: UserListQuery) -> Self {
        Self {
            tenant_id: query.tenant_id,
            status: query.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub role: Role,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    /// Only present right after creation with a generated password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        let status = record.user.status_enum();
        let user = record.user;

        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            employee_id: user.employee_id,
            email: user.email,
            status,
            role: record.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
            temporary_password: None,
        }
    }
}

impl From<ProvisionedUser> for UserResponse {
    fn from(provisioned: ProvisionedUser) -> Self {
        Self {
            temporary_password: provisioned.temporary_password,
            ..UserResponse::from(provisioned.user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_user_request_defaults() {
        let body = json!({
            "tenantId": "6f1c2a4e-1b2c-4d3e-8f90-112233445566",
            "employeeId": "7f1c2a4e-1b2c-4d3e-8f90-112233445566",
            "email": "ana@acme.test"
        });
        let request: CreateUserRequest = serde_json::from_value(body).unwrap();
        assert!(request.validate().is_ok());

        let create = CreateUser::from(request);
        assert_eq!(create.role, Role::Employee);
        assert_eq!(create.status, UserStatus::Active);
        assert!(create.password.is_none());
    }

    #[test]
    fn test_create_user_request_rejects_bad_email() {
        let body = json!({
            "tenantId": "6f1c2a4e-1b2c-4d3e-8f90-112233445566",
            "employeeId": "7f1c2a4e-1b2c-4d3e-8f90-112233445566",
            "email": "not-an-email",
            "role": "tenant_admin"
        });
        let request: CreateUserRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.role, Some(Role::TenantAdmin));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_tenant_request_validation() {
        let ok = CreateTenantRequest {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = CreateTenantRequest {
            name: String::new(),
            slug: "Acme Corp".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("slug"));
    }

    #[test]
    fn test_user_response_omits_absent_password() {
        let now = chrono::Utc::now().into();
        let record = UserRecord {
            user: crate::db::models::User {
                id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                employee_id: Uuid::new_v4(),
                email: "ana@acme.test".to_string(),
                status: "suspended".to_string(),
                created_at: now,
                updated_at: now,
            },
            role: Role::Manager,
        };

        let json = serde_json::to_value(UserResponse::from(record)).unwrap();
        assert_eq!(json["status"], "suspended");
        assert_eq!(json["role"], "manager");
        assert!(json.get("temporaryPassword").is_none());
        assert!(json.get("employeeId").is_some());
    }
}
