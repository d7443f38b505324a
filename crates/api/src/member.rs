//! The signed-in tenant member behind a request

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::AppState;
use trackera_common::{
    auth::AuthUser,
    db::{
        models::{Employee, Role, Tenant, User},
        Repository, TenantSchema, UserRecord,
    },
    errors::{AppError, Result},
};

/// A caller resolved to an active user of an active tenant, with the
/// tenant schema its data lives in
#[derive(Debug, Clone)]
pub struct Member {
    pub user: User,
    pub role: Role,
    pub tenant: Tenant,
    pub schema: TenantSchema,
    pub employee: Option<Employee>,
}

impl Member {
    /// Resolve an account and check that it may use the app
    pub async fn resolve(repo: &Repository, user_id: Uuid) -> Result<Self> {
        let UserRecord { user, role } = repo
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized {
                message: "no Trackera account for this identity".to_string(),
            })?;

        if user.status_enum().blocks_sign_in() {
            return Err(AppError::Forbidden {
                message: format!("account is {}", user.status),
            });
        }

        let tenant = repo
            .find_tenant_by_id(user.tenant_id)
            .await?
            .ok_or_else(|| AppError::Forbidden {
                message: "tenant no longer exists".to_string(),
            })?;

        if !tenant.is_active {
            return Err(AppError::Forbidden {
                message: "tenant is inactive".to_string(),
            });
        }

        let schema = TenantSchema::try_from(&tenant)?;
        let employee = repo.find_employee(&schema, user.employee_id).await?;

        Ok(Self {
            user,
            role,
            tenant,
            schema,
            employee,
        })
    }

    /// The employee record time entries are booked against
    pub fn employee_id(&self) -> Result<Uuid> {
        self.employee
            .as_ref()
            .map(|employee| employee.id)
            .ok_or_else(|| AppError::Forbidden {
                message: "account is not linked to an employee".to_string(),
            })
    }
}

impl FromRequestParts<AppState> for Member {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let member = Member::resolve(&state.repo, auth.user_id).await?;

        if auth.tenant_id.is_some_and(|tenant_id| tenant_id != member.tenant.id) {
            tracing::warn!(
                user_id = %auth.user_id,
                token_tenant = ?auth.tenant_id,
                "Token tenant does not match account tenant"
            );
            return Err(AppError::TenantMismatch);
        }

        Ok(member)
    }
}
