//! Account provisioning
//!
//! A user account spans two systems: the identity provider (credentials,
//! ban state, authorization metadata) and the `users` row plus the employee
//! link in Postgres. No transaction covers both, so every multi-step write
//! runs in a fixed order and undoes completed steps when a later one fails.
//! Compensating steps are best effort: failures are logged and counted,
//! never retried.

mod store;


pub use store::AccountStore;

use crate::auth::{generate_temporary_password, normalize_email, AppMetadata};
use crate::config::ProvisioningConfig;
use crate::db::models::{Employee, Role, Tenant, UserStatus};
use crate::db::{NewUser, TenantSchema, UserChanges, UserRecord};
use crate::errors::{AppError, Result};
use crate::identity::{IdentityChanges, IdentityProvider, NewIdentity};
use crate::metrics;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Input for a new user account
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub email: String,
    /// `None` generates a temporary password
    pub password: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

/// A created account; `temporary_password` is set only when it was generated
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub user: UserRecord,
    pub temporary_password: Option<String>,
}

/// Orchestrates identity provider and database writes for user accounts
pub struct ProvisioningService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn AccountStore>,
    temporary_password_length: usize,
    min_password_length: usize,
}

impl ProvisioningService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn AccountStore>,
        config: &ProvisioningConfig,
    ) -> Self {
        Self {
            identity,
            store,
            temporary_password_length: config.temporary_password_length,
            min_password_length: config.min_password_length,
        }
    }

    /// Create identity, user row and employee link
    pub async fn create_user(&self, request: CreateUser) -> Result<ProvisionedUser> {
        let result = self.try_create_user(request).await;
        metrics::record_provisioning("create_user", result.is_ok());
        result
    }

    /// Apply email, role, status and employee changes
    pub async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<UserRecord> {
        let result = self.try_update_user(user_id, changes).await;
        metrics::record_provisioning("update_user", result.is_ok());
        result
    }

    /// Remove the identity, the employee link and the user row
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let result = self.try_delete_user(user_id).await;
        metrics::record_provisioning("delete_user", result.is_ok());
        result
    }

    /// Set a new password; returns it only when it was generated
    pub async fn reset_password(
        &self,
        user_id: Uuid,
        password: Option<String>,
    ) -> Result<Option<String>> {
        let result = self.try_reset_password(user_id, password).await;
        metrics::record_provisioning("reset_password", result.is_ok());
        result
    }

    async fn try_create_user(&self, request: CreateUser) -> Result<ProvisionedUser> {
        let email = normalize_email(&request.email);

        let (tenant, schema) = self.active_tenant(request.tenant_id).await?;
        self.free_employee(&tenant, &schema, request.employee_id, None)
            .await?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Duplicate {
                message: format!("a user with email {} already exists", email),
            });
        }

        let (password, temporary_password) = self.choose_password(request.password)?;

        let identity = self
            .identity
            .create_identity(NewIdentity {
                email: email.clone(),
                password,
                app_metadata: AppMetadata {
                    tenant_id: Some(tenant.id),
                    role: Some(request.role),
                },
                banned: request.status.blocks_sign_in(),
            })
            .await?;

        let new_user = NewUser {
            id: identity.id,
            tenant_id: tenant.id,
            employee_id: request.employee_id,
            email,
            status: request.status,
            role: request.role,
        };

        let user = match self.store.insert_user(new_user).await {
            Ok(user) => user,
            Err(e) => {
                error!(user_id = %identity.id, error = %e, "User row insert failed after identity creation");
                self.discard_identity(identity.id).await;
                return Err(e);
            }
        };

        let linked = self
            .store
            .set_employee_user(&schema, request.employee_id, Some(user.user.id))
            .await;

        if let Err(e) = require_link(linked, request.employee_id) {
            error!(user_id = %user.user.id, error = %e, "Employee link failed after user creation");
            self.discard_user(user.user.id).await;
            self.discard_identity(identity.id).await;
            return Err(e);
        }

        info!(
            user_id = %user.user.id,
            tenant_id = %tenant.id,
            employee_id = %request.employee_id,
            role = %user.role,
            "User provisioned"
        );

        Ok(ProvisionedUser {
            user,
            temporary_password,
        })
    }

    async fn try_update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<UserRecord> {
        let current = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))?;

        let changes = effective_changes(&current, changes);
        if changes.is_empty() {
            return Ok(current);
        }

        if let Some(email) = &changes.email {
            if let Some(other) = self.store.find_user_by_email(email).await? {
                if other.user.id != user_id {
                    return Err(AppError::Duplicate {
                        message: format!("a user with email {} already exists", email),
                    });
                }
            }
        }

        let relink = match changes.employee_id {
            Some(employee_id) => {
                let (tenant, schema) = self.tenant(current.user.tenant_id).await?;
                self.free_employee(&tenant, &schema, employee_id, Some(user_id))
                    .await?;
                Some((schema, employee_id))
            }
            None => None,
        };

        let (forward, revert) = identity_changes(&current, &changes);
        if !forward.is_empty() {
            self.identity.update_identity(user_id, forward).await?;
        }

        let updated = match self.store.update_user(user_id, changes).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "User row update failed after identity update");
                if !revert.is_empty() {
                    self.revert_identity(user_id, revert).await;
                }
                return Err(e);
            }
        };

        // employees.user_id is unique: the previous link must go before the new one
        if let Some((schema, employee_id)) = relink {
            let previous = current.user.employee_id;

            if let Err(e) = self.store.set_employee_user(&schema, previous, None).await {
                error!(user_id = %user_id, employee_id = %previous, error = %e, "Failed to unlink previous employee");
                self.restore_employee(user_id, previous).await;
                return Err(e);
            }

            let linked = self
                .store
                .set_employee_user(&schema, employee_id, Some(user_id))
                .await;

            if let Err(e) = require_link(linked, employee_id) {
                error!(user_id = %user_id, employee_id = %employee_id, error = %e, "Employee relink failed");
                self.relink_employee(&schema, user_id, previous).await;
                self.restore_employee(user_id, previous).await;
                return Err(e);
            }
        }

        info!(user_id = %user_id, "User updated");
        Ok(updated)
    }

    async fn try_delete_user(&self, user_id: Uuid) -> Result<()> {
        let current = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))?;

        match self.identity.delete_identity(user_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(user_id = %user_id, "Identity already absent, deleting user row");
            }
            Err(e) => return Err(e),
        }

        self.unlink_employee(&current).await;

        if !self.store.delete_user(user_id).await? {
            warn!(user_id = %user_id, "User row disappeared during delete");
        }

        info!(user_id = %user_id, tenant_id = %current.user.tenant_id, "User deleted");
        Ok(())
    }

    async fn try_reset_password(
        &self,
        user_id: Uuid,
        password: Option<String>,
    ) -> Result<Option<String>> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::not_found("user", user_id));
        }

        let (password, temporary_password) = self.choose_password(password)?;

        self.identity
            .update_identity(
                user_id,
                IdentityChanges {
                    password: Some(password),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, generated = temporary_password.is_some(), "Password reset");
        Ok(temporary_password)
    }

    // ========================================================================
    // Checks
    // ========================================================================

    async fn tenant(&self, tenant_id: Uuid) -> Result<(Tenant, TenantSchema)> {
        let tenant = self
            .store
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found("tenant", tenant_id))?;
        let schema = TenantSchema::try_from(&tenant)?;
        Ok((tenant, schema))
    }

    async fn active_tenant(&self, tenant_id: Uuid) -> Result<(Tenant, TenantSchema)> {
        let (tenant, schema) = self.tenant(tenant_id).await?;
        if !tenant.is_active {
            return Err(AppError::invalid_field("tenantId", "tenant is inactive"));
        }
        Ok((tenant, schema))
    }

    /// The employee must exist and not be linked to any user but `owner`
    async fn free_employee(
        &self,
        tenant: &Tenant,
        schema: &TenantSchema,
        employee_id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Employee> {
        let employee = self
            .store
            .find_employee(schema, employee_id)
            .await?
            .ok_or_else(|| AppError::not_found("employee", employee_id))?;

        let linked_elsewhere = match employee.user_id {
            Some(linked) => Some(linked) != owner,
            None => false,
        };
        let claimed = self
            .store
            .find_user_by_employee(tenant.id, employee_id)
            .await?
            .map_or(false, |user| Some(user.user.id) != owner);

        if linked_elsewhere || claimed {
            return Err(AppError::Duplicate {
                message: format!("employee {} already has a user account", employee_id),
            });
        }

        Ok(employee)
    }

    fn choose_password(&self, provided: Option<String>) -> Result<(String, Option<String>)> {
        match provided {
            Some(password) => {
                if password.chars().count() < self.min_password_length {
                    return Err(AppError::invalid_field(
                        "password",
                        format!(
                            "password must be at least {} characters",
                            self.min_password_length
                        ),
                    ));
                }
                Ok((password, None))
            }
            None => {
                let generated = generate_temporary_password(self.temporary_password_length);
                Ok((generated.clone(), Some(generated)))
            }
        }
    }

    // ========================================================================
    // Compensation (best effort)
    // ========================================================================

    async fn discard_identity(&self, identity_id: Uuid) {
        let outcome = match self.identity.delete_identity(identity_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        };
        self.report_rollback("delete_identity", identity_id, outcome);
    }

    async fn discard_user(&self, user_id: Uuid) {
        let outcome = self.store.delete_user(user_id).await.map(|_| ());
        self.report_rollback("delete_user_row", user_id, outcome);
    }

    async fn revert_identity(&self, user_id: Uuid, revert: IdentityChanges) {
        let outcome = self
            .identity
            .update_identity(user_id, revert)
            .await
            .map(|_| ());
        self.report_rollback("revert_identity", user_id, outcome);
    }

    async fn restore_employee(&self, user_id: Uuid, employee_id: Uuid) {
        let changes = UserChanges {
            employee_id: Some(employee_id),
            ..Default::default()
        };
        let outcome = self.store.update_user(user_id, changes).await.map(|_| ());
        self.report_rollback("restore_employee", user_id, outcome);
    }

    async fn relink_employee(&self, schema: &TenantSchema, user_id: Uuid, employee_id: Uuid) {
        let linked = self
            .store
            .set_employee_user(schema, employee_id, Some(user_id))
            .await;
        self.report_rollback("relink_employee", user_id, require_link(linked, employee_id));
    }

    async fn unlink_employee(&self, current: &UserRecord) {
        let employee_id = current.user.employee_id;
        let outcome = match self.tenant(current.user.tenant_id).await {
            Ok((_, schema)) => self
                .store
                .set_employee_user(&schema, employee_id, None)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            error!(user_id = %current.user.id, employee_id = %employee_id, error = %e, "Failed to unlink employee");
        }
    }

    fn report_rollback(&self, step: &'static str, subject: Uuid, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                warn!(step, subject = %subject, "Rolled back partial provisioning");
                metrics::record_rollback(step, true);
            }
            Err(e) => {
                error!(step, subject = %subject, error = %e, "Rollback failed; manual cleanup required");
                metrics::record_rollback(step, false);
            }
        }
    }
}

/// Turn the link result into an error when the employee was not updated
fn require_link(linked: Result<bool>, employee_id: Uuid) -> Result<()> {
    match linked {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::not_found("employee", employee_id)),
        Err(e) => Err(e),
    }
}

/// Drop requested values that equal the current ones
fn effective_changes(current: &UserRecord, changes: UserChanges) -> UserChanges {
    let user = &current.user;

    UserChanges {
        email: changes
            .email
            .map(|email| normalize_email(&email))
            .filter(|email| email != &user.email),
        status: changes.status.filter(|status| *status != user.status_enum()),
        role: changes.role.filter(|role| *role != current.role),
        employee_id: changes
            .employee_id
            .filter(|employee_id| *employee_id != user.employee_id),
    }
}

/// Identity updates for a set of row changes, and the updates undoing them
fn identity_changes(
    current: &UserRecord,
    changes: &UserChanges,
) -> (IdentityChanges, IdentityChanges) {
    let user = &current.user;
    let metadata = |role: Role| AppMetadata {
        tenant_id: Some(user.tenant_id),
        role: Some(role),
    };

    let forward = IdentityChanges {
        email: changes.email.clone(),
        password: None,
        app_metadata: changes.role.map(metadata),
        banned: changes.status.map(|status| status.blocks_sign_in()),
    };

    let revert = IdentityChanges {
        email: changes.email.as_ref().map(|_| user.email.clone()),
        password: None,
        app_metadata: changes.role.map(|_| metadata(current.role)),
        banned: changes
            .status
            .map(|_| user.status_enum().blocks_sign_in()),
    };

    (forward, revert)
}
