//! Persistence seam for the provisioning workflow

use crate::db::models::{Employee, Tenant};
use crate::db::{NewUser, Repository, TenantSchema, UserChanges, UserRecord};
use crate::errors::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Account rows the provisioning workflow reads and writes
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>>;

    async fn find_employee(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
    ) -> Result<Option<Employee>>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_user_by_employee(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<UserRecord>>;

    /// Insert the user row together with its tenant role
    async fn insert_user(&self, new: NewUser) -> Result<UserRecord>;

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<UserRecord>;

    /// Returns false when no row was deleted
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

    /// Set or clear `employees.user_id`; false when the employee is missing
    async fn set_employee_user(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<bool>;
}

#[async_trait]
impl AccountStore for Repository {
    async fn find_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        self.find_tenant_by_id(tenant_id).await
    }

    async fn find_employee(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
    ) -> Result<Option<Employee>> {
        Repository::find_employee(self, schema, employee_id).await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        self.find_user_by_id(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Repository::find_user_by_email(self, email).await
    }

    async fn find_user_by_employee(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<UserRecord>> {
        Repository::find_user_by_employee(self, tenant_id, employee_id).await
    }

    async fn insert_user(&self, new: NewUser) -> Result<UserRecord> {
        Repository::insert_user(self, new).await
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<UserRecord> {
        Repository::update_user(self, user_id, changes).await
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        Repository::delete_user(self, user_id).await
    }

    async fn set_employee_user(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<bool> {
        Repository::set_employee_user(self, schema, employee_id, user_id).await
    }
}
