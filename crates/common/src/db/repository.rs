//! Repository pattern for database operations
//!
//! Public-schema operations (tenants, users, role grants). Tenant-schema
//! operations live in `tenant_data.rs` on the same type.

use crate::db::models::*;
use crate::db::{DbPool, TenantSchema};
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A user together with its tenant-scoped role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user: User,
    pub role: Role,
}

/// Fields for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub employee_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub role: Role,
}

/// Partial update of a user row; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub status: Option<UserStatus>,
    pub role: Option<Role>,
    pub employee_id: Option<Uuid>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self == &UserChanges::default()
    }
}

/// Filters for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub tenant_id: Option<Uuid>,
    pub status: Option<UserStatus>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub(crate) fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Tenant Operations
    // ========================================================================

    /// List all tenants by name
    pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        TenantEntity::find()
            .order_by_asc(TenantColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find tenant by ID
    pub async fn find_tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>> {
        TenantEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find tenant by slug
    pub async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        TenantEntity::find()
            .filter(TenantColumn::Slug.eq(slug))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Resolve a tenant and its validated schema, or 404
    pub async fn tenant_schema(&self, tenant_id: Uuid) -> Result<(Tenant, TenantSchema)> {
        let tenant = self
            .find_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found("tenant", tenant_id))?;
        let schema = TenantSchema::try_from(&tenant)?;
        Ok((tenant, schema))
    }

    /// Create a tenant row and its schema in one transaction
    pub async fn create_tenant(&self, name: String, slug: String) -> Result<Tenant> {
        let id = Uuid::new_v4();
        let schema = TenantSchema::for_tenant(id);
        let now = Utc::now();

        let txn = self.conn().begin().await?;

        let tenant = TenantActiveModel {
            id: Set(id),
            name: Set(name),
            slug: Set(slug),
            schema_name: Set(schema.name().to_string()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.execute_unprepared(&schema.ddl()).await?;
        txn.commit().await?;

        tracing::info!(tenant_id = %id, schema = %schema, "Tenant schema created");
        Ok(tenant)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// List users with their tenant role
    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserRecord>> {
        let mut query = UserEntity::find();

        if let Some(tenant_id) = filter.tenant_id {
            query = query.filter(UserColumn::TenantId.eq(tenant_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(UserColumn::Status.eq(status.as_str()));
        }

        let users = query
            .order_by_asc(UserColumn::Email)
            .all(self.conn())
            .await?;

        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let grants = UserRoleEntity::find()
            .filter(UserRoleColumn::UserId.is_in(ids))
            .filter(UserRoleColumn::ScopeType.eq(RoleScope::Tenant.as_str()))
            .all(self.conn())
            .await?;

        let mut roles: HashMap<Uuid, Role> = HashMap::with_capacity(grants.len());
        for grant in grants {
            if let Some(role) = grant.role_enum() {
                roles.insert(grant.user_id, role);
            }
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let role = roles.get(&user.id).copied().unwrap_or_default();
                UserRecord { user, role }
            })
            .collect())
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let user = UserEntity::find_by_id(id).one(self.conn()).await?;
        self.with_role(user).await
    }

    /// Find user by (normalized) email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await?;
        self.with_role(user).await
    }

    /// Find the user linked to an employee of a tenant
    pub async fn find_user_by_employee(
        &self,
        tenant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<UserRecord>> {
        let user = UserEntity::find()
            .filter(UserColumn::TenantId.eq(tenant_id))
            .filter(UserColumn::EmployeeId.eq(employee_id))
            .one(self.conn())
            .await?;
        self.with_role(user).await
    }

    async fn with_role(&self, user: Option<User>) -> Result<Option<UserRecord>> {
        match user {
            Some(user) => {
                let role = tenant_role(self.conn(), user.id).await?;
                Ok(Some(UserRecord { user, role }))
            }
            None => Ok(None),
        }
    }

    /// Insert a user and its tenant role grant in one transaction
    pub async fn insert_user(&self, new: NewUser) -> Result<UserRecord> {
        let now = Utc::now();
        let txn = self.conn().begin().await?;

        let user = UserActiveModel {
            id: Set(new.id),
            tenant_id: Set(new.tenant_id),
            employee_id: Set(new.employee_id),
            email: Set(new.email),
            status: Set(new.status.as_str().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        grant_tenant_role(&txn, user.id, user.tenant_id, new.role).await?;
        txn.commit().await?;

        Ok(UserRecord {
            user,
            role: new.role,
        })
    }

    /// Apply changes to a user row (and its tenant role) in one transaction
    pub async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord> {
        let txn = self.conn().begin().await?;

        let current = UserEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))?;
        let tenant_id = current.tenant_id;

        let mut user: UserActiveModel = current.into();
        if let Some(email) = changes.email {
            user.email = Set(email);
        }
        if let Some(status) = changes.status {
            user.status = Set(status.as_str().to_string());
        }
        if let Some(employee_id) = changes.employee_id {
            user.employee_id = Set(employee_id);
        }
        user.updated_at = Set(Utc::now().into());

        let user = user.update(&txn).await?;

        let role = match changes.role {
            Some(role) => {
                UserRoleEntity::delete_many()
                    .filter(UserRoleColumn::UserId.eq(id))
                    .filter(UserRoleColumn::ScopeType.eq(RoleScope::Tenant.as_str()))
                    .exec(&txn)
                    .await?;
                grant_tenant_role(&txn, id, tenant_id, role).await?;
                role
            }
            None => tenant_role(&txn, id).await?,
        };

        txn.commit().await?;
        Ok(UserRecord { user, role })
    }

    /// Delete a user row; role grants cascade
    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = UserEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }
}

async fn grant_tenant_role<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    tenant_id: Uuid,
    role: Role,
) -> Result<UserRole> {
    UserRoleActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        role: Set(role.as_str().to_string()),
        scope_type: Set(RoleScope::Tenant.as_str().to_string()),
        scope_id: Set(tenant_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

async fn tenant_role<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<Role> {
    let grant = UserRoleEntity::find()
        .filter(UserRoleColumn::UserId.eq(user_id))
        .filter(UserRoleColumn::ScopeType.eq(RoleScope::Tenant.as_str()))
        .one(conn)
        .await?;

    Ok(grant.and_then(|g| g.role_enum()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_changes_empty() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            status: Some(UserStatus::Suspended),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
