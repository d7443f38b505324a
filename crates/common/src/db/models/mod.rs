//! SeaORM entity models
//!
//! Public-schema entities plus the rows read from tenant schemas

mod tenant;
mod tenant_rows;
mod user;
mod user_role;

pub use tenant::{
    Entity as TenantEntity,
    Model as Tenant,
    ActiveModel as TenantActiveModel,
    Column as TenantColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    UserStatus,
};

pub use user_role::{
    Entity as UserRoleEntity,
    Model as UserRole,
    ActiveModel as UserRoleActiveModel,
    Column as UserRoleColumn,
    Role,
    RoleScope,
};

pub use tenant_rows::{Employee, Project, ProjectTotal, TimeEntry, TimeTotals};
