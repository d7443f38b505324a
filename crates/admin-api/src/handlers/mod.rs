//! Admin API handlers module

pub mod employees;
pub mod tenants;
pub mod users;
