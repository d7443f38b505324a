//! Per-tenant schema names
//!
//! Every tenant owns a Postgres schema named `tenant_<uuid without hyphens>`.
//! Identifiers cannot be bound as statement parameters, so the name is
//! validated once here and always emitted quoted.

use crate::db::models::Tenant;
use crate::errors::{AppError, Result};
use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

const TENANT_SCHEMA_SQL: &str = include_str!("tenant_schema.sql");

/// Tables every tenant schema contains
pub const TENANT_TABLES: &[&str] = &["employees", "clients", "projects", "time_entries"];

const RESERVED: &[&str] = &["public", "information_schema"];

fn schema_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("schema pattern compiles"))
}

/// A validated tenant schema name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantSchema(String);

impl TenantSchema {
    /// Schema name derived from a tenant id
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self(format!("tenant_{}", tenant_id.simple()))
    }

    /// Validate a stored schema name
    pub fn parse(name: &str) -> Result<Self> {
        if !schema_pattern().is_match(name) || RESERVED.contains(&name) || name.starts_with("pg_") {
            return Err(AppError::InvalidFormat {
                message: format!("invalid tenant schema name: {:?}", name),
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// `"tenant_x"`
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// `"tenant_x"."table"`
    pub fn qualify(&self, table: &str) -> String {
        format!("{}.\"{}\"", self.quoted(), table)
    }

    /// DDL creating the schema and its tables
    pub fn ddl(&self) -> String {
        TENANT_SCHEMA_SQL.replace("{schema}", &self.quoted())
    }
}

impl fmt::Display for TenantSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&Tenant> for TenantSchema {
    type Error = AppError;

    fn try_from(tenant: &Tenant) -> Result<Self> {
        TenantSchema::parse(&tenant.schema_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_for_tenant() {
        let id = Uuid::parse_str("6f1c2a4e-1b2c-4d3e-8f90-112233445566").unwrap();
        let schema = TenantSchema::for_tenant(id);
        assert_eq!(schema.name(), "tenant_6f1c2a4e1b2c4d3e8f90112233445566");
        assert!(TenantSchema::parse(schema.name()).is_ok());
    }

    #[test]
    fn test_rejects_injection_and_reserved_names() {
        let too_long = "a".repeat(64);
        for bad in [
            "",
            "public",
            "pg_catalog",
            "information_schema",
            "Tenant_A",
            "tenant-a",
            "tenant_a\"; DROP TABLE users; --",
            "1tenant",
            too_long.as_str(),
        ] {
            assert!(TenantSchema::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_qualify_quotes_both_parts() {
        let schema = TenantSchema::parse("tenant_acme").unwrap();
        assert_eq!(schema.qualify("employees"), "\"tenant_acme\".\"employees\"");
    }

    #[test]
    fn test_ddl_is_fully_substituted() {
        let schema = TenantSchema::parse("tenant_acme").unwrap();
        let ddl = schema.ddl();
        assert!(!ddl.contains("{schema}"));
        assert!(ddl.starts_with("CREATE SCHEMA IF NOT EXISTS \"tenant_acme\";"));
        for table in TENANT_TABLES {
            assert!(ddl.contains(&format!("\"tenant_acme\".{}", table)));
        }
    }
}
