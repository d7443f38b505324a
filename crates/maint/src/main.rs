//! Trackera maintenance CLI
//!
//! Read-only checks against the shared database:
//!
//! ```bash
//! trackera-maint tenants
//! trackera-maint inspect-tenant <TENANT_ID>
//! trackera-maint orphans
//! ```
//!
//! Results go to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use trackera_common::{
    config::AppConfig,
    db::{
        maintenance::{find_orphans, OrphanReport},
        models::Tenant,
        DbPool, Repository, TenantSchema, UserFilter, TENANT_TABLES,
    },
};

#[derive(Parser)]
#[command(name = "trackera-maint")]
#[command(about = "Trackera tenant and account maintenance checks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tenants and whether their schema exists
    Tenants,

    /// Show a tenant's schema and table row counts
    InspectTenant {
        /// Tenant ID
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },

    /// Find users and employees whose links do not match
    Orphans {
        /// Only check this tenant
        #[arg(long)]
        tenant: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_service("maint")?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let db = DbPool::new(&config.database).await?;
    let repo = Repository::new(db);

    let output = match cli.command {
        Commands::Tenants => tenants(&repo).await?,
        Commands::InspectTenant { tenant_id } => inspect_tenant(&repo, tenant_id).await?,
        Commands::Orphans { tenant } => orphans(&repo, tenant).await?,
    };

    print!("{}", output);
    Ok(())
}

async fn tenants(repo: &Repository) -> anyhow::Result<String> {
    let mut out = String::new();

    for tenant in repo.list_tenants().await? {
        let schema = match TenantSchema::try_from(&tenant) {
            Ok(schema) => {
                if repo.schema_exists(&schema).await? {
                    "present"
                } else {
                    "missing"
                }
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant.id, error = %e, "Invalid schema name");
                "invalid"
            }
        };
        writeln!(out, "{}", tenant_line(&tenant, schema))?;
    }

    if out.is_empty() {
        out.push_str("no tenants\n");
    }
    Ok(out)
}

async fn inspect_tenant(repo: &Repository, tenant_id: Uuid) -> anyhow::Result<String> {
    let (tenant, schema) = repo.tenant_schema(tenant_id).await?;
    let mut out = String::new();

    writeln!(out, "tenant   {} ({})", tenant.name, tenant.slug)?;
    writeln!(out, "id       {}", tenant.id)?;
    writeln!(out, "active   {}", tenant.is_active)?;
    writeln!(out, "schema   {}", schema)?;

    if !repo.schema_exists(&schema).await? {
        writeln!(out, "schema is missing")?;
        return Ok(out);
    }

    for table in TENANT_TABLES {
        let rows = repo.count_rows(&schema, table).await?;
        writeln!(out, "  {:<14} {:>8}", table, rows)?;
    }

    let users = repo
        .list_users(&UserFilter {
            tenant_id: Some(tenant.id),
            ..Default::default()
        })
        .await?;
    writeln!(out, "  {:<14} {:>8}", "users", users.len())?;

    Ok(out)
}

async fn orphans(repo: &Repository, only: Option<Uuid>) -> anyhow::Result<String> {
    let tenants = match only {
        Some(tenant_id) => vec![repo.tenant_schema(tenant_id).await?.0],
        None => repo.list_tenants().await?,
    };

    let mut out = String::new();
    let mut clean = true;

    for tenant in tenants {
        let schema = TenantSchema::try_from(&tenant)?;
        if !repo.schema_exists(&schema).await? {
            tracing::warn!(tenant_id = %tenant.id, "Skipping tenant without schema");
            continue;
        }

        let users = repo
            .list_users(&UserFilter {
                tenant_id: Some(tenant.id),
                ..Default::default()
            })
            .await?;
        let employees = repo.list_employees(&schema).await?;

        let report = find_orphans(&users, &employees);
        if !report.is_clean() {
            clean = false;
            write_report(&mut out, &tenant, &report)?;
        }
    }

    if clean {
        out.push_str("no orphans found\n");
    }
    Ok(out)
}

fn tenant_line(tenant: &Tenant, schema: &str) -> String {
    format!(
        "{}  {:<24} {:<8} schema={} {}",
        tenant.id,
        tenant.slug,
        if tenant.is_active { "active" } else { "inactive" },
        tenant.schema_name,
        schema
    )
}

fn write_report(out: &mut String, tenant: &Tenant, report: &OrphanReport) -> std::fmt::Result {
    writeln!(out, "tenant {} ({})", tenant.slug, tenant.id)?;
    for user in &report.users {
        writeln!(
            out,
            "  user {} <{}>: {} (employee {})",
            user.user_id, user.email, user.reason, user.employee_id
        )?;
    }
    for link in &report.employees {
        writeln!(
            out,
            "  employee {}: linked to missing user {}",
            link.employee_id, link.user_id
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clap::CommandFactory;
    use trackera_common::db::maintenance::{OrphanEmployeeLink, OrphanUser};

    fn tenant() -> Tenant {
        let now = Utc::now().into();
        Tenant {
            id: Uuid::nil(),
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            schema_name: "tenant_acme".to_string(),
            is_active: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from(["trackera-maint", "inspect-tenant", &Uuid::nil().to_string()])
            .unwrap();
        assert!(matches!(cli.command, Commands::InspectTenant { tenant_id } if tenant_id.is_nil()));

        let cli = Cli::try_parse_from(["trackera-maint", "orphans"]).unwrap();
        assert!(matches!(cli.command, Commands::Orphans { tenant: None }));

        assert!(Cli::try_parse_from(["trackera-maint", "inspect-tenant", "acme"]).is_err());
    }

    #[test]
    fn test_tenant_line_shows_state() {
        let line = tenant_line(&tenant(), "missing");
        assert!(line.contains("acme"));
        assert!(line.contains("inactive"));
        assert!(line.ends_with("schema=tenant_acme missing"));
    }

    #[test]
    fn test_report_lists_every_orphan() {
        let report = OrphanReport {
            users: vec![OrphanUser {
                user_id: Uuid::nil(),
                email: "ana@acme.test".to_string(),
                employee_id: Uuid::nil(),
                reason: "employee missing",
            }],
            employees: vec![OrphanEmployeeLink {
                employee_id: Uuid::nil(),
                user_id: Uuid::nil(),
            }],
        };

        let mut out = String::new();
        write_report(&mut out, &tenant(), &report).unwrap();

        assert_eq!(out.lines().count(), 3);
        assert!(out.contains("<ana@acme.test>: employee missing"));
        assert!(out.contains("linked to missing user"));
    }
}
