//! Read-only consistency checks used by the maintenance CLI

use crate::db::models::Employee;
use crate::db::{Repository, TenantSchema, UserRecord};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A user row whose employee does not point back at it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanUser {
    pub user_id: Uuid,
    pub email: String,
    pub employee_id: Uuid,
    pub reason: &'static str,
}

/// An employee whose `user_id` names no user of the tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanEmployeeLink {
    pub employee_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    pub users: Vec<OrphanUser>,
    pub employees: Vec<OrphanEmployeeLink>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.users.is_empty() && self.employees.is_empty()
    }
}

/// Cross-check one tenant's users against its employees
pub fn find_orphans(users: &[UserRecord], employees: &[Employee]) -> OrphanReport {
    let by_id: HashMap<Uuid, &Employee> = employees.iter().map(|e| (e.id, e)).collect();
    let user_ids: HashSet<Uuid> = users.iter().map(|u| u.user.id).collect();

    let mut report = OrphanReport::default();

    for record in users {
        let user = &record.user;
        let reason = match by_id.get(&user.employee_id) {
            None => Some("employee missing"),
            Some(employee) if employee.user_id.is_none() => Some("employee not linked"),
            Some(employee) if employee.user_id != Some(user.id) => {
                Some("employee linked to another user")
            }
            Some(_) => None,
        };

        if let Some(reason) = reason {
            report.users.push(OrphanUser {
                user_id: user.id,
                email: user.email.clone(),
                employee_id: user.employee_id,
                reason,
            });
        }
    }

    for employee in employees {
        if let Some(user_id) = employee.user_id {
            if !user_ids.contains(&user_id) {
                report.employees.push(OrphanEmployeeLink {
                    employee_id: employee.id,
                    user_id,
                });
            }
        }
    }

    report
}

impl Repository {
    /// Whether a schema exists in the database
    pub async fn schema_exists(&self, schema: &TenantSchema) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1) AS present",
            vec![schema.name().into()],
        );

        match self.conn().query_one(stmt).await? {
            Some(row) => Ok(row.try_get::<bool>("", "present")?),
            None => Ok(false),
        }
    }

    /// Number of rows in a tenant table
    pub async fn count_rows(&self, schema: &TenantSchema, table: &str) -> Result<i64> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT COUNT(*)::bigint AS n FROM {}", schema.qualify(table)),
        );

        match self.conn().query_one(stmt).await? {
            Some(row) => Ok(row.try_get::<i64>("", "n")?),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Role, User};
    use chrono::Utc;

    fn employee(id: Uuid, user_id: Option<Uuid>) -> Employee {
        let now = Utc::now().into();
        Employee {
            id,
            user_id,
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            email: None,
            job_title: None,
            status: "active".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: Uuid, employee_id: Uuid) -> UserRecord {
        let now = Utc::now().into();
        UserRecord {
            user: User {
                id,
                tenant_id: Uuid::new_v4(),
                employee_id,
                email: format!("{}@example.com", id.simple()),
                status: "active".into(),
                created_at: now,
                updated_at: now,
            },
            role: Role::Employee,
        }
    }

    #[test]
    fn test_consistent_tenant_is_clean() {
        let (u, e) = (Uuid::new_v4(), Uuid::new_v4());
        let report = find_orphans(&[user(u, e)], &[employee(e, Some(u))]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_detects_each_kind_of_orphan() {
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (e1, e2, e3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stranger = Uuid::new_v4();

        let users = [user(u1, e1), user(u2, e2), user(u3, Uuid::new_v4())];
        let employees = [employee(e1, None), employee(e2, Some(stranger)), employee(e3, None)];

        let report = find_orphans(&users, &employees);

        let reasons: Vec<_> = report.users.iter().map(|o| (o.user_id, o.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (u1, "employee not linked"),
                (u2, "employee linked to another user"),
                (u3, "employee missing"),
            ]
        );
        assert_eq!(
            report.employees,
            vec![OrphanEmployeeLink {
                employee_id: e2,
                user_id: stranger
            }]
        );
    }
}
