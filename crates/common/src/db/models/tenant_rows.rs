//! Rows read from a tenant's own schema.
//!
//! These tables live in `tenant_<id>` schemas, so they are queried with raw
//! statements against a [`TenantSchema`](crate::db::TenantSchema) instead of
//! through static entities.

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub job_title: Option<String>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub description: String,
    pub started_at: DateTimeWithTimeZone,
    pub ended_at: Option<DateTimeWithTimeZone>,
    pub duration_minutes: Option<i32>,
    pub billable: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Minute totals for the dashboard
#[derive(Clone, Debug, Default, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct TimeTotals {
    pub today_minutes: i64,
    pub week_minutes: i64,
    pub billable_week_minutes: i64,
}

/// Minutes booked against one project (or none)
#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct ProjectTotal {
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub minutes: i64,
}
