//! Public app bodies: login, profile, dashboard, projects and time entries

use super::EmployeeResponse;
use crate::db::models::{Employee, Project, ProjectTotal, Role, Tenant, TimeEntry, TimeTotals};
use crate::db::{TimeEntryFilter, TimeEntryWrite};
use crate::errors::Result;
use crate::identity::SignInSession;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE_SIZE: u64 = 500;

// ============================================================================
// Auth / profile
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub profile: ProfileResponse,
}

impl LoginResponse {
    pub fn new(session: SignInSession, profile: ProfileResponse) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: "bearer",
            expires_in: session.expires_in,
            profile,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<&Tenant> for TenantSummary {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant: TenantSummary,
    pub employee: Option<EmployeeResponse>,
}

impl ProfileResponse {
    pub fn new(
        user_id: Uuid,
        email: String,
        role: Role,
        tenant: &Tenant,
        employee: Option<Employee>,
    ) -> Self {
        Self {
            user_id,
            email,
            role,
            tenant: TenantSummary::from(tenant),
            employee: employee.map(EmployeeResponse::from),
        }
    }
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub is_active: bool,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            color: project.color,
            client_id: project.client_id,
            client_name: project.client_name,
            is_active: project.is_active,
        }
    }
}

// ============================================================================
// Time entries
// ============================================================================

fn default_billable() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeEntryRequest {
    pub project_id: Option<Uuid>,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,

    pub started_at: DateTime<Utc>,

    /// Omit to start a running timer
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default = "default_billable")]
    pub billable: bool,
}

impl CreateTimeEntryRequest {
    pub fn into_write(self) -> Result<TimeEntryWrite> {
        TimeEntryWrite::new(
            self.project_id,
            self.description.trim().to_string(),
            self.started_at,
            self.ended_at,
            self.billable,
        )
    }
}

/// Partial update; omitted fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeEntryRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub started_at: Option<DateTime<Utc>>,

    pub ended_at: Option<DateTime<Utc>>,

    pub billable: Option<bool>,
}

impl UpdateTimeEntryRequest {
    /// Merge onto the stored entry and re-derive the duration
    pub fn apply_to(self, entry: &TimeEntry) -> Result<TimeEntryWrite> {
        let mut write = TimeEntryWrite::from_entry(entry);

        if let Some(project_id) = self.project_id {
            write.project_id = Some(project_id);
        }
        if let Some(description) = self.description {
            write.description = description.trim().to_string();
        }
        if let Some(started_at) = self.started_at {
            write.started_at = started_at;
        }
        if let Some(ended_at) = self.ended_at {
            write.ended_at = Some(ended_at);
        }
        if let Some(billable) = self.billable {
            write.billable = billable;
        }

        write.revalidated()
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl From<TimeEntryQuery> for TimeEntryFilter {
    fn from(query: TimeEntryQuery) -> Self {
        let defaults = TimeEntryFilter::default();

        Self {
            from: query.from,
            to: query.to,
            project_id: query.project_id,
            limit: query.limit.unwrap_or(defaults.limit).min(MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryResponse {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub description: String,
    pub started_at: DateTime<FixedOffset>,
    pub ended_at: Option<DateTime<FixedOffset>>,
    pub duration_minutes: Option<i32>,
    pub billable: bool,
    pub running: bool,
}

impl From<TimeEntry> for TimeEntryResponse {
    fn from(entry: TimeEntry) -> Self {
        Self {
            running: entry.is_running(),
            id: entry.id,
            project_id: entry.project_id,
            project_name: entry.project_name,
            description: entry.description,
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            duration_minutes: entry.duration_minutes,
            billable: entry.billable,
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTotalResponse {
    pub project_id: Option<Uuid>,
    pub project_name: Option<String>,
    pub minutes: i64,
}

impl From<ProjectTotal> for ProjectTotalResponse {
    fn from(total: ProjectTotal) -> Self {
        Self {
            project_id: total.project_id,
            project_name: total.project_name,
            minutes: total.minutes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub today_minutes: i64,
    pub week_minutes: i64,
    pub billable_week_minutes: i64,
    pub running_entry: Option<TimeEntryResponse>,
    pub projects: Vec<ProjectTotalResponse>,
}

impl DashboardResponse {
    pub fn new(
        (week_start, week_end): (DateTime<Utc>, DateTime<Utc>),
        totals: TimeTotals,
        running_entry: Option<TimeEntry>,
        projects: Vec<ProjectTotal>,
    ) -> Self {
        Self {
            week_start,
            week_end,
            today_minutes: totals.today_minutes,
            week_minutes: totals.week_minutes,
            billable_week_minutes: totals.billable_week_minutes,
            running_entry: running_entry.map(TimeEntryResponse::from),
            projects: projects.into_iter().map(ProjectTotalResponse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use chrono::TimeZone;
    use serde_json::json;

    fn stored_entry() -> TimeEntry {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        TimeEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            project_id: None,
            project_name: None,
            description: "Planning".to_string(),
            started_at: start.into(),
            ended_at: Some(end.into()),
            duration_minutes: Some(60),
            billable: true,
            created_at: start.into(),
            updated_at: end.into(),
        }
    }

    #[test]
    fn test_create_request_defaults_to_billable_running_timer() {
        let body = json!({ "startedAt": "2026-03-02T09:00:00Z" });
        let request: CreateTimeEntryRequest = serde_json::from_value(body).unwrap();
        let write = request.into_write().unwrap();

        assert!(write.billable);
        assert!(write.ended_at.is_none());
        assert!(write.duration_minutes.is_none());
        assert_eq!(write.description, "");
    }

    #[test]
    fn test_update_merges_and_rederives_duration() {
        let entry = stored_entry();
        let update = UpdateTimeEntryRequest {
            ended_at: Some(Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap()),
            description: Some("  Planning and review ".to_string()),
            ..Default::default()
        };

        let write = update.apply_to(&entry).unwrap();
        assert_eq!(write.duration_minutes, Some(150));
        assert_eq!(write.description, "Planning and review");
        assert!(write.billable);
    }

    #[test]
    fn test_update_rejects_start_after_end() {
        let entry = stored_entry();
        let update = UpdateTimeEntryRequest {
            started_at: Some(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()),
            ..Default::default()
        };

        let err = update.apply_to(&entry).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_query_clamps_page_size() {
        let filter = TimeEntryFilter::from(TimeEntryQuery {
            limit: Some(10_000),
            ..Default::default()
        });
        assert_eq!(filter.limit, MAX_PAGE_SIZE);

        let filter = TimeEntryFilter::from(TimeEntryQuery::default());
        assert_eq!(filter.limit, TimeEntryFilter::default().limit);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_time_entry_response_marks_running() {
        let mut entry = stored_entry();
        entry.ended_at = None;
        entry.duration_minutes = None;

        let json = serde_json::to_value(TimeEntryResponse::from(entry)).unwrap();
        assert_eq!(json["running"], true);
        assert!(json["endedAt"].is_null());
    }
}
