//! Tenant-schema operations: employees, projects and time entries
//!
//! All statements are built against a validated [`TenantSchema`]; values are
//! always bound as parameters.

use crate::db::models::{Employee, Project, ProjectTotal, TimeEntry, TimeTotals};
use crate::db::{Repository, TenantSchema};
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement, Value};
use uuid::Uuid;

const EMPLOYEE_COLUMNS: &str =
    "id, user_id, first_name, last_name, email, job_title, status, created_at, updated_at";

const TIME_ENTRY_COLUMNS: &str = "te.id, te.employee_id, te.project_id, p.name AS project_name, \
     te.description, te.started_at, te.ended_at, te.duration_minutes, te.billable, \
     te.created_at, te.updated_at";

/// Fields for a new employee
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub job_title: Option<String>,
}

/// Complete set of writable time entry fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntryWrite {
    pub project_id: Option<Uuid>,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub billable: bool,
}

impl TimeEntryWrite {
    /// Build a write, rejecting `ended_at < started_at` and deriving the duration
    pub fn new(
        project_id: Option<Uuid>,
        description: String,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        billable: bool,
    ) -> Result<Self> {
        let duration_minutes = match ended_at {
            Some(ended_at) => Some(duration_minutes(started_at, ended_at)?),
            None => None,
        };

        Ok(Self {
            project_id,
            description,
            started_at,
            ended_at,
            duration_minutes,
            billable,
        })
    }

    /// Current values of a stored entry
    pub fn from_entry(entry: &TimeEntry) -> Self {
        Self {
            project_id: entry.project_id,
            description: entry.description.clone(),
            started_at: entry.started_at.with_timezone(&Utc),
            ended_at: entry.ended_at.map(|t| t.with_timezone(&Utc)),
            duration_minutes: entry.duration_minutes,
            billable: entry.billable,
        }
    }

    /// Re-derive the duration after fields were changed
    pub fn revalidated(self) -> Result<Self> {
        Self::new(
            self.project_id,
            self.description,
            self.started_at,
            self.ended_at,
            self.billable,
        )
    }
}

/// Whole minutes between two instants
pub fn duration_minutes(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Result<i32> {
    if ended_at < started_at {
        return Err(AppError::invalid_field(
            "endedAt",
            "endedAt must not be before startedAt",
        ));
    }

    let minutes = (ended_at - started_at).num_minutes();
    i32::try_from(minutes).map_err(|_| AppError::invalid_field("endedAt", "time entry is too long"))
}

/// Filters for listing time entries
#[derive(Debug, Clone)]
pub struct TimeEntryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for TimeEntryFilter {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            project_id: None,
            limit: 100,
            offset: 0,
        }
    }
}

fn stmt(sql: String, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Select time entries (joined with their project) out of `source`,
/// which is either the table itself or a CTE; it is aliased `te` either way.
fn time_entry_select(schema: &TenantSchema, source: &str) -> String {
    format!(
        "SELECT {} FROM {} te LEFT JOIN {} p ON p.id = te.project_id",
        TIME_ENTRY_COLUMNS,
        source,
        schema.qualify("projects")
    )
}

impl Repository {
    // ========================================================================
    // Employee Operations
    // ========================================================================

    /// List a tenant's employees by name
    pub async fn list_employees(&self, schema: &TenantSchema) -> Result<Vec<Employee>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY last_name, first_name",
            EMPLOYEE_COLUMNS,
            schema.qualify("employees")
        );

        Employee::find_by_statement(stmt(sql, vec![]))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find an employee by ID
    pub async fn find_employee(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
    ) -> Result<Option<Employee>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            EMPLOYEE_COLUMNS,
            schema.qualify("employees")
        );

        Employee::find_by_statement(stmt(sql, vec![employee_id.into()]))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find the employee a user account is linked to
    pub async fn find_employee_by_user(
        &self,
        schema: &TenantSchema,
        user_id: Uuid,
    ) -> Result<Option<Employee>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1",
            EMPLOYEE_COLUMNS,
            schema.qualify("employees")
        );

        Employee::find_by_statement(stmt(sql, vec![user_id.into()]))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create an employee record
    pub async fn create_employee(
        &self,
        schema: &TenantSchema,
        new: NewEmployee,
    ) -> Result<Employee> {
        let sql = format!(
            "INSERT INTO {} (id, first_name, last_name, email, job_title) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            schema.qualify("employees"),
            EMPLOYEE_COLUMNS
        );

        let values = vec![
            Uuid::new_v4().into(),
            new.first_name.into(),
            new.last_name.into(),
            new.email.into(),
            new.job_title.into(),
        ];

        Employee::find_by_statement(stmt(sql, values))
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "employee insert returned no row".to_string(),
            })
    }

    /// Point an employee at a user account, or clear the link with `None`.
    /// Returns false when the employee does not exist.
    pub async fn set_employee_user(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET user_id = $1, updated_at = now() WHERE id = $2",
            schema.qualify("employees")
        );

        let result = self
            .conn()
            .execute(stmt(sql, vec![user_id.into(), employee_id.into()]))
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Project Operations
    // ========================================================================

    /// List projects with their client name
    pub async fn list_projects(
        &self,
        schema: &TenantSchema,
        active_only: bool,
    ) -> Result<Vec<Project>> {
        let sql = format!(
            "SELECT p.id, p.client_id, c.name AS client_name, p.name, p.color, p.is_active, p.created_at \
             FROM {} p LEFT JOIN {} c ON c.id = p.client_id \
             WHERE ($1 = FALSE OR p.is_active) \
             ORDER BY p.name",
            schema.qualify("projects"),
            schema.qualify("clients")
        );

        Project::find_by_statement(stmt(sql, vec![active_only.into()]))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find a project by ID
    pub async fn find_project(
        &self,
        schema: &TenantSchema,
        project_id: Uuid,
    ) -> Result<Option<Project>> {
        let sql = format!(
            "SELECT p.id, p.client_id, c.name AS client_name, p.name, p.color, p.is_active, p.created_at \
             FROM {} p LEFT JOIN {} c ON c.id = p.client_id \
             WHERE p.id = $1",
            schema.qualify("projects"),
            schema.qualify("clients")
        );

        Project::find_by_statement(stmt(sql, vec![project_id.into()]))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Time Entry Operations
    // ========================================================================

    /// List an employee's entries, newest first
    pub async fn list_time_entries(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        filter: &TimeEntryFilter,
    ) -> Result<Vec<TimeEntry>> {
        let sql = format!(
            "{} WHERE te.employee_id = $1 \
             AND ($2::timestamptz IS NULL OR te.started_at >= $2) \
             AND ($3::timestamptz IS NULL OR te.started_at < $3) \
             AND ($4::uuid IS NULL OR te.project_id = $4) \
             ORDER BY te.started_at DESC \
             LIMIT $5 OFFSET $6",
            time_entry_select(schema, &schema.qualify("time_entries"))
        );

        let values = vec![
            employee_id.into(),
            filter.from.into(),
            filter.to.into(),
            filter.project_id.into(),
            (filter.limit as i64).into(),
            (filter.offset as i64).into(),
        ];

        TimeEntry::find_by_statement(stmt(sql, values))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find an entry by ID
    pub async fn find_time_entry(
        &self,
        schema: &TenantSchema,
        entry_id: Uuid,
    ) -> Result<Option<TimeEntry>> {
        let sql = format!(
            "{} WHERE te.id = $1",
            time_entry_select(schema, &schema.qualify("time_entries"))
        );

        TimeEntry::find_by_statement(stmt(sql, vec![entry_id.into()]))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// The employee's entry without an end time, if any
    pub async fn running_time_entry(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
    ) -> Result<Option<TimeEntry>> {
        let sql = format!(
            "{} WHERE te.employee_id = $1 AND te.ended_at IS NULL LIMIT 1",
            time_entry_select(schema, &schema.qualify("time_entries"))
        );

        TimeEntry::find_by_statement(stmt(sql, vec![employee_id.into()]))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Insert an entry and return it with its project name
    pub async fn insert_time_entry(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        entry: TimeEntryWrite,
    ) -> Result<TimeEntry> {
        let sql = format!(
            "WITH te AS ( \
                INSERT INTO {} (id, employee_id, project_id, description, started_at, ended_at, duration_minutes, billable) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING * \
             ) {}",
            schema.qualify("time_entries"),
            time_entry_select(schema, "te")
        );

        let values = vec![
            Uuid::new_v4().into(),
            employee_id.into(),
            entry.project_id.into(),
            entry.description.into(),
            entry.started_at.into(),
            entry.ended_at.into(),
            entry.duration_minutes.into(),
            entry.billable.into(),
        ];

        TimeEntry::find_by_statement(stmt(sql, values))
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "time entry insert returned no row".to_string(),
            })
    }

    /// Overwrite an entry's writable fields; `None` when it no longer exists
    pub async fn update_time_entry(
        &self,
        schema: &TenantSchema,
        entry_id: Uuid,
        entry: TimeEntryWrite,
    ) -> Result<Option<TimeEntry>> {
        let sql = format!(
            "WITH te AS ( \
                UPDATE {} SET project_id = $2, description = $3, started_at = $4, ended_at = $5, \
                duration_minutes = $6, billable = $7, updated_at = now() \
                WHERE id = $1 RETURNING * \
             ) {}",
            schema.qualify("time_entries"),
            time_entry_select(schema, "te")
        );

        let values = vec![
            entry_id.into(),
            entry.project_id.into(),
            entry.description.into(),
            entry.started_at.into(),
            entry.ended_at.into(),
            entry.duration_minutes.into(),
            entry.billable.into(),
        ];

        TimeEntry::find_by_statement(stmt(sql, values))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// End a running entry at `ended_at`, deriving its duration
    pub async fn stop_time_entry(
        &self,
        schema: &TenantSchema,
        entry: &TimeEntry,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<TimeEntry>> {
        let mut write = TimeEntryWrite::from_entry(entry);
        write.ended_at = Some(ended_at);

        self.update_time_entry(schema, entry.id, write.revalidated()?)
            .await
    }

    /// Delete an entry; false when it did not exist
    pub async fn delete_time_entry(&self, schema: &TenantSchema, entry_id: Uuid) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", schema.qualify("time_entries"));

        let result = self
            .conn()
            .execute(stmt(sql, vec![entry_id.into()]))
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Minutes booked today, this week and billable this week
    pub async fn time_totals(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        week_start: DateTime<Utc>,
        day_start: DateTime<Utc>,
        week_end: DateTime<Utc>,
    ) -> Result<TimeTotals> {
        let sql = format!(
            "SELECT \
                COALESCE(SUM(duration_minutes) FILTER (WHERE started_at >= $3), 0)::bigint AS today_minutes, \
                COALESCE(SUM(duration_minutes), 0)::bigint AS week_minutes, \
                COALESCE(SUM(duration_minutes) FILTER (WHERE billable), 0)::bigint AS billable_week_minutes \
             FROM {} \
             WHERE employee_id = $1 AND started_at >= $2 AND started_at < $4",
            schema.qualify("time_entries")
        );

        let values = vec![
            employee_id.into(),
            week_start.into(),
            day_start.into(),
            week_end.into(),
        ];

        Ok(TimeTotals::find_by_statement(stmt(sql, values))
            .one(self.conn())
            .await?
            .unwrap_or_default())
    }

    /// Minutes per project within a window, largest first
    pub async fn project_totals(
        &self,
        schema: &TenantSchema,
        employee_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ProjectTotal>> {
        let sql = format!(
            "SELECT te.project_id, p.name AS project_name, \
                COALESCE(SUM(te.duration_minutes), 0)::bigint AS minutes \
             FROM {} te LEFT JOIN {} p ON p.id = te.project_id \
             WHERE te.employee_id = $1 AND te.started_at >= $2 AND te.started_at < $3 \
             GROUP BY te.project_id, p.name \
             ORDER BY minutes DESC",
            schema.qualify("time_entries"),
            schema.qualify("projects")
        );

        ProjectTotal::find_by_statement(stmt(sql, vec![employee_id.into(), from.into(), to.into()]))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_duration_is_derived_and_range_checked() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let write = TimeEntryWrite::new(None, String::new(), start, Some(start + Duration::seconds(5430)), true).unwrap();
        assert_eq!(write.duration_minutes, Some(90));

        let running = TimeEntryWrite::new(None, String::new(), start, None, true).unwrap();
        assert_eq!(running.duration_minutes, None);

        let backwards = TimeEntryWrite::new(None, String::new(), start, Some(start - Duration::minutes(1)), true);
        assert!(matches!(backwards, Err(AppError::Validation { .. })));

        assert_eq!(duration_minutes(start, start).unwrap(), 0);
    }

    #[test]
    fn test_time_entry_select_joins_projects() {
        let schema = TenantSchema::parse("tenant_acme").unwrap();
        let sql = time_entry_select(&schema, &schema.qualify("time_entries"));
        assert!(sql.contains("FROM \"tenant_acme\".\"time_entries\" te LEFT JOIN \"tenant_acme\".\"projects\" p"));
    }

    #[test]
    fn test_cte_select_aliases_cte() {
        let schema = TenantSchema::parse("tenant_acme").unwrap();
        let sql = time_entry_select(&schema, "te");
        assert!(sql.contains("FROM te te LEFT JOIN"));
    }
}
