//! Time entry handlers
//!
//! Every entry is read and written inside the caller's tenant schema and
//! only when it belongs to the caller's employee record.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{member::Member, AppState};
use trackera_common::{
    db::{
        models::{Project, TimeEntry},
        TimeEntryFilter, TimeEntryWrite,
    },
    dto::{CreateTimeEntryRequest, TimeEntryQuery, TimeEntryResponse, UpdateTimeEntryRequest},
    errors::{AppError, Result},
    extract::{ValidatedJson, ValidatedQuery},
};

// ============================================================================
// Rules
// ============================================================================

/// An entry is visible only to the employee it belongs to
fn owned_by(entry: Option<TimeEntry>, employee_id: Uuid, entry_id: Uuid) -> Result<TimeEntry> {
    entry
        .filter(|entry| entry.employee_id == employee_id)
        .ok_or_else(|| AppError::not_found("time entry", entry_id))
}

fn require_project(project: Option<Project>, project_id: Uuid) -> Result<()> {
    project
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("project", project_id))
}

/// At most one running entry per employee
fn no_running_timer(write: &TimeEntryWrite, running: Option<&TimeEntry>) -> Result<()> {
    match running {
        Some(running) if write.ended_at.is_none() => Err(AppError::Duplicate {
            message: format!("time entry {} is already running", running.id),
        }),
        _ => Ok(()),
    }
}

fn still_running(entry: &TimeEntry) -> Result<()> {
    if entry.is_running() {
        Ok(())
    } else {
        Err(AppError::Duplicate {
            message: format!("time entry {} is already stopped", entry.id),
        })
    }
}

fn ordered_range(query: &TimeEntryQuery) -> Result<()> {
    match (query.from, query.to) {
        (Some(from), Some(to)) if from > to => {
            Err(AppError::invalid_field("from", "from must not be after to"))
        }
        _ => Ok(()),
    }
}

async fn owned_entry(
    state: &AppState,
    member: &Member,
    employee_id: Uuid,
    entry_id: Uuid,
) -> Result<TimeEntry> {
    let entry = state.repo.find_time_entry(&member.schema, entry_id).await?;
    owned_by(entry, employee_id, entry_id)
}

async fn ensure_project(state: &AppState, member: &Member, project_id: Option<Uuid>) -> Result<()> {
    if let Some(project_id) = project_id {
        let project = state.repo.find_project(&member.schema, project_id).await?;
        require_project(project, project_id)?;
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's entries, newest first
pub async fn list_time_entries(
    member: Member,
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<TimeEntryQuery>,
) -> Result<Json<Vec<TimeEntryResponse>>> {
    let employee_id = member.employee_id()?;

    ordered_range(&query)?;

    let filter = TimeEntryFilter::from(query);
    let entries = state
        .repo
        .list_time_entries(&member.schema, employee_id, &filter)
        .await?;

    Ok(Json(entries.into_iter().map(TimeEntryResponse::from).collect()))
}

/// Book a finished entry or start a timer
pub async fn create_time_entry(
    member: Member,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateTimeEntryRequest>,
) -> Result<(StatusCode, Json<TimeEntryResponse>)> {
    let employee_id = member.employee_id()?;
    let write = request.into_write()?;

    ensure_project(&state, &member, write.project_id).await?;

    if write.ended_at.is_none() {
        let running = state
            .repo
            .running_time_entry(&member.schema, employee_id)
            .await?;
        no_running_timer(&write, running.as_ref())?;
    }

    let entry = state
        .repo
        .insert_time_entry(&member.schema, employee_id, write)
        .await?;

    tracing::info!(
        entry_id = %entry.id,
        employee_id = %employee_id,
        running = entry.is_running(),
        "Time entry created"
    );

    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Change fields of one of the caller's entries
pub async fn update_time_entry(
    member: Member,
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateTimeEntryRequest>,
) -> Result<Json<TimeEntryResponse>> {
    let employee_id = member.employee_id()?;
    let entry = owned_entry(&state, &member, employee_id, entry_id).await?;

    if request.project_id.is_some() && request.project_id != entry.project_id {
        ensure_project(&state, &member, request.project_id).await?;
    }

    let write = request.apply_to(&entry)?;
    let updated = state
        .repo
        .update_time_entry(&member.schema, entry_id, write)
        .await?
        .ok_or_else(|| AppError::not_found("time entry", entry_id))?;

    Ok(Json(updated.into()))
}

/// Delete one of the caller's entries
pub async fn delete_time_entry(
    member: Member,
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode> {
    let employee_id = member.employee_id()?;
    owned_entry(&state, &member, employee_id, entry_id).await?;

    if !state.repo.delete_time_entry(&member.schema, entry_id).await? {
        return Err(AppError::not_found("time entry", entry_id));
    }

    tracing::info!(entry_id = %entry_id, employee_id = %employee_id, "Time entry deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Stop a running timer now
pub async fn stop_time_entry(
    member: Member,
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<TimeEntryResponse>> {
    let employee_id = member.employee_id()?;
    let entry = owned_entry(&state, &member, employee_id, entry_id).await?;

    still_running(&entry)?;

    let stopped = state
        .repo
        .stop_time_entry(&member.schema, &entry, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("time entry", entry_id))?;

    tracing::info!(
        entry_id = %entry_id,
        minutes = ?stopped.duration_minutes,
        "Time entry stopped"
    );

    Ok(Json(stopped.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use tokio_test::{assert_err, assert_ok};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn entry(employee_id: Uuid, ended: bool) -> TimeEntry {
        let ended_at = ended.then(|| (start() + Duration::hours(1)).into());
        TimeEntry {
            id: Uuid::new_v4(),
            employee_id,
            project_id: None,
            project_name: None,
            description: String::new(),
            started_at: start().into(),
            ended_at,
            duration_minutes: ended.then_some(60),
            billable: true,
            created_at: start().into(),
            updated_at: start().into(),
        }
    }

    fn project(id: Uuid) -> Project {
        Project {
            id,
            client_id: None,
            client_name: None,
            name: "Website".to_string(),
            color: None,
            is_active: true,
            created_at: start().into(),
        }
    }

    #[test]
    fn test_other_employees_entry_is_not_found() {
        let mine = Uuid::new_v4();
        let theirs = entry(Uuid::new_v4(), true);
        let entry_id = theirs.id;

        let err = owned_by(Some(theirs), mine, entry_id).unwrap_err();
        assert!(err.is_not_found());

        let err = owned_by(None, mine, entry_id).unwrap_err();
        assert!(err.is_not_found());

        let own = entry(mine, true);
        let own_id = own.id;
        assert_eq!(owned_by(Some(own), mine, own_id).unwrap().id, own_id);
    }

    #[test]
    fn test_missing_project_is_not_found() {
        let project_id = Uuid::new_v4();
        assert!(require_project(None, project_id).unwrap_err().is_not_found());
        assert_ok!(require_project(Some(project(project_id)), project_id));
    }

    #[test]
    fn test_second_running_timer_conflicts() {
        let employee_id = Uuid::new_v4();
        let running = entry(employee_id, false);
        let timer = TimeEntryWrite::new(None, String::new(), start(), None, true).unwrap();

        let err = no_running_timer(&timer, Some(&running)).unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
        assert_ok!(no_running_timer(&timer, None));

        // A finished entry can be booked while a timer runs
        let booked = TimeEntryWrite::new(
            None,
            String::new(),
            start(),
            Some(start() + Duration::minutes(30)),
            true,
        )
        .unwrap();
        assert_ok!(no_running_timer(&booked, Some(&running)));
    }

    #[test]
    fn test_stopping_a_stopped_entry_conflicts() {
        let employee_id = Uuid::new_v4();
        assert_ok!(still_running(&entry(employee_id, false)));

        let err = still_running(&entry(employee_id, true)).unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[test]
    fn test_range_must_be_ordered() {
        let backwards = TimeEntryQuery {
            from: Some(start()),
            to: Some(start() - Duration::days(1)),
            ..Default::default()
        };
        assert_err!(ordered_range(&backwards));

        let open_ended = TimeEntryQuery {
            from: Some(start()),
            ..Default::default()
        };
        assert_ok!(ordered_range(&open_ended));
    }
}
