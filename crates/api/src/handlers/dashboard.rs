//! Weekly dashboard

use axum::{extract::State, Json};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::{member::Member, AppState};
use trackera_common::{
    dto::DashboardResponse,
    errors::Result,
};

/// Monday 00:00 UTC of the week containing `now`, and the following Monday
pub fn week_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day_start(now) - Duration::days(i64::from(now.weekday().num_days_from_monday()));
    (start, start + Duration::days(7))
}

/// Midnight UTC of the day containing `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

/// Totals for today and this week, the running timer and per-project minutes
pub async fn dashboard(
    member: Member,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>> {
    let employee_id = member.employee_id()?;
    let now = Utc::now();
    let (week_start, week_end) = week_bounds(now);
    let schema = &member.schema;

    let (totals, running, projects) = futures::try_join!(
        state
            .repo
            .time_totals(schema, employee_id, week_start, day_start(now), week_end),
        state.repo.running_time_entry(schema, employee_id),
        state
            .repo
            .project_totals(schema, employee_id, week_start, week_end),
    )?;

    Ok(Json(DashboardResponse::new(
        (week_start, week_end),
        totals,
        running,
        projects,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_week_starts_on_monday_midnight() {
        // Thursday afternoon
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 15, 42, 10).unwrap();
        let (start, end) = week_bounds(now);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_week_bounds_on_edges() {
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(week_bounds(monday).0, monday);

        // Sunday late evening still belongs to the week that began six days earlier
        let sunday = Utc.with_ymd_and_hms(2026, 3, 8, 23, 59, 59).unwrap();
        assert_eq!(week_bounds(sunday).0, monday);

        // Across a year boundary
        let new_year = Utc.with_ymd_and_hms(2027, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            week_bounds(new_year).0,
            Utc.with_ymd_and_hms(2026, 12, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_start_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 15, 42, 10).unwrap();
        assert_eq!(day_start(now), Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap());
    }
}
