//! Project listing

use axum::{extract::State, Json};

use crate::{member::Member, AppState};
use trackera_common::{
    dto::{ProjectQuery, ProjectResponse},
    errors::Result,
    extract::ValidatedQuery,
};

/// Projects of the caller's tenant
pub async fn list_projects(
    member: Member,
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ProjectQuery>,
) -> Result<Json<Vec<ProjectResponse>>> {
    let projects = state
        .repo
        .list_projects(&member.schema, query.active_only)
        .await?;

    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect()))
}
