//! Password login

use axum::{extract::State, Json};

use crate::{member::Member, AppState};
use trackera_common::{
    dto::{LoginRequest, LoginResponse, ProfileResponse},
    errors::{AppError, Result},
    extract::ValidatedJson,
    metrics,
};

/// Sign in with the identity provider, then check the Trackera account
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = match state.identity.sign_in(&request.email, &request.password).await {
        Ok(session) => session,
        Err(e) => {
            if matches!(e, AppError::Unauthorized { .. }) {
                metrics::record_login("invalid_credentials");
            } else {
                metrics::record_login("error");
            }
            return Err(e);
        }
    };

    let member = match Member::resolve(&state.repo, session.user.id).await {
        Ok(member) => member,
        Err(e) => {
            let outcome = match e {
                AppError::Unauthorized { .. } => "unknown_account",
                AppError::Forbidden { .. } => "forbidden",
                _ => "error",
            };
            tracing::warn!(user_id = %session.user.id, outcome, error = %e, "Login refused");
            metrics::record_login(outcome);
            return Err(e);
        }
    };

    metrics::record_login("success");
    tracing::info!(
        user_id = %member.user.id,
        tenant_id = %member.tenant.id,
        "User logged in"
    );

    let profile = ProfileResponse::new(
        member.user.id,
        member.user.email,
        member.role,
        &member.tenant,
        member.employee,
    );

    Ok(Json(LoginResponse::new(session, profile)))
}
