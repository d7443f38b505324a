//! Profile handler

use axum::Json;

use crate::member::Member;
use trackera_common::dto::ProfileResponse;

/// The caller's account, tenant and linked employee
pub async fn me(member: Member) -> Json<ProfileResponse> {
    Json(ProfileResponse::new(
        member.user.id,
        member.user.email,
        member.role,
        &member.tenant,
        member.employee,
    ))
}
