//! Request extractors that validate before the handler runs

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body, deserialized then checked with `validator`.
/// Malformed bodies and failed rules both surface as 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation {
                message: rejection.body_text(),
                field: None,
            })?;

        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string, deserialized then checked with `validator`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation {
                message: rejection.body_text(),
                field: None,
            })?;

        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{CreateTenantRequest, TimeEntryQuery};
    use axum::body::Body;
    use axum::http::{header, StatusCode};

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/admin/tenants")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_is_extracted() {
        let req = json_request(r#"{"name":"Acme","slug":"acme"}"#);
        let ValidatedJson(body) = ValidatedJson::<CreateTenantRequest>::from_request(req, &())
            .await
            .unwrap();
        assert_eq!(body.slug, "acme");
    }

    #[tokio::test]
    async fn test_rule_violation_is_bad_request() {
        let req = json_request(r#"{"name":"","slug":"acme"}"#);
        let err = ValidatedJson::<CreateTenantRequest>::from_request(req, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let req = json_request(r#"{"name":"Acme""#);
        let err = ValidatedJson::<CreateTenantRequest>::from_request(req, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_query_is_validated() {
        let (mut parts, _) = Request::builder()
            .uri("/time-entries?limit=0")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let err = ValidatedQuery::<TimeEntryQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
