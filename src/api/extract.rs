//! Request extractors that reject with [`ApiError`]
//!
//! - [`AcceptsJson`]: 406 unless `Accept` allows `application/json`
//! - [`ApiJson`]: 415 for a non-JSON `Content-Type`, 400 for malformed JSON,
//!   422 for JSON of the wrong shape
//! - [`ApiPath`]: 422 when a path segment does not parse (e.g. a
//!   non-integer id)

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request,
    },
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// Media ranges under which a JSON response is acceptable
const JSON_RANGES: [&str; 3] = ["application/json", "application/*", "*/*"];

/// Guard for endpoints that only answer in JSON
#[derive(Debug, Clone, Copy)]
pub struct AcceptsJson;

#[async_trait]
impl<S> FromRequestParts<S> for AcceptsJson
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if accepts_json(accept) {
            Ok(AcceptsJson)
        } else {
            Err(ApiError::NotAcceptable(format!(
                "responses are application/json, Accept was {:?}",
                accept
            )))
        }
    }
}

/// Whether an `Accept` header value admits `application/json`
///
/// A missing or empty header does not.
fn accepts_json(accept: &str) -> bool {
    accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .any(|media| JSON_RANGES.iter().any(|ok| media.eq_ignore_ascii_case(ok)))
}

/// JSON request body
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(JsonRejection::MissingJsonContentType(e)) => {
                Err(ApiError::UnsupportedMediaType(e.body_text()))
            }
            Err(JsonRejection::JsonDataError(e)) => Err(ApiError::Validation(e.body_text())),
            Err(e) => Err(ApiError::BadRequest(e.body_text())),
        }
    }
}

/// Typed path parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(PathRejection::FailedToDeserializePathParams(e)) => {
                Err(ApiError::Validation(e.body_text()))
            }
            Err(e) => Err(ApiError::Internal(e.body_text())),
        }
    }
}
