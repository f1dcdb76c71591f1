//! `Json`, `Query` and `Path` wrappers that reject with [`ApiError`] so
//! malformed input gets the same error envelope as every other failure.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// JSON body that may be left out. An empty or blank body gives `None`;
/// anything else must parse as `T`.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(Self(Some(value)))
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Visit {
        page_url: Option<String>,
    }

    async fn optional(body: &'static str) -> Result<Option<Visit>, ApiError> {
        let request = Request::post("/").body(Body::from(body)).unwrap();
        OptionalJson::<Visit>::from_request(request, &()).await.map(|OptionalJson(v)| v)
    }

    #[tokio::test]
    async fn optional_json_accepts_missing_body() {
        assert_eq!(optional("").await.unwrap(), None);
        assert_eq!(optional("  \n").await.unwrap(), None);
    }

    #[tokio::test]
    async fn optional_json_parses_present_body() {
        let visit = optional(r#"{"page_url":"/timeline"}"#).await.unwrap();
        assert_eq!(visit, Some(Visit { page_url: Some("/timeline".into()) }));
    }

    #[tokio::test]
    async fn optional_json_rejects_malformed_body() {
        let err = optional("{not json").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_JSON");

        let err = optional(r#"{"page_url": 5}"#).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
