//! `Json` / `Query` wrappers whose rejections use the error envelope.
//!
//! Deserialization failures become `validation_error` responses naming the
//! offending field, the same shape `validator` failures produce.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::Uri;
use axum::Json;
use serde::de::DeserializeOwned;

use stockroom_core::DomainError;

use crate::app::errors::ApiError;

pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&rejection).into()),
        }
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::try_from_uri(&parts.uri) {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection::<T>(&parts.uri, &rejection).into()),
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> DomainError {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            let text = e.body_text();
            let detail = text.split_once("target type: ").map_or(text.as_str(), |(_, d)| d);
            let (field, message) = data_error_field(detail);
            DomainError::invalid_field(field, message)
        }
        JsonRejection::JsonSyntaxError(_) => DomainError::invalid_field("body", "request body is not valid JSON"),
        JsonRejection::MissingJsonContentType(_) => {
            DomainError::invalid_field("body", "expected `Content-Type: application/json`")
        }
        other => DomainError::invalid_field("body", other.body_text()),
    }
}

fn query_rejection<T: DeserializeOwned>(uri: &Uri, rejection: &QueryRejection) -> DomainError {
    let text = rejection.body_text();
    let detail = text.split_once("query string: ").map_or(text.as_str(), |(_, d)| d);
    match failing_query_key::<T>(uri.query().unwrap_or_default()) {
        Some(field) => {
            let message = format!("{field} is invalid: {detail}");
            DomainError::invalid_field(field, message)
        }
        None => DomainError::invalid_field("query", detail),
    }
}

/// Field path and message from a serde error such as
/// ``type: unknown variant `x`, expected ...`` or ``missing field `price` ``.
fn data_error_field(detail: &str) -> (String, String) {
    let detail = detail.split(" at line ").next().unwrap_or(detail);

    if let Some((_, rest)) = detail.split_once("missing field `") {
        if let Some((name, _)) = rest.split_once('`') {
            return (name.to_string(), format!("{name} is required"));
        }
    }
    match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(' ') => {
            (path.to_string(), format!("{path}: {message}"))
        }
        _ => ("body".to_string(), detail.to_string()),
    }
}

/// Query structs here are all-optional, so the pair that fails on its own is
/// the one to blame.
fn failing_query_key<T: DeserializeOwned>(query: &str) -> Option<String> {
    query.split('&').filter(|pair| !pair.is_empty()).find_map(|pair| {
        let uri: Uri = format!("/?{pair}").parse().ok()?;
        match Query::<T>::try_from_uri(&uri) {
            Ok(_) => None,
            Err(_) => pair.split('=').next().map(str::to_string),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dto::PageQuery;

    #[test]
    fn serde_messages_name_their_field() {
        let (field, message) = data_error_field(
            "type: unknown variant `devolucion`, expected one of `entrada`, `salida` at line 1 column 31",
        );
        assert_eq!(field, "type");
        assert!(message.contains("devolucion"));
        assert!(!message.contains("line 1"));

        let (field, message) = data_error_field("missing field `price` at line 1 column 40");
        assert_eq!((field.as_str(), message.as_str()), ("price", "price is required"));

        let (field, _) = data_error_field("invalid type: string \"x\", expected a map");
        assert_eq!(field, "body");
    }

    #[test]
    fn query_blame_lands_on_the_bad_pair() {
        assert_eq!(failing_query_key::<PageQuery>("per_page=5&page=abc").as_deref(), Some("page"));
        assert_eq!(failing_query_key::<PageQuery>("page=2"), None);
    }
}
