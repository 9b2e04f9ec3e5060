//! JSON body extractor that reports which field failed.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::errors::{AppError, AppResult};

/// Field-level checks run after a payload deserializes.
pub trait Validate {
    fn validate(&self) -> AppResult<()>;
}

/// Like `axum::Json`, but rejections are `AppError`s: syntax errors are
/// 400, type and range errors are 422 naming the offending field.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let value = parse_body::<T>(&bytes)?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<T> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);

    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let field = match err.path().to_string() {
            path if path == "." => "body".to_string(),
            path => path,
        };
        let inner = err.into_inner();
        if inner.is_syntax() || inner.is_eof() {
            AppError::bad_request(format!("malformed JSON: {inner}"))
        } else {
            AppError::validation(field, inner.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Payload {
        priority: Option<i64>,
        description: Option<String>,
    }

    #[test]
    fn type_errors_name_the_field() {
        let err = parse_body::<Payload>(br#"{"priority": "high"}"#).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "priority"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_are_bad_requests() {
        let err = parse_body::<Payload>(br#"{"priority": "#).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
