use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{AppError, FieldError};

/// JSON body that has been both deserialized and validated. Malformed bodies
/// and rule violations both surface as [`AppError::Validation`], so a handler
/// never sees partially valid input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    AppError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Probe {
        #[validate(range(min = 1, max = 10))]
        severity: i32,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_valid_body() {
        let ValidatedJson(probe) = ValidatedJson::<Probe>::from_request(json_request(r#"{"severity":3}"#), &())
            .await
            .unwrap();
        assert_eq!(probe.severity, 3);
    }

    #[tokio::test]
    async fn test_rule_violation_is_validation_error() {
        let err = ValidatedJson::<Probe>::from_request(json_request(r#"{"severity":0}"#), &())
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields[0].field, "severity"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let err = ValidatedJson::<Probe>::from_request(json_request(r#"{"severity":"high"}"#), &())
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields[0].field, "body"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
