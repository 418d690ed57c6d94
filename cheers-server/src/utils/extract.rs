//! JSON Body Extractor
//!
//! `axum::Json` rejects malformed bodies with a plain-text 4xx. [`AppJson`]
//! answers with the unified `ApiResponse` envelope instead (400 `ValidationFailed`).

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use super::AppError;

/// JSON body whose rejection is an [`AppError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    tracing::debug!(status = %rejection.status(), error = %rejection.body_text(), "JSON body rejected");
    AppError::validation(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;
    use shared::error::ErrorCode;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Grant {
        user_id: String,
        sticker_id: String,
    }

    fn json_request(body: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_well_formed_body_is_extracted() {
        let AppJson(grant) = AppJson::<Grant>::from_request(json_request(r#"{"userId":"u1","stickerId":"s"}"#), &())
            .await
            .unwrap();
        assert_eq!(grant.user_id, "u1");
        assert_eq!(grant.sticker_id, "s");
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let err = AppJson::<Grant>::from_request(json_request(r#"{"userId":"u1"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.http_status(), http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("stickerId"));
    }

    #[tokio::test]
    async fn test_syntax_error_and_missing_content_type() {
        let err = AppJson::<Grant>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"userId":"u1","stickerId":"s"}"#))
            .unwrap();
        let err = AppJson::<Grant>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
