use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dve_model::ModelError;
use dve_publish::{PreflightOutcome, PublishError};
use dve_store::StoreError;
use serde_json::{json, Value};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Preflight blocked publish.")]
    PreflightBlocked(Box<PreflightOutcome>),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PreflightBlocked(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::PreflightBlocked(_) => "PREFLIGHT_BLOCKED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.to_string(),
            "code": self.code(),
        });
        if let (Self::PreflightBlocked(outcome), Some(fields)) = (self, body.as_object_mut()) {
            if let Ok(Value::Object(diagnostics)) = serde_json::to_value(outcome.as_ref()) {
                fields.extend(diagnostics);
            }
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(message) = &self {
            tracing::error!(%message, "request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Validation(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Store(err) => err.into(),
            PublishError::NotFound(message) => Self::NotFound(message),
            PublishError::NoRollbackTarget => Self::BadRequest(PublishError::NoRollbackTarget.to_string()),
            PublishError::PreflightBlocked(outcome) => Self::PreflightBlocked(outcome),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dve_publish::{OverlayDiagnostics, PreflightReport};

    #[test]
    fn test_store_errors_map_to_status() {
        let not_found: ApiError = StoreError::not_found("Revision not found.").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let invalid: ApiError = StoreError::validation("Selector is required.").into();
        assert_eq!(invalid.code(), "BAD_REQUEST");
        assert_eq!(invalid.to_string(), "Selector is required.");
    }

    #[test]
    fn test_blocked_body_carries_diagnostics() {
        let outcome = PreflightOutcome::new(
            PreflightReport {
                safe: false,
                score: 60,
                blockers: vec!["Page has no <body> element.".into()],
                warnings: Vec::new(),
            },
            OverlayDiagnostics::default(),
        );
        let err: ApiError = PublishError::PreflightBlocked(Box::new(outcome)).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let body = err.body();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "PREFLIGHT_BLOCKED");
        assert_eq!(body["message"], "Preflight blocked publish.");
        assert_eq!(body["safe"], false);
        assert_eq!(body["score"], 60);
        assert_eq!(body["blockers"][0], "Page has no <body> element.");
        assert_eq!(body["dveDiagnostics"]["unresolvedElements"], 0);
    }
}
