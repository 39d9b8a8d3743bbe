//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::models::enums::EnquiryStatus;
use crate::workflow::WorkflowError;

/// Error response body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot move enquiry from {from} to {to}")]
    IllegalTransition { from: EnquiryStatus, to: EnquiryStatus },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    AlreadyResponded(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::AlreadyResponded(_) => "ALREADY_RESPONDED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized => "AUTH_REQUIRED",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::IllegalTransition { .. }
            | ApiError::AlreadyResponded(_)
            | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::RateLimited { retry_after } => {
                format!("Rate limit exceeded. Retry after {retry_after}s")
            }
            other => other.to_string(),
        };

        let body = ErrorBody { code: self.code(), message };
        let mut response = (self.status(), Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => ApiError::Validation(msg),
            WorkflowError::IllegalTransition { from, to } => ApiError::IllegalTransition { from, to },
            WorkflowError::Forbidden(msg) => ApiError::Forbidden(msg),
            e @ WorkflowError::AlreadyResponded(_) => ApiError::AlreadyResponded(e.to_string()),
            e @ WorkflowError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            WorkflowError::Conflict(msg) => ApiError::Conflict(msg),
            WorkflowError::Storage(detail) => ApiError::Internal(detail),
            WorkflowError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::from(WorkflowError::from(err))
    }
}

/// Malformed or incomplete JSON bodies are validation failures.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401_flat_body() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "AUTH_REQUIRED");
        assert_eq!(json["message"], "Authentication required");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        assert_eq!(body_json(response).await["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn workflow_errors_map_to_codes() {
        let cases: Vec<(WorkflowError, StatusCode, &str)> = vec![
            (WorkflowError::validation("bad"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (
                WorkflowError::IllegalTransition {
                    from: EnquiryStatus::Completed,
                    to: EnquiryStatus::Forwarded,
                },
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
            ),
            (WorkflowError::forbidden("no"), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (WorkflowError::AlreadyResponded(Uuid::nil()), StatusCode::CONFLICT, "ALREADY_RESPONDED"),
            (WorkflowError::not_found("Enquiry", "x"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (WorkflowError::Conflict("busy".into()), StatusCode::CONFLICT, "CONFLICT"),
            (WorkflowError::Storage("io".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        ];
        for (err, status, code) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
            assert_eq!(body_json(response).await["code"], code);
        }
    }

    #[tokio::test]
    async fn illegal_transition_message_names_states() {
        let response = ApiError::IllegalTransition {
            from: EnquiryStatus::Approved,
            to: EnquiryStatus::Forwarded,
        }
        .into_response();
        let json = body_json(response).await;
        assert_eq!(json["message"], "Cannot move enquiry from APPROVED to FORWARDED");
    }
}
