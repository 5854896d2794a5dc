use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::DomainError;
use serde_json::json;
use tracing::{error, warn};

/// Seconds a client should wait before retrying a file that is not on disk yet.
const NOT_ALLOCATED_RETRY_AFTER: &str = "2";

/// A [`DomainError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::InvalidMagnet(_) | DomainError::InvalidInfoHash(_) => StatusCode::BAD_REQUEST,
            DomainError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::EngineRejected(_) => StatusCode::BAD_GATEWAY,
            DomainError::NotFound(_) | DomainError::NotYetAllocated(_) => StatusCode::NOT_FOUND,
            DomainError::RangeUnsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            DomainError::PathTraversal(_) => StatusCode::FORBIDDEN,
            DomainError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("❌ {}", self.0);
            } else {
                warn!("⚠️ {}", self.0);
            }
        }

        let body = Json(json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        let mut response = (status, body).into_response();

        match &self.0 {
            DomainError::NotYetAllocated(_) => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static(NOT_ALLOCATED_RETRY_AFTER));
            }
            DomainError::RangeUnsatisfiable { size } => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                    response.headers_mut().insert(header::CONTENT_RANGE, value);
                }
            }
            _ => {}
        }
        response
    }
}
