use crate::error::ApiError;
use application::ServedFile;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// 206 with `Content-Range` for a ranged request, 200 otherwise. A HEAD
/// request gets the same headers without reading the file.
pub fn file_response(served: ServedFile, chunk_size: usize, head_only: bool) -> Response {
    let status = if served.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, served.content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, served.content_length());
    if let Some(range) = served.range {
        builder = builder.header(header::CONTENT_RANGE, range.content_range_header(served.total_size));
    }

    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(served.into_byte_stream(chunk_size))
    };

    builder
        .body(body)
        .unwrap_or_else(|e| ApiError(DomainError::Io(e.to_string())).into_response())
}
