//! HTTP middleware: request ID, API key authentication and rate limiting.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Error response for a request rejected by middleware, tagged with its
/// request id.
pub(crate) fn reject<B>(request: &Request<B>, error: nb_core::Error) -> Response {
    let mut err = AppError::new(error);
    if let Some(id) = request.extensions().get::<RequestId>() {
        err = err.with_request_id(id.as_str().to_owned());
    }
    err.into_response()
}
