//! Error-to-HTTP-response mapping (§7).

use crate::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Wraps [`Error`] so it can be returned directly from an `axum` handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ExternalProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::MalformedLlmOutput(_) => StatusCode::BAD_GATEWAY,
            Error::BackendError { .. } | Error::TransactionAbort(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        (status, Json(ErrorBody { detail: self.0.to_string() })).into_response()
    }
}
