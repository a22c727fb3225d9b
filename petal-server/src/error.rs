use axum::http::{HeaderValue, StatusCode, header::HeaderName};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use petal_core::error::ServiceError;

/// Response header carrying the one-phrase failure diagnostic.
pub static REASON_HEADER: HeaderName = HeaderName::from_static("x-reason");

/// Errors that can occur while starting the petal server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend failed to connect at startup.
    #[error("startup error: {0}")]
    Startup(String),
}

/// Newtype bridging [`ServiceError`] into HTTP responses: the mapped status
/// code, an empty body, and the diagnostic in `X-Reason`.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        reason_response(status, &self.0.to_string())
    }
}

/// A failure response: `status`, empty body, and `reason` in `X-Reason`.
pub fn reason_response(status: StatusCode, reason: &str) -> Response {
    let mut response = status.into_response();
    if let Ok(value) = HeaderValue::from_str(reason) {
        response.headers_mut().insert(REASON_HEADER.clone(), value);
    }
    response
}
