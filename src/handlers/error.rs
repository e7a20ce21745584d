// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::api_client::BackendError;
use crate::BoxError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status,
        }
    }

    pub fn not_ready(section: &str) -> Self {
        Self::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{} not loaded yet", section),
        )
    }

    /// Failure talking to the property backend or Overpass. Client errors the
    /// backend reports (bad CSV, ...) keep their status and message.
    pub fn external_error(err: &BoxError) -> Self {
        match err.downcast_ref::<BackendError>() {
            Some(backend) => {
                let status = StatusCode::from_u16(backend.status)
                    .ok()
                    .filter(StatusCode::is_client_error)
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                Self::with_status(status, backend.detail.clone())
            }
            None => Self::with_status(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_client_errors_pass_through() {
        let err: BoxError = BackendError {
            status: 400,
            detail: "No valid properties found in the CSV file".to_string(),
        }
        .into();
        let api = ApiError::external_error(&err);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "No valid properties found in the CSV file");
    }

    #[test]
    fn other_failures_are_bad_gateway() {
        let server: BoxError = BackendError { status: 500, detail: "db down".to_string() }.into();
        assert_eq!(ApiError::external_error(&server).status, StatusCode::BAD_GATEWAY);

        let network: BoxError = "connection refused".into();
        let api = ApiError::external_error(&network);
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api.to_string(), "connection refused");
    }
}
