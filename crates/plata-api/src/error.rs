use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plata_core::remote::RemoteError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Sync backend error: {0}")]
    External(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }
}

impl From<plata_core::Error> for AppError {
    fn from(err: plata_core::Error) -> Self {
        match err {
            plata_core::Error::NotFound(what) => Self::NotFound(what),
            plata_core::Error::InvalidInput(message) => Self::BadRequest(message),
            // CSV failures come from decoding external sheet data, so they
            // surface like other upstream format errors
            plata_core::Error::Csv(e) => Self::External(e.to_string()),
            plata_core::Error::Remote(remote) => Self::from(remote),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotConfigured(message) => Self::BadRequest(message),
            other => Self::External(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_statuses() {
        let not_found: AppError = plata_core::Error::NotFound("x".to_string()).into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let bad: AppError = plata_core::Error::InvalidInput("x".to_string()).into();
        assert!(matches!(bad, AppError::BadRequest(_)));

        let remote: AppError = RemoteError::Api("HTTP 500".to_string()).into();
        assert!(matches!(remote, AppError::External(_)));

        let unconfigured: AppError = RemoteError::NotConfigured("x".to_string()).into();
        assert!(matches!(unconfigured, AppError::BadRequest(_)));
    }

    #[test]
    fn test_csv_decode_errors_are_bad_gateway() {
        // A ragged record makes the csv crate fail when not reading flexibly
        let csv_err = csv::ReaderBuilder::new()
            .from_reader(&b"a,b\n1"[..])
            .into_records()
            .next()
            .unwrap()
            .unwrap_err();

        let mapped: AppError = plata_core::Error::from(csv_err).into();
        assert!(matches!(mapped, AppError::External(_)));
    }
}
