//! Error types for the docforge server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use convert_core::JobError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Job(err) => match err {
                JobError::Validation(_)
                | JobError::UnsafeFileType { .. }
                | JobError::NotAPdf { .. }
                | JobError::WrongPassword
                | JobError::NotEncrypted => StatusCode::BAD_REQUEST,
                JobError::UnsupportedConversion { gap: true, .. } => StatusCode::NOT_IMPLEMENTED,
                JobError::UnsupportedConversion { gap: false, .. } => StatusCode::BAD_REQUEST,
                JobError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                JobError::ConversionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                JobError::ArtifactExpiredOrMissing => StatusCode::NOT_FOUND,
                JobError::ConversionFailure(_) | JobError::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(err) => err.status(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Job(err) => err.code(),
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "PAYLOAD_TOO_LARGE"
            }
            ApiError::Multipart(_) => "INVALID_UPLOAD",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_is_not_implemented() {
        let err = ApiError::from(JobError::UnsupportedConversion {
            message: "PDF to PDF is not supported".into(),
            gap: true,
        });
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(err.code(), "NOT_IMPLEMENTED");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (JobError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (JobError::WrongPassword, StatusCode::BAD_REQUEST),
            (
                JobError::PayloadTooLarge {
                    file_name: "a.pdf".into(),
                    limit: 1,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (JobError::ConversionFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (JobError::ConversionTimeout(300), StatusCode::GATEWAY_TIMEOUT),
            (JobError::ArtifactExpiredOrMissing, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
