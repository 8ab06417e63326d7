use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nepi_core::{ExtractionResponse, IntakeError};

/// HTTP status for a failed intake request.
pub fn status_for(err: &IntakeError) -> StatusCode {
    match err {
        IntakeError::MissingSource | IntakeError::InvalidSource(_) | IntakeError::EmptySource => {
            StatusCode::BAD_REQUEST
        }
        IntakeError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        IntakeError::SourceFetch { .. } | IntakeError::Network(_) | IntakeError::Delegated(_) => {
            StatusCode::BAD_GATEWAY
        }
        IntakeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        IntakeError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An error rendered as `{ "ok": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let status = status_for(&err);
        if err.is_client_error() {
            tracing::warn!(status = status.as_u16(), error = %err, "rejected request");
        } else {
            tracing::error!(status = status.as_u16(), error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ExtractionResponse::failure(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_failure_class() {
        assert_eq!(status_for(&IntakeError::MissingSource), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&IntakeError::EmptySource), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&IntakeError::PayloadTooLarge { size: 2, max: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&IntakeError::SourceFetch {
                status: 404,
                url: "https://x.test/a.pdf".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&IntakeError::Timeout {
                stage: "remote fetch",
                secs: 30
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&IntakeError::Unexpected("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn timeout_is_distinct_from_upstream_failure() {
        let timeout = status_for(&IntakeError::Timeout {
            stage: "delegated extraction",
            secs: 45,
        });
        let delegated = status_for(&IntakeError::Delegated("HTTP 500".into()));
        assert_ne!(timeout, delegated);
    }
}
