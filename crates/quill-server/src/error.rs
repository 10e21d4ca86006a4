use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_sdk::SdkError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("missing {0} header")]
    MissingOwner(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Sdk(err) => match err {
                SdkError::Validation { .. } => StatusCode::BAD_REQUEST,
                SdkError::NotFound(_) => StatusCode::NOT_FOUND,
                SdkError::Conflict(_) | SdkError::InvalidState(_) | SdkError::SessionExpired(_) => {
                    StatusCode::CONFLICT
                }
                SdkError::PasswordMismatch => StatusCode::FORBIDDEN,
                SdkError::Network { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SdkError::Anchor { .. } => StatusCode::BAD_GATEWAY,
                SdkError::Storage { .. } | SdkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MissingOwner(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sdk(err) => match err {
                SdkError::Validation { .. } => "validation",
                SdkError::Network { .. } => "network",
                SdkError::Anchor { .. } => "anchor",
                SdkError::Conflict(_) => "conflict",
                SdkError::NotFound(_) => "not_found",
                SdkError::Storage { .. } => "storage",
                SdkError::PasswordMismatch => "password_mismatch",
                SdkError::SessionExpired(_) => "session_expired",
                SdkError::InvalidState(_) => "invalid_state",
                SdkError::Internal(_) => "internal",
            },
            Self::MissingOwner(_) => "unauthenticated",
            Self::BadRequest(_) => "bad_request",
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let field = match &self {
            Self::Sdk(SdkError::Validation { field, .. }) => Some(*field),
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quill_anchor::AnchorError;

    #[test]
    fn sdk_errors_map_to_statuses() {
        let cases = [
            (SdkError::validation("name", "is required"), StatusCode::BAD_REQUEST),
            (SdkError::NotFound("document".into()), StatusCode::NOT_FOUND),
            (SdkError::Conflict("lease".into()), StatusCode::CONFLICT),
            (
                SdkError::network("reading marker")(AnchorError::Network("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SdkError::anchor("anchoring")(AnchorError::Submission("no funds".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (SdkError::PasswordMismatch, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_owner_is_unauthorized() {
        let err = ServerError::MissingOwner("x-quill-owner");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "missing x-quill-owner header");
    }
}
