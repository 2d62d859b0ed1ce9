use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::types::device::EndpointParseError;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store returned an unreadable response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no push delivery credentials are configured")]
    Missing,
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error("malformed service account: {0}")]
    MalformedServiceAccount(String),
    #[error("failed to sign token assertion: {0}")]
    Signing(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("push service rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("push request failed: {0}")]
    Transport(String),
    #[error("credential does not match the {0} endpoint")]
    CredentialMismatch(&'static str),
    #[error("managed push is not configured with a project id")]
    Unconfigured,
    #[error("send timed out")]
    TimedOut,
    #[error("malformed device record: {0}")]
    Malformed(#[from] EndpointParseError),
}

/// Request-level failure of the notification entry point and the
/// registration routes. Delivery failures never end up here.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Internal(String),
}

impl NotifyError {
    pub fn status(&self) -> StatusCode {
        match self {
            NotifyError::Validation(_) => StatusCode::BAD_REQUEST,
            NotifyError::NotFound(_) => StatusCode::NOT_FOUND,
            NotifyError::Lookup(_) | NotifyError::Credential(_) | NotifyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn status__should_map_taxonomy_to_http_codes() {
        assert_eq!(
            NotifyError::Validation("bad".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NotifyError::from(LookupError::Transport("down".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            NotifyError::from(CredentialError::Missing).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
