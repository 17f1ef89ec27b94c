use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{dedup::DedupError, secrets::CredentialError};

/// Body written for every failure, and for the duplicate notice.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Submission was already forwarded once.
    pub fn duplicate() -> Self {
        Self::new(208, "ticket Already created")
    }
}

/// Builds the JSON error reply. Every failure path ends here, exactly once.
pub fn respond_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse::new(status.as_u16(), message);
    (status, Json(body)).into_response()
}

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("dedup store unavailable: {0}")]
    DedupStoreUnavailable(#[from] DedupError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("{0}")]
    RemoteTransport(#[from] reqwest::Error),

    #[error("Unauthorized")]
    RemoteUnauthorized,

    #[error("error creating tickets")]
    RemoteRejected(StatusCode),

    #[error("{0}")]
    RemoteResponseMalformed(String),
}

impl TicketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TicketError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            TicketError::DedupStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TicketError::Credentials(_) => StatusCode::BAD_REQUEST,
            TicketError::RemoteTransport(_) => StatusCode::BAD_REQUEST,
            TicketError::RemoteUnauthorized => StatusCode::UNAUTHORIZED,
            // A success or redirect code cannot be relayed as an error status.
            TicketError::RemoteRejected(status)
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            TicketError::RemoteRejected(_) => StatusCode::BAD_GATEWAY,
            TicketError::RemoteResponseMalformed(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(error = %self, status = status.as_u16(), "ticket registration failed");
        respond_error(status, self.to_string())
    }
}
