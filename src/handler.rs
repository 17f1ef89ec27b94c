use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StoreErrorPolicy;
use crate::error::{ErrorResponse, TicketError, respond_error};
use crate::models::{
    dedup::{DedupGuard, Submission},
    helpdesk_api::HelpdeskClient,
    secrets::CredentialProvider,
    ticket_request::TicketDetails,
};

/// Everything a request needs, wired up once at startup.
pub struct AppState {
    pub dedup: DedupGuard,
    pub on_store_error: StoreErrorPolicy,
    pub credentials: Arc<dyn CredentialProvider>,
    pub helpdesk: HelpdeskClient,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(register_ticket))
        .route("/tickets", post(register_ticket))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4(), event_id))]
pub async fn register_ticket(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Oversized or unreadable bodies get the extractor's status in the usual error shape.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(status = rejection.status().as_u16(), "cannot read request body");
            return respond_error(rejection.status(), rejection.body_text());
        }
    };

    match forward_ticket(&state, body).await {
        Ok(reply) => reply,
        Err(error) => error.into_response(),
    }
}

async fn forward_ticket(state: &AppState, body: Bytes) -> Result<Response, TicketError> {
    let details = TicketDetails::from_slice(&body)
        .map_err(|e| TicketError::MalformedRequest(e.to_string()))?;

    let event_id = details.event_id();
    tracing::Span::current().record("event_id", event_id);
    info!("Submission ID to be validated: {:?}", event_id);

    match state.dedup.check_and_mark(event_id).await {
        Submission::New => {}
        Submission::Duplicate => {
            return Ok((StatusCode::OK, Json(ErrorResponse::duplicate())).into_response());
        }
        Submission::Unknown(error) => match state.on_store_error {
            StoreErrorPolicy::FailOpen => {
                warn!(%error, "duplicate check unavailable, forwarding anyway");
            }
            StoreErrorPolicy::FailClosed => return Err(error.into()),
        },
    }

    let credentials = state.credentials.get_credentials().await?;
    let audit = state.helpdesk.create_ticket(body, &credentials).await?;

    Ok((StatusCode::OK, Json(audit)).into_response())
}
