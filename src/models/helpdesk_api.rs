use std::time::Duration;

use axum::body::Bytes;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use tracing::{debug, info, warn};
use url::Url;

use super::secrets::Credentials;
use super::ticket_response::{TicketAudit, TicketResponse};
use crate::config::HelpdeskConfig;
use crate::error::TicketError;

/// Client for the helpdesk "create ticket" endpoint.
#[derive(Clone)]
pub struct HelpdeskClient {
    client: Client,
    endpoint: Url,
}

impl HelpdeskClient {
    pub fn new(config: &HelpdeskConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Forwards the submission body untouched and returns the audit of the created ticket.
    pub async fn create_ticket(
        &self,
        body: Bytes,
        credentials: &Credentials,
    ) -> Result<TicketAudit, TicketError> {
        debug!("Helpdesk Request URL: {}", self.endpoint);

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(&credentials.api_key, Some(&credentials.api_password))
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            warn!(status = status.as_u16(), "helpdesk did not create the ticket");
            return Err(match status {
                StatusCode::UNAUTHORIZED => TicketError::RemoteUnauthorized,
                status => TicketError::RemoteRejected(status),
            });
        }

        let body = resp.bytes().await?;
        let ticket = TicketResponse::from_slice(&body)
            .map_err(|e| TicketError::RemoteResponseMalformed(e.to_string()))?;
        if ticket.is_empty() {
            return Err(TicketError::RemoteResponseMalformed(
                "helpdesk response carries no ticket audit".to_string(),
            ));
        }

        info!(
            ticket_id = ticket.ticket.id,
            ticket_url = %ticket.ticket.url,
            ticket_form_id = ticket.ticket.ticket_form_id,
            audit_id = ticket.audit.id,
            "Helpdesk ticket created"
        );
        Ok(ticket.audit)
    }
}
