use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a successful (201) Zendesk "create ticket" response.
/// Only the `audit` part is relayed back to the caller.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketResponse {
    pub ticket: CreatedTicket,
    pub audit: TicketAudit,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatedTicket {
    pub url: String,
    pub id: i64,
    pub ticket_form_id: i64,
}

/// The creation event of a ticket: who created it, when, and from where.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TicketAudit {
    #[serde(skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub ticket_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_zero")]
    pub author_id: i64,
    pub metadata: AuditMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditMetadata {
    pub system: SubmitterLocation,
    pub custom: Map<String, Value>,
}

/// Geolocation the helpdesk inferred for the submitter.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubmitterLocation {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub latitude: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub longitude: f64,
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

impl TicketResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        serde_path_to_error::deserialize(&mut deserializer)
    }

    /// A 201 without an audit id carries nothing worth relaying.
    pub fn is_empty(&self) -> bool {
        self.audit.id == 0
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE: &str = r#"{
    "ticket": {
        "url": "https://landg.zendesk.com/api/v2/tickets/39.json",
        "id": 39,
        "external_id": null,
        "created_at": "2017-10-25T18:32:55Z",
        "updated_at": "2017-10-25T18:32:55Z",
        "due_at": null,
        "ticket_form_id": 114093996871
    },
    "audit": {
        "id": 133382282992,
        "ticket_id": 39,
        "created_at": "2017-10-25T18:32:55Z",
        "author_id": 115428050612,
        "metadata": {
            "system": {
                "ip_address": "2.122.25.146",
                "location": "Solihull, M2, United Kingdom",
                "latitude": 52.41669999999999,
                "longitude": -1.783299999999997
            },
            "custom": {}
        }
    }
}"#;
