use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Zendesk-compatible "create ticket" payload as sent by the submission forms.
/// The raw request body is what gets forwarded to the helpdesk; this structure
/// only validates the payload and exposes the submission identifier.
/// Absent and `null` fields both decode to their zero value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub ticket: Ticket,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ticket {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub ticket_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(deserialize_with = "null_as_default")]
    pub priority: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub comment: TicketComment,
    #[serde(deserialize_with = "null_as_default")]
    pub custom_fields: Vec<CustomField>,
    #[serde(deserialize_with = "null_as_default")]
    pub requester: Requester,
    #[serde(deserialize_with = "null_as_default")]
    pub ticket_form_id: i64,
    /// Submission identifier used for deduplication. Empty disables the check.
    #[serde(deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub token: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketComment {
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_body: String,
    /// Upload tokens of attachments
    #[serde(deserialize_with = "null_as_default")]
    pub uploads: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomField {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    pub value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Requester {
    #[serde(deserialize_with = "null_as_default")]
    pub locale_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub policy_number: String,
}

fn null_as_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: Deserializer<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TicketDetails {
    /// Decodes an inbound body, reporting the JSON path of the offending field on failure.
    /// A bare `null` body is an empty submission.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let details: Option<Self> = serde_path_to_error::deserialize(&mut deserializer)?;
        Ok(details.unwrap_or_default())
    }

    pub fn event_id(&self) -> &str {
        &self.ticket.event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "ticket": {
            "type": "incident",
            "subject": "My printer is on fire!",
            "priority": "urgent",
            "status": "new",
            "comment": {"html_body": "<p>The smoke is very colorful.</p>", "uploads": ["tok1"]},
            "custom_fields": [{"id": 360001, "value": "motor"}, {"id": 360002, "value": 12}],
            "requester": {
                "locale_id": 1176,
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": "+44 121 000",
                "policy_number": "P-123"
            },
            "ticket_form_id": 114093996871,
            "event_id": "sub-42",
            "token": "opaque",
            "submitted_at": "2017-10-25T18:30:00Z"
        }
    }"#;

    #[test]
    fn test_parse_full_request() {
        let details = TicketDetails::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(details.event_id(), "sub-42");
        assert_eq!(details.ticket.ticket_type, "incident");
        assert_eq!(details.ticket.comment.uploads, vec!["tok1".to_string()]);
        assert_eq!(details.ticket.custom_fields.len(), 2);
        assert_eq!(details.ticket.custom_fields[1].value, serde_json::json!(12));
        assert_eq!(details.ticket.requester.locale_id, 1176);
        assert_eq!(details.ticket.ticket_form_id, 114093996871);
        assert_eq!(
            details.ticket.submitted_at.unwrap().to_rfc3339(),
            "2017-10-25T18:30:00+00:00"
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let details =
            TicketDetails::from_slice(br#"{"ticket": {"subject": "hello"}}"#).unwrap();
        assert_eq!(details.ticket.subject, "hello");
        assert_eq!(details.event_id(), "");
        assert!(details.ticket.submitted_at.is_none());

        let details = TicketDetails::from_slice(b"{}").unwrap();
        assert_eq!(details.event_id(), "");
    }

    #[test]
    fn test_null_fields_default() {
        let details = TicketDetails::from_slice(
            br#"{"status": null, "ticket": {"subject": null, "event_id": null, "custom_fields": null,
                "comment": null, "requester": {"name": null}, "ticket_form_id": null}}"#,
        )
        .unwrap();
        assert_eq!(details.event_id(), "");
        assert_eq!(details.ticket.subject, "");
        assert!(details.ticket.custom_fields.is_empty());
        assert_eq!(details.ticket.ticket_form_id, 0);

        let details = TicketDetails::from_slice(br#"{"ticket": null}"#).unwrap();
        assert_eq!(details.event_id(), "");

        let details = TicketDetails::from_slice(b"null").unwrap();
        assert_eq!(details.event_id(), "");
    }

    #[test]
    fn test_custom_field_without_id() {
        let details =
            TicketDetails::from_slice(br#"{"ticket": {"custom_fields": [{"value": "x"}]}}"#)
                .unwrap();
        assert_eq!(details.ticket.custom_fields[0].id, 0);
        assert_eq!(details.ticket.custom_fields[0].value, serde_json::json!("x"));
    }

    #[test]
    fn test_decode_errors() {
        // Premature end of input
        assert!(TicketDetails::from_slice(br#"{"ticket": {"subject": "#).is_err());
        assert!(TicketDetails::from_slice(b"").is_err());
        assert!(TicketDetails::from_slice(b"not json").is_err());

        // Wrong type reports the field path
        let err = TicketDetails::from_slice(br#"{"ticket": {"ticket_form_id": "abc"}}"#)
            .unwrap_err();
        assert_eq!(err.path().to_string(), "ticket.ticket_form_id");
        assert!(!err.to_string().is_empty());
    }
}
