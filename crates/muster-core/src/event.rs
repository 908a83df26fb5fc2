use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A human annotation recorded against a set of alerts, e.g. an incident note.
///
/// `alerts` holds alert fingerprints in their hex form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default() {
        let event: Event = serde_json::from_str(r#"{"comment": "db failover"}"#).unwrap();
        assert_eq!(event.id, 0);
        assert!(event.alerts.is_empty());
        assert_eq!(event.created_at, None);
        assert_eq!(event.comment, "db failover");
    }

    #[test]
    fn serializes_camel_case() {
        let event = Event {
            created_by: "alice".into(),
            ..Event::default()
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["createdBy"], "alice");
        assert!(json.get("createdAt").is_none());
    }
}
