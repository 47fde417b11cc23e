//! Outbound event envelope

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::messages::{frame, EVENT_TAG};

/// Delivery priority of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// The JSON body of an `E` message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub uuid: String,
    pub priority: Priority,
    pub post_date: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_object: Option<Value>,
}

impl EventEnvelope {
    /// Envelope stamped with the current local time
    pub fn new(
        event_id: &str,
        uuid: &str,
        priority: Priority,
        correlation_id: Option<&str>,
        data_object: Option<Value>,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            uuid: uuid.to_string(),
            priority,
            post_date: post_date(&Local::now()),
            correlation_id: correlation_id_or_new(correlation_id),
            data_object,
        }
    }

    /// `E <json>`
    pub fn to_wire(&self) -> serde_json::Result<String> {
        Ok(frame(EVENT_TAG, &serde_json::to_string(self)?))
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmm+HH:MM`
pub fn post_date(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

pub fn correlation_id_or_new(given: Option<&str>) -> String {
    match given {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_envelope_field_order() {
        let env = EventEnvelope {
            event_id: "E1".into(),
            uuid: "u-1".into(),
            priority: Priority::High,
            post_date: "2024-01-02T03:04:05.006+01:00".into(),
            correlation_id: "abc-123".into(),
            data_object: Some(json!(5)),
        };

        assert_eq!(
            env.to_wire().unwrap(),
            r#"E {"eventId":"E1","uuid":"u-1","priority":2,"postDate":"2024-01-02T03:04:05.006+01:00","correlationId":"abc-123","dataObject":5}"#
        );
    }

    #[test]
    fn test_empty_envelope_omits_data_object() {
        let env = EventEnvelope::new("E0", "u", Priority::Low, Some("c"), None);
        let value: Value = serde_json::to_value(&env).unwrap();

        assert!(value.get("dataObject").is_none());
        assert_eq!(value["priority"], json!(0));
    }

    #[test]
    fn test_correlation_id_default_is_uuid() {
        let id = correlation_id_or_new(None);
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(correlation_id_or_new(Some("abc-123")), "abc-123");
    }

    #[test]
    fn test_post_date_format() {
        let at = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let s = post_date(&at);

        assert!(s.starts_with("2024-05-06T07:08:09.000"));
        let offset = &s[23..];
        assert_eq!(offset.len(), 6);
        assert!(offset.starts_with('+') || offset.starts_with('-'));
        assert_eq!(&offset[3..4], ":");
    }
}
