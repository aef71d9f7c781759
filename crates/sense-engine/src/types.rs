//! Identity, identifier and payload model types

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Account credential every request is issued under
///
/// Opaque to the client. It is rejected locally only when blank or when it
/// contains control characters, since it travels both as a header value and
/// as a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Validate and wrap an identity value
    pub fn new(value: impl Into<String>) -> EngineResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EngineError::configuration("identity must not be empty"));
        }
        if value.chars().any(char::is_control) {
            return Err(EngineError::configuration(
                "identity must not contain control characters",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(
    /// Server-assigned resource identifier
    ResourceId
);
opaque_id!(
    /// Server-assigned stream identifier
    StreamId
);
opaque_id!(
    /// Server-assigned parser identifier
    ParserId
);

/// Resource creation/update payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    /// Free-text label, not required to be unique
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// URL the platform polls for raw data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_url: Option<String>,

    /// Polling period in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_period: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_authentication_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
}

impl NewResource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// Stream creation/update payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStream {
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Value type, e.g. `D` for numeric streams
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_access: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_search: Option<bool>,

    /// Number of points the platform retains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_size: Option<u64>,

    /// Streams this one is derived from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub antecedents: Vec<StreamId>,
}

impl NewStream {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }
}

/// Parser creation/update payload
///
/// The parser is addressed by resource, but its owning stream travels in
/// the body as `stream_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParser {
    pub stream_id: StreamId,

    /// How to interpret incoming payloads, e.g. a JSON path
    pub input_parser: String,

    /// Content type of raw input, e.g. `application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeformat: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_group: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_group: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_points: Option<u32>,
}

impl NewParser {
    pub fn new(stream_id: impl Into<StreamId>, input_parser: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            input_parser: input_parser.into(),
            input_type: None,
            timeformat: None,
            data_group: None,
            time_group: None,
            number_of_points: None,
        }
    }
}

/// A single stream measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Measured value; the platform stores numbers and strings alike
    pub value: serde_json::Value,

    /// Milliseconds since the epoch; assigned by the platform when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl DataPoint {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: value.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Filter for stream data reads
///
/// Without `from` the platform returns the most recent `limit` points
/// (50 when unset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub limit: Option<u32>,
    pub from: Option<i64>,
    pub until: Option<i64>,
}

impl DataQuery {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn since(mut self, from: i64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    /// Query pairs in the order the platform documents them
    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(from) = self.from {
            pairs.push(("from", from.to_string()));
        }
        if let Some(until) = self.until {
            pairs.push(("until", until.to_string()));
        }
        pairs
    }
}

/// Minimal view of an entity in a list response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitySummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
}

/// Identifiers may be serialized as JSON numbers; keep them opaque strings
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_rejects_blank() {
        assert!(Identity::new("").is_err());
        assert!(Identity::new("   ").is_err());
        assert!(Identity::new("1\n").is_err());
        assert_eq!(Identity::new("1").unwrap().as_str(), "1");
    }

    #[test]
    fn test_ids_stay_opaque() {
        let id = ResourceId::from("007");
        assert_eq!(id.to_string(), "007");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("007"));
    }

    #[test]
    fn test_parser_payload_keeps_stream_id() {
        let parser = NewParser::new("S", "/tets");
        assert_eq!(
            serde_json::to_value(&parser).unwrap(),
            json!({"stream_id": "S", "input_parser": "/tets"})
        );
    }

    #[test]
    fn test_stream_type_field_name() {
        let stream = NewStream {
            stream_type: Some("D".into()),
            ..NewStream::new("light measure")
        };
        assert_eq!(
            serde_json::to_value(&stream).unwrap(),
            json!({"description": "light measure", "type": "D"})
        );
    }

    #[test]
    fn test_data_point_timestamp_optional() {
        assert_eq!(
            serde_json::to_value(DataPoint::new("3113")).unwrap(),
            json!({"value": "3113"})
        );
        assert_eq!(
            serde_json::to_value(DataPoint::new(21.5).at(1_700_000_000_000)).unwrap(),
            json!({"value": 21.5, "timestamp": 1_700_000_000_000i64})
        );
    }

    #[test]
    fn test_data_query_pairs() {
        assert!(DataQuery::default().pairs().is_empty());
        let pairs = DataQuery::default().until(20).limit(5).since(10).pairs();
        assert_eq!(
            pairs,
            vec![
                ("limit", "5".to_string()),
                ("from", "10".to_string()),
                ("until", "20".to_string())
            ]
        );
    }

    #[test]
    fn test_entity_summary_accepts_numeric_ids() {
        let list: Vec<EntitySummary> =
            serde_json::from_value(json!([{"id": 12, "label": "a"}, {"id": "x9"}])).unwrap();
        assert_eq!(list[0].id, "12");
        assert_eq!(list[1].id, "x9");
        assert!(serde_json::from_value::<EntitySummary>(json!({"id": null})).is_err());
    }
}
