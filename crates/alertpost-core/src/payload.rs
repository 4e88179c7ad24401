//! The JSON document POSTed for every alert.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{AlertEvent, Level};

/// Wire format of a delivered alert. Field names and encodings are fixed:
/// `time` is RFC 3339 and `duration` is an integer count of nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub id: String,
    pub message: String,
    pub details: String,
    pub time: DateTime<Utc>,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    pub level: Level,
    pub data: serde_json::Value,
}

impl AlertPayload {
    pub fn from_event(event: &AlertEvent) -> Self {
        Self {
            id: event.id.clone(),
            message: event.message.clone(),
            details: event.details.clone(),
            time: event.time,
            duration: event.duration,
            level: event.level,
            data: event.result.clone(),
        }
    }
}

impl From<&AlertEvent> for AlertPayload {
    fn from(event: &AlertEvent) -> Self {
        Self::from_event(event)
    }
}

/// Serializes a [`Duration`] as integer nanoseconds.
pub mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}
