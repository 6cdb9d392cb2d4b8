//! Interaction records — one user/assistant exchange in the journal.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single logged exchange. Immutable once created; its identity is its
/// position in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// When the exchange completed. Written as RFC 3339; read back from
    /// any ISO 8601 form, with offset-less times taken as UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// What the user said
    pub user: String,

    /// The final answer the assistant gave
    pub ai: String,
}

impl InteractionRecord {
    /// Create a record stamped with the current time.
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.into(),
            ai: ai.into(),
        }
    }
}

/// Parse an ISO 8601 timestamp with or without a UTC offset.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{text}'")))
}

/// The last `count` records, oldest first.
///
/// Returns the whole slice when `count` covers it.
pub fn tail(records: &[InteractionRecord], count: usize) -> &[InteractionRecord] {
    let start = records.len().saturating_sub(count);
    &records[start..]
}
