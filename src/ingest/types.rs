// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// One upstream financial-calendar record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarRow {
    #[serde(deserialize_with = "key_text")]
    pub key: String,
    #[serde(default)]
    pub values: CalendarValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarValues {
    #[serde(rename = "TICKER", default, deserialize_with = "text_or_number")]
    pub ticker: Option<String>,
    #[serde(rename = "OSE_ITEM_SECTOR", default, deserialize_with = "text_or_number")]
    pub sector: Option<String>,
    #[serde(rename = "CALENDAR_EVENT_URL", default, deserialize_with = "text_or_number")]
    pub event_url: Option<String>,
    /// `YYYYMMDD`
    #[serde(rename = "CALENDAR_EVENT_DATE", default, deserialize_with = "text_or_number")]
    pub event_date: Option<String>,
    #[serde(rename = "CALENDAR_EVENT_HEADING", default, deserialize_with = "text_or_number")]
    pub event_heading: Option<String>,
}

// The feed is not consistent about quoting numeric-looking values (dates especially).
fn text_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn key_text<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "row key must be a string or number, got {other}"
        ))),
    }
}

#[async_trait::async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<CalendarRow>>;
    fn name(&self) -> &'static str;
}
