// src/ingest/providers/oslo_bors.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::SyncConfig;
use crate::ingest::types::{CalendarRow, CalendarSource};

const PRODUCT: &str = "financialCalendar";

/// Oslo Børs / OMS investor-relations financial calendar.
pub struct OsloBorsProvider {
    mode: Mode,
}

enum Mode {
    // Own copy of the body so tests can hand in any &str.
    Fixture(String),
    Http {
        endpoint: String,
        auth: String,
        client: reqwest::Client,
    },
}

impl OsloBorsProvider {
    pub fn from_config(cfg: &SyncConfig, client: reqwest::Client) -> Self {
        Self::from_url(&cfg.calendar_endpoint, &cfg.calendar_auth, client)
    }

    pub fn from_url(endpoint: &str, auth: &str, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                endpoint: endpoint.to_string(),
                auth: auth.to_string(),
                client,
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    async fn fetch_body(endpoint: &str, auth: &str, client: &reqwest::Client) -> Result<String> {
        // `start` doubles as a cache-buster.
        let start = chrono::Utc::now().timestamp_millis().to_string();
        let resp = client
            .get(endpoint)
            .query(&[("auth", auth), ("product", PRODUCT), ("start", start.as_str())])
            .send()
            .await
            .context("calendar http get()")?
            .error_for_status()
            .context("calendar non-2xx")?;
        resp.text().await.context("calendar http .text()")
    }
}

/// Pull the `rows` array out of a calendar response body.
///
/// A body without `rows` is an empty calendar; rows that fail to decode are
/// dropped one by one so a single odd record cannot empty the whole batch.
pub fn parse_rows(body: &str) -> Result<Vec<CalendarRow>> {
    let doc: Value = serde_json::from_str(body).context("parsing calendar json")?;
    let Some(rows) = doc.get("rows").and_then(Value::as_array) else {
        tracing::warn!(target: "sync", "calendar response has no `rows` array");
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(rows.len());
    for (idx, raw) in rows.iter().enumerate() {
        match serde_json::from_value::<CalendarRow>(raw.clone()) {
            Ok(row) => out.push(row),
            Err(e) => tracing::warn!(target: "sync", index = idx, error = %e, "skipping undecodable calendar row"),
        }
    }
    Ok(out)
}

#[async_trait]
impl CalendarSource for OsloBorsProvider {
    async fn fetch_rows(&self) -> Result<Vec<CalendarRow>> {
        match &self.mode {
            Mode::Fixture(body) => parse_rows(body),
            Mode::Http {
                endpoint,
                auth,
                client,
            } => {
                let body = Self::fetch_body(endpoint, auth, client).await?;
                parse_rows(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "oslo-bors"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_field_is_empty_not_error() {
        assert!(parse_rows(r#"{"status":"ok"}"#).unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_rows("<html>gateway timeout</html>").is_err());
    }

    #[test]
    fn undecodable_rows_are_skipped() {
        let body = r#"{"rows":[
            {"key":"A","values":{"TICKER":"AAA"}},
            {"values":{"TICKER":"no-key"}},
            {"key":"B","values":{}}
        ]}"#;
        let rows = parse_rows(body).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn numeric_keys_are_not_dropped() {
        let body = r#"{"rows":[{"key":98765,"values":{"TICKER":"NHY"}},{"key":"C","values":{}}]}"#;
        let rows = parse_rows(body).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["98765", "C"]);
    }

    #[tokio::test]
    async fn fixture_mode_parses_rows() {
        let p = OsloBorsProvider::from_fixture(
            r#"{"rows":[{"key":"K1","values":{"CALENDAR_EVENT_HEADING":"Q1 results","CALENDAR_EVENT_DATE":"20240425"}}]}"#,
        );
        let rows = p.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values.event_heading.as_deref(), Some("Q1 results"));
        assert_eq!(p.name(), "oslo-bors");
    }
}
