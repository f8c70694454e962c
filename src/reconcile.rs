//! # Reconciler
//! Pure mapping from upstream calendar rows to destination writes, plus the
//! sequential executor that applies them.
//!
//! `plan_sync` does no I/O: it derives the display fields for every row and
//! decides create vs. update by case-insensitive natural key. `apply_plan`
//! issues the writes one at a time and keeps going past failures.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::cms::{CollectionItem, ItemFields, ItemStore};
use crate::ingest::types::CalendarRow;
use crate::observe::{SyncEvent, SyncObserver};

/// URL-safe slug: lower-case, runs of anything outside `[a-z0-9]` become one
/// hyphen, no hyphen at either end.
pub fn slugify(text: &str) -> String {
    static RE_INVALID: OnceCell<Regex> = OnceCell::new();
    let re = RE_INVALID.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug regex"));
    let lowered = text.to_lowercase();
    re.replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// `YYYYMMDD` → ISO-8601 at UTC midnight, millisecond precision.
pub fn format_event_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        bail!("event date {raw:?} is not YYYYMMDD");
    }
    let (y, m, d) = (&raw[0..4], &raw[4..6], &raw[6..8]);
    let Some(date) = NaiveDate::from_ymd_opt(y.parse()?, m.parse()?, d.parse()?) else {
        bail!("event date {raw:?} is not a calendar date");
    };
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    Ok(midnight.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn display_name(heading: &str, raw_date: &str) -> String {
    format!("{} - {}", heading.trim(), raw_date.trim())
}

/// Derive the destination fields for one row. Only presence is checked:
/// key, heading and date must be there, the rest is copied as-is.
pub fn build_fields(row: &CalendarRow) -> Result<ItemFields> {
    let key = row.key.trim();
    if key.is_empty() {
        bail!("row has an empty key");
    }
    let v = &row.values;
    let Some(heading) = v.event_heading.as_deref().filter(|s| !s.trim().is_empty()) else {
        bail!("missing CALENDAR_EVENT_HEADING");
    };
    let Some(raw_date) = v.event_date.as_deref().filter(|s| !s.trim().is_empty()) else {
        bail!("missing CALENDAR_EVENT_DATE");
    };

    let event_date = format_event_date(raw_date)?;
    let name = display_name(heading, raw_date);
    let slug = slugify(&name);

    Ok(ItemFields {
        key: key.to_string(),
        slug,
        name,
        ticker: v.ticker.clone(),
        sector: v.sector.clone(),
        event_url: v.event_url.clone(),
        event_date,
        event_heading: heading.trim().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Create {
        fields: ItemFields,
    },
    Update {
        item_id: String,
        fields: ItemFields,
    },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            SyncAction::Create { fields } | SyncAction::Update { fields, .. } => &fields.key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
    pub skipped: Vec<SkippedRow>,
}

impl SyncPlan {
    pub fn creates(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Create { .. }))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.actions.len() - self.creates()
    }
}

/// Lower-cased natural key → item. The first item wins when the collection
/// already holds duplicates.
pub fn index_by_key(items: &[CollectionItem]) -> HashMap<String, &CollectionItem> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        if let Some(k) = item.natural_key() {
            map.entry(k.to_lowercase()).or_insert(item);
        }
    }
    map
}

pub fn plan_sync(rows: &[CalendarRow], items: &[CollectionItem]) -> SyncPlan {
    let existing = index_by_key(items);
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    let mut plan = SyncPlan::default();

    for row in rows {
        let fields = match build_fields(row) {
            Ok(f) => f,
            Err(e) => {
                plan.skipped.push(SkippedRow {
                    key: row.key.clone(),
                    reason: format!("{e:#}"),
                });
                continue;
            }
        };

        let lookup = fields.key.to_lowercase();
        // Two rows with one key in a single batch would otherwise create twice.
        if !seen.insert(lookup.clone()) {
            plan.skipped.push(SkippedRow {
                key: fields.key,
                reason: "duplicate key in upstream batch".to_string(),
            });
            continue;
        }

        match existing.get(&lookup) {
            Some(item) => plan.actions.push(SyncAction::Update {
                item_id: item.id.clone(),
                fields,
            }),
            None => plan.actions.push(SyncAction::Create { fields }),
        }
    }
    plan
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_rows: usize,
    pub destination_items: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SyncReport {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            source_rows: 0,
            destination_items: 0,
            created: 0,
            updated: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Apply every action in order, awaiting each write before the next.
pub async fn apply_plan(
    plan: &SyncPlan,
    store: &dyn ItemStore,
    observer: &dyn SyncObserver,
) -> ApplyCounts {
    let mut counts = ApplyCounts::default();

    for action in &plan.actions {
        let result = match action {
            SyncAction::Create { fields } => store.create_item(fields).await.map(|item_id| {
                counts.created += 1;
                SyncEvent::ItemCreated {
                    key: fields.key.clone(),
                    item_id,
                }
            }),
            SyncAction::Update { item_id, fields } => {
                store.update_item(item_id, fields).await.map(|()| {
                    counts.updated += 1;
                    SyncEvent::ItemUpdated {
                        key: fields.key.clone(),
                        item_id: item_id.clone(),
                    }
                })
            }
        };

        match result {
            Ok(ev) => observer.record(&ev),
            Err(e) => {
                counts.failed += 1;
                observer.record(&SyncEvent::WriteFailed {
                    key: action.key().to_string(),
                    error: format!("{e:#}"),
                });
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::CalendarValues;
    use serde_json::json;

    fn row(key: &str, heading: &str, date: &str) -> CalendarRow {
        CalendarRow {
            key: key.to_string(),
            values: CalendarValues {
                ticker: Some("TCK".into()),
                sector: Some("Energy".into()),
                event_url: Some("https://example.com/e".into()),
                event_date: Some(date.to_string()),
                event_heading: Some(heading.to_string()),
            },
        }
    }

    fn item(id: &str, key: &str) -> CollectionItem {
        serde_json::from_value(json!({ "id": id, "fieldData": { "key": key } })).unwrap()
    }

    #[test]
    fn slug_examples() {
        assert_eq!(slugify("Q3 Report - 2024"), "q3-report-2024");
        assert_eq!(slugify("  --Årsrapport  2023!!"), "rsrapport-2023");
        assert_eq!(slugify("A__B..C"), "a-b-c");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn slug_alphabet_and_edges_hold() {
        for input in ["Hello, World!", "  x  ", "Ex-dividend / Utbytte 2.5 NOK", "ÆØÅ 2024"] {
            let s = slugify(input);
            assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!s.starts_with('-') && !s.ends_with('-'), "{s}");
            assert!(!s.contains("--"), "{s}");
        }
    }

    #[test]
    fn date_formats_to_utc_midnight() {
        assert_eq!(
            format_event_date("20240315").unwrap(),
            "2024-03-15T00:00:00.000Z"
        );
        assert_eq!(
            format_event_date(" 20241231 ").unwrap(),
            "2024-12-31T00:00:00.000Z"
        );
    }

    #[test]
    fn bad_dates_are_rejected() {
        for raw in ["2024-03-15", "20241332", "2024031", "abcdefgh", ""] {
            assert!(format_event_date(raw).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn fields_derive_name_slug_and_iso_date() {
        let f = build_fields(&row("EQNR-Q1", "Q1 Results", "20240425")).unwrap();
        assert_eq!(f.name, "Q1 Results - 20240425");
        assert_eq!(f.slug, "q1-results-20240425");
        assert_eq!(f.event_date, "2024-04-25T00:00:00.000Z");
        assert_eq!(f.ticker.as_deref(), Some("TCK"));
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let plan = plan_sync(&[row("ABC123", "AGM", "20240501")], &[item("it-9", "abc123")]);
        assert_eq!(
            plan.actions,
            vec![SyncAction::Update {
                item_id: "it-9".into(),
                fields: build_fields(&row("ABC123", "AGM", "20240501")).unwrap(),
            }]
        );
    }

    #[test]
    fn empty_collection_means_all_creates() {
        let rows = vec![
            row("A", "Q1", "20240101"),
            row("B", "Q2", "20240401"),
            row("C", "Q3", "20240701"),
        ];
        let plan = plan_sync(&rows, &[]);
        assert_eq!(plan.creates(), 3);
        assert_eq!(plan.updates(), 0);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn incomplete_and_duplicate_rows_are_skipped() {
        let mut missing_heading = row("X", "", "20240101");
        missing_heading.values.event_heading = None;
        let rows = vec![
            row("A", "Q1", "20240101"),
            row("a", "Q1 again", "20240102"),
            missing_heading,
            row("Y", "Bad date", "2024-01-01"),
        ];
        let plan = plan_sync(&rows, &[]);
        assert_eq!(plan.creates(), 1);
        let reasons: Vec<_> = plan.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(reasons, vec!["a", "X", "Y"]);
    }

    #[test]
    fn items_without_key_never_match() {
        let no_key: CollectionItem =
            serde_json::from_value(json!({ "id": "it-1", "fieldData": { "name": "x" } })).unwrap();
        let plan = plan_sync(&[row("A", "Q1", "20240101")], &[no_key]);
        assert_eq!(plan.creates(), 1);
    }
}
