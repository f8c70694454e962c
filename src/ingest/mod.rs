// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::Utc;
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

use crate::cms::{CollectionItem, ItemStore};
use crate::ingest::types::{CalendarRow, CalendarSource};
use crate::observe::{SyncEvent, SyncObserver};
use crate::reconcile::{apply_plan, plan_sync, SyncReport};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_cycles_total", "Completed sync cycles.");
        describe_counter!(
            "sync_cycles_skipped_total",
            "Ticks skipped because a cycle was still running."
        );
        describe_counter!("sync_items_created_total", "Collection items created.");
        describe_counter!("sync_items_updated_total", "Collection items updated.");
        describe_counter!(
            "sync_write_failures_total",
            "Create/update calls rejected or failed."
        );
        describe_counter!(
            "sync_fetch_errors_total",
            "Calendar or collection fetches that failed."
        );
        describe_gauge!("sync_last_run_ts", "Unix ts when the last sync cycle finished.");
    });
}

/// Calendar rows, or an empty list when the fetch fails (the failure is reported).
pub async fn fetch_rows_or_empty(
    source: &dyn CalendarSource,
    observer: &dyn SyncObserver,
) -> Vec<CalendarRow> {
    match source.fetch_rows().await {
        Ok(rows) => {
            observer.record(&SyncEvent::SourceFetched {
                source: source.name(),
                rows: rows.len(),
            });
            rows
        }
        Err(e) => {
            observer.record(&SyncEvent::SourceFetchFailed {
                source: source.name(),
                error: format!("{e:#}"),
            });
            Vec::new()
        }
    }
}

/// Collection items; `None` when the listing failed, which the caller must not
/// confuse with an empty collection.
pub async fn fetch_items(
    store: &dyn ItemStore,
    observer: &dyn SyncObserver,
) -> Option<Vec<CollectionItem>> {
    match store.list_items().await {
        Ok(items) => {
            observer.record(&SyncEvent::DestinationFetched { items: items.len() });
            Some(items)
        }
        Err(e) => {
            observer.record(&SyncEvent::DestinationFetchFailed {
                error: format!("{e:#}"),
            });
            None
        }
    }
}

/// Run one fetch-then-reconcile cycle. Never fails: every problem is reported
/// to `observer` and reflected in the returned report.
pub async fn run_once(
    source: &dyn CalendarSource,
    store: &dyn ItemStore,
    observer: &dyn SyncObserver,
) -> SyncReport {
    ensure_metrics_described();
    observer.record(&SyncEvent::CycleStarted);
    let mut report = SyncReport::empty(Utc::now());

    let rows = fetch_rows_or_empty(source, observer).await;
    report.source_rows = rows.len();

    // Nothing upstream: leave the collection alone.
    if !rows.is_empty() {
        if let Some(items) = fetch_items(store, observer).await {
            report.destination_items = items.len();

            let plan = plan_sync(&rows, &items);
            for s in &plan.skipped {
                observer.record(&SyncEvent::RecordSkipped {
                    key: s.key.clone(),
                    reason: s.reason.clone(),
                });
            }
            report.skipped = plan.skipped.len();

            let counts = apply_plan(&plan, store, observer).await;
            report.created = counts.created;
            report.updated = counts.updated;
            report.failed = counts.failed;
        }
    }

    report.finished_at = Utc::now();
    observer.record(&SyncEvent::CycleFinished(report.clone()));
    report
}
