//! # Sync events
//! Everything the sync cycle reports goes through a [`SyncObserver`]. The
//! production observer turns events into `tracing` records and Prometheus
//! counters; tests swap in [`RecordingObserver`] and assert on the events.

use std::sync::Mutex;

use metrics::{counter, gauge};
use tracing::Level;

use crate::reconcile::SyncReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    CycleStarted,
    CycleSkipped,
    SourceFetched { source: &'static str, rows: usize },
    SourceFetchFailed { source: &'static str, error: String },
    DestinationFetched { items: usize },
    DestinationFetchFailed { error: String },
    RecordSkipped { key: String, reason: String },
    ItemCreated { key: String, item_id: Option<String> },
    ItemUpdated { key: String, item_id: String },
    WriteFailed { key: String, error: String },
    CycleFinished(SyncReport),
}

impl SyncEvent {
    pub fn level(&self) -> Level {
        match self {
            SyncEvent::SourceFetchFailed { .. }
            | SyncEvent::DestinationFetchFailed { .. }
            | SyncEvent::WriteFailed { .. } => Level::WARN,
            SyncEvent::CycleSkipped | SyncEvent::RecordSkipped { .. } => Level::INFO,
            SyncEvent::CycleFinished(_) => Level::INFO,
            _ => Level::DEBUG,
        }
    }
}

pub trait SyncObserver: Send + Sync {
    fn record(&self, event: &SyncEvent);
}

/// Emit a `sync` target event at a level chosen at runtime.
macro_rules! sync_log {
    ($level:expr, $($rest:tt)+) => {{
        let level: Level = $level;
        if level == Level::WARN {
            tracing::warn!(target: "sync", $($rest)+);
        } else if level == Level::INFO {
            tracing::info!(target: "sync", $($rest)+);
        } else {
            tracing::debug!(target: "sync", $($rest)+);
        }
    }};
}

/// Logs through `tracing` at [`SyncEvent::level`] and bumps the sync counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn record(&self, event: &SyncEvent) {
        let level = event.level();
        match event {
            SyncEvent::CycleStarted => sync_log!(level, "cycle started"),
            SyncEvent::CycleSkipped => {
                counter!("sync_cycles_skipped_total").increment(1);
                sync_log!(level, "previous cycle still running; tick skipped");
            }
            SyncEvent::SourceFetched { source, rows } => {
                sync_log!(level, source, rows, "calendar fetched")
            }
            SyncEvent::SourceFetchFailed { source, error } => {
                counter!("sync_fetch_errors_total", "side" => "source").increment(1);
                sync_log!(level, source, error = %error, "calendar fetch failed");
            }
            SyncEvent::DestinationFetched { items } => {
                sync_log!(level, items, "collection items fetched")
            }
            SyncEvent::DestinationFetchFailed { error } => {
                counter!("sync_fetch_errors_total", "side" => "destination").increment(1);
                sync_log!(level, error = %error, "collection listing failed");
            }
            SyncEvent::RecordSkipped { key, reason } => {
                sync_log!(level, key = %key, reason = %reason, "record skipped")
            }
            SyncEvent::ItemCreated { key, item_id } => {
                counter!("sync_items_created_total").increment(1);
                sync_log!(level, key = %key, item_id = ?item_id, "item created");
            }
            SyncEvent::ItemUpdated { key, item_id } => {
                counter!("sync_items_updated_total").increment(1);
                sync_log!(level, key = %key, item_id = %item_id, "item updated");
            }
            SyncEvent::WriteFailed { key, error } => {
                counter!("sync_write_failures_total").increment(1);
                sync_log!(level, key = %key, error = %error, "item write failed");
            }
            SyncEvent::CycleFinished(report) => {
                counter!("sync_cycles_total").increment(1);
                gauge!("sync_last_run_ts").set(report.finished_at.timestamp() as f64);
                sync_log!(
                    level,
                    rows = report.source_rows,
                    items = report.destination_items,
                    created = report.created,
                    updated = report.updated,
                    failed = report.failed,
                    skipped = report.skipped,
                    "sync cycle finished"
                );
            }
        }
    }
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn count(&self, pred: impl Fn(&SyncEvent) -> bool) -> usize {
        self.snapshot().iter().filter(|e| pred(e)).count()
    }
}

impl SyncObserver for RecordingObserver {
    fn record(&self, event: &SyncEvent) {
        let mut v = self.events.lock().unwrap_or_else(|e| e.into_inner());
        v.push(event.clone());
    }
}
