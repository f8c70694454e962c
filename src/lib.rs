// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod cms;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod observe;
pub mod reconcile;

// ---- Re-exports for stable public API ----
pub use crate::config::SyncConfig;
pub use crate::ingest::run_once;
pub use crate::ingest::scheduler::{spawn_scheduler, CycleOutcome, SyncJob};
pub use crate::observe::{SyncEvent, SyncObserver, TracingObserver};
pub use crate::reconcile::{format_event_date, slugify, SyncReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins; `LOG_FORMAT=json` switches
/// to one JSON object per line for log shippers.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sync=info,scheduler=info,calendar_sync=info,fetch_schema=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}
