// src/ingest/scheduler.rs
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::cms::ItemStore;
use crate::ingest::types::CalendarSource;
use crate::observe::{SyncEvent, SyncObserver};
use crate::reconcile::SyncReport;

/// Decides when the next cycle is due.
#[async_trait]
pub trait Ticker: Send {
    /// Resolves at the next tick; `false` means no more ticks will come.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. The first tick fires immediately, so a fresh process
/// syncs once at startup and then every `period`.
pub struct IntervalTicker {
    inner: time::Interval,
}

impl IntervalTicker {
    pub fn every(period: Duration) -> Self {
        let mut inner = time::interval(period);
        inner.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { inner }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.inner.tick().await;
        true
    }
}

/// Ticks only when triggered; ends once every [`ManualTrigger`] is dropped.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct ManualTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTrigger {
    /// Returns false once the ticker is gone.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

pub fn manual_ticker() -> (ManualTrigger, ManualTicker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ManualTrigger { tx }, ManualTicker { rx })
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(SyncReport),
    /// Another cycle held the guard; nothing was done.
    Skipped,
}

/// The unit of work handed to the scheduler: one guarded sync cycle.
#[derive(Clone)]
pub struct SyncJob {
    source: Arc<dyn CalendarSource>,
    store: Arc<dyn ItemStore>,
    observer: Arc<dyn SyncObserver>,
    running: Arc<tokio::sync::Mutex<()>>,
    last: Arc<Mutex<Option<SyncReport>>>,
}

impl SyncJob {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        store: Arc<dyn ItemStore>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            source,
            store,
            observer,
            running: Arc::new(tokio::sync::Mutex::new(())),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a cycle unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            self.observer.record(&SyncEvent::CycleSkipped);
            return CycleOutcome::Skipped;
        };

        let report = crate::ingest::run_once(
            self.source.as_ref(),
            self.store.as_ref(),
            self.observer.as_ref(),
        )
        .await;

        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(report.clone());
        CycleOutcome::Completed(report)
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Drive `job` from `ticker`. Each tick spawns its cycle, so a slow cycle never
/// delays the timer; the job's guard turns overlapping ticks into skips.
pub fn spawn_scheduler<T>(mut ticker: T, job: SyncJob) -> JoinHandle<()>
where
    T: Ticker + 'static,
{
    tokio::spawn(async move {
        while ticker.tick().await {
            let job = job.clone();
            tokio::spawn(async move {
                job.run_cycle().await;
            });
        }
        tracing::info!(target: "scheduler", "ticker closed; scheduler stopping");
    })
}
