// tests/api_http.rs
//
// HTTP-level tests for the status Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use calendar_sync::api::{self, AppState};
use calendar_sync::cms::memory::MemoryStore;
use calendar_sync::cms::{CollectionItem, ItemFields, ItemStore};
use calendar_sync::ingest::providers::oslo_bors::OsloBorsProvider;
use calendar_sync::metrics::Metrics;
use calendar_sync::observe::{RecordingObserver, SyncEvent};
use calendar_sync::SyncJob;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;

fn test_job() -> SyncJob {
    SyncJob::new(
        Arc::new(OsloBorsProvider::from_fixture(include_str!(
            "fixtures/calendar.json"
        ))),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingObserver::new()),
    )
}

fn test_router(job: SyncJob) -> Router {
    api::router(AppState { job }).merge(Metrics::detached().router())
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = test_router(test_job()).oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn status_before_first_cycle_has_no_report() {
    let req = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let resp = test_router(test_job()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["running"], false);
    assert!(v["last"].is_null());
}

#[tokio::test]
async fn post_sync_runs_a_cycle_and_status_reflects_it() {
    let job = test_job();
    let app = test_router(job.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/sync")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = read_json(resp).await;
    assert_eq!(report["created"], 3);
    assert_eq!(report["updated"], 0);
    assert_eq!(report["source_rows"], 3);

    let req = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let v = read_json(app.oneshot(req).await.unwrap()).await;
    assert_eq!(v["last"]["created"], 3);
}

#[tokio::test]
async fn metrics_route_is_mounted() {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = test_router(test_job()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Each create takes a while, so a cycle spans several client timeouts.
struct SlowStore {
    inner: Arc<MemoryStore>,
    per_create: Duration,
}

#[async_trait::async_trait]
impl ItemStore for SlowStore {
    async fn list_items(&self) -> Result<Vec<CollectionItem>> {
        self.inner.list_items().await
    }

    async fn create_item(&self, fields: &ItemFields) -> Result<Option<String>> {
        let id = self.inner.create_item(fields).await?;
        tokio::time::sleep(self.per_create).await;
        Ok(id)
    }

    async fn update_item(&self, item_id: &str, fields: &ItemFields) -> Result<()> {
        self.inner.update_item(item_id, fields).await
    }
}

#[tokio::test]
async fn dropped_sync_request_does_not_cancel_the_cycle() {
    let items = Arc::new(MemoryStore::new());
    let obs = Arc::new(RecordingObserver::new());
    let job = SyncJob::new(
        Arc::new(OsloBorsProvider::from_fixture(include_str!(
            "fixtures/calendar.json"
        ))),
        Arc::new(SlowStore {
            inner: items.clone(),
            per_create: Duration::from_millis(100),
        }),
        obs.clone(),
    );

    let req = Request::builder()
        .method("POST")
        .uri("/sync")
        .body(Body::empty())
        .unwrap();
    // The client gives up after the first create; the request future is dropped.
    let early = tokio::time::timeout(
        Duration::from_millis(150),
        test_router(job.clone()).oneshot(req),
    )
    .await;
    assert!(early.is_err(), "request should time out mid-cycle");

    tokio::time::timeout(Duration::from_secs(5), async {
        while job.last_report().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("cycle finished after the client left");

    let report = job.last_report().unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(items.snapshot().len(), 3);
    assert_eq!(
        obs.count(|e| matches!(e, SyncEvent::CycleFinished(_))),
        1
    );
}
