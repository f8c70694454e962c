// src/cms/webflow.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{CollectionItem, ItemFields, ItemPayload, ItemStore};
use crate::config::SyncConfig;

/// Webflow Data API (v2) client bound to one collection.
#[derive(Clone)]
pub struct WebflowClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    collection_id: String,
    page_size: u32,
    create_as_draft: bool,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CreatedItem {
    id: Option<String>,
}

impl WebflowClient {
    pub fn new(cfg: &SyncConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: cfg.webflow_base_url.clone(),
            token: cfg.webflow_api_token.clone(),
            collection_id: cfg.collection_id.clone(),
            page_size: cfg.page_size,
            create_as_draft: cfg.create_as_draft,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection_id)
    }

    fn items_url(&self) -> String {
        format!("{}/items", self.collection_url())
    }

    fn payload<'a>(&self, fields: &'a ItemFields) -> ItemPayload<'a> {
        ItemPayload {
            field_data: fields,
            is_draft: self.create_as_draft,
            is_archived: false,
            is_published: !self.create_as_draft,
        }
    }

    /// Collection schema, as JSON. Used to check field slugs against [`ItemFields`].
    pub async fn collection_schema(&self) -> Result<Value> {
        let resp = self
            .http
            .get(self.collection_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("webflow schema get()")?;
        let resp = check_status(resp, "schema").await?;
        resp.json().await.context("parsing webflow schema json")
    }
}

/// Turn a non-2xx response into an error that carries the response body, since
/// Webflow explains validation failures there.
async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow!("webflow {what} failed with {status}: {}", body.trim()))
}

#[async_trait]
impl ItemStore for WebflowClient {
    async fn list_items(&self) -> Result<Vec<CollectionItem>> {
        let limit = self.page_size.to_string();
        let resp = self
            .http
            .get(self.items_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("limit", limit.as_str()), ("offset", "0")])
            .send()
            .await
            .context("webflow list get()")?;
        let resp = check_status(resp, "list").await?;
        let body: ListResponse = resp.json().await.context("parsing webflow list json")?;

        let Some(raw_items) = body.items else {
            return Err(anyhow!("webflow list response has no `items` array"));
        };

        let returned = raw_items.len();
        let mut items = Vec::with_capacity(returned);
        for raw in raw_items {
            match serde_json::from_value::<CollectionItem>(raw) {
                Ok(it) => items.push(it),
                Err(e) => tracing::warn!(target: "sync", error = %e, "skipping undecodable collection item"),
            }
        }

        let total = body.pagination.and_then(|p| p.total);
        if exceeds_first_page(total, returned) {
            tracing::warn!(
                target: "sync",
                total,
                returned,
                decoded = items.len(),
                "collection exceeds one page; items beyond it are not matched"
            );
        }
        Ok(items)
    }

    async fn create_item(&self, fields: &ItemFields) -> Result<Option<String>> {
        let resp = self
            .http
            .post(self.items_url())
            .bearer_auth(&self.token)
            .json(&self.payload(fields))
            .send()
            .await
            .context("webflow create post()")?;
        let resp = check_status(resp, "create").await?;
        // The item exists at this point; a body we cannot read only costs us the id.
        let created = resp.json::<CreatedItem>().await.ok().and_then(|c| c.id);
        Ok(created)
    }

    async fn update_item(&self, item_id: &str, fields: &ItemFields) -> Result<()> {
        let resp = self
            .http
            .patch(format!("{}/{}", self.items_url(), item_id))
            .bearer_auth(&self.token)
            .json(&self.payload(fields))
            .send()
            .await
            .context("webflow update patch()")?;
        check_status(resp, "update").await?;
        Ok(())
    }
}

/// Compares against what the page returned, before any item was dropped as
/// undecodable.
fn exceeds_first_page(total: Option<u64>, returned: usize) -> bool {
    total.is_some_and(|t| t > returned as u64)
}
