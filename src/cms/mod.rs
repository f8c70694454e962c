//! # Destination collection
//! Types shared by the reconciler and the Webflow client.
//!
//! The natural key lives at `fieldData.key` on every item; listing, matching
//! and writing all go through that one path.

pub mod memory;
pub mod webflow;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name carrying the natural key inside `fieldData`.
pub const KEY_FIELD: &str = "key";

/// An existing item as returned by the collection listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionItem {
    pub id: String,
    #[serde(rename = "fieldData", default)]
    pub field_data: Map<String, Value>,
}

impl CollectionItem {
    pub fn natural_key(&self) -> Option<&str> {
        self.field_data
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Field values written for one calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemFields {
    pub key: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    /// ISO-8601, UTC midnight.
    pub event_date: String,
    pub event_heading: String,
}

/// Request body for create and update calls.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload<'a> {
    pub field_data: &'a ItemFields,
    pub is_draft: bool,
    pub is_archived: bool,
    pub is_published: bool,
}

/// Write/read access to the destination collection.
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    async fn list_items(&self) -> Result<Vec<CollectionItem>>;
    /// Returns the new item's id when the destination reports one.
    async fn create_item(&self, fields: &ItemFields) -> Result<Option<String>>;
    async fn update_item(&self, item_id: &str, fields: &ItemFields) -> Result<()>;
}
