// src/cms/memory.rs
use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use super::{CollectionItem, ItemFields, ItemStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Create { key: String },
    Update { item_id: String, key: String },
}

/// In-memory collection for tests and local dry runs. Writes for keys in
/// `fail_keys` are rejected like a validation error would be.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub items: Mutex<Vec<CollectionItem>>,
    pub calls: Mutex<Vec<StoreCall>>,
    pub fail_keys: HashSet<String>,
    pub fail_listing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CollectionItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    pub fn failing_writes_for<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn snapshot(&self) -> Vec<CollectionItem> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn log(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

fn to_field_data(fields: &ItemFields) -> Result<Map<String, Value>> {
    match serde_json::to_value(fields)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("item fields serialized to {other}")),
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    async fn list_items(&self) -> Result<Vec<CollectionItem>> {
        self.log(StoreCall::List);
        if self.fail_listing {
            return Err(anyhow!("listing unavailable"));
        }
        Ok(self.snapshot())
    }

    async fn create_item(&self, fields: &ItemFields) -> Result<Option<String>> {
        self.log(StoreCall::Create {
            key: fields.key.clone(),
        });
        if self.fail_keys.contains(&fields.key) {
            return Err(anyhow!("validation error for {}", fields.key));
        }
        let field_data = to_field_data(fields)?;
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let id = format!("item-{}", items.len() + 1);
        items.push(CollectionItem {
            id: id.clone(),
            field_data,
        });
        Ok(Some(id))
    }

    async fn update_item(&self, item_id: &str, fields: &ItemFields) -> Result<()> {
        self.log(StoreCall::Update {
            item_id: item_id.to_string(),
            key: fields.key.clone(),
        });
        if self.fail_keys.contains(&fields.key) {
            return Err(anyhow!("validation error for {}", fields.key));
        }
        let field_data = to_field_data(fields)?;
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let Some(item) = items.iter_mut().find(|it| it.id == item_id) else {
            return Err(anyhow!("no item with id {item_id}"));
        };
        item.field_data = field_data;
        Ok(())
    }
}
