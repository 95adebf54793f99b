//! In-memory source: pre-parsed JSON nodes, writes are recorded.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RawNode, Records, Source};
use crate::config::CollectionEntry;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemorySource {
    collections: IndexMap<String, Vec<Value>>,
    writes: Mutex<Vec<(String, Value)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: impl Into<String>, nodes: Vec<Value>) -> Self {
        self.collections.insert(name.into(), nodes);
        self
    }

    /// Every `(collection, record)` passed to [`Source::put`] so far.
    pub async fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn fetch(&self, collections: &[CollectionEntry], records: &mut Records) -> Result<()> {
        for entry in collections {
            let nodes = self.collections.get(&entry.name).cloned().unwrap_or_default();
            debug!(collection = %entry.name, count = nodes.len(), "memory source fetch");
            for node in nodes {
                records.add_record(&entry.name, RawNode::parsed(node));
            }
        }
        Ok(())
    }

    async fn put(&self, collection: &CollectionEntry, record: Value) -> Result<Value> {
        self.writes
            .lock()
            .await
            .push((collection.name.clone(), record.clone()));
        Ok(record)
    }
}
