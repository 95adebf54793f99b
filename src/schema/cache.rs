//! Built schemas keyed by config hash.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

use super::ContentSchema;

#[derive(Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, ContentSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, config_hash: &str) -> Option<ContentSchema> {
        match self.entries.read() {
            Ok(entries) => entries.get(config_hash).cloned(),
            Err(poisoned) => {
                warn!("schema cache lock poisoned, reading anyway");
                poisoned.into_inner().get(config_hash).cloned()
            }
        }
    }

    /// Store a schema. A concurrent build for the same hash simply overwrites.
    pub fn put(&self, config_hash: impl Into<String>, schema: ContentSchema) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(config_hash.into(), schema);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
