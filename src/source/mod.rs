//! Content sources: where raw nodes come from and where mutations write.
//!
//! A source hands the schema generator raw nodes per collection. Raw nodes are
//! either text that a transformer still has to parse, or already parsed JSON.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::config::{CollectionEntry, Config};
use crate::error::Result;

pub use fs::FsSource;
pub use memory::MemorySource;

/// Body of a raw node.
#[derive(Debug, Clone)]
pub enum RawContents {
    /// File text, parsed by the transformer registered for its extension.
    Text(String),
    /// Already a JSON node.
    Parsed(Value),
}

/// One record as produced by a source.
#[derive(Debug, Clone)]
pub struct RawNode {
    /// Path relative to the content root, when the node came from a file.
    pub path: Option<PathBuf>,
    pub contents: RawContents,
}

impl RawNode {
    pub fn text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            contents: RawContents::Text(text.into()),
        }
    }

    pub fn parsed(value: Value) -> Self {
        Self {
            path: None,
            contents: RawContents::Parsed(value),
        }
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.extension())
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// Raw nodes gathered by [`Source::fetch`], grouped by collection.
#[derive(Debug, Default)]
pub struct Records {
    collections: IndexMap<String, Vec<RawNode>>,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, collection: &str, node: RawNode) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(node);
    }

    /// Accept a whole `collection -> nodes` map at once.
    pub fn extend(&mut self, records: IndexMap<String, Vec<RawNode>>) {
        for (collection, nodes) in records {
            self.collections.entry(collection).or_default().extend(nodes);
        }
    }

    pub fn take(&mut self, collection: &str) -> Vec<RawNode> {
        self.collections.shift_remove(collection).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pluggable content source.
#[async_trait]
pub trait Source: Send + Sync {
    /// Called once before the first fetch.
    async fn initialize(&self, _config: &Config) -> Result<()> {
        Ok(())
    }

    /// Push every raw node of `collections` into `records`.
    async fn fetch(&self, collections: &[CollectionEntry], records: &mut Records) -> Result<()>;

    /// Persist a created or updated record; returns the record as stored.
    async fn put(&self, collection: &CollectionEntry, record: Value) -> Result<Value>;
}

/// `_filename`, `_path` and `_slug` for a file path.
pub fn file_metadata(path: &Path) -> Map<String, Value> {
    let mut meta = Map::new();
    if let Some(name) = path.file_name() {
        meta.insert("_filename".to_string(), Value::String(name.to_string_lossy().to_string()));
    }
    meta.insert(
        "_path".to_string(),
        Value::String(path.to_string_lossy().replace('\\', "/")),
    );
    if let Some(stem) = path.file_stem() {
        meta.insert("_slug".to_string(), Value::String(slugify(&stem.to_string_lossy())));
    }
    meta
}

/// `Hello World!` -> `hello-world`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
