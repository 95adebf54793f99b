//! Runtime model of the generated schema: per-collection shapes, relations
//! and the in-memory node store the resolvers read from.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::CollectionEntry;
use crate::error::{ContentError, Result};
use crate::path::{legalize, reference_key};
use crate::shape::ObjectShape;
use crate::source::Source;

/// Nodes of every collection, keyed by collection name.
pub type Nodes = IndexMap<String, Vec<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Field holds one reference value.
    One,
    /// Field holds a list of reference values.
    Many,
}

/// A reference field wired to another collection.
#[derive(Debug, Clone)]
pub struct Relation {
    pub target: String,
    pub cardinality: Cardinality,
    /// Key of the reference value in content nodes.
    pub source_key: String,
}

#[derive(Debug, Clone)]
pub struct CollectionModel {
    pub entry: CollectionEntry,
    pub type_name: String,
    pub plural: String,
    pub shape: ObjectShape,
    /// Keyed by GraphQL field name.
    pub relations: IndexMap<String, Relation>,
}

impl CollectionModel {
    pub fn new(entry: CollectionEntry, shape: ObjectShape) -> Self {
        Self {
            type_name: legalize(&entry.name),
            plural: legalize(&entry.plural_name()),
            entry,
            shape,
            relations: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn reference_field(&self) -> &str {
        &self.entry.reference_field
    }

    /// GraphQL name of the reference field.
    pub fn reference_field_name(&self) -> &str {
        self.shape
            .field_by_source(&self.entry.reference_field)
            .map(|f| f.name.as_str())
            .unwrap_or(self.entry.reference_field.as_str())
    }

    /// Comparable reference value of `node`.
    pub fn key_of(&self, node: &Value) -> Option<String> {
        node.get(&self.entry.reference_field).and_then(reference_key)
    }
}

/// Content nodes shared by every resolver. Queries read, mutations write.
#[derive(Debug, Default)]
pub struct ContentStore {
    nodes: RwLock<Nodes>,
}

impl ContentStore {
    pub fn new(nodes: Nodes) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Nodes> {
        self.nodes.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Nodes> {
        self.nodes.write().await
    }

    /// Copy of one collection's nodes.
    pub async fn snapshot(&self, collection: &str) -> Vec<Value> {
        self.nodes
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

/// Borrowed view over models and nodes used to follow references.
#[derive(Clone, Copy)]
pub struct ContentGraph<'a> {
    pub models: &'a IndexMap<String, CollectionModel>,
    pub nodes: &'a Nodes,
}

impl<'a> ContentGraph<'a> {
    pub fn model(&self, collection: &str) -> Result<&'a CollectionModel> {
        self.models
            .get(collection)
            .ok_or_else(|| ContentError::UnknownCollection(collection.to_string()))
    }

    pub fn nodes(&self, collection: &str) -> &'a [Value] {
        self.nodes.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The node whose reference field equals `key`.
    pub fn find_by_reference(&self, collection: &str, key: &str) -> Result<Option<&'a Value>> {
        let model = self.model(collection)?;
        Ok(self
            .nodes(collection)
            .iter()
            .find(|node| model.key_of(node).as_deref() == Some(key)))
    }

    /// Nodes whose reference value is one of `keys`, in collection order.
    pub fn find_many(&self, collection: &str, keys: &[String]) -> Result<Vec<&'a Value>> {
        let model = self.model(collection)?;
        Ok(self
            .nodes(collection)
            .iter()
            .filter(|node| model.key_of(node).map_or(false, |k| keys.contains(&k)))
            .collect())
    }
}

/// Everything a resolver needs, registered as schema data.
pub struct Runtime {
    pub models: IndexMap<String, CollectionModel>,
    pub store: ContentStore,
    pub source: Arc<dyn Source>,
}

impl Runtime {
    pub fn model(&self, collection: &str) -> Result<&CollectionModel> {
        self.models
            .get(collection)
            .ok_or_else(|| ContentError::UnknownCollection(collection.to_string()))
    }

    pub fn graph<'a>(&'a self, nodes: &'a Nodes) -> ContentGraph<'a> {
        ContentGraph {
            models: &self.models,
            nodes,
        }
    }
}
