//! Transformers turn raw file text into content nodes.
//!
//! The registry dispatches on file extension; a node whose extension has no
//! transformer aborts the schema build.

pub mod markdown;
pub mod yaml;

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{enabled, trace, Level};

use crate::error::{ContentError, Result};
use crate::overrides::ResolverTree;
use crate::source::{RawContents, RawNode};

pub use markdown::MarkdownTransformer;
pub use yaml::YamlTransformer;

pub trait Transformer: Send + Sync {
    /// File extensions handled, lowercase and without the dot.
    fn extensions(&self) -> &'static [&'static str];

    fn parse(&self, path: &Path, text: &str) -> Result<Value>;

    /// Computed fields added to every node of every collection.
    fn preknown_schema_fragments(&self) -> ResolverTree {
        ResolverTree::default()
    }

    /// Human readable form of a parsed node.
    fn inspect(&self, node: &Value) -> String {
        serde_json::to_string_pretty(node).unwrap_or_else(|_| node.to_string())
    }
}

#[derive(Default, Clone)]
pub struct TransformerRegistry {
    transformers: Vec<Arc<dyn Transformer>>,
    by_extension: HashMap<String, usize>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markdown and YAML.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(Arc::new(MarkdownTransformer::new()))
            .register(Arc::new(YamlTransformer))
    }

    /// A later registration takes over extensions it shares with an earlier one.
    pub fn register(mut self, transformer: Arc<dyn Transformer>) -> Self {
        let index = self.transformers.len();
        for ext in transformer.extensions() {
            self.by_extension.insert(ext.to_string(), index);
        }
        self.transformers.push(transformer);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    pub fn for_extension(&self, extension: &str) -> Option<&Arc<dyn Transformer>> {
        self.by_extension
            .get(&extension.to_lowercase())
            .and_then(|&i| self.transformers.get(i))
    }

    /// Parse a raw node. Already parsed nodes pass through untouched.
    pub fn parse(&self, node: RawNode) -> Result<Value> {
        let text = match node.contents {
            RawContents::Parsed(value) => return Ok(value),
            RawContents::Text(text) => text,
        };
        let path = node.path.unwrap_or_else(PathBuf::new);
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let transformer = self
            .for_extension(&extension)
            .ok_or_else(|| ContentError::NoTransformer {
                extension: extension.clone(),
                path: path.clone(),
            })?;
        let value = transformer.parse(&path, &text)?;
        if enabled!(Level::TRACE) {
            trace!(path = %path.display(), node = %transformer.inspect(&value), "parsed content node");
        }
        Ok(value)
    }

    /// Fragments of every transformer merged; later registrations win.
    pub fn preknown_schema_fragments(&self) -> ResolverTree {
        self.transformers
            .iter()
            .fold(ResolverTree::default(), |tree, t| tree.merged(&t.preknown_schema_fragments()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_by_extension() {
        let registry = TransformerRegistry::with_defaults();
        let node = registry
            .parse(RawNode::text("authors/eva.YML", "id: 40s3\nname: Eva\n"))
            .unwrap();
        assert_eq!(node, json!({"id": "40s3", "name": "Eva"}));

        let parsed = registry.parse(RawNode::parsed(json!({"id": 1}))).unwrap();
        assert_eq!(parsed, json!({"id": 1}));
    }

    #[test]
    fn test_missing_transformer_is_fatal() {
        let registry = TransformerRegistry::with_defaults();
        let err = registry.parse(RawNode::text("posts/a.txt", "hello")).unwrap_err();
        match err {
            ContentError::NoTransformer { extension, .. } => assert_eq!(extension, "txt"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fragments_merge() {
        let registry = TransformerRegistry::with_defaults();
        let fragments = registry.preknown_schema_fragments();
        assert!(fragments.get(&["_content", "html"]).is_some());
        assert!(fragments.get(&["_content", "timeToRead"]).is_some());
        assert!(TransformerRegistry::new().preknown_schema_fragments().is_empty());
    }
}
