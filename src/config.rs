//! Configuration: collections, references and overrides.
//!
//! The declarative part lives in `contentql.toml`:
//!
//! ```toml
//! field_transform = "camel_case"
//!
//! [[collections]]
//! name = "Post"
//! path = "content/posts"
//! creation_required_fields = ["title"]
//!
//! [collections.refs]
//! author = "Author"
//! ```
//!
//! Overrides carry closures and are attached in code with
//! [`CollectionEntry::with_override`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ContentError, Result};
use crate::overrides::Override;
use crate::path::FieldTransform;

/// Config file names looked up by [`Config::discover`].
pub const CONFIG_FILE_NAMES: &[&str] = &["contentql.toml", ".contentql.toml"];

fn default_reference_field() -> String {
    "id".to_string()
}

/// One named collection of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// Collection identifier, also the GraphQL type name.
    pub name: String,
    /// Where the source finds the collection's files.
    pub path: String,
    /// Field name -> referenced collection name.
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
    /// Field used for lookups.
    #[serde(default = "default_reference_field")]
    pub reference_field: String,
    /// Fields a `create` mutation must receive.
    #[serde(default)]
    pub creation_required_fields: Vec<String>,
    /// Plural used in `all<Plural>`; derived from `name` when absent.
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(skip)]
    pub overrides: Vec<Override>,
}

impl CollectionEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            refs: BTreeMap::new(),
            reference_field: default_reference_field(),
            creation_required_fields: Vec::new(),
            plural: None,
            overrides: Vec::new(),
        }
    }

    pub fn with_ref(mut self, field: impl Into<String>, collection: impl Into<String>) -> Self {
        self.refs.insert(field.into(), collection.into());
        self
    }

    pub fn with_reference_field(mut self, field: impl Into<String>) -> Self {
        self.reference_field = field.into();
        self
    }

    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.creation_required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_override(mut self, o: Override) -> Self {
        self.overrides.push(o);
        self
    }

    /// `Author` -> `Authors`, `Category` -> `Categories`.
    pub fn plural_name(&self) -> String {
        if let Some(plural) = &self.plural {
            return plural.clone();
        }
        pluralize(&self.name)
    }
}

fn pluralize(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", name)
    } else if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &name[..name.len() - 1])
    } else {
        format!("{}s", name)
    }
}

/// On-disk shape of `contentql.toml`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    field_transform: Option<String>,
    #[serde(default)]
    collections: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub collections: Vec<CollectionEntry>,
    pub field_transform: FieldTransform,
    /// Directory the config was loaded from; sources resolve paths against it.
    pub root: PathBuf,
}

#[derive(Serialize)]
struct HashInput<'a> {
    field_transform: &'a str,
    collections: &'a [CollectionEntry],
    overrides: Vec<(&'a str, &'a str, &'a str)>,
}

impl Config {
    pub fn new(collections: Vec<CollectionEntry>) -> Self {
        Self {
            collections,
            ..Default::default()
        }
    }

    pub fn with_field_transform(mut self, transform: FieldTransform) -> Self {
        self.field_transform = transform;
        self
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        let field_transform = match raw.field_transform.as_deref() {
            Some(name) => FieldTransform::from_name(name)?,
            None => FieldTransform::default(),
        };
        let config = Self {
            collections: raw.collections,
            field_transform,
            root: root.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; its directory becomes the content root.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml(&text, root)
    }

    /// Find the single config file in `dir` and load it.
    pub fn discover(dir: &Path) -> Result<Self> {
        let found: Vec<PathBuf> = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();
        match found.as_slice() {
            [] => Err(ContentError::ConfigNotFound(dir.to_path_buf())),
            [path] => Self::load(path),
            _ => Err(ContentError::MultipleConfigs(dir.to_path_buf(), found)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collections.is_empty() {
            return Err(ContentError::Config("no collections configured".to_string()));
        }
        let mut seen = HashSet::new();
        for entry in &self.collections {
            if entry.name.trim().is_empty() {
                return Err(ContentError::Config("collection with an empty name".to_string()));
            }
            if entry.path.trim().is_empty() {
                return Err(ContentError::Config(format!("collection `{}` has no path", entry.name)));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ContentError::Config(format!("duplicate collection `{}`", entry.name)));
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Identity of this config, used as the schema cache key.
    pub fn hash(&self) -> String {
        let input = HashInput {
            field_transform: self.field_transform.label(),
            collections: &self.collections,
            overrides: self
                .collections
                .iter()
                .flat_map(|c| {
                    c.overrides
                        .iter()
                        .map(move |o| (c.name.as_str(), o.field.as_str(), o.type_name.as_str()))
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
field_transform = "camel_case"

[[collections]]
name = "Post"
path = "content/posts"
creation_required_fields = ["title"]

[collections.refs]
author = "Author"

[[collections]]
name = "Author"
path = "content/authors"
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE, ".").unwrap();
        assert_eq!(config.collections.len(), 2);
        let post = config.collection("Post").unwrap();
        assert_eq!(post.refs.get("author").map(String::as_str), Some("Author"));
        assert_eq!(post.reference_field, "id");
        assert_eq!(post.creation_required_fields, vec!["title"]);
        assert_eq!(config.field_transform.label(), "camel_case");
    }

    #[test]
    fn test_plural_names() {
        assert_eq!(CollectionEntry::new("Author", "a").plural_name(), "Authors");
        assert_eq!(CollectionEntry::new("Category", "c").plural_name(), "Categories");
        assert_eq!(CollectionEntry::new("Day", "d").plural_name(), "Days");
        assert_eq!(CollectionEntry::new("Box", "b").plural_name(), "Boxes");
        let mut entry = CollectionEntry::new("Person", "p");
        entry.plural = Some("People".to_string());
        assert_eq!(entry.plural_name(), "People");
    }

    #[test]
    fn test_validation() {
        assert!(Config::new(vec![]).validate().is_err());
        let dup = Config::new(vec![CollectionEntry::new("A", "a"), CollectionEntry::new("A", "b")]);
        assert!(dup.validate().is_err());
        assert!(Config::from_toml("field_transform = \"kebab\"\n[[collections]]\nname = \"A\"\npath = \"a\"", ".").is_err());
    }

    #[test]
    fn test_hash_tracks_overrides() {
        let plain = Config::new(vec![CollectionEntry::new("Post", "posts")]);
        let with_override = Config::new(vec![CollectionEntry::new("Post", "posts")
            .with_override(Override::new("title", "String", |v: &Value, _| Ok(v.clone())))]);
        assert_eq!(plain.hash(), plain.clone().hash());
        assert_ne!(plain.hash(), with_override.hash());
    }

    #[test]
    fn test_discover() {
        let dir = tempdir().unwrap();
        assert!(matches!(Config::discover(dir.path()), Err(ContentError::ConfigNotFound(_))));

        fs::write(dir.path().join("contentql.toml"), SAMPLE).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.root, dir.path());

        fs::write(dir.path().join(".contentql.toml"), SAMPLE).unwrap();
        assert!(matches!(Config::discover(dir.path()), Err(ContentError::MultipleConfigs(..))));
    }
}
