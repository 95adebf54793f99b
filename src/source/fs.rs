//! Filesystem source: walks each collection's directory for content files.
//!
//! Walks respecting .gitignore and hidden files, hands every file to the
//! transformer registered for its extension, and writes mutated records back
//! as markdown (with YAML front matter) or YAML.

use async_trait::async_trait;
use ignore::WalkBuilder;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::{file_metadata, slugify, RawNode, Records, Source};
use crate::config::{CollectionEntry, Config};
use crate::error::{ContentError, Result};

pub struct FsSource {
    /// Root directory collection paths are relative to.
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Content files under `dir`, sorted for a stable node order.
    fn collect_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
            .hidden(true) // skip hidden files
            .git_ignore(true) // respect .gitignore
            .git_global(true)
            .git_exclude(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }

    /// Where a record lives, relative to the root.
    fn record_path(collection: &CollectionEntry, record: &Map<String, Value>) -> Result<PathBuf> {
        if let Some(Value::String(path)) = record.get("_path") {
            return inside_root(path);
        }
        let stem = record
            .get(&collection.reference_field)
            .and_then(|v| match v {
                Value::String(s) => Some(slugify(s)),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ContentError::Source(format!(
                    "cannot derive a file name for {} without `{}`",
                    collection.name, collection.reference_field
                ))
            })?;
        let extension = if raw_body(record).is_some() { "md" } else { "yaml" };
        Ok(Path::new(&collection.path).join(format!("{}.{}", stem, extension)))
    }
}

/// A relative path without `..`, root or prefix components.
fn inside_root(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.file_name().is_none() {
        return Err(ContentError::Source(format!(
            "record path `{}` must stay inside the content root",
            path.display()
        )));
    }
    Ok(path)
}

/// `posts/a.md` -> `posts/a.md.tmp`
fn tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn raw_body(record: &Map<String, Value>) -> Option<&str> {
    record
        .get("_content")
        .and_then(|c| c.get("raw"))
        .and_then(Value::as_str)
}

/// Serialize a record: reserved `_` fields are dropped, `_content.raw` becomes
/// the markdown body.
pub fn render_record(record: &Map<String, Value>, path: &Path) -> Result<String> {
    let front: Map<String, Value> = record
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let yaml = serde_yaml::to_string(&Value::Object(front))
        .map_err(|e| ContentError::Yaml(path.to_path_buf(), e))?;

    let is_markdown = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    );
    Ok(if is_markdown {
        format!("---\n{}---\n{}", yaml, raw_body(record).unwrap_or_default())
    } else {
        yaml
    })
}

#[async_trait]
impl Source for FsSource {
    async fn initialize(&self, config: &Config) -> Result<()> {
        if !self.root.is_dir() {
            return Err(ContentError::Source(format!(
                "content root {} is not a directory",
                self.root.display()
            )));
        }
        info!(root = %self.root.display(), collections = config.collections.len(), "filesystem source ready");
        Ok(())
    }

    async fn fetch(&self, collections: &[CollectionEntry], records: &mut Records) -> Result<()> {
        for entry in collections {
            let dir = self.root.join(&entry.path);
            if !dir.is_dir() {
                warn!(collection = %entry.name, dir = %dir.display(), "collection directory missing");
                continue;
            }

            let files = Self::collect_files(&dir);
            debug!(collection = %entry.name, count = files.len(), "reading content files");

            for file in files {
                let text = tokio::fs::read_to_string(&file).await?;
                let relative = file.strip_prefix(&self.root).unwrap_or(&file).to_path_buf();
                records.add_record(&entry.name, RawNode::text(relative, text));
            }
        }
        Ok(())
    }

    async fn put(&self, collection: &CollectionEntry, record: Value) -> Result<Value> {
        let Value::Object(mut map) = record else {
            return Err(ContentError::Source(format!("{} record must be an object", collection.name)));
        };

        let relative = Self::record_path(collection, &map)?;
        let target = self.root.join(&relative);
        let text = render_record(&map, &relative)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to .tmp, then rename
        let tmp = tmp_path(&target);
        tokio::fs::write(&tmp, text.as_bytes()).await?;
        tokio::fs::rename(&tmp, &target).await?;
        debug!(file = %target.display(), bytes = text.len(), "record written");

        for (key, value) in file_metadata(&relative) {
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}
