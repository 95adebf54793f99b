//! Error types for contentql.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading content, building the schema or resolving queries.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error in {0}: {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),

    #[error("Config file parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Config(String),

    #[error("No config file found in {0} (expected contentql.toml)")]
    ConfigNotFound(PathBuf),

    #[error("Multiple config files found in {0}: {1:?}")]
    MultipleConfigs(PathBuf, Vec<PathBuf>),

    #[error(
        "Illegal field name `{field}`: it still contains `{sequence}` after transformation. \
         Rename the field in your content, or adjust the field transform so it strips `{sequence}`"
    )]
    IllegalFieldName {
        field: String,
        sequence: &'static str,
    },

    #[error("No transformer registered for extension `{extension}` ({path})")]
    NoTransformer { extension: String, path: PathBuf },

    #[error("Invalid override path `{0}`: {1}")]
    InvalidOverridePath(String, String),

    #[error("Unsupported filter operation `{0}`")]
    UnsupportedOperation(String),

    #[error("Filter operation `{operation}` requires {expected}")]
    FilterType {
        operation: String,
        expected: &'static str,
    },

    #[error("Invalid regex `{0}`: {1}")]
    InvalidRegex(String, String),

    #[error("Cannot query field `{field}` on type `{type_name}`")]
    UnknownField { type_name: String, field: String },

    #[error("{collection} with {field} `{value}` already exists")]
    ReferenceAlreadyExists {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Missing required field `{field}` for {collection}")]
    MissingRequiredField { collection: String, field: String },

    #[error("{collection} with {field} `{value}` not found")]
    NotFound {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Unknown collection `{0}`")]
    UnknownCollection(String),

    #[error("Schema build failed: {0}")]
    Schema(String),

    #[error("Source error: {0}")]
    Source(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ContentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_field_name_mentions_sequence() {
        let err = ContentError::IllegalFieldName {
            field: "a[]b".to_string(),
            sequence: "[]",
        };
        let display = err.to_string();
        assert!(display.contains("a[]b"));
        assert!(display.contains("`[]`"));
        assert!(display.contains("Rename"));
    }

    #[test]
    fn test_not_found_display() {
        let err = ContentError::NotFound {
            collection: "Author".to_string(),
            field: "id".to_string(),
            value: "40s3".to_string(),
        };
        assert_eq!(err.to_string(), "Author with id `40s3` not found");
    }
}
