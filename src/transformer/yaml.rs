//! YAML (and JSON, a YAML subset) data files. One file, one node.

use serde_json::Value;
use std::path::Path;

use super::Transformer;
use crate::error::{ContentError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlTransformer;

impl Transformer for YamlTransformer {
    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml", "json"]
    }

    fn parse(&self, path: &Path, text: &str) -> Result<Value> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| ContentError::Yaml(path.to_path_buf(), e))?;
        match value {
            Value::Object(_) => Ok(value),
            _ => Err(ContentError::Source(format!(
                "{} must contain a mapping at the top level",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = YamlTransformer
            .parse(Path::new("a.yaml"), "id: 2a3e\nname: Tony\nenjoys: [cats, tea]\n")
            .unwrap();
        assert_eq!(yaml, json!({"id": "2a3e", "name": "Tony", "enjoys": ["cats", "tea"]}));

        let from_json = YamlTransformer
            .parse(Path::new("b.json"), r#"{"id": 1, "score": 1.5}"#)
            .unwrap();
        assert_eq!(from_json, json!({"id": 1, "score": 1.5}));
    }

    #[test]
    fn test_rejects_non_mapping() {
        assert!(YamlTransformer.parse(Path::new("a.yaml"), "- 1\n- 2\n").is_err());
        assert!(YamlTransformer.parse(Path::new("a.yaml"), "key: [unclosed").is_err());
    }
}
