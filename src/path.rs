//! Field-path utilities.
//!
//! Deep traversal of JSON content nodes and the field-name transform that
//! turns content keys into legal GraphQL field names.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{ContentError, Result};

/// Character sequence that must never survive a field-name transform.
pub const ILLEGAL_SEQUENCE: &str = "[]";

/// Flatten nested objects into `(path, leaf)` pairs.
///
/// Only objects are descended into; arrays, scalars and nulls are leaves.
/// Pairs come out in key order.
pub fn flatten(value: &Value) -> Vec<(Vec<String>, Value)> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    flatten_into(value, &mut prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten_into(child, prefix, out);
                prefix.pop();
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.push((prefix.clone(), leaf.clone()));
            }
        }
    }
}

/// Follow `path` into `value`.
///
/// `None` means the path is absent ("undefined"); `Some(Value::Null)` means an
/// explicit null. Numeric segments index into arrays.
pub fn get_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment.as_ref()),
        Value::Array(items) => segment
            .as_ref()
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Merge `overlay` into `base`. Objects merge key by key, anything else is replaced.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Copy keys from `defaults` that `target` does not have yet.
pub fn fill_missing(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, value) in defaults {
        match target.get_mut(key) {
            Some(Value::Object(existing)) => {
                if let Value::Object(nested) = value {
                    fill_missing(existing, nested);
                }
            }
            Some(_) => {}
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Comparable form of a reference value (`"40s3"` and `40` both work as ids).
pub fn reference_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// How content keys become GraphQL field names.
#[derive(Clone, Default)]
pub enum FieldTransform {
    /// Keep keys as they are (still legalized).
    Identity,
    /// `time_to_read` -> `timeToRead`
    #[default]
    CamelCase,
    /// `timeToRead` -> `time_to_read`
    SnakeCase,
    /// User supplied transform.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl FieldTransform {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" | "identity" => Ok(Self::Identity),
            "camel_case" | "camelCase" => Ok(Self::CamelCase),
            "snake_case" => Ok(Self::SnakeCase),
            other => Err(ContentError::Config(format!(
                "unknown field_transform `{}` (expected none, camel_case or snake_case)",
                other
            ))),
        }
    }

    /// Stable label, part of the config hash.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Identity => "none",
            Self::CamelCase => "camel_case",
            Self::SnakeCase => "snake_case",
            Self::Custom(_) => "custom",
        }
    }

    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Identity => name.to_string(),
            Self::CamelCase => camel_case(name),
            Self::SnakeCase => snake_case(name),
            Self::Custom(f) => f(name),
        }
    }
}

impl fmt::Debug for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldTransform({})", self.label())
    }
}

/// Transform a content key into a GraphQL field name.
///
/// Fails with [`ContentError::IllegalFieldName`] when the transformed name
/// still contains `[]`.
pub fn transform_field_name(name: &str, transform: &FieldTransform) -> Result<String> {
    let transformed = transform.apply(name);
    if transformed.contains(ILLEGAL_SEQUENCE) {
        return Err(ContentError::IllegalFieldName {
            field: transformed,
            sequence: ILLEGAL_SEQUENCE,
        });
    }
    Ok(legalize(&transformed))
}

/// Replace characters GraphQL names cannot hold.
pub fn legalize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn split_leading_underscores(name: &str) -> (&str, &str) {
    let rest = name.trim_start_matches('_');
    name.split_at(name.len() - rest.len())
}

fn camel_case(name: &str) -> String {
    let (prefix, rest) = split_leading_underscores(name);
    let mut out = String::from(prefix);
    let mut upper_next = false;
    let mut first = true;
    for c in rest.chars() {
        if matches!(c, '_' | '-' | ' ') {
            upper_next = !first;
            continue;
        }
        if first {
            out.extend(c.to_lowercase());
            first = false;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn snake_case(name: &str) -> String {
    let (prefix, rest) = split_leading_underscores(name);
    let mut out = String::from(prefix);
    let mut prev_lower = false;
    for c in rest.chars() {
        if matches!(c, '-' | ' ') {
            out.push('_');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// `time_to_read` -> `TimeToRead`, used for generated type names.
pub fn pascal_case(name: &str) -> String {
    let camel = camel_case(name.trim_start_matches('_'));
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
