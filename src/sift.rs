//! Sift: declarative filter expressions over content nodes.
//!
//! A filter is a nested object whose leaves are `{operation: value}` pairs:
//!
//! ```json
//! { "title": { "wildcard": "Test*" }, "_content": { "timeToRead": { "gte": 5 } } }
//! ```
//!
//! The expression is flattened once into a [`FilterSetManifest`] and compiled
//! into a [`Sift`] predicate that ANDs every comparator.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{ContentError, Result};
use crate::path::{flatten, get_path};

/// One comparator at a leaf of the filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparator {
    pub operation: String,
    pub value: Value,
}

/// A field path together with the comparator applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSetEntry {
    pub path: Vec<String>,
    pub comparator: Comparator,
}

pub type FilterSetManifest = Vec<FilterSetEntry>;

/// Flatten a filter expression into `(path, comparator)` entries.
///
/// The last key of every leaf path is the operation, the keys before it are
/// the field path: `{a: {b: {gte: 5}}}` gives path `[a, b]` and `gte 5`.
pub fn generate_filter_set_manifest(filter: &Value) -> FilterSetManifest {
    flatten(filter)
        .into_iter()
        .filter_map(|(mut path, value)| {
            let operation = path.pop()?;
            Some(FilterSetEntry {
                path,
                comparator: Comparator { operation, value },
            })
        })
        .collect()
}

/// Supported comparator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Includes,
    Excludes,
    Regex,
    Wildcard,
    Exists,
    StrictlyExists,
}

impl FromStr for Operation {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "in" => Self::In,
            "nin" => Self::Nin,
            "includes" => Self::Includes,
            "excludes" => Self::Excludes,
            "regex" => Self::Regex,
            "wildcard" => Self::Wildcard,
            "exists" => Self::Exists,
            "strictlyExists" => Self::StrictlyExists,
            other => return Err(ContentError::UnsupportedOperation(other.to_string())),
        })
    }
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Includes => "includes",
            Self::Excludes => "excludes",
            Self::Regex => "regex",
            Self::Wildcard => "wildcard",
            Self::Exists => "exists",
            Self::StrictlyExists => "strictlyExists",
        }
    }
}

/// A comparator with its pattern (if any) compiled ahead of evaluation.
#[derive(Debug)]
struct Predicate {
    path: Vec<String>,
    operation: Operation,
    value: Value,
    pattern: Option<Regex>,
}

/// Compiled filter predicate.
#[derive(Debug, Default)]
pub struct Sift {
    predicates: Vec<Predicate>,
}

impl Sift {
    /// Compile a filter expression. Unknown operations fail here.
    pub fn compile(filter: &Value) -> Result<Self> {
        Self::from_manifest(&generate_filter_set_manifest(filter))
    }

    /// Compile an already flattened manifest.
    pub fn from_manifest(manifest: &FilterSetManifest) -> Result<Self> {
        let predicates = manifest
            .iter()
            .map(|entry| {
                let operation: Operation = entry.comparator.operation.parse()?;
                let pattern = match operation {
                    Operation::Regex => Some(compile_regex(&entry.comparator.value)?),
                    Operation::Wildcard => Some(compile_wildcard(&entry.comparator.value)?),
                    _ => None,
                };
                Ok(Predicate {
                    path: entry.path.clone(),
                    operation,
                    value: entry.comparator.value.clone(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { predicates })
    }

    /// True when the filter has no comparators and lets every node through.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate every comparator against `node` and AND the results.
    pub fn test(&self, node: &Value) -> Result<bool> {
        for predicate in &self.predicates {
            let field = get_path(node, &predicate.path);
            if !evaluate(predicate, field)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keep the nodes that pass the filter, in their original order.
    pub fn filter(&self, nodes: Vec<Value>) -> Result<Vec<Value>> {
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if self.test(&node)? {
                kept.push(node);
            }
        }
        Ok(kept)
    }
}

/// Compile `filter` into a predicate.
pub fn sift(filter: &Value) -> Result<Sift> {
    Sift::compile(filter)
}

fn evaluate(predicate: &Predicate, field: Option<&Value>) -> Result<bool> {
    let target = &predicate.value;
    let op = predicate.operation;
    Ok(match op {
        Operation::Eq => strict_eq(field, target),
        Operation::Ne => !strict_eq(field, target),
        Operation::Lt => compare(field, target) == Some(Ordering::Less),
        Operation::Lte => matches!(compare(field, target), Some(Ordering::Less | Ordering::Equal)),
        Operation::Gt => compare(field, target) == Some(Ordering::Greater),
        Operation::Gte => {
            matches!(compare(field, target), Some(Ordering::Greater | Ordering::Equal))
        }
        Operation::In | Operation::Nin => {
            let candidates = target.as_array().ok_or_else(|| type_error(op, "an array value"))?;
            let found = candidates.iter().any(|candidate| strict_eq(field, candidate));
            found == (op == Operation::In)
        }
        Operation::Includes | Operation::Excludes => {
            let items = field
                .and_then(Value::as_array)
                .ok_or_else(|| type_error(op, "the field to be an array"))?;
            let found = items.iter().any(|item| strict_eq(Some(item), target));
            found == (op == Operation::Includes)
        }
        Operation::Regex | Operation::Wildcard => match (&predicate.pattern, field) {
            (Some(pattern), Some(value)) => match value {
                Value::Null => false,
                Value::String(s) => pattern.is_match(s),
                other if op == Operation::Regex => pattern.is_match(&other.to_string()),
                _ => false,
            },
            _ => false,
        },
        Operation::Exists | Operation::StrictlyExists => {
            let wanted = target.as_bool().ok_or_else(|| type_error(op, "a boolean value"))?;
            let present = match op {
                Operation::Exists => !matches!(field, None | Some(Value::Null)),
                _ => field.is_some(),
            };
            present == wanted
        }
    })
}

fn type_error(op: Operation, expected: &'static str) -> ContentError {
    ContentError::FilterType {
        operation: op.name().to_string(),
        expected,
    }
}

/// `===` over JSON values; numbers compare numerically.
fn strict_eq(field: Option<&Value>, target: &Value) -> bool {
    match (field, target) {
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
    }
}

/// Relational comparison in the manner of `<` / `>` on loosely typed values.
///
/// `None` means the values are not comparable, which makes every ordering
/// comparator false.
pub(crate) fn compare(field: Option<&Value>, target: &Value) -> Option<Ordering> {
    let field = field?;
    match (field, target) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) => {
            let a = as_number(a)?;
            let b = as_number(b)?;
            a.partial_cmp(&b)
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compile_regex(value: &Value) -> Result<Regex> {
    let source = value.as_str().ok_or_else(|| type_error(Operation::Regex, "a pattern string"))?;

    // `/pattern/flags` or a bare pattern
    let (pattern, flags) = match source.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((pattern, flags)) if flags.chars().all(|c| "gimsuy".contains(c)) => (pattern, flags),
        _ => (source, ""),
    };

    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| ContentError::InvalidRegex(source.to_string(), e.to_string()))
}

fn compile_wildcard(value: &Value) -> Result<Regex> {
    let glob = value
        .as_str()
        .ok_or_else(|| type_error(Operation::Wildcard, "a pattern string"))?;
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    RegexBuilder::new(&pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| ContentError::InvalidRegex(glob.to_string(), e.to_string()))
}
