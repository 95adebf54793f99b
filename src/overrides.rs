//! Field overrides.
//!
//! A collection may declare overrides that replace the inferred type and
//! resolver of a field. Each override names a path:
//!
//! - `a.b`: field `b` of object field `a`
//! - `arr[]`: the whole list `arr`; the resolver receives the entire array
//! - `arr[]obj.c`: property `c` of every element of the object list `arr`;
//!   the resolver runs once per element
//!
//! Overrides compile into a [`ResolverTree`], the same structure transformers
//! use for their preknown schema fragments.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ContentError, Result};

/// Arguments a resolver sees besides the field value.
pub struct ResolveContext<'a> {
    /// The object the field belongs to.
    pub source: &'a Value,
    /// Field arguments, defaults applied.
    pub args: &'a Map<String, Value>,
}

pub type ResolveFn = Arc<dyn Fn(&Value, &ResolveContext<'_>) -> Result<Value> + Send + Sync>;

/// A field argument exposed by a computed field.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: String,
    pub type_ref: String,
    pub default: Option<Value>,
}

/// Type and resolver of a computed field.
#[derive(Clone)]
pub struct ResolverDescriptor {
    /// GraphQL type, e.g. `String` or `[String]`.
    pub type_ref: String,
    pub arguments: Vec<ArgumentSpec>,
    resolve: ResolveFn,
}

impl ResolverDescriptor {
    pub fn new<F>(type_ref: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Value, &ResolveContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_fn(type_ref, Arc::new(resolve))
    }

    pub fn from_fn(type_ref: impl Into<String>, resolve: ResolveFn) -> Self {
        Self {
            type_ref: type_ref.into(),
            arguments: Vec::new(),
            resolve,
        }
    }

    /// Add an argument with an optional default.
    pub fn argument(
        mut self,
        name: impl Into<String>,
        type_ref: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        self.arguments.push(ArgumentSpec {
            name: name.into(),
            type_ref: type_ref.into(),
            default,
        });
        self
    }

    /// Run the resolver. `value` is the field's own value in `source`.
    pub fn resolve(&self, value: &Value, ctx: &ResolveContext<'_>) -> Result<Value> {
        (self.resolve)(value, ctx)
    }

    /// Fill in argument defaults missing from `given`.
    pub fn with_defaults(&self, given: &Map<String, Value>) -> Map<String, Value> {
        let mut args = given.clone();
        for arg in &self.arguments {
            if let Some(default) = &arg.default {
                args.entry(arg.name.clone()).or_insert_with(|| default.clone());
            }
        }
        args
    }
}

impl fmt::Debug for ResolverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverDescriptor")
            .field("type_ref", &self.type_ref)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Nested resolver descriptors keyed by content field name.
#[derive(Debug, Clone, Default)]
pub struct ResolverTree {
    pub fields: IndexMap<String, ResolverNode>,
}

#[derive(Debug, Clone)]
pub enum ResolverNode {
    Resolver(ResolverDescriptor),
    Object(ResolverTree),
    /// Shape of a single list element.
    List(Box<ResolverNode>),
}

impl ResolverTree {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look a node up by content path.
    pub fn get(&self, path: &[&str]) -> Option<&ResolverNode> {
        let (first, rest) = path.split_first()?;
        let node = self.fields.get(*first)?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            ResolverNode::Object(tree) => tree.get(rest),
            ResolverNode::List(inner) => match inner.as_ref() {
                ResolverNode::Object(tree) => tree.get(rest),
                _ => None,
            },
            ResolverNode::Resolver(_) => None,
        }
    }

    /// Union of two trees; on a clash `other` wins.
    pub fn merged(mut self, other: &ResolverTree) -> ResolverTree {
        for (key, node) in &other.fields {
            let merged = match (self.fields.get(key), node) {
                (Some(ResolverNode::Object(mine)), ResolverNode::Object(theirs)) => {
                    ResolverNode::Object(mine.clone().merged(theirs))
                }
                _ => node.clone(),
            };
            self.fields.insert(key.clone(), merged);
        }
        self
    }
}

/// A user-declared field override.
#[derive(Clone)]
pub struct Override {
    pub field: String,
    pub type_name: String,
    pub resolve: ResolveFn,
}

impl Override {
    pub fn new<F>(field: impl Into<String>, type_name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Value, &ResolveContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            type_name: type_name.into(),
            resolve: Arc::new(resolve),
        }
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("field", &self.field)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// One step of an override path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    EachElement,
}

/// Parse `a.b`, `arr[]` and `arr[]obj.c` style paths.
pub fn parse_path(field: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: &str| ContentError::InvalidOverridePath(field.to_string(), reason.to_string());

    let raw_segments: Vec<&str> = field.split('.').collect();
    let mut segments = Vec::with_capacity(raw_segments.len() + 1);

    for (i, raw) in raw_segments.iter().enumerate() {
        let (key, marker) = match raw.find("[]") {
            Some(idx) => (&raw[..idx], Some(&raw[idx + 2..])),
            None => (*raw, None),
        };
        if key.is_empty() {
            return Err(invalid("empty segment"));
        }
        if key.contains(['[', ']']) {
            return Err(invalid("only `[]` and `[]obj` list markers are supported"));
        }
        segments.push(Segment::Key(key.to_string()));

        match marker {
            None => {}
            Some("") => segments.push(Segment::EachElement),
            Some("obj") if i + 1 < raw_segments.len() => segments.push(Segment::EachElement),
            Some("obj") => return Err(invalid("`[]obj` must be followed by a property")),
            Some(_) => return Err(invalid("unexpected characters after `[]`")),
        }
    }
    Ok(segments)
}

/// Compile overrides into a resolver tree. Later overrides win on collisions.
pub fn compile(overrides: &[Override]) -> Result<ResolverTree> {
    overrides.iter().try_fold(ResolverTree::default(), |tree, o| {
        let segments = parse_path(&o.field)?;
        let ends_with_array = segments.last() == Some(&Segment::EachElement);
        let (type_ref, target) = if ends_with_array {
            (format!("[{}]", o.type_name), &segments[..segments.len() - 1])
        } else {
            (o.type_name.clone(), &segments[..])
        };
        let descriptor = ResolverDescriptor::from_fn(type_ref, Arc::clone(&o.resolve));
        Ok(insert(tree, target, descriptor, &o.field))
    })
}

fn insert(mut tree: ResolverTree, segments: &[Segment], descriptor: ResolverDescriptor, field: &str) -> ResolverTree {
    let Some((Segment::Key(key), rest)) = segments.split_first() else {
        return tree;
    };
    let existing = tree.fields.get(key).cloned();
    let node = insert_node(existing, rest, descriptor, field);
    tree.fields.insert(key.clone(), node);
    tree
}

fn insert_node(
    existing: Option<ResolverNode>,
    rest: &[Segment],
    descriptor: ResolverDescriptor,
    field: &str,
) -> ResolverNode {
    match rest.first() {
        None => {
            if existing.is_some() {
                warn!(field, "override replaces an earlier override on the same field");
            }
            ResolverNode::Resolver(descriptor)
        }
        Some(Segment::EachElement) => {
            let inner = match existing {
                Some(ResolverNode::List(inner)) => Some(*inner),
                _ => None,
            };
            ResolverNode::List(Box::new(insert_node(inner, &rest[1..], descriptor, field)))
        }
        Some(Segment::Key(_)) => {
            let subtree = match existing {
                Some(ResolverNode::Object(tree)) => tree,
                _ => ResolverTree::default(),
            };
            ResolverNode::Object(insert(subtree, rest, descriptor, field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uppercase_all(value: &Value, _: &ResolveContext<'_>) -> Result<Value> {
        Ok(match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| json!(v.as_str().unwrap_or_default().to_uppercase()))
                    .collect(),
            ),
            other => other.clone(),
        })
    }

    fn resolver<'a>(tree: &'a ResolverTree, path: &[&str]) -> &'a ResolverDescriptor {
        match tree.get(path) {
            Some(ResolverNode::Resolver(d)) => d,
            other => panic!("expected resolver at {:?}, got {:?}", path, other),
        }
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse_path("a.b").unwrap(),
            vec![Segment::Key("a".into()), Segment::Key("b".into())]
        );
        assert_eq!(
            parse_path("basic[]").unwrap(),
            vec![Segment::Key("basic".into()), Segment::EachElement]
        );
        assert_eq!(
            parse_path("basic[]obj.test").unwrap(),
            vec![
                Segment::Key("basic".into()),
                Segment::EachElement,
                Segment::Key("test".into())
            ]
        );
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a[0]").is_err());
        assert!(parse_path("a[]obj").is_err());
    }

    #[test]
    fn test_bare_array_override_receives_whole_array() {
        let tree = compile(&[Override::new("basic[]", "String", uppercase_all)]).unwrap();
        let descriptor = resolver(&tree, &["basic"]);
        assert_eq!(descriptor.type_ref, "[String]");

        let source = json!({"basic": ["x"]});
        let ctx = ResolveContext { source: &source, args: &Map::new() };
        assert_eq!(descriptor.resolve(&json!(["x"]), &ctx).unwrap(), json!(["X"]));
    }

    #[test]
    fn test_object_list_override_is_per_element() {
        let tree = compile(&[Override::new("basic[]obj.test", "String", |value, _| {
            Ok(json!(format!("<{}>", value.as_str().unwrap_or_default())))
        })])
        .unwrap();

        match tree.fields.get("basic") {
            Some(ResolverNode::List(inner)) => assert!(matches!(inner.as_ref(), ResolverNode::Object(_))),
            other => panic!("expected list node, got {:?}", other),
        }

        let descriptor = resolver(&tree, &["basic", "test"]);
        assert_eq!(descriptor.type_ref, "String");
        let element = json!({"test": "inner"});
        let ctx = ResolveContext { source: &element, args: &Map::new() };
        assert_eq!(descriptor.resolve(&element["test"], &ctx).unwrap(), json!("<inner>"));
    }

    #[test]
    fn test_nested_paths_share_parents() {
        let tree = compile(&[
            Override::new("a.b", "String", |v, _| Ok(v.clone())),
            Override::new("a.c", "Int", |v, _| Ok(v.clone())),
        ])
        .unwrap();
        assert_eq!(resolver(&tree, &["a", "b"]).type_ref, "String");
        assert_eq!(resolver(&tree, &["a", "c"]).type_ref, "Int");
    }

    #[test]
    fn test_colliding_override_last_wins() {
        let tree = compile(&[
            Override::new("a.b", "String", |_, _| Ok(json!("first"))),
            Override::new("a.b", "String", |_, _| Ok(json!("second"))),
        ])
        .unwrap();
        let source = json!({});
        let ctx = ResolveContext { source: &source, args: &Map::new() };
        let value = resolver(&tree, &["a", "b"]).resolve(&Value::Null, &ctx).unwrap();
        assert_eq!(value, json!("second"));
    }

    #[test]
    fn test_with_defaults() {
        let descriptor = ResolverDescriptor::new("Int", |_, _| Ok(Value::Null))
            .argument("speed", "Int", Some(json!(230)));
        let args = descriptor.with_defaults(&Map::new());
        assert_eq!(args.get("speed"), Some(&json!(230)));
    }
}
