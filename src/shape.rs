//! Collection shape reducer.
//!
//! Folds every node of a collection into one [`ObjectShape`]: the union of all
//! observed fields, each nullable, with override and fragment resolvers
//! layered in. The shape drives GraphQL type generation and is never returned
//! as data.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::overrides::{ResolverDescriptor, ResolverNode, ResolverTree};
use crate::path::{transform_field_name, FieldTransform};

/// Metadata fields every collection type exposes.
pub const METADATA_FIELDS: &[&str] = &["_filename", "_path", "_slug"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Boolean,
    /// Mixed or free-form values.
    Json,
}

impl ScalarKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Json => "JSON",
        }
    }
}

/// Inferred kind of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Only nulls or empty lists were seen.
    Unknown,
    Scalar(ScalarKind),
    List(Box<FieldKind>),
    Object(ObjectShape),
    /// Computed by an override or a transformer fragment.
    Resolved(ResolverDescriptor),
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        match self {
            Self::List(_) => true,
            Self::Resolved(d) => d.type_ref.trim_end_matches('!').starts_with('['),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShapeField {
    /// GraphQL field name.
    pub name: String,
    /// Key of the field in content nodes.
    pub source_key: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectShape {
    pub fields: IndexMap<String, ShapeField>,
}

impl ObjectShape {
    pub fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields.get(name)
    }

    pub fn field_by_source(&self, key: &str) -> Option<&ShapeField> {
        self.fields.values().find(|f| f.source_key == key)
    }

    fn insert(&mut self, key: &str, kind: FieldKind) {
        self.fields.insert(
            key.to_string(),
            ShapeField {
                name: key.to_string(),
                source_key: key.to_string(),
                kind,
            },
        );
    }
}

/// Infer the kind of a single value.
pub fn infer(value: &Value) -> FieldKind {
    match value {
        Value::Null => FieldKind::Unknown,
        Value::Bool(_) => FieldKind::Scalar(ScalarKind::Boolean),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => FieldKind::Scalar(ScalarKind::Int),
            _ => FieldKind::Scalar(ScalarKind::Float),
        },
        Value::String(_) => FieldKind::Scalar(ScalarKind::String),
        Value::Array(items) => FieldKind::List(Box::new(
            items
                .iter()
                .fold(FieldKind::Unknown, |acc, item| merge(acc, infer(item), "[]")),
        )),
        Value::Object(map) => {
            let mut shape = ObjectShape::default();
            for (key, child) in map {
                shape.insert(key, infer(child));
            }
            FieldKind::Object(shape)
        }
    }
}

/// Combine two observations of the same field.
///
/// Computed resolvers always win. Otherwise kinds widen: `Int` and `Float`
/// become `Float`, a value and a list of that value become the list, anything
/// else incompatible becomes `JSON`.
pub fn merge(a: FieldKind, b: FieldKind, field: &str) -> FieldKind {
    use FieldKind::*;
    match (a, b) {
        (Resolved(d), _) | (_, Resolved(d)) => Resolved(d),
        (Unknown, other) | (other, Unknown) => other,
        (Scalar(ScalarKind::Json), _) | (_, Scalar(ScalarKind::Json)) => Scalar(ScalarKind::Json),
        (Scalar(x), Scalar(y)) if x == y => Scalar(x),
        (Scalar(ScalarKind::Int), Scalar(ScalarKind::Float))
        | (Scalar(ScalarKind::Float), Scalar(ScalarKind::Int)) => Scalar(ScalarKind::Float),
        (List(x), List(y)) => List(Box::new(merge(*x, *y, field))),
        (List(x), other @ (Scalar(_) | Object(_))) | (other @ (Scalar(_) | Object(_)), List(x)) => {
            List(Box::new(merge(*x, other, field)))
        }
        (Object(x), Object(y)) => Object(merge_objects(x, y)),
        (a, b) => {
            warn!(field, left = kind_label(&a), right = kind_label(&b), "conflicting field kinds widened to JSON");
            Scalar(ScalarKind::Json)
        }
    }
}

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Unknown => "unknown",
        FieldKind::Scalar(s) => s.type_name(),
        FieldKind::List(_) => "list",
        FieldKind::Object(_) => "object",
        FieldKind::Resolved(_) => "resolved",
    }
}

fn merge_objects(mut base: ObjectShape, other: ObjectShape) -> ObjectShape {
    for (key, field) in other.fields {
        match base.fields.get_mut(&key) {
            Some(existing) => {
                let current = std::mem::replace(&mut existing.kind, FieldKind::Unknown);
                existing.kind = merge(current, field.kind, &key);
            }
            None => {
                base.fields.insert(key, field);
            }
        }
    }
    base
}

/// Layer a node over fragment defaults: node values win, objects merge.
pub fn overlay(defaults: FieldKind, node: FieldKind) -> FieldKind {
    match (defaults, node) {
        (FieldKind::Object(d), FieldKind::Object(n)) => FieldKind::Object(overlay_objects(d, n)),
        (d, FieldKind::Unknown) => d,
        (_, n) => n,
    }
}

fn overlay_objects(mut defaults: ObjectShape, node: ObjectShape) -> ObjectShape {
    for (key, field) in node.fields {
        let kind = match defaults.fields.get(&key) {
            Some(existing) => overlay(existing.kind.clone(), field.kind),
            None => field.kind,
        };
        defaults.insert(&key, kind);
    }
    defaults
}

/// Turn a resolver tree into a shape.
pub fn from_tree(tree: &ResolverTree) -> ObjectShape {
    let mut shape = ObjectShape::default();
    for (key, node) in &tree.fields {
        shape.insert(key, node_kind(node));
    }
    shape
}

fn node_kind(node: &ResolverNode) -> FieldKind {
    match node {
        ResolverNode::Resolver(d) => FieldKind::Resolved(d.clone()),
        ResolverNode::Object(tree) => FieldKind::Object(from_tree(tree)),
        ResolverNode::List(inner) => FieldKind::List(Box::new(node_kind(inner))),
    }
}

/// Reduce a collection's nodes into its representative shape.
///
/// Overrides are authoritative; every node is layered over the preknown
/// fragments before being folded in. Field names go through `transform`
/// last, which fails on names that still contain `[]`.
pub fn reduce(
    collection: &str,
    nodes: &[Value],
    overrides: &ResolverTree,
    fragments: &ResolverTree,
    reference_field: &str,
    transform: &FieldTransform,
) -> Result<ObjectShape> {
    let mut shape = from_tree(overrides);
    let fragment_shape = from_tree(fragments);

    for node in nodes {
        let FieldKind::Object(node_shape) = infer(node) else {
            warn!(collection, "skipping non-object node");
            continue;
        };
        let layered = overlay_objects(fragment_shape.clone(), node_shape);
        shape = merge_objects(shape, layered);
    }

    for key in std::iter::once(reference_field).chain(METADATA_FIELDS.iter().copied()) {
        if !shape.fields.contains_key(key) {
            shape.insert(key, FieldKind::Scalar(ScalarKind::String));
        }
    }
    shape.fields.shift_remove("_collection");

    debug!(collection, fields = shape.fields.len(), nodes = nodes.len(), "reduced collection shape");
    apply_names(shape, transform)
}

fn apply_names(shape: ObjectShape, transform: &FieldTransform) -> Result<ObjectShape> {
    let mut named: IndexMap<String, ShapeField> = IndexMap::new();
    for (key, field) in shape.fields {
        let name = transform_field_name(&key, transform)?;
        let kind = name_kind(field.kind, transform)?;
        match named.get_mut(&name) {
            Some(existing) => {
                warn!(field = %name, first = %existing.source_key, second = %key, "two content keys map to the same field name");
                let current = std::mem::replace(&mut existing.kind, FieldKind::Unknown);
                existing.kind = merge(current, kind, &name);
            }
            None => {
                named.insert(
                    name.clone(),
                    ShapeField {
                        name,
                        source_key: field.source_key,
                        kind,
                    },
                );
            }
        }
    }
    Ok(ObjectShape { fields: named })
}

fn name_kind(kind: FieldKind, transform: &FieldTransform) -> Result<FieldKind> {
    Ok(match kind {
        FieldKind::Object(shape) => FieldKind::Object(apply_names(shape, transform)?),
        FieldKind::List(inner) => FieldKind::List(Box::new(name_kind(*inner, transform)?)),
        other => other,
    })
}
