//! Filter resolution over the content graph.
//!
//! A filter may reach into computed fields and into referenced collections
//! (`{author: {name: {eq: "Eva"}}}`). Every node is first projected onto the
//! paths the filter mentions, following references and running resolvers the
//! way a GraphQL selection would, and the projection is then tested by
//! [`Sift`]. The matching selection is rendered as GraphQL for the debug log.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ContentError, Result};
use crate::overrides::ResolveContext;
use crate::path::{pascal_case, reference_key};
use crate::schema::model::{Cardinality, CollectionModel, ContentGraph, Relation};
use crate::shape::{FieldKind, ObjectShape, ScalarKind};
use crate::sift::{generate_filter_set_manifest, FilterSetManifest, Sift};

/// Nested field selection; a field with no children is a leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub fields: IndexMap<String, Selection>,
}

impl Selection {
    /// Selection covering every manifest path plus `id_field`.
    pub fn from_manifest(manifest: &FilterSetManifest, id_field: &str) -> Self {
        let mut selection = Self::default();
        selection.insert(&[id_field.to_string()]);
        for entry in manifest {
            selection.insert(&entry.path);
        }
        selection
    }

    pub fn insert(&mut self, path: &[String]) {
        if let Some((first, rest)) = path.split_first() {
            self.fields.entry(first.clone()).or_default().insert(rest);
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }

    /// `a b { c d { e } }`
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(name, sub)| {
                if sub.is_leaf() {
                    name.clone()
                } else {
                    format!("{} {{ {} }}", name, sub.render())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The GraphQL query equivalent to projecting `manifest` over a collection.
pub fn filter_selection(model: &CollectionModel, manifest: &FilterSetManifest) -> String {
    let selection = Selection::from_manifest(manifest, model.reference_field_name());
    format!("{{ all{} {{ {} }} }}", model.plural, selection.render())
}

/// Reference values of the nodes of `collection` that satisfy `filter`.
pub fn resolve_filter(filter: &Value, collection: &str, graph: &ContentGraph<'_>) -> Result<Vec<String>> {
    let model = graph.model(collection)?;
    let manifest = generate_filter_set_manifest(filter);
    let sift = Sift::from_manifest(&manifest)?;
    let selection = Selection::from_manifest(&manifest, model.reference_field_name());
    debug!(collection, query = %filter_selection(model, &manifest), "resolving filter");

    let projector = Projector { graph };
    let mut ids = Vec::new();
    for node in graph.nodes(collection) {
        let projected = projector.project_node(model, node, &selection)?;
        if sift.test(&projected)? {
            if let Some(key) = model.key_of(node) {
                ids.push(key);
            }
        }
    }
    debug!(collection, matched = ids.len(), "filter resolved");
    Ok(ids)
}

struct Projector<'g, 'a> {
    graph: &'g ContentGraph<'a>,
}

impl Projector<'_, '_> {
    fn project_node(&self, model: &CollectionModel, node: &Value, selection: &Selection) -> Result<Value> {
        self.project_object(&model.type_name, &model.shape, Some(&model.relations), node, selection)
    }

    fn project_object(
        &self,
        type_name: &str,
        shape: &ObjectShape,
        relations: Option<&IndexMap<String, Relation>>,
        raw: &Value,
        selection: &Selection,
    ) -> Result<Value> {
        let mut out = Map::new();
        for (name, sub) in &selection.fields {
            if let Some(relation) = relations.and_then(|r| r.get(name)) {
                out.insert(name.clone(), self.project_relation(relation, raw, sub)?);
                continue;
            }
            if name == "_collection" {
                out.insert(name.clone(), Value::String(type_name.to_string()));
                continue;
            }
            let field = shape.field(name).ok_or_else(|| ContentError::UnknownField {
                type_name: type_name.to_string(),
                field: name.clone(),
            })?;
            let value = raw.get(&field.source_key).unwrap_or(&Value::Null);
            let nested = format!("{}{}", type_name, pascal_case(name));
            let projected = self.project_kind(&nested, &field.kind, value, raw, sub)?;
            out.insert(name.clone(), projected);
        }
        Ok(Value::Object(out))
    }

    fn project_kind(
        &self,
        type_name: &str,
        kind: &FieldKind,
        value: &Value,
        parent: &Value,
        selection: &Selection,
    ) -> Result<Value> {
        match kind {
            FieldKind::Resolved(descriptor) => {
                let args = descriptor.with_defaults(&Map::new());
                descriptor.resolve(value, &ResolveContext { source: parent, args: &args })
            }
            FieldKind::Object(shape) => match value {
                Value::Object(_) if !selection.is_leaf() => {
                    self.project_object(type_name, shape, None, value, selection)
                }
                Value::Object(_) => Ok(value.clone()),
                _ => Ok(Value::Null),
            },
            FieldKind::List(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.project_kind(type_name, inner, item, item, selection))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                Value::Null => Ok(Value::Null),
                single => Ok(Value::Array(vec![self.project_kind(
                    type_name, inner, single, single, selection,
                )?])),
            },
            FieldKind::Scalar(ScalarKind::Json) => Ok(value.clone()),
            FieldKind::Scalar(_) | FieldKind::Unknown => match selection.fields.keys().next() {
                Some(field) => Err(ContentError::UnknownField {
                    type_name: type_name.to_string(),
                    field: field.clone(),
                }),
                None => Ok(value.clone()),
            },
        }
    }

    fn project_relation(&self, relation: &Relation, raw: &Value, selection: &Selection) -> Result<Value> {
        let value = raw.get(&relation.source_key).unwrap_or(&Value::Null);
        if selection.is_leaf() {
            return Ok(value.clone());
        }
        let target = self.graph.model(&relation.target)?;
        match relation.cardinality {
            Cardinality::One => match reference_key(value) {
                Some(key) => match self.graph.find_by_reference(&relation.target, &key)? {
                    Some(node) => self.project_node(target, node, selection),
                    None => Ok(Value::Null),
                },
                None => Ok(Value::Null),
            },
            Cardinality::Many => {
                let keys = reference_keys(value);
                self.graph
                    .find_many(&relation.target, &keys)?
                    .into_iter()
                    .map(|node| self.project_node(target, node, selection))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
        }
    }
}

/// Reference values held by a list (or single) reference field.
pub fn reference_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(reference_key).collect(),
        other => reference_key(other).into_iter().collect(),
    }
}
