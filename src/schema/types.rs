//! GraphQL object and input types derived from collection shapes.

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Object, ResolverContext, TypeRef,
};
use async_graphql::Value as GqlValue;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::query::{relation_field, ORDER_ENUM};
use crate::error::{ContentError, Result};
use crate::overrides::{ResolveContext, ResolverDescriptor};
use crate::path::pascal_case;
use crate::schema::model::CollectionModel;
use crate::shape::{FieldKind, ObjectShape, ScalarKind, ShapeField, METADATA_FIELDS};

pub const JSON_SCALAR: &str = "JSON";
const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID", JSON_SCALAR];

/// Parse a GraphQL type reference such as `String`, `[Int]` or `[String!]!`.
pub fn parse_type_ref(text: &str) -> Result<TypeRef> {
    let text = text.trim();
    if let Some(inner) = text.strip_suffix('!') {
        return Ok(TypeRef::NonNull(Box::new(parse_type_ref(inner)?)));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return Ok(TypeRef::List(Box::new(parse_type_ref(inner)?)));
    }
    let valid = text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ContentError::Schema(format!("invalid type reference `{}`", text)));
    }
    Ok(TypeRef::named(text.to_string()))
}

/// Field arguments as JSON.
pub fn args_json(ctx: &ResolverContext<'_>) -> Result<Map<String, Value>> {
    let mut args = Map::new();
    for (name, value) in ctx.args.as_index_map() {
        args.insert(name.to_string(), value.clone().into_json()?);
    }
    Ok(args)
}

fn gql(value: Value) -> GqlValue {
    GqlValue::from_json(value).unwrap_or(GqlValue::Null)
}

fn coerce_scalar(kind: ScalarKind, value: Value) -> Value {
    match (kind, value) {
        (ScalarKind::String, Value::String(s)) => Value::String(s),
        (ScalarKind::String, Value::Null) => Value::Null,
        (ScalarKind::String, other) => Value::String(other.to_string()),
        (_, other) => other,
    }
}

/// Output value for an inferred field kind.
pub fn output_value<'a>(kind: &FieldKind, value: Value) -> Option<FieldValue<'a>> {
    if value.is_null() {
        return None;
    }
    match kind {
        FieldKind::Unknown => Some(FieldValue::value(gql(coerce_scalar(ScalarKind::String, value)))),
        FieldKind::Scalar(scalar) => Some(FieldValue::value(gql(coerce_scalar(*scalar, value)))),
        FieldKind::Object(shape) if shape.fields.is_empty() => Some(FieldValue::value(gql(value))),
        FieldKind::Object(_) => value.is_object().then(|| FieldValue::owned_any(value)),
        FieldKind::List(inner) => {
            let items = match value {
                Value::Array(items) => items,
                single => vec![single],
            };
            Some(FieldValue::list(
                items
                    .into_iter()
                    .map(|item| output_value(inner, item).unwrap_or(FieldValue::NULL)),
            ))
        }
        FieldKind::Resolved(descriptor) => output_for_type(&descriptor.type_ref, value),
    }
}

/// Output value for a value produced by a resolver of type `type_ref`.
pub fn output_for_type<'a>(type_ref: &str, value: Value) -> Option<FieldValue<'a>> {
    if value.is_null() {
        return None;
    }
    let type_ref = type_ref.trim().trim_end_matches('!');
    if let Some(inner) = type_ref.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let items = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        return Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| output_for_type(inner, item).unwrap_or(FieldValue::NULL)),
        ));
    }
    if BUILTIN_SCALARS.contains(&type_ref) || !value.is_object() {
        Some(FieldValue::value(gql(value)))
    } else {
        Some(FieldValue::owned_any(value))
    }
}

fn resolve_field<'a>(
    ctx: &ResolverContext<'_>,
    source_key: &str,
    kind: &FieldKind,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
    let value = parent.get(source_key).cloned().unwrap_or(Value::Null);
    if let FieldKind::Resolved(descriptor) = kind {
        let args = descriptor.with_defaults(&args_json(ctx)?);
        let resolved = descriptor.resolve(&value, &ResolveContext { source: parent, args: &args })?;
        return Ok(output_for_type(&descriptor.type_ref, resolved));
    }
    Ok(output_value(kind, value))
}

fn descriptor_arguments(mut field: Field, descriptor: &ResolverDescriptor) -> Result<Field> {
    for arg in &descriptor.arguments {
        let mut input = InputValue::new(arg.name.clone(), parse_type_ref(&arg.type_ref)?);
        if let Some(default) = &arg.default {
            input = input.default_value(gql(default.clone()));
        }
        field = field.argument(input);
    }
    Ok(field)
}

/// Builds the object and input types of every collection.
///
/// Generated type names are unique: a nested type whose name is taken gets a
/// numeric suffix.
pub struct TypeBuilder {
    pub objects: Vec<Object>,
    pub inputs: Vec<InputObject>,
    names: HashSet<String>,
}

impl TypeBuilder {
    /// Reserves the root, scalar and collection type names.
    pub fn new<'a>(models: impl IntoIterator<Item = &'a CollectionModel>) -> Self {
        let mut names: HashSet<String> = BUILTIN_SCALARS
            .iter()
            .chain(&["Query", "Mutation", ORDER_ENUM])
            .map(|name| name.to_string())
            .collect();
        for model in models {
            names.insert(model.type_name.clone());
            names.insert(format!("{}Input", model.type_name));
        }
        Self {
            objects: Vec::new(),
            inputs: Vec::new(),
            names,
        }
    }

    /// `base`, or `base2`, `base3`, ... when `base` is already a type.
    fn claim(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut suffix = 2;
        while !self.names.insert(name.clone()) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        if name != base {
            warn!(type_name = %base, renamed = %name, "generated type name taken, renamed");
        }
        name
    }

    /// The collection's object type, its nested types and `<Name>Input`.
    pub fn add_collection(&mut self, model: &CollectionModel) -> Result<()> {
        let collection_name = model.name().to_string();
        let mut object = Object::new(model.type_name.clone()).field(Field::new(
            "_collection",
            TypeRef::named_nn(TypeRef::STRING),
            move |_| {
                let name = collection_name.clone();
                FieldFuture::new(async move { Ok(Some(FieldValue::value(GqlValue::from(name)))) })
            },
        ));

        for field in model.shape.fields.values() {
            if let Some(relation) = model.relations.get(&field.name) {
                object = object.field(relation_field(&field.name, relation));
                continue;
            }
            object = object.field(self.data_field(&model.type_name, field)?);
        }
        self.objects.push(object);

        let input_name = format!("{}Input", model.type_name);
        if let Some(input) = self.input_object(&input_name, &model.type_name, &model.shape, METADATA_FIELDS) {
            self.inputs.push(input);
        }
        debug!(collection = %model.name(), fields = model.shape.fields.len(), "object type built");
        Ok(())
    }

    fn nested_object(&mut self, name: &str, shape: &ObjectShape) -> Result<()> {
        let mut object = Object::new(name.to_string());
        for field in shape.fields.values() {
            object = object.field(self.data_field(name, field)?);
        }
        self.objects.push(object);
        Ok(())
    }

    fn output_type(&mut self, type_name: &str, kind: &FieldKind) -> Result<TypeRef> {
        Ok(match kind {
            FieldKind::Unknown => TypeRef::named(TypeRef::STRING),
            FieldKind::Scalar(scalar) => TypeRef::named(scalar.type_name()),
            FieldKind::List(inner) => TypeRef::List(Box::new(self.output_type(type_name, inner)?)),
            FieldKind::Object(shape) if shape.fields.is_empty() => TypeRef::named(JSON_SCALAR),
            FieldKind::Object(shape) => {
                let name = self.claim(type_name);
                self.nested_object(&name, shape)?;
                TypeRef::named(name)
            }
            FieldKind::Resolved(descriptor) => parse_type_ref(&descriptor.type_ref)?,
        })
    }

    fn data_field(&mut self, parent: &str, field: &ShapeField) -> Result<Field> {
        let nested = format!("{}{}", parent, pascal_case(&field.name));
        let kind = match &field.kind {
            FieldKind::Object(shape) if shape.fields.is_empty() => FieldKind::Scalar(ScalarKind::Json),
            other => other.clone(),
        };
        let type_ref = self.output_type(&nested, &kind)?;
        let source_key = Arc::new(field.source_key.clone());
        let kind = Arc::new(kind);

        let resolver_kind = Arc::clone(&kind);
        let gql_field = Field::new(field.name.clone(), type_ref, move |ctx| {
            let source_key = Arc::clone(&source_key);
            let kind = Arc::clone(&resolver_kind);
            FieldFuture::new(async move { resolve_field(&ctx, &source_key, &kind) })
        });

        match kind.as_ref() {
            FieldKind::Resolved(descriptor) => descriptor_arguments(gql_field, descriptor),
            _ => Ok(gql_field),
        }
    }

    /// Input type mirroring `shape`; computed fields and `skip` keys are left out.
    fn input_object(
        &mut self,
        name: &str,
        type_name: &str,
        shape: &ObjectShape,
        skip: &[&str],
    ) -> Option<InputObject> {
        let mut input = InputObject::new(name.to_string());
        let mut empty = true;
        for field in shape.fields.values() {
            if skip.contains(&field.source_key.as_str()) {
                continue;
            }
            let nested = format!("{}{}", type_name, pascal_case(&field.name));
            if let Some(type_ref) = self.input_type(&nested, &field.kind) {
                input = input.field(InputValue::new(field.name.clone(), type_ref));
                empty = false;
            }
        }
        (!empty).then_some(input)
    }

    fn input_type(&mut self, type_name: &str, kind: &FieldKind) -> Option<TypeRef> {
        match kind {
            FieldKind::Unknown => Some(TypeRef::named(TypeRef::STRING)),
            FieldKind::Scalar(scalar) => Some(TypeRef::named(scalar.type_name())),
            FieldKind::List(inner) => self
                .input_type(type_name, inner)
                .map(|inner| TypeRef::List(Box::new(inner))),
            FieldKind::Object(shape) => {
                let name = self.claim(&format!("{}Input", type_name));
                match self.input_object(&name, type_name, shape, &[]) {
                    Some(input) => {
                        self.inputs.push(input);
                        Some(TypeRef::named(name))
                    }
                    None => Some(TypeRef::named(JSON_SCALAR)),
                }
            }
            FieldKind::Resolved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_type_ref() {
        assert_eq!(parse_type_ref("String").unwrap().to_string(), "String");
        assert_eq!(parse_type_ref("[Int]").unwrap().to_string(), "[Int]");
        assert_eq!(parse_type_ref("[String!]!").unwrap().to_string(), "[String!]!");
        assert!(parse_type_ref("[String").is_err());
        assert!(parse_type_ref("9lives").is_err());
    }

    #[test]
    fn test_claim_suffixes_taken_names() {
        let mut builder = TypeBuilder::new(std::iter::empty());
        assert_eq!(builder.claim("PostMeta"), "PostMeta");
        assert_eq!(builder.claim("PostMeta"), "PostMeta2");
        assert_eq!(builder.claim("PostMeta"), "PostMeta3");
        assert_eq!(builder.claim("Query"), "Query2");
    }

    #[test]
    fn test_coerce_scalar() {
        assert_eq!(coerce_scalar(ScalarKind::String, json!(40)), json!("40"));
        assert_eq!(coerce_scalar(ScalarKind::Int, json!(40)), json!(40));
        assert!(output_value(&FieldKind::Scalar(ScalarKind::String), Value::Null).is_none());
        assert!(output_for_type("[String]", json!(["a"])).is_some());
    }
}
