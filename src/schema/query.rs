//! Query root fields and reference relations.
//!
//! Every collection gets `Query.<Name>(<referenceField>: ID!)` and
//! `Query.all<Plural>(skip, limit, order, sortBy, filter)`. Reference fields
//! become relations: a list field resolves many nodes through the same
//! argument pipeline as `all<Plural>`, a single value resolves one node.

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, TypeRef};
use async_graphql::{Name, Value as GqlValue};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::model::{Cardinality, CollectionModel, Relation, Runtime};
use super::types::{args_json, JSON_SCALAR};
use crate::path::{legalize, reference_key};
use crate::resolvers::args::{resolve_query_args, QueryArgs};
use crate::resolvers::filter::reference_keys;

pub const ORDER_ENUM: &str = "Order";

/// skip, limit, order, sortBy and filter.
pub fn with_standard_arguments(field: Field) -> Field {
    field
        .argument(InputValue::new("skip", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
        .argument(
            InputValue::new("order", TypeRef::named(ORDER_ENUM))
                .default_value(GqlValue::Enum(Name::new("ASC"))),
        )
        .argument(InputValue::new("sortBy", TypeRef::named(TypeRef::STRING)))
        .argument(InputValue::new("filter", TypeRef::named(JSON_SCALAR)))
}

/// `Query.<Name>`: exact match on the reference field.
pub fn find_by_reference_field(model: &CollectionModel) -> Field {
    let collection = model.name().to_string();
    let arg_name = model.reference_field_name().to_string();
    let arg = arg_name.clone();

    Field::new(model.type_name.clone(), TypeRef::named(model.type_name.clone()), move |ctx| {
        let collection = collection.clone();
        let arg = arg.clone();
        FieldFuture::new(async move {
            let runtime = ctx.data::<Arc<Runtime>>()?;
            let args = args_json(&ctx)?;
            let Some(key) = args.get(&arg).and_then(reference_key) else {
                return Ok(None);
            };
            let nodes = runtime.store.read().await;
            let graph = runtime.graph(&nodes);
            Ok(graph
                .find_by_reference(&collection, &key)?
                .cloned()
                .map(FieldValue::owned_any))
        })
    })
    .argument(InputValue::new(arg_name, TypeRef::named_nn(TypeRef::ID)))
}

/// `Query.all<Plural>`: every node, through the argument pipeline.
pub fn all_field(model: &CollectionModel) -> Field {
    let collection = model.name().to_string();
    let field = Field::new(
        format!("all{}", model.plural),
        TypeRef::named_nn_list_nn(model.type_name.clone()),
        move |ctx| {
            let collection = collection.clone();
            FieldFuture::new(async move {
                let runtime = ctx.data::<Arc<Runtime>>()?;
                let args = QueryArgs::from_args(&args_json(&ctx)?)?;
                let nodes = runtime.store.read().await;
                let graph = runtime.graph(&nodes);
                let found = resolve_query_args(graph.nodes(&collection).to_vec(), &args, &graph, &collection)?;
                Ok(Some(FieldValue::list(found.into_iter().map(FieldValue::owned_any))))
            })
        },
    );
    with_standard_arguments(field)
}

/// Relation field replacing the raw reference field `name`.
pub fn relation_field(name: &str, relation: &Relation) -> Field {
    let target = relation.target.clone();
    let target_type = legalize(&relation.target);
    let source_key = relation.source_key.clone();

    match relation.cardinality {
        Cardinality::One => Field::new(name.to_string(), TypeRef::named(target_type), move |ctx| {
            let target = target.clone();
            let source_key = source_key.clone();
            FieldFuture::new(async move {
                let runtime = ctx.data::<Arc<Runtime>>()?;
                let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
                let Some(key) = parent.get(&source_key).and_then(reference_key) else {
                    return Ok(None);
                };
                let nodes = runtime.store.read().await;
                let graph = runtime.graph(&nodes);
                Ok(graph
                    .find_by_reference(&target, &key)?
                    .cloned()
                    .map(FieldValue::owned_any))
            })
        }),
        Cardinality::Many => {
            let field = Field::new(name.to_string(), TypeRef::named_nn_list(target_type), move |ctx| {
                let target = target.clone();
                let source_key = source_key.clone();
                FieldFuture::new(async move {
                    let runtime = ctx.data::<Arc<Runtime>>()?;
                    let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
                    let mut args = args_json(&ctx)?;
                    let keys = match args.remove("references") {
                        Some(Value::Null) | None => reference_keys(parent.get(&source_key).unwrap_or(&Value::Null)),
                        Some(explicit) => reference_keys(&explicit),
                    };
                    let query = QueryArgs::from_args(&args)?;
                    let nodes = runtime.store.read().await;
                    let graph = runtime.graph(&nodes);
                    let related: Vec<Value> = graph.find_many(&target, &keys)?.into_iter().cloned().collect();
                    let found = resolve_query_args(related, &query, &graph, &target)?;
                    Ok(Some(FieldValue::list(found.into_iter().map(FieldValue::owned_any))))
                })
            });
            with_standard_arguments(field).argument(InputValue::new(
                "references",
                TypeRef::named_list(TypeRef::STRING),
            ))
        }
    }
}

/// Reference relations declared for `model` whose field exists in its shape.
pub fn wire_relations(
    model: &CollectionModel,
    collections: &IndexMap<String, CollectionModel>,
) -> Vec<(String, Relation)> {
    let mut relations = Vec::new();
    for (source_key, target) in &model.entry.refs {
        let Some(field) = model.shape.field_by_source(source_key) else {
            warn!(collection = %model.name(), field = %source_key, "ref field not found in content, relation skipped");
            continue;
        };
        if !collections.contains_key(target) {
            warn!(collection = %model.name(), field = %source_key, target = %target, "ref points at an unknown collection, relation skipped");
            continue;
        }
        let cardinality = if field.kind.is_list() {
            Cardinality::Many
        } else {
            Cardinality::One
        };
        debug!(collection = %model.name(), field = %field.name, target = %target, ?cardinality, "relation wired");
        relations.push((
            field.name.clone(),
            Relation {
                target: target.clone(),
                cardinality,
                source_key: source_key.clone(),
            },
        ));
    }
    relations
}
