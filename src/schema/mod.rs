//! Schema generation.
//!
//! Turns configured collections into a GraphQL schema:
//!
//! ```graphql
//! { allPosts(filter: {author: {name: {eq: "Eva"}}}, sortBy: "date", order: DESC) {
//!     title
//!     author { name }
//!     _content { excerpt(length: 80) timeToRead }
//! } }
//! ```
//!
//! Built schemas are cached by config hash in a [`SchemaCache`].

pub mod cache;
pub mod model;
pub mod mutation;
pub mod query;
pub mod types;

use async_graphql::dynamic::{DynamicRequest, Enum, Object, Scalar, Schema};
use async_graphql::Response;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ContentError, Result};
use crate::overrides::compile;
use crate::path::fill_missing;
use crate::shape::reduce;
use crate::source::{file_metadata, Records, Source};
use crate::transformer::TransformerRegistry;

pub use cache::SchemaCache;
pub use model::{Cardinality, CollectionModel, ContentGraph, ContentStore, Relation, Runtime};
use mutation::{mutation_field, MutationKind};
use query::{all_field, find_by_reference_field, wire_relations, ORDER_ENUM};
use types::{TypeBuilder, JSON_SCALAR};

/// A built schema together with the content it serves.
#[derive(Clone)]
pub struct ContentSchema {
    schema: Schema,
    runtime: Arc<Runtime>,
    config_hash: String,
}

impl ContentSchema {
    pub async fn execute(&self, request: impl Into<DynamicRequest>) -> Response {
        self.schema.execute(request).await
    }

    /// Schema in GraphQL SDL.
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.runtime.models.keys().cloned().collect()
    }

    pub fn model(&self, collection: &str) -> Option<&CollectionModel> {
        self.runtime.models.get(collection)
    }

    /// Current nodes of a collection, mutations included.
    pub async fn nodes(&self, collection: &str) -> Vec<Value> {
        self.runtime.store.snapshot(collection).await
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }
}

/// Generate (or fetch from `cache`) the schema for `config`.
pub async fn generate_schema(
    config: &Config,
    source: Arc<dyn Source>,
    transformers: &TransformerRegistry,
    cache: &SchemaCache,
) -> Result<ContentSchema> {
    let config_hash = config.hash();
    if let Some(schema) = cache.get(&config_hash) {
        debug!(hash = %config_hash, "schema cache hit");
        return Ok(schema);
    }
    config.validate()?;

    source.initialize(config).await?;
    let mut records = Records::new();
    source.fetch(&config.collections, &mut records).await?;
    info!(nodes = records.len(), "content fetched");

    let mut content = IndexMap::new();
    for entry in &config.collections {
        let raw = records.take(&entry.name);
        let mut nodes = Vec::with_capacity(raw.len());
        for node in raw {
            let path = node.path.clone();
            let mut value = transformers.parse(node)?;
            if let (Some(path), Value::Object(map)) = (path, &mut value) {
                fill_missing(map, &file_metadata(&path));
            }
            nodes.push(value);
        }
        content.insert(entry.name.clone(), nodes);
    }

    let fragments = transformers.preknown_schema_fragments();
    let mut models = IndexMap::new();
    for entry in &config.collections {
        let overrides = compile(&entry.overrides)?;
        let nodes = content.get(&entry.name).map(Vec::as_slice).unwrap_or(&[]);
        let shape = reduce(
            &entry.name,
            nodes,
            &overrides,
            &fragments,
            &entry.reference_field,
            &config.field_transform,
        )?;
        models.insert(entry.name.clone(), CollectionModel::new(entry.clone(), shape));
    }

    let wired: Vec<(String, Vec<(String, Relation)>)> = models
        .values()
        .map(|model| (model.name().to_string(), wire_relations(model, &models)))
        .collect();
    for (collection, relations) in wired {
        if let Some(model) = models.get_mut(&collection) {
            model.relations.extend(relations);
        }
    }

    let runtime = Arc::new(Runtime {
        models,
        store: ContentStore::new(content),
        source,
    });
    let schema = build(Arc::clone(&runtime))?;
    info!(collections = runtime.models.len(), hash = %config_hash, "schema generated");

    let built = ContentSchema {
        schema,
        runtime,
        config_hash: config_hash.clone(),
    };
    cache.put(config_hash, built.clone());
    Ok(built)
}

fn build(runtime: Arc<Runtime>) -> Result<Schema> {
    let mut query = Object::new("Query");
    let mut mutation = Object::new("Mutation");
    let mut types = TypeBuilder::new(runtime.models.values());

    for model in runtime.models.values() {
        types.add_collection(model)?;
        query = query.field(find_by_reference_field(model)).field(all_field(model));
        for kind in MutationKind::ALL {
            mutation = mutation.field(mutation_field(model, kind));
        }
    }

    let mut builder = Schema::build("Query", Some("Mutation"), None)
        .register(Scalar::new(JSON_SCALAR))
        .register(Enum::new(ORDER_ENUM).item("ASC").item("DESC"))
        .register(query)
        .register(mutation);
    for object in types.objects {
        builder = builder.register(object);
    }
    for input in types.inputs {
        builder = builder.register(input);
    }

    builder
        .data(runtime)
        .finish()
        .map_err(|e| ContentError::Schema(e.to_string()))
}
