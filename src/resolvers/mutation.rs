//! Create, update and upsert of collection records.
//!
//! Payloads arrive keyed by GraphQL field names and are mapped back to
//! content keys before they touch a node. Writes go through the source first;
//! the in-memory store only changes once the source accepted the record.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ContentError, Result};
use crate::path::{deep_merge, reference_key};
use crate::schema::model::{CollectionModel, Runtime};
use crate::shape::{FieldKind, ObjectShape, METADATA_FIELDS};

/// Keys that never come from a mutation payload. File metadata is owned by
/// the source.
const PROTECTED_KEYS: &[&str] = &["_metadata", "_collection"];

fn strip_protected(record: &mut Map<String, Value>) {
    for key in PROTECTED_KEYS.iter().chain(METADATA_FIELDS) {
        record.remove(*key);
    }
}

/// Map GraphQL field names in `payload` back to content keys.
pub fn to_content_keys(payload: Map<String, Value>, shape: &ObjectShape) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(name, value)| match shape.field(&name) {
            Some(field) => (field.source_key.clone(), value_to_content(value, &field.kind)),
            None => (name, value),
        })
        .collect()
}

fn value_to_content(value: Value, kind: &FieldKind) -> Value {
    match (value, kind) {
        (Value::Object(map), FieldKind::Object(shape)) => Value::Object(to_content_keys(map, shape)),
        (Value::Array(items), FieldKind::List(inner)) => {
            Value::Array(items.into_iter().map(|item| value_to_content(item, inner)).collect())
        }
        (value, _) => value,
    }
}

fn payload_object(model: &CollectionModel, payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(to_content_keys(map, &model.shape)),
        _ => Err(ContentError::Schema(format!("{} payload must be an object", model.type_name))),
    }
}

/// Nulls in an update payload leave the stored value untouched.
fn strip_nulls(record: &mut Map<String, Value>) {
    record.retain(|_, value| !value.is_null());
    for value in record.values_mut() {
        if let Value::Object(inner) = value {
            strip_nulls(inner);
        }
    }
}

fn is_present(record: &Map<String, Value>, field: &str) -> bool {
    !matches!(record.get(field), None | Some(Value::Null))
}

/// Create a record. Fails if the reference value is taken or a required field is missing.
pub async fn create(runtime: &Runtime, collection: &str, payload: Value) -> Result<Value> {
    let model = runtime.model(collection)?;
    let mut record = payload_object(model, payload)?;
    strip_protected(&mut record);
    let reference_field = model.reference_field();

    let mut store = runtime.store.write().await;
    let nodes = store.entry(collection.to_string()).or_default();

    match record.get(reference_field).and_then(reference_key) {
        Some(key) => {
            if nodes.iter().any(|node| model.key_of(node).as_deref() == Some(key.as_str())) {
                return Err(ContentError::ReferenceAlreadyExists {
                    collection: collection.to_string(),
                    field: reference_field.to_string(),
                    value: key,
                });
            }
        }
        None if reference_field == "id" => {
            let id = uuid::Uuid::new_v4().to_string();
            debug!(collection, %id, "generated id for new record");
            record.insert("id".to_string(), Value::String(id));
        }
        None => {
            return Err(ContentError::MissingRequiredField {
                collection: collection.to_string(),
                field: reference_field.to_string(),
            })
        }
    }

    if let Some(missing) = model
        .entry
        .creation_required_fields
        .iter()
        .find(|field| !is_present(&record, field))
    {
        return Err(ContentError::MissingRequiredField {
            collection: collection.to_string(),
            field: missing.clone(),
        });
    }

    let stored = runtime.source.put(&model.entry, Value::Object(record)).await?;
    info!(collection, key = ?model.key_of(&stored), "record created");
    nodes.push(stored.clone());
    Ok(stored)
}

/// Deep-merge `payload` over the existing record with the same reference value.
pub async fn update(runtime: &Runtime, collection: &str, payload: Value) -> Result<Value> {
    let model = runtime.model(collection)?;
    let mut record = payload_object(model, payload)?;
    let reference_field = model.reference_field();

    let key = record
        .get(reference_field)
        .and_then(reference_key)
        .ok_or_else(|| ContentError::MissingRequiredField {
            collection: collection.to_string(),
            field: reference_field.to_string(),
        })?;

    let mut store = runtime.store.write().await;
    let nodes = store.entry(collection.to_string()).or_default();
    let index = nodes
        .iter()
        .position(|node| model.key_of(node).as_deref() == Some(key.as_str()))
        .ok_or_else(|| ContentError::NotFound {
            collection: collection.to_string(),
            field: reference_field.to_string(),
            value: key.clone(),
        })?;

    strip_protected(&mut record);
    record.remove(reference_field);
    strip_nulls(&mut record);

    let mut merged = nodes[index].clone();
    deep_merge(&mut merged, Value::Object(record));
    let stored = runtime.source.put(&model.entry, merged).await?;
    info!(collection, %key, "record updated");
    nodes[index] = stored.clone();
    Ok(stored)
}

/// Update, or create when no record has the payload's reference value.
pub async fn upsert(runtime: &Runtime, collection: &str, payload: Value) -> Result<Value> {
    match update(runtime, collection, payload.clone()).await {
        Err(ContentError::NotFound { .. }) | Err(ContentError::MissingRequiredField { .. }) => {
            create(runtime, collection, payload).await
        }
        other => other,
    }
}
