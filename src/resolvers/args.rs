//! Standard collection query arguments: filter, sortBy, order, skip, limit.
//!
//! Always applied in that order: filter first, then the stable ascending
//! sort, then the DESC reversal, then skip and limit.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::trace;

use super::filter::resolve_filter;
use crate::error::{ContentError, Result};
use crate::path::get_path;
use crate::schema::model::ContentGraph;
use crate::sift::generate_filter_set_manifest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Order {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(ContentError::Schema(format!("unknown order `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub order: Order,
    pub sort_by: Option<String>,
    pub filter: Option<Value>,
}

impl QueryArgs {
    /// Read the arguments of a GraphQL field call. A string `filter` is parsed as JSON.
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        let order = match args.get("order").and_then(Value::as_str) {
            Some(order) => order.parse()?,
            None => Order::default(),
        };
        let filter = match args.get("filter") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(serde_json::from_str(text)?),
            Some(other) => Some(other.clone()),
        };
        Ok(Self {
            skip: args.get("skip").and_then(Value::as_i64),
            limit: args.get("limit").and_then(Value::as_i64),
            order,
            sort_by: args.get("sortBy").and_then(Value::as_str).map(str::to_string),
            filter,
        })
    }
}

/// Apply `args` to `nodes` of `collection`.
///
/// A filter keeps the nodes whose reference value survives it, in the order
/// the filter returns them.
pub fn resolve_query_args(
    nodes: Vec<Value>,
    args: &QueryArgs,
    graph: &ContentGraph<'_>,
    collection: &str,
) -> Result<Vec<Value>> {
    let model = graph.model(collection)?;
    let mut nodes = nodes;

    if let Some(filter) = &args.filter {
        if !generate_filter_set_manifest(filter).is_empty() {
            let ids = resolve_filter(filter, collection, graph)?;
            let mut remaining: Vec<Option<Value>> = nodes.into_iter().map(Some).collect();
            nodes = ids
                .iter()
                .filter_map(|id| {
                    remaining
                        .iter_mut()
                        .find(|slot| {
                            slot.as_ref()
                                .and_then(|node| model.key_of(node))
                                .as_deref()
                                == Some(id.as_str())
                        })
                        .and_then(Option::take)
                })
                .collect();
        }
    }

    if let Some(sort_by) = &args.sort_by {
        let key = model
            .shape
            .field(sort_by)
            .map(|f| f.source_key.clone())
            .unwrap_or_else(|| sort_by.clone());
        let path: Vec<&str> = key.split('.').collect();
        nodes.sort_by(|a, b| compare_for_sort(get_path(a, &path), get_path(b, &path)));
    }

    if args.order == Order::Desc {
        nodes.reverse();
    }

    let skip = args.skip.unwrap_or(0).max(0) as usize;
    let limit = args.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    trace!(collection, skip, count = nodes.len(), "query arguments applied");
    Ok(nodes.into_iter().skip(skip).take(limit).collect())
}

/// Missing and null sort first, then booleans, numbers, strings, the rest.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionEntry;
    use crate::schema::model::{CollectionModel, Nodes};
    use crate::shape::ObjectShape;
    use indexmap::IndexMap;
    use serde_json::json;

    fn fixture() -> (IndexMap<String, CollectionModel>, Nodes) {
        let mut models = IndexMap::new();
        models.insert(
            "Item".to_string(),
            CollectionModel::new(CollectionEntry::new("Item", "items"), ObjectShape::default()),
        );
        let mut nodes = Nodes::new();
        nodes.insert(
            "Item".to_string(),
            vec![json!({"id": 1, "x": 3}), json!({"id": 2, "x": 1}), json!({"id": 3, "x": 2})],
        );
        (models, nodes)
    }

    fn ids(nodes: &[Value]) -> Vec<i64> {
        nodes.iter().filter_map(|n| n["id"].as_i64()).collect()
    }

    #[test]
    fn test_precedence_sort_reverse_skip_limit() {
        let (models, nodes) = fixture();
        let graph = ContentGraph { models: &models, nodes: &nodes };
        let args = QueryArgs {
            sort_by: Some("x".to_string()),
            order: Order::Desc,
            skip: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let result = resolve_query_args(graph.nodes("Item").to_vec(), &args, &graph, "Item").unwrap();
        assert_eq!(result, vec![json!({"id": 3, "x": 2})]);
    }

    #[test]
    fn test_no_args_is_identity() {
        let (models, nodes) = fixture();
        let graph = ContentGraph { models: &models, nodes: &nodes };
        let result =
            resolve_query_args(graph.nodes("Item").to_vec(), &QueryArgs::default(), &graph, "Item").unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3]);

        let args = QueryArgs { filter: Some(json!({})), ..Default::default() };
        let result = resolve_query_args(graph.nodes("Item").to_vec(), &args, &graph, "Item").unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_sort_field_keeps_order() {
        let (models, nodes) = fixture();
        let graph = ContentGraph { models: &models, nodes: &nodes };
        let args = QueryArgs { sort_by: Some("missing".to_string()), ..Default::default() };
        let result = resolve_query_args(graph.nodes("Item").to_vec(), &args, &graph, "Item").unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3]);
    }

    #[test]
    fn test_mixed_types_sort_by_rank() {
        let mut values = vec![json!("b"), json!(2), Value::Null, json!(true), json!("a"), json!(1.5)];
        values.sort_by(|a, b| compare_for_sort(Some(a), Some(b)));
        assert_eq!(values, vec![Value::Null, json!(true), json!(1.5), json!(2), json!("a"), json!("b")]);
    }

    #[test]
    fn test_negative_skip_and_limit_clamp() {
        let (models, nodes) = fixture();
        let graph = ContentGraph { models: &models, nodes: &nodes };
        let args = QueryArgs { skip: Some(-2), limit: Some(-1), ..Default::default() };
        assert!(resolve_query_args(graph.nodes("Item").to_vec(), &args, &graph, "Item").unwrap().is_empty());
        let args = QueryArgs { skip: Some(-2), ..Default::default() };
        assert_eq!(resolve_query_args(graph.nodes("Item").to_vec(), &args, &graph, "Item").unwrap().len(), 3);
    }

    #[test]
    fn test_from_args() {
        let mut args = Map::new();
        args.insert("order".to_string(), json!("DESC"));
        args.insert("filter".to_string(), json!(r#"{"x": {"gt": 1}}"#));
        args.insert("limit".to_string(), json!(2));
        let parsed = QueryArgs::from_args(&args).unwrap();
        assert_eq!(parsed.order, Order::Desc);
        assert_eq!(parsed.limit, Some(2));
        assert_eq!(parsed.filter, Some(json!({"x": {"gt": 1}})));

        args.insert("order".to_string(), json!("SIDEWAYS"));
        assert!(QueryArgs::from_args(&args).is_err());
    }
}
