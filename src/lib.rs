//! # ContentQL
//!
//! GraphQL for flat-file content.
//!
//! ContentQL reads collections of markdown and YAML files, infers a GraphQL
//! schema from what it finds, and serves queries and mutations against it.
//!
//! ## Key Features
//!
//! - **Inferred**: Types come from the content itself, widened across nodes
//! - **Relational**: Declared `refs` become one-to-one and one-to-many relations
//! - **Filterable**: Mongo-style `filter` on every listing, through relations too
//! - **Writable**: `create`, `update` and `upsert` mutations write back to the source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contentql::{CollectionEntry, Config, MemorySource, Provider};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> contentql::Result<()> {
//! let config = Config::new(vec![CollectionEntry::new("Author", "authors")]);
//! let source = MemorySource::new()
//!     .with_collection("Author", vec![json!({"id": "a1", "name": "Eva"})]);
//!
//! let provider = Provider::builder(config).source(Arc::new(source)).build().await?;
//! let result = provider
//!     .query_json(r#"{ allAuthors(filter: {name: {eq: "Eva"}}) { name } }"#, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod overrides;
pub mod path;
pub mod provider;
pub mod resolvers;
pub mod schema;
pub mod shape;
pub mod sift;
pub mod source;
pub mod transformer;

// Re-exports for convenience
pub use error::{ContentError, Result};

pub use config::{CollectionEntry, Config};
pub use overrides::{Override, ResolveContext, ResolverDescriptor, ResolverTree};
pub use path::FieldTransform;
pub use provider::{Provider, ProviderBuilder};
pub use schema::{generate_schema, ContentSchema, SchemaCache};
pub use sift::sift;
pub use source::{FsSource, MemorySource, RawNode, Records, Source};
pub use transformer::{Transformer, TransformerRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn authors() -> Vec<Value> {
        vec![
            json!({"id": "40s3", "name": "Eva", "enjoys": ["sitting", "standing"]}),
            json!({"id": "2a3e", "name": "Tony", "enjoys": ["cats", "tea"]}),
        ]
    }

    async fn provider(config: Config, source: MemorySource) -> Provider {
        Provider::builder(config)
            .source(Arc::new(source))
            .build()
            .await
            .unwrap()
    }

    async fn data(provider: &Provider, query: &str) -> Value {
        let result = provider.query_json(query, None).await.unwrap();
        assert!(result.get("errors").is_none(), "unexpected errors: {}", result);
        result["data"].clone()
    }

    #[tokio::test]
    async fn test_filter_by_name() {
        let provider = provider(
            Config::new(vec![CollectionEntry::new("Author", "authors")]),
            MemorySource::new().with_collection("Author", authors()),
        )
        .await;

        let data = data(&provider, r#"{ allAuthors(filter: {name: {eq: "Tony"}}) { name enjoys } }"#).await;
        assert_eq!(data["allAuthors"], json!([{"name": "Tony", "enjoys": ["cats", "tea"]}]));
    }

    #[tokio::test]
    async fn test_find_by_reference_field() {
        let provider = provider(
            Config::new(vec![CollectionEntry::new("Author", "authors")]),
            MemorySource::new().with_collection("Author", authors()),
        )
        .await;

        let data = data(&provider, r#"{ Author(id: "40s3") { name _collection } missing: Author(id: "nope") { name } }"#).await;
        assert_eq!(data["Author"], json!({"name": "Eva", "_collection": "Author"}));
        assert_eq!(data["missing"], Value::Null);
    }

    #[tokio::test]
    async fn test_relation_cardinality() {
        let config = Config::new(vec![
            CollectionEntry::new("Post", "posts")
                .with_ref("author", "Author")
                .with_ref("reviewers", "Author"),
            CollectionEntry::new("Author", "authors"),
        ]);
        let source = MemorySource::new()
            .with_collection(
                "Post",
                vec![json!({"id": "p1", "title": "Chairs", "author": "40s3", "reviewers": ["2a3e", "40s3"]})],
            )
            .with_collection("Author", authors());
        let provider = provider(config, source).await;

        let data = data(
            &provider,
            r#"{ allPosts { title author { name } reviewers(sortBy: "name") { name } } }"#,
        )
        .await;
        assert_eq!(
            data["allPosts"],
            json!([{
                "title": "Chairs",
                "author": {"name": "Eva"},
                "reviewers": [{"name": "Eva"}, {"name": "Tony"}]
            }])
        );
    }

    #[tokio::test]
    async fn test_explicit_references_argument() {
        let config = Config::new(vec![
            CollectionEntry::new("Post", "posts").with_ref("reviewers", "Author"),
            CollectionEntry::new("Author", "authors"),
        ]);
        let source = MemorySource::new()
            .with_collection("Post", vec![json!({"id": "p1", "reviewers": ["2a3e"]})])
            .with_collection("Author", authors());
        let provider = provider(config, source).await;

        let data = data(
            &provider,
            r#"{ allPosts {
                only: reviewers(references: ["40s3"]) { name }
                unknown: reviewers(references: ["40s3", "zzzz"]) { name }
                filtered: reviewers(references: ["40s3", "2a3e"], filter: {name: {eq: "Tony"}}) { name }
                limited: reviewers(references: ["2a3e", "40s3"], limit: 1) { name }
                own: reviewers { name }
            } }"#,
        )
        .await;
        assert_eq!(
            data["allPosts"],
            json!([{
                "only": [{"name": "Eva"}],
                "unknown": [{"name": "Eva"}],
                "filtered": [{"name": "Tony"}],
                "limited": [{"name": "Eva"}],
                "own": [{"name": "Tony"}]
            }])
        );
    }

    #[tokio::test]
    async fn test_nested_type_name_collision() {
        let config = Config::new(vec![
            CollectionEntry::new("Post", "posts"),
            CollectionEntry::new("PostMeta", "post-metas"),
        ]);
        let source = MemorySource::new()
            .with_collection("Post", vec![json!({"id": "p1", "meta": {"words": 3}})])
            .with_collection("PostMeta", vec![json!({"id": "m1", "label": "draft"})]);
        let provider = provider(config, source).await;

        let data = data(&provider, "{ allPosts { meta { words } } allPostMetas { label } }").await;
        assert_eq!(data["allPosts"], json!([{"meta": {"words": 3}}]));
        assert_eq!(data["allPostMetas"], json!([{"label": "draft"}]));
        assert!(provider.sdl().contains("type PostMeta2"));
    }

    #[tokio::test]
    async fn test_filter_through_relation() {
        let config = Config::new(vec![
            CollectionEntry::new("Post", "posts").with_ref("author", "Author"),
            CollectionEntry::new("Author", "authors"),
        ]);
        let source = MemorySource::new()
            .with_collection(
                "Post",
                vec![
                    json!({"id": "p1", "title": "Chairs", "author": "40s3"}),
                    json!({"id": "p2", "title": "Tea", "author": "2a3e"}),
                ],
            )
            .with_collection("Author", authors());
        let provider = provider(config, source).await;

        let data = data(&provider, r#"{ allPosts(filter: {author: {name: {eq: "Tony"}}}) { title } }"#).await;
        assert_eq!(data["allPosts"], json!([{"title": "Tea"}]));
    }

    #[tokio::test]
    async fn test_overrides_resolve_whole_list_and_per_element() {
        let entry = CollectionEntry::new("Thing", "things")
            .with_override(Override::new("basic[]", "String", |value, _| {
                let items = value.as_array().cloned().unwrap_or_default();
                Ok(Value::Array(
                    items
                        .iter()
                        .map(|item| json!(item.as_str().unwrap_or_default().to_uppercase()))
                        .collect(),
                ))
            }))
            .with_override(Override::new("items[]obj.test", "String", |value, _| {
                Ok(json!(format!("<{}>", value.as_str().unwrap_or_default())))
            }));
        let source = MemorySource::new().with_collection(
            "Thing",
            vec![json!({
                "id": "t1",
                "basic": ["x", "y"],
                "items": [{"test": "a"}, {"test": "b"}]
            })],
        );
        let provider = provider(Config::new(vec![entry]), source).await;

        let data = data(&provider, "{ allThings { basic items { test } } }").await;
        assert_eq!(
            data["allThings"],
            json!([{"basic": ["X", "Y"], "items": [{"test": "<a>"}, {"test": "<b>"}]}])
        );
    }

    #[tokio::test]
    async fn test_upsert_twice() {
        let provider = provider(
            Config::new(vec![CollectionEntry::new("Author", "authors")]),
            MemorySource::new().with_collection("Author", authors()),
        )
        .await;

        let mutation = r#"mutation { upsertAuthor(author: {id: "9f00", name: "Zed"}) { id name } }"#;
        let first = data(&provider, mutation).await;
        let second = data(&provider, mutation).await;
        assert_eq!(first["upsertAuthor"], json!({"id": "9f00", "name": "Zed"}));
        assert_eq!(second, first);
        assert_eq!(provider.schema().nodes("Author").await.len(), 3);
    }

    #[tokio::test]
    async fn test_create_existing_reference_is_field_error() {
        let provider = provider(
            Config::new(vec![CollectionEntry::new("Author", "authors")]),
            MemorySource::new().with_collection("Author", authors()),
        )
        .await;

        let result = provider
            .query_json(r#"mutation { createAuthor(author: {id: "40s3", name: "Eve"}) { id } }"#, None)
            .await
            .unwrap();
        let message = result["errors"][0]["message"].as_str().unwrap_or_default();
        assert!(message.contains("already exists"), "{}", message);
    }

    #[tokio::test]
    async fn test_illegal_field_name_aborts_schema() {
        let config = Config::new(vec![CollectionEntry::new("Author", "authors")])
            .with_field_transform(FieldTransform::Custom(Arc::new(|_| "a[]b".to_string())));
        let source: Arc<dyn Source> = Arc::new(MemorySource::new().with_collection("Author", authors()));

        let result = generate_schema(&config, source, &TransformerRegistry::new(), &SchemaCache::new()).await;
        match result {
            Err(ContentError::IllegalFieldName { sequence, .. }) => assert_eq!(sequence, "[]"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("schema should not build"),
        }
    }
}
