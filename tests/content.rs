//! End-to-end tests over a content directory on disk.

use contentql::{Config, ContentError, Provider};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
field_transform = "camel_case"

[[collections]]
name = "Post"
path = "posts"
creation_required_fields = ["title"]

[collections.refs]
author = "Author"

[[collections]]
name = "Author"
path = "authors"
"#;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "contentql.toml", CONFIG);
    write(
        root,
        "posts/hello.md",
        "---\nid: hello\ntitle: Hello\nauthor: eva\npublished_at: 2024-03-01\n---\n# Hello\n\nSome *body* text.\n",
    );
    write(
        root,
        "posts/tea.md",
        "---\nid: tea\ntitle: Tea\nauthor: tony\npublished_at: 2024-05-12\n---\nAbout tea.\n",
    );
    write(root, "authors/eva.yaml", "id: eva\nname: Eva\nenjoys:\n  - sitting\n  - standing\n");
    write(root, "authors/tony.yaml", "id: tony\nname: Tony\nenjoys:\n  - cats\n  - tea\n");
    dir
}

async fn provider(root: &Path) -> Provider {
    let config = Config::discover(root).unwrap();
    Provider::builder(config).build().await.unwrap()
}

async fn data(provider: &Provider, query: &str, variables: Option<Value>) -> Value {
    let result = provider.query_json(query, variables).await.unwrap();
    assert!(result.get("errors").is_none(), "unexpected errors: {}", result);
    result["data"].clone()
}

#[tokio::test]
async fn test_query_markdown_and_yaml() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let data = data(
        &provider,
        r#"{ allPosts(sortBy: "publishedAt", order: DESC) { title publishedAt _slug author { name enjoys } } }"#,
        None,
    )
    .await;
    assert_eq!(
        data["allPosts"],
        json!([
            {"title": "Tea", "publishedAt": "2024-05-12", "_slug": "tea", "author": {"name": "Tony", "enjoys": ["cats", "tea"]}},
            {"title": "Hello", "publishedAt": "2024-03-01", "_slug": "hello", "author": {"name": "Eva", "enjoys": ["sitting", "standing"]}}
        ])
    );
}

#[tokio::test]
async fn test_markdown_computed_fields() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let data = data(
        &provider,
        r#"{ Post(id: "hello") { _content { html excerpt(length: 5) timeToRead } } }"#,
        None,
    )
    .await;
    let content = &data["Post"]["_content"];
    assert!(content["html"].as_str().unwrap().contains("<h1>Hello</h1>"));
    assert!(content["excerpt"].as_str().unwrap().starts_with("Hello"));
    assert_eq!(content["timeToRead"], 1);
}

#[tokio::test]
async fn test_filter_with_variables() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let data = data(
        &provider,
        "query($filter: JSON) { allPosts(filter: $filter) { title } }",
        Some(json!({"filter": {"author": {"name": {"in": ["Tony"]}}}})),
    )
    .await;
    assert_eq!(data["allPosts"], json!([{"title": "Tea"}]));
}

#[tokio::test]
async fn test_create_writes_yaml_file() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let data = data(
        &provider,
        r#"mutation { createAuthor(author: {id: "ada", name: "Ada"}) { id name } }"#,
        None,
    )
    .await;
    assert_eq!(data["createAuthor"], json!({"id": "ada", "name": "Ada"}));

    let written = fs::read_to_string(dir.path().join("authors/ada.yaml")).unwrap();
    assert!(written.contains("name: Ada"));

    let listed = provider.query_json("{ allAuthors { id } }", None).await.unwrap();
    assert_eq!(listed["data"]["allAuthors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_create_without_required_field_fails() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let result = provider
        .query_json(r#"mutation { createPost(post: {id: "draft"}) { id } }"#, None)
        .await
        .unwrap();
    let message = result["errors"][0]["message"].as_str().unwrap_or_default();
    assert!(message.contains("title"), "{}", message);
    assert!(!dir.path().join("posts/draft.md").exists());
}

#[tokio::test]
async fn test_update_rewrites_markdown_file() {
    let dir = site();
    let provider = provider(dir.path()).await;

    let data = data(
        &provider,
        r#"mutation { updatePost(post: {id: "hello", title: "Hello again"}) { title author { name } } }"#,
        None,
    )
    .await;
    assert_eq!(data["updatePost"], json!({"title": "Hello again", "author": {"name": "Eva"}}));

    let written = fs::read_to_string(dir.path().join("posts/hello.md")).unwrap();
    assert!(written.starts_with("---\n"));
    assert!(written.contains("title: Hello again"));
    assert!(written.ends_with("# Hello\n\nSome *body* text.\n"));
}

#[tokio::test]
async fn test_mutations_cannot_move_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("site");
    write(&root, "contentql.toml", CONFIG);
    write(&root, "posts/hello.md", "---\nid: hello\ntitle: Hello\n---\nBody\n");
    write(&root, "authors/eva.yaml", "id: eva\nname: Eva\n");
    let provider = provider(&root).await;

    for mutation in [
        r#"mutation { updateAuthor(author: {id: "eva", name: "Moved", _path: "../escaped.yaml"}) { _path } }"#,
        r#"mutation { createAuthor(author: {id: "new", name: "New", _path: "../created.yaml"}) { _path } }"#,
    ] {
        let result = provider.query_json(mutation, None).await.unwrap();
        assert!(result.get("errors").is_some(), "{}", result);
    }
    assert!(!dir.path().join("escaped.yaml").exists());
    assert!(!dir.path().join("created.yaml").exists());

    let data = data(
        &provider,
        r#"mutation { updateAuthor(author: {id: "eva", name: "Eve"}) { name _path } }"#,
        None,
    )
    .await;
    assert_eq!(data["updateAuthor"], json!({"name": "Eve", "_path": "authors/eva.yaml"}));
    let written = fs::read_to_string(root.join("authors/eva.yaml")).unwrap();
    assert!(written.contains("name: Eve"));
    assert!(!root.join("authors/eva.yaml.tmp").exists());
}

#[tokio::test]
async fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    match Config::discover(dir.path()) {
        Err(ContentError::ConfigNotFound(path)) => assert_eq!(path, dir.path()),
        other => panic!("expected ConfigNotFound, got {:?}", other.map(|c| c.collections.len())),
    }
}
