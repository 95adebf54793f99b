//! Markdown with optional YAML front matter.
//!
//! Front matter keys become node fields; the body lands in `_content.raw`.
//! `_content.html`, `_content.excerpt` and `_content.timeToRead` are computed
//! from the raw body at query time.

use pulldown_cmark::{html, Event, Options, Parser, TagEnd};
use serde_json::{json, Map, Value};
use std::path::Path;

use super::Transformer;
use crate::error::{ContentError, Result};
use crate::overrides::{ResolveContext, ResolverDescriptor, ResolverNode, ResolverTree};

pub const DEFAULT_EXCERPT_LENGTH: i64 = 200;
pub const DEFAULT_WORDS_PER_MINUTE: i64 = 230;

#[derive(Debug, Clone)]
pub struct MarkdownTransformer {
    options: Options,
}

impl Default for MarkdownTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownTransformer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options }
    }
}

/// Split `---` delimited front matter from the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }
    (None, text)
}

pub fn render_html(markdown: &str, options: Options) -> String {
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Text content of a markdown document, markup removed.
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => out.push(' '),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn excerpt(markdown: &str, length: usize) -> String {
    let text = plain_text(markdown);
    if text.chars().count() <= length {
        return text;
    }
    let cut: String = text.chars().take(length).collect();
    format!("{}…", cut.trim_end())
}

/// Minutes to read at `speed` words per minute, rounded up.
pub fn time_to_read(markdown: &str, speed: i64) -> i64 {
    let words = plain_text(markdown).split_whitespace().count() as i64;
    let speed = speed.max(1);
    (words + speed - 1) / speed
}

fn raw_of(source: &Value) -> &str {
    source.get("raw").and_then(Value::as_str).unwrap_or_default()
}

fn int_arg(ctx: &ResolveContext<'_>, name: &str, default: i64) -> i64 {
    ctx.args.get(name).and_then(Value::as_i64).unwrap_or(default)
}

impl Transformer for MarkdownTransformer {
    fn extensions(&self) -> &'static [&'static str] {
        &["md", "markdown"]
    }

    fn parse(&self, path: &Path, text: &str) -> Result<Value> {
        let (front, body) = split_front_matter(text);
        let mut node = match front {
            Some(yaml) if !yaml.trim().is_empty() => {
                match serde_yaml::from_str::<Value>(yaml).map_err(|e| ContentError::Yaml(path.to_path_buf(), e))? {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    _ => {
                        return Err(ContentError::Source(format!(
                            "front matter of {} is not a mapping",
                            path.display()
                        )))
                    }
                }
            }
            _ => Map::new(),
        };

        let content = node
            .entry("_content")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(content) = content {
            content.insert("raw".to_string(), Value::String(body.to_string()));
        }
        Ok(Value::Object(node))
    }

    fn preknown_schema_fragments(&self) -> ResolverTree {
        let options = self.options;
        let mut content = ResolverTree::default();
        content.fields.insert(
            "html".to_string(),
            ResolverNode::Resolver(ResolverDescriptor::new("String", move |value, ctx| {
                Ok(match value {
                    Value::String(existing) => Value::String(existing.clone()),
                    _ => Value::String(render_html(raw_of(ctx.source), options)),
                })
            })),
        );
        content.fields.insert(
            "excerpt".to_string(),
            ResolverNode::Resolver(
                ResolverDescriptor::new("String", |_, ctx| {
                    let length = int_arg(ctx, "length", DEFAULT_EXCERPT_LENGTH).max(0) as usize;
                    Ok(Value::String(excerpt(raw_of(ctx.source), length)))
                })
                .argument("length", "Int", Some(json!(DEFAULT_EXCERPT_LENGTH))),
            ),
        );
        content.fields.insert(
            "timeToRead".to_string(),
            ResolverNode::Resolver(
                ResolverDescriptor::new("Int", |_, ctx| {
                    let speed = int_arg(ctx, "speed", DEFAULT_WORDS_PER_MINUTE);
                    Ok(json!(time_to_read(raw_of(ctx.source), speed)))
                })
                .argument("speed", "Int", Some(json!(DEFAULT_WORDS_PER_MINUTE))),
            ),
        );

        let mut tree = ResolverTree::default();
        tree.fields.insert("_content".to_string(), ResolverNode::Object(content));
        tree
    }
}
