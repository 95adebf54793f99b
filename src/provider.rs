//! Provider: holds a built schema and runs GraphQL operations against it.
//!
//! ```rust,no_run
//! use contentql::{Config, FsSource, Provider};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> contentql::Result<()> {
//! let config = Config::discover(Path::new("."))?;
//! let provider = Provider::builder(config.clone())
//!     .source(Arc::new(FsSource::new(&config.root)))
//!     .build()
//!     .await?;
//! let result = provider.query_json("{ allPosts { title } }", None).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

use async_graphql::dynamic::DynamicRequest;
use async_graphql::{Request, Response, Variables};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::schema::{generate_schema, ContentSchema, SchemaCache};
use crate::source::{FsSource, Source};
use crate::transformer::TransformerRegistry;

pub struct ProviderBuilder {
    config: Config,
    source: Option<Arc<dyn Source>>,
    transformers: TransformerRegistry,
    cache: Arc<SchemaCache>,
}

impl ProviderBuilder {
    /// Source to read from. Defaults to an [`FsSource`] at the config root.
    pub fn source(mut self, source: Arc<dyn Source>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the default markdown and YAML transformers.
    pub fn transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    /// Share a schema cache between providers.
    pub fn cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn build(self) -> Result<Provider> {
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(FsSource::new(self.config.root.clone())));
        let schema = generate_schema(&self.config, source, &self.transformers, &self.cache).await?;
        Ok(Provider {
            config: self.config,
            schema,
            cache: self.cache,
        })
    }
}

pub struct Provider {
    config: Config,
    schema: ContentSchema,
    cache: Arc<SchemaCache>,
}

impl Provider {
    pub fn builder(config: Config) -> ProviderBuilder {
        ProviderBuilder {
            config,
            source: None,
            transformers: TransformerRegistry::with_defaults(),
            cache: Arc::new(SchemaCache::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub async fn execute(&self, request: impl Into<DynamicRequest>) -> Response {
        self.schema.execute(request).await
    }

    /// Run `query` and return the whole response (`data` and `errors`) as JSON.
    pub async fn query_json(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let mut request = Request::new(query);
        if let Some(variables) = variables {
            request = request.variables(Variables::from_json(variables));
        }
        let response = self.schema.execute(request).await;
        Ok(serde_json::to_value(&response)?)
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }
}
