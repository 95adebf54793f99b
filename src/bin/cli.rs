//! ContentQL CLI - GraphQL for flat-file content.
//!
//! Usage:
//!   contentql schema                  # Print the generated schema (SDL)
//!   contentql schema --out schema.gql # Write it to a file
//!   contentql query '<graphql>'       # Run a query, print the JSON response
//!   contentql stats                   # Collections, node counts and relations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contentql::{Config, Provider};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contentql")]
#[command(about = "ContentQL - GraphQL for flat-file content", long_about = None)]
struct Cli {
    /// Content root holding contentql.toml (default: current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated GraphQL schema
    Schema {
        /// Write the schema to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run a GraphQL query or mutation
    Query {
        /// GraphQL document
        query: String,

        /// Variables as a JSON object
        #[arg(short, long)]
        variables: Option<String>,
    },

    /// Show collections, node counts and relations
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("contentql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let config = Config::discover(&root)?;
    let provider = Provider::builder(config).build().await?;

    match cli.command {
        Commands::Schema { out } => {
            let sdl = provider.sdl();
            match out {
                Some(path) => {
                    std::fs::write(&path, sdl)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Schema written to {}", path.display());
                }
                None => println!("{}", sdl),
            }
        }

        Commands::Query { query, variables } => {
            let variables = variables
                .map(|text| serde_json::from_str::<Value>(&text))
                .transpose()
                .context("--variables must be a JSON object")?;
            let response = provider.query_json(&query, variables).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.get("errors").is_some() {
                std::process::exit(2);
            }
        }

        Commands::Stats => print_stats(&provider).await,
    }

    Ok(())
}

async fn print_stats(provider: &Provider) {
    let schema = provider.schema();
    println!("Schema {}", schema.config_hash().get(..12).unwrap_or_default());
    for name in schema.collection_names() {
        let Some(model) = schema.model(&name) else {
            continue;
        };
        let nodes = schema.nodes(&name).await.len();
        println!("  {} ({} nodes, {} fields)", model.type_name, nodes, model.shape.fields.len());
        for (field, relation) in &model.relations {
            println!("    {} -> {} ({:?})", field, relation.target, relation.cardinality);
        }
    }
}
