//! Wiki-Ripple main entry point
//!
//! This is the command-line interface for the Wiki-Ripple importer.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wiki_ripple::config::{load_config_with_hash, Config, GraphBackend};
use wiki_ripple::storage::{open_graph_store, open_text_index, GraphStore, TextIndex};
use wiki_ripple::wiki::MediaWikiClient;
use wiki_ripple::{ArticleQuery, ImportRequest, Importer, QueryEngine};

/// Wiki-Ripple: bounded encyclopedia neighborhood importer
///
/// Wiki-Ripple walks a wiki's link graph outward from one article, keeping
/// articles in the requested categories, and stores them in a graph store and
/// a full-text index that can then be queried together.
#[derive(Parser, Debug)]
#[command(name = "wiki-ripple")]
#[command(version)]
#[command(about = "Bounded encyclopedia neighborhood importer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import the neighborhood of an article, replacing the stores' contents
    Import {
        /// Title of the root article
        title: String,

        /// Maximum link distance from the root
        #[arg(short, long, default_value_t = 1)]
        radius: u32,

        /// Required category (repeatable); an article needs any one of them
        #[arg(short, long = "category", required = true)]
        categories: Vec<String>,

        /// Wiki language edition
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Run this query (JSON file) against the stores after the import
        #[arg(long, value_name = "FILE")]
        then_query: Option<PathBuf>,
    },

    /// Run an article query read from a JSON file ("-" for stdin)
    Query {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Validate the configuration and print its effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Import {
            title,
            radius,
            categories,
            lang,
            then_query,
        } => {
            let request = ImportRequest::new(title, radius, categories, lang);
            handle_import(&config, &request, then_query.as_deref()).await
        }
        Command::Query { file } => handle_query(&config, &file).await,
        Command::CheckConfig => {
            print_config(&config, &config_hash);
            Ok(())
        }
    }
}

/// Sets up logging based on verbosity level
///
/// Logs go to stderr; stdout carries only JSON results.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wiki_ripple=info,warn"),
            1 => EnvFilter::new("wiki_ripple=debug,info"),
            2 => EnvFilter::new("wiki_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn open_stores(config: &Config) -> anyhow::Result<(Arc<dyn GraphStore>, Arc<dyn TextIndex>)> {
    let timeout = Duration::from_secs(config.wiki.request_timeout_secs);
    let graph = open_graph_store(&config.graph, timeout)
        .await
        .context("Failed to open graph store")?;
    let text: Arc<dyn TextIndex> = Arc::new(
        open_text_index(Path::new(&config.text.database_path))
            .context("Failed to open text index")?,
    );
    Ok((graph, text))
}

async fn handle_import(
    config: &Config,
    request: &ImportRequest,
    then_query: Option<&Path>,
) -> anyhow::Result<()> {
    let (graph, text) = open_stores(config).await?;
    let source = MediaWikiClient::new(&config.wiki).context("Failed to build HTTP client")?;

    let importer = Importer::new(
        Arc::new(source),
        Arc::clone(&graph),
        Arc::clone(&text),
        config.import.clone(),
    );
    let summary = importer.import(request).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = then_query {
        let engine = QueryEngine::new(graph, text);
        run_query(&engine, path).await?;
    }
    Ok(())
}

async fn handle_query(config: &Config, path: &Path) -> anyhow::Result<()> {
    if config.graph.backend == GraphBackend::Memory {
        tracing::warn!("The memory graph backend starts empty; use `import --then-query` instead");
    }

    let (graph, text) = open_stores(config).await?;
    let engine = QueryEngine::new(graph, text);
    run_query(&engine, path).await
}

async fn run_query(engine: &QueryEngine, path: &Path) -> anyhow::Result<()> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query {}", path.display()))?
    };

    let query: ArticleQuery = serde_json::from_str(&raw).context("Invalid query document")?;
    let response = engine.process(&query).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Prints the effective configuration
fn print_config(config: &Config, hash: &str) {
    println!("=== Wiki-Ripple Configuration ===\n");
    println!("Hash: {}\n", hash);

    println!("Wiki:");
    println!("  API URL: {}", config.wiki.api_url);
    println!("  User agent: {}", config.wiki.user_agent);
    println!("  Request timeout: {}s", config.wiki.request_timeout_secs);
    println!(
        "  Retries: {} (delay {}ms)",
        config.wiki.max_retries, config.wiki.retry_delay_ms
    );

    println!("\nImport:");
    println!(
        "  Max concurrent requests: {}",
        config.import.max_concurrent_requests
    );
    println!("  Category batch size: {}", config.import.category_batch_size);
    match config.import.run_deadline_secs {
        0 => println!("  Run deadline: none"),
        secs => println!("  Run deadline: {}s", secs),
    }

    println!("\nGraph store:");
    match config.graph.backend {
        GraphBackend::Memory => println!("  Backend: memory"),
        GraphBackend::Neo4j => {
            println!("  Backend: neo4j");
            println!("  URL: {}", config.graph.url);
            println!("  Database: {}", config.graph.database);
            println!(
                "  Auth: {}",
                if config.graph.user.is_some() {
                    "basic"
                } else {
                    "none"
                }
            );
        }
    }

    println!("\nText index:");
    println!("  Database: {}", config.text.database_path);

    println!("\n✓ Configuration is valid");
}
