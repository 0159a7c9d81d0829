//! # Pagestash CLI (`pstash`)
//!
//! The `pstash` binary drives the archive engine from the command line:
//! database initialization, page indexing, search, document retrieval, and
//! the HTTP facade.
//!
//! ## Usage
//!
//! ```bash
//! pstash --config ./config/pagestash.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pstash init` | Create both SQLite files and run schema migrations |
//! | `pstash status` | Report engine readiness |
//! | `pstash index <url>` | Index one page (content from `--file` or stdin) |
//! | `pstash skip <url>` | Acknowledge a non-indexable page |
//! | `pstash search "<query>"` | Search indexed pages |
//! | `pstash get <url>` | Retrieve a stored document by URL |
//! | `pstash serve` | Start the HTTP facade |

mod config;
mod db;
mod engine;
mod fragment;
mod migrate;
mod models;
mod search;
mod server;
mod statement;
mod store;

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::Engine;
use crate::models::{PagePayload, Visit};

/// Pagestash — local indexing and full-text search for a personal web-page
/// archive.
#[derive(Parser)]
#[command(
    name = "pstash",
    about = "Pagestash — local indexing and full-text search for a personal web-page archive",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pagestash.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize both database files.
    ///
    /// Creates the primary and staging SQLite files and applies all schema
    /// migrations. Idempotent — running it multiple times is safe.
    Init,

    /// Report whether the engine initialized without error.
    Status,

    /// Index one page.
    ///
    /// Reads the extracted page text from `--file`, or from stdin when no
    /// file is given.
    Index {
        /// The page URL (unique key for deduplication).
        url: String,

        /// Page title.
        #[arg(long)]
        title: Option<String>,

        /// Short excerpt shown in result lists.
        #[arg(long)]
        excerpt: Option<String>,

        /// Read the page text from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Acknowledge a page an external filter deemed non-indexable.
    Skip {
        /// The page URL.
        url: String,
    },

    /// Search indexed pages.
    Search {
        /// The search query string (FTS5 syntax).
        query: String,

        /// Maximum number of results per page.
        #[arg(long)]
        limit: Option<i64>,

        /// Number of results to skip.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Retrieve a stored document by exact URL.
    Get {
        /// The page URL.
        url: String,
    },

    /// Start the HTTP facade.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let engine = Engine::init(cfg.clone()).await;

    let status = engine.status();
    if matches!(cli.command, Commands::Status) {
        match status.error {
            None => println!("ok"),
            Some(e) => {
                println!("error: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }
    if !status.ok {
        eprintln!(
            "Error: {}",
            status.error.as_deref().unwrap_or("engine not ready")
        );
        std::process::exit(1);
    }

    match cli.command {
        Commands::Init => {
            println!("Databases initialized successfully.");
        }
        Commands::Status => unreachable!(),
        Commands::Index {
            url,
            title,
            excerpt,
            file,
        } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let payload = PagePayload {
                title,
                excerpt,
                content: Some(content),
                publication_date: None,
                extraction_method: Some("cli".to_string()),
            };

            let outcome = engine.index_page(&payload, &url, &Visit::now()).await?;
            println!("{}", outcome.message);
        }
        Commands::Skip { url } => {
            engine.nothing_to_index(&url);
            println!("ok");
        }
        Commands::Search {
            query,
            limit,
            offset,
        } => {
            let response = engine.search(&query, limit, Some(offset)).await?;

            println!("{} matches ({:.1} ms)", response.count, response.perf_ms);
            for (i, result) in response.results.iter().enumerate() {
                let title = result.title.as_deref().unwrap_or("(untitled)");
                println!("{}. {}", offset + i as i64 + 1, title);
                println!("    url: {}", result.url);
                if let Some(ref hostname) = result.hostname {
                    println!("    host: {}", hostname);
                }
                println!(
                    "    snippet: \"{}\"",
                    result.snippet.replace('\n', " ").trim()
                );
                println!();
            }
        }
        Commands::Get { url } => match engine.find_one(&url).await? {
            Some(doc) => {
                println!("--- Document ---");
                println!("id:              {}", doc.id);
                println!(
                    "title:           {}",
                    doc.title.as_deref().unwrap_or("(untitled)")
                );
                println!("url:             {}", doc.url);
                if let Some(ref hostname) = doc.hostname {
                    println!("hostname:        {}", hostname);
                }
                if let Some(ref excerpt) = doc.excerpt {
                    println!("excerpt:         {}", excerpt);
                }
                if let Some(ref hash) = doc.content_hash {
                    println!("content_hash:    {}", hash);
                }
                if let Some(last_visit) = doc.last_visit {
                    println!("last_visit:      {}", format_millis(last_visit));
                }
                println!("created_at:      {}", format_millis(doc.created_at));
                println!("updated_at:      {}", format_millis(doc.updated_at));
                if let Some(ref content) = doc.content {
                    println!();
                    println!("--- Content ---");
                    println!("{}", content);
                }
            }
            None => {
                eprintln!("Error: document not found: {}", url);
                std::process::exit(1);
            }
        },
        Commands::Serve => {
            server::run_server(&cfg, Arc::new(engine)).await?;
        }
    }

    Ok(())
}

fn format_millis(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
