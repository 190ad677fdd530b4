//! # Lesson Harness CLI (`lsn`)
//!
//! The `lsn` binary is the primary interface for Lesson Harness. It
//! provides commands for running the upload/search HTTP server and for
//! one-shot ingestion, retrieval, and cleanup against the vector index.
//!
//! ## Usage
//!
//! ```bash
//! lsn --config ./config/lsn.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lsn serve` | Start the upload/search HTTP server with its ingestion worker |
//! | `lsn ingest <file> --lesson <id>` | Parse, chunk, and index one local file |
//! | `lsn search "<query>"` | Retrieve ranked passages (optionally lesson-scoped) |
//! | `lsn delete <resource-id>` | Remove a resource's records from the index |
//!
//! The vector index API key is read from the environment variable named
//! in `[index].api_key_env` (default `PINECONE_API_KEY`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use lesson_harness::config;
use lesson_harness::index::remote::RemoteIndex;
use lesson_harness::index::VectorIndex;
use lesson_harness::ingest::{IngestJob, IngestOutcome, IngestPipeline};
use lesson_harness::parser;
use lesson_harness::resources::{InMemoryResourceStore, ResourceStore};
use lesson_harness::search::Retriever;
use lesson_harness::server;

/// Lesson Harness — a lesson-scoped document ingestion and retrieval
/// pipeline for AI study tools.
#[derive(Parser)]
#[command(
    name = "lsn",
    about = "Lesson Harness — lesson-scoped document ingestion and retrieval for AI study tools",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lsn.toml`; built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/lsn.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload/search HTTP server.
    ///
    /// Uploads are accepted at `POST /upload`, queued, and processed by a
    /// background worker; clients poll `GET /resources/{id}` for status.
    Serve,

    /// Parse, chunk, and index one local file.
    ///
    /// The file type is inferred from the extension (pdf, docx, pptx).
    Ingest {
        /// Path to the document to ingest.
        file: PathBuf,

        /// Lesson the document belongs to.
        #[arg(long)]
        lesson: i64,
    },

    /// Retrieve ranked passages for a query.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one lesson. Omitting this searches all
        /// lessons.
        #[arg(long)]
        lesson: Option<i64>,

        /// Maximum number of hits to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Delete all index records belonging to a resource.
    Delete {
        /// Resource ID whose records should be removed.
        resource_id: i64,
    },
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let index: Arc<dyn VectorIndex> = Arc::new(RemoteIndex::connect(&cfg.index).await?);
            server::run_server(&cfg, index).await?;
        }
        Commands::Ingest { file, lesson } => {
            let mime_type = parser::mime_for_path(&file).ok_or_else(|| {
                anyhow::anyhow!(
                    "unsupported file extension: {} (expected pdf, docx, or pptx)",
                    file.display()
                )
            })?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            let bytes = std::fs::read(&file)?;

            let index: Arc<dyn VectorIndex> = Arc::new(RemoteIndex::connect(&cfg.index).await?);
            let resources = Arc::new(InMemoryResourceStore::new());
            let resource = resources.create(&file_name, mime_type, lesson).await?;
            let pipeline = IngestPipeline::new(
                index,
                resources.clone(),
                cfg.chunking.clone(),
                cfg.ingest.clone(),
            );

            let outcome = pipeline
                .ingest(IngestJob {
                    resource_id: resource.id,
                    lesson_id: lesson,
                    file_name: file_name.clone(),
                    mime_type: mime_type.to_string(),
                    bytes,
                })
                .await?;

            println!("ingest {}", file_name);
            println!("  resource: {}", resource.id);
            match outcome {
                IngestOutcome::Indexed { records } => {
                    println!("  records indexed: {}", records);
                }
                IngestOutcome::NoContent => {
                    println!("  no ingestible content");
                }
            }
            println!("ok");
        }
        Commands::Search {
            query,
            lesson,
            top_k,
        } => {
            let index: Arc<dyn VectorIndex> = Arc::new(RemoteIndex::connect(&cfg.index).await?);
            let retriever = Retriever::new(index, cfg.retrieval.top_k);
            let hits = retriever.search(&query, lesson, top_k).await;

            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                let title = if hit.title.is_empty() {
                    "(untitled)"
                } else {
                    &hit.title
                };
                println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.file_name, title);
                println!("    lesson: {}  chunk: {}", hit.lesson_id, hit.chunk_index);
                println!("    excerpt: \"{}\"", hit.text.replace('\n', " ").trim());
                println!();
            }
        }
        Commands::Delete { resource_id } => {
            let index = RemoteIndex::connect(&cfg.index).await?;
            index.delete_by_resource(resource_id).await?;
            println!("deleted records for resource {}", resource_id);
            println!("ok");
        }
    }

    Ok(())
}
