//! # Dossier CLI (`dossier`)
//!
//! Command-line interface over the ingestion and retrieval pipeline. Each
//! case subject owns one SQLite-backed vector store under the configured
//! storage root; documents are ingested into per-document collections and
//! queried with free-text searches.
//!
//! ## Usage
//!
//! ```bash
//! dossier --config ./config/dossier.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dossier init` | Create the storage root directory |
//! | `dossier ingest <file> --subject <name>` | Ingest one document for a subject |
//! | `dossier collections --subject <name>` | List a subject's document collections |
//! | `dossier search "<query>" --subject <name> --document <file>` | Retrieve a windowed excerpt |
//! | `dossier ask "<query>" --subject <name> --document <file>` | Retrieve, refine, and answer via LLM |

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dossier::config::Config;
use dossier::embedding::create_embedder;
use dossier::extract::ExtractorRegistry;
use dossier::ingest::ingest_file;
use dossier::keywords::NgramExtractor;
use dossier::llm::{render_prompt, LlmClient};
use dossier::models::RetrievalStatus;
use dossier::refine::refine_snippet;
use dossier::retrieve::get_snippet;
use dossier::store::SubjectStore;

/// Dossier — local-first ingestion and retrieval over case documents.
#[derive(Parser)]
#[command(
    name = "dossier",
    about = "Local-first ingestion and retrieval over case documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dossier.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage root directory.
    ///
    /// Idempotent; running it repeatedly is safe.
    Init,

    /// Ingest one document into a subject's store.
    ///
    /// Extracts text, chunks it, generates keyword metadata, embeds every
    /// chunk, and writes the result into a collection named after the
    /// document. Re-ingesting a document replaces its previous chunks.
    Ingest {
        /// Path to the document (pdf, docx, xlsx, image, audio, or text).
        file: PathBuf,

        /// Case subject the document belongs to.
        #[arg(long)]
        subject: String,
    },

    /// List a subject's document collections.
    Collections {
        /// Case subject to inspect.
        #[arg(long)]
        subject: String,
    },

    /// Retrieve a windowed excerpt for a query.
    Search {
        /// Free-text query.
        query: String,

        /// Case subject whose store is searched.
        #[arg(long)]
        subject: String,

        /// Document (collection) to search within.
        #[arg(long)]
        document: String,

        /// Override the excerpt window size in characters.
        #[arg(long)]
        window: Option<usize>,
    },

    /// Answer a question about a document via retrieve, refine, and LLM.
    ///
    /// When the LLM call fails the refined context is printed instead, so
    /// the retrieved evidence is never lost to an API outage.
    Ask {
        /// Free-text question.
        query: String,

        /// Case subject whose store is searched.
        #[arg(long)]
        subject: String,

        /// Document (collection) to search within.
        #[arg(long)]
        document: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            std::fs::create_dir_all(&config.storage.root).with_context(|| {
                format!(
                    "failed to create storage root {}",
                    config.storage.root.display()
                )
            })?;
            println!("storage root ready: {}", config.storage.root.display());
        }

        Commands::Ingest { file, subject } => {
            let store = SubjectStore::open(&config.storage.root, &subject).await?;
            let embedder = create_embedder(&config.embedding)?;
            let keywords = NgramExtractor::new(&config.keywords.extra_stopwords);
            let registry = ExtractorRegistry::new();

            let summary = ingest_file(
                &store,
                &file,
                &subject,
                &registry,
                &keywords,
                embedder.as_ref(),
                config.chunking.max_chunk_size,
                config.embedding.batch_size,
            )
            .await?;

            println!(
                "ingested {} ({}) into collection {}: {} segment(s), {} chunk(s)",
                file.display(),
                summary.document_type,
                summary.collection,
                summary.segments,
                summary.chunks
            );
        }

        Commands::Collections { subject } => {
            let store = SubjectStore::open(&config.storage.root, &subject).await?;
            let collections = store.list_collections().await?;
            if collections.is_empty() {
                println!("no collections for subject {}", subject);
            }
            for name in collections {
                println!("{}", name);
            }
        }

        Commands::Search {
            query,
            subject,
            document,
            window,
        } => {
            let store = SubjectStore::open(&config.storage.root, &subject).await?;
            let collection = store.collection(&document);
            let embedder = create_embedder(&config.embedding)?;
            let keywords = NgramExtractor::new(&config.keywords.extra_stopwords);

            let result = get_snippet(
                &collection,
                &query,
                embedder.as_ref(),
                &keywords,
                window.unwrap_or(config.retrieval.window),
            )
            .await;

            print_result(&result.text, &result.files, result.status);
        }

        Commands::Ask {
            query,
            subject,
            document,
        } => {
            let store = SubjectStore::open(&config.storage.root, &subject).await?;
            let collection = store.collection(&document);
            let embedder = create_embedder(&config.embedding)?;
            let keywords = NgramExtractor::new(&config.keywords.extra_stopwords);

            let retrieved = get_snippet(
                &collection,
                &query,
                embedder.as_ref(),
                &keywords,
                config.retrieval.window,
            )
            .await;

            if retrieved.text.is_empty() {
                println!("no relevant passages found");
                return Ok(());
            }

            let refined = refine_snippet(&collection, &retrieved.text, embedder.as_ref()).await;
            let context = if refined.text.is_empty() {
                retrieved.text.clone()
            } else {
                refined.text.clone()
            };

            let prompt = render_prompt(&config.llm.prompt_template, &context, &query);
            match LlmClient::new(&config.llm) {
                Ok(client) => match client.complete(&prompt).await {
                    Ok(answer) => {
                        println!("{}", answer);
                        print_sources(retrieved.files.union(&refined.files));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "answer generation failed, showing context");
                        print_result(&context, &retrieved.files, RetrievalStatus::Degraded);
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "LLM client unavailable, showing context");
                    print_result(&context, &retrieved.files, RetrievalStatus::Degraded);
                }
            }
        }
    }

    Ok(())
}

fn print_result(
    text: &str,
    files: &std::collections::BTreeSet<String>,
    status: RetrievalStatus,
) {
    match status {
        RetrievalStatus::Empty => println!("no relevant passages found"),
        RetrievalStatus::Found | RetrievalStatus::Degraded => {
            if text.is_empty() {
                println!("no relevant passages found");
            } else {
                println!("{}", text);
                print_sources(files.iter());
            }
        }
    }
}

fn print_sources<'a, I: Iterator<Item = &'a String>>(files: I) {
    let files: Vec<&String> = files.collect();
    if !files.is_empty() {
        println!();
        println!("sources:");
        for f in files {
            println!("  {}", f);
        }
    }
}
