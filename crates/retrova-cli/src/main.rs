//! `retrova` — ingest documents, search collections and chat over them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use retrova_chat::{ChatConfig, ChatService};
use retrova_ingest::{ExtractedDocument, IngestPipeline, SplitterConfig};
use retrova_model::{
    CohereReranker, CompletionEvent, EmbeddingProvider, HashEmbeddings, OpenAiCompletion,
    OpenAiEmbeddings, Reranker,
};
use retrova_retrieval::{HybridParams, RetrievalEngine};
use retrova_store::VectorStore;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrova", about = "Retrova — hybrid retrieval over your documents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "retrova.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest extracted documents (JSON with `sections` and `tables`)
    Ingest {
        /// Target collection
        collection: String,
        /// Extracted document files
        files: Vec<PathBuf>,
    },
    /// Search a collection
    Search {
        /// Collection to search
        collection: String,
        /// The query text
        query: String,
        /// Which retrieval leg(s) to run
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: SearchMode,
        /// Re-rank the fused shortlist
        #[arg(long)]
        rerank: bool,
    },
    /// Chat over a collection, streaming answers
    Chat {
        /// Collection holding the document chunks
        #[arg(default_value = "retrova_documents")]
        collection: String,
        /// Session id; a fresh one is generated when omitted
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

#[derive(Deserialize)]
struct RetrovaConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    model: ModelConfig,
    #[serde(default)]
    ingest: IngestConfig,
    #[serde(default)]
    retrieval: RetrievalConfig,
}

impl Default for RetrovaConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            model: ModelConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_completion_model")]
    completion_model: String,
    #[serde(default)]
    rerank_base_url: Option<String>,
    #[serde(default)]
    rerank_api_key: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            completion_model: default_completion_model(),
            rerank_base_url: None,
            rerank_api_key: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    overlap_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_size: default_overlap_size(),
        }
    }
}

#[derive(Deserialize)]
struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_score_threshold")]
    score_threshold: f32,
    #[serde(default = "default_alpha")]
    alpha: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            alpha: default_alpha(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_chunk_size() -> usize {
    1440
}
fn default_overlap_size() -> usize {
    256
}
fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f32 {
    0.5
}
fn default_alpha() -> f32 {
    0.5
}

/// The embedding provider: the HTTP client when an API key is configured,
/// otherwise the deterministic local provider.
fn build_embedder(model: &ModelConfig, api_key: &str) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if api_key.is_empty() {
        warn!("no API key configured, using local hash embeddings");
        return Ok(Arc::new(HashEmbeddings::default()));
    }
    Ok(Arc::new(OpenAiEmbeddings::new(&model.base_url, api_key)?))
}

fn build_reranker(model: &ModelConfig) -> anyhow::Result<Option<Arc<dyn Reranker>>> {
    let Some(base_url) = &model.rerank_base_url else {
        return Ok(None);
    };
    let api_key = resolve_key(&model.rerank_api_key, "COHERE_API_KEY");
    Ok(Some(Arc::new(CohereReranker::new(base_url, api_key)?)))
}

/// Config value wins; otherwise the environment variable.
fn resolve_key(configured: &str, env_var: &str) -> String {
    if configured.is_empty() {
        std::env::var(env_var).unwrap_or_default()
    } else {
        configured.to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config: RetrovaConfig = match tokio::fs::read_to_string(&cli.config).await {
        Ok(raw) => toml::from_str(&raw)?,
        Err(_) => {
            warn!(config = %cli.config.display(), "config file not found, using defaults");
            RetrovaConfig::default()
        }
    };

    let api_key = resolve_key(&config.model.api_key, "OPENAI_API_KEY");
    let store = Arc::new(VectorStore::open(config.data_dir.join("store")).await?);
    let embedder = build_embedder(&config.model, &api_key)?;

    match cli.command {
        Commands::Ingest { collection, files } => {
            let pipeline = IngestPipeline::new(store, embedder).with_config(SplitterConfig {
                chunk_size: config.ingest.chunk_size,
                overlap_size: config.ingest.overlap_size,
            });

            for file in files {
                let raw = tokio::fs::read_to_string(&file).await?;
                let document: ExtractedDocument = serde_json::from_str(&raw)?;
                let source = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.display().to_string());
                let report = pipeline
                    .ingest_document(&collection, &document, Some(&source))
                    .await?;
                info!(
                    file = %file.display(),
                    inserted = report.inserted,
                    skipped = report.skipped,
                    "ingested"
                );
            }
        }

        Commands::Search {
            collection,
            query,
            mode,
            rerank,
        } => {
            let mut engine = RetrievalEngine::new(store, embedder);
            if let Some(reranker) = build_reranker(&config.model)? {
                engine = engine.with_reranker(reranker);
            }

            let records = match mode {
                SearchMode::Semantic => {
                    engine
                        .semantic_search(
                            &query,
                            &collection,
                            config.retrieval.top_k,
                            config.retrieval.score_threshold,
                            None,
                        )
                        .await?
                }
                SearchMode::Keyword => {
                    engine
                        .keyword_search(&query, &collection, config.retrieval.top_k)
                        .await?
                }
                SearchMode::Hybrid => {
                    engine
                        .hybrid_search(
                            &query,
                            &collection,
                            &HybridParams {
                                top_k_semantic: config.retrieval.top_k,
                                top_k_keyword: config.retrieval.top_k,
                                score_threshold: config.retrieval.score_threshold,
                                alpha: config.retrieval.alpha,
                                rerank,
                                ..HybridParams::default()
                            },
                        )
                        .await?
                }
            };

            if records.is_empty() {
                println!("no results");
            }
            for (rank, record) in records.iter().enumerate() {
                let source = record.source.as_deref().unwrap_or("-");
                println!(
                    "{:>2}. {:.4} [{:?}] {}",
                    rank + 1,
                    record.score,
                    record.search_type,
                    source
                );
                println!("    {}", record.content.replace('\n', "\n    "));
            }
        }

        Commands::Chat {
            collection,
            session,
        } => {
            let engine = Arc::new(RetrievalEngine::new(store.clone(), embedder.clone()));
            let completion = Arc::new(OpenAiCompletion::new(&config.model.base_url, &api_key)?);
            let service = ChatService::new(store, engine, embedder, completion).with_config(
                ChatConfig {
                    document_collection: collection,
                    top_k: config.retrieval.top_k,
                    score_threshold: config.retrieval.score_threshold,
                    ..ChatConfig::default()
                },
            );

            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            println!("session {session} — empty line to exit");

            let mut stdout = tokio::io::stdout();
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let query = line.trim();
                if query.is_empty() {
                    break;
                }

                let (mut rx, handle) = service
                    .answer(query, &session, &config.model.completion_model)
                    .await?;
                while let Some(event) = rx.recv().await {
                    match event {
                        CompletionEvent::TextDelta { text } => {
                            stdout.write_all(text.as_bytes()).await?;
                            stdout.flush().await?;
                        }
                        CompletionEvent::Error { message } => {
                            eprintln!("\nstream error: {message}");
                        }
                        CompletionEvent::Usage { .. } | CompletionEvent::Done => {}
                    }
                }
                stdout.write_all(b"\n").await?;
                handle.await??;
            }
        }
    }

    Ok(())
}
