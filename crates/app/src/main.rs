mod chat;
mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rag_qa_core::{
    embedder_from_config, Embedder, GeminiClient, IngestError, IngestStage, IngestionPipeline,
    PipelineConfig, QueryOptions, QueryPipeline,
};
use rag_qa_core::session::{SOURCE_PREVIEW_CHARS, SOURCE_PREVIEW_COUNT};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk and embed everything under DATA_PATH into the vector database.
    Ingest,
    /// Answer one question from the indexed documents.
    Ask {
        /// The question to answer.
        query: String,
        /// Number of chunks to retrieve.
        #[arg(long)]
        k: Option<usize>,
        /// Gemini model to answer with.
        #[arg(long)]
        model: Option<String>,
    },
    /// Serve `GET /ask?q=` over HTTP.
    Serve {
        #[arg(long, env = "RAG_QA_ADDR", default_value = "127.0.0.1:8000")]
        addr: String,
    },
    /// Interactive question answering shell.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        embedding_model = %config.embedding_model,
        llm_model = %config.llm_model,
        "rag-qa boot"
    );

    let client = config.http_client().context("failed to build http client")?;
    let embedder: Arc<dyn Embedder> = embedder_from_config(&config, client.clone())?;

    match cli.command {
        Command::Ingest => ingest(&config, embedder).await,
        Command::Ask { query, k, model } => {
            let pipeline = query_pipeline(&config, embedder, client)?;
            let answer = pipeline.answer(&query, &QueryOptions { k, model }).await?;

            println!("{}", answer.text);
            for (position, source) in answer
                .source_previews(SOURCE_PREVIEW_COUNT, SOURCE_PREVIEW_CHARS)
                .iter()
                .enumerate()
            {
                println!("\n[source {}] {}", position + 1, source);
            }
            Ok(())
        }
        Command::Serve { addr } => {
            let pipeline = query_pipeline(&config, embedder, client)?;
            server::run_server(&addr, Arc::new(pipeline)).await
        }
        Command::Chat => {
            let pipeline = query_pipeline(&config, embedder, client)?;
            chat::run_chat(&pipeline).await
        }
    }
}

async fn ingest(config: &PipelineConfig, embedder: Arc<dyn Embedder>) -> anyhow::Result<()> {
    let pipeline = IngestionPipeline::from_config(config, embedder)?;
    let outcome = pipeline
        .run_with(|stage: IngestStage| {
            println!(
                "[Step {}/{}] {}...",
                stage.number(),
                IngestStage::COUNT,
                stage.label()
            );
        })
        .await;

    let summary = match outcome {
        Ok(summary) => summary,
        Err(error @ (IngestError::EmptyCorpus(_) | IngestError::EmptyChunks(_))) => {
            println!("Nothing to index: {error}");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };

    println!(
        "Loaded {} documents from {} of {} files ({} skipped)",
        summary.documents,
        summary.files_processed,
        summary.files_found,
        summary.skipped.len()
    );
    println!(
        "Indexed {} chunks ({} dims, {}) into {}",
        summary.chunks,
        summary.dimensions,
        summary.embedding_model,
        summary.index_path.display()
    );
    Ok(())
}

fn query_pipeline(
    config: &PipelineConfig,
    embedder: Arc<dyn Embedder>,
    client: reqwest::Client,
) -> anyhow::Result<QueryPipeline> {
    let model = GeminiClient::new(config.api_key.clone(), &config.llm_base_url, client)?;
    Ok(QueryPipeline::from_config(config, embedder, Arc::new(model))?)
}
