use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::config::PipelineConfig;
use crate::error::{GenerationError, IngestError, QueryError};
use crate::generation::AnswerGenerator;
use crate::ingest::{load_documents, SkippedFile};
use crate::models::{Answer, Chunk};
use crate::retriever::Retriever;
use crate::store::VectorIndex;
use crate::stores::disk::save_index;
use crate::traits::{Embedder, LanguageModel};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Loading,
    Chunking,
    Indexing,
}

impl IngestStage {
    pub const COUNT: usize = 3;

    pub fn number(self) -> usize {
        match self {
            Self::Loading => 1,
            Self::Chunking => 2,
            Self::Indexing => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Loading => "Loading documents",
            Self::Chunking => "Chunking documents",
            Self::Indexing => "Building vector database",
        }
    }
}

#[derive(Debug)]
pub struct IngestionSummary {
    pub files_found: usize,
    pub files_processed: usize,
    pub skipped: Vec<SkippedFile>,
    pub documents: usize,
    pub chunks: usize,
    pub dimensions: usize,
    pub embedding_model: String,
    pub index_path: PathBuf,
}

pub struct IngestionPipeline {
    data_path: PathBuf,
    index_path: PathBuf,
    chunking: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
}

impl IngestionPipeline {
    pub fn new(
        data_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        chunking: ChunkingConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            index_path: index_path.into(),
            chunking,
            embedder,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IngestError> {
        Ok(Self::new(
            config.data_path.clone(),
            config.vector_db_path.clone(),
            ChunkingConfig::new(config.chunk_size, config.chunk_overlap)?,
            embedder,
        ))
    }

    pub async fn run(&self) -> Result<IngestionSummary, IngestError> {
        self.run_with(|_| {}).await
    }

    /// An empty corpus or chunk set stops the run before anything is written.
    pub async fn run_with<F>(&self, mut on_stage: F) -> Result<IngestionSummary, IngestError>
    where
        F: FnMut(IngestStage) + Send,
    {
        on_stage(IngestStage::Loading);
        let report = load_documents(&self.data_path)?;
        for skipped in &report.skipped {
            warn!(path = %skipped.path.display(), reason = ?skipped.reason, "skipped file");
        }
        if report.documents.is_empty() {
            return Err(IngestError::EmptyCorpus(self.data_path.clone()));
        }

        on_stage(IngestStage::Chunking);
        let document_count = report.documents.len();
        let chunks: Vec<Chunk> = chunk_documents(&report.documents, self.chunking);
        if chunks.is_empty() {
            return Err(IngestError::EmptyChunks(document_count));
        }
        let chunk_count = chunks.len();

        on_stage(IngestStage::Indexing);
        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await?;
        let manifest = save_index(&index, &self.index_path)?;

        info!(
            files_processed = report.files_processed,
            documents = document_count,
            chunks = chunk_count,
            index_path = %self.index_path.display(),
            "ingestion complete"
        );

        Ok(IngestionSummary {
            files_found: report.files_found,
            files_processed: report.files_processed,
            skipped: report.skipped,
            documents: document_count,
            chunks: manifest.chunk_count,
            dimensions: manifest.dimensions,
            embedding_model: manifest.embedding_model,
            index_path: self.index_path.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub k: Option<usize>,
    pub model: Option<String>,
}

pub struct QueryPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl QueryPipeline {
    pub fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, GenerationError> {
        Ok(Self::new(
            Retriever::new(config.vector_db_path.clone(), embedder, config.retrieval_k),
            AnswerGenerator::from_config(config, model)?,
        ))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &AnswerGenerator {
        &self.generator
    }

    pub async fn answer(&self, query: &str, options: &QueryOptions) -> Result<Answer, QueryError> {
        let sources = self.retriever.retrieve(query, options.k).await?;
        let chunks: Vec<Chunk> = sources.iter().map(|scored| scored.chunk.clone()).collect();
        let text = self
            .generator
            .generate(query, &chunks, options.model.as_deref())
            .await?;

        Ok(Answer { text, sources })
    }
}
