pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod session;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_documents, ChunkingConfig, RecursiveSplitter, DEFAULT_SEPARATORS};
pub use config::PipelineConfig;
pub use embeddings::{
    embedder_from_config, CharacterNgramEmbedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ConfigError, EmbeddingError, GenerationError, IndexError, IngestError, QueryError,
    RetrievalError, SessionError,
};
pub use extractor::{extract_documents, LopdfExtractor, PageText, SourceFormat};
pub use gemini::GeminiClient;
pub use generation::{build_context, AnswerGenerator, PromptTemplate, SamplingParams};
pub use ingest::{discover_source_files, load_documents, LoadReport, SkipReason, SkippedFile};
pub use models::{Answer, ChatTurn, Chunk, ChunkMetadata, Document, DocumentMetadata, Role, ScoredChunk};
pub use orchestrator::{IngestStage, IngestionPipeline, IngestionSummary, QueryOptions, QueryPipeline};
pub use retriever::Retriever;
pub use session::{ChatSession, MODEL_OPTIONS};
pub use store::{cosine_distance, IndexManifest, VectorIndex};
pub use stores::{load_index, load_index_for_model, read_manifest, save_index};
pub use traits::{CompletionRequest, Embedder, LanguageModel, PdfExtractor};
