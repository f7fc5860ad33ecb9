use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found in environment variables; set it in the environment or a .env file")]
    MissingSecret(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data path not found: {}", .0.display())]
    DataPathNotFound(PathBuf),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("{} is not valid utf-8: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("no documents found under {}; check the data path", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("no chunks were produced from {0} documents; check their contents")]
    EmptyChunks(usize),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("unknown embedding model identifier: {0}")]
    InvalidModel(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot build an index from zero chunks")]
    EmptyInput,

    #[error("vector index not found at {}", path.display())]
    IndexNotFound { path: PathBuf },

    #[error("failed to load vector index at {}: {reason}", path.display())]
    IndexLoad { path: PathBuf, reason: String },

    #[error(
        "index was built with embedding model {index_model:?} but {configured_model:?} is configured; re-run ingestion"
    )]
    EmbeddingModelMismatch {
        index_model: String,
        configured_model: String,
    },

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(
        "vector database not found at {}. Please run the ingestion pipeline first (rag-qa ingest)",
        path.display()
    )]
    IndexNotFound { path: PathBuf },

    #[error("failed to load vector database: {0}")]
    IndexLoad(IndexError),

    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to retrieve documents: {0}")]
    Search(IndexError),

    #[error("query is empty")]
    EmptyQuery,

    #[error("k must be a positive integer, got {0}")]
    InvalidTopK(usize),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{backend} returned {status}: {details}")]
    Backend {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("{0} returned no text")]
    EmptyResponse(String),

    #[error("invalid prompt template: {0}")]
    Template(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown model {0:?}, choose one of: {1}")]
    UnknownModel(String, String),

    #[error("k must be between {min} and {max}, got {value}")]
    TopKOutOfRange { value: usize, min: usize, max: usize },
}
