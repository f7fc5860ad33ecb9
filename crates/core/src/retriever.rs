use crate::error::{IndexError, RetrievalError};
use crate::models::ScoredChunk;
use crate::store::VectorIndex;
use crate::stores::disk::{load_index_for_model, read_manifest};
use crate::traits::Embedder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The loaded index is reused while the manifest keeps the same build id.
pub struct Retriever {
    index_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    default_k: usize,
    cached: RwLock<Option<Arc<VectorIndex>>>,
}

impl Retriever {
    pub fn new(index_path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, default_k: usize) -> Self {
        Self {
            index_path: index_path.into(),
            embedder,
            default_k: default_k.max(1),
            cached: RwLock::new(None),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn index_present(&self) -> bool {
        read_manifest(&self.index_path).is_ok()
    }

    pub async fn load_index(&self) -> Result<Arc<VectorIndex>, RetrievalError> {
        let manifest = read_manifest(&self.index_path).map_err(|error| self.classify(error))?;

        if let Some(index) = self.cached.read().await.as_ref() {
            if index.manifest().build_id == manifest.build_id {
                return Ok(index.clone());
            }
        }

        let mut slot = self.cached.write().await;
        if let Some(index) = slot.as_ref() {
            if index.manifest().build_id == manifest.build_id {
                return Ok(index.clone());
            }
        }

        let index = load_index_for_model(&self.index_path, self.embedder.model_id())
            .map_err(|error| self.classify(error))?;
        info!(
            path = %self.index_path.display(),
            chunks = index.len(),
            build_id = %index.manifest().build_id,
            "vector index loaded"
        );

        let index = Arc::new(index);
        *slot = Some(index.clone());
        Ok(index)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(RetrievalError::InvalidTopK(k));
        }
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let index = self.load_index().await?;
        let query_vector = self.embedder.embed(query).await?;
        let hits = index
            .search(&query_vector, k)
            .map_err(RetrievalError::Search)?;

        debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }

    fn classify(&self, error: IndexError) -> RetrievalError {
        match error {
            IndexError::IndexNotFound { path } => RetrievalError::IndexNotFound { path },
            other => RetrievalError::IndexLoad(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{Chunk, ChunkMetadata};
    use crate::stores::disk::save_index;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                chunk_id: format!("chunk-{index}"),
                document_id: "doc".to_string(),
                source_path: "/tmp/doc.txt".to_string(),
                page: None,
                chunk_index: index,
            },
        }
    }

    async fn build_and_save(path: &Path, embedder: &CharacterNgramEmbedder, texts: &[&str]) {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(index, text)| chunk(index as u64, text))
            .collect();
        let index = VectorIndex::build(chunks, embedder)
            .await
            .expect("index should build");
        save_index(&index, path).expect("index should save");
    }

    #[tokio::test]
    async fn missing_index_suggests_ingestion() {
        let dir = tempdir().expect("tempdir");
        let retriever = Retriever::new(
            dir.path().join("vector_db"),
            Arc::new(CharacterNgramEmbedder::default()),
            5,
        );

        let error = retriever
            .retrieve("anything", None)
            .await
            .expect_err("retrieval should fail");
        assert!(matches!(error, RetrievalError::IndexNotFound { .. }));
        assert!(error.to_string().contains("run the ingestion pipeline first"));
        assert!(!retriever.index_present());
    }

    #[tokio::test]
    async fn retrieve_returns_closest_first_and_respects_k() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vector_db");
        let embedder = CharacterNgramEmbedder::with_dimensions(256);
        build_and_save(
            &path,
            &embedder,
            &["turmeric root powder", "sailing in open water", "ginger tea brewing"],
        )
        .await;

        let retriever = Retriever::new(&path, Arc::new(embedder), 2);
        let hits = retriever
            .retrieve("sailing in open water", None)
            .await
            .expect("retrieval should succeed");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "sailing in open water");

        let all = retriever
            .retrieve("sailing", Some(10))
            .await
            .expect("retrieval should succeed");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn cache_follows_rebuilds() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vector_db");
        let embedder = CharacterNgramEmbedder::with_dimensions(64);
        build_and_save(&path, &embedder, &["one"]).await;

        let retriever = Retriever::new(&path, Arc::new(embedder.clone()), 5);
        let first = retriever.load_index().await.expect("load");
        let again = retriever.load_index().await.expect("load");
        assert!(Arc::ptr_eq(&first, &again));

        build_and_save(&path, &embedder, &["one", "two"]).await;
        let rebuilt = retriever.load_index().await.expect("load");
        assert_eq!(rebuilt.len(), 2);
    }

    #[tokio::test]
    async fn mismatched_embedding_model_fails_fast() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vector_db");
        build_and_save(&path, &CharacterNgramEmbedder::with_dimensions(64), &["one"]).await;

        let retriever = Retriever::new(
            &path,
            Arc::new(CharacterNgramEmbedder::with_dimensions(128)),
            5,
        );
        let error = retriever
            .retrieve("one", None)
            .await
            .expect_err("model mismatch should fail");
        assert!(matches!(
            error,
            RetrievalError::IndexLoad(IndexError::EmbeddingModelMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn blank_query_and_zero_k_are_rejected() {
        let retriever = Retriever::new(
            "/nonexistent/rag-qa",
            Arc::new(CharacterNgramEmbedder::default()),
            5,
        );
        assert!(matches!(
            retriever.retrieve("  ", None).await,
            Err(RetrievalError::EmptyQuery)
        ));
        assert!(matches!(
            retriever.retrieve("q", Some(0)).await,
            Err(RetrievalError::InvalidTopK(0))
        ));
    }
}
