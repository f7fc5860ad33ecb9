use crate::config::PipelineConfig;
use crate::error::EmbeddingError;
use crate::traits::Embedder;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Model identifiers with this prefix select [`CharacterNgramEmbedder`].
/// An optional `-<dims>` suffix sets the vector length.
pub const LOCAL_TRIGRAM_PREFIX: &str = "local/char-trigram";

#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::with_dimensions(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl CharacterNgramEmbedder {
    pub fn with_dimensions(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("{LOCAL_TRIGRAM_PREFIX}-{dimensions}"),
        }
    }

    pub fn from_model_id(model_id: &str) -> Result<Self, EmbeddingError> {
        let rest = model_id
            .strip_prefix(LOCAL_TRIGRAM_PREFIX)
            .ok_or_else(|| EmbeddingError::InvalidModel(model_id.to_string()))?;

        if rest.is_empty() {
            return Ok(Self::default());
        }

        rest.strip_prefix('-')
            .and_then(|dims| dims.parse::<usize>().ok())
            .filter(|dims| *dims > 0)
            .map(Self::with_dimensions)
            .ok_or_else(|| EmbeddingError::InvalidModel(model_id.to_string()))
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

pub struct HttpEmbedder {
    endpoint: Url,
    model_id: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model_id: impl Into<String>,
        client: Client,
    ) -> Result<Self, EmbeddingError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            endpoint: endpoint.join("embed")?,
            model_id: model_id.into(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model_id, batch_size = texts.len(), "embedding batch");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "inputs": texts, "truncate": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::BackendResponse {
                backend: self.endpoint.to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        Ok(vectors)
    }
}

pub fn embedder_from_config(
    config: &PipelineConfig,
    client: Client,
) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    if config.embedding_model.starts_with(LOCAL_TRIGRAM_PREFIX) {
        return Ok(Arc::new(CharacterNgramEmbedder::from_model_id(
            &config.embedding_model,
        )?));
    }

    Ok(Arc::new(HttpEmbedder::new(
        &config.embedding_endpoint,
        config.embedding_model.clone(),
        client,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_sync("Hydraulic pressure and flow");
        let second = embedder.embed_sync("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder::with_dimensions(32);
        let vector = embedder.embed_sync("abc");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn local_model_ids_parse_dimensions() {
        let embedder = CharacterNgramEmbedder::from_model_id("local/char-trigram-256")
            .expect("model id should parse");
        assert_eq!(embedder.dimensions(), 256);
        assert_eq!(embedder.model_id(), "local/char-trigram-256");

        let default = CharacterNgramEmbedder::from_model_id("local/char-trigram")
            .expect("bare prefix should parse");
        assert_eq!(default.dimensions(), DEFAULT_EMBEDDING_DIMENSIONS);

        assert!(CharacterNgramEmbedder::from_model_id("local/char-trigram-0").is_err());
        assert!(CharacterNgramEmbedder::from_model_id("local/char-trigramx").is_err());
    }

    #[test]
    fn http_embedder_targets_embed_route() {
        let embedder = HttpEmbedder::new("http://localhost:8080/tei", "m", Client::new())
            .expect("endpoint should parse");
        assert_eq!(embedder.endpoint.as_str(), "http://localhost:8080/tei/embed");
    }

    #[tokio::test]
    async fn single_embed_goes_through_batch_path() {
        let embedder = CharacterNgramEmbedder::with_dimensions(16);
        let single = embedder.embed("pump").await.expect("embed should succeed");
        let batch = embedder
            .embed_many(&["pump".to_string()])
            .await
            .expect("batch should succeed");
        assert_eq!(vec![single], batch);
    }
}
