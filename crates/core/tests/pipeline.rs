use async_trait::async_trait;
use rag_qa_core::{
    embedder_from_config, AnswerGenerator, CompletionRequest, GenerationError, IngestionPipeline,
    LanguageModel, PipelineConfig, QueryError, QueryOptions, QueryPipeline, RetrievalError,
    SkipReason,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const FERMENTATION: &str = "Sourdough starters rely on wild yeast and lactic acid bacteria. \
The baker feeds the culture with flour and water every day, and the mixture bubbles as \
carbon dioxide is released. A mature starter smells tangy and doubles in volume within a \
few hours of feeding, which tells the baker it is ready to leaven bread dough.";

const ORBITS: &str = "Geostationary satellites circle the planet once per sidereal day. \
Their altitude of roughly thirty six thousand kilometres keeps them fixed above a single \
point on the equator, so ground antennas never need to track them. Weather imaging and \
television broadcasting both depend on this stationary vantage point high above the ocean.";

const GLACIERS: &str = "Glaciers carve valleys by plucking and abrading the bedrock beneath \
them. Moraines of unsorted gravel mark where the ice once paused, and kettle lakes form when \
buried blocks of ice finally melt. Hikers can read the retreat of the ice age in these \
landforms scattered across northern mountain ranges and broad lowland plains.";

struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        Ok(format!("answered with {} prompt chars", request.prompt.chars().count()))
    }
}

fn config_for(root: &Path) -> PipelineConfig {
    let root = root.to_string_lossy().to_string();
    PipelineConfig::from_lookup(move |key| match key {
        "GOOGLE_API_KEY" => Some("test".to_string()),
        "RAG_BASE_DIR" => Some(root.clone()),
        "EMBEDDING_MODEL" => Some("local/char-trigram-512".to_string()),
        "CHUNK_SIZE" => Some("400".to_string()),
        "CHUNK_OVERLAP" => Some("50".to_string()),
        "RETRIEVAL_K" => Some("3".to_string()),
        _ => None,
    })
    .expect("test config is valid")
}

fn query_pipeline(config: &PipelineConfig) -> QueryPipeline {
    let embedder = embedder_from_config(config, http_client(config)).expect("embedder");
    QueryPipeline::from_config(config, embedder, Arc::new(CannedModel)).expect("pipeline")
}

fn http_client(config: &PipelineConfig) -> reqwest::Client {
    config.http_client().expect("client builds")
}

#[tokio::test]
async fn ingest_then_query_round_trip() {
    let dir = tempdir().expect("tempdir");
    let config = config_for(dir.path());
    fs::create_dir_all(config.data_path.join("nested")).expect("mkdir");
    fs::write(
        config.data_path.join("nested/notes.txt"),
        format!("{FERMENTATION}\n\n{ORBITS}\n\n{GLACIERS}"),
    )
    .expect("write notes");
    fs::write(config.data_path.join("huge.md"), "x".repeat(1_000_001)).expect("write huge");

    let embedder = embedder_from_config(&config, http_client(&config)).expect("embedder");
    let summary = IngestionPipeline::from_config(&config, embedder)
        .expect("pipeline")
        .run()
        .await
        .expect("ingestion succeeds");

    assert_eq!(summary.files_found, 2);
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert!(matches!(summary.skipped[0].reason, SkipReason::TooLarge { .. }));
    assert!(summary.chunks > 1);
    assert_eq!(summary.dimensions, 512);

    let pipeline = query_pipeline(&config);
    let index = pipeline.retriever().load_index().await.expect("index loads");
    assert_eq!(index.len(), summary.chunks);

    let hits = pipeline
        .retriever()
        .retrieve("Geostationary satellites circle the planet once per sidereal day", None)
        .await
        .expect("retrieval succeeds");
    assert_eq!(hits.len(), 3);
    assert!(hits[0].chunk.text.contains("Geostationary satellites"));
    assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance));

    let answer = pipeline
        .answer("How do glaciers carve valleys?", &QueryOptions::default())
        .await
        .expect("answer succeeds");
    assert!(answer.text.starts_with("answered with"));
    assert_eq!(answer.sources.len(), 3);
}

#[tokio::test]
async fn query_before_ingestion_points_at_ingest() {
    let dir = tempdir().expect("tempdir");
    let config = config_for(dir.path());
    let pipeline = query_pipeline(&config);

    let error = pipeline
        .answer("anything", &QueryOptions::default())
        .await
        .expect_err("no index yet");
    assert!(matches!(
        error,
        QueryError::Retrieval(RetrievalError::IndexNotFound { .. })
    ));
    assert!(error.to_string().contains("run the ingestion pipeline first"));
}

#[tokio::test]
async fn generation_with_no_context_still_answers() {
    let dir = tempdir().expect("tempdir");
    let config = config_for(dir.path());
    let generator = AnswerGenerator::from_config(&config, Arc::new(CannedModel)).expect("generator");

    let text = generator
        .generate("What is a moraine?", &[], None)
        .await
        .expect("generation succeeds");
    assert!(!text.is_empty());
}
