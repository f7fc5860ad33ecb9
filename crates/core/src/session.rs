use crate::error::SessionError;
use crate::models::ChatTurn;
use crate::orchestrator::{QueryOptions, QueryPipeline};
use tracing::warn;

pub const MODEL_OPTIONS: [&str; 3] = [
    "gemini-2.5-flash",
    "gemini-2.5-flash-pro",
    "gemini-2.5-flash-lite",
];

pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 10;

pub const SOURCE_PREVIEW_COUNT: usize = 3;
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Model and k belong to the session and never reach the shared config.
#[derive(Debug, Clone)]
pub struct ChatSession {
    transcript: Vec<ChatTurn>,
    model: String,
    k: usize,
}

impl ChatSession {
    pub fn new(model: impl Into<String>, k: usize) -> Self {
        Self {
            transcript: Vec::new(),
            model: model.into(),
            k: k.clamp(MIN_TOP_K, MAX_TOP_K),
        }
    }

    pub fn for_pipeline(pipeline: &QueryPipeline) -> Self {
        Self::new(
            pipeline.generator().default_model(),
            pipeline.retriever().default_k(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), SessionError> {
        let model = model.trim();
        if !MODEL_OPTIONS.contains(&model) {
            return Err(SessionError::UnknownModel(
                model.to_string(),
                MODEL_OPTIONS.join(", "),
            ));
        }
        self.model = model.to_string();
        Ok(())
    }

    pub fn set_k(&mut self, k: usize) -> Result<(), SessionError> {
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&k) {
            return Err(SessionError::TopKOutOfRange {
                value: k,
                min: MIN_TOP_K,
                max: MAX_TOP_K,
            });
        }
        self.k = k;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Failures become an assistant turn starting with `error:`.
    pub async fn ask(&mut self, pipeline: &QueryPipeline, input: &str) -> &ChatTurn {
        self.transcript.push(ChatTurn::user(input));

        let options = QueryOptions {
            k: Some(self.k),
            model: Some(self.model.clone()),
        };
        let reply = match pipeline.answer(input, &options).await {
            Ok(answer) => ChatTurn::assistant(
                answer.text.clone(),
                Some(answer.source_previews(SOURCE_PREVIEW_COUNT, SOURCE_PREVIEW_CHARS)),
            ),
            Err(error) => {
                warn!(%error, "chat query failed");
                ChatTurn::assistant(format!("error: {error}"), None)
            }
        };

        self.transcript.push(reply);
        &self.transcript[self.transcript.len() - 1]
    }
}
