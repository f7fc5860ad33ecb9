use crate::config::PipelineConfig;
use crate::error::GenerationError;
use crate::models::Chunk;
use crate::traits::{CompletionRequest, LanguageModel};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)\}";
const REQUIRED_PLACEHOLDERS: [&str; 2] = ["context", "question"];

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
    placeholder: Regex,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, GenerationError> {
        let text = text.into();
        let placeholder = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|error| GenerationError::Template(error.to_string()))?;

        let found: BTreeSet<&str> = placeholder
            .captures_iter(&text)
            .filter_map(|capture| capture.get(1).map(|name| name.as_str()))
            .collect();
        let required: BTreeSet<&str> = REQUIRED_PLACEHOLDERS.into_iter().collect();

        if found != required {
            return Err(GenerationError::Template(format!(
                "expected placeholders {{question}} and {{context}}, found {:?}",
                found
            )));
        }

        Ok(Self { text, placeholder })
    }

    /// Fills both placeholders in one pass; braces inside the values are left
    /// as they are.
    pub fn render(&self, question: &str, context: &str) -> String {
        self.placeholder
            .replace_all(&self.text, |capture: &Captures| match &capture[1] {
                "question" => question.to_string(),
                "context" => context.to_string(),
                _ => capture[0].to_string(),
            })
            .into_owned()
    }
}

pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
}

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    default_model: String,
    sampling: SamplingParams,
}

impl AnswerGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        template: PromptTemplate,
        default_model: impl Into<String>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            model,
            template,
            default_model: default_model.into(),
            sampling,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, GenerationError> {
        Ok(Self::new(
            model,
            PromptTemplate::new(config.prompt_template.clone())?,
            config.llm_model.clone(),
            SamplingParams {
                temperature: config.llm_temperature,
                top_p: config.llm_top_p,
            },
        ))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn prompt_for(&self, question: &str, chunks: &[Chunk]) -> String {
        self.template.render(question, &build_context(chunks))
    }

    pub async fn generate(
        &self,
        question: &str,
        chunks: &[Chunk],
        model_override: Option<&str>,
    ) -> Result<String, GenerationError> {
        let model = model_override.unwrap_or(&self.default_model);
        let request = CompletionRequest {
            model: model.to_string(),
            prompt: self.prompt_for(question, chunks),
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
        };

        info!(model = %model, context_chunks = chunks.len(), "generating answer");
        self.model.complete(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;
    use crate::models::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            Ok(format!("answer from {}", request.model))
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                chunk_id: text.to_string(),
                document_id: "d".to_string(),
                source_path: "/tmp/d.txt".to_string(),
                page: None,
                chunk_index: 0,
            },
        }
    }

    fn generator(model: Arc<RecordingModel>) -> AnswerGenerator {
        AnswerGenerator::new(
            model,
            PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).expect("default template is valid"),
            "gemini-2.5-flash",
            SamplingParams {
                temperature: 0.3,
                top_p: 0.85,
            },
        )
    }

    #[test]
    fn template_requires_both_placeholders() {
        assert!(PromptTemplate::new("Q: {question}").is_err());
        assert!(PromptTemplate::new("{question} {context} {extra}").is_err());
        assert!(PromptTemplate::new("{context}\n{question}\n{question}").is_ok());
    }

    #[test]
    fn render_is_single_pass() {
        let template = PromptTemplate::new("Q={question};C={context}").expect("valid template");
        let rendered = template.render("what is {context}?", "ctx");
        assert_eq!(rendered, "Q=what is {context}?;C=ctx");
    }

    #[test]
    fn context_joins_chunks_in_rank_order() {
        let context = build_context(&[chunk("second best"), chunk("best"), chunk("best")]);
        assert_eq!(context, "second best\n\nbest\n\nbest");
    }

    #[tokio::test]
    async fn empty_context_still_produces_an_answer() {
        let model = Arc::new(RecordingModel::default());
        let answer = generator(model.clone())
            .generate("What is ashwagandha?", &[], None)
            .await
            .expect("generation should succeed");
        assert!(!answer.is_empty());

        let requests = model.requests.lock().expect("lock");
        let prompt = &requests[0].prompt;
        assert!(prompt.contains("Question: What is ashwagandha?"));
        assert!(prompt.contains("try to think of it without context"));
        assert!(prompt.contains("Context: \n"));
    }

    #[tokio::test]
    async fn model_override_applies_to_one_call() {
        let model = Arc::new(RecordingModel::default());
        let generator = generator(model.clone());

        let first = generator
            .generate("q", &[chunk("c")], Some("gemini-2.5-flash-lite"))
            .await
            .expect("generation should succeed");
        let second = generator
            .generate("q", &[chunk("c")], None)
            .await
            .expect("generation should succeed");

        assert_eq!(first, "answer from gemini-2.5-flash-lite");
        assert_eq!(second, "answer from gemini-2.5-flash");
        let requests = model.requests.lock().expect("lock");
        assert_eq!(requests[0].temperature, 0.3);
        assert_eq!(requests[0].top_p, 0.85);
    }
}
