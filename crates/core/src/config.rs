use crate::error::ConfigError;
use crate::generation::PromptTemplate;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are an assistant for question-answering tasks with advanced analytical and reasoning capabilities.
Use the following context to answer the question.
If you don't know the answer, try to think of it without context.

Question: {question}

Context: {context}

Answer:";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub api_key: String,
    pub embedding_model: String,
    pub embedding_endpoint: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_top_p: f32,
    pub llm_base_url: String,
    pub request_timeout: Duration,
    pub data_path: PathBuf,
    pub vector_db_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub prompt_template: String,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = get("GOOGLE_API_KEY").ok_or(ConfigError::MissingSecret("GOOGLE_API_KEY"))?;

        let base_dir = get("RAG_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let llm_temperature: f32 = parse_or(&get, "LLM_TEMPERATURE", 0.3)?;
        if !(0.0..=2.0).contains(&llm_temperature) {
            return Err(invalid("LLM_TEMPERATURE", llm_temperature, "must be within [0, 2]"));
        }

        let llm_top_p: f32 = parse_or(&get, "LLM_TOP_P", 0.85)?;
        if !(llm_top_p > 0.0 && llm_top_p <= 1.0) {
            return Err(invalid("LLM_TOP_P", llm_top_p, "must be within (0, 1]"));
        }

        let timeout_secs: u64 = parse_or(&get, "LLM_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            return Err(invalid("LLM_TIMEOUT_SECS", timeout_secs, "must be positive"));
        }

        let chunk_size: usize = parse_or(&get, "CHUNK_SIZE", 1000)?;
        if chunk_size == 0 {
            return Err(invalid("CHUNK_SIZE", chunk_size, "must be positive"));
        }

        let chunk_overlap: usize = parse_or(&get, "CHUNK_OVERLAP", 200)?;
        if chunk_overlap >= chunk_size {
            return Err(invalid(
                "CHUNK_OVERLAP",
                chunk_overlap,
                &format!("must be smaller than CHUNK_SIZE ({chunk_size})"),
            ));
        }

        let retrieval_k: usize = parse_or(&get, "RETRIEVAL_K", 5)?;
        if retrieval_k == 0 {
            return Err(invalid("RETRIEVAL_K", retrieval_k, "must be positive"));
        }

        let prompt_template = lookup("LLM_PROMPT_TEMPLATE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());
        if let Err(error) = PromptTemplate::new(prompt_template.as_str()) {
            return Err(invalid("LLM_PROMPT_TEMPLATE", &prompt_template, &error.to_string()));
        }

        Ok(Self {
            api_key,
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_endpoint: get("EMBEDDING_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_ENDPOINT.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_temperature,
            llm_top_p,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            data_path: get("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| base_dir.join("data")),
            vector_db_path: get("VECTOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| base_dir.join("vector_db")),
            chunk_size,
            chunk_overlap,
            retrieval_k,
            prompt_template,
        })
    }

    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|error| ConfigError::InvalidValue {
            key,
            value: raw,
            reason: error.to_string(),
        }),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
