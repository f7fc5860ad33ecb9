use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub source_path: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub document_id: String,
    pub source_path: String,
    pub page: Option<u32>,
    pub chunk_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a similarity search. Smaller distance means closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

impl Answer {
    pub fn source_previews(&self, limit: usize, max_chars: usize) -> Vec<String> {
        self.sources
            .iter()
            .take(limit)
            .map(|scored| preview(&scored.chunk.text, max_chars))
            .collect()
    }
}

pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub sources: Option<Vec<String>>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<String>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                metadata: ChunkMetadata {
                    chunk_id: "c".to_string(),
                    document_id: "d".to_string(),
                    source_path: "/tmp/a.txt".to_string(),
                    page: None,
                    chunk_index: 0,
                },
            },
            distance: 0.0,
        }
    }

    #[test]
    fn previews_are_truncated_on_char_boundaries() {
        let answer = Answer {
            text: "ok".to_string(),
            sources: vec![scored("ééééé"), scored("short"), scored("x"), scored("dropped")],
        };

        let previews = answer.source_previews(3, 3);
        assert_eq!(previews, vec!["ééé...", "sho...", "x"]);
    }

    #[test]
    fn chat_turn_omits_absent_sources() {
        let turn = ChatTurn::user("hello");
        let json = serde_json::to_value(&turn).expect("turn serializes");
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }
}
