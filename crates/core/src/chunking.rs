use crate::error::IngestError;
use crate::models::{Chunk, ChunkMetadata, Document};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::info;

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

/// Consecutive windows share whole trailing pieces totalling at most
/// `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let chunk_index = index as u64;
                Chunk {
                    metadata: ChunkMetadata {
                        chunk_id: make_chunk_id(&document.metadata.document_id, chunk_index, &text),
                        document_id: document.metadata.document_id.clone(),
                        source_path: document.metadata.source_path.clone(),
                        page: document.metadata.page,
                        chunk_index,
                    },
                    text,
                }
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[String] = &[];
        for (position, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !window.is_empty() {
                push_window(&mut merged, &window);
                while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_window(&mut merged, &window);
        merged
    }
}

pub fn chunk_documents(documents: &[Document], config: ChunkingConfig) -> Vec<Chunk> {
    let splitter = RecursiveSplitter::new(config);
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|document| splitter.chunk_document(document))
        .collect();

    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "split documents into chunks"
    );

    chunks
}

/// Separators stay attached to the start of the piece that follows them.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push(&text[start..position]);
        }
        start = position;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_window(target: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn make_chunk_id(document_id: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn document(id: &str, text: &str) -> Document {
        Document {
            text: text.to_string(),
            metadata: DocumentMetadata {
                document_id: id.to_string(),
                source_path: format!("/tmp/{id}.txt"),
                page: None,
            },
        }
    }

    fn splitter(size: usize, overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(ChunkingConfig::new(size, overlap).expect("valid config"))
    }

    /// Length of the longest prefix of `next` that `prev` ends with.
    fn shared_overlap(prev: &str, next: &str) -> usize {
        next.char_indices()
            .map(|(start, ch)| start + ch.len_utf8())
            .filter(|&end| prev.ends_with(&next[..end]))
            .last()
            .map(|end| next[..end].chars().count())
            .unwrap_or(0)
    }

    #[test]
    fn config_rejects_overlap_not_below_size() {
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let text = (0..80)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter(40, 15).split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            let shared = shared_overlap(&pair[0], &pair[1]);
            assert!(shared > 0, "no overlap between {:?} and {:?}", pair[0], pair[1]);
            assert!(shared <= 15);
        }
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let chunks = splitter(20, 5).split_text("para one short.\n\npara two short.");
        assert_eq!(chunks, vec!["para one short.", "para two short."]);
    }

    #[test]
    fn unbroken_tokens_fall_back_to_characters() {
        let token = "x".repeat(25);
        let chunks = splitter(10, 3).split_text(&token);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(30);
        let chunks = splitter(10, 2).split_text(&text);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
    }

    #[test]
    fn empty_documents_yield_no_chunks() {
        let config = ChunkingConfig::new(100, 10).expect("valid config");
        let chunks = chunk_documents(&[document("a", ""), document("b", "  \n\n ")], config);
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunks_keep_document_order_and_metadata() {
        let config = ChunkingConfig::new(20, 5).expect("valid config");
        let documents = vec![
            document("first", "alpha beta gamma delta epsilon zeta"),
            document("second", "one two"),
        ];
        let chunks = chunk_documents(&documents, config);

        let last = chunks.last().expect("chunks produced");
        assert_eq!(last.text, "one two");
        assert_eq!(last.metadata.document_id, "second");
        assert_eq!(last.metadata.chunk_index, 0);

        let first_doc: Vec<_> = chunks
            .iter()
            .filter(|chunk| chunk.metadata.document_id == "first")
            .collect();
        assert!(first_doc.len() > 1);
        for (expected, chunk) in first_doc.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, expected as u64);
            assert_eq!(chunk.metadata.source_path, "/tmp/first.txt");
        }
    }
}
