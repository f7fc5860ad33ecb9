use crate::error::IngestError;
use crate::models::{Document, DocumentMetadata};
use crate::traits::PdfExtractor;
use lopdf::Document as PdfDocument;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl SourceFormat {
    pub const EXTENSIONS: [&'static str; 3] = ["pdf", "txt", "md"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if ext.eq_ignore_ascii_case("txt") {
            Some(Self::PlainText)
        } else if ext.eq_ignore_ascii_case("md") {
            Some(Self::Markdown)
        } else {
            None
        }
    }

    pub fn extract(self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let source_path = path.to_string_lossy().to_string();

        match self {
            Self::Pdf => {
                let pages = LopdfExtractor.extract_pages(path)?;
                Ok(pages
                    .into_iter()
                    .map(|page| Document {
                        metadata: DocumentMetadata {
                            document_id: document_id(&source_path, Some(page.number)),
                            source_path: source_path.clone(),
                            page: Some(page.number),
                        },
                        text: page.text,
                    })
                    .collect())
            }
            Self::PlainText | Self::Markdown => {
                let text = read_utf8(path)?;
                Ok(vec![Document {
                    metadata: DocumentMetadata {
                        document_id: document_id(&source_path, None),
                        source_path,
                        page: None,
                    },
                    text,
                }])
            }
        }
    }
}

pub fn extract_documents(path: &Path) -> Result<Vec<Document>, IngestError> {
    SourceFormat::from_path(path)
        .ok_or_else(|| IngestError::UnsupportedFormat(path.to_path_buf()))?
        .extract(path)
}

fn read_utf8(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|source| IngestError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn document_id(source_path: &str, page: Option<u32>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    if let Some(page) = page {
        hasher.update(page.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
