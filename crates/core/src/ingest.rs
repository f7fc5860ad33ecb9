use crate::error::IngestError;
use crate::extractor::{extract_documents, SourceFormat};
use crate::models::Document;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const MAX_FILE_SIZE: u64 = 1_000_000;

const PROGRESS_EVERY: usize = 100;

pub fn discover_source_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if SourceFormat::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { bytes: u64 },
    LoadFailed(String),
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub files_found: usize,
    pub files_processed: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Only a missing root is an error; bad files land in [`LoadReport::skipped`].
pub fn load_documents(folder: &Path) -> Result<LoadReport, IngestError> {
    if !folder.exists() {
        return Err(IngestError::DataPathNotFound(folder.to_path_buf()));
    }

    let files = discover_source_files(folder);
    let mut report = LoadReport {
        files_found: files.len(),
        ..LoadReport::default()
    };

    info!(
        folder = %folder.display(),
        files_found = report.files_found,
        max_file_size = MAX_FILE_SIZE,
        "discovered source files"
    );

    for path in files {
        let size = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                warn!(path = %path.display(), %error, "cannot stat file");
                report.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::LoadFailed(error.to_string()),
                });
                continue;
            }
        };

        if size > MAX_FILE_SIZE {
            warn!(path = %path.display(), bytes = size, "skipping file above size ceiling");
            report.skipped.push(SkippedFile {
                path,
                reason: SkipReason::TooLarge { bytes: size },
            });
            continue;
        }

        match extract_documents(&path) {
            Ok(documents) => {
                report.documents.extend(documents);
                report.files_processed += 1;
                if report.files_processed % PROGRESS_EVERY == 0 {
                    info!(
                        processed = report.files_processed,
                        total = report.files_found,
                        "loading progress"
                    );
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "error loading file");
                report.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::LoadFailed(error.to_string()),
                });
            }
        }
    }

    info!(
        documents = report.documents.len(),
        files_processed = report.files_processed,
        files_skipped = report.skipped.len(),
        "loaded documents"
    );

    Ok(report)
}
