use crate::error::IndexError;
use crate::models::Chunk;
use crate::store::{IndexEntry, IndexManifest, VectorIndex, INDEX_FORMAT_VERSION};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

#[derive(Serialize)]
struct RecordRef<'a> {
    id: u64,
    chunk: &'a Chunk,
    vector: String,
}

#[derive(Deserialize)]
struct Record {
    id: u64,
    chunk: Chunk,
    vector: String,
}

/// Writes `index` to a staging directory beside `path`, then swaps it in:
/// the old index is renamed to a backup, the staging directory is renamed to
/// `path`, and the backup is removed. Between the two renames `path` is
/// absent, so a concurrent reader can see `IndexNotFound`.
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<IndexManifest, IndexError> {
    let name = path.file_name().ok_or_else(|| {
        IndexError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("index path has no directory name: {}", path.display()),
        ))
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tag = Uuid::new_v4();
    let staging = parent.join(format!(".{}.staging-{tag}", name.to_string_lossy()));
    fs::create_dir(&staging)?;

    let manifest = match write_index_files(index, &staging) {
        Ok(manifest) => manifest,
        Err(error) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(error);
        }
    };

    swap_into_place(&staging, path, &parent.join(format!(".{}.old-{tag}", name.to_string_lossy())))?;

    info!(
        path = %path.display(),
        chunks = manifest.chunk_count,
        dimensions = manifest.dimensions,
        model = %manifest.embedding_model,
        build_id = %manifest.build_id,
        "saved vector index"
    );

    Ok(manifest)
}

fn write_index_files(index: &VectorIndex, dir: &Path) -> Result<IndexManifest, IndexError> {
    let mut payload = Vec::new();
    for (id, entry) in index.entries().iter().enumerate() {
        let record = RecordRef {
            id: id as u64,
            chunk: &entry.chunk,
            vector: encode_vector(&entry.vector),
        };
        serde_json::to_writer(&mut payload, &record)?;
        payload.push(b'\n');
    }

    let mut manifest = index.manifest().clone();
    manifest.chunk_count = index.len();
    manifest.payload_sha256 = sha256_hex(&payload);

    fs::write(dir.join(CHUNKS_FILE), &payload)?;
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;
    Ok(manifest)
}

fn swap_into_place(staging: &Path, target: &Path, backup: &PathBuf) -> Result<(), IndexError> {
    let had_previous = match fs::symlink_metadata(target) {
        Ok(_) => {
            fs::rename(target, backup)?;
            true
        }
        Err(error) if error.kind() == ErrorKind::NotFound => false,
        Err(error) => return Err(error.into()),
    };

    if let Err(error) = fs::rename(staging, target) {
        if had_previous {
            let _ = fs::rename(backup, target);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(error.into());
    }

    if had_previous {
        let removed = if backup.is_dir() {
            fs::remove_dir_all(backup)
        } else {
            fs::remove_file(backup)
        };
        if let Err(error) = removed {
            warn!(path = %backup.display(), %error, "could not remove previous index");
        }
    }

    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<IndexManifest, IndexError> {
    if !path.is_dir() {
        return Err(IndexError::IndexNotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = match fs::read(path.join(MANIFEST_FILE)) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(IndexError::IndexNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(error) => return Err(load_error(path, format!("reading manifest: {error}"))),
    };

    let manifest: IndexManifest = serde_json::from_slice(&raw)
        .map_err(|error| load_error(path, format!("parsing manifest: {error}")))?;

    if manifest.format_version != INDEX_FORMAT_VERSION {
        return Err(load_error(
            path,
            format!(
                "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
                manifest.format_version
            ),
        ));
    }

    Ok(manifest)
}

pub fn load_index(path: &Path) -> Result<VectorIndex, IndexError> {
    let manifest = read_manifest(path)?;
    load_payload(path, manifest)
}

pub fn load_index_for_model(path: &Path, model_id: &str) -> Result<VectorIndex, IndexError> {
    let manifest = read_manifest(path)?;
    if manifest.embedding_model != model_id {
        return Err(IndexError::EmbeddingModelMismatch {
            index_model: manifest.embedding_model,
            configured_model: model_id.to_string(),
        });
    }
    load_payload(path, manifest)
}

fn load_payload(path: &Path, manifest: IndexManifest) -> Result<VectorIndex, IndexError> {
    let payload = match fs::read(path.join(CHUNKS_FILE)) {
        Ok(payload) => payload,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(IndexError::IndexNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(error) => return Err(load_error(path, format!("reading payload: {error}"))),
    };

    let checksum = sha256_hex(&payload);
    if checksum != manifest.payload_sha256 {
        return Err(load_error(
            path,
            format!(
                "payload checksum {checksum} does not match manifest {}",
                manifest.payload_sha256
            ),
        ));
    }

    let text = std::str::from_utf8(&payload)
        .map_err(|error| load_error(path, format!("payload is not utf-8: {error}")))?;

    let mut entries = Vec::with_capacity(manifest.chunk_count);
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(line)
            .map_err(|error| load_error(path, format!("line {}: {error}", line_no + 1)))?;
        let vector = decode_vector(&record.vector)
            .map_err(|reason| load_error(path, format!("record {}: {reason}", record.id)))?;

        if vector.len() != manifest.dimensions {
            return Err(load_error(
                path,
                format!(
                    "record {} has dimension {} but the manifest says {}",
                    record.id,
                    vector.len(),
                    manifest.dimensions
                ),
            ));
        }

        entries.push(IndexEntry {
            chunk: record.chunk,
            vector,
        });
    }

    if entries.len() != manifest.chunk_count {
        return Err(load_error(
            path,
            format!(
                "manifest lists {} chunks but the payload holds {}",
                manifest.chunk_count,
                entries.len()
            ),
        ));
    }

    debug!(
        path = %path.display(),
        chunks = entries.len(),
        build_id = %manifest.build_id,
        "loaded vector index"
    );

    Ok(VectorIndex::from_manifest(manifest, entries))
}

fn encode_vector(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|value| value.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

fn decode_vector(encoded: &str) -> Result<Vec<f32>, String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|error| format!("invalid vector encoding: {error}"))?;
    if bytes.len() % 4 != 0 {
        return Err(format!("vector byte length {} is not a multiple of 4", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|quad| f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
        .collect())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn load_error(path: &Path, reason: String) -> IndexError {
    IndexError::IndexLoad {
        path: path.to_path_buf(),
        reason,
    }
}
