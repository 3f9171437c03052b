//! Content hashing and cheap filesystem probes.

use crate::error::{IngestError, IngestResult};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sluice_core::FileFacts;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const READ_BUFFER: usize = 64 * 1024;

/// SHA-256 of a file's bytes as lowercase hex, read in fixed-size blocks.
pub fn hash_file(path: &Path) -> IngestResult<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IngestError::FileNotFound(path.to_path_buf()),
        _ => IngestError::Io(e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Size and modification time of a file.
pub fn file_facts(path: &Path) -> IngestResult<FileFacts> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IngestError::FileNotFound(path.to_path_buf()),
        _ => IngestError::Io(e),
    })?;

    Ok(FileFacts {
        size: metadata.len(),
        modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}
