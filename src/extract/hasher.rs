//! Content fingerprinting

use crate::extract::ExtractionError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 fingerprint and byte length of a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFingerprint {
    /// Lowercase hex digest (64 characters)
    pub hash: String,
    pub size_bytes: u64,
}

/// Hashes a file in a single streaming pass
///
/// # Arguments
///
/// * `path` - The file to fingerprint
///
/// # Returns
///
/// * `Ok(ContentFingerprint)` - Digest and size of the file contents
/// * `Err(ExtractionError)` - The file could not be read
pub fn hash_file(path: &Path) -> Result<ContentFingerprint, ExtractionError> {
    let mut file = File::open(path).map_err(|e| ExtractionError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut size_bytes = 0u64;

    loop {
        let read = file.read(&mut buffer).map_err(|e| ExtractionError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size_bytes += read as u64;
    }

    Ok(ContentFingerprint {
        hash: hex::encode(hasher.finalize()),
        size_bytes,
    })
}

/// Fingerprint of an in-memory byte slice
pub fn hash_bytes(bytes: &[u8]) -> ContentFingerprint {
    ContentFingerprint {
        hash: hex::encode(Sha256::digest(bytes)),
        size_bytes: bytes.len() as u64,
    }
}
