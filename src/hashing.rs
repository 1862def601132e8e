//! Hash provider for file contents and manifest bytes.
//!
//! Algorithms are referred to by a short string identifier, which is what
//! gets persisted in manifests. Digests are lowercase hex.

use crate::dir_list::mtime_nanos;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during hashing: {0}")]
    ConcurrentModification(PathBuf),
    #[error("Unsupported hash algorithm: {0:?}")]
    UnsupportedAlgorithm(String),
}

/// Digest of a file together with the metadata observed while hashing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub digest: String,
    /// Modification time checked after reading, in nanoseconds since the epoch.
    pub mtime_nanos: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
        HashAlgorithm::Blake3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Looks up an algorithm by its persisted identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.as_str() == id)
    }

    #[cfg(test)]
    pub fn is_supported(id: &str) -> bool {
        Self::from_id(id).is_some()
    }

    /// Hex digest of an in-memory buffer.
    pub fn digest(self, data: &[u8]) -> String {
        let mut hasher = Hasher::new(self);
        hasher.update(data);
        hasher.finalize_hex()
    }

    /// Computes the digest of a file with concurrent modification detection.
    ///
    /// # Behavior
    /// - Records the file's modification time before reading
    /// - Streams the file through the hasher in chunks
    /// - Verifies the modification time hasn't changed after reading
    ///
    /// # Errors
    /// - `HashError::Io`: File doesn't exist or other I/O errors
    /// - `HashError::PermissionDenied`: Insufficient permissions to read the file
    /// - `HashError::ConcurrentModification`: The file was detected as being
    ///   modified while hashing. Absence of this error is *not* a guarantee
    ///   that the file was not modified.
    pub fn digest_file(self, path: &Path) -> Result<FileDigest, HashError> {
        let metadata_before = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
        let mtime_before = metadata_before.modified().map_err(HashError::Io)?;

        let mut file = File::open(path).map_err(|e| io_error(path, e))?;
        let mut hasher = Hasher::new(self);
        let mut buffer = [0u8; 64 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer).map_err(HashError::Io)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        let metadata_after = std::fs::metadata(path).map_err(HashError::Io)?;
        let mtime_after = metadata_after.modified().map_err(HashError::Io)?;

        if mtime_before != mtime_after {
            return Err(HashError::ConcurrentModification(path.to_path_buf()));
        }

        let digest = hasher.finalize_hex();
        debug!("{} digest of {} is {}", self, path.display(), digest);

        Ok(FileDigest {
            digest,
            mtime_nanos: mtime_nanos(&metadata_after).map_err(HashError::Io)?,
            size: metadata_after.len(),
        })
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| HashError::UnsupportedAlgorithm(s.to_string()))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> HashError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        HashError::PermissionDenied(path.to_path_buf())
    } else {
        HashError::Io(e)
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}
