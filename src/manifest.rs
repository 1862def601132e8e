use crate::entry::{DirEntry, FileEntry, SpecialEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Name of the manifest file kept in every directory.
pub const MANIFEST_FILENAME: &str = ".dirsum.toml";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Manifest is not valid UTF-8")]
    NotUtf8,
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(i64),
    #[error("Invalid manifest file (version {0})")]
    InvalidVersion(i64),
    #[error("Duplicate entry in manifest: {0:?}")]
    DuplicateEntry(String),
}

/// Used to check the version before parsing the rest of the file, so that a
/// manifest from a future version is reported as such rather than as a parse
/// error. Deliberately tolerant of everything except `version`.
#[derive(Debug, Deserialize)]
struct VersionOnly {
    #[serde(default)]
    version: i64,
}

/// The recorded state of one directory's immediate children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<DirEntry>,
    #[serde(default, rename = "other", skip_serializing_if = "Vec::is_empty")]
    pub specials: Vec<SpecialEntry>,

    /// Whether this manifest was read from disk rather than created fresh.
    #[serde(skip)]
    pub(crate) on_disk: bool,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub const SUPPORTED_VERSION: i64 = 1;

    pub fn new() -> Self {
        Manifest {
            version: Self::SUPPORTED_VERSION,
            updated_at: None,
            updated_by: String::new(),
            files: Vec::new(),
            dirs: Vec::new(),
            specials: Vec::new(),
            on_disk: false,
        }
    }

    /// Parse a TOML string, validating the version and normalizing names.
    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        let header: VersionOnly = toml::from_str(content)?;

        if header.version > Self::SUPPORTED_VERSION {
            return Err(ManifestError::UnsupportedVersion(header.version));
        }
        if header.version <= 0 {
            return Err(ManifestError::InvalidVersion(header.version));
        }

        let mut manifest: Manifest = toml::from_str(content)?;
        manifest.normalize_names()?;
        Ok(manifest)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ManifestError> {
        let content = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        Self::from_toml(content)
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ManifestError> {
        self.to_toml().map(String::into_bytes)
    }

    /// Read the raw manifest bytes of `dir`.
    ///
    /// The bytes are returned undecoded because the parent needs to hash them.
    pub fn read(dir: &Path) -> Result<Vec<u8>, ManifestError> {
        let path = dir.join(MANIFEST_FILENAME);
        std::fs::read(&path).map_err(|e| io_error(&path, e))
    }

    /// Write already encoded manifest bytes into `dir` atomically.
    ///
    /// Writes to a temporary file, fsyncs it, then atomically renames it into place.
    pub fn save_bytes(dir: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
        use std::io::Write;

        let path = dir.join(MANIFEST_FILENAME);

        let mut temp_file =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        temp_file
            .write_all(bytes)
            .map_err(|e| io_error(&path, e))?;
        temp_file.as_file().sync_all().map_err(ManifestError::Io)?;
        temp_file
            .persist(&path)
            .map_err(|e| io_error(&path, e.error))?;

        Ok(())
    }

    /// Load and decode the manifest of `dir`.
    #[cfg(test)]
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let mut manifest = Self::decode(&Self::read(dir)?)?;
        manifest.on_disk = true;
        Ok(manifest)
    }

    #[cfg(test)]
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }

    #[cfg(test)]
    pub fn dir(&self, name: &str) -> Option<&DirEntry> {
        self.dirs.iter().find(|d| d.name == name)
    }

    #[cfg(test)]
    pub fn special(&self, name: &str) -> Option<&SpecialEntry> {
        self.specials.iter().find(|s| s.name == name)
    }

    fn normalize_names(&mut self) -> Result<(), ManifestError> {
        for file in &mut self.files {
            file.name = normalize_name(&file.name);
        }
        for dir in &mut self.dirs {
            dir.name = normalize_name(&dir.name);
        }
        for special in &mut self.specials {
            special.name = normalize_name(&special.name);
        }

        check_unique(self.files.iter().map(|f| f.name.as_str()))?;
        check_unique(self.dirs.iter().map(|d| d.name.as_str()))?;
        check_unique(self.specials.iter().map(|s| s.name.as_str()))
    }
}

/// Canonical (NFC) form of an entry name.
///
/// Filesystems disagree on how they hand out composed characters, so both
/// recorded and live names go through this before being compared.
pub fn normalize_name(name: &str) -> String {
    name.nfc().collect()
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ManifestError::DuplicateEntry(name.to_string()));
        }
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> ManifestError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ManifestError::PermissionDenied(path.to_path_buf())
    } else {
        ManifestError::Io(e)
    }
}
