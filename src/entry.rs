//! Entries recorded in a manifest.
//!
//! Persisted fields hold the state from the last successful write. Staged
//! fields hold what the current run observed and are only copied over the
//! persisted ones when the manifest gets rewritten.

use crate::change::Change;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFile {
    pub size: u64,
    pub mtime_nanos: u64,
    pub algorithm: String,
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
    /// Modification time in nanoseconds since Unix epoch.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mtime_nanos: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    #[serde(skip)]
    pub staged: StagedFile,
    #[serde(skip)]
    pub change: Change,
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl FileEntry {
    pub fn added(name: String, path: PathBuf, size: u64, mtime_nanos: u64) -> Self {
        FileEntry {
            name,
            path,
            change: Change::Added,
            staged: StagedFile {
                size,
                mtime_nanos,
                ..StagedFile::default()
            },
            ..FileEntry::default()
        }
    }

    pub fn failed(name: String, path: PathBuf, message: String) -> Self {
        FileEntry {
            name,
            path,
            change: Change::Failed,
            errors: vec![message],
            ..FileEntry::default()
        }
    }

    /// Records freshly read metadata and classifies against the persisted state.
    pub fn stage(&mut self, size: u64, mtime_nanos: u64) {
        self.staged.size = size;
        self.staged.mtime_nanos = mtime_nanos;
        self.change = if self.size != size {
            Change::Changed
        } else if self.mtime_nanos != mtime_nanos {
            Change::TimestampChanged
        } else {
            Change::NoChange
        };
    }

    pub fn fail(&mut self, message: String) {
        self.change = Change::Failed;
        self.errors.push(message);
    }

    pub(crate) fn apply_staged(&mut self) {
        if self.change.applies_staged() {
            self.size = self.staged.size;
            self.mtime_nanos = self.staged.mtime_nanos;
            self.algorithm = self.staged.algorithm.clone();
            self.digest = self.staged.digest.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirEntry {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Algorithm and digest of the child directory's serialized manifest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    /// The child manifest on disk hashed to the persisted digest.
    #[serde(skip)]
    pub verified: bool,
    #[serde(skip)]
    pub change: Change,
    #[serde(skip)]
    pub errors: Vec<String>,
    #[serde(skip)]
    pub manifest: Option<Box<Manifest>>,
    #[serde(skip)]
    pub(crate) needs_write: bool,
}

impl DirEntry {
    /// A directory not yet recorded. Its manifest is always written.
    pub fn added(name: String, path: PathBuf) -> Self {
        DirEntry {
            name,
            path,
            change: Change::Added,
            needs_write: true,
            ..DirEntry::default()
        }
    }

    pub fn fail(&mut self, message: String) {
        self.change = Change::Failed;
        self.errors.push(message);
    }

    /// Flags the child manifest as untrustworthy so it gets rewritten.
    pub(crate) fn integrity_violation(&mut self, message: String) {
        self.errors.push(message);
        self.needs_write = true;
    }

    #[cfg(test)]
    pub fn needs_write(&self) -> bool {
        self.needs_write
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialKind {
    Symlink,
    Pipe,
    Socket,
    Device,
    CharDevice,
    #[default]
    Other,
}

impl SpecialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialKind::Symlink => "symlink",
            SpecialKind::Pipe => "pipe",
            SpecialKind::Socket => "socket",
            SpecialKind::Device => "device",
            SpecialKind::CharDevice => "chardevice",
            SpecialKind::Other => "other",
        }
    }

    /// Derives the type tag from the mode bits of anything that is neither a
    /// regular file nor a directory.
    pub fn from_file_type(file_type: &std::fs::FileType) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;

            if file_type.is_symlink() {
                SpecialKind::Symlink
            } else if file_type.is_fifo() {
                SpecialKind::Pipe
            } else if file_type.is_socket() {
                SpecialKind::Socket
            } else if file_type.is_block_device() {
                SpecialKind::Device
            } else if file_type.is_char_device() {
                SpecialKind::CharDevice
            } else {
                SpecialKind::Other
            }
        }
        #[cfg(not(unix))]
        {
            if file_type.is_symlink() {
                SpecialKind::Symlink
            } else {
                SpecialKind::Other
            }
        }
    }
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedSpecial {
    pub kind: SpecialKind,
    pub mtime_nanos: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialEntry {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: SpecialKind,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mtime_nanos: u64,

    #[serde(skip)]
    pub staged: StagedSpecial,
    #[serde(skip)]
    pub change: Change,
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl SpecialEntry {
    pub fn added(name: String, path: PathBuf, kind: SpecialKind, mtime_nanos: u64) -> Self {
        SpecialEntry {
            name,
            path,
            change: Change::Added,
            staged: StagedSpecial { kind, mtime_nanos },
            ..SpecialEntry::default()
        }
    }

    pub fn failed(name: String, path: PathBuf, message: String) -> Self {
        SpecialEntry {
            name,
            path,
            change: Change::Failed,
            errors: vec![message],
            ..SpecialEntry::default()
        }
    }

    pub fn stage(&mut self, kind: SpecialKind, mtime_nanos: u64) {
        self.staged = StagedSpecial { kind, mtime_nanos };
        self.change = if self.kind != kind {
            Change::Changed
        } else if self.mtime_nanos != mtime_nanos {
            Change::TimestampChanged
        } else {
            Change::NoChange
        };
    }

    pub fn fail(&mut self, message: String) {
        self.change = Change::Failed;
        self.errors.push(message);
    }

    pub(crate) fn apply_staged(&mut self) {
        if self.change.applies_staged() {
            self.kind = self.staged.kind;
            self.mtime_nanos = self.staged.mtime_nanos;
        }
    }
}
