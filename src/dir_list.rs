//! Non-recursive directory listing.
//!
//! Lists the immediate children of one directory together with the metadata
//! needed for classification. Metadata failures are kept per entry so one
//! unreadable entry does not hide its siblings; only failing to enumerate the
//! directory itself is an error.

use crate::entry::SpecialKind;
use crate::manifest::{MANIFEST_FILENAME, normalize_name};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Special(SpecialKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub size: u64,
    pub mtime_nanos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    /// NFC normalized, lossily converted if the OS name is not UTF-8.
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub stat: Result<EntryStat, String>,
}

#[derive(Debug, Default)]
pub struct DirListing {
    pub entries: Vec<FsEntry>,
    pub has_manifest: bool,
}

pub fn list_directory(dir: &Path) -> Result<DirListing, DirListError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| list_error(dir, e))?;

    let mut listing = DirListing::default();

    for entry in read_dir {
        let entry = entry.map_err(|e| list_error(dir, e))?;
        let os_name = entry.file_name();

        if os_name == MANIFEST_FILENAME {
            listing.has_manifest = true;
            continue;
        }

        let path = entry.path();
        let name = normalize_name(&os_name.to_string_lossy());

        // file_type() does not follow symlinks. If even that fails, the entry
        // is treated as a file whose metadata could not be read.
        let kind = match entry.file_type() {
            Ok(ft) if ft.is_dir() => EntryKind::Dir,
            Ok(ft) if ft.is_file() => EntryKind::File,
            Ok(ft) => EntryKind::Special(SpecialKind::from_file_type(&ft)),
            Err(e) => {
                listing.entries.push(FsEntry {
                    name,
                    path,
                    kind: EntryKind::File,
                    stat: Err(format!("file type: {e}")),
                });
                continue;
            }
        };

        let stat = std::fs::symlink_metadata(&path)
            .and_then(|m| {
                Ok(EntryStat {
                    size: m.len(),
                    mtime_nanos: mtime_nanos(&m)?,
                })
            })
            .map_err(|e| format!("stat: {e}"));

        listing.entries.push(FsEntry {
            name,
            path,
            kind,
            stat,
        });
    }

    listing.entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(listing)
}

/// Modification time in nanoseconds since the Unix epoch. Times before the
/// epoch are clamped to zero.
pub fn mtime_nanos(metadata: &Metadata) -> std::io::Result<u64> {
    let modified = metadata.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0))
}

fn list_error(dir: &Path, e: std::io::Error) -> DirListError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(dir.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}
