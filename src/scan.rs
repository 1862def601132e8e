//! Tree scanner and the `Scan` session shared by all phases.
//!
//! A scan walks the tree depth first, loads each directory's manifest and
//! reconciles it against the live directory listing. The resulting tree is
//! owned by the session and mutated in place by the digest, aggregate and
//! write phases, which run strictly one after another.

use crate::change::Change;
use crate::dir_list::{DirListError, DirListing, EntryKind, FsEntry, list_directory};
use crate::entry::{DirEntry, FileEntry, SpecialEntry};
use crate::hashing::HashAlgorithm;
use crate::manifest::{MANIFEST_FILENAME, Manifest, ManifestError};
use crate::stats::Stats;
use crate::visit::{self, Visitor};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to list {}: {source}", path.display())]
    List {
        path: PathBuf,
        #[source]
        source: DirListError,
    },
    #[error("Failed to load manifest in {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error("Cannot verify manifest in {}: unsupported algorithm {algorithm:?}", path.display())]
    UnsupportedAlgorithm { path: PathBuf, algorithm: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    /// Used for new files, and for every file when rebuilding.
    pub default_hash: HashAlgorithm,
    /// Re-hash and rewrite everything regardless of detected changes.
    pub rebuild: bool,
    /// Hash unchanged files too.
    pub digest_all: bool,
    /// Signal a progress consumer whenever a counter moves.
    pub live_updates: bool,
}

pub struct Scan {
    pub(crate) config: ScanConfig,
    pub(crate) root_dir: PathBuf,
    pub(crate) root: Manifest,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) updated_by: String,
    pub(crate) stats: Arc<Stats>,
    progress: Option<Receiver<()>>,
    pub(crate) write_errors: Vec<String>,
}

impl Scan {
    pub fn new(root_dir: impl Into<PathBuf>, mut config: ScanConfig) -> Self {
        if config.rebuild {
            config.digest_all = true;
        }

        let (stats, progress) = if config.live_updates {
            let (stats, rx) = Stats::with_live_updates();
            (stats, Some(rx))
        } else {
            (Stats::new(), None)
        };

        let updated_by = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Scan {
            config,
            root_dir: root_dir.into(),
            root: Manifest::new(),
            updated_at: Utc::now().trunc_subsecs(0),
            updated_by,
            stats: Arc::new(stats),
            progress,
            write_errors: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &Manifest {
        &self.root
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// The receiving end of the live progress signal, if enabled. Can only be
    /// taken once.
    pub fn take_progress_signal(&mut self) -> Option<Receiver<()>> {
        self.progress.take()
    }

    pub fn write_errors(&self) -> &[String] {
        &self.write_errors
    }

    /// Walk the tree and classify every entry against its manifest.
    ///
    /// Only failures at the root are returned. Anything below the root is
    /// recorded on the entry that failed and the walk continues.
    pub fn scan(&mut self) -> Result<(), ScanError> {
        self.stats.incr(&self.stats.found_dirs);
        self.root = self.scan_dir(&self.root_dir, None)?;
        Ok(())
    }

    pub fn iterate(&self, visitor: &mut impl Visitor) {
        visit::iterate(&self.root, visitor);
    }

    fn scan_dir(&self, dir: &Path, parent: Option<&mut DirEntry>) -> Result<Manifest, ScanError> {
        debug!("Scanning {}", dir.display());

        let listing = list_directory(dir).map_err(|source| ScanError::List {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut manifest = self.load_manifest(dir, &listing, parent)?;

        self.reconcile(dir, &mut manifest, listing.entries);

        for child in &mut manifest.dirs {
            if matches!(child.change, Change::Removed | Change::Failed) {
                continue;
            }
            let path = child.path.clone();
            match self.scan_dir(&path, Some(&mut *child)) {
                Ok(child_manifest) => child.manifest = Some(Box::new(child_manifest)),
                Err(e) => {
                    warn!("{e}");
                    child.fail(e.to_string());
                    self.stats.incr(&self.stats.scan_errors);
                }
            }
        }

        Ok(manifest)
    }

    /// Load the manifest of `dir` and check it against the digest the parent
    /// recorded for it.
    fn load_manifest(
        &self,
        dir: &Path,
        listing: &DirListing,
        parent: Option<&mut DirEntry>,
    ) -> Result<Manifest, ScanError> {
        let manifest_error = |source| ScanError::Manifest {
            path: dir.to_path_buf(),
            source,
        };

        let bytes = if listing.has_manifest {
            let bytes = Manifest::read(dir).map_err(manifest_error)?;
            self.stats.incr(&self.stats.found_manifests);
            Some(bytes)
        } else {
            None
        };

        let mut manifest = match &bytes {
            Some(bytes) => {
                let mut manifest = Manifest::decode(bytes).map_err(manifest_error)?;
                manifest.on_disk = true;
                manifest
            }
            None => Manifest::new(),
        };

        if let Some(parent) = parent {
            self.verify_manifest(dir, bytes.as_deref(), parent)?;
        }

        for file in &mut manifest.files {
            file.path = dir.join(&file.name);
            file.change = Change::Removed;
        }
        for child in &mut manifest.dirs {
            child.path = dir.join(&child.name);
            child.change = Change::Removed;
        }
        for special in &mut manifest.specials {
            special.path = dir.join(&special.name);
            special.change = Change::Removed;
        }

        Ok(manifest)
    }

    fn verify_manifest(
        &self,
        dir: &Path,
        bytes: Option<&[u8]>,
        parent: &mut DirEntry,
    ) -> Result<(), ScanError> {
        // No recorded digest: either a new directory or a child whose last
        // write failed. The latter is rewritten to rejoin the chain.
        if parent.digest.is_empty() {
            if parent.change != Change::Added {
                debug!("{}: no recorded manifest digest", dir.display());
                parent.needs_write = true;
            }
            return Ok(());
        }

        let algorithm =
            HashAlgorithm::from_id(&parent.algorithm).ok_or_else(|| {
                ScanError::UnsupportedAlgorithm {
                    path: dir.to_path_buf(),
                    algorithm: parent.algorithm.clone(),
                }
            })?;

        let message = match bytes {
            Some(bytes) if algorithm.digest(bytes) == parent.digest => {
                parent.verified = true;
                return Ok(());
            }
            Some(_) => format!(
                "{}: integrity violation: manifest digest does not match parent",
                dir.join(MANIFEST_FILENAME).display()
            ),
            None => format!(
                "{}: integrity violation: manifest missing",
                dir.join(MANIFEST_FILENAME).display()
            ),
        };

        warn!("{message}");
        parent.integrity_violation(message);
        self.stats.incr(&self.stats.scan_errors);
        Ok(())
    }

    /// Match live entries against recorded ones by name, per kind. Entries
    /// must already be marked `Removed` so that anything not seen keeps that
    /// classification.
    fn reconcile(&self, dir: &Path, manifest: &mut Manifest, live: Vec<FsEntry>) {
        let mut files = index_by_name(manifest.files.iter().map(|f| f.name.as_str()));
        let mut dirs = index_by_name(manifest.dirs.iter().map(|d| d.name.as_str()));
        let mut specials = index_by_name(manifest.specials.iter().map(|s| s.name.as_str()));

        for entry in live {
            match entry.kind {
                EntryKind::File => {
                    self.stats.incr(&self.stats.found_files);
                    match files.get(&entry.name).copied() {
                        Some(Slot::Visited(first)) => {
                            let message = collision_message(&manifest.files[first].path, &entry);
                            self.entry_error(&message);
                            manifest.files[first].fail(message);
                        }
                        Some(Slot::Recorded(i)) => {
                            let file = &mut manifest.files[i];
                            file.path = entry.path;
                            match entry.stat {
                                Ok(stat) => file.stage(stat.size, stat.mtime_nanos),
                                Err(e) => {
                                    let message = format!("{}: {e}", file.path.display());
                                    self.entry_error(&message);
                                    file.fail(message);
                                }
                            }
                            files.insert(entry.name, Slot::Visited(i));
                        }
                        None => {
                            let file = match entry.stat {
                                Ok(stat) => FileEntry::added(
                                    entry.name.clone(),
                                    entry.path,
                                    stat.size,
                                    stat.mtime_nanos,
                                ),
                                Err(e) => {
                                    let message = format!("{}: {e}", entry.path.display());
                                    self.entry_error(&message);
                                    FileEntry::failed(entry.name.clone(), entry.path, message)
                                }
                            };
                            files.insert(entry.name, Slot::Visited(manifest.files.len()));
                            manifest.files.push(file);
                        }
                    }
                }
                EntryKind::Dir => {
                    self.stats.incr(&self.stats.found_dirs);
                    match dirs.get(&entry.name).copied() {
                        Some(Slot::Visited(first)) => {
                            let message = collision_message(&manifest.dirs[first].path, &entry);
                            self.entry_error(&message);
                            manifest.dirs[first].fail(message);
                        }
                        Some(Slot::Recorded(i)) => {
                            let child = &mut manifest.dirs[i];
                            child.path = entry.path;
                            match entry.stat {
                                Ok(_) => child.change = Change::NoChange,
                                Err(e) => {
                                    let message = format!("{}: {e}", child.path.display());
                                    self.entry_error(&message);
                                    child.fail(message);
                                }
                            }
                            dirs.insert(entry.name, Slot::Visited(i));
                        }
                        None => {
                            let mut child = DirEntry::added(entry.name.clone(), entry.path);
                            if let Err(e) = entry.stat {
                                let message = format!("{}: {e}", child.path.display());
                                self.entry_error(&message);
                                child.fail(message);
                            }
                            dirs.insert(entry.name, Slot::Visited(manifest.dirs.len()));
                            manifest.dirs.push(child);
                        }
                    }
                }
                EntryKind::Special(kind) => {
                    self.stats.incr(&self.stats.found_special);
                    match specials.get(&entry.name).copied() {
                        Some(Slot::Visited(first)) => {
                            let message =
                                collision_message(&manifest.specials[first].path, &entry);
                            self.entry_error(&message);
                            manifest.specials[first].fail(message);
                        }
                        Some(Slot::Recorded(i)) => {
                            let special = &mut manifest.specials[i];
                            special.path = entry.path;
                            match entry.stat {
                                Ok(stat) => special.stage(kind, stat.mtime_nanos),
                                Err(e) => {
                                    let message = format!("{}: {e}", special.path.display());
                                    self.entry_error(&message);
                                    special.fail(message);
                                }
                            }
                            specials.insert(entry.name, Slot::Visited(i));
                        }
                        None => {
                            let special = match entry.stat {
                                Ok(stat) => SpecialEntry::added(
                                    entry.name.clone(),
                                    entry.path,
                                    kind,
                                    stat.mtime_nanos,
                                ),
                                Err(e) => {
                                    let message = format!("{}: {e}", entry.path.display());
                                    self.entry_error(&message);
                                    SpecialEntry::failed(entry.name.clone(), entry.path, message)
                                }
                            };
                            specials.insert(entry.name, Slot::Visited(manifest.specials.len()));
                            manifest.specials.push(special);
                        }
                    }
                }
            }
        }

        debug!(
            "Reconciled {}: {} files, {} dirs, {} special",
            dir.display(),
            manifest.files.len(),
            manifest.dirs.len(),
            manifest.specials.len()
        );
    }

    fn entry_error(&self, message: &str) {
        warn!("{message}");
        self.stats.incr(&self.stats.scan_errors);
    }
}

/// Position of a recorded entry, and whether this pass has matched it yet.
#[derive(Clone, Copy)]
enum Slot {
    Recorded(usize),
    Visited(usize),
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, Slot> {
    names
        .enumerate()
        .map(|(i, name)| (name.to_string(), Slot::Recorded(i)))
        .collect()
}

/// Two distinct names on disk that normalize to the same entry name.
fn collision_message(first: &Path, entry: &FsEntry) -> String {
    format!(
        "{}: name collides with {} after normalization",
        first.display(),
        entry.path.display()
    )
}

#[cfg(test)]
mod tests;
