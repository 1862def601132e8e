//! Bottom-up manifest write-back.
//!
//! The first pass decides which manifests must be rewritten, drops entries
//! that are gone or failed and moves staged values into the persisted fields.
//! The second pass writes the flagged manifests children first, so each
//! parent can record the digest of the bytes its child actually wrote.

use crate::hashing::HashAlgorithm;
use crate::manifest::{MANIFEST_FILENAME, Manifest};
use crate::scan::{Scan, ScanConfig};
use crate::stats::Stats;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Algorithm and digest of a written manifest, as stored in the parent's
/// directory entry. Both are empty if the write failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDigest {
    pub algorithm: String,
    pub digest: String,
}

impl Scan {
    /// Write every manifest that needs it and return the root's digest, or
    /// `None` if the root manifest did not need rewriting.
    ///
    /// Failures are collected in [`Scan::write_errors`]; the rest of the
    /// tree is still written.
    pub fn write(&mut self) -> Option<ManifestDigest> {
        let mut writer = Writer {
            config: &self.config,
            stats: &self.stats,
            updated_at: self.updated_at,
            updated_by: &self.updated_by,
            errors: &mut self.write_errors,
        };

        // The root always takes one slot, before it is known whether it
        // needs writing.
        self.stats.write_todo.store(1, Ordering::Relaxed);
        self.stats.write_done.store(0, Ordering::Relaxed);

        let needs_write = writer.prepare_for_writing(&mut self.root);

        if needs_write || self.config.rebuild || !self.root.on_disk {
            Some(writer.write_manifest(&self.root_dir, &mut self.root))
        } else {
            None
        }
    }
}

struct Writer<'a> {
    config: &'a ScanConfig,
    stats: &'a Stats,
    updated_at: DateTime<Utc>,
    updated_by: &'a str,
    errors: &'a mut Vec<String>,
}

impl Writer<'_> {
    /// First pass. Returns whether this directory's manifest must be
    /// rewritten.
    fn prepare_for_writing(&self, manifest: &mut Manifest) -> bool {
        let mut needs_write = false;

        for dir in &mut manifest.dirs {
            if !dir.change.is_persisted() {
                dir.needs_write = false;
                continue;
            }
            if let Some(child) = dir.manifest.as_deref_mut()
                && (self.prepare_for_writing(child) || self.config.rebuild)
            {
                dir.needs_write = true;
            }
            if dir.needs_write {
                self.stats.incr(&self.stats.write_todo);
                needs_write = true;
            }
        }

        manifest.updated_at = Some(self.updated_at);
        manifest.updated_by = self.updated_by.to_string();

        needs_write |= manifest.files.iter().any(|f| f.change.requires_write())
            || manifest.dirs.iter().any(|d| d.change.requires_write())
            || manifest.specials.iter().any(|s| s.change.requires_write());

        manifest.files.retain(|f| f.change.is_persisted());
        manifest.dirs.retain(|d| d.change.is_persisted());
        manifest.specials.retain(|s| s.change.is_persisted());

        for file in &mut manifest.files {
            file.apply_staged();
        }
        for special in &mut manifest.specials {
            special.apply_staged();
        }

        needs_write
    }

    /// Second pass. Writes flagged children, then this manifest, and returns
    /// the digest for the parent's entry.
    fn write_manifest(&mut self, dir: &Path, manifest: &mut Manifest) -> ManifestDigest {
        for entry in &mut manifest.dirs {
            if !entry.needs_write {
                continue;
            }
            if let Some(child) = entry.manifest.as_deref_mut() {
                let written = self.write_manifest(&entry.path, child);
                entry.algorithm = written.algorithm;
                entry.digest = written.digest;
                entry.needs_write = false;
            }
        }

        let bytes = match manifest.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_error(format!("{}: serialization failed: {e}", dir.display()));
                return ManifestDigest::default();
            }
        };

        if let Err(e) = Manifest::save_bytes(dir, &bytes) {
            self.record_error(format!("{}: write failed: {e}", dir.display()));
            return ManifestDigest::default();
        }

        manifest.on_disk = true;
        self.stats.incr(&self.stats.write_done);
        info!("Wrote {}", dir.join(MANIFEST_FILENAME).display());

        let algorithm: HashAlgorithm = self.config.default_hash;
        ManifestDigest {
            algorithm: algorithm.as_str().to_string(),
            digest: algorithm.digest(&bytes),
        }
    }

    fn record_error(&mut self, message: String) {
        warn!("{message}");
        self.errors.push(message);
        self.stats.incr(&self.stats.write_errors);
    }
}
