//! Content hashing of scanned files.
//!
//! Only files whose classification or configuration calls for it are read.
//! A successful hash that disagrees with the recorded digest or algorithm
//! upgrades the file to `Changed`, which is what catches silent corruption
//! when size and modification time are untouched.

use crate::change::Change;
use crate::entry::FileEntry;
use crate::hashing::HashAlgorithm;
use crate::manifest::Manifest;
use crate::scan::{Scan, ScanConfig};
use crate::stats::Stats;
use tracing::{debug, warn};

impl Scan {
    pub fn digest(&mut self) {
        let digester = Digester {
            config: &self.config,
            stats: &self.stats,
        };
        digester.digest_dir(&mut self.root);
    }
}

struct Digester<'a> {
    config: &'a ScanConfig,
    stats: &'a Stats,
}

impl Digester<'_> {
    fn digest_dir(&self, manifest: &mut Manifest) {
        for file in &mut manifest.files {
            self.digest_file(file);
        }

        for dir in &mut manifest.dirs {
            if matches!(dir.change, Change::Removed | Change::Failed) {
                continue;
            }
            if let Some(child) = dir.manifest.as_deref_mut() {
                self.digest_dir(child);
            }
        }
    }

    fn digest_file(&self, file: &mut FileEntry) {
        let wanted = match file.change {
            Change::Removed | Change::Failed => return,
            Change::Added | Change::Changed | Change::TimestampChanged => true,
            Change::NoChange => self.config.digest_all,
        };

        if !wanted {
            self.stats.incr(&self.stats.digest_skipped);
            return;
        }

        let algorithm = self.algorithm_for(file);

        match algorithm.digest_file(&file.path) {
            Ok(hashed) => {
                self.stats.incr(&self.stats.digested_files);

                // The file may have moved on since it was listed.
                if hashed.size != file.staged.size
                    || hashed.mtime_nanos != file.staged.mtime_nanos
                {
                    debug!("{}: metadata changed since listing", file.path.display());
                    if file.change == Change::Added {
                        file.staged.size = hashed.size;
                        file.staged.mtime_nanos = hashed.mtime_nanos;
                    } else {
                        file.stage(hashed.size, hashed.mtime_nanos);
                    }
                }

                if file.change != Change::Added
                    && (file.algorithm != algorithm.as_str() || file.digest != hashed.digest)
                {
                    debug!("{}: digest differs from manifest", file.path.display());
                    file.change = Change::Changed;
                }

                file.staged.algorithm = algorithm.as_str().to_string();
                file.staged.digest = hashed.digest;
            }
            Err(e) => {
                let message = format!("{}: digest failed: {e}", file.path.display());
                warn!("{message}");
                file.fail(message);
                self.stats.incr(&self.stats.digest_errors);
            }
        }
    }

    /// The recorded algorithm if it is still supported, otherwise the
    /// default. Rebuilding always uses the default.
    fn algorithm_for(&self, file: &FileEntry) -> HashAlgorithm {
        if self.config.rebuild {
            return self.config.default_hash;
        }
        HashAlgorithm::from_id(&file.algorithm).unwrap_or(self.config.default_hash)
    }
}
