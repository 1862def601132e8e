use crate::manifest::Manifest;
use crate::scan::Scan;
use crate::stats::Stats;

impl Scan {
    /// Tally classifications per entry kind and in total.
    ///
    /// Counts are reset first, so this can be called again after the tree
    /// has been modified.
    pub fn calculate_change_stats(&self) {
        for set in [
            &self.stats.files,
            &self.stats.dirs,
            &self.stats.special,
            &self.stats.total,
        ] {
            set.reset();
        }
        count_changes(&self.stats, &self.root);
        self.stats.notify();
    }
}

fn count_changes(stats: &Stats, manifest: &Manifest) {
    for file in &manifest.files {
        stats.files.record(file.change);
        stats.total.record(file.change);
    }
    for special in &manifest.specials {
        stats.special.record(special.change);
        stats.total.record(special.change);
    }
    for dir in &manifest.dirs {
        stats.dirs.record(dir.change);
        stats.total.record(dir.change);
        if let Some(child) = &dir.manifest {
            count_changes(stats, child);
        }
    }
}
