use super::*;
use crate::change::Change;
use crate::entry::{FileEntry, SpecialEntry, SpecialKind};
use std::fs;
use tempfile::TempDir;

/// Scan, digest, aggregate and write, like a full update run.
fn update(root: &Path, config: ScanConfig) -> Scan {
    let mut scan = Scan::new(root, config);
    scan.scan().unwrap();
    scan.digest();
    scan.calculate_change_stats();
    scan.write();
    scan
}

/// Scan, digest and aggregate without writing anything.
fn status(root: &Path, config: ScanConfig) -> Scan {
    let mut scan = Scan::new(root, config);
    scan.scan().unwrap();
    scan.digest();
    scan.calculate_change_stats();
    scan
}

fn file<'a>(manifest: &'a Manifest, name: &str) -> &'a FileEntry {
    manifest
        .files
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no file entry {name:?}"))
}

fn child<'a>(manifest: &'a Manifest, name: &str) -> &'a Manifest {
    manifest
        .dirs
        .iter()
        .find(|d| d.name == name)
        .and_then(|d| d.manifest.as_deref())
        .unwrap_or_else(|| panic!("no scanned directory {name:?}"))
}

fn on_disk(dir: &Path) -> Manifest {
    Manifest::load(dir).unwrap()
}

fn writes(scan: &Scan) -> u64 {
    Stats::load(&scan.stats.write_done)
}

mod chain;
mod failures;
