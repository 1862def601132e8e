use super::*;

fn nested_tree(root: &Path) {
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir(root.join("c")).unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();
    fs::write(root.join("a/one.txt"), "one").unwrap();
    fs::write(root.join("a/b/two.txt"), "two").unwrap();
}

/// Checks every directory entry on disk against the bytes of the child's
/// manifest file.
fn assert_chain_consistent(dir: &Path) {
    let manifest = on_disk(dir);
    for entry in &manifest.dirs {
        let child_dir = dir.join(&entry.name);
        let bytes = Manifest::read(&child_dir).unwrap();
        let algorithm = HashAlgorithm::from_id(&entry.algorithm).unwrap();
        assert_eq!(
            algorithm.digest(&bytes),
            entry.digest,
            "digest chain broken at {}",
            child_dir.display()
        );
        assert_chain_consistent(&child_dir);
    }
}

#[test]
fn test_digest_chain_consistent_after_write() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);

    let scan = update(root, ScanConfig::default());
    assert_eq!(writes(&scan), 4);
    assert!(scan.write_errors().is_empty());

    assert_chain_consistent(root);
}

#[test]
fn test_root_digest_matches_written_bytes() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);

    let mut scan = Scan::new(root, ScanConfig::default());
    scan.scan().unwrap();
    scan.digest();
    let digest = scan.write().unwrap();

    let bytes = Manifest::read(root).unwrap();
    assert_eq!(digest.algorithm, "sha256");
    assert_eq!(digest.digest, HashAlgorithm::Sha256.digest(&bytes));
}

#[test]
fn test_idempotent_second_run() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    let before = Manifest::read(root).unwrap();

    let mut scan = Scan::new(root, ScanConfig::default());
    scan.scan().unwrap();
    scan.digest();
    scan.calculate_change_stats();

    assert!(!scan.stats.has_changes());
    assert!(scan.root().dirs.iter().all(|d| d.verified));
    assert!(child(scan.root(), "a").dirs.iter().all(|d| d.verified));

    assert!(scan.write().is_none());
    assert_eq!(writes(&scan), 0);
    assert_eq!(Manifest::read(root).unwrap(), before);
}

#[test]
fn test_deep_change_propagates_to_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    fs::write(root.join("a/b/three.txt"), "three").unwrap();

    let scan = update(root, ScanConfig::default());
    // a/b gains an entry, so a/b, a and the root are rewritten. c is not.
    assert_eq!(writes(&scan), 3);
    assert_chain_consistent(root);

    let again = update(root, ScanConfig::default());
    assert_eq!(writes(&again), 0);
}

#[test]
fn test_tampered_child_manifest_detected_and_rewritten() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    let child_manifest = root.join("c").join(MANIFEST_FILENAME);
    let mut content = fs::read_to_string(&child_manifest).unwrap();
    content.push_str("\n# edited by hand\n");
    fs::write(&child_manifest, content).unwrap();

    let scan = update(root, ScanConfig::default());

    let entry = scan.root().dir("c").unwrap();
    assert!(!entry.verified);
    assert_eq!(entry.errors.len(), 1);
    assert!(entry.errors[0].contains("integrity violation"));
    assert_eq!(Stats::load(&scan.stats.scan_errors), 1);
    // Nothing tracked changed, yet c and the root were rewritten.
    assert!(!scan.stats.has_changes());
    assert_eq!(writes(&scan), 2);

    assert_chain_consistent(root);
    let after = status(root, ScanConfig::default());
    assert_eq!(after.stats.error_count(), 0);
    assert!(after.root().dir("c").unwrap().verified);
}

#[test]
fn test_cleared_child_digest_restored_on_next_update() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    let mut recorded = on_disk(root);
    let entry = recorded.dirs.iter_mut().find(|d| d.name == "c").unwrap();
    entry.algorithm.clear();
    entry.digest.clear();
    Manifest::save_bytes(root, &recorded.encode().unwrap()).unwrap();

    let scan = update(root, ScanConfig::default());
    assert_eq!(scan.stats.error_count(), 0);
    assert!(!scan.stats.has_changes());
    assert_eq!(writes(&scan), 2);
    assert!(!on_disk(root).dir("c").unwrap().digest.is_empty());
    assert_chain_consistent(root);

    let child_manifest = root.join("c").join(MANIFEST_FILENAME);
    let mut content = fs::read_to_string(&child_manifest).unwrap();
    content.push_str("\n# edited by hand\n");
    fs::write(&child_manifest, content).unwrap();

    let after = status(root, ScanConfig::default());
    let entry = after.root().dir("c").unwrap();
    assert!(!entry.verified);
    assert!(entry.errors[0].contains("integrity violation"));
    assert_eq!(Stats::load(&after.stats.scan_errors), 1);
}

#[test]
fn test_missing_child_manifest_is_integrity_violation() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    fs::remove_file(root.join("a/b").join(MANIFEST_FILENAME)).unwrap();

    let scan = status(root, ScanConfig::default());
    let b = child(scan.root(), "a").dir("b").unwrap();
    assert!(!b.verified);
    assert!(b.errors[0].contains("manifest missing"));
    assert!(b.needs_write());
}

#[test]
fn test_rebuild_migrates_algorithm_and_rewrites_everything() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    let config = ScanConfig {
        default_hash: HashAlgorithm::Blake3,
        rebuild: true,
        ..ScanConfig::default()
    };
    let scan = update(root, config);
    assert_eq!(writes(&scan), 4);

    let recorded = on_disk(root);
    assert_eq!(file(&recorded, "top.txt").algorithm, "blake3");
    assert_eq!(
        file(&recorded, "top.txt").digest,
        HashAlgorithm::Blake3.digest(b"top")
    );
    assert!(recorded.dirs.iter().all(|d| d.algorithm == "blake3"));
    assert_chain_consistent(root);
}

#[test]
fn test_rebuild_without_changes_still_writes() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    nested_tree(root);
    update(root, ScanConfig::default());

    let config = ScanConfig {
        rebuild: true,
        ..ScanConfig::default()
    };
    let scan = update(root, config);
    assert_eq!(writes(&scan), 4);
    assert!(!scan.stats.has_changes());
}
