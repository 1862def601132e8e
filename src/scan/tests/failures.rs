use super::*;

#[test]
fn test_corrupt_child_manifest_fails_only_that_subtree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("bad")).unwrap();
    fs::create_dir(root.join("good")).unwrap();
    fs::write(root.join("good/x.txt"), "x").unwrap();
    fs::write(root.join("bad").join(MANIFEST_FILENAME), "not [valid toml").unwrap();

    let scan = status(root, ScanConfig::default());

    let bad = scan.root().dir("bad").unwrap();
    assert_eq!(bad.change, Change::Failed);
    assert!(bad.manifest.is_none());
    assert!(bad.errors[0].contains("Failed to load manifest"));

    assert_eq!(file(child(scan.root(), "good"), "x.txt").change, Change::Added);
    assert_eq!(Stats::load(&scan.stats.scan_errors), 1);
}

#[test]
fn test_future_version_child_manifest() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("future")).unwrap();
    fs::write(root.join("future").join(MANIFEST_FILENAME), "version = 7\n").unwrap();

    let scan = status(root, ScanConfig::default());
    let future = scan.root().dir("future").unwrap();
    assert_eq!(future.change, Change::Failed);
    assert!(future.errors[0].contains("Unsupported manifest version: 7"));
}

#[test]
fn test_root_failures_are_returned() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let mut missing = Scan::new(root.join("missing"), ScanConfig::default());
    assert!(matches!(missing.scan(), Err(ScanError::List { .. })));

    fs::write(root.join(MANIFEST_FILENAME), "version = 0\n").unwrap();
    let mut corrupt = Scan::new(root, ScanConfig::default());
    match corrupt.scan() {
        Err(ScanError::Manifest {
            source: ManifestError::InvalidVersion(0),
            ..
        }) => {}
        other => panic!("Expected InvalidVersion, got {:?}", other.err()),
    }
}

#[test]
fn test_unsupported_parent_algorithm_fails_subtree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("sub")).unwrap();
    update(root, ScanConfig::default());

    let content = fs::read_to_string(root.join(MANIFEST_FILENAME)).unwrap();
    fs::write(
        root.join(MANIFEST_FILENAME),
        content.replace("algorithm = \"sha256\"", "algorithm = \"crc32\""),
    )
    .unwrap();

    let scan = status(root, ScanConfig::default());
    let sub = scan.root().dir("sub").unwrap();
    assert_eq!(sub.change, Change::Failed);
    assert!(sub.errors[0].contains("unsupported algorithm"));
}

#[test]
#[cfg(unix)]
fn test_unlistable_directory_fails_subtree() {
    use std::os::unix::fs::PermissionsExt;

    if nix::unistd::geteuid().is_root() {
        return;
    }

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("locked")).unwrap();
    fs::write(root.join("sibling.txt"), "s").unwrap();
    fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

    let scan = update(root, ScanConfig::default());

    fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    let locked = scan.root().dir("locked").unwrap();
    assert_eq!(locked.change, Change::Failed);
    assert!(locked.errors[0].contains("Failed to list"));
    assert_eq!(file(scan.root(), "sibling.txt").change, Change::Added);

    let recorded = on_disk(root);
    assert!(recorded.dir("locked").is_none());
    assert!(recorded.file("sibling.txt").is_some());
    assert!(scan.write_errors().is_empty());
}

#[test]
#[cfg(unix)]
fn test_unwritable_directory_records_write_error() {
    use std::os::unix::fs::PermissionsExt;

    if nix::unistd::geteuid().is_root() {
        return;
    }

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("ro")).unwrap();
    fs::write(root.join("ro/x.txt"), "x").unwrap();
    fs::set_permissions(root.join("ro"), fs::Permissions::from_mode(0o555)).unwrap();

    let scan = update(root, ScanConfig::default());

    fs::set_permissions(root.join("ro"), fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(scan.write_errors().len(), 1);
    assert!(scan.write_errors()[0].contains("write failed"));
    assert_eq!(Stats::load(&scan.stats.write_errors), 1);

    // The root was still written, with an empty digest for the failed child.
    let recorded = on_disk(root);
    let ro = recorded.dir("ro").unwrap();
    assert!(ro.digest.is_empty());
    assert!(ro.algorithm.is_empty());

    // Once writable again, the child rejoins the chain without any change.
    let rerun = update(root, ScanConfig::default());
    assert!(rerun.write_errors().is_empty());
    assert_eq!(writes(&rerun), 2);
    let ro = on_disk(root).dir("ro").unwrap().clone();
    let bytes = Manifest::read(&root.join("ro")).unwrap();
    assert_eq!(ro.digest, HashAlgorithm::Sha256.digest(&bytes));
}

#[test]
fn test_live_updates_signal_during_scan() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a.txt"), "a").unwrap();

    let config = ScanConfig {
        live_updates: true,
        ..ScanConfig::default()
    };
    let mut scan = Scan::new(root, config);
    let signal = scan.take_progress_signal().unwrap();
    assert!(scan.take_progress_signal().is_none());

    scan.scan().unwrap();
    assert_eq!(signal.try_recv(), Ok(()));
}
