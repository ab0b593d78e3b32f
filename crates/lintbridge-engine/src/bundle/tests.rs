//! Unit tests for bundle deployment.

use std::io::{Cursor, Write};

use rstest::{fixture, rstest};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::*;

const ENGINE_SCRIPT: &[u8] = b"#!/bin/sh\nexit 0\n";

/// Entries of a representative bundle: `(name, contents)`; `None` marks a
/// directory.
const BUNDLE_ENTRIES: &[(&str, Option<&[u8]>)] = &[
    ("engine-bundle/", None),
    ("engine-bundle/bin/", None),
    ("engine-bundle/bin/engine", Some(ENGINE_SCRIPT)),
    ("engine-bundle/lib/rules.js", Some(b"module.exports = {};\n")),
    ("engine-bundle/node_modules/typescript/package.json", Some(b"{\"name\":\"typescript\"}")),
    ("engine-bundle/data/empty.bin", Some(b"")),
];

fn build_archive(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().unix_permissions(0o755);
    for (name, contents) in entries {
        match contents {
            None => writer.add_directory(*name, options).expect("add directory"),
            Some(bytes) => {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(bytes).expect("write entry");
            }
        }
    }
    writer.finish().expect("finish archive").into_inner()
}

#[fixture]
fn destination() -> TempDir {
    TempDir::new().expect("create temp dir")
}

#[rstest]
fn deploy_reproduces_every_entry(destination: TempDir) {
    let archive = build_archive(BUNDLE_ENTRIES);
    let root = deploy(Cursor::new(archive), destination.path()).expect("deploy");

    assert_eq!(root.path(), destination.path().join("engine-bundle"));
    for (name, contents) in BUNDLE_ENTRIES {
        let path = destination.path().join(name);
        match contents {
            None => assert!(path.is_dir(), "{} should be a directory", path.display()),
            Some(expected) => {
                let actual = fs::read(&path).expect("read deployed entry");
                assert_eq!(&actual, expected, "content mismatch for {name}");
            }
        }
    }
}

#[rstest]
fn deploy_creates_missing_intermediate_directories(destination: TempDir) {
    let archive = build_archive(&[("engine-bundle/deep/nested/file.txt", Some(b"x"))]);
    let nested_destination = destination.path().join("not/yet/created");
    let root = deploy(Cursor::new(archive), &nested_destination).expect("deploy");
    assert!(root.path().join("deep/nested/file.txt").is_file());
}

#[rstest]
fn deploying_twice_is_idempotent(destination: TempDir) {
    let archive = build_archive(BUNDLE_ENTRIES);
    let first = deploy(Cursor::new(archive.clone()), destination.path()).expect("first deploy");
    let second = deploy(Cursor::new(archive), destination.path()).expect("second deploy");
    assert_eq!(first, second);
    let script = fs::read(second.path().join("bin/engine")).expect("read engine");
    assert_eq!(script, ENGINE_SCRIPT);
}

#[rstest]
fn archive_without_single_top_level_dir_roots_at_destination(destination: TempDir) {
    let archive = build_archive(&[
        ("bin/engine", Some(ENGINE_SCRIPT)),
        ("README", Some(b"readme")),
    ]);
    let root = deploy(Cursor::new(archive), destination.path()).expect("deploy");
    assert_eq!(root.path(), destination.path());
}

#[cfg(unix)]
#[rstest]
fn deploy_restores_unix_permissions(destination: TempDir) {
    use std::os::unix::fs::PermissionsExt;

    let archive = build_archive(BUNDLE_ENTRIES);
    let root = deploy(Cursor::new(archive), destination.path()).expect("deploy");
    let mode = fs::metadata(root.path().join("bin/engine"))
        .expect("stat engine")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[rstest]
#[case::parent_escape("../escape.txt")]
#[case::nested_escape("engine-bundle/../../escape.txt")]
fn traversal_entries_are_rejected(destination: TempDir, #[case] name: &str) {
    let archive = build_archive(&[(name, Some(b"owned"))]);
    let error = deploy(Cursor::new(archive), destination.path()).expect_err("must reject");
    assert!(
        matches!(error, DeployError::PathTraversal { ref entry } if entry == name),
        "unexpected error: {error}"
    );
    let parent = destination.path().parent().expect("temp dir has parent");
    assert!(!parent.join("escape.txt").exists());
}

#[rstest]
fn malformed_archive_is_rejected(destination: TempDir) {
    let error = deploy(Cursor::new(b"definitely not a zip".to_vec()), destination.path())
        .expect_err("must reject");
    assert!(matches!(error, DeployError::MalformedArchive { .. }));
}

#[rstest]
fn deploy_file_reports_missing_archive(destination: TempDir) {
    let missing = destination.path().join("missing.zip");
    let error = deploy_file(&missing, destination.path()).expect_err("must fail");
    assert!(matches!(error, DeployError::OpenArchive { .. }));
}

#[rstest]
fn deploy_file_reads_archive_from_disk(destination: TempDir) {
    let archive_path = destination.path().join("bundle.zip");
    fs::write(&archive_path, build_archive(BUNDLE_ENTRIES)).expect("write archive");
    let target = destination.path().join("deployed");
    let root = deploy_file(&archive_path, &target).expect("deploy");
    assert!(root.path().join("lib/rules.js").is_file());
}

#[test]
fn bundle_root_rejects_escaping_paths() {
    let root = BundleRoot::new("/work/engine-bundle");
    assert!(root.resolve(Path::new("/etc/passwd")).is_none());
    assert!(root.resolve(Path::new("bin/../../x")).is_none());
    assert_eq!(
        root.resolve(Path::new("./bin/engine")),
        Some(PathBuf::from("/work/engine-bundle/./bin/engine"))
    );
}
