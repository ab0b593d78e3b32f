//! Deployment of the packaged engine bundle onto disk.
//!
//! A bundle is a zip archive holding the engine and its runtime files,
//! normally under a single top-level directory. [`deploy`] expands it into a
//! destination directory and returns the [`BundleRoot`] the launcher runs
//! from. Extraction is a pure filesystem operation: nothing is cached in
//! memory, and re-extracting into the same directory rewrites the same files.
//! There is no partial-extraction recovery; callers retry by deploying into a
//! fresh directory.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zip::ZipArchive;

use crate::error::DeployError;

/// Tracing target for bundle deployment.
const BUNDLE_TARGET: &str = "lintbridge_engine::bundle";

/// Directory holding an expanded bundle.
///
/// # Example
///
/// ```
/// use lintbridge_engine::bundle::BundleRoot;
/// use std::path::Path;
///
/// let root = BundleRoot::new("/work/engine-bundle");
/// assert_eq!(
///     root.resolve(Path::new("bin/engine")).as_deref(),
///     Some(Path::new("/work/engine-bundle/bin/engine")),
/// );
/// assert!(root.resolve(Path::new("../outside")).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRoot {
    path: PathBuf,
}

impl BundleRoot {
    /// Wraps an already deployed bundle directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory the bundle was expanded into.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Joins a bundle-relative path, rejecting paths that leave the root.
    #[must_use]
    pub fn resolve(&self, relative: &Path) -> Option<PathBuf> {
        stays_within_root(relative).then(|| self.path.join(relative))
    }
}

/// Opens the archive at `archive` and deploys it into `destination`.
///
/// # Errors
///
/// Returns [`DeployError::OpenArchive`] when the file cannot be opened, and
/// any error reported by [`deploy`].
pub fn deploy_file(archive: &Path, destination: &Path) -> Result<BundleRoot, DeployError> {
    let file = File::open(archive).map_err(|err| DeployError::OpenArchive {
        path: archive.to_path_buf(),
        source: Arc::new(err),
    })?;
    deploy(io::BufReader::new(file), destination)
}

/// Expands every archive entry into `destination`.
///
/// Intermediate directories are created as needed and unix permission bits
/// are restored where the platform supports them. When every entry lives
/// under one top-level directory, that directory is returned as the root;
/// otherwise the destination itself is.
///
/// # Errors
///
/// Returns [`DeployError::MalformedArchive`] for unreadable archives,
/// [`DeployError::PathTraversal`] for entries resolving outside
/// `destination`, and [`DeployError::Write`] when the filesystem rejects a
/// write.
pub fn deploy<R: Read + Seek>(reader: R, destination: &Path) -> Result<BundleRoot, DeployError> {
    let mut archive = ZipArchive::new(reader).map_err(malformed)?;
    create_dir(destination)?;

    debug!(
        target: BUNDLE_TARGET,
        destination = %destination.display(),
        entries = archive.len(),
        "deploying bundle"
    );

    let mut top_level = BTreeSet::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(malformed)?;
        let relative = entry
            .enclosed_name()
            .filter(|path| stays_within_root(path))
            .ok_or_else(|| DeployError::PathTraversal {
                entry: entry.name().to_owned(),
            })?;
        if let Some(Component::Normal(first)) = relative.components().next() {
            top_level.insert(OsString::from(first));
        }

        let target = destination.join(&relative);
        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        remove_previous(&target)?;
        let mut file = File::create(&target).map_err(|err| write_error(&target, err))?;
        io::copy(&mut entry, &mut file).map_err(|err| write_error(&target, err))?;
        restore_permissions(&target, entry.unix_mode())?;
    }

    let root = single_top_level_dir(destination, &top_level)
        .unwrap_or_else(|| destination.to_path_buf());
    debug!(
        target: BUNDLE_TARGET,
        root = %root.display(),
        "bundle deployed"
    );
    Ok(BundleRoot::new(root))
}

fn stays_within_root(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn single_top_level_dir(destination: &Path, top_level: &BTreeSet<OsString>) -> Option<PathBuf> {
    let mut names = top_level.iter();
    let only = names.next()?;
    if names.next().is_some() {
        return None;
    }
    let candidate = destination.join(only);
    candidate.is_dir().then_some(candidate)
}

/// Removes a file left by an earlier deployment so read-only entries can be
/// rewritten.
fn remove_previous(path: &Path) -> Result<(), DeployError> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(write_error(path, err)),
        _ => Ok(()),
    }
}

fn create_dir(path: &Path) -> Result<(), DeployError> {
    fs::create_dir_all(path).map_err(|err| write_error(path, err))
}

#[cfg(unix)]
fn restore_permissions(path: &Path, mode: Option<u32>) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = mode else {
        return Ok(());
    };
    fs::set_permissions(path, fs::Permissions::from_mode(bits & 0o777))
        .map_err(|err| write_error(path, err))
}

#[cfg(not(unix))]
fn restore_permissions(_path: &Path, _mode: Option<u32>) -> Result<(), DeployError> {
    Ok(())
}

fn write_error(path: &Path, err: io::Error) -> DeployError {
    DeployError::Write {
        path: path.to_path_buf(),
        source: Arc::new(err),
    }
}

fn malformed(err: zip::result::ZipError) -> DeployError {
    DeployError::MalformedArchive {
        source: Arc::new(err),
    }
}

#[cfg(test)]
mod tests;
