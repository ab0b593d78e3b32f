//! Input files handed to the engine and used to place issues.
//!
//! The engine reports file paths either relative to the analysis working
//! directory or as absolute paths. [`InputFileSet`] resolves both forms to
//! the same [`InputFile`] by normalising paths lexically, without touching
//! the filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::InputFileError;

/// Looks up input files by the path an engine reported.
pub trait FileResolver {
    /// Returns the input file `path` refers to, if it is part of the
    /// analysis.
    fn resolve(&self, path: &Path) -> Option<&InputFile>;
}

/// One file under analysis.
///
/// Lines are split on `\n`; a trailing `\r` is not part of the line. Line
/// lengths are measured in characters.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::files::InputFile;
///
/// let file = InputFile::new("src/a.ts", "let é = 1;\r\nf();\n");
/// assert_eq!(file.line_count(), 3);
/// assert_eq!(file.line_length(0), Some(10));
/// assert_eq!(file.line_length(2), Some(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    relative_path: PathBuf,
    contents: String,
    line_lengths: Vec<u32>,
}

impl InputFile {
    /// Creates a file from its path relative to the base directory and its
    /// text.
    #[must_use]
    pub fn new(relative_path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let text = contents.into();
        let line_lengths = text
            .split('\n')
            .map(|line| {
                let length = line.strip_suffix('\r').unwrap_or(line).chars().count();
                u32::try_from(length).unwrap_or(u32::MAX)
            })
            .collect();
        Self {
            relative_path: relative_path.into(),
            contents: text,
            line_lengths,
        }
    }

    /// Path relative to the base directory.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// File text.
    #[must_use]
    pub const fn contents(&self) -> &str {
        self.contents.as_str()
    }

    /// Number of lines, always at least one.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_lengths.len()
    }

    /// Index of the last line.
    #[must_use]
    pub fn last_line(&self) -> u32 {
        u32::try_from(self.line_count().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// Length of a 0-based line in characters.
    #[must_use]
    pub fn line_length(&self, line: u32) -> Option<u32> {
        let index = usize::try_from(line).ok()?;
        self.line_lengths.get(index).copied()
    }
}

/// The ordered set of files in one analysis, rooted at a base directory.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::files::{FileResolver, InputFile, InputFileSet};
/// use std::path::Path;
///
/// let mut files = InputFileSet::new("/src/project");
/// files.insert(InputFile::new("lib/a.ts", "a();\n")).unwrap();
/// assert!(files.resolve(Path::new("lib/./a.ts")).is_some());
/// assert!(files.resolve(Path::new("/src/project/lib/a.ts")).is_some());
/// assert!(files.resolve(Path::new("/elsewhere/lib/a.ts")).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputFileSet {
    base_dir: PathBuf,
    files: Vec<InputFile>,
    index: BTreeMap<PathBuf, usize>,
}

impl InputFileSet {
    /// Creates an empty set rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base: PathBuf = base_dir.into();
        Self {
            base_dir: normalise(&base).unwrap_or(base),
            files: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Reads `paths`, relative to `base_dir` or absolute beneath it, from
    /// disk.
    ///
    /// # Errors
    ///
    /// Returns [`InputFileError::OutsideBase`] for paths escaping the base
    /// directory, [`InputFileError::Duplicate`] for repeated paths and
    /// [`InputFileError::Read`] when a file cannot be read as UTF-8 text.
    pub fn load<I, P>(base_dir: impl Into<PathBuf>, paths: I) -> Result<Self, InputFileError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = Self::new(base_dir);
        for path in paths {
            let relative = set.relative_key(path.as_ref()).ok_or_else(|| {
                InputFileError::OutsideBase {
                    path: path.as_ref().to_path_buf(),
                }
            })?;
            let absolute = set.base_dir.join(&relative);
            let contents = fs::read_to_string(&absolute).map_err(|err| InputFileError::Read {
                path: absolute,
                source: Arc::new(err),
            })?;
            set.insert(InputFile::new(relative, contents))?;
        }
        Ok(set)
    }

    /// Adds a file, normalising its relative path.
    ///
    /// # Errors
    ///
    /// Returns [`InputFileError::OutsideBase`] when the file's path escapes
    /// the base directory and [`InputFileError::Duplicate`] when it is
    /// already present.
    pub fn insert(&mut self, mut file: InputFile) -> Result<(), InputFileError> {
        let key = self
            .relative_key(file.relative_path())
            .ok_or_else(|| InputFileError::OutsideBase {
                path: file.relative_path().to_path_buf(),
            })?;
        if self.index.contains_key(&key) {
            return Err(InputFileError::Duplicate { path: key });
        }
        self.index.insert(key.clone(), self.files.len());
        file.relative_path = key;
        self.files.push(file);
        Ok(())
    }

    /// Directory paths are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Files in insertion order.
    #[must_use]
    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when the set holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Maps a reported path to its normalised key relative to the base
    /// directory.
    fn relative_key(&self, path: &Path) -> Option<PathBuf> {
        let normalised = normalise(path)?;
        let key = if normalised.is_absolute() {
            normalised.strip_prefix(&self.base_dir).ok()?.to_path_buf()
        } else {
            normalised
        };
        (!key.as_os_str().is_empty()).then_some(key)
    }
}

impl FileResolver for InputFileSet {
    fn resolve(&self, path: &Path) -> Option<&InputFile> {
        let key = self.relative_key(path)?;
        let position = *self.index.get(&key)?;
        self.files.get(position)
    }
}

/// Removes `.` components and folds `..` into its parent. Returns `None` for
/// paths climbing above their start.
fn normalise(path: &Path) -> Option<PathBuf> {
    let mut normalised = PathBuf::new();
    let mut depth = 0_usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalised.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1)?;
                normalised.pop();
            }
            Component::Normal(name) => {
                depth += 1;
                normalised.push(name);
            }
        }
    }
    Some(normalised)
}
