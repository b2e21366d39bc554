//! # Directory Scanner
//!
//! Walks a directory tree and collects the files that may take part in a
//! transformation.
//!
//! ## Walk Rules
//!
//! - Directories are descended into but never listed
//! - Entries of each directory are visited in file-name order, depth first
//! - Symbolic links are listed as files and never followed
//! - The running executable is never listed, so a binary cannot encrypt itself
//! - The caller may name one more path to leave out
//!
//! A failure to stat any entry aborts the walk. An empty directory is not an
//! error; it produces an empty [`FileList`].

use crate::error::{EvergladeError, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// One discovered file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    path: PathBuf,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for FileEntry {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Files in the order the walk visited them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList {
    files: Vec<FileEntry>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_file(&mut self, path: impl Into<PathBuf>) {
        self.files.push(FileEntry::new(path));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(FileEntry::path)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.paths().any(|p| p == path)
    }

    /// Drop every file that is, or resolves to, one of `paths`.
    ///
    /// Matching follows the walk's exclusion rule, so a relative or
    /// symlinked spelling of a listed file still removes it.
    pub fn without<'p>(self, paths: impl IntoIterator<Item = &'p Path>) -> Self {
        let targets: Vec<SkipTarget> = paths
            .into_iter()
            .filter(|p| !p.as_os_str().is_empty())
            .map(SkipTarget::new)
            .collect();
        if targets.is_empty() {
            return self;
        }

        self.into_iter()
            .filter(|file| {
                let skip = targets.iter().any(|t| t.matches(file.path()));
                if skip {
                    debug!("Skipping {} (excluded path)", file.path().display());
                }
                !skip
            })
            .collect()
    }
}

impl IntoIterator for FileList {
    type Item = FileEntry;
    type IntoIter = std::vec::IntoIter<FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

impl FromIterator<FileEntry> for FileList {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Canonical path of the running executable, if the platform can tell us
pub fn current_executable() -> Option<PathBuf> {
    std::env::current_exe()
        .and_then(fs::canonicalize)
        .map_err(|err| debug!("Could not resolve current executable: {err}"))
        .ok()
}

/// A path compared by file name first, canonical form second.
///
/// Canonicalizing every walked entry would cost a syscall per file, so only
/// entries whose file name already matches are resolved.
struct SkipTarget {
    literal: PathBuf,
    canonical: Option<PathBuf>,
}

impl SkipTarget {
    fn new(path: &Path) -> Self {
        Self {
            literal: path.to_path_buf(),
            canonical: fs::canonicalize(path).ok(),
        }
    }

    fn matches(&self, candidate: &Path) -> bool {
        if candidate == self.literal {
            return true;
        }
        let Some(canonical) = &self.canonical else {
            return false;
        };
        if candidate.file_name() != canonical.file_name() {
            return false;
        }
        fs::canonicalize(candidate).is_ok_and(|c| &c == canonical)
    }
}

struct Exclusions {
    current_exe: Option<SkipTarget>,
    exclude: Option<SkipTarget>,
}

impl Exclusions {
    fn new(exclude: Option<&Path>) -> Self {
        Self {
            current_exe: current_executable().map(|exe| SkipTarget::new(&exe)),
            exclude: exclude
                .filter(|p| !p.as_os_str().is_empty())
                .map(SkipTarget::new),
        }
    }

    fn reason(&self, path: &Path) -> Option<&'static str> {
        if self.current_exe.as_ref().is_some_and(|t| t.matches(path)) {
            Some("running executable")
        } else if self.exclude.as_ref().is_some_and(|t| t.matches(path)) {
            Some("excluded path")
        } else {
            None
        }
    }
}

/// Walk `dir` and list every file except the running executable and `exclude`
pub fn discover_files_in_directory(
    dir: impl AsRef<Path>,
    exclude: Option<&Path>,
) -> Result<FileList> {
    let dir = dir.as_ref();
    let exclusions = Exclusions::new(exclude);
    let mut files = FileList::new();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| EvergladeError::FileWalk {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf()),
            source,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        if let Some(reason) = exclusions.reason(entry.path()) {
            debug!("Skipping {} ({reason})", entry.path().display());
            continue;
        }

        trace!("Discovered {}", entry.path().display());
        files.add_file(entry.into_path());
    }

    debug!("Discovered {} file(s) under {}", files.len(), dir.display());
    Ok(files)
}

/// First file under `dir` whose final path component is `filename`.
///
/// Returns `Ok(None)` when nothing matches. When several files share the
/// name, the one visited first wins.
pub fn find_file_in_directory(
    dir: impl AsRef<Path>,
    filename: impl AsRef<OsStr>,
) -> Result<Option<PathBuf>> {
    let filename = filename.as_ref();
    let files = discover_files_in_directory(dir, None)?;

    Ok(files
        .into_iter()
        .find(|f| f.file_name() == Some(filename))
        .map(FileEntry::into_path))
}

/// Files under `dir` whose type token equals `file_type`.
///
/// The type token is the last separator-delimited piece of the file name,
/// which is the whole file name, so this is an exact file-name filter that
/// returns every match. Use [`find_files_by_extension_in_directory`] to
/// filter on a dotted extension.
pub fn find_files_by_type_in_directory(
    dir: impl AsRef<Path>,
    file_type: impl AsRef<OsStr>,
) -> Result<FileList> {
    let file_type = file_type.as_ref();
    let files = discover_files_in_directory(dir, None)?;

    Ok(files
        .into_iter()
        .filter(|f| type_token(f.path()) == Some(file_type))
        .collect())
}

fn type_token(path: &Path) -> Option<&OsStr> {
    let name = path.file_name()?;
    Path::new(name).components().next_back().map(|c| c.as_os_str())
}

/// Files under `dir` whose extension is `extension` (case-sensitive, leading
/// dot optional)
pub fn find_files_by_extension_in_directory(
    dir: impl AsRef<Path>,
    extension: &str,
) -> Result<FileList> {
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    let files = discover_files_in_directory(dir, None)?;

    Ok(files
        .into_iter()
        .filter(|f| f.path().extension() == Some(OsStr::new(extension)))
        .collect())
}
