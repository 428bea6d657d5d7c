//! Declarative glob-to-destination mappings.
//!
//! A [`FileSet`] describes one transformation unit: which files a stage reads
//! (a glob under a source root), where it writes them (a destination root),
//! and an optional extension rewrite applied on the way through.

use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error resolving a file set against the filesystem.
#[derive(Debug, Error)]
pub enum FileSetError {
    /// The glob pattern itself is malformed
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    /// A matched path is not under the declared source root
    #[error("Matched path {} is outside source root {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// One resolved source-to-destination pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    /// Absolute path of the source file
    pub source: PathBuf,
    /// Absolute path the stage writes to
    pub dest: PathBuf,
}

/// A glob-to-destination mapping for one transformation unit.
///
/// Paths are relative to the project root and resolved at stage run time, so
/// a registered file set stays valid across repeated workflow invocations.
#[derive(Debug, Clone)]
pub struct FileSet {
    /// Glob pattern relative to the project root (never empty)
    pub source_glob: String,
    /// Root stripped from matches to compute relative destinations
    pub source_root: PathBuf,
    /// Root the relative paths are joined onto
    pub dest_root: PathBuf,
    /// Destination extension replacing the source extension, if any
    pub rewrite_ext: Option<String>,
}

impl FileSet {
    /// Create a file set without an extension rewrite.
    pub fn new(
        source_glob: impl Into<String>,
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_glob: source_glob.into(),
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            rewrite_ext: None,
        }
    }

    /// Set the destination extension (e.g. "css" for compiled stylesheets).
    pub fn with_rewrite_ext(mut self, ext: impl Into<String>) -> Self {
        self.rewrite_ext = Some(ext.into());
        self
    }

    /// Resolve the glob against the filesystem.
    ///
    /// Returns matched files paired with their destination paths, sorted by
    /// source path so repeated resolutions are deterministic. Directories and
    /// unreadable entries are skipped.
    pub fn resolve(&self, project_root: &Path) -> Result<Vec<FileMapping>, FileSetError> {
        let full_pattern = project_root.join(&self.source_glob);
        let pattern_str = full_pattern.to_string_lossy();

        let paths = glob(&pattern_str).map_err(|e| FileSetError::InvalidPattern {
            pattern: self.source_glob.clone(),
            source: e,
        })?;

        let source_root = project_root.join(&self.source_root);
        let dest_root = project_root.join(&self.dest_root);

        let mut mappings = Vec::new();
        for entry in paths.flatten() {
            if !entry.is_file() {
                continue;
            }
            let relative = entry
                .strip_prefix(&source_root)
                .map_err(|_| FileSetError::OutsideRoot {
                    path: entry.clone(),
                    root: source_root.clone(),
                })?
                .to_path_buf();

            let mut dest = dest_root.join(relative);
            if let Some(ext) = &self.rewrite_ext {
                dest.set_extension(ext);
            }
            mappings.push(FileMapping { source: entry, dest });
        }

        mappings.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(mappings)
    }
}
