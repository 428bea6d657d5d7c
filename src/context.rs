//! Shared state for a single workflow run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PagesConfig;
use crate::mode::ModeContext;
use crate::tools::Toolchain;

/// Everything a stage needs to do its work.
///
/// A context is built once per workflow invocation and shared (immutably)
/// across all stages, including those running concurrently. Stages never
/// communicate through the context; the filesystem carries all intermediate
/// state.
#[derive(Clone)]
pub struct BuildContext {
    /// Loaded project configuration
    pub config: PagesConfig,
    /// Directory all configured paths are resolved against
    pub project_root: PathBuf,
    /// Build mode and its derived settings
    pub mode: ModeContext,
    /// Emit per-file progress while running
    pub verbose: bool,
    /// Collaborators shared by every stage
    pub toolchain: Arc<Toolchain>,
}

impl BuildContext {
    pub fn new(config: PagesConfig, project_root: impl Into<PathBuf>, mode: ModeContext) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            mode,
            verbose: false,
            toolchain: Arc::new(Toolchain::default()),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_toolchain(mut self, toolchain: Arc<Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Absolute path of the source tree.
    pub fn src_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.project.src)
    }

    /// Absolute path of the static-files tree.
    pub fn public_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.project.public)
    }

    /// Absolute path of the intermediate tree.
    pub fn temp_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.project.temp)
    }

    /// Absolute path of the output tree.
    pub fn dist_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.project.dist)
    }

    /// Resolve a configured (possibly relative) path against the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
