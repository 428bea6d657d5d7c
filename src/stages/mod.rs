//! Pipeline stages.
//!
//! A [`Stage`] is the atomic unit of work: it reads files, transforms them,
//! writes results, and reports what happened. Stages hold no mutable state
//! and communicate only through the filesystem, so the task graph is free to
//! run sibling stages concurrently.
//!
//! [`register_all`] wires every built-in stage and the named workflows into a
//! [`TaskGraph`]. Registration is routed through the compatibility shim so
//! stage packs from the denied family never enter the graph.

pub mod assets;
pub mod bundle;
pub mod clean;
pub mod compile;
pub mod deploy;
pub mod lint;
pub mod minify;

use std::sync::Arc;
use thiserror::Error;

use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::fileset::FileSetError;
use crate::graph::{CompositionError, TaskGraph};
use crate::shim;

/// Fatal stage failure.
///
/// Anything that makes continuing pointless: unreadable roots, failed
/// writes, broken glob patterns. Per-file problems are not errors; they
/// are reported as [`Diagnostic`]s in the stage report.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    FileSet(#[from] FileSetError),
    #[error("Missing directory: {}", .0.display())]
    MissingRoot(std::path::PathBuf),
    #[error("{0}")]
    Tool(String),
}

/// What a stage accomplished.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// Files written to the destination tree
    pub files_written: usize,
    /// Per-file findings (lint results, compile errors)
    pub diagnostics: Vec<Diagnostic>,
    /// The stage ran to completion but its result is unusable
    pub failed: bool,
}

impl StageReport {
    pub fn written(files_written: usize) -> Self {
        Self { files_written, ..Self::default() }
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }
}

/// The atomic unit of pipeline work.
pub trait Stage: Send + Sync {
    /// Unique name used for graph registration and reporting.
    fn name(&self) -> &str;

    /// Do the work. `Err` is fatal; per-file problems go in the report.
    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError>;
}

/// Register a stage through the compatibility shim.
///
/// Returns `false` when the shim denied the stage. A denied stage is
/// silently absent from the graph; composing a workflow over it then fails
/// loudly at registration time, never at run time.
pub fn register_stage(
    graph: &mut TaskGraph,
    stage: Arc<dyn Stage>,
) -> Result<bool, CompositionError> {
    if !shim::admit(stage.name()) {
        return Ok(false);
    }
    graph.register_stage(stage)?;
    Ok(true)
}

/// Build the full task graph: every stage plus the named workflows.
pub fn register_all(graph: &mut TaskGraph) -> Result<(), CompositionError> {
    register_stage(graph, Arc::new(clean::Clean))?;
    register_stage(graph, Arc::new(clean::CleanTemp))?;
    register_stage(graph, Arc::new(lint::LintScripts))?;
    register_stage(graph, Arc::new(lint::LintStyles))?;
    register_stage(graph, Arc::new(compile::CompileMarkup))?;
    register_stage(graph, Arc::new(compile::CompileStyles))?;
    register_stage(graph, Arc::new(compile::CompileScripts))?;
    register_stage(graph, Arc::new(assets::CopyAssets))?;
    register_stage(graph, Arc::new(assets::OptimizeImages))?;
    register_stage(graph, Arc::new(bundle::BundleReferences))?;
    register_stage(graph, Arc::new(bundle::ShimPathRewrite))?;
    register_stage(graph, Arc::new(bundle::Concatenate))?;
    register_stage(graph, Arc::new(minify::MinifyMarkup))?;
    register_stage(graph, Arc::new(minify::MinifyStyles))?;
    register_stage(graph, Arc::new(minify::MinifyScripts))?;
    register_stage(graph, Arc::new(deploy::Publish))?;

    graph.compose_concurrent("lint", &["lint-styles", "lint-scripts"])?;
    graph.compose_concurrent(
        "compile",
        &["compile-markup", "compile-styles", "compile-scripts"],
    )?;
    graph.compose_sequence(
        "build",
        &[
            "clean",
            "compile",
            "copy-assets",
            "bundle-references",
            "shim-path-rewrite",
            "concatenate",
            "minify-markup",
            "minify-styles",
            "minify-scripts",
            "clean-temp",
        ],
    )?;
    graph.compose_sequence("start", &["build", "optimize-images"])?;
    graph.compose_sequence("deploy", &["build", "publish"])?;

    // The serve build keeps the intermediate tree (and the bundle plan in
    // it) alive so watch-triggered increments have something to build on.
    graph.compose_sequence(
        "serve",
        &[
            "clean",
            "compile",
            "copy-assets",
            "bundle-references",
            "shim-path-rewrite",
            "concatenate",
            "minify-markup",
            "minify-styles",
            "minify-scripts",
        ],
    )?;
    graph.compose_sequence(
        "watch-scripts",
        &["lint-scripts", "compile-scripts", "concatenate", "minify-scripts"],
    )?;
    graph.compose_sequence(
        "watch-styles",
        &["lint-styles", "compile-styles", "concatenate", "minify-styles"],
    )?;
    graph.compose_sequence(
        "watch-markup",
        &[
            "compile-markup",
            "bundle-references",
            "shim-path-rewrite",
            "concatenate",
            "minify-markup",
        ],
    )?;

    Ok(())
}

/// Build a graph with everything registered.
pub fn default_graph() -> TaskGraph {
    let mut graph = TaskGraph::new();
    // The built-in registrations use distinct, admitted names; composition
    // over them cannot fail.
    register_all(&mut graph).unwrap_or_else(|e| panic!("built-in graph is inconsistent: {}", e));
    graph
}
