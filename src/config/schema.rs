//! Configuration schema types for `pages.toml`
//!
//! Defines the structure and defaults for pagebuild project configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for a pagebuild project.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PagesConfig {
    /// Project metadata and tree layout
    pub project: ProjectConfig,
    /// Data made available to markup templates
    pub templates: TemplatesConfig,
    /// Lint policy
    pub lint: LintConfig,
    /// Bundle-reference resolution settings
    pub bundle: BundleConfig,
    /// Watch-mode settings
    pub watch: WatchConfig,
    /// Dev-server settings
    pub serve: ServeConfig,
    /// Publish settings
    pub deploy: DeployConfig,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Source tree root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Static files copied verbatim into the output tree
    #[serde(default = "default_public")]
    pub public: PathBuf,
    /// Intermediate tree, discarded after a build
    #[serde(default = "default_temp")]
    pub temp: PathBuf,
    /// Final output tree
    #[serde(default = "default_dist")]
    pub dist: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            src: default_src(),
            public: default_public(),
            temp: default_temp(),
            dist: default_dist(),
        }
    }
}

fn default_name() -> String {
    "pages".to_string()
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_public() -> PathBuf {
    PathBuf::from("public")
}

fn default_temp() -> PathBuf {
    PathBuf::from("temp")
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

/// Template data passed to the markup compiler.
///
/// A BTreeMap keeps substitution order stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Key/value pairs substituted into `{{ key }}` placeholders
    pub data: BTreeMap<String, String>,
}

/// Lint policy section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Fail the lint stage when an error-severity finding is reported.
    /// Warnings never fail the stage.
    pub fail_on_error: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self { fail_on_error: true }
    }
}

/// Bundle-reference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Substrings identifying third-party inputs that live outside the
    /// intermediate tree and are read from their original location.
    pub vendor_markers: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self { vendor_markers: vec!["node_modules".to_string()] }
    }
}

/// Watch-mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window for filesystem events, in milliseconds
    pub debounce_ms: u64,
    /// Clear the terminal before each rebuild
    pub clear_screen: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Dev-server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Port the dev server listens on
    pub port: u16,
    /// Open a browser when the server starts
    pub open: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { port: 2080, open: false }
    }
}

/// Publish settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Directory the built output tree is published into
    pub target: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self { target: PathBuf::from(".deploy") }
    }
}
