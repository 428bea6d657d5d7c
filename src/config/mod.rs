//! Project configuration (`pages.toml`)
//!
//! Schema types live in [`schema`], discovery and loading in [`loader`].

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, CliOverrides,
    ConfigError,
};
pub use schema::{
    BundleConfig, DeployConfig, LintConfig, PagesConfig, ProjectConfig, ServeConfig,
    TemplatesConfig, WatchConfig,
};
