//! Configuration loading and discovery for `pages.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::PagesConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse pages.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override dev-server port
    pub port: Option<u16>,
    /// Override browser-open behavior
    pub open: Option<bool>,
    /// Override publish target directory
    pub deploy_target: Option<PathBuf>,
}

/// Find pages.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a pages.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find pages.toml by walking up from a specific directory.
///
/// This is the internal implementation that allows specifying the start
/// directory, useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join("pages.toml");
        if config_path.exists() {
            return Some(config_path);
        }

        // Move to parent directory
        if !current.pop() {
            // Reached root, no config found
            return None;
        }
    }
}

/// Load configuration from a pages.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`] to locate one. If no config file is found, returns the
/// default configuration.
pub fn load_config(path: Option<&Path>) -> Result<PagesConfig, ConfigError> {
    let resolved = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let config = match resolved {
        Some(p) => {
            let content = fs::read_to_string(&p)?;
            toml::from_str(&content)?
        }
        None => default_config(),
    };

    validate_config(&config)?;
    Ok(config)
}

/// Returns the built-in default configuration.
pub fn default_config() -> PagesConfig {
    PagesConfig::default()
}

/// Apply CLI overrides on top of a loaded configuration.
pub fn merge_cli_overrides(config: &mut PagesConfig, overrides: &CliOverrides) {
    if let Some(port) = overrides.port {
        config.serve.port = port;
    }
    if let Some(open) = overrides.open {
        config.serve.open = open;
    }
    if let Some(target) = &overrides.deploy_target {
        config.deploy.target = target.clone();
    }
}

/// Validate cross-field constraints the schema cannot express.
fn validate_config(config: &PagesConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let roots = [
        ("src", &config.project.src),
        ("public", &config.project.public),
        ("temp", &config.project.temp),
        ("dist", &config.project.dist),
    ];
    for (label, path) in &roots {
        if path.as_os_str().is_empty() {
            errors.push(format!("project.{} must not be empty", label));
        }
    }

    // The clean stages delete temp and dist; they must never alias a source root.
    if config.project.temp == config.project.src || config.project.dist == config.project.src {
        errors.push("project.temp and project.dist must differ from project.src".to_string());
    }
    if config.project.temp == config.project.dist {
        errors.push("project.temp and project.dist must differ".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}
