//! Build mode for a single workflow invocation.
//!
//! The mode is fixed when a workflow starts and every stage in that run
//! observes the same value. Production mode disables source maps and enables
//! minification, template caching, and compact style output.

/// Formatting applied to compiled stylesheet output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// Readable, indented output (development)
    Expanded,
    /// Whitespace-stripped output (production)
    Compressed,
}

impl std::fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStyle::Expanded => write!(f, "expanded"),
            OutputStyle::Compressed => write!(f, "compressed"),
        }
    }
}

/// Build mode for one workflow run.
///
/// Constructed once from the two CLI flags and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeContext {
    production: bool,
}

impl ModeContext {
    /// Create a mode from the `--production` flag and its `--prod` alias.
    pub fn from_flags(production: bool, prod: bool) -> Self {
        Self { production: production || prod }
    }

    /// Create a development-mode context.
    pub fn development() -> Self {
        Self { production: false }
    }

    /// Create a production-mode context.
    pub fn production() -> Self {
        Self { production: true }
    }

    /// Whether this run builds production artifacts.
    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Whether compile stages should emit source maps.
    pub fn emit_source_maps(&self) -> bool {
        !self.production
    }

    /// Whether minify stages should actually minify (vs. format).
    pub fn minify(&self) -> bool {
        self.production
    }

    /// Whether the template engine may cache rendered templates.
    pub fn cache_templates(&self) -> bool {
        self.production
    }

    /// Style output formatting for this mode.
    pub fn output_style(&self) -> OutputStyle {
        if self.production {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        }
    }
}

impl std::fmt::Display for ModeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.production {
            write!(f, "production")
        } else {
            write!(f, "development")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags_or_semantics() {
        assert!(!ModeContext::from_flags(false, false).is_production());
        assert!(ModeContext::from_flags(true, false).is_production());
        assert!(ModeContext::from_flags(false, true).is_production());
        assert!(ModeContext::from_flags(true, true).is_production());
    }

    #[test]
    fn test_development_derived_settings() {
        let mode = ModeContext::development();
        assert!(mode.emit_source_maps());
        assert!(!mode.minify());
        assert!(!mode.cache_templates());
        assert_eq!(mode.output_style(), OutputStyle::Expanded);
    }

    #[test]
    fn test_production_derived_settings() {
        let mode = ModeContext::production();
        assert!(!mode.emit_source_maps());
        assert!(mode.minify());
        assert!(mode.cache_templates());
        assert_eq!(mode.output_style(), OutputStyle::Compressed);
    }

    #[test]
    fn test_derived_settings_depend_only_on_is_production() {
        // Both flag combinations that yield production behave identically
        let a = ModeContext::from_flags(true, false);
        let b = ModeContext::from_flags(false, true);
        assert_eq!(a, b);
        assert_eq!(a.emit_source_maps(), b.emit_source_maps());
        assert_eq!(a.output_style(), b.output_style());
    }

    #[test]
    fn test_display() {
        assert_eq!(ModeContext::development().to_string(), "development");
        assert_eq!(ModeContext::production().to_string(), "production");
    }
}
