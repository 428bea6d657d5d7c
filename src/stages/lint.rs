//! Source linting.
//!
//! Linters read from the source tree and write nothing; their findings go
//! into the stage report as diagnostics. Whether error-severity findings
//! fail the stage is a policy decision (`lint.fail_on_error`); warnings
//! never do.

use rayon::prelude::*;
use std::fs;

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::fileset::FileSet;
use crate::tools::Linter;

fn lint_fileset(
    ctx: &BuildContext,
    set: &FileSet,
    linter: &dyn Linter,
) -> Result<StageReport, StageError> {
    let mappings = set.resolve(&ctx.project_root)?;

    let diagnostics: Vec<Diagnostic> = mappings
        .par_iter()
        .map(|mapping| match fs::read_to_string(&mapping.source) {
            Ok(source) => linter.lint(&mapping.source, &source),
            Err(e) => vec![Diagnostic::error(&mapping.source, format!("unreadable: {}", e))],
        })
        .flatten()
        .collect();

    let failed = ctx.config.lint.fail_on_error && diagnostics.iter().any(|d| d.is_error());
    Ok(StageReport { files_written: 0, diagnostics, failed })
}

/// Lints every script in the source tree.
pub struct LintScripts;

impl Stage for LintScripts {
    fn name(&self) -> &str {
        "lint-scripts"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = ctx.config.project.src.clone();
        let set = FileSet::new(
            format!("{}/**/*.js", src.display()),
            src,
            ctx.config.project.temp.clone(),
        );
        lint_fileset(ctx, &set, ctx.toolchain.script_linter.as_ref())
    }
}

/// Lints every stylesheet in the source tree.
pub struct LintStyles;

impl Stage for LintStyles {
    fn name(&self) -> &str {
        "lint-styles"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = ctx.config.project.src.clone();
        let set = FileSet::new(
            format!("{}/**/*.scss", src.display()),
            src,
            ctx.config.project.temp.clone(),
        );
        lint_fileset(ctx, &set, ctx.toolchain.style_linter.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mode::ModeContext;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn ctx(root: &Path) -> BuildContext {
        BuildContext::new(default_config(), root, ModeContext::development())
    }

    #[test]
    fn test_clean_scripts_pass() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/scripts/main.js", "var a = 1;\n");

        let report = LintScripts.run(&ctx(temp.path())).unwrap();
        assert!(!report.failed);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_debugger_fails_stage() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/scripts/main.js", "debugger;\n");

        let report = LintScripts.run(&ctx(temp.path())).unwrap();
        assert!(report.failed);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_warnings_never_fail_stage() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/styles/main.scss", "a { color: red !important; }\n");

        let report = LintStyles.run(&ctx(temp.path())).unwrap();
        assert!(!report.failed);
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn test_fail_on_error_policy_off() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/scripts/main.js", "debugger;\n");

        let mut config = default_config();
        config.lint.fail_on_error = false;
        let ctx = BuildContext::new(config, temp.path(), ModeContext::development());

        let report = LintScripts.run(&ctx).unwrap();
        assert!(!report.failed);
        assert_eq!(report.error_count(), 1);
    }
}
