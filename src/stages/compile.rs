//! Source compilation into the intermediate tree.
//!
//! The three compile stages share a shape: resolve a file set from the
//! source tree, transform each file through a collaborator, write the
//! result under temp. Files are independent, so each stage fans out with
//! rayon and a malformed file only costs that one output; the rest of the
//! set still compiles.

use rayon::prelude::*;
use std::fs;
use std::path::Path;

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::fileset::{FileMapping, FileSet};
use crate::tools::ToolError;

/// Per-file compile result folded into the stage report.
enum FileResult {
    Written(usize),
    Skipped(Diagnostic),
}

fn write_output(dest: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, content)
}

fn compile_set<F>(mappings: &[FileMapping], per_file: F) -> Result<StageReport, StageError>
where
    F: Fn(&FileMapping, &str) -> Result<usize, ToolError> + Sync,
{
    let results: Vec<Result<FileResult, StageError>> = mappings
        .par_iter()
        .map(|mapping| {
            let source = fs::read_to_string(&mapping.source)?;
            match per_file(mapping, &source) {
                Ok(written) => Ok(FileResult::Written(written)),
                Err(ToolError::Malformed(message)) => {
                    Ok(FileResult::Skipped(Diagnostic::error(&mapping.source, message)))
                }
                Err(ToolError::Io(e)) => Err(StageError::Io(e)),
            }
        })
        .collect();

    let mut report = StageReport::default();
    for result in results {
        match result? {
            FileResult::Written(count) => report.files_written += count,
            FileResult::Skipped(diag) => {
                report.diagnostics.push(diag);
                report.failed = true;
            }
        }
    }
    // Parallel collection order follows the (sorted) mapping order, but sort
    // again so the report never depends on rayon internals.
    report.diagnostics.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(report)
}

/// Renders markup templates from src into temp.
pub struct CompileMarkup;

impl Stage for CompileMarkup {
    fn name(&self) -> &str {
        "compile-markup"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = &ctx.config.project.src;
        let set = FileSet::new(
            format!("{}/**/*.html", src.display()),
            src.clone(),
            ctx.config.project.temp.clone(),
        );
        let mappings = set.resolve(&ctx.project_root)?;

        let data = &ctx.config.templates.data;
        let cache = ctx.mode.cache_templates();
        compile_set(&mappings, |mapping, source| {
            let rendered = ctx.toolchain.templates.render(source, data, cache)?;
            write_output(&mapping.dest, &rendered)?;
            Ok(1)
        })
    }
}

/// Compiles stylesheets from src into temp as CSS.
///
/// Partials (file names starting with `_`) are imported by other sheets and
/// never produce their own output.
pub struct CompileStyles;

impl Stage for CompileStyles {
    fn name(&self) -> &str {
        "compile-styles"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = &ctx.config.project.src;
        let set = FileSet::new(
            format!("{}/**/*.scss", src.display()),
            src.clone(),
            ctx.config.project.temp.clone(),
        )
        .with_rewrite_ext("css");
        let mappings: Vec<FileMapping> = set
            .resolve(&ctx.project_root)?
            .into_iter()
            .filter(|m| !is_partial(&m.source))
            .collect();

        let style = ctx.mode.output_style();
        let emit_map = ctx.mode.emit_source_maps();
        compile_set(&mappings, |mapping, source| {
            let name = file_name(&mapping.dest);
            let output = ctx.toolchain.styles.compile(&name, source, style, emit_map)?;
            write_output(&mapping.dest, &output.content)?;
            if let Some(map) = output.source_map {
                write_output(&map_path(&mapping.dest), &map)?;
                return Ok(2);
            }
            Ok(1)
        })
    }
}

/// Transpiles scripts from src into temp.
pub struct CompileScripts;

impl Stage for CompileScripts {
    fn name(&self) -> &str {
        "compile-scripts"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let src = &ctx.config.project.src;
        let set = FileSet::new(
            format!("{}/**/*.js", src.display()),
            src.clone(),
            ctx.config.project.temp.clone(),
        );
        let mappings = set.resolve(&ctx.project_root)?;

        let emit_map = ctx.mode.emit_source_maps();
        compile_set(&mappings, |mapping, source| {
            let name = file_name(&mapping.dest);
            let output = ctx.toolchain.transpiler.transpile(&name, source, emit_map)?;
            write_output(&mapping.dest, &output.content)?;
            if let Some(map) = output.source_map {
                write_output(&map_path(&mapping.dest), &map)?;
                return Ok(2);
            }
            Ok(1)
        })
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('_'))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn map_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".map");
    name.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mode::ModeContext;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn dev_ctx(root: &Path) -> BuildContext {
        BuildContext::new(default_config(), root, ModeContext::development())
    }

    fn prod_ctx(root: &Path) -> BuildContext {
        BuildContext::new(default_config(), root, ModeContext::production())
    }

    #[test]
    fn test_markup_renders_template_data() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/index.html", "<title>{{ title }}</title>");

        let mut config = default_config();
        config.templates.data.insert("title".to_string(), "Home".to_string());
        let ctx = BuildContext::new(config, temp.path(), ModeContext::development());

        let report = CompileMarkup.run(&ctx).unwrap();
        assert_eq!(report.files_written, 1);
        let out = fs::read_to_string(temp.path().join("temp/index.html")).unwrap();
        assert_eq!(out, "<title>Home</title>");
    }

    #[test]
    fn test_markup_malformed_file_is_isolated() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/bad.html", "{{ broken");
        write(temp.path(), "src/good.html", "<p>fine</p>");

        let report = CompileMarkup.run(&dev_ctx(temp.path())).unwrap();

        assert!(report.failed);
        assert_eq!(report.files_written, 1);
        assert_eq!(report.error_count(), 1);
        assert!(temp.path().join("temp/good.html").exists());
        assert!(!temp.path().join("temp/bad.html").exists());
    }

    #[test]
    fn test_styles_rewrite_extension_and_skip_partials() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/styles/main.scss", "$c: red;\nbody { color: $c; }\n");
        write(temp.path(), "src/assets/styles/_vars.scss", "$unused: 1;\n");

        let report = CompileStyles.run(&prod_ctx(temp.path())).unwrap();

        assert_eq!(report.files_written, 1);
        assert!(temp.path().join("temp/assets/styles/main.css").exists());
        assert!(!temp.path().join("temp/assets/styles/_vars.css").exists());
    }

    #[test]
    fn test_scripts_dev_mode_emits_source_map() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/scripts/main.js", "const a = 1;\n");

        let report = CompileScripts.run(&dev_ctx(temp.path())).unwrap();

        assert_eq!(report.files_written, 2);
        let out = fs::read_to_string(temp.path().join("temp/assets/scripts/main.js")).unwrap();
        assert!(out.starts_with("var a = 1;"));
        assert!(out.contains("sourceMappingURL"));
        assert!(temp.path().join("temp/assets/scripts/main.js.map").exists());
    }

    #[test]
    fn test_scripts_prod_mode_has_no_source_map() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/scripts/main.js", "const a = 1;\n");

        let report = CompileScripts.run(&prod_ctx(temp.path())).unwrap();

        assert_eq!(report.files_written, 1);
        let out = fs::read_to_string(temp.path().join("temp/assets/scripts/main.js")).unwrap();
        assert!(!out.contains("sourceMappingURL"));
        assert!(!temp.path().join("temp/assets/scripts/main.js.map").exists());
    }
}
