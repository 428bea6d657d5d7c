//! Reference bundling.
//!
//! Markup in the intermediate tree declares bundles with comment markers:
//!
//! ```html
//! <!-- build:js assets/scripts/app.js -->
//! <script src="assets/scripts/main.js"></script>
//! <script src="/node_modules/jquery/dist/jquery.js"></script>
//! <!-- endbuild -->
//! ```
//!
//! Three stages split the work and hand off through a plan file under temp,
//! so each remains restartable and the filesystem stays the only channel:
//!
//! - [`BundleReferences`] scans markup, records the plan, and collapses each
//!   marker block to a single reference to the bundle output.
//! - [`ShimPathRewrite`] fixes vendor inputs in the plan (see [`crate::shim`]).
//! - [`Concatenate`] reads the plan and writes each bundle into dist.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Stage, StageError, StageReport};
use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::fileset::FileSet;
use crate::shim;

/// File name of the persisted plan, relative to the intermediate tree.
pub const PLAN_FILE: &str = ".bundle-plan.json";

/// Asset family a bundle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Js,
    Css,
}

/// One output bundle: where it goes and what goes into it, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Output path relative to dist
    pub dest: PathBuf,
    pub kind: BundleKind,
    /// Input paths relative to the project root, in document order
    pub inputs: Vec<PathBuf>,
}

/// The full set of bundles discovered in one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlePlan {
    pub bundles: Vec<Bundle>,
}

impl BundlePlan {
    pub fn load(temp_dir: &Path) -> Result<Option<Self>, StageError> {
        let path = temp_dir.join(PLAN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let plan = serde_json::from_str(&content)
            .map_err(|e| StageError::Tool(format!("corrupt bundle plan: {}", e)))?;
        Ok(Some(plan))
    }

    pub fn save(&self, temp_dir: &Path) -> Result<(), StageError> {
        fs::create_dir_all(temp_dir)?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StageError::Tool(format!("unencodable bundle plan: {}", e)))?;
        fs::write(temp_dir.join(PLAN_FILE), content)?;
        Ok(())
    }
}

struct Markers {
    block: Regex,
    reference: Regex,
}

impl Markers {
    fn new() -> Self {
        Self {
            block: Regex::new(r"(?s)<!--\s*build:(js|css)\s+(\S+)\s*-->(.*?)<!--\s*endbuild\s*-->")
                .expect("valid regex"),
            reference: Regex::new(r#"(?:src|href)\s*=\s*["']([^"']+)["']"#).expect("valid regex"),
        }
    }
}

/// Scans built markup for bundle markers and writes the plan.
pub struct BundleReferences;

impl Stage for BundleReferences {
    fn name(&self) -> &str {
        "bundle-references"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let temp_rel = &ctx.config.project.temp;
        let set = FileSet::new(
            format!("{}/**/*.html", temp_rel.display()),
            temp_rel.clone(),
            temp_rel.clone(),
        );

        let markers = Markers::new();
        let mut plan = BundlePlan::default();
        let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
        let mut rewritten = 0;

        for mapping in set.resolve(&ctx.project_root)? {
            let content = fs::read_to_string(&mapping.source)?;
            let mut changed = false;

            let replaced = markers
                .block
                .replace_all(&content, |caps: &regex::Captures<'_>| {
                    changed = true;
                    let kind = match &caps[1] {
                        "js" => BundleKind::Js,
                        _ => BundleKind::Css,
                    };
                    let dest = PathBuf::from(caps[2].trim_start_matches('/'));

                    // The same bundle may appear on several pages; the first
                    // occurrence defines its inputs.
                    if seen.insert(dest.clone()) {
                        let inputs = markers
                            .reference
                            .captures_iter(&caps[3])
                            .map(|r| temp_rel.join(r[1].trim_start_matches('/')))
                            .collect();
                        plan.bundles.push(Bundle { dest: dest.clone(), kind, inputs });
                    }

                    match kind {
                        BundleKind::Js => format!(r#"<script src="{}"></script>"#, dest.display()),
                        BundleKind::Css => {
                            format!(r#"<link rel="stylesheet" href="{}">"#, dest.display())
                        }
                    }
                })
                .into_owned();

            if changed {
                fs::write(&mapping.source, replaced)?;
                rewritten += 1;
            }
        }

        plan.save(&ctx.temp_dir())?;
        Ok(StageReport::written(rewritten + 1))
    }
}

/// Applies the vendor-path fixup to the persisted plan.
pub struct ShimPathRewrite;

impl Stage for ShimPathRewrite {
    fn name(&self) -> &str {
        "shim-path-rewrite"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let temp_dir = ctx.temp_dir();
        let Some(mut plan) = BundlePlan::load(&temp_dir)? else {
            return Ok(StageReport::default());
        };

        let temp_rel = &ctx.config.project.temp;
        let markers = &ctx.config.bundle.vendor_markers;
        for bundle in &mut plan.bundles {
            shim::rewrite_vendor_paths(&mut bundle.inputs, temp_rel, markers);
        }

        plan.save(&temp_dir)?;
        Ok(StageReport::written(1))
    }
}

/// Concatenates plan inputs into dist, preserving document order.
pub struct Concatenate;

impl Stage for Concatenate {
    fn name(&self) -> &str {
        "concatenate"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageReport, StageError> {
        let Some(plan) = BundlePlan::load(&ctx.temp_dir())? else {
            return Ok(StageReport::default());
        };

        let mut report = StageReport::default();
        'bundles: for bundle in &plan.bundles {
            let mut parts = Vec::with_capacity(bundle.inputs.len());
            for input in &bundle.inputs {
                let path = ctx.resolve_path(input);
                match fs::read_to_string(&path) {
                    Ok(content) => parts.push(content),
                    Err(e) => {
                        report
                            .diagnostics
                            .push(Diagnostic::error(&path, format!("missing bundle input: {}", e)));
                        report.failed = true;
                        continue 'bundles;
                    }
                }
            }

            let dest = ctx.dist_dir().join(&bundle.dest);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut joined = parts.join("\n");
            if !joined.ends_with('\n') {
                joined.push('\n');
            }
            fs::write(&dest, joined)?;
            report.files_written += 1;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mode::ModeContext;
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><body>
<!-- build:css assets/styles/app.css -->
<link rel="stylesheet" href="assets/styles/main.css">
<!-- endbuild -->
<!-- build:js assets/scripts/app.js -->
<script src="/node_modules/jquery/dist/jquery.js"></script>
<script src="assets/scripts/main.js"></script>
<!-- endbuild -->
</body></html>
"#;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn ctx(root: &Path) -> BuildContext {
        BuildContext::new(default_config(), root, ModeContext::development())
    }

    #[test]
    fn test_scan_records_plan_and_collapses_blocks() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "temp/index.html", PAGE);

        BundleReferences.run(&ctx(temp.path())).unwrap();

        let plan = BundlePlan::load(&temp.path().join("temp")).unwrap().unwrap();
        assert_eq!(plan.bundles.len(), 2);

        let js = plan.bundles.iter().find(|b| b.kind == BundleKind::Js).unwrap();
        assert_eq!(js.dest, PathBuf::from("assets/scripts/app.js"));
        // Inputs keep document order: vendor before local.
        assert_eq!(js.inputs[0], PathBuf::from("temp/node_modules/jquery/dist/jquery.js"));
        assert_eq!(js.inputs[1], PathBuf::from("temp/assets/scripts/main.js"));

        let page = fs::read_to_string(temp.path().join("temp/index.html")).unwrap();
        assert!(!page.contains("build:"));
        assert!(page.contains(r#"<script src="assets/scripts/app.js"></script>"#));
        assert!(page.contains(r#"<link rel="stylesheet" href="assets/styles/app.css">"#));
    }

    #[test]
    fn test_shared_bundle_across_pages_recorded_once() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "temp/index.html", PAGE);
        write(temp.path(), "temp/about.html", PAGE);

        BundleReferences.run(&ctx(temp.path())).unwrap();

        let plan = BundlePlan::load(&temp.path().join("temp")).unwrap().unwrap();
        assert_eq!(plan.bundles.len(), 2);
    }

    #[test]
    fn test_rewrite_strips_temp_from_vendor_only() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "temp/index.html", PAGE);
        let ctx = ctx(temp.path());

        BundleReferences.run(&ctx).unwrap();
        ShimPathRewrite.run(&ctx).unwrap();

        let plan = BundlePlan::load(&temp.path().join("temp")).unwrap().unwrap();
        let js = plan.bundles.iter().find(|b| b.kind == BundleKind::Js).unwrap();
        assert_eq!(js.inputs[0], PathBuf::from("node_modules/jquery/dist/jquery.js"));
        assert_eq!(js.inputs[1], PathBuf::from("temp/assets/scripts/main.js"));
    }

    #[test]
    fn test_concatenate_joins_in_plan_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "temp/index.html", PAGE);
        write(temp.path(), "node_modules/jquery/dist/jquery.js", "var jq = 1;\n");
        write(temp.path(), "temp/assets/scripts/main.js", "var app = 2;\n");
        write(temp.path(), "temp/assets/styles/main.css", "body{}\n");
        let ctx = ctx(temp.path());

        BundleReferences.run(&ctx).unwrap();
        ShimPathRewrite.run(&ctx).unwrap();
        let report = Concatenate.run(&ctx).unwrap();

        assert_eq!(report.files_written, 2);
        let out = fs::read_to_string(temp.path().join("dist/assets/scripts/app.js")).unwrap();
        let jq = out.find("var jq").unwrap();
        let app = out.find("var app").unwrap();
        assert!(jq < app);
    }

    #[test]
    fn test_missing_input_fails_that_bundle_only() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "temp/index.html", PAGE);
        // Styles input exists, the script inputs do not.
        write(temp.path(), "temp/assets/styles/main.css", "body{}\n");
        let ctx = ctx(temp.path());

        BundleReferences.run(&ctx).unwrap();
        ShimPathRewrite.run(&ctx).unwrap();
        let report = Concatenate.run(&ctx).unwrap();

        assert!(report.failed);
        assert_eq!(report.files_written, 1);
        assert!(temp.path().join("dist/assets/styles/app.css").exists());
        assert!(!temp.path().join("dist/assets/scripts/app.js").exists());
    }

    #[test]
    fn test_concatenate_without_plan_is_noop() {
        let temp = TempDir::new().unwrap();
        let report = Concatenate.run(&ctx(temp.path())).unwrap();
        assert_eq!(report.files_written, 0);
        assert!(!report.failed);
    }
}
