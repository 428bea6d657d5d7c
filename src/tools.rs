//! External collaborator interfaces.
//!
//! The pipeline delegates all lexical work - linting, template rendering,
//! transpiling, style compilation, minification - to the traits defined here,
//! and treats them as opaque: a stage hands a collaborator file content plus
//! configuration and gets transformed content or diagnostics back.
//!
//! The built-in implementations are deliberately simple text-level transforms
//! so the pipeline is fully exercisable without external toolchains. Swapping
//! in real compilers only requires implementing the matching trait.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::mode::OutputStyle;

/// Failure inside a collaborator.
///
/// `Malformed` maps to a per-file compile error (the stage skips the file and
/// continues); `Io` is fatal for the invoking stage.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The source document could not be processed
    #[error("{0}")]
    Malformed(String),
    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which asset family content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Markup,
    Styles,
    Scripts,
}

/// Output of a compile-type collaborator.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Transformed content
    pub content: String,
    /// Source map content, present when requested and supported
    pub source_map: Option<String>,
}

impl CompileOutput {
    fn plain(content: String) -> Self {
        Self { content, source_map: None }
    }
}

/// Checks one source file against a rule set.
pub trait Linter: Send + Sync {
    fn lint(&self, file: &Path, source: &str) -> Vec<Diagnostic>;
}

/// Renders a markup template with a data table.
pub trait TemplateEngine: Send + Sync {
    /// `cache` allows the engine to reuse rendered output for identical
    /// inputs within one process; engines may ignore it.
    fn render(
        &self,
        source: &str,
        data: &BTreeMap<String, String>,
        cache: bool,
    ) -> Result<String, ToolError>;
}

/// Lowers scripts to the target environment.
pub trait Transpiler: Send + Sync {
    fn transpile(
        &self,
        file_name: &str,
        source: &str,
        emit_source_map: bool,
    ) -> Result<CompileOutput, ToolError>;
}

/// Compiles stylesheet sources to CSS.
pub trait StyleCompiler: Send + Sync {
    fn compile(
        &self,
        file_name: &str,
        source: &str,
        style: OutputStyle,
        emit_source_map: bool,
    ) -> Result<CompileOutput, ToolError>;
}

/// Shrinks (or, in development mode, formats) final content.
pub trait Minifier: Send + Sync {
    fn minify(&self, content: &str, kind: AssetKind) -> String;
    fn format(&self, content: &str, kind: AssetKind) -> String;
}

/// Optimizes image bytes for delivery.
pub trait ImageOptimizer: Send + Sync {
    fn optimize(&self, bytes: &[u8]) -> Vec<u8>;
}

/// Handle to a running dev server.
pub trait DevServerHandle: Send + Sync {
    /// Ask connected clients to refresh.
    fn reload(&self);
}

/// Serves a directory and notifies connected clients on change.
pub trait DevServer: Send + Sync {
    fn serve(
        &self,
        root: &Path,
        port: u16,
        open: bool,
    ) -> Result<Box<dyn DevServerHandle>, ToolError>;
}

/// Uploads a directory to a remote target.
pub trait Publisher: Send + Sync {
    /// Returns the number of files published.
    fn publish(&self, source_dir: &Path, target: &Path) -> Result<usize, ToolError>;
}

/// The set of collaborators shared by every stage in a run.
pub struct Toolchain {
    pub script_linter: Box<dyn Linter>,
    pub style_linter: Box<dyn Linter>,
    pub templates: Box<dyn TemplateEngine>,
    pub transpiler: Box<dyn Transpiler>,
    pub styles: Box<dyn StyleCompiler>,
    pub minifier: Box<dyn Minifier>,
    pub images: Box<dyn ImageOptimizer>,
    pub dev_server: Box<dyn DevServer>,
    pub publisher: Box<dyn Publisher>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            script_linter: Box::new(BuiltinScriptLinter),
            style_linter: Box::new(BuiltinStyleLinter),
            templates: Box::new(BuiltinTemplateEngine::new()),
            transpiler: Box::new(BuiltinTranspiler),
            styles: Box::new(BuiltinStyleCompiler),
            minifier: Box::new(BuiltinMinifier),
            images: Box::new(PassthroughImageOptimizer),
            dev_server: Box::new(ConsoleDevServer),
            publisher: Box::new(DirectoryPublisher),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in implementations
// ---------------------------------------------------------------------------

/// Flags `debugger` statements as errors and TODO markers as warnings.
pub struct BuiltinScriptLinter;

impl Linter for BuiltinScriptLinter {
    fn lint(&self, file: &Path, source: &str) -> Vec<Diagnostic> {
        let mut findings = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("debugger") {
                findings.push(
                    Diagnostic::error(file, "unexpected debugger statement").with_line(idx + 1),
                );
            }
            if line.contains("TODO") {
                findings.push(Diagnostic::warning(file, "unresolved TODO").with_line(idx + 1));
            }
        }
        findings
    }
}

/// Flags unbalanced braces as errors and `!important` as warnings.
pub struct BuiltinStyleLinter;

impl Linter for BuiltinStyleLinter {
    fn lint(&self, file: &Path, source: &str) -> Vec<Diagnostic> {
        let mut findings = Vec::new();
        let mut depth: i64 = 0;
        for (idx, line) in source.lines().enumerate() {
            for ch in line.chars() {
                match ch {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    findings.push(Diagnostic::error(file, "unbalanced braces").with_line(idx + 1));
                    depth = 0;
                }
            }
            if line.contains("!important") {
                findings.push(Diagnostic::warning(file, "avoid !important").with_line(idx + 1));
            }
        }
        if depth > 0 {
            findings.push(Diagnostic::error(file, "unclosed block"));
        }
        findings
    }
}

/// Substitutes `{{ key }}` placeholders from the data table.
pub struct BuiltinTemplateEngine {
    placeholder: Regex,
    cache: Mutex<BTreeMap<String, String>>,
}

impl BuiltinTemplateEngine {
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid regex"),
            cache: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for BuiltinTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for BuiltinTemplateEngine {
    fn render(
        &self,
        source: &str,
        data: &BTreeMap<String, String>,
        cache: bool,
    ) -> Result<String, ToolError> {
        if cache {
            if let Some(hit) = self.cache.lock().expect("cache lock").get(source) {
                return Ok(hit.clone());
            }
        }

        // An opening marker without a closing one is a malformed document.
        let stripped = self.placeholder.replace_all(source, "");
        if stripped.contains("{{") {
            return Err(ToolError::Malformed("unclosed template placeholder".to_string()));
        }

        let mut missing = None;
        let rendered = self
            .placeholder
            .replace_all(source, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                match data.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        missing.get_or_insert_with(|| key.to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        if let Some(key) = missing {
            return Err(ToolError::Malformed(format!("unknown template variable '{}'", key)));
        }

        if cache {
            self.cache.lock().expect("cache lock").insert(source.to_string(), rendered.clone());
        }
        Ok(rendered)
    }
}

/// Downlevels `const`/`let` declarations to `var`.
pub struct BuiltinTranspiler;

impl Transpiler for BuiltinTranspiler {
    fn transpile(
        &self,
        file_name: &str,
        source: &str,
        emit_source_map: bool,
    ) -> Result<CompileOutput, ToolError> {
        let decl = Regex::new(r"\b(const|let)\s").expect("valid regex");
        let mut content = decl.replace_all(source, "var ").into_owned();

        if emit_source_map {
            let map = stub_source_map(file_name);
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("//# sourceMappingURL={}.map\n", file_name));
            return Ok(CompileOutput { content, source_map: Some(map) });
        }
        Ok(CompileOutput::plain(content))
    }
}

/// Resolves `$variable` declarations, strips `//` comments, and formats
/// output per the requested style.
pub struct BuiltinStyleCompiler;

impl StyleCompiler for BuiltinStyleCompiler {
    fn compile(
        &self,
        file_name: &str,
        source: &str,
        style: OutputStyle,
        emit_source_map: bool,
    ) -> Result<CompileOutput, ToolError> {
        let opens = source.matches('{').count();
        let closes = source.matches('}').count();
        if opens != closes {
            return Err(ToolError::Malformed("unbalanced braces".to_string()));
        }

        let var_decl = Regex::new(r"^\s*\$([A-Za-z0-9_-]+)\s*:\s*(.+?);\s*$").expect("valid regex");
        let mut variables: BTreeMap<String, String> = BTreeMap::new();
        let mut body_lines: Vec<String> = Vec::new();

        for line in source.lines() {
            let line = match line.find("//") {
                Some(pos) => &line[..pos],
                None => line,
            };
            if let Some(caps) = var_decl.captures(line) {
                variables.insert(caps[1].to_string(), caps[2].trim().to_string());
                continue;
            }
            if !line.trim().is_empty() {
                body_lines.push(line.to_string());
            }
        }

        let mut body = body_lines.join("\n");
        // Longest name first so `$base-dark` is not clobbered by `$base`.
        let mut names: Vec<&String> = variables.keys().collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        for name in names {
            body = body.replace(&format!("${}", name), &variables[name]);
        }

        let mut content = match style {
            OutputStyle::Expanded => {
                if body.is_empty() || body.ends_with('\n') {
                    body
                } else {
                    format!("{}\n", body)
                }
            }
            OutputStyle::Compressed => {
                let collapsed: Vec<&str> =
                    body.split_whitespace().collect();
                collapsed.join(" ").replace("{ ", "{").replace(" }", "}").replace("; ", ";")
            }
        };

        if emit_source_map {
            let map = stub_source_map(file_name);
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&format!("/*# sourceMappingURL={}.map */\n", file_name));
            return Ok(CompileOutput { content, source_map: Some(map) });
        }
        Ok(CompileOutput::plain(content))
    }
}

fn stub_source_map(file_name: &str) -> String {
    serde_json::json!({
        "version": 3,
        "file": file_name,
        "sources": [file_name],
        "mappings": "",
    })
    .to_string()
}

/// Collapses whitespace and strips comments when minifying; passes content
/// through unchanged when formatting.
pub struct BuiltinMinifier;

impl Minifier for BuiltinMinifier {
    fn minify(&self, content: &str, kind: AssetKind) -> String {
        let stripped = match kind {
            AssetKind::Markup => {
                let comments = Regex::new(r"(?s)<!--.*?-->").expect("valid regex");
                comments.replace_all(content, "").into_owned()
            }
            AssetKind::Styles => {
                let comments = Regex::new(r"(?s)/\*.*?\*/").expect("valid regex");
                comments.replace_all(content, "").into_owned()
            }
            AssetKind::Scripts => {
                let block = Regex::new(r"(?s)/\*.*?\*/").expect("valid regex");
                let line = Regex::new(r"(?m)^\s*//.*$").expect("valid regex");
                line.replace_all(&block.replace_all(content, ""), "").into_owned()
            }
        };
        let words: Vec<&str> = stripped.split_whitespace().collect();
        let mut out = words.join(" ");
        if kind == AssetKind::Markup {
            out = out.replace("> <", "><");
        }
        out
    }

    fn format(&self, content: &str, _kind: AssetKind) -> String {
        content.to_string()
    }
}

/// No-op image optimizer; real projects plug in an encoder here.
pub struct PassthroughImageOptimizer;

impl ImageOptimizer for PassthroughImageOptimizer {
    fn optimize(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }
}

/// Logs serve/reload events to the console instead of opening sockets.
pub struct ConsoleDevServer;

struct ConsoleHandle;

impl DevServerHandle for ConsoleHandle {
    fn reload(&self) {
        println!("Reloading connected clients...");
    }
}

impl DevServer for ConsoleDevServer {
    fn serve(
        &self,
        root: &Path,
        port: u16,
        open: bool,
    ) -> Result<Box<dyn DevServerHandle>, ToolError> {
        println!("Serving {} at http://localhost:{}", root.display(), port);
        if open {
            println!("Opening http://localhost:{} in the browser", port);
        }
        Ok(Box::new(ConsoleHandle))
    }
}

/// Publishes by copying the output tree into a target directory.
pub struct DirectoryPublisher;

impl Publisher for DirectoryPublisher {
    fn publish(&self, source_dir: &Path, target: &Path) -> Result<usize, ToolError> {
        copy_tree(source_dir, target)
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, ToolError> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }
    Ok(copied)
}
