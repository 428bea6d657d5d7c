//! Watch mode: map file changes to workflow runs.
//!
//! Rules pair a glob pattern with a workflow name. A debounced filesystem
//! event batch is matched against the rules and each triggered workflow runs
//! once, in rule order. Changes arriving while a run is in flight coalesce
//! into exactly one follow-up run, never one per change.

use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, TryRecvError};
use std::time::Duration;
use thiserror::Error;

use crate::context::BuildContext;
use crate::graph::{run_task, RunReport, TaskGraph};
use crate::tools::DevServerHandle;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    #[error("Unknown workflow '{0}' in watch rule")]
    UnknownWorkflow(String),
}

/// One change-to-workflow mapping.
#[derive(Debug, Clone)]
pub struct WatchRule {
    /// Glob pattern, relative to the project root
    pub pattern: String,
    /// Workflow to run when a changed path matches
    pub workflow: String,
    /// Ask the dev server to reload after the run
    pub reload: bool,
}

impl WatchRule {
    pub fn new(pattern: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), workflow: workflow.into(), reload: true }
    }
}

/// The standard rule set for a project tree.
pub fn default_rules(src: &Path, public: &Path) -> Vec<WatchRule> {
    vec![
        WatchRule::new(format!("{}/**/*.js", src.display()), "watch-scripts"),
        WatchRule::new(format!("{}/**/*.scss", src.display()), "watch-styles"),
        WatchRule::new(format!("{}/**/*.html", src.display()), "watch-markup"),
        WatchRule::new(format!("{}/**/*", public.display()), "copy-assets"),
    ]
}

/// Match a batch of changed paths against the rules.
///
/// Returns the triggered rules in rule order, each at most once, no matter
/// how many changed paths matched it.
pub fn collect_triggers<'a>(
    rules: &'a [WatchRule],
    changed: &[PathBuf],
    project_root: &Path,
) -> Vec<&'a WatchRule> {
    let mut triggered = Vec::new();
    for rule in rules {
        let Ok(pattern) = Pattern::new(&rule.pattern) else {
            continue;
        };
        let hit = changed.iter().any(|path| {
            let relative = path.strip_prefix(project_root).unwrap_or(path);
            pattern.matches_path(relative)
        });
        if hit {
            triggered.push(rule);
        }
    }
    triggered
}

/// Coalesces triggers while a run is in flight.
///
/// Any number of `request` calls during a run collapse into a single
/// follow-up; `complete` reports whether that follow-up is due.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    running: bool,
    pending: bool,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the caller should run now; false when a run is in
    /// flight and the trigger was queued instead.
    pub fn request(&mut self) -> bool {
        if self.running {
            self.pending = true;
            false
        } else {
            self.running = true;
            true
        }
    }

    /// A run finished. Returns true when queued triggers demand one more.
    pub fn complete(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            true
        } else {
            self.running = false;
            false
        }
    }
}

/// Tracks files with errors across runs so recoveries get reported.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a new report, returning the files fixed since last time.
    pub fn update(&mut self, report: &RunReport) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = report
            .outcomes
            .iter()
            .flat_map(|o| &o.diagnostics)
            .filter(|d| d.is_error())
            .map(|d| d.file.clone())
            .collect();

        let mut fixed: Vec<PathBuf> =
            self.files_with_errors.difference(&current).cloned().collect();
        fixed.sort();
        self.files_with_errors = current;
        fixed
    }

    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }
}

fn clear_screen() {
    // ANSI: clear and home
    print!("\x1B[2J\x1B[1;1H");
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60, secs % 60)
}

fn run_triggers(
    graph: &TaskGraph,
    ctx: &BuildContext,
    rules: &[&WatchRule],
    tracker: &mut ErrorTracker,
    server: Option<&dyn DevServerHandle>,
) {
    let mut want_reload = false;
    for rule in rules {
        println!("[{}] Running {}...", timestamp(), rule.workflow);
        match run_task(graph, &rule.workflow, ctx) {
            Ok(report) => {
                for fixed in tracker.update(&report) {
                    if let Some(name) = fixed.file_name() {
                        println!("[{}] Fixed: {}", timestamp(), name.to_string_lossy());
                    }
                }
                if report.success() {
                    println!(
                        "[{}] {} complete ({})",
                        timestamp(),
                        rule.workflow,
                        format_duration(report.duration)
                    );
                    want_reload |= rule.reload;
                } else {
                    print!("{}", report.summary());
                }
            }
            Err(e) => eprintln!("[{}] {}", timestamp(), e),
        }
    }
    if want_reload {
        if let Some(server) = server {
            server.reload();
        }
    }
}

/// Watch the project tree and run triggered workflows until interrupted.
///
/// Every rule's workflow must exist in the graph; this is checked up front
/// so a typo fails at startup, not on the first change.
pub fn watch(
    graph: &TaskGraph,
    ctx: &BuildContext,
    rules: &[WatchRule],
    server: Option<&dyn DevServerHandle>,
) -> Result<(), WatchError> {
    for rule in rules {
        if !graph.contains(&rule.workflow) {
            return Err(WatchError::UnknownWorkflow(rule.workflow.clone()));
        }
    }

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    for root in [ctx.src_dir(), ctx.public_dir()] {
        if root.is_dir() {
            debouncer
                .watcher()
                .watch(&root, RecursiveMode::Recursive)
                .map_err(WatchError::WatchPath)?;
        }
    }

    let mut tracker = ErrorTracker::new();
    let mut queue = TriggerQueue::new();
    println!("[{}] Watching {} for changes...", timestamp(), ctx.src_dir().display());

    loop {
        let events = match rx.recv() {
            Ok(Ok(events)) => events,
            Ok(Err(error)) => {
                eprintln!("[{}] Watch error: {}", timestamp(), error);
                continue;
            }
            Err(e) => return Err(WatchError::ChannelError(e.to_string())),
        };

        let mut changed: Vec<PathBuf> = events
            .iter()
            .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
            .map(|e| e.path.clone())
            .collect();
        if changed.is_empty() {
            continue;
        }

        if !queue.request() {
            continue;
        }

        loop {
            let triggered = collect_triggers(rules, &changed, &ctx.project_root);
            if !triggered.is_empty() {
                for path in &changed {
                    if let Some(name) = path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }
                if ctx.config.watch.clear_screen && atty::is(atty::Stream::Stdout) {
                    clear_screen();
                }
                run_triggers(graph, ctx, &triggered, &mut tracker, server);
                println!(
                    "[{}] Watching {} for changes...",
                    timestamp(),
                    ctx.src_dir().display()
                );
            }

            // Changes that landed mid-run collapse into one follow-up pass.
            changed.clear();
            loop {
                match rx.try_recv() {
                    Ok(Ok(events)) => {
                        changed.extend(
                            events
                                .iter()
                                .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                                .map(|e| e.path.clone()),
                        );
                        if !changed.is_empty() {
                            queue.request();
                        }
                    }
                    Ok(Err(_)) | Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        return Err(WatchError::ChannelError("watcher disconnected".to_string()))
                    }
                }
            }

            if !queue.complete() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::graph::{StageOutcome, StageStatus};

    #[test]
    fn test_collect_triggers_dedupes_in_rule_order() {
        let rules = default_rules(Path::new("src"), Path::new("public"));
        let changed = vec![
            PathBuf::from("/p/src/assets/scripts/a.js"),
            PathBuf::from("/p/src/assets/scripts/b.js"),
            PathBuf::from("/p/src/index.html"),
        ];

        let triggered = collect_triggers(&rules, &changed, Path::new("/p"));

        let names: Vec<&str> = triggered.iter().map(|r| r.workflow.as_str()).collect();
        assert_eq!(names, vec!["watch-scripts", "watch-markup"]);
    }

    #[test]
    fn test_collect_triggers_no_match() {
        let rules = default_rules(Path::new("src"), Path::new("public"));
        let changed = vec![PathBuf::from("/p/notes.txt")];
        assert!(collect_triggers(&rules, &changed, Path::new("/p")).is_empty());
    }

    #[test]
    fn test_trigger_queue_coalesces() {
        let mut queue = TriggerQueue::new();
        assert!(queue.request());

        // Three rapid triggers while running collapse into one follow-up.
        assert!(!queue.request());
        assert!(!queue.request());
        assert!(!queue.request());

        assert!(queue.complete());
        assert!(!queue.complete());

        // Idle again: next trigger runs immediately.
        assert!(queue.request());
    }

    #[test]
    fn test_error_tracker_reports_fixed_files() {
        let mut tracker = ErrorTracker::new();

        let failing = RunReport {
            workflow: "watch-scripts".to_string(),
            outcomes: vec![StageOutcome {
                stage: "lint-scripts".to_string(),
                status: StageStatus::Failed,
                files_written: 0,
                duration: Duration::ZERO,
                diagnostics: vec![Diagnostic::error(
                    PathBuf::from("src/a.js"),
                    "unexpected debugger statement",
                )],
            }],
            duration: Duration::ZERO,
        };
        assert!(tracker.update(&failing).is_empty());
        assert!(tracker.has_errors());

        let clean = RunReport {
            workflow: "watch-scripts".to_string(),
            outcomes: vec![],
            duration: Duration::ZERO,
        };
        let fixed = tracker.update(&clean);
        assert_eq!(fixed, vec![PathBuf::from("src/a.js")]);
        assert!(!tracker.has_errors());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
