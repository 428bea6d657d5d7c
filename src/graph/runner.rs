//! Workflow execution.
//!
//! Sequences run children in order and stop after the first fatal outcome;
//! the report still carries every outcome produced up to that point.
//! Concurrent groups run every child to completion on scoped threads and
//! merge outcomes back in registration order, so a report never depends on
//! thread scheduling.

use std::thread;
use std::time::Instant;

use thiserror::Error;

use super::report::{RunReport, StageOutcome, StageStatus};
use super::{Node, TaskGraph};
use crate::context::BuildContext;
use crate::stages::Stage;

/// Error invoking a workflow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Unknown task '{0}'")]
    UnknownTask(String),
    #[error("Task '{0}' panicked")]
    StagePanicked(String),
}

/// Run a named task (leaf or workflow) and collect the report.
pub fn run_task(graph: &TaskGraph, name: &str, ctx: &BuildContext) -> Result<RunReport, RunError> {
    let started = Instant::now();
    let (outcomes, _keep_going) = execute(graph, name, ctx)?;
    Ok(RunReport {
        workflow: name.to_string(),
        outcomes,
        duration: started.elapsed(),
    })
}

/// Execute one node. The boolean is false once a fatal outcome occurred,
/// which tells an enclosing sequence to stop.
fn execute(
    graph: &TaskGraph,
    name: &str,
    ctx: &BuildContext,
) -> Result<(Vec<StageOutcome>, bool), RunError> {
    let node = graph
        .get(name)
        .ok_or_else(|| RunError::UnknownTask(name.to_string()))?;

    match node {
        Node::Leaf(stage) => Ok(run_leaf(stage.as_ref(), ctx)),
        Node::Sequence(children) => {
            let mut outcomes = Vec::new();
            for child in children {
                let (mut child_outcomes, keep_going) = execute(graph, child, ctx)?;
                outcomes.append(&mut child_outcomes);
                if !keep_going {
                    return Ok((outcomes, false));
                }
            }
            Ok((outcomes, true))
        }
        Node::Concurrent(children) => {
            let results = thread::scope(|scope| {
                let handles: Vec<_> = children
                    .iter()
                    .map(|child| scope.spawn(move || execute(graph, child, ctx)))
                    .collect();
                // Join in spawn order; completion order never shows in the
                // report.
                children
                    .iter()
                    .zip(handles)
                    .map(|(child, h)| match h.join() {
                        Ok(result) => result,
                        Err(_) => Err(RunError::StagePanicked(child.clone())),
                    })
                    .collect::<Vec<_>>()
            });

            let mut outcomes = Vec::new();
            let mut keep_going = true;
            for result in results {
                let (mut child_outcomes, child_ok) = result?;
                outcomes.append(&mut child_outcomes);
                keep_going &= child_ok;
            }
            Ok((outcomes, keep_going))
        }
    }
}

fn run_leaf(stage: &dyn Stage, ctx: &BuildContext) -> (Vec<StageOutcome>, bool) {
    if ctx.verbose {
        println!("  running {}...", stage.name());
    }
    let started = Instant::now();
    let outcome = match stage.run(ctx) {
        Ok(report) => StageOutcome {
            stage: stage.name().to_string(),
            status: if report.failed { StageStatus::Failed } else { StageStatus::Success },
            files_written: report.files_written,
            duration: started.elapsed(),
            diagnostics: report.diagnostics,
        },
        Err(err) => StageOutcome {
            stage: stage.name().to_string(),
            status: StageStatus::Fatal(err.to_string()),
            files_written: 0,
            duration: started.elapsed(),
            diagnostics: Vec::new(),
        },
    };
    let keep_going = !matches!(outcome.status, StageStatus::Fatal(_));
    (vec![outcome], keep_going)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mode::ModeContext;
    use crate::stages::{StageError, StageReport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx() -> BuildContext {
        BuildContext::new(default_config(), "/tmp/none", ModeContext::development())
    }

    struct AlwaysOk(&'static str);

    impl Stage for AlwaysOk {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, _ctx: &BuildContext) -> Result<StageReport, StageError> {
            Ok(StageReport::written(1))
        }
    }

    struct Fatal(&'static str);

    impl Stage for Fatal {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, _ctx: &BuildContext) -> Result<StageReport, StageError> {
            Err(StageError::Tool("boom".to_string()))
        }
    }

    struct Counting {
        label: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Stage for Counting {
        fn name(&self) -> &str {
            self.label
        }
        fn run(&self, _ctx: &BuildContext) -> Result<StageReport, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StageReport::default())
        }
    }

    #[test]
    fn test_unknown_task() {
        let graph = TaskGraph::new();
        assert_eq!(
            run_task(&graph, "nope", &ctx()),
            Err(RunError::UnknownTask("nope".to_string()))
        );
    }

    struct Panicking(&'static str);

    impl Stage for Panicking {
        fn name(&self) -> &str {
            self.0
        }
        fn run(&self, _ctx: &BuildContext) -> Result<StageReport, StageError> {
            panic!("stage blew up");
        }
    }

    #[test]
    fn test_panicked_concurrent_child_is_named() {
        let mut graph = TaskGraph::new();
        graph.register_stage(Arc::new(AlwaysOk("good"))).unwrap();
        graph.register_stage(Arc::new(Panicking("explosive"))).unwrap();
        graph.compose_concurrent("both", &["good", "explosive"]).unwrap();

        let result = run_task(&graph, "both", &ctx());

        assert_eq!(result, Err(RunError::StagePanicked("explosive".to_string())));
    }

    #[test]
    fn test_sequence_stops_after_fatal() {
        let mut graph = TaskGraph::new();
        graph.register_stage(Arc::new(AlwaysOk("first"))).unwrap();
        graph.register_stage(Arc::new(Fatal("second"))).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        graph
            .register_stage(Arc::new(Counting { label: "third", calls: calls.clone() }))
            .unwrap();
        graph.compose_sequence("seq", &["first", "second", "third"]).unwrap();

        let report = run_task(&graph, "seq", &ctx()).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, StageStatus::Success);
        assert!(matches!(report.outcomes[1].status, StageStatus::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!report.success());
    }

    #[test]
    fn test_concurrent_runs_all_despite_fatal() {
        let mut graph = TaskGraph::new();
        let calls = Arc::new(AtomicUsize::new(0));
        graph.register_stage(Arc::new(Fatal("bad"))).unwrap();
        graph
            .register_stage(Arc::new(Counting { label: "good", calls: calls.clone() }))
            .unwrap();
        graph.compose_concurrent("both", &["bad", "good"]).unwrap();

        let report = run_task(&graph, "both", &ctx()).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Merge order is registration order, not completion order.
        assert_eq!(report.outcomes[0].stage, "bad");
        assert_eq!(report.outcomes[1].stage, "good");
    }

    #[test]
    fn test_concurrent_fatal_stops_enclosing_sequence() {
        let mut graph = TaskGraph::new();
        graph.register_stage(Arc::new(Fatal("bad"))).unwrap();
        graph.register_stage(Arc::new(AlwaysOk("good"))).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        graph
            .register_stage(Arc::new(Counting { label: "after", calls: calls.clone() }))
            .unwrap();
        graph.compose_concurrent("group", &["bad", "good"]).unwrap();
        graph.compose_sequence("seq", &["group", "after"]).unwrap();

        let report = run_task(&graph, "seq", &ctx()).unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_report_counts_files() {
        let mut graph = TaskGraph::new();
        graph.register_stage(Arc::new(AlwaysOk("a"))).unwrap();
        graph.register_stage(Arc::new(AlwaysOk("b"))).unwrap();
        graph.compose_sequence("seq", &["a", "b"]).unwrap();

        let report = run_task(&graph, "seq", &ctx()).unwrap();
        assert!(report.success());
        assert_eq!(report.files_written(), 2);
    }
}
