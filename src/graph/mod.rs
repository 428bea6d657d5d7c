//! Task graph composition.
//!
//! Workflows are built from named nodes: a leaf wraps one [`Stage`], a
//! sequence runs children in order, a concurrent node runs children in
//! parallel. Composition only accepts children that are already registered,
//! so a finished graph is acyclic by construction and every structural
//! mistake surfaces at registration time.

pub mod report;
pub mod runner;

pub use report::{RunReport, StageOutcome, StageStatus};
pub use runner::{run_task, RunError};

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::stages::Stage;

/// Structural error raised while building a graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositionError {
    /// A node with this name already exists
    #[error("Task '{0}' is already registered")]
    DuplicateName(String),
    /// A composed node referenced a child that does not exist yet
    #[error("Task '{parent}' references unknown child '{child}'")]
    UnknownChild { parent: String, child: String },
    /// A composed node listed no children
    #[error("Task '{0}' has no children")]
    Empty(String),
}

/// One node in the graph.
#[derive(Clone)]
pub enum Node {
    /// A single stage
    Leaf(Arc<dyn Stage>),
    /// Children run one after another; a failure stops the rest
    Sequence(Vec<String>),
    /// Children run in parallel; all run to completion
    Concurrent(Vec<String>),
}

/// A registry of named, composable tasks.
#[derive(Default)]
pub struct TaskGraph {
    nodes: BTreeMap<String, Node>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf node under the stage's own name.
    pub fn register_stage(&mut self, stage: Arc<dyn Stage>) -> Result<(), CompositionError> {
        let name = stage.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(CompositionError::DuplicateName(name));
        }
        self.nodes.insert(name, Node::Leaf(stage));
        Ok(())
    }

    /// Register a sequence over existing nodes.
    pub fn compose_sequence(
        &mut self,
        name: &str,
        children: &[&str],
    ) -> Result<(), CompositionError> {
        let children = self.check_children(name, children)?;
        self.nodes.insert(name.to_string(), Node::Sequence(children));
        Ok(())
    }

    /// Register a concurrent group over existing nodes.
    pub fn compose_concurrent(
        &mut self,
        name: &str,
        children: &[&str],
    ) -> Result<(), CompositionError> {
        let children = self.check_children(name, children)?;
        self.nodes.insert(name.to_string(), Node::Concurrent(children));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Registered node names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    fn check_children(
        &self,
        name: &str,
        children: &[&str],
    ) -> Result<Vec<String>, CompositionError> {
        if self.nodes.contains_key(name) {
            return Err(CompositionError::DuplicateName(name.to_string()));
        }
        if children.is_empty() {
            return Err(CompositionError::Empty(name.to_string()));
        }
        for child in children {
            // A child must already be registered, which also rules out
            // self-reference and cycles.
            if !self.nodes.contains_key(*child) {
                return Err(CompositionError::UnknownChild {
                    parent: name.to_string(),
                    child: (*child).to_string(),
                });
            }
        }
        Ok(children.iter().map(|c| (*c).to_string()).collect())
    }
}
