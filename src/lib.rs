//! Pagebuild - build orchestrator for front-end asset trees
//!
//! This library provides functionality to:
//! - Compose named, dependency-ordered workflows from reusable pipeline stages
//! - Compile markup/style/script source trees into a deployable output tree
//! - Re-run the affected slice of the pipeline when watched sources change

pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod fileset;
pub mod graph;
pub mod mode;
pub mod shim;
pub mod stages;
pub mod tools;
pub mod watch;
