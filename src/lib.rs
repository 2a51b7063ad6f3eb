//! Kiln - a build automation engine
//!
//! Kiln loads a YAML build script describing tasks and their dependencies,
//! resolves the task graph for a requested target, and runs the tasks in
//! dependency order with setup/teardown hooks, per-task error handling and
//! a report of what ran.

// Public modules
pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod graph;
pub mod runner;
pub mod ui;

// Re-export commonly used types
pub use error::{KilnError, Result};

/// Current version of Kiln
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
