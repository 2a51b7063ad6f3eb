//! Task execution engine
//!
//! This module drives a resolved task list through the per-task lifecycle,
//! and holds the pieces build-script tasks are made of: shell commands,
//! conditional logic and variable interpolation.

pub mod block;
pub mod command;
pub mod context;
pub mod engine;
pub mod interpolate;
pub mod report;
pub mod strategy;
pub mod when;

// Re-export main types
pub use block::*;
pub use command::*;
pub use context::*;
pub use engine::*;
pub use interpolate::*;
pub use report::*;
pub use strategy::*;
pub use when::*;
