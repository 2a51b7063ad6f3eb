//! Terminal output
//!
//! This module renders run reports, task descriptions and dependency trees.

pub mod report;
pub mod tree;

// Re-export main types
pub use report::*;
pub use tree::*;
