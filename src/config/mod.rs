//! Build script parsing and validation
//!
//! This module handles parsing of kiln.yml build scripts, validation of their
//! structure, and registration of their tasks into a task graph.

pub mod parse;
pub mod register;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use register::*;
pub use schema::*;
pub use types::*;
