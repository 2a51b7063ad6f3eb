//! Task graph
//!
//! This module holds the registered task descriptors and resolves a target
//! into the ordered list of tasks that must run for it.

pub mod descriptor;
pub mod resolve;

// Re-export main types
pub use descriptor::*;
pub use resolve::*;

/// Normalized lookup key for a task name. Task names are case-insensitive.
pub fn task_key(name: &str) -> String {
    name.to_lowercase()
}
