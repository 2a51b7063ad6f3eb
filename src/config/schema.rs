//! Build script validation
//!
//! Checks that need the whole script. Dependency errors (unknown names,
//! cycles) are left to graph resolution, which reports them for the
//! requested target only.

use crate::config::types::{Config, Run, Task, TaskRef, When};
use crate::error::{ConfigError, ConfigResult};
use crate::graph::task_key;
use std::collections::HashSet;

/// Validate a complete build script
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    if let Some(interpreter) = &config.interpreter {
        if interpreter.is_empty() {
            return Err(ConfigError::Invalid(
                "interpreter must name a program".to_string(),
            ));
        }
    }

    let mut seen = HashSet::new();
    for (name, task) in &config.tasks {
        if !seen.insert(task_key(name)) {
            return Err(ConfigError::Invalid(format!(
                "Task '{}' is defined more than once (task names are case-insensitive)",
                name
            )));
        }
        validate_task(name, task)?;
    }

    if let Some(default) = &config.default {
        if !seen.contains(&task_key(default)) {
            return Err(ConfigError::UnknownDefault(default.clone()));
        }
    }

    Ok(())
}

/// Validate a single task
pub fn validate_task(name: &str, task: &Task) -> ConfigResult<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("Task names must not be empty".to_string()));
    }

    let references = task.depends_on.iter().chain(&task.before);
    if references.map(TaskRef::name).any(|r| r.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "Task '{}' references a task with an empty name",
            name
        )));
    }

    if task.when.iter().any(When::is_empty) {
        return Err(ConfigError::Invalid(format!(
            "Task '{}' has a 'when' entry with no condition",
            name
        )));
    }

    let blocks = [&task.setup, &task.run, &task.error, &task.finally, &task.teardown];
    let run_items = blocks.into_iter().flatten().filter_map(|run| match run {
        Run::Complex(item) => Some(item),
        Run::SimpleCommand(_) => None,
    });
    for item in run_items {
        if item.when.iter().any(When::is_empty) {
            return Err(ConfigError::Invalid(format!(
                "A run item of task '{}' has a 'when' entry with no condition",
                name
            )));
        }
    }

    Ok(())
}
