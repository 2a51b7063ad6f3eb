//! Build script registration
//!
//! Turns a parsed build script into task descriptors and lifetime hooks.

use crate::config::types::{Config, Task, TaskRef};
use crate::error::GraphResult;
use crate::graph::{TaskDescriptor, TaskGraph, TaskReference};
use crate::runner::{holds, Block, LifetimeHooks, When};

fn reference(task_ref: &TaskRef) -> TaskReference {
    if task_ref.is_required() {
        TaskReference::required(task_ref.name())
    } else {
        TaskReference::optional(task_ref.name())
    }
}

/// Build the descriptor of one script task
pub fn task_from_config(name: &str, task: &Task) -> TaskDescriptor {
    let mut descriptor = TaskDescriptor::new(name).with_failure_policy(task.on_error);

    if let Some(description) = &task.description {
        descriptor = descriptor.with_description(description.clone());
    }
    for dependency in &task.depends_on {
        descriptor = descriptor.with_dependency(reference(dependency));
    }
    for dependee in &task.before {
        descriptor = descriptor.with_dependee(reference(dependee));
    }
    for when in task.when.iter().cloned().flat_map(When::all_from_config) {
        let message = when.describe();
        descriptor = descriptor.with_criteria_message(move |ctx| holds(&when, ctx), message);
    }

    if let Some(setup) = Block::from_config(task.setup.clone()).into_action() {
        descriptor = descriptor.with_setup(setup);
    }
    if let Some(body) = Block::from_config(task.run.clone()).into_action() {
        descriptor = descriptor.does(body);
    }
    if let Some(handler) = Block::from_config(task.error.clone()).into_error_handler() {
        descriptor = descriptor.on_error(handler);
    }
    if let Some(finally) = Block::from_config(task.finally.clone()).into_action() {
        descriptor = descriptor.finally(finally);
    }
    if let Some(teardown) = Block::from_config(task.teardown.clone()).into_action() {
        descriptor = descriptor.with_teardown(teardown);
    }

    descriptor
}

/// Register every script task, in file order
pub fn build_graph(config: &Config) -> GraphResult<TaskGraph> {
    let mut graph = TaskGraph::new();
    for (name, task) in &config.tasks {
        graph.add_task(task_from_config(name, task))?;
    }
    Ok(graph)
}

/// The run-level and task-lifetime hooks declared by the script
pub fn build_hooks(config: &Config) -> LifetimeHooks {
    LifetimeHooks {
        setup: Block::from_config(config.setup.clone()).into_action(),
        teardown: Block::from_config(config.teardown.clone()).into_action(),
        task_setup: Block::from_config(config.task_setup.clone()).into_action(),
        task_teardown: Block::from_config(config.task_teardown.clone()).into_action(),
    }
}
