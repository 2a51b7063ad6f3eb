//! Common test utilities

#![allow(dead_code)]

use kiln::graph::{TaskDescriptor, TaskGraph};
use kiln::runner::{Context, DefaultExecutionStrategy, Engine, Verbosity};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// Shared log of hook invocations
pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Create a temporary directory with a kiln.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("kiln.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Create a test config with an empty subdirectory next to it
pub fn create_test_config_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, config_path) = create_test_config(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, config_path, sub_dir)
}

/// An action that appends `event` to the log
pub fn record(
    log: &EventLog,
    event: &str,
) -> impl Fn(&mut Context) -> kiln::error::ExecutionResult<()> {
    let log = log.clone();
    let event = event.to_string();
    move |_| {
        log.borrow_mut().push(event.clone());
        Ok(())
    }
}

/// An engine with the default strategy over the given tasks
pub fn engine(tasks: Vec<TaskDescriptor>) -> Engine {
    let mut graph = TaskGraph::new();
    for task in tasks {
        graph.add_task(task).unwrap();
    }
    Engine::new(graph, Rc::new(DefaultExecutionStrategy::new()))
}

pub fn quiet_context() -> Context {
    Context::new().with_verbosity(Verbosity::Silent)
}
