//! Task registration and dependency resolution
//!
//! Descriptors live in a flat arena indexed by registration order. Resolution
//! runs a post-order depth-first traversal from the target, keeping the
//! visitation state in a side table instead of on the descriptors.

use super::{task_key, TaskDescriptor};
use crate::error::{GraphError, GraphResult};
use std::collections::HashMap;
use tracing::debug;

/// Visitation state of a node during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

/// The set of registered tasks for one script execution
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<TaskDescriptor>,
    index: HashMap<String, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Names are unique regardless of case.
    pub fn add_task(&mut self, task: TaskDescriptor) -> GraphResult<()> {
        let key = task_key(task.name());
        if self.index.contains_key(&key) {
            return Err(GraphError::DuplicateTask(task.name().to_string()));
        }

        debug!(task = %task.name(), "registered task");
        self.index.insert(key, self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Look up a task by name
    pub fn get(&self, name: &str) -> Option<&TaskDescriptor> {
        self.position(name).map(|i| &self.tasks[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in registration order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter()
    }

    /// The tasks that must directly precede `name`: its declared
    /// dependencies followed by every task declaring itself a dependee of
    /// it. Unregistered references are left out.
    pub fn predecessors(&self, name: &str) -> Vec<&TaskDescriptor> {
        let Some(position) = self.position(name) else {
            return Vec::new();
        };
        let incoming = self.incoming_dependees();

        let declared = self.tasks[position]
            .dependencies()
            .iter()
            .filter_map(|dependency| self.position(&dependency.name));

        declared
            .chain(incoming[position].iter().copied())
            .map(|i| &self.tasks[i])
            .collect()
    }

    /// Resolve the execution order for `target`.
    ///
    /// Every returned task comes after all of its transitive dependencies,
    /// and only tasks reachable from the target are included. In exclusive
    /// mode the target alone is returned.
    pub fn resolve(&self, target: &str, exclusive: bool) -> GraphResult<Vec<&TaskDescriptor>> {
        let root = self
            .position(target)
            .ok_or_else(|| GraphError::TargetNotFound(target.to_string()))?;

        if exclusive {
            debug!(target = %target, "exclusive run, dependencies ignored");
            return Ok(vec![&self.tasks[root]]);
        }

        let incoming = self.incoming_dependees();
        let mut state = vec![Visit::Unvisited; self.tasks.len()];
        let mut path = Vec::new();
        let mut order = Vec::new();

        self.visit(root, &incoming, &mut state, &mut path, &mut order)?;

        Ok(order.into_iter().map(|i| &self.tasks[i]).collect())
    }

    fn visit(
        &self,
        node: usize,
        incoming: &[Vec<usize>],
        state: &mut [Visit],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> GraphResult<()> {
        match state[node] {
            Visit::Done => return Ok(()),
            Visit::InProgress => return Err(self.cycle_error(node, path)),
            Visit::Unvisited => {}
        }

        state[node] = Visit::InProgress;
        path.push(node);

        let task = &self.tasks[node];

        for dependee in task.dependees() {
            if dependee.required && !self.contains(&dependee.name) {
                return Err(GraphError::MissingDependency {
                    task: task.name().to_string(),
                    dependency: dependee.name.clone(),
                });
            }
        }

        for dependency in task.dependencies() {
            match self.position(&dependency.name) {
                Some(next) => self.visit(next, incoming, state, path, order)?,
                None if dependency.required => {
                    return Err(GraphError::MissingDependency {
                        task: task.name().to_string(),
                        dependency: dependency.name.clone(),
                    });
                }
                None => {
                    debug!(
                        task = %task.name(),
                        dependency = %dependency.name,
                        "optional dependency not registered, skipping"
                    );
                }
            }
        }

        for &next in &incoming[node] {
            self.visit(next, incoming, state, path, order)?;
        }

        path.pop();
        state[node] = Visit::Done;
        order.push(node);
        Ok(())
    }

    /// Build the cycle error for a revisit of `node`. The reported path
    /// starts at the earliest-registered task on the cycle.
    fn cycle_error(&self, node: usize, path: &[usize]) -> GraphError {
        let start = path.iter().position(|&i| i == node).unwrap_or(0);
        let mut cycle = path[start..].to_vec();

        if let Some(first) = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, index)| **index)
            .map(|(offset, _)| offset)
        {
            cycle.rotate_left(first);
        }
        if let Some(&head) = cycle.first() {
            cycle.push(head);
        }

        GraphError::CyclicDependency {
            path: cycle
                .into_iter()
                .map(|i| self.tasks[i].name().to_string())
                .collect(),
        }
    }

    /// For every task, the tasks that named it as a dependee, in
    /// registration order
    fn incoming_dependees(&self) -> Vec<Vec<usize>> {
        let mut incoming = vec![Vec::new(); self.tasks.len()];
        for (source, task) in self.tasks.iter().enumerate() {
            for dependee in task.dependees() {
                if let Some(target) = self.position(&dependee.name) {
                    incoming[target].push(source);
                }
            }
        }
        incoming
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&task_key(name)).copied()
    }
}
