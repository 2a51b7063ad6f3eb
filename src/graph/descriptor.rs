//! Task descriptors
//!
//! A descriptor is the registered form of one task: its identity, the
//! ordering constraints it declares, the criteria gating it, and the hooks
//! that make up its lifecycle. Hooks are explicit optional closures set at
//! registration time; nothing is discovered by inspecting the task later.

use super::task_key;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::Context;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle hook or body action
pub type Action = Box<dyn Fn(&mut Context) -> ExecutionResult<()>>;

/// An error handler, invoked with the failure of the task body
pub type ErrorHandler = Box<dyn Fn(&ExecutionError, &mut Context) -> ExecutionResult<()>>;

/// A predicate evaluated just before a task would execute
pub type Predicate = Box<dyn Fn(&Context) -> bool>;

/// What happens to the run when a task body fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run; remaining tasks never start
    #[default]
    Abort,

    /// Log the failure and carry on with the next task
    #[serde(rename = "continue")]
    ContinueLogged,

    /// Carry on, then fail the whole run with an aggregate error at the end
    #[serde(rename = "defer")]
    DeferAggregate,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::ContinueLogged => "continue",
            FailurePolicy::DeferAggregate => "defer",
        };
        f.write_str(name)
    }
}

/// A named reference from one task to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReference {
    /// Name of the referenced task, as written
    pub name: String,

    /// When false, a reference to an unregistered task is ignored
    pub required: bool,
}

impl TaskReference {
    pub fn required(name: impl Into<String>) -> Self {
        TaskReference {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        TaskReference {
            name: name.into(),
            required: false,
        }
    }
}

/// A single criterion, optionally carrying the message reported on skip
pub struct Criterion {
    predicate: Predicate,
    message: Option<String>,
}

impl Criterion {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_met(&self, ctx: &Context) -> bool {
        (self.predicate)(ctx)
    }
}

/// Registered form of one task
pub struct TaskDescriptor {
    name: String,
    description: Option<String>,
    dependencies: Vec<TaskReference>,
    dependees: Vec<TaskReference>,
    criteria: Vec<Criterion>,
    failure_policy: FailurePolicy,
    setup: Option<Action>,
    actions: Vec<Action>,
    error_handler: Option<ErrorHandler>,
    finally: Option<Action>,
    teardown: Option<Action>,
}

impl TaskDescriptor {
    /// Create an empty task with the given name
    pub fn new(name: impl Into<String>) -> Self {
        TaskDescriptor {
            name: name.into(),
            description: None,
            dependencies: Vec::new(),
            dependees: Vec::new(),
            criteria: Vec::new(),
            failure_policy: FailurePolicy::default(),
            setup: None,
            actions: Vec::new(),
            error_handler: None,
            finally: None,
            teardown: None,
        }
    }

    /// Set the description shown in task listings
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a task that must run before this one
    pub fn depends_on(self, name: impl Into<String>) -> Self {
        self.with_dependency(TaskReference::required(name))
    }

    /// Declare a dependency that is ignored if no such task is registered
    pub fn depends_on_optional(self, name: impl Into<String>) -> Self {
        self.with_dependency(TaskReference::optional(name))
    }

    /// Add a dependency reference. Repeated names are kept once, in the
    /// position they were first declared.
    pub fn with_dependency(mut self, reference: TaskReference) -> Self {
        if !contains_name(&self.dependencies, &reference.name) {
            self.dependencies.push(reference);
        }
        self
    }

    /// Declare a task that must run after this one
    pub fn is_dependee_of(self, name: impl Into<String>) -> Self {
        self.with_dependee(TaskReference::required(name))
    }

    /// Add a reverse dependency reference
    pub fn with_dependee(mut self, reference: TaskReference) -> Self {
        if !contains_name(&self.dependees, &reference.name) {
            self.dependees.push(reference);
        }
        self
    }

    /// Gate the task on a predicate
    pub fn with_criteria<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + 'static,
    {
        self.criteria.push(Criterion {
            predicate: Box::new(predicate),
            message: None,
        });
        self
    }

    /// Gate the task on a predicate, reporting `message` when it skips the task
    pub fn with_criteria_message<F>(mut self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Context) -> bool + 'static,
    {
        self.criteria.push(Criterion {
            predicate: Box::new(predicate),
            message: Some(message.into()),
        });
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Shorthand for [`FailurePolicy::ContinueLogged`]
    pub fn continue_on_error(self) -> Self {
        self.with_failure_policy(FailurePolicy::ContinueLogged)
    }

    /// Shorthand for [`FailurePolicy::DeferAggregate`]
    pub fn defer_on_error(self) -> Self {
        self.with_failure_policy(FailurePolicy::DeferAggregate)
    }

    /// Append a body action. Actions run in the order they were added.
    pub fn does<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.actions.push(Box::new(action));
        self
    }

    pub fn with_setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.setup = Some(Box::new(hook));
        self
    }

    pub fn with_teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.teardown = Some(Box::new(hook));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionError, &mut Context) -> ExecutionResult<()> + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn finally<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.finally = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn dependencies(&self) -> &[TaskReference] {
        &self.dependencies
    }

    pub fn dependees(&self) -> &[TaskReference] {
        &self.dependees
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn setup(&self) -> Option<&Action> {
        self.setup.as_ref()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    pub fn finally_handler(&self) -> Option<&Action> {
        self.finally.as_ref()
    }

    pub fn teardown(&self) -> Option<&Action> {
        self.teardown.as_ref()
    }

    /// True when the task only groups its dependencies
    pub fn is_delegating(&self) -> bool {
        self.actions.is_empty()
    }

    /// Evaluate criteria in declaration order, returning the skip reason of
    /// the first one that is not met
    pub fn unmet_criterion(&self, ctx: &Context) -> Option<String> {
        self.criteria
            .iter()
            .enumerate()
            .find(|(_, criterion)| !criterion.is_met(ctx))
            .map(|(i, criterion)| match criterion.message() {
                Some(message) => message.to_string(),
                None if self.criteria.len() == 1 => "Criteria not met".to_string(),
                None => format!("Criterion #{} not met", i + 1),
            })
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("dependencies", &self.dependencies)
            .field("dependees", &self.dependees)
            .field("criteria", &self.criteria.len())
            .field("failure_policy", &self.failure_policy)
            .field("actions", &self.actions.len())
            .field("setup", &self.setup.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("finally", &self.finally.is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

fn contains_name(references: &[TaskReference], name: &str) -> bool {
    let key = task_key(name);
    references.iter().any(|r| task_key(&r.name) == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let task = TaskDescriptor::new("build")
            .depends_on("restore")
            .depends_on("clean")
            .depends_on_optional("lint");

        let names: Vec<&str> = task.dependencies().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["restore", "clean", "lint"]);
        assert!(!task.dependencies()[2].required);
    }

    #[test]
    fn test_duplicate_dependency_is_kept_once() {
        let task = TaskDescriptor::new("build")
            .depends_on("clean")
            .depends_on("CLEAN");

        assert_eq!(task.dependencies().len(), 1);
        assert_eq!(task.dependencies()[0].name, "clean");
    }

    #[test]
    fn test_unmet_criterion_uses_message() {
        let ctx = Context::new();
        let task = TaskDescriptor::new("deploy")
            .with_criteria(|_| true)
            .with_criteria_message(|_| false, "Not on the release branch");

        assert_eq!(
            task.unmet_criterion(&ctx),
            Some("Not on the release branch".to_string())
        );
    }

    #[test]
    fn test_unmet_anonymous_criterion() {
        let ctx = Context::new();
        let single = TaskDescriptor::new("a").with_criteria(|_| false);
        assert_eq!(single.unmet_criterion(&ctx), Some("Criteria not met".to_string()));

        let several = TaskDescriptor::new("b")
            .with_criteria(|_| true)
            .with_criteria(|_| false);
        assert_eq!(
            several.unmet_criterion(&ctx),
            Some("Criterion #2 not met".to_string())
        );
    }

    #[test]
    fn test_criteria_read_context() {
        let ctx = Context::new().with_vars(
            [("configuration".to_string(), "Release".to_string())]
                .into_iter()
                .collect(),
        );
        let task = TaskDescriptor::new("sign")
            .with_criteria(|ctx| ctx.get_var("configuration").map(String::as_str) == Some("Release"));

        assert_eq!(task.unmet_criterion(&ctx), None);
    }

    #[test]
    fn test_delegating_task() {
        assert!(TaskDescriptor::new("all").depends_on("build").is_delegating());
        assert!(!TaskDescriptor::new("build").does(|_| Ok(())).is_delegating());
    }

    #[test]
    fn test_failure_policy_names() {
        let policy: FailurePolicy = serde_yaml::from_str("continue").unwrap();
        assert_eq!(policy, FailurePolicy::ContinueLogged);
        let policy: FailurePolicy = serde_yaml::from_str("defer").unwrap();
        assert_eq!(policy, FailurePolicy::DeferAggregate);
        assert_eq!(FailurePolicy::default().to_string(), "abort");
    }
}
