//! Engine
//!
//! Resolves a target into an ordered task list and drives an execution
//! strategy over it, one task at a time, recording every outcome in the
//! run context's report.

use crate::container::Container;
use crate::error::{ContainerResult, DeferredFailure, ExecutionError, ExecutionResult, Result};
use crate::graph::{Action, FailurePolicy, TaskDescriptor, TaskGraph};
use crate::runner::{Context, ExecutionStrategy, Report};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run-level lifetime hooks, plus the hooks wrapped around every task
#[derive(Default)]
pub struct LifetimeHooks {
    pub setup: Option<Action>,
    pub teardown: Option<Action>,
    pub task_setup: Option<Action>,
    pub task_teardown: Option<Action>,
}

/// How the body of one task ended, once its lifetime hooks have run
enum BodyOutcome {
    Succeeded,
    /// Failed, but the failure was swallowed and the run goes on
    Recovered(String),
    Failed(ExecutionError),
}

pub struct Engine {
    graph: TaskGraph,
    hooks: LifetimeHooks,
    strategy: Rc<dyn ExecutionStrategy>,
}

impl Engine {
    pub fn new(graph: TaskGraph, strategy: Rc<dyn ExecutionStrategy>) -> Self {
        Engine {
            graph,
            hooks: LifetimeHooks::default(),
            strategy,
        }
    }

    /// Build an engine whose strategy comes from the service container
    pub fn from_container(graph: TaskGraph, container: &Container) -> ContainerResult<Self> {
        let strategy = container.resolve::<dyn ExecutionStrategy>()?;
        Ok(Self::new(graph, strategy))
    }

    pub fn with_hooks(mut self, hooks: LifetimeHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn register_setup<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.hooks.setup = Some(Box::new(hook));
    }

    pub fn register_teardown<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.hooks.teardown = Some(Box::new(hook));
    }

    pub fn register_task_setup<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.hooks.task_setup = Some(Box::new(hook));
    }

    pub fn register_task_teardown<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> ExecutionResult<()> + 'static,
    {
        self.hooks.task_teardown = Some(Box::new(hook));
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run `target` and everything it depends on (or only `target` in
    /// exclusive mode).
    ///
    /// Resolution errors are returned before anything runs. Otherwise the
    /// run-level teardown always executes, and the context's report holds
    /// every task outcome whether or not the run succeeded.
    pub fn run_target(&self, ctx: &mut Context, target: &str, exclusive: bool) -> Result<Report> {
        let tasks = self.graph.resolve(target, exclusive)?;

        ctx.begin_run(target);
        info!(target = %target, tasks = tasks.len(), exclusive, "starting run");

        let mut deferred = Vec::new();
        let outcome = self.run_tasks(&tasks, ctx, &mut deferred);
        ctx.set_current_task(None);
        let teardown = self.run_teardown(ctx);

        if !deferred.is_empty() && (outcome.is_err() || teardown.is_err()) {
            warn!(
                deferred = deferred.len(),
                "deferred task failures superseded by a fatal error"
            );
        }

        match (outcome, teardown) {
            (Err(e), Err(teardown_error)) => {
                error!(error = %teardown_error, "teardown failed after an aborted run");
                ctx.print_error(&teardown_error.to_string());
                return Err(e.into());
            }
            (Err(e), Ok(())) => return Err(e.into()),
            (Ok(()), Err(teardown_error)) => return Err(teardown_error.into()),
            (Ok(()), Ok(())) => {}
        }

        if !deferred.is_empty() {
            warn!(failures = deferred.len(), "raising deferred task failures");
            return Err(ExecutionError::Deferred(deferred).into());
        }

        info!(target = %target, "run completed");
        Ok(ctx.report().clone())
    }

    fn run_tasks(
        &self,
        tasks: &[&TaskDescriptor],
        ctx: &mut Context,
        deferred: &mut Vec<DeferredFailure>,
    ) -> ExecutionResult<()> {
        if let Some(hook) = &self.hooks.setup {
            self.strategy
                .perform_setup(hook, ctx)
                .map_err(|e| lifetime_error(true, "the run", e))?;
        }

        for (position, task) in tasks.iter().enumerate() {
            if let Err(e) = self.execute_task(task, ctx, deferred) {
                let remaining = unstarted(tasks, position);
                if !remaining.is_empty() {
                    warn!(remaining = ?remaining, "run stopped before these tasks started");
                    ctx.print_error(&format!("Not started: {}", remaining.join(", ")));
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn run_teardown(&self, ctx: &mut Context) -> ExecutionResult<()> {
        match &self.hooks.teardown {
            Some(hook) => self
                .strategy
                .perform_teardown(hook, ctx)
                .map_err(|e| lifetime_error(false, "the run", e)),
            None => Ok(()),
        }
    }

    /// Take one task through criteria, lifetime hooks and body, and record
    /// the outcome. An error return stops the run.
    fn execute_task(
        &self,
        task: &TaskDescriptor,
        ctx: &mut Context,
        deferred: &mut Vec<DeferredFailure>,
    ) -> ExecutionResult<()> {
        if ctx.is_cancelled() {
            warn!(task = %task.name(), "run cancelled before task started");
            return Err(ExecutionError::Cancelled);
        }

        ctx.set_current_task(Some(task.name()));

        if let Some(reason) = task.unmet_criterion(ctx) {
            self.strategy.skip(task, &reason, ctx);
            ctx.report_mut().add_skipped(task.name(), reason);
            return Ok(());
        }

        let started = Instant::now();
        let outcome = self.run_lifecycle(task, ctx);
        let duration = started.elapsed();

        match outcome {
            Ok(BodyOutcome::Succeeded) => {
                if task.is_delegating() {
                    ctx.report_mut().add_delegated(task.name(), duration);
                } else {
                    ctx.report_mut().add_executed(task.name(), duration);
                }
                Ok(())
            }
            Ok(BodyOutcome::Recovered(message)) => {
                ctx.report_mut().add_errored(task.name(), duration, message);
                Ok(())
            }
            Ok(BodyOutcome::Failed(e)) => {
                ctx.report_mut()
                    .add_errored(task.name(), duration, e.to_string());
                if task.failure_policy() == FailurePolicy::DeferAggregate {
                    warn!(task = %task.name(), error = %e, "task failed, deferring error");
                    ctx.print_error(&format!("Task '{}' failed: {}", task.name(), e));
                    deferred.push(DeferredFailure {
                        task: task.name().to_string(),
                        error: e,
                    });
                    return Ok(());
                }
                error!(task = %task.name(), error = %e, "task failed, aborting run");
                Err(e.in_task(task.name()))
            }
            Err(e) => {
                ctx.report_mut()
                    .add_errored(task.name(), duration, e.to_string());
                error!(task = %task.name(), error = %e, "task lifetime failed, aborting run");
                Err(e)
            }
        }
    }

    /// Setup, body, error handler, finally and teardown for one task.
    ///
    /// The outer `Err` is a lifetime (setup/teardown) failure, which is
    /// fatal whatever the task's failure policy. Once a setup hook has
    /// succeeded its teardown runs on every path.
    fn run_lifecycle(
        &self,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<BodyOutcome> {
        let scope = format!("task '{}'", task.name());

        if let Some(hook) = &self.hooks.task_setup {
            self.strategy
                .perform_task_setup(hook, task, ctx)
                .map_err(|e| lifetime_error(true, &scope, e))?;
        }

        if let Some(hook) = task.setup() {
            if let Err(e) = self.strategy.perform_task_setup(hook, task, ctx) {
                if let Err(teardown_error) = self.engine_task_teardown(task, ctx) {
                    warn!(task = %task.name(), error = %teardown_error, "teardown failed after setup failure");
                }
                return Err(lifetime_error(true, &scope, e));
            }
        }

        let mut outcome = self.run_body(task, ctx);

        if let Some(hook) = task.finally_handler() {
            if let Err(e) = self.strategy.invoke_finally(hook, task, ctx) {
                match outcome {
                    // the body succeeded, so the finally failure is the task's failure
                    BodyOutcome::Succeeded => outcome = self.apply_policy(task, e, ctx),
                    _ => {
                        warn!(task = %task.name(), error = %e, "finally handler failed");
                        ctx.print_error(&format!("Finally block of '{}' failed: {}", task.name(), e));
                    }
                }
            }
        }

        let task_teardown = match task.teardown() {
            Some(hook) => self.strategy.perform_task_teardown(hook, task, ctx),
            None => Ok(()),
        };
        let engine_teardown = self.engine_task_teardown(task, ctx);

        if let Err(e) = task_teardown.and(engine_teardown) {
            let e = lifetime_error(false, &scope, e);
            if let BodyOutcome::Failed(_) = outcome {
                warn!(task = %task.name(), error = %e, "teardown failed after task failure");
                ctx.print_error(&e.to_string());
            } else {
                return Err(e);
            }
        }

        Ok(outcome)
    }

    fn run_body(&self, task: &TaskDescriptor, ctx: &mut Context) -> BodyOutcome {
        match self.strategy.execute(task, ctx) {
            Ok(()) => BodyOutcome::Succeeded,
            Err(e) => self.apply_policy(task, e, ctx),
        }
    }

    /// Decide what a body failure means for the run. Continue swallows it
    /// without consulting the error handler; otherwise an error handler
    /// that returns `Ok` recovers the task and one that fails replaces the
    /// original error.
    fn apply_policy(&self, task: &TaskDescriptor, e: ExecutionError, ctx: &mut Context) -> BodyOutcome {
        if task.failure_policy() == FailurePolicy::ContinueLogged {
            warn!(task = %task.name(), error = %e, "task failed, continuing");
            ctx.print_error(&format!("Task '{}' failed: {}", task.name(), e));
            return BodyOutcome::Recovered(e.to_string());
        }

        match task.error_handler() {
            Some(handler) => match self.strategy.handle_error(handler, task, &e, ctx) {
                Ok(()) => {
                    debug!(task = %task.name(), "error handled");
                    BodyOutcome::Recovered(e.to_string())
                }
                Err(replacement) => BodyOutcome::Failed(replacement),
            },
            None => BodyOutcome::Failed(e),
        }
    }

    fn engine_task_teardown(&self, task: &TaskDescriptor, ctx: &mut Context) -> ExecutionResult<()> {
        match &self.hooks.task_teardown {
            Some(hook) => self.strategy.perform_task_teardown(hook, task, ctx),
            None => Ok(()),
        }
    }
}

/// Names of the tasks after `position`, which a stopped run never started
fn unstarted<'a>(tasks: &[&'a TaskDescriptor], position: usize) -> Vec<&'a str> {
    tasks
        .iter()
        .skip(position + 1)
        .map(|task| task.name())
        .collect()
}

fn lifetime_error(setup: bool, scope: &str, source: ExecutionError) -> ExecutionError {
    let scope = scope.to_string();
    let source = Box::new(source);
    if setup {
        ExecutionError::SetupFailed { scope, source }
    } else {
        ExecutionError::TeardownFailed { scope, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KilnError;
    use crate::runner::{DefaultExecutionStrategy, Verbosity};
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn record(log: &Log, event: &str) -> impl Fn(&mut Context) -> ExecutionResult<()> {
        let log = log.clone();
        let event = event.to_string();
        move |_| {
            log.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    fn engine(tasks: Vec<TaskDescriptor>) -> Engine {
        let mut graph = TaskGraph::new();
        for task in tasks {
            graph.add_task(task).unwrap();
        }
        Engine::new(graph, Rc::new(DefaultExecutionStrategy::new()))
    }

    fn ctx() -> Context {
        Context::new().with_verbosity(Verbosity::Silent)
    }

    #[test]
    fn test_lifecycle_order() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![TaskDescriptor::new("build")
            .with_setup(record(&log, "setup"))
            .does(record(&log, "run"))
            .finally(record(&log, "finally"))
            .with_teardown(record(&log, "teardown"))]);
        engine.register_setup(record(&log, "run-setup"));
        engine.register_teardown(record(&log, "run-teardown"));
        engine.register_task_setup(record(&log, "each-setup"));
        engine.register_task_teardown(record(&log, "each-teardown"));

        engine.run_target(&mut ctx(), "build", false).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "run-setup",
                "each-setup",
                "setup",
                "run",
                "finally",
                "teardown",
                "each-teardown",
                "run-teardown",
            ]
        );
    }

    #[test]
    fn test_skipped_task_invokes_no_hooks() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![TaskDescriptor::new("A")
            .with_criteria(|_| false)
            .with_setup(record(&log, "setup"))
            .does(record(&log, "run"))
            .finally(record(&log, "finally"))
            .with_teardown(record(&log, "teardown"))]);
        engine.register_task_setup(record(&log, "each-setup"));

        let report = engine.run_target(&mut ctx(), "A", false).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(report.len(), 1);
        assert!(report.entries()[0].is_skipped());
    }

    #[test]
    fn test_delegating_task_is_reported() {
        let engine = engine(vec![
            TaskDescriptor::new("build").does(|_| Ok(())),
            TaskDescriptor::new("all").depends_on("build"),
        ]);

        let report = engine.run_target(&mut ctx(), "all", false).unwrap();
        assert_eq!(report.entries()[0].status, crate::runner::TaskStatus::Executed);
        assert_eq!(report.entries()[1].status, crate::runner::TaskStatus::Delegated);
    }

    #[test]
    fn test_error_handler_recovers_task() {
        let log: Log = Rc::default();
        let handled = log.clone();
        let engine = engine(vec![
            TaskDescriptor::new("A")
                .does(|_| Err(ExecutionError::msg("boom")))
                .on_error(move |e, _| {
                    handled.borrow_mut().push(format!("handled: {e}"));
                    Ok(())
                }),
            TaskDescriptor::new("B").depends_on("A").does(record(&log, "B")),
        ]);

        let report = engine.run_target(&mut ctx(), "B", false).unwrap();
        assert_eq!(*log.borrow(), vec!["handled: boom", "B"]);
        assert!(report.get("A").unwrap().is_errored());
        assert!(!report.get("B").unwrap().is_errored());
    }

    #[test]
    fn test_failing_error_handler_replaces_error() {
        let engine = engine(vec![TaskDescriptor::new("A")
            .does(|_| Err(ExecutionError::msg("original")))
            .on_error(|_, _| Err(ExecutionError::msg("replacement")))]);

        let err = engine.run_target(&mut ctx(), "A", false).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("replacement"));
        assert!(!message.contains("original"));
    }

    #[test]
    fn test_continue_does_not_consult_error_handler() {
        let log: Log = Rc::default();
        let handled = log.clone();
        let engine = engine(vec![TaskDescriptor::new("A")
            .continue_on_error()
            .does(|_| Err(ExecutionError::msg("boom")))
            .on_error(move |_, _| {
                handled.borrow_mut().push("handler".to_string());
                Ok(())
            })]);

        engine.run_target(&mut ctx(), "A", false).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_teardown_runs_after_body_failure() {
        let log: Log = Rc::default();
        let engine = engine(vec![TaskDescriptor::new("A")
            .with_setup(record(&log, "setup"))
            .does(|_| Err(ExecutionError::msg("boom")))
            .finally(record(&log, "finally"))
            .with_teardown(record(&log, "teardown"))]);

        assert!(engine.run_target(&mut ctx(), "A", false).is_err());
        assert_eq!(*log.borrow(), vec!["setup", "finally", "teardown"]);
    }

    #[test]
    fn test_setup_failure_is_fatal_even_when_continuing() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![
            TaskDescriptor::new("A")
                .continue_on_error()
                .with_setup(|_| Err(ExecutionError::msg("no database")))
                .does(record(&log, "A"))
                .with_teardown(record(&log, "A-teardown")),
            TaskDescriptor::new("B").depends_on("A").does(record(&log, "B")),
        ]);
        engine.register_task_teardown(record(&log, "each-teardown"));
        engine.register_teardown(record(&log, "run-teardown"));

        let mut context = ctx();
        let err = engine.run_target(&mut context, "B", false).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Execution(ExecutionError::SetupFailed { .. })
        ));
        // only the engine-wide task hook had set up successfully
        assert_eq!(*log.borrow(), vec!["each-teardown", "run-teardown"]);
        assert_eq!(context.report().names(), vec!["A"]);
    }

    #[test]
    fn test_teardown_failure_fails_successful_task() {
        let engine = engine(vec![TaskDescriptor::new("A")
            .does(|_| Ok(()))
            .with_teardown(|_| Err(ExecutionError::msg("cleanup failed")))]);

        let err = engine.run_target(&mut ctx(), "A", false).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Execution(ExecutionError::TeardownFailed { .. })
        ));
    }

    #[test]
    fn test_finally_failure_fails_successful_task() {
        let log: Log = Rc::default();
        let engine = engine(vec![
            TaskDescriptor::new("A")
                .does(|_| Ok(()))
                .finally(|_| Err(ExecutionError::msg("finally failed"))),
            TaskDescriptor::new("B").depends_on("A").does(record(&log, "B")),
        ]);

        let mut context = ctx();
        assert!(engine.run_target(&mut context, "B", false).is_err());
        assert!(log.borrow().is_empty());
        assert!(context.report().get("A").unwrap().is_errored());
    }

    #[test]
    fn test_run_setup_failure_still_runs_teardown() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![TaskDescriptor::new("A").does(record(&log, "A"))]);
        engine.register_setup(|_| Err(ExecutionError::msg("no network")));
        engine.register_teardown(record(&log, "run-teardown"));

        let err = engine.run_target(&mut ctx(), "A", false).unwrap_err();
        assert!(err.to_string().contains("no network"));
        assert_eq!(*log.borrow(), vec!["run-teardown"]);
    }

    #[test]
    fn test_run_teardown_failure_keeps_task_error() {
        let mut engine = engine(vec![TaskDescriptor::new("A").does(|_| Err(ExecutionError::msg("task broke")))]);
        engine.register_teardown(|_| Err(ExecutionError::msg("teardown broke")));

        let err = engine.run_target(&mut ctx(), "A", false).unwrap_err();
        assert!(err.to_string().contains("task broke"));
    }

    #[test]
    fn test_deferred_failures_are_aggregated() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![
            TaskDescriptor::new("A")
                .defer_on_error()
                .does(|_| Err(ExecutionError::msg("first"))),
            TaskDescriptor::new("B")
                .depends_on("A")
                .defer_on_error()
                .does(|_| Err(ExecutionError::msg("second"))),
            TaskDescriptor::new("C").depends_on("B").does(record(&log, "C")),
        ]);
        engine.register_teardown(record(&log, "run-teardown"));

        let mut context = ctx();
        let err = engine.run_target(&mut context, "C", false).unwrap_err();
        match err {
            KilnError::Execution(ExecutionError::Deferred(failures)) => {
                let tasks: Vec<&str> = failures.iter().map(|f| f.task.as_str()).collect();
                assert_eq!(tasks, vec!["A", "B"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*log.borrow(), vec!["C", "run-teardown"]);
        assert_eq!(context.report().len(), 3);
    }

    #[test]
    fn test_cancellation_stops_before_next_task() {
        let log: Log = Rc::default();
        let mut context = ctx();
        let token = context.cancellation().clone();
        let mut engine = engine(vec![
            TaskDescriptor::new("A").does(move |_| {
                token.cancel();
                Ok(())
            }),
            TaskDescriptor::new("B").depends_on("A").does(record(&log, "B")),
        ]);
        engine.register_teardown(record(&log, "run-teardown"));

        let err = engine.run_target(&mut context, "B", false).unwrap_err();
        assert!(matches!(err, KilnError::Execution(ExecutionError::Cancelled)));
        assert_eq!(*log.borrow(), vec!["run-teardown"]);
        assert_eq!(context.report().names(), vec!["A"]);
    }

    #[test]
    fn test_unstarted_tasks_follow_the_failed_one() {
        let engine = engine(vec![
            TaskDescriptor::new("A"),
            TaskDescriptor::new("B").depends_on("A"),
            TaskDescriptor::new("C").depends_on("B"),
        ]);
        let tasks = engine.graph().resolve("C", false).unwrap();

        assert_eq!(unstarted(&tasks, 0), vec!["B", "C"]);
        assert_eq!(unstarted(&tasks, 1), vec!["C"]);
        assert!(unstarted(&tasks, 2).is_empty());
    }

    #[test]
    fn test_abort_leaves_unstarted_tasks_out_of_the_report() {
        let log: Log = Rc::default();
        let engine = engine(vec![
            TaskDescriptor::new("A").does(|_| Err(ExecutionError::msg("boom"))),
            TaskDescriptor::new("B").depends_on("A").does(record(&log, "B")),
            TaskDescriptor::new("C").depends_on("B").does(record(&log, "C")),
        ]);
        let mut context = ctx();

        assert!(engine.run_target(&mut context, "C", false).is_err());
        assert_eq!(context.report().names(), vec!["A"]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_abort_after_deferred_failure_returns_the_abort() {
        let engine = engine(vec![
            TaskDescriptor::new("A")
                .defer_on_error()
                .does(|_| Err(ExecutionError::msg("deferred"))),
            TaskDescriptor::new("B")
                .depends_on("A")
                .does(|_| Err(ExecutionError::msg("fatal"))),
        ]);
        let mut context = ctx();

        let err = engine.run_target(&mut context, "B", false).unwrap_err();
        assert!(matches!(
            err,
            KilnError::Execution(ExecutionError::TaskFailed { ref task, .. }) if task == "B"
        ));
        assert_eq!(context.report().names(), vec!["A", "B"]);
    }

    #[test]
    fn test_resolution_error_runs_nothing() {
        let log: Log = Rc::default();
        let mut engine = engine(vec![TaskDescriptor::new("A")
            .continue_on_error()
            .depends_on("Missing")
            .does(record(&log, "A"))]);
        engine.register_setup(record(&log, "run-setup"));
        engine.register_teardown(record(&log, "run-teardown"));

        let err = engine.run_target(&mut ctx(), "A", false).unwrap_err();
        assert!(matches!(err, KilnError::Graph(_)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_current_task_is_visible_to_hooks() {
        let seen: Log = Rc::default();
        let sink = seen.clone();
        let mut engine = engine(vec![
            TaskDescriptor::new("A").does(|_| Ok(())),
            TaskDescriptor::new("B").depends_on("A").does(|_| Ok(())),
        ]);
        engine.register_task_setup(move |ctx| {
            sink.borrow_mut()
                .push(ctx.current_task().unwrap_or_default().to_string());
            Ok(())
        });

        engine.run_target(&mut ctx(), "B", false).unwrap();
        assert_eq!(*seen.borrow(), vec!["A", "B"]);
    }
}
