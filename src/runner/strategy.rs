//! Execution strategies
//!
//! A strategy performs the actual invocation of lifecycle hooks and task
//! bodies. The engine decides *when* each step happens; the strategy decides
//! *what* happening means. The default strategy invokes everything, the dry
//! run strategy only reports what would have been invoked.

use crate::error::{ExecutionError, ExecutionResult};
use crate::graph::{Action, ErrorHandler, TaskDescriptor};
use crate::runner::Context;
use tracing::{debug, info, warn};

pub trait ExecutionStrategy {
    /// Run-level setup, before the first task
    fn perform_setup(&self, hook: &Action, ctx: &mut Context) -> ExecutionResult<()>;

    /// Run-level teardown, after the last task
    fn perform_teardown(&self, hook: &Action, ctx: &mut Context) -> ExecutionResult<()>;

    /// A setup hook scoped to one task
    fn perform_task_setup(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()>;

    /// A teardown hook scoped to one task
    fn perform_task_teardown(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()>;

    /// Run the task body
    fn execute(&self, task: &TaskDescriptor, ctx: &mut Context) -> ExecutionResult<()>;

    /// Report that a task was skipped
    fn skip(&self, task: &TaskDescriptor, reason: &str, ctx: &Context);

    /// Hand a body failure to the task's error handler
    fn handle_error(
        &self,
        handler: &ErrorHandler,
        task: &TaskDescriptor,
        error: &ExecutionError,
        ctx: &mut Context,
    ) -> ExecutionResult<()>;

    /// Run the task's finally handler
    fn invoke_finally(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()>;
}

/// Invokes every hook and body for real
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExecutionStrategy;

impl DefaultExecutionStrategy {
    pub fn new() -> Self {
        DefaultExecutionStrategy
    }
}

impl ExecutionStrategy for DefaultExecutionStrategy {
    fn perform_setup(&self, hook: &Action, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_debug("Executing setup...");
        hook(ctx)
    }

    fn perform_teardown(&self, hook: &Action, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_debug("Executing teardown...");
        hook(ctx)
    }

    fn perform_task_setup(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        debug!(task = %task.name(), "task setup");
        hook(ctx)
    }

    fn perform_task_teardown(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        debug!(task = %task.name(), "task teardown");
        hook(ctx)
    }

    fn execute(&self, task: &TaskDescriptor, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_task_start(task.name());
        for action in task.actions() {
            action(ctx)?;
        }
        ctx.print_task_complete(task.name());
        Ok(())
    }

    fn skip(&self, task: &TaskDescriptor, reason: &str, ctx: &Context) {
        info!(task = %task.name(), reason, "task skipped");
        ctx.print_task_skip(task.name(), reason);
    }

    fn handle_error(
        &self,
        handler: &ErrorHandler,
        task: &TaskDescriptor,
        error: &ExecutionError,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        ctx.print_debug(&format!("Running error handler of '{}'...", task.name()));
        handler(error, ctx).map_err(|e| {
            warn!(task = %task.name(), error = %e, "error handler failed");
            e
        })
    }

    fn invoke_finally(
        &self,
        hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        ctx.print_debug(&format!("Running finally block of '{}'...", task.name()));
        hook(ctx)
    }
}

/// Walks the lifecycle without invoking anything, so the user can see what a
/// run would do
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutionStrategy;

impl DryRunExecutionStrategy {
    pub fn new() -> Self {
        DryRunExecutionStrategy
    }
}

impl ExecutionStrategy for DryRunExecutionStrategy {
    fn perform_setup(&self, _hook: &Action, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_info("Would run setup");
        Ok(())
    }

    fn perform_teardown(&self, _hook: &Action, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_info("Would run teardown");
        Ok(())
    }

    fn perform_task_setup(
        &self,
        _hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        ctx.print_debug(&format!("Would run setup of '{}'", task.name()));
        Ok(())
    }

    fn perform_task_teardown(
        &self,
        _hook: &Action,
        task: &TaskDescriptor,
        ctx: &mut Context,
    ) -> ExecutionResult<()> {
        ctx.print_debug(&format!("Would run teardown of '{}'", task.name()));
        Ok(())
    }

    fn execute(&self, task: &TaskDescriptor, ctx: &mut Context) -> ExecutionResult<()> {
        ctx.print_info(&format!("Would run task: {}", task.name()));
        Ok(())
    }

    fn skip(&self, task: &TaskDescriptor, reason: &str, ctx: &Context) {
        ctx.print_info(&format!("Would skip task '{}': {}", task.name(), reason));
    }

    fn handle_error(
        &self,
        _handler: &ErrorHandler,
        _task: &TaskDescriptor,
        _error: &ExecutionError,
        _ctx: &mut Context,
    ) -> ExecutionResult<()> {
        Ok(())
    }

    fn invoke_finally(
        &self,
        _hook: &Action,
        _task: &TaskDescriptor,
        _ctx: &mut Context,
    ) -> ExecutionResult<()> {
        Ok(())
    }
}
