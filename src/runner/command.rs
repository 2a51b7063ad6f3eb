//! Command execution
//!
//! This module handles executing shell commands through the configured interpreter.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{interpolate, Command, Context, Verbosity};
use std::process::{Command as StdCommand, Stdio};
use tracing::{debug, warn};

/// Build a process running `script` through the context's interpreter
fn shell(script: &str, ctx: &Context) -> ExecutionResult<StdCommand> {
    let (program, args) = ctx
        .interpreter
        .split_first()
        .ok_or_else(|| ExecutionError::InvalidOption {
            name: "interpreter".to_string(),
            error: "interpreter must not be empty".to_string(),
        })?;

    let mut command = StdCommand::new(program);
    // Add interpreter args (e.g., "-c" for sh/bash)
    command.args(args);
    command.arg(script);

    // Set environment variables from context
    command.envs(&ctx.vars);
    Ok(command)
}

fn interpolate_option(value: &str, name: &str, ctx: &Context) -> ExecutionResult<String> {
    interpolate(value, &ctx.vars).map_err(|e| ExecutionError::InvalidOption {
        name: name.to_string(),
        error: e.to_string(),
    })
}

/// Execute a command in the given context
pub fn execute_command(cmd: &Command, ctx: &Context) -> ExecutionResult<()> {
    let exec_str = interpolate_option(cmd.exec(), "command", ctx)?;

    // Print the command if not quiet
    if !cmd.is_quiet() && ctx.verbosity >= Verbosity::Normal {
        let print_str =
            interpolate(cmd.print(), &ctx.vars).unwrap_or_else(|_| cmd.print().to_string());
        eprintln!("[RUN] {}", print_str);
    }

    // Determine working directory
    let working_dir = match cmd.dir() {
        Some(dir) => ctx.working_dir.join(interpolate_option(dir, "dir", ctx)?),
        None => ctx.working_dir.clone(),
    };

    let mut command = shell(&exec_str, ctx)?;
    command
        .current_dir(&working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!(command = %exec_str, dir = %working_dir.display(), "executing command");
    let status = command.status().map_err(|e| {
        warn!(command = %exec_str, error = %e, "failed to start command");
        ExecutionError::CommandFailed(None)
    })?;

    if !status.success() {
        return Err(ExecutionError::CommandFailed(status.code()));
    }

    Ok(())
}

/// Check if a command succeeds (for when conditions)
pub fn check_command(cmd_str: &str, ctx: &Context) -> ExecutionResult<bool> {
    let exec_str = interpolate_option(cmd_str, "command", ctx)?;

    let mut command = shell(&exec_str, ctx)?;
    command
        .current_dir(&ctx.working_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = command
        .status()
        .map_err(|_| ExecutionError::CommandFailed(None))?;

    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn quiet_context() -> Context {
        Context::new().with_verbosity(Verbosity::Silent)
    }

    #[test]
    fn test_execute_simple_command() {
        let cmd = Command::Simple("echo test".to_string());
        assert!(execute_command(&cmd, &quiet_context()).is_ok());
    }

    #[test]
    fn test_execute_command_with_variables() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "world".to_string());

        let ctx = quiet_context().with_vars(vars);
        let cmd = Command::Simple("test \"${name}\" = world".to_string());

        assert!(execute_command(&cmd, &ctx).is_ok());
    }

    #[test]
    fn test_execute_failing_command() {
        let cmd = Command::Simple("exit 3".to_string());

        let result = execute_command(&cmd, &quiet_context());
        assert!(matches!(result, Err(ExecutionError::CommandFailed(Some(3)))));
    }

    #[test]
    fn test_execute_command_in_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("sub").join("marker"), "").unwrap();

        let ctx = quiet_context().with_working_dir(temp_dir.path().to_path_buf());
        let cmd = Command::Complex {
            exec: "test -f marker".to_string(),
            print: "check marker".to_string(),
            quiet: true,
            dir: Some("sub".to_string()),
        };

        assert!(execute_command(&cmd, &ctx).is_ok());
    }

    #[test]
    fn test_empty_interpreter_is_rejected() {
        let ctx = quiet_context().with_interpreter(Vec::new());
        let result = check_command("true", &ctx);
        assert!(matches!(result, Err(ExecutionError::InvalidOption { .. })));
    }

    #[test]
    fn test_check_command_success() {
        assert!(check_command("true", &quiet_context()).unwrap());
    }

    #[test]
    fn test_check_command_failure() {
        assert!(!check_command("false", &quiet_context()).unwrap());
    }

    #[test]
    fn test_check_command_with_variable() {
        let mut vars = HashMap::new();
        vars.insert("cmd".to_string(), "true".to_string());

        let ctx = quiet_context().with_vars(vars);
        assert!(check_command("${cmd}", &ctx).unwrap());
    }
}
