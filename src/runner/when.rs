//! When condition evaluation
//!
//! This module evaluates the conditional expressions used both as task
//! criteria and as guards on individual run items.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{check_command, interpolate, Context, When, WhenCondition};
use std::env;
use tracing::warn;

/// Evaluate a list of when conditions (all must be true - AND logic)
pub fn evaluate_when_list(when_list: &[When], ctx: &Context) -> ExecutionResult<bool> {
    for when in when_list {
        if !evaluate_when(when, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate a condition for use as a task criterion. A condition that
/// cannot be evaluated counts as not met.
pub fn holds(when: &When, ctx: &Context) -> bool {
    evaluate_when(when, ctx).unwrap_or_else(|e| {
        warn!(condition = %when.describe(), error = %e, "condition could not be evaluated");
        false
    })
}

fn expand(value: &str, ctx: &Context) -> String {
    interpolate(value, &ctx.vars).unwrap_or_else(|_| value.to_string())
}

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Evaluate a single when condition
pub fn evaluate_when(when: &When, ctx: &Context) -> ExecutionResult<bool> {
    match &when.condition {
        WhenCondition::Equal { left, right } => Ok(expand(left, ctx) == expand(right, ctx)),

        WhenCondition::NotEqual { left, right } => Ok(expand(left, ctx) != expand(right, ctx)),

        WhenCondition::Command(cmd) => check_command(cmd, ctx),

        WhenCondition::Exists(path) => {
            let path = expand(path, ctx);
            let full_path = ctx.working_dir.join(&path);
            if !is_glob(&path) {
                return Ok(full_path.exists());
            }

            let pattern = full_path.to_string_lossy();
            let mut matches = glob::glob(&pattern).map_err(|e| ExecutionError::InvalidOption {
                name: "exists".to_string(),
                error: e.to_string(),
            })?;
            Ok(matches.any(|entry| entry.is_ok()))
        }

        WhenCondition::EnvSet(var_name) => Ok(env::var(expand(var_name, ctx)).is_ok()),

        WhenCondition::EnvNotSet(var_name) => Ok(env::var(expand(var_name, ctx)).is_err()),

        WhenCondition::OptionSet(opt_name) => Ok(ctx.vars.contains_key(opt_name)),

        WhenCondition::OptionNotSet(opt_name) => Ok(!ctx.vars.contains_key(opt_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx_with(key: &str, value: &str) -> Context {
        let mut vars = HashMap::new();
        vars.insert(key.to_string(), value.to_string());
        Context::new().with_vars(vars)
    }

    fn equal(left: &str, right: &str) -> When {
        When::new(WhenCondition::Equal {
            left: left.to_string(),
            right: right.to_string(),
        })
    }

    #[test]
    fn test_evaluate_equal() {
        let ctx = ctx_with("env", "production");
        assert!(evaluate_when(&equal("${env}", "production"), &ctx).unwrap());
        assert!(!evaluate_when(&equal("${env}", "staging"), &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_not_equal() {
        let ctx = ctx_with("env", "development");
        let when = When::new(WhenCondition::NotEqual {
            left: "${env}".to_string(),
            right: "production".to_string(),
        });

        assert!(evaluate_when(&when, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_command() {
        let ctx = Context::new();
        let success = When::new(WhenCondition::Command("true".to_string()));
        let failure = When::new(WhenCondition::Command("false".to_string()));

        assert!(evaluate_when(&success, &ctx).unwrap());
        assert!(!evaluate_when(&failure, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_exists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("test.txt"), "test").unwrap();

        let ctx = Context::new().with_working_dir(temp_dir.path().to_path_buf());
        let exists = When::new(WhenCondition::Exists("test.txt".to_string()));
        let missing = When::new(WhenCondition::Exists("nonexistent.txt".to_string()));

        assert!(evaluate_when(&exists, &ctx).unwrap());
        assert!(!evaluate_when(&missing, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_exists_glob() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("src")).unwrap();
        std::fs::write(temp_dir.path().join("src").join("main.c"), "").unwrap();

        let ctx = Context::new().with_working_dir(temp_dir.path().to_path_buf());
        let sources = When::new(WhenCondition::Exists("src/*.c".to_string()));
        let headers = When::new(WhenCondition::Exists("src/*.h".to_string()));

        assert!(evaluate_when(&sources, &ctx).unwrap());
        assert!(!evaluate_when(&headers, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_exists_interpolated_glob() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("main.c"), "").unwrap();

        let ctx = ctx_with("pattern", "*.c").with_working_dir(temp_dir.path().to_path_buf());
        let when = When::new(WhenCondition::Exists("${pattern}".to_string()));

        assert!(evaluate_when(&when, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_env_set() {
        env::set_var("TEST_KILN_VAR", "value");

        let ctx = Context::new();
        let set = When::new(WhenCondition::EnvSet("TEST_KILN_VAR".to_string()));
        let not_set = When::new(WhenCondition::EnvNotSet("TEST_KILN_VAR".to_string()));

        assert!(evaluate_when(&set, &ctx).unwrap());
        assert!(!evaluate_when(&not_set, &ctx).unwrap());

        env::remove_var("TEST_KILN_VAR");
    }

    #[test]
    fn test_evaluate_option_set() {
        let ctx = ctx_with("release", "1");
        let set = When::new(WhenCondition::OptionSet("release".to_string()));
        let not_set = When::new(WhenCondition::OptionNotSet("release".to_string()));

        assert!(evaluate_when(&set, &ctx).unwrap());
        assert!(!evaluate_when(&not_set, &ctx).unwrap());
    }

    #[test]
    fn test_evaluate_when_list_one_false() {
        let ctx = ctx_with("env", "development");
        let when_list = vec![
            equal("${env}", "production"),
            When::new(WhenCondition::Command("true".to_string())),
        ];

        assert!(!evaluate_when_list(&when_list, &ctx).unwrap());
    }

    #[test]
    fn test_holds_treats_errors_as_unmet() {
        let ctx = Context::new().with_interpreter(Vec::new());
        let when = When::new(WhenCondition::Command("true".to_string()));

        assert!(!holds(&when, &ctx));
    }
}
