//! Variable interpolation for strings
//!
//! This module handles parsing and replacing variables in strings using the ${var} syntax.

use crate::error::{InterpolationError, InterpolationResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;

/// Substitution passes before a self-referencing variable is reported
const MAX_PASSES: usize = 32;

static VARIABLE: OnceLock<Regex> = OnceLock::new();

fn variable_pattern() -> InterpolationResult<&'static Regex> {
    if let Some(re) = VARIABLE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| InterpolationError::InvalidSyntax(e.to_string()))?;
    Ok(VARIABLE.get_or_init(|| re))
}

/// Interpolate variables in a string
///
/// Supports:
/// - `${var}` - variable from context
/// - Environment variables (when not found in context)
///
/// Unknown variables are left as written. Values may themselves contain
/// `${...}` references, which are expanded in later passes.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let re = variable_pattern()?;
    let mut result = s.to_string();

    for _ in 0..MAX_PASSES {
        let mut changed = false;

        let next = re
            .replace_all(&result, |caps: &Captures| {
                let var_name = &caps[1];
                let value = vars.get(var_name).cloned().or_else(|| env::var(var_name).ok());
                match value {
                    Some(value) => {
                        changed = true;
                        value
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned();

        if !changed {
            return Ok(next);
        }
        result = next;
    }

    Err(InterpolationError::RecursiveInterpolation)
}

/// Interpolate with strict mode - errors on undefined variables
pub fn interpolate_strict(
    s: &str,
    vars: &HashMap<String, String>,
) -> InterpolationResult<String> {
    let result = interpolate(s, vars)?;

    if let Some(caps) = variable_pattern()?.captures(&result) {
        return Err(InterpolationError::UndefinedVariable(caps[1].to_string()));
    }

    Ok(result)
}

/// Interpolate a list of strings
pub fn interpolate_list(
    list: &[String],
    vars: &HashMap<String, String>,
) -> InterpolationResult<Vec<String>> {
    list.iter().map(|s| interpolate(s, vars)).collect()
}
