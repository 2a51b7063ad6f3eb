//! Build script types
//!
//! This module defines the data structures that represent a kiln.yml build script.

use crate::graph::FailurePolicy;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Top-level build script structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Project name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Project usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Target to run when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Global interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Env file loaded into the run variables, relative to the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotenv: Option<String>,

    /// Runs once before the first task
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub setup: Vec<Run>,

    /// Runs once after the last task, even when the run failed
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub teardown: Vec<Run>,

    /// Runs before every executed task
    #[serde(
        rename = "task-setup",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub task_setup: Vec<Run>,

    /// Runs after every executed task
    #[serde(
        rename = "task-teardown",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub task_teardown: Vec<Run>,

    /// Tasks, in the order they appear in the file
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Description shown by --description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tasks that must run before this one
    #[serde(
        rename = "depends-on",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub depends_on: Vec<TaskRef>,

    /// Tasks this one must run before
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub before: Vec<TaskRef>,

    /// Conditions that must all hold for the task to run
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub when: Vec<When>,

    /// What a failure of this task does to the run
    #[serde(rename = "on-error", default)]
    pub on_error: FailurePolicy,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub setup: Vec<Run>,

    /// Run items to execute
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub run: Vec<Run>,

    /// Error handler - runs when the body fails; the task is recovered if it succeeds
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub error: Vec<Run>,

    /// Finally block - always executes once the body has run, even on error
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub finally: Vec<Run>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub teardown: Vec<Run>,
}

/// A reference to another task, by name or with options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TaskRef {
    Name(String),
    Detail {
        name: String,
        #[serde(default = "default_required")]
        required: bool,
    },
}

impl TaskRef {
    pub fn name(&self) -> &str {
        match self {
            TaskRef::Name(name) | TaskRef::Detail { name, .. } => name,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            TaskRef::Name(_) => true,
            TaskRef::Detail { required, .. } => *required,
        }
    }
}

fn default_required() -> bool {
    true
}

/// A run item - can be a command or environment setter
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Run {
    /// Simple string command
    SimpleCommand(String),

    /// Complex run item with conditionals and multiple actions
    Complex(RunItem),
}

/// A complex run item with conditions and actions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunItem {
    /// Conditions that must be met for this run item to execute
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub when: Vec<When>,

    /// Commands to execute
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "one_or_many")]
    pub command: Vec<Command>,

    /// Variables to set (or unset, with a null value)
    #[serde(
        rename = "set-environment",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub set_environment: IndexMap<String, Option<String>>,
}

/// A command to execute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress output
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// A conditional expression
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct When {
    /// Check if values are equal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equal: Option<WhenComparison>,

    /// Check if values are not equal
    #[serde(rename = "not-equal", skip_serializing_if = "Option::is_none")]
    pub not_equal: Option<WhenComparison>,

    /// Check if a command succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Check if a path (or glob pattern) exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,

    /// Check if environment variable is set
    #[serde(rename = "env-set", skip_serializing_if = "Option::is_none")]
    pub env_set: Option<String>,

    /// Check if environment variable is not set
    #[serde(rename = "env-not-set", skip_serializing_if = "Option::is_none")]
    pub env_not_set: Option<String>,

    /// Check if a --var option is set
    #[serde(rename = "option-set", skip_serializing_if = "Option::is_none")]
    pub option_set: Option<String>,

    /// Check if a --var option is not set
    #[serde(rename = "option-not-set", skip_serializing_if = "Option::is_none")]
    pub option_not_set: Option<String>,
}

impl When {
    /// True when no condition key is set
    pub fn is_empty(&self) -> bool {
        self.equal.is_none()
            && self.not_equal.is_none()
            && self.command.is_none()
            && self.exists.is_none()
            && self.env_set.is_none()
            && self.env_not_set.is_none()
            && self.option_set.is_none()
            && self.option_not_set.is_none()
    }
}

/// A comparison for when conditions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhenComparison {
    /// Left-hand side of comparison
    pub left: String,

    /// Right-hand side of comparison
    pub right: String,
}

/// Deserialize either a single value or a list of values into a Vec
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Null or not present
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| T::deserialize(item).map_err(D::Error::custom))
            .collect(),
        single => Ok(vec![T::deserialize(single).map_err(D::Error::custom)?]),
    }
}
