//! Error types for Kiln

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

/// Main error type for Kiln
#[derive(Error, Debug)]
pub enum KilnError {
    /// Build script errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task graph construction and resolution errors
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// Task execution errors
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Service container errors
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Build script parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find build script (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Default target '{0}' is not defined")]
    UnknownDefault(String),

    #[error("Failed to load env file '{path}': {error}")]
    EnvFile { path: PathBuf, error: String },
}

/// Errors raised while building or resolving the task graph.
///
/// These are configuration errors: they are always fatal and are raised
/// before any task runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Another task with the name '{0}' has already been added")]
    DuplicateTask(String),

    #[error("The target '{0}' was not found")]
    TargetNotFound(String),

    #[error("Task '{task}' references '{dependency}', which is not defined")]
    MissingDependency { task: String, dependency: String },

    #[error("Cyclic dependency detected: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("{0}")]
    Failed(String),

    #[error("Invalid option value for '{name}': {error}")]
    InvalidOption { name: String, error: String },

    #[error("Setup of {scope} failed: {source}")]
    SetupFailed {
        scope: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("Teardown of {scope} failed: {source}")]
    TeardownFailed {
        scope: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("{} deferred task failure(s): {}", .0.len(), DeferredList(.0))]
    Deferred(Vec<DeferredFailure>),

    #[error("Run was cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Build a free-form task failure, the usual error of a task body
    pub fn msg(message: impl Into<String>) -> Self {
        ExecutionError::Failed(message.into())
    }

    /// Attach the name of the task this error escaped from
    pub fn in_task(self, task: &str) -> Self {
        match self {
            // lifetime and aggregate errors already say where they came from
            e @ (ExecutionError::TaskFailed { .. }
            | ExecutionError::SetupFailed { .. }
            | ExecutionError::TeardownFailed { .. }
            | ExecutionError::Deferred(_)
            | ExecutionError::Cancelled) => e,
            e => ExecutionError::TaskFailed {
                task: task.to_string(),
                source: Box::new(e),
            },
        }
    }
}

/// A task failure captured under the deferred failure policy
#[derive(Debug)]
pub struct DeferredFailure {
    pub task: String,
    pub error: ExecutionError,
}

struct DeferredList<'a>(&'a [DeferredFailure]);

impl fmt::Display for DeferredList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "'{}': {}", failure.task, failure.error)?;
        }
        Ok(())
    }
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Invalid interpolation syntax: {0}")]
    InvalidSyntax(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Service container errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("No service registered for type '{0}'")]
    NotRegistered(&'static str),

    #[error("Failed to construct service '{service}': {reason}")]
    Construction {
        service: &'static str,
        reason: String,
    },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

/// Specialized result type for container operations
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;
