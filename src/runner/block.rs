//! Script blocks
//!
//! A block is the runtime form of a list of run items from the build script:
//! a task body, an error handler, a finally block or a lifetime hook. Blocks
//! are turned into the closures a task descriptor holds.

use crate::config;
use crate::error::{ExecutionError, ExecutionResult};
use crate::graph::{Action, ErrorHandler};
use crate::runner::{evaluate_when_list, execute_command, interpolate, Context};
use indexmap::IndexMap;
use std::env;

/// Variable holding the message of the error an error block is handling
pub const ERROR_VAR: &str = "KILN_ERROR";

/// An ordered list of run items
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub items: Vec<Run>,
}

impl Block {
    pub fn from_config(items: Vec<config::Run>) -> Self {
        Block {
            items: items.into_iter().map(Run::from_config).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Execute every run item, stopping at the first failure
    pub fn execute(&self, ctx: &mut Context) -> ExecutionResult<()> {
        for run in &self.items {
            run.execute(ctx)?;
        }
        Ok(())
    }

    /// The block as a hook or body action, or `None` if it has no items
    pub fn into_action(self) -> Option<Action> {
        if self.is_empty() {
            return None;
        }
        Some(Box::new(move |ctx: &mut Context| self.execute(ctx)))
    }

    /// The block as an error handler. The handled error's message is
    /// available to the block as `${KILN_ERROR}`.
    pub fn into_error_handler(self) -> Option<ErrorHandler> {
        if self.is_empty() {
            return None;
        }
        Some(Box::new(move |error: &ExecutionError, ctx: &mut Context| {
            ctx.set_var(ERROR_VAR.to_string(), error.to_string());
            self.execute(ctx)
        }))
    }
}

/// Runtime representation of a run item
#[derive(Debug, Clone)]
pub struct Run {
    /// Conditions that must be met
    pub when: Vec<When>,

    /// Commands to execute
    pub commands: Vec<Command>,

    /// Environment variables to set
    pub set_environment: IndexMap<String, Option<String>>,
}

impl Run {
    /// Create from config
    pub fn from_config(config: config::Run) -> Self {
        match config {
            config::Run::SimpleCommand(cmd) => Run {
                when: Vec::new(),
                commands: vec![Command::Simple(cmd)],
                set_environment: IndexMap::new(),
            },
            config::Run::Complex(item) => Run {
                when: item.when.into_iter().flat_map(When::all_from_config).collect(),
                commands: item
                    .command
                    .into_iter()
                    .map(Command::from_config)
                    .collect(),
                set_environment: item.set_environment,
            },
        }
    }

    /// Execute this run item if its conditions hold
    pub fn execute(&self, ctx: &mut Context) -> ExecutionResult<()> {
        if !self.when.is_empty() && !evaluate_when_list(&self.when, ctx)? {
            ctx.print_debug("Skipping run item: condition not met");
            return Ok(());
        }

        for cmd in &self.commands {
            execute_command(cmd, ctx)?;
        }

        for (key, value) in &self.set_environment {
            match value {
                Some(val) => {
                    let interpolated = interpolate(val, &ctx.vars).unwrap_or_else(|_| val.clone());
                    env::set_var(key, &interpolated);
                    ctx.set_var(key.clone(), interpolated);
                }
                None => {
                    env::remove_var(key);
                    ctx.vars.remove(key);
                }
            }
        }

        Ok(())
    }
}

/// Runtime representation of a command
#[derive(Debug, Clone)]
pub enum Command {
    /// Simple command string
    Simple(String),

    /// Complex command with options
    Complex {
        exec: String,
        print: String,
        quiet: bool,
        dir: Option<String>,
    },
}

impl Command {
    /// Create from config
    pub fn from_config(config: config::Command) -> Self {
        match config {
            config::Command::Simple(cmd) => Command::Simple(cmd),
            config::Command::Complex(detail) => Command::Complex {
                print: detail.print.clone().unwrap_or_else(|| detail.exec.clone()),
                exec: detail.exec,
                quiet: detail.quiet,
                dir: detail.dir,
            },
        }
    }

    /// Get the command to execute
    pub fn exec(&self) -> &str {
        match self {
            Command::Simple(cmd) => cmd,
            Command::Complex { exec, .. } => exec,
        }
    }

    /// Get what to print
    pub fn print(&self) -> &str {
        match self {
            Command::Simple(cmd) => cmd,
            Command::Complex { print, .. } => print,
        }
    }

    pub fn is_quiet(&self) -> bool {
        match self {
            Command::Simple(_) => false,
            Command::Complex { quiet, .. } => *quiet,
        }
    }

    /// Get the working directory
    pub fn dir(&self) -> Option<&str> {
        match self {
            Command::Simple(_) => None,
            Command::Complex { dir, .. } => dir.as_deref(),
        }
    }
}

/// Runtime representation of a when condition
#[derive(Debug, Clone)]
pub struct When {
    pub condition: WhenCondition,
}

impl When {
    pub fn new(condition: WhenCondition) -> Self {
        When { condition }
    }

    /// One condition per key set on a script `when` entry. An entry with
    /// several keys holds only when every one of them holds.
    pub fn all_from_config(config: config::When) -> Vec<When> {
        let mut conditions = Vec::new();
        if let Some(eq) = config.equal {
            conditions.push(WhenCondition::Equal {
                left: eq.left,
                right: eq.right,
            });
        }
        if let Some(ne) = config.not_equal {
            conditions.push(WhenCondition::NotEqual {
                left: ne.left,
                right: ne.right,
            });
        }
        if let Some(cmd) = config.command {
            conditions.push(WhenCondition::Command(cmd));
        }
        if let Some(path) = config.exists {
            conditions.push(WhenCondition::Exists(path));
        }
        if let Some(var) = config.env_set {
            conditions.push(WhenCondition::EnvSet(var));
        }
        if let Some(var) = config.env_not_set {
            conditions.push(WhenCondition::EnvNotSet(var));
        }
        if let Some(opt) = config.option_set {
            conditions.push(WhenCondition::OptionSet(opt));
        }
        if let Some(opt) = config.option_not_set {
            conditions.push(WhenCondition::OptionNotSet(opt));
        }

        conditions.into_iter().map(When::new).collect()
    }

    /// Human readable form, used as the skip reason when the condition fails
    pub fn describe(&self) -> String {
        match &self.condition {
            WhenCondition::Equal { left, right } => format!("'{}' does not equal '{}'", left, right),
            WhenCondition::NotEqual { left, right } => format!("'{}' equals '{}'", left, right),
            WhenCondition::Command(cmd) => format!("command '{}' failed", cmd),
            WhenCondition::Exists(path) => format!("'{}' does not exist", path),
            WhenCondition::EnvSet(var) => format!("environment variable '{}' is not set", var),
            WhenCondition::EnvNotSet(var) => format!("environment variable '{}' is set", var),
            WhenCondition::OptionSet(opt) => format!("option '{}' is not set", opt),
            WhenCondition::OptionNotSet(opt) => format!("option '{}' is set", opt),
        }
    }
}

/// Types of when conditions
#[derive(Debug, Clone)]
pub enum WhenCondition {
    Equal { left: String, right: String },
    NotEqual { left: String, right: String },
    Command(String),
    Exists(String),
    EnvSet(String),
    EnvNotSet(String),
    OptionSet(String),
    OptionNotSet(String),
}
