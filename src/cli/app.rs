//! Main CLI application

use crate::config::{build_graph, build_hooks, find_config_file, load_dotenv, parse_config_file};
use crate::container::{Container, ContainerBuilder, Lifetime};
use crate::runner::{
    Context, DefaultExecutionStrategy, DryRunExecutionStrategy, Engine, ExecutionStrategy,
    Verbosity,
};
use crate::ui::{print_descriptions, print_tree, ConsoleReportPrinter, ReportPrinter, TracingReportPrinter};
use anyhow::{bail, Context as _};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Build the clap command
pub fn build_cli() -> Command {
    Command::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A build automation engine driven by YAML build scripts")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Task to run (defaults to the script's default target)"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to kiln.yml build script"),
        )
        .arg(
            Arg::new("exclusive")
                .short('e')
                .long("exclusive")
                .help("Run the target only, without its dependencies")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Show what would run without running anything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tree")
                .long("tree")
                .help("Print the dependency tree of the target")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("description")
                .short('d')
                .long("description")
                .help("List tasks with their descriptions")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("var")
                .long("var")
                .value_name("KEY=VALUE")
                .help("Set a variable (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(value_parser!(Shell))
                .help("Print a shell completion script"),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Install the diagnostics subscriber. `KILN_LOG` (or `RUST_LOG`) overrides
/// the level picked from the verbosity.
pub fn init_logging(verbosity: Verbosity) {
    let default = if verbosity >= Verbosity::Verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("KILN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse `--var KEY=VALUE` pairs
fn parse_vars(matches: &ArgMatches) -> anyhow::Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for pair in matches.get_many::<String>("var").into_iter().flatten() {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid --var '{}': expected KEY=VALUE", pair);
        };
        if key.is_empty() {
            bail!("Invalid --var '{}': the key is empty", pair);
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// Wire the services of one run
pub fn build_container(dry_run: bool, verbosity: Verbosity) -> Container {
    let builder = if dry_run {
        ContainerBuilder::new().register_factory::<dyn ExecutionStrategy, _>(Lifetime::Singleton, |_| {
            let strategy: Rc<dyn ExecutionStrategy> = Rc::new(DryRunExecutionStrategy::new());
            Ok(strategy)
        })
    } else {
        ContainerBuilder::new().register_factory::<dyn ExecutionStrategy, _>(Lifetime::Singleton, |_| {
            let strategy: Rc<dyn ExecutionStrategy> = Rc::new(DefaultExecutionStrategy::new());
            Ok(strategy)
        })
    };

    builder
        .register_instance::<dyn ReportPrinter>(Rc::new(ConsoleReportPrinter::new(verbosity)))
        .register_instance::<dyn ReportPrinter>(Rc::new(TracingReportPrinter))
        .build()
}

/// Run the CLI application with the process arguments
pub fn run() -> anyhow::Result<()> {
    run_from(std::env::args_os())
}

/// Run the CLI application with provided arguments
pub fn run_from<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_cli().get_matches_from(args);

    if let Some(shell) = matches.get_one::<Shell>("completions") {
        clap_complete::generate(*shell, &mut build_cli(), "kiln", &mut io::stdout());
        return Ok(());
    }

    let verbosity = get_verbosity(&matches);
    init_logging(verbosity);

    let config_path = match matches.get_one::<PathBuf>("file") {
        Some(path) => fs::canonicalize(path)
            .with_context(|| format!("Build script '{}' not found", path.display()))?,
        None => find_config_file()?,
    };
    let config = parse_config_file(&config_path)
        .with_context(|| format!("Failed to load '{}'", config_path.display()))?;
    debug!(path = %config_path.display(), tasks = config.tasks.len(), "loaded build script");

    let graph = build_graph(&config)?;

    if matches.get_flag("description") {
        print_descriptions(&graph);
        return Ok(());
    }

    let Some(target) = matches
        .get_one::<String>("target")
        .cloned()
        .or_else(|| config.default.clone())
    else {
        build_cli().print_help()?;
        println!();
        return Ok(());
    };

    if matches.get_flag("tree") {
        print_tree(&graph, &target)?;
        return Ok(());
    }

    let mut ctx = Context::new()
        .with_config_path(config_path.clone())
        .with_verbosity(verbosity);
    let config_dir = ctx.config_dir();

    let mut vars = load_dotenv(&config, &config_dir)?;
    vars.extend(parse_vars(&matches)?);
    ctx = ctx.with_working_dir(config_dir).with_vars(vars);

    if let Some(interpreter) = &config.interpreter {
        ctx = ctx.with_interpreter(interpreter.clone());
    }

    let container = build_container(matches.get_flag("dry-run"), verbosity);
    let engine = Engine::from_container(graph, &container)?.with_hooks(build_hooks(&config));

    let result = engine.run_target(&mut ctx, &target, matches.get_flag("exclusive"));

    for printer in container.resolve_all::<dyn ReportPrinter>()? {
        printer.print(ctx.report());
    }

    result?;
    Ok(())
}
