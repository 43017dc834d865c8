//! Modwire - a declarative infrastructure composition resolver
//!
//! This is the main entry point for the Modwire CLI.

use anyhow::Result;
use is_terminal::IsTerminal;
use modwire::cli::{Cli, Commands, GraphArgs, OutputFormat, StackArgs};
use modwire::config::Config;
use modwire::engine;
use modwire::graph::CompositionGraph;
use modwire::output;
use modwire::stack::Stack;
use modwire::vars;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Config is loaded first so a configured log level can seed the
    // subscriber when no -v flag is given.
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        if cli.verbosity() >= 1 {
            eprintln!("Warning: failed to load config: {}", e);
        }
        Config::default()
    });

    init_logging(cli.verbosity(), &config);

    if cli.no_color || !config.colors.enabled || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let format = cli.output_format(&config);
    if let Err(err) = run(&cli, &config, format) {
        eprintln!("Error: {}", err);
        std::process::exit(err.exit_code());
    }
    Ok(())
}

fn run(cli: &Cli, config: &Config, format: OutputFormat) -> modwire::error::Result<()> {
    match &cli.command {
        Commands::Resolve(args) => resolve(cli, config, args, format),
        Commands::Validate(args) => validate(cli, config, args, format),
        Commands::Graph(args) => graph(args, format),
        Commands::Vars(args) => list_vars(cli, config, args, format),
    }
}

/// Initialize logging from -v flags, falling back to the configured level
fn init_logging(verbosity: u8, config: &Config) {
    let filter = config.logging.filter(verbosity);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

fn resolve(
    cli: &Cli,
    config: &Config,
    args: &StackArgs,
    format: OutputFormat,
) -> modwire::error::Result<()> {
    let stack = Stack::from_file(&args.stack)?;
    let overrides = cli.collect_overrides(config)?;
    let resolved = engine::resolve_stack(&stack, &overrides)?;
    print!("{}", output::render_resolved(&resolved, format)?);
    Ok(())
}

fn validate(
    cli: &Cli,
    config: &Config,
    args: &StackArgs,
    format: OutputFormat,
) -> modwire::error::Result<()> {
    let stack = Stack::from_file(&args.stack)?;
    let overrides = cli.collect_overrides(config)?;
    let report = engine::validate(&stack, &overrides)?;
    print!("{}", output::render_validation(&report, format)?);
    Ok(())
}

fn graph(args: &GraphArgs, format: OutputFormat) -> modwire::error::Result<()> {
    let stack = Stack::from_file(&args.stack)?;
    let graph = CompositionGraph::build(&stack)?;
    if args.dot {
        print!("{}", graph.to_dot());
    } else {
        print!("{}", output::render_order(graph.evaluation_order(), format)?);
    }
    Ok(())
}

fn list_vars(
    cli: &Cli,
    config: &Config,
    args: &StackArgs,
    format: OutputFormat,
) -> modwire::error::Result<()> {
    let stack = Stack::from_file(&args.stack)?;
    let overrides = cli.collect_overrides(config)?;
    let resolved = vars::resolve(&stack.variables, &overrides)?;
    print!("{}", output::render_vars(&stack, &resolved, format)?);
    Ok(())
}
