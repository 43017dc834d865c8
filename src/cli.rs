//! CLI definitions for Modwire.
//!
//! Argument parsing via clap's derive API. Command dispatch lives in the
//! binary entry point.

use crate::config::Config;
use crate::error::Result;
use crate::value::Value;
use crate::vars;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Modwire - a declarative infrastructure composition resolver
///
/// Wires module outputs to inputs, computes a deterministic evaluation
/// order, and projects resolved stack outputs for an external provisioning
/// engine.
#[derive(Parser, Debug, Clone)]
#[command(name = "modwire")]
#[command(author = "Modwire Contributors")]
#[command(version)]
#[command(about = "A declarative infrastructure composition resolver", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Variable overrides (key=value; comma-separated values become lists)
    #[arg(long = "var", global = true, action = clap::ArgAction::Append, value_name = "KEY=VALUE")]
    pub var: Vec<String>,

    /// Variable files (flat YAML maps, merged in order before --var flags)
    #[arg(long = "var-file", global = true, action = clap::ArgAction::Append, value_name = "FILE")]
    pub var_file: Vec<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "MODWIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full pipeline and print resolved outputs
    Resolve(StackArgs),
    /// Parse, resolve variables, and wire the graph without evaluating
    Validate(StackArgs),
    /// Print the module evaluation order, or the module graph as DOT
    Graph(GraphArgs),
    /// List declared variables with their resolved values
    Vars(StackArgs),
}

/// Arguments shared by commands that operate on one stack file
#[derive(clap::Args, Debug, Clone)]
pub struct StackArgs {
    /// Path to the stack file
    pub stack: PathBuf,
}

/// Arguments for the graph command
#[derive(clap::Args, Debug, Clone)]
pub struct GraphArgs {
    /// Path to the stack file
    pub stack: PathBuf,

    /// Emit Graphviz DOT instead of the evaluation order
    #[arg(long)]
    pub dot: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Verbosity level from repeated -v flags.
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    /// Effective output format: CLI flag first, then config file, then human.
    pub fn output_format(&self, config: &Config) -> OutputFormat {
        if let Some(format) = self.output {
            return format;
        }
        match config.defaults.output.as_str() {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Human,
        }
    }

    /// Collects variable overrides in increasing precedence: config
    /// var-files, then --var-file flags in order, then --var flags.
    pub fn collect_overrides(&self, config: &Config) -> Result<IndexMap<String, Value>> {
        let mut layers = Vec::new();

        for path in config.defaults.var_files.iter().chain(self.var_file.iter()) {
            layers.push(vars::load_var_file(path)?);
        }

        let mut flags = IndexMap::new();
        for flag in &self.var {
            let (key, value) = vars::parse_var_flag(flag)?;
            flags.insert(key, value);
        }
        layers.push(flags);

        Ok(vars::merge_overrides(layers))
    }
}
