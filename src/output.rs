//! Output formatting for Modwire.
//!
//! Renders resolved stacks, validation reports, and variable listings in
//! human-readable, JSON, and YAML forms. Human output uses color when the
//! terminal supports it; machine formats are stable and deterministic.

use crate::cli::OutputFormat;
use crate::engine::{ResolvedStack, ValidationReport};
use crate::error::Result;
use crate::stack::Stack;
use crate::value::Value;
use colored::Colorize;
use indexmap::IndexMap;

/// Renders a fully resolved stack.
pub fn render_resolved(resolved: &ResolvedStack, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(resolved)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(resolved)?),
        OutputFormat::Human => Ok(render_resolved_human(resolved)),
    }
}

fn render_resolved_human(resolved: &ResolvedStack) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} ({} module(s), {} variable(s))\n",
        "Resolved stack".bold(),
        resolved.modules.len(),
        resolved.variables.len()
    ));

    if !resolved.order.is_empty() {
        out.push_str(&format!(
            "{} {}\n",
            "evaluation order:".dimmed(),
            resolved.order.join(" -> ")
        ));
    }

    for module in resolved.modules.values() {
        out.push_str(&format!("\n{} {}\n", "module".cyan().bold(), module.name.bold()));
        for (name, value) in &module.inputs {
            out.push_str(&format!("  {} {} = {}\n", "in ".dimmed(), name, value));
        }
        for (name, value) in &module.outputs {
            out.push_str(&format!("  {} {} = {}\n", "out".green(), name, value));
        }
    }

    if !resolved.outputs.is_empty() {
        out.push_str(&format!("\n{}\n", "Outputs".bold()));
        for (name, value) in &resolved.outputs {
            out.push_str(&format!("  {} = {}\n", name.green().bold(), value));
        }
    }

    out
}

/// Renders a validation report.
pub fn render_validation(report: &ValidationReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(report)?),
        OutputFormat::Human => {
            let mut out = String::new();
            out.push_str(&format!("{}\n", "Stack is valid".green().bold()));
            if !report.order.is_empty() {
                out.push_str(&format!(
                    "{} {}\n",
                    "evaluation order:".dimmed(),
                    report.order.join(" -> ")
                ));
            }
            for warning in &report.warnings {
                out.push_str(&format!("{} {}\n", "warning:".yellow().bold(), warning));
            }
            Ok(out)
        }
    }
}

/// Renders the declared variables alongside their resolved values.
pub fn render_vars(
    stack: &Stack,
    resolved: &IndexMap<String, Value>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            for (name, spec) in &stack.variables {
                let var_type = spec.effective_type(name)?;
                out.push_str(&format!(
                    "{} ({})",
                    name.bold(),
                    var_type.name().dimmed()
                ));
                if let Some(value) = resolved.get(name) {
                    out.push_str(&format!(" = {}", value));
                }
                out.push('\n');
                if let Some(description) = &spec.description {
                    out.push_str(&format!("  {}\n", description.dimmed()));
                }
            }
            Ok(out)
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let mut entries = Vec::with_capacity(stack.variables.len());
            for (name, spec) in &stack.variables {
                entries.push(serde_json::json!({
                    "name": name,
                    "type": spec.effective_type(name)?.name(),
                    "description": spec.description,
                    "value": resolved.get(name),
                }));
            }
            match format {
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&entries)?),
                _ => Ok(serde_yaml::to_string(&entries)?),
            }
        }
    }
}

/// Renders the module evaluation order.
pub fn render_order(order: &[String], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&order)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&order)?),
        OutputFormat::Human => {
            let mut out = String::new();
            for (i, name) in order.iter().enumerate() {
                out.push_str(&format!("{:>3}. {}\n", i + 1, name));
            }
            Ok(out)
        }
    }
}
