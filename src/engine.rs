//! The resolution pipeline.
//!
//! A single linear pass with no retries and no intermediate persisted state:
//!
//! ```text
//! Load -> ResolveVariables -> BuildGraph -> TopologicalEvaluate -> ProjectOutputs -> Done
//! ```
//!
//! Any failure at any stage aborts the whole run. The pipeline is
//! single-threaded and effect-free; actual provisioning belongs to the
//! external engine that consumes the projected outputs.

use crate::error::{Error, Result};
use crate::expr::{Reference, Scope};
use crate::graph::CompositionGraph;
use crate::stack::{ResolvedModule, Stack};
use crate::value::Value;
use crate::vars;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// The result of a full resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStack {
    /// Resolved root variables.
    pub variables: IndexMap<String, Value>,
    /// Module evaluation order.
    pub order: Vec<String>,
    /// Every module's resolved inputs and outputs, in evaluation order.
    pub modules: IndexMap<String, ResolvedModule>,
    /// Projected parent outputs: the flat mapping handed to the external
    /// provisioning engine.
    pub outputs: IndexMap<String, Value>,
}

/// Findings from `validate`: structural problems fail hard, these do not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Module evaluation order.
    pub order: Vec<String>,
    /// Non-fatal warnings, e.g. declared variables nothing references.
    pub warnings: Vec<String>,
}

/// Runs the full pipeline over a loaded stack.
pub fn resolve_stack(
    stack: &Stack,
    overrides: &IndexMap<String, Value>,
) -> Result<ResolvedStack> {
    debug!(
        modules = stack.modules.len(),
        variables = stack.variables.len(),
        "starting resolution"
    );

    let variables = vars::resolve(&stack.variables, overrides)?;
    let graph = CompositionGraph::build(stack)?;

    let mut modules: IndexMap<String, ResolvedModule> =
        IndexMap::with_capacity(stack.modules.len());

    for name in graph.evaluation_order() {
        let module = &stack.modules[name];
        let scope = RootScope {
            variables: &variables,
            modules: &modules,
        };

        let mut inputs = IndexMap::with_capacity(module.inputs.len());
        for (input_name, expr) in &module.inputs {
            let context = format!("module '{}' input '{}'", name, input_name);
            inputs.insert(input_name.clone(), expr.eval(&scope, &context)?);
        }

        debug!(module = %name, inputs = inputs.len(), "evaluating module");
        let resolved = module.resolve(&inputs)?;
        modules.insert(name.clone(), resolved);
    }

    let outputs = project_outputs(stack, &modules)?;
    debug!(outputs = outputs.len(), "resolution complete");

    Ok(ResolvedStack {
        variables,
        order: graph.evaluation_order().to_vec(),
        modules,
        outputs,
    })
}

/// Resolves variables and builds the graph without evaluating modules.
///
/// Structural errors (missing values, arity, cycles, dangling references)
/// fail; declared-but-unreferenced variables come back as warnings.
pub fn validate(
    stack: &Stack,
    overrides: &IndexMap<String, Value>,
) -> Result<ValidationReport> {
    vars::resolve(&stack.variables, overrides)?;
    let graph = CompositionGraph::build(stack)?;
    check_projection_targets(stack)?;

    let referenced = stack.referenced_variables();
    let warnings = stack
        .variables
        .keys()
        .filter(|name| !referenced.contains(*name))
        .map(|name| format!("variable '{}' is declared but never referenced", name))
        .collect();

    Ok(ValidationReport {
        order: graph.evaluation_order().to_vec(),
        warnings,
    })
}

/// The Output Projector: re-exports selected module outputs under
/// parent-level names.
fn project_outputs(
    stack: &Stack,
    modules: &IndexMap<String, ResolvedModule>,
) -> Result<IndexMap<String, Value>> {
    let mut outputs = IndexMap::with_capacity(stack.outputs.len());

    for (name, expr) in &stack.outputs {
        // Missing sources are UnknownOutput, distinct from the dangling
        // module-to-module references caught while wiring the graph.
        for reference in expr.references() {
            if let Reference::ModuleOutput { module, output } = reference {
                let known = modules
                    .get(&module)
                    .map(|m| m.outputs.contains_key(&output))
                    .unwrap_or(false);
                if !known {
                    return Err(Error::UnknownOutput {
                        parent: name.clone(),
                        module,
                        output,
                    });
                }
            }
        }

        let scope = ProjectionScope { modules };
        let context = format!("output '{}'", name);
        outputs.insert(name.clone(), expr.eval(&scope, &context)?);
    }

    Ok(outputs)
}

/// Static check that parent outputs only name modules and outputs the stack
/// declares, used by `validate` before any evaluation happens.
fn check_projection_targets(stack: &Stack) -> Result<()> {
    for (name, expr) in &stack.outputs {
        for reference in expr.references() {
            if let Reference::ModuleOutput { module, output } = reference {
                let known = stack
                    .modules
                    .get(&module)
                    .map(|m| m.outputs.contains_key(&output))
                    .unwrap_or(false);
                if !known {
                    return Err(Error::UnknownOutput {
                        parent: name.clone(),
                        module,
                        output,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Evaluation scope for module inputs: root variables plus the outputs of
/// already-evaluated modules.
struct RootScope<'a> {
    variables: &'a IndexMap<String, Value>,
    modules: &'a IndexMap<String, ResolvedModule>,
}

impl Scope for RootScope<'_> {
    fn var(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn module_output(&self, module: &str, output: &str) -> Option<Value> {
        self.modules
            .get(module)
            .and_then(|m| m.outputs.get(output))
            .cloned()
    }

    fn resource_attr(&self, _: &str, _: &str) -> Option<Value> {
        None
    }
}

/// Evaluation scope for parent outputs: module outputs only.
struct ProjectionScope<'a> {
    modules: &'a IndexMap<String, ResolvedModule>,
}

impl Scope for ProjectionScope<'_> {
    fn var(&self, _: &str) -> Option<Value> {
        None
    }

    fn module_output(&self, module: &str, output: &str) -> Option<Value> {
        self.modules
            .get(module)
            .and_then(|m| m.outputs.get(output))
            .cloned()
    }

    fn resource_attr(&self, _: &str, _: &str) -> Option<Value> {
        None
    }
}
