//! # Modwire - A Declarative Infrastructure Composition Resolver
//!
//! Modwire interprets declarative module graphs of the kind found in
//! Terraform-style infrastructure repositories: named modules with typed
//! inputs and outputs, wired together by referencing each other's outputs,
//! wrapping opaque resource declarations that only an external provisioning
//! engine ever interprets.
//!
//! ## Core Concepts
//!
//! - **Stack**: a YAML document declaring variables, modules, and parent
//!   outputs
//! - **Variable**: a named value with an optional default, an optional type
//!   (scalar or ordered list), and optional arity constraints
//! - **Module**: a named unit exposing inputs and outputs around a set of
//!   opaque resource declarations
//! - **Composition graph**: the DAG formed by modules referencing each
//!   other's outputs; evaluation follows its topological order
//! - **Projection**: re-exporting selected module outputs as parent outputs,
//!   the flat mapping handed to the external provisioning engine
//!
//! ## Pipeline
//!
//! ```text
//! Load -> ResolveVariables -> BuildGraph -> TopologicalEvaluate -> ProjectOutputs -> Done
//! ```
//!
//! One linear, single-threaded, effect-free pass over an immutable
//! configuration snapshot. Any failure aborts the run; re-running after
//! fixing the configuration is the only remedy, and identical inputs always
//! produce byte-identical outputs.
//!
//! ## Quick Example
//!
//! ```rust
//! use modwire::prelude::*;
//! use indexmap::IndexMap;
//!
//! let stack = Stack::from_str(r#"
//! variables:
//!   region:
//!     default: us-east-1
//! modules:
//!   vpc:
//!     inputs:
//!       region: "${var.region}"
//!     outputs:
//!       id: "vpc-123"
//! outputs:
//!   vpc_id: "${module.vpc.id}"
//! "#).unwrap();
//!
//! let resolved = resolve_stack(&stack, &IndexMap::new()).unwrap();
//! assert_eq!(resolved.outputs["vpc_id"], Value::scalar("vpc-123"));
//! ```

#![warn(clippy::all)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and functions.

    pub use crate::engine::{resolve_stack, validate, ResolvedStack, ValidationReport};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{Expr, Reference, Scope};
    pub use crate::graph::CompositionGraph;
    pub use crate::stack::{ModuleSpec, ResolvedModule, ResourceDecl, Stack};
    pub use crate::value::Value;
    pub use crate::vars::{VarSpec, VarType};
}

/// Error types and result aliases for Modwire operations.
pub mod error;

/// The resolved value domain: scalars and ordered lists of scalars.
pub mod value;

/// The closed expression algebra, its `${...}` parser, and its interpreter.
pub mod expr;

/// Variable declarations and the value resolver (defaults, overrides, and
/// positional-correspondence arity checks).
pub mod vars;

/// The stack document model: modules, opaque resources, and parent outputs.
pub mod stack;

/// The composition graph: reference wiring, cycle rejection, and the
/// deterministic evaluation order.
pub mod graph;

/// The resolution pipeline and the output projector.
pub mod engine;

/// Output formatting: human, JSON, and YAML renderings.
pub mod output;

/// TOML configuration loading.
pub mod config;

/// CLI argument definitions.
pub mod cli;

/// Returns the current version of Modwire.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
