//! Error types for Modwire.
//!
//! This module defines the error types used throughout Modwire, providing
//! rich error information for debugging and user feedback. Every resolution
//! error is fatal to the current run: the pipeline is deterministic and
//! idempotent, so fixing the configuration and re-running is the only remedy.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Modwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Modwire.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// A variable without a default received no value from its caller.
    #[error("Missing required value for variable '{variable}'")]
    MissingRequiredValue {
        /// Variable name
        variable: String,
    },

    /// A list variable violated a declared positional-correspondence constraint.
    #[error(
        "Arity mismatch for variable '{variable}': expected {expected} element(s) \
         to match '{constraint}', got {actual}"
    )]
    ArityMismatch {
        /// Variable name
        variable: String,
        /// Name of the list variable it must correspond to
        constraint: String,
        /// Expected element count
        expected: usize,
        /// Actual element count
        actual: usize,
    },

    /// The reference graph between modules contains a cycle.
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    CycleDetected {
        /// The full cycle path, first module repeated at the end
        path: Vec<String>,
    },

    /// A reference points at a nonexistent module or output.
    #[error("Unresolved reference '{reference}' in {context}")]
    UnresolvedReference {
        /// Where the reference appears (e.g. "module 'bastion' input 'vpc_id'")
        context: String,
        /// The reference text (e.g. "module.vpc.id")
        reference: String,
    },

    /// A projected parent output names a module or output that does not
    /// exist after resolution.
    #[error("Unknown output 'module.{module}.{output}' referenced by parent output '{parent}'")]
    UnknownOutput {
        /// Parent output name
        parent: String,
        /// Source module name
        module: String,
        /// Source output name
        output: String,
    },

    // ========================================================================
    // Expression Errors
    // ========================================================================
    /// An interpolation expression could not be parsed.
    #[error("Invalid expression '{expression}': {message}")]
    ExprParse {
        /// The offending expression text
        expression: String,
        /// Error message
        message: String,
    },

    /// An expression evaluated to the wrong value type.
    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Where the expression appears
        context: String,
        /// Expected type name
        expected: &'static str,
        /// Actual type name
        actual: &'static str,
    },

    /// `element()` indexed past the end of a list.
    #[error("Index {index} out of bounds in {context}: list has {len} element(s)")]
    IndexOutOfBounds {
        /// Where the expression appears
        context: String,
        /// Requested index
        index: usize,
        /// List length
        len: usize,
    },

    // ========================================================================
    // Stack Errors
    // ========================================================================
    /// Error parsing a stack file.
    #[error("Failed to parse stack '{}': {message}", path.display())]
    StackParse {
        /// Path to the stack file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A module input references the module's own outputs.
    #[error("Module '{module}' input '{input}' references the module itself")]
    SelfReference {
        /// Module name
        module: String,
        /// Input name
        input: String,
    },

    /// A variable declaration is malformed.
    #[error("Invalid declaration for variable '{variable}': {message}")]
    InvalidVariableSpec {
        /// Variable name
        variable: String,
        /// Error message
        message: String,
    },

    /// A variable override does not match the declared type.
    #[error("Invalid value for variable '{variable}': expected {expected}, got {actual}")]
    VariableType {
        /// Variable name
        variable: String,
        /// Declared type name
        expected: &'static str,
        /// Supplied type name
        actual: &'static str,
    },

    /// A parent output uses an expression form the projector does not permit.
    #[error("Invalid parent output '{output}': {message}")]
    InvalidProjection {
        /// Parent output name
        output: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A `--var` flag was not of the form `key=value`.
    #[error("Invalid variable override '{0}': expected key=value")]
    InvalidVarFlag(String),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a missing-required-value error.
    pub fn missing_required_value(variable: impl Into<String>) -> Self {
        Self::MissingRequiredValue {
            variable: variable.into(),
        }
    }

    /// Creates a cycle-detected error from the participating module names.
    pub fn cycle_detected(path: Vec<String>) -> Self {
        Self::CycleDetected { path }
    }

    /// Creates an unresolved-reference error.
    pub fn unresolved_reference(
        context: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            context: context.into(),
            reference: reference.into(),
        }
    }

    /// Creates an expression parse error.
    pub fn expr_parse(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExprParse {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates a stack parse error.
    pub fn stack_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StackParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingRequiredValue { .. }
            | Error::ArityMismatch { .. }
            | Error::CycleDetected { .. }
            | Error::UnresolvedReference { .. }
            | Error::UnknownOutput { .. } => 2,
            Error::ExprParse { .. }
            | Error::TypeMismatch { .. }
            | Error::IndexOutOfBounds { .. } => 3,
            Error::StackParse { .. }
            | Error::SelfReference { .. }
            | Error::InvalidVariableSpec { .. }
            | Error::VariableType { .. }
            | Error::InvalidProjection { .. }
            | Error::YamlParse(_) => 4,
            Error::InvalidVarFlag(_) => 5,
            _ => 1,
        }
    }
}
