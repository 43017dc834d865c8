//! Expression algebra and interpolation for Modwire.
//!
//! Stack files embed `${...}` interpolations inside string values. Rather
//! than free-form text substitution, every binding is compiled into a small
//! closed expression algebra and evaluated by a single interpreter, which
//! keeps the resolver statically analyzable:
//!
//! - `${var.name}` - variable reference
//! - `${module.<mod>.<output>}` - module output reference
//! - `${resource.<kind>.<attr>}` - resource attribute placeholder
//! - `${element(<expr>, <idx>)}` - list element indexing
//! - `${concat(<expr>, <expr>, ...)}` - list concatenation
//!
//! Text surrounding interpolations concatenates as strings. `$${` escapes a
//! literal `${`. Anything outside this algebra is a parse error.

use crate::error::{Error, Result};
use crate::value::Value;

/// A compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal scalar or list value.
    Literal(Value),
    /// Reference to a variable in the enclosing scope.
    Var(String),
    /// Reference to another module's output.
    ModuleOutput {
        /// Source module name
        module: String,
        /// Output name on that module
        output: String,
    },
    /// Reference to an attribute of a resource declared by the enclosing
    /// module. Evaluates to a deterministic placeholder, since real
    /// attribute values only exist after the external provisioning engine
    /// has run.
    ResourceAttr {
        /// Resource kind (e.g. `aws_vpc`)
        kind: String,
        /// Attribute name (e.g. `id`)
        attr: String,
    },
    /// `element(list, index)` - positional indexing into a list.
    Element {
        /// The list expression
        list: Box<Expr>,
        /// Zero-based index
        index: usize,
    },
    /// `concat(a, b, ...)` - list concatenation, left to right.
    Concat(Vec<Expr>),
    /// String concatenation of literal text and scalar sub-expressions,
    /// produced by mixed-text interpolation like `"prefix-${var.x}"`.
    Interpolate(Vec<Piece>),
    /// A YAML sequence binding whose elements are themselves expressions.
    /// Every element must evaluate to a scalar; the whole evaluates to a list.
    List(Vec<Expr>),
}

/// One piece of a mixed-text interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text between interpolations.
    Text(String),
    /// An embedded expression; must evaluate to a scalar.
    Expr(Expr),
}

/// A reference mentioned by an expression, as found by [`Expr::references`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `var.<name>`
    Var(String),
    /// `module.<module>.<output>`
    ModuleOutput {
        /// Source module name
        module: String,
        /// Output name
        output: String,
    },
    /// `resource.<kind>.<attr>`
    ResourceAttr {
        /// Resource kind
        kind: String,
        /// Attribute name
        attr: String,
    },
}

/// Name resolution environment for expression evaluation.
///
/// Implementations decide what `var.*`, `module.*.*`, and `resource.*.*`
/// mean in a given position; the interpreter itself is scope-agnostic.
pub trait Scope {
    /// Looks up a variable by name.
    fn var(&self, name: &str) -> Option<Value>;

    /// Looks up an output of an already-resolved module.
    fn module_output(&self, module: &str, output: &str) -> Option<Value>;

    /// Looks up a resource attribute placeholder.
    fn resource_attr(&self, kind: &str, attr: &str) -> Option<Value>;
}

impl Expr {
    /// Evaluates the expression against a scope.
    ///
    /// `context` describes where the expression appears (e.g.
    /// `module 'bastion' input 'vpc_id'`) and is used verbatim in error
    /// messages. Evaluation is pure: no I/O, no side effects.
    pub fn eval(&self, scope: &dyn Scope, context: &str) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Var(name) => scope.var(name).ok_or_else(|| {
                Error::unresolved_reference(context, format!("var.{}", name))
            }),

            Expr::ModuleOutput { module, output } => {
                scope.module_output(module, output).ok_or_else(|| {
                    Error::unresolved_reference(
                        context,
                        format!("module.{}.{}", module, output),
                    )
                })
            }

            Expr::ResourceAttr { kind, attr } => {
                scope.resource_attr(kind, attr).ok_or_else(|| {
                    Error::unresolved_reference(
                        context,
                        format!("resource.{}.{}", kind, attr),
                    )
                })
            }

            Expr::Element { list, index } => {
                let value = list.eval(scope, context)?;
                let items = value.as_list().ok_or(Error::TypeMismatch {
                    context: context.to_string(),
                    expected: "list",
                    actual: value.type_name(),
                })?;
                items
                    .get(*index)
                    .map(|s| Value::Scalar(s.clone()))
                    .ok_or(Error::IndexOutOfBounds {
                        context: context.to_string(),
                        index: *index,
                        len: items.len(),
                    })
            }

            Expr::Concat(parts) => {
                let mut joined = Vec::new();
                for part in parts {
                    let value = part.eval(scope, context)?;
                    match value {
                        Value::List(items) => joined.extend(items),
                        Value::Scalar(_) => {
                            return Err(Error::TypeMismatch {
                                context: context.to_string(),
                                expected: "list",
                                actual: "scalar",
                            })
                        }
                    }
                }
                Ok(Value::List(joined))
            }

            Expr::Interpolate(pieces) => {
                let mut rendered = String::new();
                for piece in pieces {
                    match piece {
                        Piece::Text(text) => rendered.push_str(text),
                        Piece::Expr(expr) => {
                            let value = expr.eval(scope, context)?;
                            match value {
                                Value::Scalar(s) => rendered.push_str(&s),
                                Value::List(_) => {
                                    return Err(Error::TypeMismatch {
                                        context: context.to_string(),
                                        expected: "scalar",
                                        actual: "list",
                                    })
                                }
                            }
                        }
                    }
                }
                Ok(Value::Scalar(rendered))
            }

            Expr::List(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = element.eval(scope, context)?;
                    match value {
                        Value::Scalar(s) => items.push(s),
                        Value::List(_) => {
                            return Err(Error::TypeMismatch {
                                context: context.to_string(),
                                expected: "scalar",
                                actual: "list",
                            })
                        }
                    }
                }
                Ok(Value::List(items))
            }
        }
    }

    /// Collects every reference the expression mentions, in source order.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, refs: &mut Vec<Reference>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(name) => refs.push(Reference::Var(name.clone())),
            Expr::ModuleOutput { module, output } => refs.push(Reference::ModuleOutput {
                module: module.clone(),
                output: output.clone(),
            }),
            Expr::ResourceAttr { kind, attr } => refs.push(Reference::ResourceAttr {
                kind: kind.clone(),
                attr: attr.clone(),
            }),
            Expr::Element { list, .. } => list.collect_references(refs),
            Expr::Concat(parts) => {
                for part in parts {
                    part.collect_references(refs);
                }
            }
            Expr::Interpolate(pieces) => {
                for piece in pieces {
                    if let Piece::Expr(expr) = piece {
                        expr.collect_references(refs);
                    }
                }
            }
            Expr::List(elements) => {
                for element in elements {
                    element.collect_references(refs);
                }
            }
        }
    }
}

/// Compiles a YAML binding value into an expression.
///
/// Strings go through the interpolation parser; numbers and booleans become
/// scalar literals; sequences become [`Expr::List`] with each element
/// compiled in turn. Mappings and nulls are not expressible.
pub fn parse_binding(yaml: &serde_yaml::Value) -> Result<Expr> {
    match yaml {
        serde_yaml::Value::String(s) => parse_str(s),
        serde_yaml::Value::Number(n) => Ok(Expr::Literal(Value::scalar(n.to_string()))),
        serde_yaml::Value::Bool(b) => Ok(Expr::Literal(Value::scalar(b.to_string()))),
        serde_yaml::Value::Sequence(seq) => {
            let mut elements = Vec::with_capacity(seq.len());
            for item in seq {
                elements.push(parse_binding(item)?);
            }
            Ok(Expr::List(elements))
        }
        other => Err(Error::expr_parse(
            serde_yaml::to_string(other).unwrap_or_default().trim(),
            "bindings must be strings, numbers, booleans, or sequences",
        )),
    }
}

/// Parses a string binding, compiling any `${...}` interpolations.
pub fn parse_str(input: &str) -> Result<Expr> {
    let mut pieces: Vec<Piece> = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(pos) = rest.find("${") {
        // "$${" escapes a literal "${"
        if rest[..pos].ends_with('$') {
            text.push_str(&rest[..pos - 1]);
            text.push_str("${");
            rest = &rest[pos + 2..];
            continue;
        }

        text.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let close = after.find('}').ok_or_else(|| {
            Error::expr_parse(input, "unterminated interpolation: missing '}'")
        })?;

        let term = parse_term(after[..close].trim(), input)?;
        if !text.is_empty() {
            pieces.push(Piece::Text(std::mem::take(&mut text)));
        }
        pieces.push(Piece::Expr(term));
        rest = &after[close + 1..];
    }
    text.push_str(rest);

    if pieces.is_empty() {
        return Ok(Expr::Literal(Value::scalar(text)));
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }

    // A bare "${...}" with no surrounding text is the inner expression
    // itself, which lets it produce a list.
    if pieces.len() == 1 {
        if let Piece::Expr(expr) = &pieces[0] {
            return Ok(expr.clone());
        }
    }
    Ok(Expr::Interpolate(pieces))
}

/// Parses a single term: a reference, a quoted literal, or a function call.
fn parse_term(term: &str, whole: &str) -> Result<Expr> {
    let term = term.trim();
    if term.is_empty() {
        return Err(Error::expr_parse(whole, "empty interpolation"));
    }

    // Quoted string literal, usable inside function arguments.
    if let Some(inner) = term.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| Error::expr_parse(whole, "unterminated string literal"))?;
        return Ok(Expr::Literal(Value::scalar(inner)));
    }

    // Function call?
    if let Some(open) = term.find('(') {
        let name = term[..open].trim();
        let args = term
            .strip_suffix(')')
            .ok_or_else(|| Error::expr_parse(whole, "missing ')' in function call"))?;
        let args = &args[open + 1..];
        return parse_function(name, args, whole);
    }

    parse_reference(term, whole)
}

/// Parses the closed function set: `element` and `concat`.
fn parse_function(name: &str, args: &str, whole: &str) -> Result<Expr> {
    let args = split_args(args);
    match name {
        "element" => {
            if args.len() != 2 {
                return Err(Error::expr_parse(
                    whole,
                    format!("element() takes 2 arguments, got {}", args.len()),
                ));
            }
            let list = parse_term(args[0], whole)?;
            let index: usize = args[1].trim().parse().map_err(|_| {
                Error::expr_parse(
                    whole,
                    format!("element() index must be a non-negative integer, got '{}'", args[1].trim()),
                )
            })?;
            Ok(Expr::Element {
                list: Box::new(list),
                index,
            })
        }
        "concat" => {
            if args.is_empty() || (args.len() == 1 && args[0].trim().is_empty()) {
                return Err(Error::expr_parse(whole, "concat() takes at least 1 argument"));
            }
            let parts = args
                .iter()
                .map(|arg| parse_term(arg, whole))
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::Concat(parts))
        }
        other => Err(Error::expr_parse(
            whole,
            format!("unknown function '{}'", other),
        )),
    }
}

/// Splits function arguments on commas that are not nested in parentheses
/// or quotes.
fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

/// Parses a dotted reference: `var.x`, `module.m.o`, or `resource.k.a`.
fn parse_reference(term: &str, whole: &str) -> Result<Expr> {
    let segments: Vec<&str> = term.split('.').collect();
    if segments.iter().any(|s| s.is_empty() || !is_ident(s)) {
        return Err(Error::expr_parse(
            whole,
            format!("malformed reference '{}'", term),
        ));
    }

    match segments.as_slice() {
        ["var", name] => Ok(Expr::Var((*name).to_string())),
        ["module", module, output] => Ok(Expr::ModuleOutput {
            module: (*module).to_string(),
            output: (*output).to_string(),
        }),
        ["resource", kind, attr] => Ok(Expr::ResourceAttr {
            kind: (*kind).to_string(),
            attr: (*attr).to_string(),
        }),
        _ => Err(Error::expr_parse(
            whole,
            format!(
                "unrecognized reference '{}': expected var.<name>, \
                 module.<module>.<output>, or resource.<kind>.<attr>",
                term
            ),
        )),
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
