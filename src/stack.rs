//! Stack document model: variables, modules, resources, and root outputs.
//!
//! A stack file is a YAML document with three top-level sections:
//!
//! ```yaml
//! variables:
//!   region:
//!     default: us-east-1
//!
//! modules:
//!   vpc:
//!     inputs:
//!       cidr: "10.30.0.0/16"
//!     resources:
//!       - kind: aws_vpc
//!         payload: { ... opaque ... }
//!     outputs:
//!       id: "${resource.aws_vpc.id}"
//!
//! outputs:
//!   vpc_id: "${module.vpc.id}"
//! ```
//!
//! Resource payloads are opaque: they are carried as raw YAML, never
//! interpreted, and handed through to the external provisioning engine
//! unchanged. Loading compiles every binding into the expression algebra
//! and validates the document's structure; all entities are constructed
//! once per run and treated as an immutable snapshot thereafter.

use crate::error::{Error, Result};
use crate::expr::{self, Expr, Reference};
use crate::value::Value;
use crate::vars::VarSpec;
use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A loaded, compiled stack document.
#[derive(Debug, Clone)]
pub struct Stack {
    /// Declared variables, in declaration order.
    pub variables: IndexMap<String, VarSpec>,
    /// Module nodes, in declaration order.
    pub modules: IndexMap<String, ModuleSpec>,
    /// Parent-level outputs, in declaration order.
    pub outputs: IndexMap<String, Expr>,
    /// Path the stack was loaded from, if any.
    pub source_path: Option<PathBuf>,
}

/// A named unit of declarative configuration with typed inputs and outputs,
/// wrapping a set of opaque resource declarations.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    /// Module name.
    pub name: String,
    /// Bound input expressions, evaluated against the root scope.
    pub inputs: IndexMap<String, Expr>,
    /// Opaque resource declarations, threaded through unchanged.
    pub resources: Vec<ResourceDecl>,
    /// Output expressions, evaluated against the module's resolved inputs
    /// and its declared resources.
    pub outputs: IndexMap<String, Expr>,
}

impl ModuleSpec {
    /// True when the module declares a resource of the given kind.
    pub fn has_resource(&self, kind: &str) -> bool {
        self.resources.iter().any(|r| r.kind == kind)
    }

    /// Resolves the module's outputs from its already-evaluated inputs.
    ///
    /// Pure: each output is a function of `inputs` and the declared
    /// resources only. Resource attributes evaluate to the deterministic
    /// placeholder `<module>.<kind>.<attr>`, since real attribute values
    /// only exist once the external provisioning engine has run.
    pub fn resolve(&self, inputs: &IndexMap<String, Value>) -> Result<ResolvedModule> {
        let scope = ModuleScope {
            module: &self.name,
            inputs,
        };

        let mut outputs = IndexMap::with_capacity(self.outputs.len());
        for (name, expr) in &self.outputs {
            let context = format!("module '{}' output '{}'", self.name, name);
            outputs.insert(name.clone(), expr.eval(&scope, &context)?);
        }

        Ok(ResolvedModule {
            name: self.name.clone(),
            inputs: inputs.clone(),
            outputs,
        })
    }
}

/// Evaluation scope inside a module body: `var.*` resolves against the
/// module's bound inputs, `resource.*.*` against its declarations.
struct ModuleScope<'a> {
    module: &'a str,
    inputs: &'a IndexMap<String, Value>,
}

impl expr::Scope for ModuleScope<'_> {
    fn var(&self, name: &str) -> Option<Value> {
        self.inputs.get(name).cloned()
    }

    fn module_output(&self, _: &str, _: &str) -> Option<Value> {
        None
    }

    fn resource_attr(&self, kind: &str, attr: &str) -> Option<Value> {
        Some(Value::scalar(format!("{}.{}.{}", self.module, kind, attr)))
    }
}

/// A fully evaluated module: resolved inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    /// Module name.
    pub name: String,
    /// Resolved input values.
    pub inputs: IndexMap<String, Value>,
    /// Resolved output values.
    pub outputs: IndexMap<String, Value>,
}

/// An opaque description of a single infrastructure object. Interpreted only
/// by the external provisioning engine; the resolver threads the payload
/// through byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    /// Resource kind (e.g. `aws_vpc`, `aws_iam_role`).
    pub kind: String,
    /// Opaque payload. Never inspected.
    #[serde(default)]
    pub payload: serde_yaml::Value,
}

// Raw (pre-compilation) serde shapes. Bindings stay as YAML values until
// the expression compiler has a chance to reject malformed interpolations
// with a useful message.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStack {
    #[serde(default, deserialize_with = "unique_variables")]
    variables: IndexMap<String, VarSpec>,
    #[serde(default, deserialize_with = "unique_modules")]
    modules: IndexMap<String, RawModule>,
    #[serde(default, deserialize_with = "unique_outputs")]
    outputs: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    #[serde(default, deserialize_with = "unique_inputs")]
    inputs: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    resources: Vec<ResourceDecl>,
    #[serde(default, deserialize_with = "unique_outputs")]
    outputs: IndexMap<String, serde_yaml::Value>,
}

// serde_yaml keeps the last entry when a YAML mapping repeats a key, so each
// named section deserializes through a visitor that rejects duplicates.
fn unique_map<'de, D, T>(
    deserializer: D,
    what: &'static str,
) -> std::result::Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct UniqueMap<T> {
        what: &'static str,
        marker: PhantomData<T>,
    }

    impl<'de, T: Deserialize<'de>> Visitor<'de> for UniqueMap<T> {
        type Value = IndexMap<String, T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a mapping with unique {} names", self.what)
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, value)) = access.next_entry::<String, T>()? {
                if map.insert(name.clone(), value).is_some() {
                    return Err(de::Error::custom(format!(
                        "duplicate {} '{}'",
                        self.what, name
                    )));
                }
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueMap {
        what,
        marker: PhantomData,
    })
}

fn unique_variables<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<IndexMap<String, VarSpec>, D::Error> {
    unique_map(d, "variable")
}

fn unique_modules<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<IndexMap<String, RawModule>, D::Error> {
    unique_map(d, "module")
}

fn unique_inputs<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<IndexMap<String, serde_yaml::Value>, D::Error> {
    unique_map(d, "input")
}

fn unique_outputs<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<IndexMap<String, serde_yaml::Value>, D::Error> {
    unique_map(d, "output")
}

impl Stack {
    /// Loads and compiles a stack from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::stack_parse(path, e.to_string()))?;
        let mut stack = Self::from_str_inner(&content)
            .map_err(|e| Error::stack_parse(path, e.to_string()))?;
        stack.source_path = Some(path.to_path_buf());
        Ok(stack)
    }

    /// Parses and compiles a stack from a YAML string.
    pub fn from_str(content: &str) -> Result<Self> {
        Self::from_str_inner(content)
    }

    fn from_str_inner(content: &str) -> Result<Self> {
        let raw: RawStack = serde_yaml::from_str(content)?;

        let mut modules = IndexMap::with_capacity(raw.modules.len());
        for (name, raw_module) in raw.modules {
            let module = compile_module(&name, raw_module)?;
            modules.insert(name, module);
        }

        let mut outputs = IndexMap::with_capacity(raw.outputs.len());
        for (name, binding) in raw.outputs {
            let expr = expr::parse_binding(&binding)?;
            validate_projection(&name, &expr)?;
            outputs.insert(name, expr);
        }

        Ok(Stack {
            variables: raw.variables,
            modules,
            outputs,
            source_path: None,
        })
    }

    /// Returns the module names in declaration order.
    pub fn module_names(&self) -> impl Iterator<Item = &String> {
        self.modules.keys()
    }

    /// Names of root variables referenced anywhere in the stack: module
    /// input bindings plus correspondence constraints. Used by `validate`
    /// to warn about declared-but-unused variables.
    pub fn referenced_variables(&self) -> indexmap::IndexSet<String> {
        let mut used = indexmap::IndexSet::new();
        for module in self.modules.values() {
            for input in module.inputs.values() {
                for reference in input.references() {
                    if let Reference::Var(name) = reference {
                        used.insert(name);
                    }
                }
            }
        }
        for spec in self.variables.values() {
            if let Some(target) = &spec.matches_length_of {
                used.insert(target.clone());
            }
        }
        used
    }
}

fn compile_module(name: &str, raw: RawModule) -> Result<ModuleSpec> {
    let mut inputs = IndexMap::with_capacity(raw.inputs.len());
    for (input_name, binding) in raw.inputs {
        let expr = expr::parse_binding(&binding)?;
        for reference in expr.references() {
            match reference {
                Reference::ModuleOutput { module, .. } if module == name => {
                    return Err(Error::SelfReference {
                        module: name.to_string(),
                        input: input_name,
                    });
                }
                Reference::ResourceAttr { kind, attr } => {
                    return Err(Error::expr_parse(
                        format!("resource.{}.{}", kind, attr),
                        format!(
                            "module '{}' input '{}': resource references are only \
                             valid in module outputs",
                            name, input_name
                        ),
                    ));
                }
                _ => {}
            }
        }
        inputs.insert(input_name, expr);
    }

    let mut outputs = IndexMap::with_capacity(raw.outputs.len());
    for (output_name, binding) in raw.outputs {
        let expr = expr::parse_binding(&binding)?;
        for reference in expr.references() {
            match reference {
                Reference::ModuleOutput { module, output } => {
                    return Err(Error::expr_parse(
                        format!("module.{}.{}", module, output),
                        format!(
                            "module '{}' output '{}': outputs are pure functions of \
                             the module's own inputs and resources",
                            name, output_name
                        ),
                    ));
                }
                Reference::ResourceAttr { kind, .. } => {
                    if !raw.resources.iter().any(|r| r.kind == kind) {
                        return Err(Error::unresolved_reference(
                            format!("module '{}' output '{}'", name, output_name),
                            format!("resource.{}", kind),
                        ));
                    }
                }
                Reference::Var(_) => {}
            }
        }
        outputs.insert(output_name, expr);
    }

    Ok(ModuleSpec {
        name: name.to_string(),
        inputs,
        resources: raw.resources,
        outputs,
    })
}

/// Parent outputs re-export module outputs, optionally through the
/// element/concat derived forms. Anything else is out of scope for the
/// projector.
fn validate_projection(output: &str, expr: &Expr) -> Result<()> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::ModuleOutput { .. } => Ok(()),
        Expr::Element { list, .. } => validate_projection(output, list),
        Expr::Concat(parts) => {
            for part in parts {
                validate_projection(output, part)?;
            }
            Ok(())
        }
        Expr::List(elements) => {
            for element in elements {
                validate_projection(output, element)?;
            }
            Ok(())
        }
        Expr::Var(name) => Err(Error::InvalidProjection {
            output: output.to_string(),
            message: format!(
                "references variable '{}'; parent outputs may only re-export \
                 module outputs",
                name
            ),
        }),
        Expr::ResourceAttr { kind, attr } => Err(Error::InvalidProjection {
            output: output.to_string(),
            message: format!(
                "references resource attribute '{}.{}'; parent outputs may only \
                 re-export module outputs",
                kind, attr
            ),
        }),
        Expr::Interpolate(_) => Err(Error::InvalidProjection {
            output: output.to_string(),
            message: "string interpolation is not a permitted projection; only \
                      element() and concat() derived forms are supported"
                .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
variables:
  cidr:
    default: 10.30.0.0/16
  azs:
    type: list
    default: [us-east-1a, us-east-1b]

modules:
  vpc:
    inputs:
      cidr: "${var.cidr}"
      azs: "${var.azs}"
    resources:
      - kind: aws_vpc
        payload:
          enable_dns_support: true
    outputs:
      id: "${resource.aws_vpc.id}"
      cidr: "${var.cidr}"

outputs:
  vpc_id: "${module.vpc.id}"
"#;

    #[test]
    fn test_parse_sample() {
        let stack = Stack::from_str(SAMPLE).unwrap();
        assert_eq!(stack.variables.len(), 2);
        assert_eq!(stack.modules.len(), 1);
        assert_eq!(stack.outputs.len(), 1);

        let vpc = &stack.modules["vpc"];
        assert_eq!(vpc.name, "vpc");
        assert_eq!(vpc.inputs.len(), 2);
        assert!(vpc.has_resource("aws_vpc"));
    }

    #[test]
    fn test_payload_is_opaque() {
        let stack = Stack::from_str(SAMPLE).unwrap();
        let payload = &stack.modules["vpc"].resources[0].payload;
        // Round-trips unchanged; the resolver never looks inside.
        let rendered = serde_yaml::to_string(payload).unwrap();
        assert!(rendered.contains("enable_dns_support"));
    }

    #[test]
    fn test_module_resolve_resource_placeholder() {
        let stack = Stack::from_str(SAMPLE).unwrap();
        let mut inputs = IndexMap::new();
        inputs.insert("cidr".to_string(), Value::scalar("10.30.0.0/16"));
        inputs.insert("azs".to_string(), Value::list(["us-east-1a", "us-east-1b"]));

        let resolved = stack.modules["vpc"].resolve(&inputs).unwrap();
        assert_eq!(resolved.outputs["id"], Value::scalar("vpc.aws_vpc.id"));
        assert_eq!(resolved.outputs["cidr"], Value::scalar("10.30.0.0/16"));
    }

    #[test]
    fn test_self_reference_rejected() {
        let err = Stack::from_str(
            r#"
modules:
  vpc:
    inputs:
      own: "${module.vpc.id}"
    outputs:
      id: "x"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SelfReference { .. }));
    }

    #[test]
    fn test_module_output_cannot_reference_other_modules() {
        let err = Stack::from_str(
            r#"
modules:
  a:
    outputs:
      leak: "${module.b.id}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ExprParse { .. }));
    }

    #[test]
    fn test_output_resource_must_be_declared() {
        let err = Stack::from_str(
            r#"
modules:
  vpc:
    outputs:
      id: "${resource.aws_vpc.id}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_projection_rejects_var_reference() {
        let err = Stack::from_str(
            r#"
outputs:
  region: "${var.region}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidProjection { .. }));
    }

    #[test]
    fn test_projection_allows_element_and_concat() {
        let stack = Stack::from_str(
            r#"
outputs:
  first_subnet: "${element(module.vpc.subnets, 0)}"
  all: "${concat(module.vpc.subnets, module.dmz.subnets)}"
"#,
        )
        .unwrap();
        assert_eq!(stack.outputs.len(), 2);
    }

    #[test]
    fn test_referenced_variables() {
        let stack = Stack::from_str(SAMPLE).unwrap();
        let used = stack.referenced_variables();
        assert!(used.contains("cidr"));
        assert!(used.contains("azs"));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        assert!(Stack::from_str("resources: []").is_err());
    }

    #[test]
    fn test_duplicate_module_names_rejected() {
        let err = Stack::from_str(
            r#"
modules:
  vpc:
    outputs:
      id: "vpc-1"
  vpc:
    outputs:
      id: "vpc-2"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate module 'vpc'"));
    }

    #[test]
    fn test_duplicate_module_output_names_rejected() {
        let err = Stack::from_str(
            r#"
modules:
  vpc:
    outputs:
      id: "vpc-1"
      id: "vpc-2"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate output 'id'"));
    }

    #[test]
    fn test_duplicate_root_output_names_rejected() {
        let err = Stack::from_str(
            r#"
outputs:
  vpc_id: "${module.vpc.id}"
  vpc_id: "${module.vpc.cidr}"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate output 'vpc_id'"));
    }

    #[test]
    fn test_duplicate_variable_names_rejected() {
        let err = Stack::from_str(
            r#"
variables:
  region:
    default: us-east-1
  region:
    default: eu-west-1
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate variable 'region'"));
    }

    #[test]
    fn test_duplicate_module_name_from_file_is_stack_parse() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yml");
        writeln!(
            std::fs::File::create(&path).unwrap(),
            "modules:\n  vpc:\n    outputs: {{}}\n  vpc:\n    outputs: {{}}"
        )
        .unwrap();

        let err = Stack::from_file(&path).unwrap_err();
        match err {
            Error::StackParse { message, .. } => {
                assert!(message.contains("duplicate module 'vpc'"));
            }
            other => panic!("expected StackParse, got {:?}", other),
        }
    }
}
