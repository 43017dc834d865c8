//! Variable declarations and the value resolver.
//!
//! A stack declares its variables up front: an optional default, an optional
//! type (scalar or ordered list of scalars), and optionally a
//! positional-correspondence constraint against another list variable
//! (`matches_length_of`), e.g. one subnet CIDR per availability zone.
//!
//! Resolution is override-then-default: an externally supplied override wins,
//! else the declared default applies, else the run fails with
//! `MissingRequiredValue`. Correspondence constraints are checked here, at
//! resolution time, so arity defects surface before any module evaluates.

use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    /// A single scalar value (the default).
    #[default]
    Scalar,
    /// An ordered list of scalars.
    List,
}

impl VarType {
    /// Type name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            VarType::Scalar => "scalar",
            VarType::List => "list",
        }
    }

    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (VarType::Scalar, Value::Scalar(_)) | (VarType::List, Value::List(_))
        )
    }
}

/// A variable declaration in a stack file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarSpec {
    /// Declared type. Defaults to scalar; inferred as list when only a
    /// list default is given.
    #[serde(default, rename = "type")]
    pub var_type: Option<VarType>,

    /// Default value, applied when no override is supplied.
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,

    /// Human description, carried through to `modwire vars` listings.
    #[serde(default)]
    pub description: Option<String>,

    /// Name of another list variable whose element count this variable's
    /// resolved value must match exactly.
    #[serde(default)]
    pub matches_length_of: Option<String>,
}

impl VarSpec {
    /// The effective declared type, inferring `list` from a list default.
    pub fn effective_type(&self, name: &str) -> Result<VarType> {
        if let Some(t) = self.var_type {
            return Ok(t);
        }
        match &self.default {
            Some(default) => {
                let value = decode_default(name, default)?;
                Ok(match value {
                    Value::Scalar(_) => VarType::Scalar,
                    Value::List(_) => VarType::List,
                })
            }
            None => Ok(VarType::Scalar),
        }
    }
}

fn decode_default(name: &str, default: &serde_yaml::Value) -> Result<Value> {
    Value::from_yaml(default).ok_or_else(|| Error::InvalidVariableSpec {
        variable: name.to_string(),
        message: "default must be a scalar or a list of scalars".to_string(),
    })
}

/// Resolves all declared variables against externally supplied overrides.
///
/// Returns the resolved values in declaration order. Fails with
/// `MissingRequiredValue` for a variable with neither override nor default,
/// `VariableType` when an override disagrees with the declared type, and
/// `ArityMismatch` when a `matches_length_of` constraint is violated.
pub fn resolve(
    specs: &IndexMap<String, VarSpec>,
    overrides: &IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>> {
    let mut resolved: IndexMap<String, Value> = IndexMap::with_capacity(specs.len());

    for (name, spec) in specs {
        let declared = spec.effective_type(name)?;

        let value = match overrides.get(name) {
            Some(value) => {
                if !declared.matches(value) {
                    return Err(Error::VariableType {
                        variable: name.clone(),
                        expected: declared.name(),
                        actual: value.type_name(),
                    });
                }
                debug!(variable = %name, "using override");
                value.clone()
            }
            None => match &spec.default {
                Some(default) => {
                    let value = decode_default(name, default)?;
                    if !declared.matches(&value) {
                        return Err(Error::VariableType {
                            variable: name.clone(),
                            expected: declared.name(),
                            actual: value.type_name(),
                        });
                    }
                    debug!(variable = %name, "using default");
                    value
                }
                None => return Err(Error::missing_required_value(name.clone())),
            },
        };

        resolved.insert(name.clone(), value);
    }

    // Correspondence constraints are checked once every value is known, so
    // a constraint may point forward in declaration order.
    for (name, spec) in specs {
        let Some(target) = &spec.matches_length_of else {
            continue;
        };

        let value = &resolved[name];
        let items = value.as_list().ok_or_else(|| Error::InvalidVariableSpec {
            variable: name.clone(),
            message: "matches_length_of requires a list-typed variable".to_string(),
        })?;

        let target_value = resolved.get(target).ok_or_else(|| Error::InvalidVariableSpec {
            variable: name.clone(),
            message: format!("matches_length_of names unknown variable '{}'", target),
        })?;
        let expected = target_value
            .as_list()
            .ok_or_else(|| Error::InvalidVariableSpec {
                variable: name.clone(),
                message: format!("matches_length_of target '{}' is not a list", target),
            })?
            .len();

        if items.len() != expected {
            return Err(Error::ArityMismatch {
                variable: name.clone(),
                constraint: target.clone(),
                expected,
                actual: items.len(),
            });
        }
    }

    Ok(resolved)
}

/// Parses one `--var key=value` flag.
///
/// Values containing commas split into a list, matching the flag's most
/// common use for zone and CIDR lists.
pub fn parse_var_flag(flag: &str) -> Result<(String, Value)> {
    let (key, raw) = flag
        .split_once('=')
        .ok_or_else(|| Error::InvalidVarFlag(flag.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidVarFlag(flag.to_string()));
    }

    let value = if raw.contains(',') {
        Value::List(raw.split(',').map(|s| s.trim().to_string()).collect())
    } else {
        Value::scalar(raw)
    };
    Ok((key.to_string(), value))
}

/// Loads a YAML var-file: a flat mapping of variable name to scalar or list.
pub fn load_var_file(path: impl AsRef<Path>) -> Result<IndexMap<String, Value>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let raw: IndexMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)?;

    let mut vars = IndexMap::with_capacity(raw.len());
    for (name, yaml) in raw {
        let value = Value::from_yaml(&yaml).ok_or_else(|| Error::InvalidVariableSpec {
            variable: name.clone(),
            message: format!(
                "value in '{}' must be a scalar or a list of scalars",
                path.display()
            ),
        })?;
        vars.insert(name, value);
    }
    Ok(vars)
}

/// Merges override layers in increasing precedence: later layers win.
pub fn merge_overrides(layers: Vec<IndexMap<String, Value>>) -> IndexMap<String, Value> {
    let mut merged = IndexMap::new();
    for layer in layers {
        for (name, value) in layer {
            merged.insert(name, value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(default: Option<&str>) -> VarSpec {
        VarSpec {
            default: default.map(|d| serde_yaml::Value::String(d.to_string())),
            ..Default::default()
        }
    }

    fn list_spec(default: &[&str], matches: Option<&str>) -> VarSpec {
        VarSpec {
            var_type: Some(VarType::List),
            default: Some(serde_yaml::Value::Sequence(
                default
                    .iter()
                    .map(|s| serde_yaml::Value::String((*s).to_string()))
                    .collect(),
            )),
            matches_length_of: matches.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_applies_without_override() {
        let mut specs = IndexMap::new();
        specs.insert("region".to_string(), spec(Some("us-east-1")));

        let resolved = resolve(&specs, &IndexMap::new()).unwrap();
        assert_eq!(resolved["region"], Value::scalar("us-east-1"));
    }

    #[test]
    fn test_override_beats_default() {
        let mut specs = IndexMap::new();
        specs.insert("region".to_string(), spec(Some("us-east-1")));

        let mut overrides = IndexMap::new();
        overrides.insert("region".to_string(), Value::scalar("eu-west-1"));

        let resolved = resolve(&specs, &overrides).unwrap();
        assert_eq!(resolved["region"], Value::scalar("eu-west-1"));
    }

    #[test]
    fn test_missing_required() {
        let mut specs = IndexMap::new();
        specs.insert("ami".to_string(), spec(None));

        let err = resolve(&specs, &IndexMap::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredValue { variable } if variable == "ami"
        ));
    }

    #[test]
    fn test_type_inference_from_list_default() {
        let spec = list_spec(&["a", "b"], None);
        assert_eq!(spec.effective_type("azs").unwrap(), VarType::List);
    }

    #[test]
    fn test_override_type_checked() {
        let mut specs = IndexMap::new();
        specs.insert("azs".to_string(), list_spec(&["a"], None));

        let mut overrides = IndexMap::new();
        overrides.insert("azs".to_string(), Value::scalar("not-a-list"));

        let err = resolve(&specs, &overrides).unwrap_err();
        assert!(matches!(err, Error::VariableType { .. }));
    }

    #[test]
    fn test_arity_match_passes() {
        let mut specs = IndexMap::new();
        specs.insert("azs".to_string(), list_spec(&["1a", "1b"], None));
        specs.insert(
            "subnets".to_string(),
            list_spec(&["10.0.1.0/24", "10.0.2.0/24"], Some("azs")),
        );

        assert!(resolve(&specs, &IndexMap::new()).is_ok());
    }

    #[test]
    fn test_arity_mismatch_fails() {
        let mut specs = IndexMap::new();
        specs.insert("azs".to_string(), list_spec(&["1a", "1b"], None));
        specs.insert(
            "subnets".to_string(),
            list_spec(&["10.0.1.0/24"], Some("azs")),
        );

        let err = resolve(&specs, &IndexMap::new()).unwrap_err();
        match err {
            Error::ArityMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected ArityMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_constraint_unknown_target() {
        let mut specs = IndexMap::new();
        specs.insert("subnets".to_string(), list_spec(&["a"], Some("nope")));

        let err = resolve(&specs, &IndexMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidVariableSpec { .. }));
    }

    #[test]
    fn test_parse_var_flag() {
        assert_eq!(
            parse_var_flag("region=eu-west-1").unwrap(),
            ("region".to_string(), Value::scalar("eu-west-1"))
        );
        assert_eq!(
            parse_var_flag("azs=a,b,c").unwrap(),
            ("azs".to_string(), Value::list(["a", "b", "c"]))
        );
        assert!(parse_var_flag("no-equals").is_err());
    }

    #[test]
    fn test_merge_overrides_later_wins() {
        let mut low = IndexMap::new();
        low.insert("a".to_string(), Value::scalar("low"));
        low.insert("b".to_string(), Value::scalar("keep"));
        let mut high = IndexMap::new();
        high.insert("a".to_string(), Value::scalar("high"));

        let merged = merge_overrides(vec![low, high]);
        assert_eq!(merged["a"], Value::scalar("high"));
        assert_eq!(merged["b"], Value::scalar("keep"));
    }
}
