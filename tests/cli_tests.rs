//! CLI integration tests: subcommands, output formats, and exit codes.

mod common;

use assert_cmd::Command;
use common::NETWORK_STACK;
use predicates::prelude::*;
use std::path::Path;

fn modwire() -> Command {
    let mut cmd = Command::cargo_bin("modwire").unwrap();
    // Keep the environment from leaking into the test runs.
    cmd.env_remove("MODWIRE_CONFIG");
    cmd
}

fn write_stack(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("stack.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn test_resolve_prints_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("resolve")
        .arg(&stack)
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc_id = vpc.aws_vpc.id"))
        .stdout(predicate::str::contains(
            "evaluation order: vpc -> dhcp -> security_groups -> bastion",
        ));
}

#[test]
fn test_resolve_json_is_parseable() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    let output = modwire()
        .arg("resolve")
        .arg(&stack)
        .args(["--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["outputs"]["vpc_id"], "vpc.aws_vpc.id");
    assert_eq!(parsed["outputs"]["first_external_subnet"], "10.30.32.0/20");
}

#[test]
fn test_resolve_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    let run = || {
        modwire()
            .arg("resolve")
            .arg(&stack)
            .args(["--output", "json"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_var_override_changes_output() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("resolve")
        .arg(&stack)
        .args(["--var", "external_subnets=10.40.0.0/20,10.40.16.0/20,10.40.32.0/20"])
        .args(["--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.40.0.0/20"));
}

#[test]
fn test_missing_required_value_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(
        dir.path(),
        "variables:\n  ami: {}\nmodules:\n  app:\n    inputs:\n      ami: \"${var.ami}\"\n    outputs: {}\n",
    );

    modwire()
        .arg("resolve")
        .arg(&stack)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ami"));
}

#[test]
fn test_cycle_exits_2_and_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(
        dir.path(),
        r#"
modules:
  a:
    inputs: {x: "${module.b.out}"}
    outputs: {out: "1"}
  b:
    inputs: {x: "${module.a.out}"}
    outputs: {out: "2"}
"#,
    );

    modwire()
        .arg("resolve")
        .arg(&stack)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Dependency cycle detected"))
        .stderr(predicate::str::contains("a -> b -> a"));
}

#[test]
fn test_malformed_yaml_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), "modules: [not, a, mapping]");

    modwire().arg("resolve").arg(&stack).assert().failure().code(4);
}

#[test]
fn test_validate_reports_valid_stack() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("validate")
        .arg(&stack)
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack is valid"));
}

#[test]
fn test_validate_warns_about_unused_variable() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(
        dir.path(),
        r#"
variables:
  orphan:
    default: x
modules:
  app:
    outputs: {}
"#,
    );

    modwire()
        .arg("validate")
        .arg(&stack)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning:"))
        .stdout(predicate::str::contains("orphan"));
}

#[test]
fn test_graph_prints_evaluation_order() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("graph")
        .arg(&stack)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. vpc"))
        .stdout(predicate::str::contains("4. bastion"));
}

#[test]
fn test_graph_dot_output() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("graph")
        .arg(&stack)
        .arg("--dot")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph stack {"))
        .stdout(predicate::str::contains("\"vpc\" -> \"bastion\""));
}

#[test]
fn test_vars_lists_declarations() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);

    modwire()
        .arg("vars")
        .arg(&stack)
        .assert()
        .success()
        .stdout(predicate::str::contains("region"))
        .stdout(predicate::str::contains("us-east-1"))
        .stdout(predicate::str::contains("availability_zones"));
}

#[test]
fn test_var_file_flag() {
    let dir = tempfile::tempdir().unwrap();
    let stack = write_stack(dir.path(), NETWORK_STACK);
    let var_file = dir.path().join("prod.yml");
    std::fs::write(&var_file, "domain: prod.internal\n").unwrap();

    modwire()
        .arg("resolve")
        .arg(&stack)
        .arg("--var-file")
        .arg(&var_file)
        .args(["--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod.internal"));
}

#[test]
fn test_missing_stack_file_fails() {
    modwire()
        .arg("resolve")
        .arg("/nonexistent/stack.yml")
        .assert()
        .failure()
        .code(4);
}
