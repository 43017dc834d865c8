//! Shared helpers for Modwire integration tests.

#![allow(dead_code)]

use indexmap::IndexMap;
use modwire::engine::{self, ResolvedStack};
use modwire::error::Result;
use modwire::stack::Stack;
use modwire::value::Value;

/// Parses a stack from inline YAML, panicking on parse errors.
pub fn stack(yaml: &str) -> Stack {
    Stack::from_str(yaml).expect("test stack should parse")
}

/// Runs the full pipeline with no overrides.
pub fn resolve(yaml: &str) -> Result<ResolvedStack> {
    engine::resolve_stack(&stack(yaml), &IndexMap::new())
}

/// Runs the full pipeline with the given overrides.
pub fn resolve_with(yaml: &str, overrides: &[(&str, Value)]) -> Result<ResolvedStack> {
    let overrides: IndexMap<String, Value> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    engine::resolve_stack(&stack(yaml), &overrides)
}

/// A small network stack in the shape this resolver was built for: a VPC
/// feeding security groups, DNS, and a bastion host.
pub const NETWORK_STACK: &str = r#"
variables:
  region:
    default: us-east-1
  domain:
    default: example.internal
  availability_zones:
    type: list
    default: [us-east-1a, us-east-1b, us-east-1c]
  internal_subnets:
    type: list
    default: [10.30.0.0/19, 10.30.64.0/19, 10.30.128.0/19]
    matches_length_of: availability_zones
  external_subnets:
    type: list
    default: [10.30.32.0/20, 10.30.96.0/20, 10.30.160.0/20]
    matches_length_of: availability_zones

modules:
  vpc:
    inputs:
      cidr: "10.30.0.0/16"
      azs: "${var.availability_zones}"
      internal_subnets: "${var.internal_subnets}"
      external_subnets: "${var.external_subnets}"
    resources:
      - kind: aws_vpc
        payload:
          enable_dns_support: true
          enable_dns_hostnames: true
      - kind: aws_subnet
    outputs:
      id: "${resource.aws_vpc.id}"
      cidr: "${var.cidr}"
      internal_subnets: "${var.internal_subnets}"
      external_subnets: "${var.external_subnets}"

  security_groups:
    inputs:
      vpc_id: "${module.vpc.id}"
      cidr: "${module.vpc.cidr}"
    resources:
      - kind: aws_security_group
    outputs:
      internal_ssh: "${resource.aws_security_group.id}"

  dhcp:
    inputs:
      vpc_id: "${module.vpc.id}"
      domain: "${var.domain}"
    resources:
      - kind: aws_route53_zone
      - kind: aws_vpc_dhcp_options
    outputs:
      zone_id: "${resource.aws_route53_zone.zone_id}"

  bastion:
    inputs:
      vpc_id: "${module.vpc.id}"
      subnet_id: "${element(module.vpc.external_subnets, 0)}"
      security_groups: "${module.security_groups.internal_ssh}"
    resources:
      - kind: aws_instance
    outputs:
      external_ip: "${resource.aws_instance.public_ip}"

outputs:
  vpc_id: "${module.vpc.id}"
  first_external_subnet: "${element(module.vpc.external_subnets, 0)}"
  all_subnets: "${concat(module.vpc.internal_subnets, module.vpc.external_subnets)}"
  bastion_ip: "${module.bastion.external_ip}"
  zone_id: "${module.dhcp.zone_id}"
"#;
