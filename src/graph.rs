//! Composition graph: reference wiring and evaluation order.
//!
//! Modules reference each other's outputs through their bound input
//! expressions. This module derives those `producer.output -> consumer.input`
//! edges, validates every reference against the declared interfaces, rejects
//! cycles (naming the full cycle path), and computes the evaluation order.
//!
//! Modules with no mutual dependency are ordered lexicographically by name,
//! so re-runs over the same input are byte-for-byte reproducible.

use crate::error::{Error, Result};
use crate::expr::Reference;
use crate::stack::Stack;
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A directed reference edge: a consumer module's input bound to a producer
/// module's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    /// Module whose output is consumed.
    pub producer: String,
    /// Output name on the producer.
    pub output: String,
    /// Module whose input consumes it.
    pub consumer: String,
    /// Input name on the consumer.
    pub input: String,
}

/// The wired module graph with a precomputed evaluation order.
#[derive(Debug, Clone)]
pub struct CompositionGraph {
    nodes: Vec<String>,
    edges: Vec<ReferenceEdge>,
    order: Vec<String>,
}

impl CompositionGraph {
    /// Builds the graph from a compiled stack.
    ///
    /// Fails with `UnresolvedReference` when an input points at a module or
    /// output that does not exist, and `CycleDetected` when the reference
    /// graph is not a DAG.
    pub fn build(stack: &Stack) -> Result<Self> {
        let edges = collect_edges(stack)?;

        // petgraph nodes are created in sorted name order so any
        // index-derived iteration is deterministic too.
        let mut names: Vec<String> = stack.modules.keys().cloned().collect();
        names.sort();

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut index_of: IndexMap<String, NodeIndex> = IndexMap::new();
        for name in &names {
            let idx = graph.add_node(name.clone());
            index_of.insert(name.clone(), idx);
        }
        for edge in &edges {
            graph.add_edge(index_of[&edge.producer], index_of[&edge.consumer], ());
        }

        // Any strongly connected component with more than one member is a
        // reference cycle; report the full path through it.
        for scc in tarjan_scc(&graph) {
            if scc.len() > 1 {
                let path = cycle_path(&graph, &scc);
                return Err(Error::cycle_detected(path));
            }
        }

        let order = kahn_order(&names, &edges);
        debug!(modules = names.len(), edges = edges.len(), "composition graph built");

        Ok(CompositionGraph {
            nodes: names,
            edges,
            order,
        })
    }

    /// Modules in dependency order: every producer precedes its consumers,
    /// ties broken lexicographically.
    pub fn evaluation_order(&self) -> &[String] {
        &self.order
    }

    /// All derived reference edges.
    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    /// All module names, sorted.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Renders the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph stack {\n");
        for name in &self.nodes {
            dot.push_str(&format!("    \"{}\";\n", name));
        }
        for edge in &self.edges {
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{} -> {}\"];\n",
                edge.producer, edge.consumer, edge.output, edge.input
            ));
        }
        dot.push_str("}\n");
        dot
    }
}

/// Derives and validates reference edges from module input bindings.
fn collect_edges(stack: &Stack) -> Result<Vec<ReferenceEdge>> {
    let mut edges = Vec::new();

    for (consumer_name, consumer) in &stack.modules {
        for (input_name, expr) in &consumer.inputs {
            for reference in expr.references() {
                let Reference::ModuleOutput { module, output } = reference else {
                    continue;
                };

                let context = format!("module '{}' input '{}'", consumer_name, input_name);
                let producer = stack.modules.get(&module).ok_or_else(|| {
                    Error::unresolved_reference(&context, format!("module.{}.{}", module, output))
                })?;
                if !producer.outputs.contains_key(&output) {
                    return Err(Error::unresolved_reference(
                        &context,
                        format!("module.{}.{}", module, output),
                    ));
                }

                edges.push(ReferenceEdge {
                    producer: module,
                    output,
                    consumer: consumer_name.clone(),
                    input: input_name.clone(),
                });
            }
        }
    }

    Ok(edges)
}

/// Kahn's algorithm with a lexicographic ready set, so evaluation order is
/// fully determined by the input.
fn kahn_order(names: &[String], edges: &[ReferenceEdge]) -> Vec<String> {
    let mut in_degree: BTreeMap<&str, usize> =
        names.iter().map(|n| (n.as_str(), 0)).collect();
    let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for edge in edges {
        *in_degree.entry(edge.consumer.as_str()).or_insert(0) += 1;
        successors
            .entry(edge.producer.as_str())
            .or_default()
            .push(edge.consumer.as_str());
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(names.len());
    while let Some(&name) = ready.iter().next() {
        ready.remove(name);
        order.push(name.to_string());

        if let Some(next) = successors.get(name) {
            for &successor in next {
                if let Some(degree) = in_degree.get_mut(successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(successor);
                    }
                }
            }
        }
    }

    // Cycles were rejected before this runs, so the walk always covers
    // every node.
    debug_assert_eq!(order.len(), names.len());
    order
}

/// Reconstructs one concrete cycle through a strongly connected component.
/// Returns the path with the starting module repeated at the end.
fn cycle_path(graph: &DiGraph<String, ()>, scc: &[NodeIndex]) -> Vec<String> {
    let members: BTreeSet<NodeIndex> = scc.iter().copied().collect();

    // Start from the lexicographically smallest member for stable output.
    let start = *scc
        .iter()
        .min_by_key(|idx| &graph[**idx])
        .expect("scc is non-empty");

    // BFS within the component back to the start node.
    let mut parent: BTreeMap<NodeIndex, NodeIndex> = BTreeMap::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(start);

    'search: while let Some(node) = queue.pop_front() {
        let mut neighbors: Vec<NodeIndex> = graph
            .neighbors(node)
            .filter(|n| members.contains(n))
            .collect();
        neighbors.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

        for next in neighbors {
            if next == start {
                parent.insert(start, node);
                break 'search;
            }
            if let std::collections::btree_map::Entry::Vacant(e) = parent.entry(next) {
                e.insert(node);
                queue.push_back(next);
            }
        }
    }

    // Walk parents from start back around the loop.
    let mut rev = vec![start];
    let mut node = parent[&start];
    while node != start {
        rev.push(node);
        node = parent[&node];
    }
    rev.push(start);
    rev.reverse();

    rev.into_iter().map(|idx| graph[idx].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(yaml: &str) -> Stack {
        Stack::from_str(yaml).unwrap()
    }

    #[test]
    fn test_linear_chain_order() {
        let s = stack(
            r#"
modules:
  bastion:
    inputs:
      vpc_id: "${module.vpc.id}"
    outputs:
      ip: "1.2.3.4"
  vpc:
    outputs:
      id: "vpc-123"
"#,
        );
        let graph = CompositionGraph::build(&s).unwrap();
        assert_eq!(graph.evaluation_order(), ["vpc", "bastion"]);
    }

    #[test]
    fn test_independent_modules_sorted_lexicographically() {
        let s = stack(
            r#"
modules:
  zeta:
    outputs: {a: "1"}
  alpha:
    outputs: {a: "1"}
  mid:
    outputs: {a: "1"}
"#,
        );
        let graph = CompositionGraph::build(&s).unwrap();
        assert_eq!(graph.evaluation_order(), ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_cycle_rejected_with_full_path() {
        let s = stack(
            r#"
modules:
  a:
    inputs:
      x: "${module.b.out}"
    outputs: {out: "1"}
  b:
    inputs:
      x: "${module.a.out}"
    outputs: {out: "2"}
"#,
        );
        let err = CompositionGraph::build(&s).unwrap_err();
        match err {
            Error::CycleDetected { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"a".to_string()));
                assert!(path.contains(&"b".to_string()));
            }
            other => panic!("expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_module_rejected() {
        let s = stack(
            r#"
modules:
  bastion:
    inputs:
      vpc_id: "${module.vpc.id}"
    outputs: {}
"#,
        );
        let err = CompositionGraph::build(&s).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_unknown_output_name_rejected() {
        let s = stack(
            r#"
modules:
  vpc:
    outputs:
      id: "vpc-123"
  bastion:
    inputs:
      vpc_id: "${module.vpc.missing}"
    outputs: {}
"#,
        );
        let err = CompositionGraph::build(&s).unwrap_err();
        match err {
            Error::UnresolvedReference { reference, .. } => {
                assert_eq!(reference, "module.vpc.missing");
            }
            other => panic!("expected UnresolvedReference, got {:?}", other),
        }
    }

    #[test]
    fn test_dot_output() {
        let s = stack(
            r#"
modules:
  vpc:
    outputs:
      id: "vpc-123"
  bastion:
    inputs:
      vpc_id: "${module.vpc.id}"
    outputs: {}
"#,
        );
        let graph = CompositionGraph::build(&s).unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph stack {"));
        assert!(dot.contains("\"vpc\" -> \"bastion\""));
    }
}
