//! Dependency-order algorithms over the node registry.
//!
//! Edges run dependency -> dependent: a node appears in topological order
//! only after everything it reads. Dangling input references are ignored
//! here; reporting them is `validate`'s job.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::Graph;
use crate::error::CalcError;

/// Kahn's algorithm. Fails with the first detected cycle when the order
/// cannot cover every registered node.
pub(crate) fn topological_sort(graph: &Graph) -> Result<Vec<String>, CalcError> {
    let mut in_degree: BTreeMap<&str, usize> =
        graph.node_names().map(|name| (name, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for node in graph.nodes() {
        for dep in node.dependencies() {
            if graph.has_node(dep) {
                if let Some(degree) = in_degree.get_mut(node.name()) {
                    *degree += 1;
                }
                dependents.entry(dep.as_str()).or_default().push(node.name());
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(name) = queue.pop_front() {
        order.push(name.to_string());
        if let Some(children) = dependents.get(name) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let path = detect_cycles(graph).into_iter().next().unwrap_or_else(|| {
            // No simple cycle surfaced; report the unresolved remainder.
            in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(name, _)| name.to_string())
                .collect()
        });
        return Err(CalcError::CycleDetected { path });
    }

    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

/// Depth-first search with an explicit recursion stack. Every simple cycle
/// reachable from some start node is reported once, in traversal order,
/// deduplicated up to rotation.
pub(crate) fn detect_cycles(graph: &Graph) -> Vec<Vec<String>> {
    let mut state: BTreeMap<&str, VisitState> = BTreeMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for name in graph.node_names() {
        if state.get(name).copied().unwrap_or(VisitState::None) == VisitState::None {
            visit(name, graph, &mut state, &mut stack, &mut seen, &mut cycles);
        }
    }

    cycles
}

fn visit<'a>(
    name: &'a str,
    graph: &'a Graph,
    state: &mut BTreeMap<&'a str, VisitState>,
    stack: &mut Vec<&'a str>,
    seen: &mut BTreeSet<Vec<String>>,
    cycles: &mut Vec<Vec<String>>,
) {
    state.insert(name, VisitState::Visiting);
    stack.push(name);

    if let Some(node) = graph.get_node(name) {
        for dep in node.dependencies() {
            let dep = dep.as_str();
            if !graph.has_node(dep) {
                continue;
            }
            match state.get(dep).copied().unwrap_or(VisitState::None) {
                VisitState::Visiting => {
                    if let Some(pos) = stack.iter().position(|&entry| entry == dep) {
                        let cycle: Vec<String> =
                            stack[pos..].iter().map(|entry| entry.to_string()).collect();
                        if seen.insert(canonical_rotation(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                }
                VisitState::Visited => {}
                VisitState::None => {
                    visit(dep, graph, state, stack, seen, cycles);
                }
            }
        }
    }

    stack.pop();
    state.insert(name, VisitState::Visited);
}

/// Rotates a cycle so its smallest name comes first, giving one canonical
/// form for deduplication.
fn canonical_rotation(cycle: &[String]) -> Vec<String> {
    let Some(min_idx) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| *name)
        .map(|(idx, _)| idx)
    else {
        return Vec::new();
    };
    cycle[min_idx..]
        .iter()
        .chain(cycle[..min_idx].iter())
        .cloned()
        .collect()
}

/// Declared direct inputs per node, including dangling references.
pub(crate) fn dependency_map(graph: &Graph) -> BTreeMap<String, Vec<String>> {
    graph
        .nodes()
        .map(|node| (node.name().to_string(), node.dependencies().to_vec()))
        .collect()
}

/// Transitive closure over dependencies, `start` included.
pub(crate) fn upstream_of(graph: &Graph, start: &str) -> Result<BTreeSet<String>, CalcError> {
    if !graph.has_node(start) {
        return Err(CalcError::NodeNotFound(start.to_string()));
    }
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(name) = queue.pop_front() {
        if visited.insert(name.to_string()) {
            if let Some(node) = graph.get_node(name) {
                for dep in node.dependencies() {
                    if graph.has_node(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }
    }
    Ok(visited)
}

/// Transitive closure over dependents, `start` included.
pub(crate) fn downstream_of(
    graph: &Graph,
    start: &str,
) -> Result<BTreeSet<String>, CalcError> {
    if !graph.has_node(start) {
        return Err(CalcError::NodeNotFound(start.to_string()));
    }
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in graph.nodes() {
        for dep in node.dependencies() {
            dependents.entry(dep.as_str()).or_default().push(node.name());
        }
    }
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(name) = queue.pop_front() {
        if visited.insert(name.to_string()) {
            if let Some(children) = dependents.get(name) {
                queue.extend(children.iter().copied());
            }
        }
    }
    Ok(visited)
}
