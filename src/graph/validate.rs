//! Structural validation: collects problems instead of throwing.

use std::fmt;

use super::{topology, Graph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Cycle,
    MissingDependency,
}

/// One structural problem, anchored to the node it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub node: String,
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregates cycle reports and dangling input references. Never fails;
/// callers decide what to do with the list.
pub(crate) fn validate(graph: &Graph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for cycle in topology::detect_cycles(graph) {
        let Some(first) = cycle.first() else { continue };
        issues.push(ValidationIssue {
            node: first.clone(),
            kind: IssueKind::Cycle,
            message: format!("cycle detected: {}", cycle.join(" -> ")),
        });
    }

    for node in graph.nodes() {
        for dep in node.dependencies() {
            if !graph.has_node(dep) {
                issues.push(ValidationIssue {
                    node: node.name().to_string(),
                    kind: IssueKind::MissingDependency,
                    message: format!(
                        "node '{}' depends on non-existent node '{}'",
                        node.name(),
                        dep
                    ),
                });
            }
        }
    }

    issues
}
