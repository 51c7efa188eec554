//! Mutation facade over a graph.
//!
//! Collaborators that restructure a graph go through here rather than
//! holding the node map themselves. Every operation leaves input
//! references resolvable and caches coherent: structural edits and value
//! writes clear all caches in the graph, trading precision for
//! correctness.

use super::Graph;
use crate::calc::Calculation;
use crate::error::CalcError;
use crate::node::Node;

pub struct Manipulator<'g> {
    graph: &'g mut Graph,
}

impl<'g> Manipulator<'g> {
    pub(crate) fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    pub fn add_node(&mut self, node: impl Into<Node>) {
        self.graph.add_node(node);
    }

    pub fn remove_node(&mut self, name: &str) -> Result<Node, CalcError> {
        self.graph.remove_node(name)
    }

    pub fn replace_node(
        &mut self,
        name: &str,
        node: impl Into<Node>,
    ) -> Result<Node, CalcError> {
        self.graph.replace_node(name, node)
    }

    /// Writes a value into a data node. The period must be registered and
    /// the target must support direct assignment.
    pub fn set_value(
        &mut self,
        name: &str,
        period: &str,
        value: f64,
    ) -> Result<(), CalcError> {
        if !self.graph.periods().iter().any(|p| p == period) {
            return Err(CalcError::UnknownPeriod(period.to_string()));
        }
        let node = self
            .graph
            .nodes
            .get_mut(name)
            .ok_or_else(|| CalcError::NodeNotFound(name.to_string()))?;
        node.set_value(period, value)?;
        self.graph.clear_all_caches();
        Ok(())
    }

    /// Swaps the strategy of a calculation node.
    pub fn set_calculation(
        &mut self,
        name: &str,
        calculation: Calculation,
    ) -> Result<(), CalcError> {
        let node = self
            .graph
            .nodes
            .get_mut(name)
            .ok_or_else(|| CalcError::NodeNotFound(name.to_string()))?;
        match node {
            Node::Calculation(calc_node) => calc_node.set_calculation(calculation)?,
            other => {
                return Err(CalcError::Configuration {
                    reason: format!(
                        "node '{}' ({}) has no calculation strategy to replace",
                        other.name(),
                        other.kind()
                    ),
                })
            }
        }
        self.graph.clear_all_caches();
        Ok(())
    }
}
