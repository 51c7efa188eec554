//! Composite nodes that reduce input values through a strategy.

use std::cell::RefCell;
use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::calc::Calculation;
use crate::error::CalcError;
use crate::graph::Graph;
use crate::Period;

/// A node that evaluates a fixed, ordered list of input nodes and reduces
/// their values through a [`Calculation`].
///
/// Inputs are stored as node names and resolved against the owning graph at
/// evaluation time, so replacing a node in the graph is immediately visible
/// to every dependent. Results are memoized per period until the cache is
/// cleared.
#[derive(Debug, Clone)]
pub struct CalculationNode {
    name: String,
    inputs: Vec<String>,
    calculation: Calculation,
    cache: RefCell<BTreeMap<Period, f64>>,
}

impl CalculationNode {
    /// Builds the node, checking that the strategy's shape matches the
    /// input list (weight counts, formula variable counts).
    pub fn new(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        calculation: Calculation,
    ) -> Result<Self, CalcError> {
        let name = name.into();
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        check_shape(&name, &inputs, &calculation)?;
        Ok(Self {
            name,
            inputs,
            calculation,
            cache: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn calculation(&self) -> &Calculation {
        &self.calculation
    }

    /// Swaps the strategy. The cache is cleared since memoized values were
    /// produced by the old strategy.
    pub fn set_calculation(&mut self, calculation: Calculation) -> Result<(), CalcError> {
        check_shape(&self.name, &self.inputs, &calculation)?;
        self.calculation = calculation;
        self.clear_cache();
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub(crate) fn rename_input(&mut self, from: &str, to: &str) {
        for input in &mut self.inputs {
            if input == from {
                *input = to.to_string();
            }
        }
    }

    pub(crate) fn cached(&self, period: &str) -> Option<f64> {
        self.cache.borrow().get(period).copied()
    }

    pub fn calculate(&self, graph: &Graph, period: &str) -> Result<f64, CalcError> {
        if let Some(value) = self.cached(period) {
            return Ok(value);
        }
        let mut values: SmallVec<[f64; 4]> = SmallVec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let node = graph
                .get_node(input)
                .ok_or_else(|| CalcError::NodeNotFound(input.clone()))?;
            values.push(node.calculate(graph, period)?);
        }
        let value = self.calculation.reduce(&self.inputs, &values)?;
        self.cache
            .borrow_mut()
            .insert(period.to_string(), value);
        Ok(value)
    }
}

fn check_shape(
    name: &str,
    inputs: &[String],
    calculation: &Calculation,
) -> Result<(), CalcError> {
    match calculation {
        Calculation::WeightedAverage {
            weights: Some(weights),
        } if weights.len() != inputs.len() => Err(CalcError::Configuration {
            reason: format!(
                "node '{}': {} weight(s) for {} input(s)",
                name,
                weights.len(),
                inputs.len()
            ),
        }),
        Calculation::Formula(formula) if formula.variables().len() != inputs.len() => {
            Err(CalcError::Configuration {
                reason: format!(
                    "node '{}': formula binds {} variable(s) but has {} input(s)",
                    name,
                    formula.variables().len(),
                    inputs.len()
                ),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FormulaCalculation;
    use crate::node::DataNode;

    fn two_leaf_graph() -> Graph {
        let mut graph = Graph::new(["2023", "2024"]);
        graph.add_node(DataNode::new("a", [("2023", 10.0), ("2024", 20.0)]));
        graph.add_node(DataNode::new("b", [("2023", 4.0), ("2024", 5.0)]));
        graph
    }

    #[test]
    fn test_reduces_inputs_in_declared_order() {
        let mut graph = two_leaf_graph();
        graph.add_node(
            CalculationNode::new("diff", ["a", "b"], Calculation::Subtraction).unwrap(),
        );
        assert_eq!(graph.calculate("diff", "2023").unwrap(), 6.0);
        assert_eq!(graph.calculate("diff", "2024").unwrap(), 15.0);
    }

    #[test]
    fn test_formula_variables_bind_to_inputs_positionally() {
        let mut graph = two_leaf_graph();
        let formula =
            FormulaCalculation::new("a + b / 2", vec!["a".into(), "b".into()]).unwrap();
        graph.add_node(
            CalculationNode::new("mix", ["a", "b"], Calculation::Formula(formula))
                .unwrap(),
        );
        assert_eq!(graph.calculate("mix", "2023").unwrap(), 12.0);
    }

    #[test]
    fn test_shape_mismatch_fails_at_construction() {
        let err = CalculationNode::new(
            "avg",
            ["a", "b"],
            Calculation::WeightedAverage {
                weights: Some(vec![1.0]),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CalcError::Configuration { .. }));
    }

    #[test]
    fn test_missing_input_is_node_not_found() {
        let mut graph = Graph::new(["2023"]);
        graph.add_node(
            CalculationNode::new("total", ["ghost"], Calculation::Addition).unwrap(),
        );
        let err = graph.calculate("total", "2023").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CalcError::NodeNotFound(name) if name == "ghost"
        ));
    }

    #[test]
    fn test_set_calculation_clears_cache() {
        let mut graph = two_leaf_graph();
        graph.add_node(
            CalculationNode::new("agg", ["a", "b"], Calculation::Addition).unwrap(),
        );
        assert_eq!(graph.calculate("agg", "2023").unwrap(), 14.0);

        graph
            .manipulator()
            .set_calculation("agg", Calculation::Multiplication)
            .unwrap();
        assert_eq!(graph.calculate("agg", "2023").unwrap(), 40.0);
    }
}
