//! The node hierarchy: leaves, strategy-driven composites, and forecasts.

mod calculation;
mod data;
mod forecast;

pub use calculation::CalculationNode;
pub use data::DataNode;
pub use forecast::{CustomGrowthFn, ForecastNode, GrowthRule, SamplerFn};

use crate::error::CalcError;
use crate::graph::Graph;

/// Any node a graph can register. Dispatch is closed over the three
/// concrete kinds so serialization and validation can enumerate them.
#[derive(Debug, Clone)]
pub enum Node {
    Data(DataNode),
    Calculation(CalculationNode),
    Forecast(ForecastNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Data(node) => node.name(),
            Node::Calculation(node) => node.name(),
            Node::Forecast(node) => node.name(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Data(_) => "data",
            Node::Calculation(_) => "calculation",
            Node::Forecast(_) => "forecast",
        }
    }

    /// Produces the node's value for `period`, resolving input references
    /// against `graph`. Data lookups are total; composite nodes may fail.
    pub fn calculate(&self, graph: &Graph, period: &str) -> Result<f64, CalcError> {
        match self {
            Node::Data(node) => Ok(node.get_value(period)),
            Node::Calculation(node) => node.calculate(graph, period),
            Node::Forecast(node) => node.calculate(period),
        }
    }

    /// Names of the nodes this node reads. Empty for leaves.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Node::Data(_) => &[],
            Node::Calculation(node) => node.inputs(),
            Node::Forecast(node) => node.dependencies(),
        }
    }

    pub fn has_value(&self, period: &str) -> bool {
        match self {
            Node::Data(node) => node.has_value(period),
            _ => false,
        }
    }

    /// Stored-value access. `None` for nodes without direct storage.
    pub fn get_value(&self, period: &str) -> Option<f64> {
        match self {
            Node::Data(node) => Some(node.get_value(period)),
            _ => None,
        }
    }

    pub fn set_value(
        &mut self,
        period: impl Into<crate::Period>,
        value: f64,
    ) -> Result<(), CalcError> {
        match self {
            Node::Data(node) => {
                node.set_value(period, value);
                Ok(())
            }
            other => Err(CalcError::Configuration {
                reason: format!(
                    "node '{}' ({}) does not support direct value assignment",
                    other.name(),
                    other.kind()
                ),
            }),
        }
    }

    pub fn has_calculation(&self) -> bool {
        matches!(self, Node::Calculation(_) | Node::Forecast(_))
    }

    pub fn clear_cache(&self) {
        match self {
            Node::Data(_) => {}
            Node::Calculation(node) => node.clear_cache(),
            Node::Forecast(node) => node.clear_cache(),
        }
    }

    /// Repoints any declared input equal to `from` at `to`. Used when a
    /// replacement node arrives under a different name.
    pub(crate) fn rename_dependency(&mut self, from: &str, to: &str) {
        match self {
            Node::Data(_) => {}
            Node::Calculation(node) => node.rename_input(from, to),
            Node::Forecast(node) => node.rename_source(from, to),
        }
    }
}

impl From<DataNode> for Node {
    fn from(node: DataNode) -> Self {
        Node::Data(node)
    }
}

impl From<CalculationNode> for Node {
    fn from(node: CalculationNode) -> Self {
        Node::Calculation(node)
    }
}

impl From<ForecastNode> for Node {
    fn from(node: ForecastNode) -> Self {
        Node::Forecast(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::Calculation;

    fn sample_calculation() -> Node {
        CalculationNode::new("total", ["a", "b"], Calculation::Addition)
            .unwrap()
            .into()
    }

    #[test]
    fn test_dependencies_per_kind() {
        let data: Node = DataNode::new("a", [("2023", 1.0)]).into();
        assert!(data.dependencies().is_empty());

        let calc = sample_calculation();
        assert_eq!(calc.dependencies(), ["a", "b"]);

        let forecast: Node = ForecastNode::new(
            "fc",
            "a",
            "2023",
            ["2024"],
            GrowthRule::Fixed { rate: 0.1 },
            [("2023", 1.0)],
        )
        .unwrap()
        .into();
        assert_eq!(forecast.dependencies(), ["a"]);
    }

    #[test]
    fn test_value_access_is_data_only() {
        let mut data: Node = DataNode::new("a", [("2023", 1.0)]).into();
        assert!(data.has_value("2023"));
        assert_eq!(data.get_value("2023"), Some(1.0));
        assert!(data.set_value("2024", 2.0).is_ok());

        let mut calc = sample_calculation();
        assert!(!calc.has_value("2023"));
        assert_eq!(calc.get_value("2023"), None);
        let err = calc.set_value("2023", 1.0).unwrap_err();
        assert!(matches!(err, CalcError::Configuration { .. }));
    }

    #[test]
    fn test_has_calculation_flags_composites() {
        assert!(!Node::from(DataNode::new("a", [("2023", 1.0)])).has_calculation());
        assert!(sample_calculation().has_calculation());
    }
}
