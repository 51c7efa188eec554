//! Spec types: the serialized shape of nodes and graphs.
//!
//! Every node kind maps to a tagged variant so a reader can enumerate
//! exactly what may appear in a persisted graph. Closure-bearing behavior
//! (custom calculations, statistical or custom growth) serializes to an
//! `Opaque` marker: emitting one logs a warning, and rebuilding from one
//! fails with `NotReconstructible`. That asymmetry is intentional and
//! covered by tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calc::Calculation;
use crate::error::CalcError;
use crate::formula::FormulaCalculation;
use crate::graph::Graph;
use crate::node::{CalculationNode, DataNode, ForecastNode, GrowthRule, Node};
use crate::Period;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSpec {
    Data {
        name: String,
        values: BTreeMap<Period, f64>,
        #[serde(default, skip_serializing_if = "is_zero")]
        default: f64,
    },
    Calculation {
        name: String,
        inputs: Vec<String>,
        calculation: CalculationSpec,
    },
    Forecast {
        name: String,
        source: String,
        base_period: Period,
        forecast_periods: Vec<Period>,
        growth: GrowthSpec,
        history: BTreeMap<Period, f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CalculationSpec {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    WeightedAverage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<f64>>,
    },
    Formula {
        source: String,
        variables: Vec<String>,
    },
    /// Marker left behind by a custom callable.
    Opaque { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GrowthSpec {
    Fixed { rate: f64 },
    Curve { rates: Vec<f64> },
    AverageValue,
    AverageHistoricalGrowth,
    /// Marker left behind by a statistical or custom growth rule.
    Opaque { kind: String },
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

impl Calculation {
    pub fn to_spec(&self) -> CalculationSpec {
        match self {
            Calculation::Addition => CalculationSpec::Addition,
            Calculation::Subtraction => CalculationSpec::Subtraction,
            Calculation::Multiplication => CalculationSpec::Multiplication,
            Calculation::Division => CalculationSpec::Division,
            Calculation::WeightedAverage { weights } => CalculationSpec::WeightedAverage {
                weights: weights.clone(),
            },
            Calculation::Formula(formula) => CalculationSpec::Formula {
                source: formula.source().to_string(),
                variables: formula.variables().to_vec(),
            },
            Calculation::Custom { name, .. } => {
                log::warn!(
                    "custom calculation '{name}' serializes as an opaque marker \
                     and cannot be reconstructed"
                );
                CalculationSpec::Opaque { name: name.clone() }
            }
        }
    }
}

impl CalculationSpec {
    /// Rebuilds the strategy. `node` is only used for error context.
    pub fn into_calculation(self, node: &str) -> Result<Calculation, CalcError> {
        match self {
            CalculationSpec::Addition => Ok(Calculation::Addition),
            CalculationSpec::Subtraction => Ok(Calculation::Subtraction),
            CalculationSpec::Multiplication => Ok(Calculation::Multiplication),
            CalculationSpec::Division => Ok(Calculation::Division),
            CalculationSpec::WeightedAverage { weights } => {
                Ok(Calculation::WeightedAverage { weights })
            }
            CalculationSpec::Formula { source, variables } => {
                Ok(Calculation::Formula(FormulaCalculation::new(
                    source, variables,
                )?))
            }
            CalculationSpec::Opaque { name } => Err(CalcError::NotReconstructible {
                node: node.to_string(),
                reason: format!("custom calculation '{name}' was not serialized"),
            }),
        }
    }
}

impl GrowthRule {
    pub fn to_spec(&self) -> GrowthSpec {
        match self {
            GrowthRule::Fixed { rate } => GrowthSpec::Fixed { rate: *rate },
            GrowthRule::Curve { rates } => GrowthSpec::Curve {
                rates: rates.clone(),
            },
            GrowthRule::AverageValue => GrowthSpec::AverageValue,
            GrowthRule::AverageHistoricalGrowth => GrowthSpec::AverageHistoricalGrowth,
            GrowthRule::Statistical { .. } | GrowthRule::Custom { .. } => {
                log::warn!(
                    "{} growth rule serializes as an opaque marker and cannot \
                     be reconstructed",
                    self.label()
                );
                GrowthSpec::Opaque {
                    kind: self.label().to_string(),
                }
            }
        }
    }
}

impl GrowthSpec {
    pub fn into_growth(self, node: &str) -> Result<GrowthRule, CalcError> {
        match self {
            GrowthSpec::Fixed { rate } => Ok(GrowthRule::Fixed { rate }),
            GrowthSpec::Curve { rates } => Ok(GrowthRule::Curve { rates }),
            GrowthSpec::AverageValue => Ok(GrowthRule::AverageValue),
            GrowthSpec::AverageHistoricalGrowth => Ok(GrowthRule::AverageHistoricalGrowth),
            GrowthSpec::Opaque { kind } => Err(CalcError::NotReconstructible {
                node: node.to_string(),
                reason: format!("{kind} growth rule was not serialized"),
            }),
        }
    }
}

impl Node {
    pub fn to_spec(&self) -> NodeSpec {
        match self {
            Node::Data(node) => NodeSpec::Data {
                name: node.name().to_string(),
                values: node.values().clone(),
                default: node.default_value(),
            },
            Node::Calculation(node) => NodeSpec::Calculation {
                name: node.name().to_string(),
                inputs: node.inputs().to_vec(),
                calculation: node.calculation().to_spec(),
            },
            Node::Forecast(node) => NodeSpec::Forecast {
                name: node.name().to_string(),
                source: node.source().to_string(),
                base_period: node.base_period().to_string(),
                forecast_periods: node.forecast_periods().to_vec(),
                growth: node.growth().to_spec(),
                history: node.history().clone(),
            },
        }
    }

    /// Rebuilds a node, resolving declared dependencies against the nodes
    /// already registered in `context`. An input missing from the context
    /// is `NodeNotFound`.
    pub fn from_spec(spec: NodeSpec, context: &Graph) -> Result<Node, CalcError> {
        match spec {
            NodeSpec::Data {
                name,
                values,
                default,
            } => Ok(DataNode::new(name, values).with_default(default).into()),
            NodeSpec::Calculation {
                name,
                inputs,
                calculation,
            } => {
                for input in &inputs {
                    if !context.has_node(input) {
                        return Err(CalcError::NodeNotFound(input.clone()));
                    }
                }
                let calculation = calculation.into_calculation(&name)?;
                Ok(CalculationNode::new(name, inputs, calculation)?.into())
            }
            NodeSpec::Forecast {
                name,
                source,
                base_period,
                forecast_periods,
                growth,
                history,
            } => {
                if !context.has_node(&source) {
                    return Err(CalcError::NodeNotFound(source));
                }
                let growth = growth.into_growth(&name)?;
                Ok(ForecastNode::new(
                    name,
                    source,
                    base_period,
                    forecast_periods,
                    growth,
                    history,
                )?
                .into())
            }
        }
    }
}

/// A whole graph: its period list and its nodes in dependency order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub periods: Vec<Period>,
    pub nodes: Vec<NodeSpec>,
}

impl Graph {
    /// Emits the graph with nodes in topological order, so `from_spec` can
    /// resolve each node against everything before it. Fails on a cyclic
    /// graph.
    pub fn to_spec(&self) -> Result<GraphSpec, CalcError> {
        let order = self.topological_sort()?;
        let mut nodes = Vec::with_capacity(order.len());
        for name in &order {
            if let Some(node) = self.get_node(name) {
                nodes.push(node.to_spec());
            }
        }
        Ok(GraphSpec {
            periods: self.periods().to_vec(),
            nodes,
        })
    }

    /// Rebuilds a graph node by node, each one resolved against the nodes
    /// loaded before it. Specs must therefore list dependencies before
    /// dependents, which `to_spec` guarantees.
    pub fn from_spec(spec: GraphSpec) -> Result<Graph, CalcError> {
        let mut graph = Graph::new(spec.periods);
        for node_spec in spec.nodes {
            let node = Node::from_spec(node_spec, &graph)?;
            graph.add_node(node);
        }
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, CalcError> {
        let spec = self.to_spec()?;
        serde_json::to_string_pretty(&spec).map_err(|err| CalcError::Configuration {
            reason: format!("graph serialization failed: {err}"),
        })
    }

    pub fn from_json(json: &str) -> Result<Graph, CalcError> {
        let spec: GraphSpec =
            serde_json::from_str(json).map_err(|err| CalcError::Configuration {
                reason: format!("malformed graph spec: {err}"),
            })?;
        Graph::from_spec(spec)
    }
}
