//! Computation-graph engine for financial statement models.
//!
//! A [`Graph`] holds named nodes keyed by period label. Data nodes carry
//! observed values, calculation nodes derive a value from named inputs via
//! a [`Calculation`] strategy, and forecast nodes extend a source node past
//! its last known period with a [`GrowthRule`]. Evaluation resolves inputs
//! by name at call time, memoizes per node and period, and refuses to run
//! on a cyclic graph.
//!
//! ```
//! use fingraph_core::{Calculation, CalculationNode, DataNode, Graph};
//!
//! let mut graph = Graph::new(["2022", "2023"]);
//! graph.add_node(DataNode::new("revenue", [("2022", 100.0), ("2023", 120.0)]));
//! graph.add_node(DataNode::new("cogs", [("2022", 40.0), ("2023", 50.0)]));
//! graph.add_node(
//!     CalculationNode::new("gross_profit", ["revenue", "cogs"], Calculation::Subtraction)
//!         .unwrap(),
//! );
//!
//! assert_eq!(graph.calculate("gross_profit", "2023").unwrap(), 70.0);
//! ```
//!
//! Graphs are single-threaded: per-node memo caches use interior
//! mutability, so a [`Graph`] is deliberately not `Sync`. Wrap one in a
//! lock if it must cross threads.

/// Period label. Labels must sort lexically in chronological order
/// ("2023" < "2024", "2023-Q4" < "2024-Q1"); every ordering comparison in
/// the crate relies on this.
pub type Period = String;

pub mod calc;
pub mod display;
pub mod error;
pub mod formula;
pub mod graph;
pub mod node;
pub mod serialize;

pub use calc::{Calculation, CalculationRegistry, CustomCalcFn};
pub use display::format_trace;
pub use error::CalcError;
pub use formula::FormulaCalculation;
pub use graph::{Graph, IssueKind, Manipulator, ValidationIssue};
pub use node::{
    CalculationNode, CustomGrowthFn, DataNode, ForecastNode, GrowthRule, Node, SamplerFn,
};
pub use serialize::{CalculationSpec, GraphSpec, GrowthSpec, NodeSpec};
