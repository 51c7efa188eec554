//! The owning graph: node registry, period list, and evaluation
//! orchestration.

mod manipulator;
mod topology;
mod validate;

pub use manipulator::Manipulator;
pub use validate::{IssueKind, ValidationIssue};

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::CalcError;
use crate::node::{ForecastNode, GrowthRule, Node};
use crate::Period;

/// A registry of named nodes plus the sorted period list they are
/// evaluated over.
///
/// Input references are stored as names and resolved against the registry
/// at evaluation time, so structural edits are visible to every dependent
/// without pointer rewiring. Every structural mutation clears all caches
/// and re-arms cycle validation; the first `calculate` after a mutation
/// re-checks the dependency relation before any evaluation starts, which
/// is what keeps an accidental cycle from recursing unboundedly.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    periods: Vec<Period>,
    structure_version: u64,
    validated_version: Cell<Option<u64>>,
}

impl Graph {
    pub fn new(periods: impl IntoIterator<Item = impl Into<Period>>) -> Self {
        let mut graph = Self {
            nodes: BTreeMap::new(),
            periods: Vec::new(),
            structure_version: 0,
            validated_version: Cell::new(None),
        };
        graph.add_periods(periods);
        graph
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Registers additional periods, keeping the list sorted and unique.
    pub fn add_periods(&mut self, periods: impl IntoIterator<Item = impl Into<Period>>) {
        self.periods.extend(periods.into_iter().map(Into::into));
        self.periods.sort();
        self.periods.dedup();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Inserts a node, replacing any existing node of the same name.
    pub fn add_node(&mut self, node: impl Into<Node>) {
        let node = node.into();
        let name = node.name().to_string();
        if self.nodes.insert(name.clone(), node).is_some() {
            log::debug!("replaced node '{name}'");
        }
        self.touch_structure();
    }

    /// Deletes a node and returns it. Dependents that still reference the
    /// name keep their dangling reference; `validate` reports it and
    /// evaluation fails with `NodeNotFound`.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, CalcError> {
        let node = self
            .nodes
            .remove(name)
            .ok_or_else(|| CalcError::NodeNotFound(name.to_string()))?;
        let orphaned = self.get_dependents(name);
        if !orphaned.is_empty() {
            log::warn!(
                "removed node '{}' is still referenced by: {}",
                name,
                orphaned.join(", ")
            );
        }
        self.touch_structure();
        Ok(node)
    }

    /// Swaps the node registered under `name` for `node`, returning the
    /// old one. If the replacement carries a different name, every
    /// dependent's input list is rewritten to the new name.
    pub fn replace_node(
        &mut self,
        name: &str,
        node: impl Into<Node>,
    ) -> Result<Node, CalcError> {
        let node = node.into();
        let Some(old) = self.nodes.remove(name) else {
            return Err(CalcError::NodeNotFound(name.to_string()));
        };
        let new_name = node.name().to_string();
        if new_name != name {
            for dependent in self.nodes.values_mut() {
                dependent.rename_dependency(name, &new_name);
            }
        }
        self.nodes.insert(new_name, node);
        self.touch_structure();
        Ok(old)
    }

    /// Borrows the mutation facade.
    pub fn manipulator(&mut self) -> Manipulator<'_> {
        Manipulator::new(self)
    }

    /// Evaluates `name` for `period`. The dependency relation is checked
    /// for cycles first if anything changed since the last check; nested
    /// failures are wrapped with the top-level node and period.
    pub fn calculate(&self, name: &str, period: &str) -> Result<f64, CalcError> {
        self.ensure_acyclic()?;
        let node = self
            .get_node(name)
            .ok_or_else(|| CalcError::NodeNotFound(name.to_string()))?;
        node.calculate(self, period)
            .map_err(|err| err.with_context(name, period))
    }

    /// Clears every cache and recomputes all nodes in dependency order for
    /// one period. Nodes that fail for the period (for example a forecast
    /// asked about a period outside its horizon) are skipped and logged,
    /// not fatal; a cycle is fatal.
    pub fn recalculate_all(&self, period: &str) -> Result<BTreeMap<String, f64>, CalcError> {
        let order = self.topological_sort()?;
        self.clear_all_caches();
        Ok(self.compute_period(&order, period))
    }

    /// `recalculate_all` over several periods, one result map per period.
    pub fn recalculate_periods(
        &self,
        periods: impl IntoIterator<Item = impl Into<Period>>,
    ) -> Result<BTreeMap<Period, BTreeMap<String, f64>>, CalcError> {
        let order = self.topological_sort()?;
        self.clear_all_caches();
        let mut results = BTreeMap::new();
        for period in periods.into_iter().map(Into::into) {
            let values = self.compute_period(&order, &period);
            results.insert(period, values);
        }
        Ok(results)
    }

    fn compute_period(&self, order: &[String], period: &str) -> BTreeMap<String, f64> {
        let mut results = BTreeMap::new();
        for name in order {
            match self.calculate(name, period) {
                Ok(value) => {
                    results.insert(name.clone(), value);
                }
                Err(err) => {
                    log::debug!("skipping node '{name}' for period '{period}': {err}");
                }
            }
        }
        results
    }

    pub fn clear_all_caches(&self) {
        log::debug!("clearing caches for {} node(s)", self.nodes.len());
        for node in self.nodes.values() {
            node.clear_cache();
        }
    }

    /// Evaluates `source` over the graph's periods up to `base_period`,
    /// snapshots those values as history, and registers a forecast node
    /// named `name` on top of them. The forecast periods are added to the
    /// graph's period list.
    pub fn add_forecast_of(
        &mut self,
        name: impl Into<String>,
        source: &str,
        base_period: impl Into<Period>,
        forecast_periods: impl IntoIterator<Item = impl Into<Period>>,
        growth: GrowthRule,
    ) -> Result<(), CalcError> {
        self.ensure_acyclic()?;
        let base_period: Period = base_period.into();
        let forecast_periods: Vec<Period> =
            forecast_periods.into_iter().map(Into::into).collect();

        let history = {
            let node = self
                .get_node(source)
                .ok_or_else(|| CalcError::NodeNotFound(source.to_string()))?;
            let mut history = BTreeMap::new();
            for period in self
                .periods
                .iter()
                .filter(|p| p.as_str() <= base_period.as_str())
            {
                let value = node
                    .calculate(self, period)
                    .map_err(|err| err.with_context(source, period))?;
                history.insert(period.clone(), value);
            }
            history
        };

        let forecast = ForecastNode::new(
            name,
            source,
            base_period,
            forecast_periods.clone(),
            growth,
            history,
        )?;
        self.add_node(forecast);
        self.add_periods(forecast_periods);
        Ok(())
    }

    pub fn topological_sort(&self) -> Result<Vec<String>, CalcError> {
        topology::topological_sort(self)
    }

    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        topology::detect_cycles(self)
    }

    /// Direct inputs of `name`. Empty for data nodes.
    pub fn get_dependencies(&self, name: &str) -> Result<Vec<String>, CalcError> {
        let node = self
            .get_node(name)
            .ok_or_else(|| CalcError::NodeNotFound(name.to_string()))?;
        Ok(node.dependencies().to_vec())
    }

    /// Nodes whose declared inputs include `name`. Works whether or not
    /// `name` itself is registered, which is what `remove_node` needs.
    pub fn get_dependents(&self, name: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| node.dependencies().iter().any(|dep| dep == name))
            .map(|node| node.name().to_string())
            .collect()
    }

    pub fn get_dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        topology::dependency_map(self)
    }

    /// Everything `name` transitively reads, `name` included.
    pub fn upstream_of(&self, name: &str) -> Result<BTreeSet<String>, CalcError> {
        topology::upstream_of(self, name)
    }

    /// Everything that transitively reads `name`, `name` included.
    pub fn downstream_of(&self, name: &str) -> Result<BTreeSet<String>, CalcError> {
        topology::downstream_of(self, name)
    }

    /// Collects structural problems without failing.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        validate::validate(self)
    }

    /// Moves every node and period of `other` into this graph. Name
    /// collisions resolve in favor of `other`.
    pub fn merge(&mut self, other: Graph) {
        let Graph { nodes, periods, .. } = other;
        for (name, node) in nodes {
            if self.nodes.insert(name.clone(), node).is_some() {
                log::debug!("merge replaced node '{name}'");
            }
        }
        self.add_periods(periods);
        self.touch_structure();
    }

    /// Marks the dependency structure as changed: bumps the version so the
    /// next `calculate` re-checks for cycles, and drops all caches.
    fn touch_structure(&mut self) {
        self.structure_version += 1;
        self.clear_all_caches();
    }

    fn ensure_acyclic(&self) -> Result<(), CalcError> {
        if self.validated_version.get() == Some(self.structure_version) {
            return Ok(());
        }
        if let Some(path) = topology::detect_cycles(self).into_iter().next() {
            return Err(CalcError::CycleDetected { path });
        }
        self.validated_version.set(Some(self.structure_version));
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(Vec::<Period>::new())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::calc::Calculation;
    use crate::node::{CalculationNode, DataNode};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn statement_graph() -> Graph {
        let mut graph = Graph::new(["2022", "2023"]);
        graph.add_node(DataNode::new(
            "revenue",
            [("2022", 100.0), ("2023", 120.0)],
        ));
        graph.add_node(DataNode::new("cogs", [("2022", 40.0), ("2023", 50.0)]));
        graph.add_node(
            CalculationNode::new(
                "gross_profit",
                ["revenue", "cogs"],
                Calculation::Subtraction,
            )
            .unwrap(),
        );
        graph
    }

    /// Custom strategy that counts how often it actually runs.
    fn counting_sum(counter: Arc<AtomicUsize>) -> Calculation {
        Calculation::Custom {
            name: "counting_sum".to_string(),
            func: Arc::new(move |inputs| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(inputs.values().sum())
            }),
        }
    }

    #[test]
    fn test_calculate_resolves_dependencies() {
        let graph = statement_graph();
        assert_eq!(graph.calculate("gross_profit", "2022").unwrap(), 60.0);
        assert_eq!(graph.calculate("gross_profit", "2023").unwrap(), 70.0);
    }

    #[test]
    fn test_calculate_unknown_node() {
        let graph = statement_graph();
        let err = graph.calculate("ebitda", "2022").unwrap_err();
        assert!(matches!(err, CalcError::NodeNotFound(name) if name == "ebitda"));
    }

    #[test]
    fn test_cache_hits_skip_the_strategy() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut graph = statement_graph();
        graph.add_node(
            CalculationNode::new(
                "total",
                ["revenue", "cogs"],
                counting_sum(Arc::clone(&counter)),
            )
            .unwrap(),
        );

        assert_eq!(graph.calculate("total", "2022").unwrap(), 140.0);
        assert_eq!(graph.calculate("total", "2022").unwrap(), 140.0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // A different period is a different cache entry.
        assert_eq!(graph.calculate("total", "2023").unwrap(), 170.0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_value_invalidates_dependents() {
        let mut graph = statement_graph();
        assert_eq!(graph.calculate("gross_profit", "2022").unwrap(), 60.0);

        graph
            .manipulator()
            .set_value("revenue", "2022", 110.0)
            .unwrap();
        assert_eq!(graph.calculate("gross_profit", "2022").unwrap(), 70.0);
    }

    #[test]
    fn test_replace_node_propagates_to_dependents() {
        let mut graph = statement_graph();
        assert_eq!(graph.calculate("gross_profit", "2023").unwrap(), 70.0);

        let old = graph
            .replace_node("cogs", DataNode::new("cogs", [("2023", 80.0)]))
            .unwrap();
        assert_eq!(old.name(), "cogs");
        assert_eq!(graph.calculate("gross_profit", "2023").unwrap(), 40.0);
        // Unrelated values are untouched.
        assert_eq!(graph.calculate("revenue", "2023").unwrap(), 120.0);
    }

    #[test]
    fn test_replace_node_with_rename_rewrites_inputs() {
        let mut graph = statement_graph();
        graph
            .replace_node("cogs", DataNode::new("cost_of_sales", [("2023", 30.0)]))
            .unwrap();

        assert!(!graph.has_node("cogs"));
        assert_eq!(
            graph.get_dependencies("gross_profit").unwrap(),
            vec!["revenue".to_string(), "cost_of_sales".to_string()]
        );
        assert_eq!(graph.calculate("gross_profit", "2023").unwrap(), 90.0);
    }

    #[test]
    fn test_replace_missing_node_errors() {
        let mut graph = statement_graph();
        let err = graph
            .replace_node("ghost", DataNode::new("ghost", [("2023", 1.0)]))
            .unwrap_err();
        assert!(matches!(err, CalcError::NodeNotFound(_)));
    }

    #[test]
    fn test_cycle_blocks_calculation_eagerly() {
        let mut graph = Graph::new(["2023"]);
        graph.add_node(
            CalculationNode::new("x", ["y"], Calculation::Addition).unwrap(),
        );
        graph.add_node(
            CalculationNode::new("y", ["x"], Calculation::Addition).unwrap(),
        );

        let err = graph.calculate("x", "2023").unwrap_err();
        assert!(matches!(err, CalcError::CycleDetected { .. }));
        assert!(graph.topological_sort().is_err());
        assert_eq!(graph.detect_cycles().len(), 1);

        // Breaking the cycle re-arms validation and evaluation succeeds.
        graph
            .replace_node("y", DataNode::new("y", [("2023", 5.0)]))
            .unwrap();
        assert_eq!(graph.calculate("x", "2023").unwrap(), 5.0);
    }

    #[test]
    fn test_nested_failure_carries_node_and_period() {
        let mut graph = Graph::new(["2023"]);
        graph.add_node(DataNode::new("num", [("2023", 10.0)]));
        graph.add_node(DataNode::new("den", [("2023", 0.0)]));
        graph.add_node(
            CalculationNode::new("ratio", ["num", "den"], Calculation::Division)
                .unwrap(),
        );

        let err = graph.calculate("ratio", "2023").unwrap_err();
        match &err {
            CalcError::Calculation { node, period, .. } => {
                assert_eq!(node, "ratio");
                assert_eq!(period, "2023");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root_cause(), CalcError::DivisionByZero));
    }

    #[test]
    fn test_recalculate_all_skips_failing_nodes() {
        let mut graph = statement_graph();
        graph.add_node(DataNode::new("den", [("2022", 0.0)]));
        graph.add_node(
            CalculationNode::new("bad_ratio", ["revenue", "den"], Calculation::Division)
                .unwrap(),
        );

        let results = graph.recalculate_all("2022").unwrap();
        assert!(!results.contains_key("bad_ratio"));
        assert_eq!(results["gross_profit"], 60.0);
        assert_eq!(results["revenue"], 100.0);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_recalculate_all_fails_on_cycle() {
        let mut graph = Graph::new(["2023"]);
        graph.add_node(
            CalculationNode::new("x", ["x"], Calculation::Addition).unwrap(),
        );
        assert!(matches!(
            graph.recalculate_all("2023"),
            Err(CalcError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_recalculate_periods_covers_each_period() {
        let graph = statement_graph();
        let results = graph.recalculate_periods(["2022", "2023"]).unwrap();
        assert_eq!(results["2022"]["gross_profit"], 60.0);
        assert_eq!(results["2023"]["gross_profit"], 70.0);
    }

    #[test]
    fn test_forecast_factory_snapshots_history() {
        let mut graph = statement_graph();
        graph
            .add_forecast_of(
                "revenue_fc",
                "revenue",
                "2023",
                ["2024", "2025"],
                GrowthRule::Fixed { rate: 0.10 },
            )
            .unwrap();

        assert_eq!(graph.calculate("revenue_fc", "2023").unwrap(), 120.0);
        assert_close(graph.calculate("revenue_fc", "2024").unwrap(), 132.0);
        assert_close(graph.calculate("revenue_fc", "2025").unwrap(), 145.2);
        // Forecast periods joined the period list.
        assert_eq!(graph.periods(), ["2022", "2023", "2024", "2025"]);
    }

    #[test]
    fn test_forecast_factory_requires_source() {
        let mut graph = statement_graph();
        let err = graph
            .add_forecast_of(
                "fc",
                "ghost",
                "2023",
                ["2024"],
                GrowthRule::Fixed { rate: 0.1 },
            )
            .unwrap_err();
        assert!(matches!(err, CalcError::NodeNotFound(_)));
    }

    #[test]
    fn test_merge_prefers_incoming_nodes() {
        let mut graph = statement_graph();
        let mut other = Graph::new(["2024"]);
        other.add_node(DataNode::new("revenue", [("2024", 200.0)]));
        other.add_node(DataNode::new("opex", [("2024", 20.0)]));

        graph.merge(other);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.calculate("revenue", "2024").unwrap(), 200.0);
        assert_eq!(graph.calculate("opex", "2024").unwrap(), 20.0);
        assert_eq!(graph.periods(), ["2022", "2023", "2024"]);
    }

    #[test]
    fn test_get_dependents_lists_direct_consumers() {
        let mut graph = statement_graph();
        assert_eq!(
            graph.get_dependents("revenue"),
            vec!["gross_profit".to_string()]
        );
        // Sinks and names nothing references have no consumers.
        assert!(graph.get_dependents("gross_profit").is_empty());
        assert!(graph.get_dependents("opex").is_empty());

        // Removal leaves the declared reference in place, so the removed
        // name still reports its dependents.
        graph.remove_node("revenue").unwrap();
        assert_eq!(
            graph.get_dependents("revenue"),
            vec!["gross_profit".to_string()]
        );
    }

    #[test]
    fn test_validation_after_removal() {
        let mut graph = statement_graph();
        graph.remove_node("cogs").unwrap();

        let issues = graph.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].node, "gross_profit");
        assert_eq!(
            issues[0].message,
            "node 'gross_profit' depends on non-existent node 'cogs'"
        );

        let err = graph.calculate("gross_profit", "2023").unwrap_err();
        assert!(
            matches!(err.root_cause(), CalcError::NodeNotFound(name) if name == "cogs")
        );
    }
}
