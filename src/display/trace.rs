//! Human-readable evaluation traces.
//!
//! Renders the dependency tree beneath a node together with each node's
//! value for one period. Meant for debugging model structure, not for
//! machine consumption.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::calc::Calculation;
use crate::graph::Graph;
use crate::node::Node;

pub fn format_trace(graph: &Graph, target: &str, period: &str) -> String {
    let mut tracer = Tracer {
        graph,
        period,
        visited_at_level: BTreeMap::new(),
        output: String::new(),
    };

    if graph.has_node(target) {
        let _ = writeln!(
            tracer.output,
            "CALCULATION TRACE for node '{}', period '{}':",
            target, period
        );
        let _ = writeln!(
            tracer.output,
            "--------------------------------------------------"
        );
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: unknown node '{}'", target);
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a Graph,
    period: &'a str,
    visited_at_level: BTreeMap<&'a str, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, name: &'a str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }

        let Some(node) = self.graph.get_node(name) else {
            let _ = writeln!(self.output, "{}[L{}] {} [missing]", prefix, level, name);
            return;
        };
        self.visited_at_level.insert(name, level);

        let value = self.format_value(name);
        let line_header = format!("[L{}] {}{}", level, name, value);

        match node {
            Node::Data(_) => {
                let _ = writeln!(self.output, "{}{} -> Data", prefix, line_header);
            }
            Node::Calculation(calc) => {
                let _ = writeln!(
                    self.output,
                    "{}{} = {}",
                    prefix,
                    line_header,
                    describe_calculation(calc.calculation(), calc.inputs())
                );
                self.recurse_children(prefix, calc.inputs(), level);
            }
            Node::Forecast(forecast) => {
                let _ = writeln!(
                    self.output,
                    "{}{} ~ forecast[{}] of '{}' (base '{}')",
                    prefix,
                    line_header,
                    forecast.growth().label(),
                    forecast.source(),
                    forecast.base_period()
                );
                self.recurse_children(prefix, forecast.dependencies(), level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &'a [String], level: usize) {
        let stem = build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn format_value(&self, name: &str) -> String {
        match self.graph.calculate(name, self.period) {
            Ok(value) => format!("[{:.3}]", value),
            Err(err) => format!("[Err: {}]", err.root_cause()),
        }
    }
}

fn describe_calculation(calculation: &Calculation, inputs: &[String]) -> String {
    match calculation {
        Calculation::Formula(formula) => format!("formula \"{}\"", formula.source()),
        other => format!("{}({})", other.label(), inputs.join(", ")),
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}
