//! Error taxonomy for the computation graph engine.
//!
//! Strategy- and evaluator-level errors are raw (no node attached); the
//! graph boundary and forecast nodes wrap them in [`CalcError::Calculation`]
//! so a deep failure stays traceable to the top-level call.

use crate::Period;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    /// Structural misconfiguration caught at construction or mutation time:
    /// mismatched weight/rate counts, unresolved aliases, bad targets.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A strategy was given fewer inputs than it can reduce.
    #[error("{op} requires at least {required} input(s), got {actual}")]
    InvalidInputCount {
        op: String,
        required: usize,
        actual: usize,
    },

    /// Zero divisor or zero weight sum during reduction.
    #[error("division by zero")]
    DivisionByZero,

    /// A formula referenced a variable that is not bound to any input.
    #[error("unknown variable '{name}' (available: {available:?})")]
    UnknownVariable {
        name: String,
        available: Vec<String>,
    },

    /// The formula source could not be parsed. Raised at construction,
    /// never during evaluation.
    #[error("syntax error at offset {offset}: {detail}")]
    UnsupportedSyntax { offset: usize, detail: String },

    /// A graph operation referenced a node name that is not registered.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// A period outside the registered period list (for `set_value`) or
    /// outside a forecast node's resolvable range.
    #[error("period '{0}' is not registered")]
    UnknownPeriod(String),

    /// The dependency relation contains a cycle; carries one offending path.
    #[error("cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// A caller-supplied callable reported a failure.
    #[error("custom calculation failed: {message}")]
    Custom { message: String },

    /// Context wrapper: the node and period under which a nested failure
    /// occurred.
    #[error("calculation of '{node}' failed for period '{period}': {source}")]
    Calculation {
        node: String,
        period: Period,
        source: Box<CalcError>,
    },

    /// Deserializing an opaque spec (closure-bearing node) is a hard error.
    #[error("node '{node}' cannot be reconstructed: {reason}")]
    NotReconstructible { node: String, reason: String },
}

impl CalcError {
    /// Strips [`CalcError::Calculation`] wrappers down to the leaf failure.
    pub fn root_cause(&self) -> &CalcError {
        match self {
            CalcError::Calculation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Wraps `self` with node/period context. Idempotent for a given
    /// (node, period) pair so boundary layers never double-wrap.
    pub(crate) fn with_context(self, node: &str, period: &str) -> CalcError {
        let already = matches!(
            &self,
            CalcError::Calculation { node: n, period: p, .. } if n == node && p == period
        );
        if already {
            self
        } else {
            CalcError::Calculation {
                node: node.to_string(),
                period: period.to_string(),
                source: Box::new(self),
            }
        }
    }
}
